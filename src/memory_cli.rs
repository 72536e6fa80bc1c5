//! CLI subcommands for per-identity memory.
//!
//! Provides `mindnet remember`, `recall`, `prime`, `hubs`, `show`, `decay`
//! and `list` on top of [`MemoryService`].

use anyhow::Result;
use clap::Subcommand;
use mindnet_core::mindmap::{self, SerializeOptions};
use mindnet_core::{Engram, EngramType, GraphNode, Mode, Query, Recall};
use serde_json::json;

use crate::service::MemoryService;

#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Fold an observation into an identity's memory
    Remember {
        /// Identity (role) that owns the memory
        identity: String,
        /// Free-text content to remember
        content: String,
        /// Keywords naming the event (comma separated or repeated)
        #[arg(short, long, value_delimiter = ',')]
        keywords: Vec<String>,
        /// Engram type: atomic, link, pattern
        #[arg(short = 't', long = "type", default_value = "atomic")]
        engram_type: EngramType,
        /// Mindmap text describing the event; overrides --keywords
        #[arg(long)]
        schema: Option<String>,
    },
    /// Recall the subgraph around one or more keywords
    Recall {
        /// Identity to recall from
        identity: String,
        /// Keywords; omit to recall from the best-connected hubs
        query: Vec<String>,
        /// focused, balanced or creative
        #[arg(short, long, default_value = "balanced")]
        mode: Mode,
    },
    /// Recall with no query (hub fallback)
    Prime {
        identity: String,
        #[arg(short, long, default_value = "balanced")]
        mode: Mode,
    },
    /// List the best-connected nodes
    Hubs {
        identity: String,
        /// Number of hubs to list
        #[arg(short, default_value_t = 5)]
        n: usize,
    },
    /// Print an identity's network as a mindmap
    Show { identity: String },
    /// Weaken every link and cue strength
    Decay {
        identity: String,
        /// Fraction removed from every weight (0.0-1.0)
        #[arg(short, long, default_value_t = 0.1)]
        rate: f64,
        /// Weights never drop below this
        #[arg(short, long, default_value_t = 0.05)]
        floor: f64,
    },
    /// List identities with a stored network
    List,
}

pub async fn handle_command(cmd: MemoryCommands, service: &MemoryService, json: bool) -> Result<()> {
    match cmd {
        MemoryCommands::Remember {
            identity,
            content,
            keywords,
            engram_type,
            schema,
        } => {
            let engram = match schema {
                Some(schema) => Engram::new(content, schema, engram_type),
                None => Engram::from_keywords(content, &keywords, engram_type),
            };
            let outcome = service.remember_engram(&identity, engram).await?;
            if json {
                println!("{}", serde_json::to_string(&outcome)?);
            } else if let Some(schema) = &outcome.schema_name {
                println!("Consolidated into schema: {schema}");
            } else {
                let reason = outcome
                    .rejection
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                println!("Not consolidated: {reason}");
            }
        }

        MemoryCommands::Recall {
            identity,
            query,
            mode,
        } => {
            let recall = service.recall(&identity, &Query::from(query), mode)?;
            print_recall(&recall, json)?;
        }

        MemoryCommands::Prime { identity, mode } => {
            let recall = service.prime(&identity, mode)?;
            print_recall(&recall, json)?;
        }

        MemoryCommands::Hubs { identity, n } => {
            let network = service.snapshot(&identity)?;
            let hubs = network.hubs(n);
            if json {
                let rows: Vec<_> = hubs
                    .iter()
                    .map(|node| json!({ "kind": node.kind(), "key": node.key(), "degree": node.degree() }))
                    .collect();
                println!("{}", serde_json::to_string(&rows)?);
                return Ok(());
            }
            if hubs.is_empty() {
                println!("No nodes for {identity}.");
                return Ok(());
            }
            for node in hubs {
                println!("  {:>4}  {}", node.degree(), node.node_ref());
            }
        }

        MemoryCommands::Show { identity } => {
            let network = service.snapshot(&identity)?;
            let tree = network.to_mindmap();
            if json {
                println!("{}", serde_json::to_string(&tree)?);
            } else {
                print!("{}", mindmap::serialize(&tree, &SerializeOptions::default()));
            }
        }

        MemoryCommands::Decay {
            identity,
            rate,
            floor,
        } => {
            let path = service.decay(&identity, rate, floor).await?;
            if json {
                println!("{}", json!({ "path": path }));
            } else {
                println!("Decayed {identity} by {rate} ({})", path.display());
            }
        }

        MemoryCommands::List => {
            let identities = service.identities()?;
            if json {
                println!("{}", serde_json::to_string(&identities)?);
            } else if identities.is_empty() {
                println!("No stored identities.");
            } else {
                for identity in identities {
                    println!("{identity}");
                }
            }
        }
    }

    Ok(())
}

fn print_recall(recall: &Recall, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(recall)?);
        return Ok(());
    }
    for missing in &recall.missing {
        println!("No node for: {missing}");
    }
    if recall.is_empty() {
        println!("Nothing recalled.");
        return Ok(());
    }

    println!("{} nodes ({} mode):", recall.activated_graph.nodes.len(), recall.mode);
    for node in &recall.activated_graph.nodes {
        println!("  {:.3}  {} (hops: {})", node.activation, node.node, node.hops);
    }
    if !recall.activated_graph.edges.is_empty() {
        println!("{} edges:", recall.activated_graph.edges.len());
        for edge in &recall.activated_graph.edges {
            println!("  {} -> {} ({:?}, {:.2})", edge.from, edge.to, edge.relation, edge.weight);
        }
    }
    if !recall.engrams.is_empty() {
        println!("---");
        for engram in &recall.engrams {
            let when = chrono::DateTime::from_timestamp_millis(engram.created_at)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!("[{}] {} ({when})", engram.engram_type, engram.content);
        }
    }
    Ok(())
}
