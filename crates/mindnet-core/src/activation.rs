//! Spreading activation recall.
//!
//! Seeds start at 1.0. Each hop multiplies the source activation by the edge
//! weight and the per-hop decay; a node keeps the best value over all paths
//! of at most `max_hops` hops. A node is only expanded again when its value
//! strictly improves, so cycles cannot keep the traversal alive.

use crate::config::ActivationConfig;
use crate::engram::Engram;
use crate::network::Network;
use crate::node::{GraphNode, Node, NodeKind, NodeRef, Relation};
use crate::tokenize::significant_terms;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Activation of every seed, and of the virtual hub for multi-seed queries.
const SEED_ACTIVATION: f64 = 1.0;
/// Weight of the virtual hub's link to each seed.
const HUB_WEIGHT: f64 = 1.0;

/// How wide recall casts its net.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Focused,
    #[default]
    Balanced,
    Creative,
}

impl Mode {
    /// Minimum activation a node needs to be returned.
    pub fn threshold(self) -> f64 {
        match self {
            Mode::Focused => 0.20,
            Mode::Balanced => 0.10,
            Mode::Creative => 0.05,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Focused => "focused",
            Mode::Balanced => "balanced",
            Mode::Creative => "creative",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "focused" => Ok(Mode::Focused),
            "balanced" => Ok(Mode::Balanced),
            "creative" => Ok(Mode::Creative),
            other => Err(format!("unknown recall mode: {other}")),
        }
    }
}

/// Activation below this value is never propagated: no mode could return it
/// or anything reached through it.
fn propagation_floor() -> f64 {
    Mode::Creative.threshold()
}

/// What to recall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// No query: seed from the best-connected hubs.
    Absent,
    /// A key, or whitespace-separated keys.
    Text(String),
    /// Several keys given separately.
    Terms(Vec<String>),
}

impl Query {
    pub fn is_absent(&self) -> bool {
        match self {
            Query::Absent => true,
            Query::Text(text) => text.trim().is_empty(),
            Query::Terms(terms) => terms.iter().all(|t| t.trim().is_empty()),
        }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::Text(text.to_string())
    }
}

impl From<Option<&str>> for Query {
    fn from(text: Option<&str>) -> Self {
        text.map_or(Query::Absent, Query::from)
    }
}

impl From<Vec<String>> for Query {
    fn from(terms: Vec<String>) -> Self {
        match terms.len() {
            0 => Query::Absent,
            1 => Query::Text(terms.into_iter().collect()),
            _ => Query::Terms(terms),
        }
    }
}

/// Seeds found for a query, plus the parts that matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub seeds: Vec<NodeRef>,
    pub missing: Vec<String>,
}

impl Resolution {
    fn push_seed(&mut self, seed: NodeRef) {
        if !self.seeds.contains(&seed) {
            self.seeds.push(seed);
        }
    }
}

/// A node reached by activation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivatedNode {
    #[serde(flatten)]
    pub node: NodeRef,
    pub activation: f64,
    /// Hops from the nearest seed along the best path.
    pub hops: usize,
    /// Cue strength; absent for schemas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
}

/// An edge between two activated nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivatedEdge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub weight: f64,
    pub relation: Relation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivatedGraph {
    pub nodes: Vec<ActivatedNode>,
    pub edges: Vec<ActivatedEdge>,
}

/// Outcome of one recall.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recall {
    pub mode: Mode,
    pub seeds: Vec<NodeRef>,
    /// Query parts that matched no node.
    pub missing: Vec<String>,
    pub activated_graph: ActivatedGraph,
    pub engrams: Vec<Engram>,
}

impl Recall {
    pub fn is_empty(&self) -> bool {
        self.activated_graph.nodes.is_empty()
    }

    pub fn node(&self, kind: NodeKind, key: &str) -> Option<&ActivatedNode> {
        self.activated_graph
            .nodes
            .iter()
            .find(|n| n.node.kind == kind && n.node.key == key)
    }

    pub fn has_edge(&self, a: &NodeRef, b: &NodeRef) -> bool {
        self.activated_graph
            .edges
            .iter()
            .any(|e| (&e.from == a && &e.to == b) || (&e.from == b && &e.to == a))
    }
}

#[derive(Debug, Clone, Copy)]
struct Reach {
    activation: f64,
    hops: usize,
}

/// Runs recall over a loaded network. Holds no state besides its parameters,
/// so one engine can serve any number of concurrent reads.
#[derive(Debug, Clone, Default)]
pub struct ActivationEngine {
    config: ActivationConfig,
}

impl ActivationEngine {
    pub fn new(config: ActivationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    /// Map a query to seed nodes.
    pub fn resolve(&self, network: &Network, query: &Query) -> Resolution {
        let mut resolution = Resolution::default();
        if query.is_absent() {
            for hub in network.hubs(self.config.hub_seeds) {
                resolution.push_seed(hub.node_ref());
            }
            return resolution;
        }
        match query {
            Query::Absent => {}
            Query::Text(text) => resolve_text(network, text, &mut resolution),
            Query::Terms(terms) => {
                for term in terms.iter().filter(|t| !t.trim().is_empty()) {
                    resolve_text(network, term, &mut resolution);
                }
            }
        }
        resolution
    }

    /// Recall the subgraph around `query`.
    pub fn recall(&self, network: &Network, query: &Query, mode: Mode) -> Recall {
        let Resolution { seeds, missing } = self.resolve(network, query);
        let mut reached = self.spread(network, &seeds);
        if query.is_absent() {
            // hub fallback returns the hubs themselves, never their neighbourhood
            reached.retain(|node_ref, _| seeds.contains(node_ref));
        }
        let threshold = mode.threshold();

        let mut nodes: Vec<ActivatedNode> = reached
            .into_iter()
            .filter(|(_, reach)| reach.activation >= threshold)
            .map(|(node_ref, reach)| ActivatedNode {
                strength: network
                    .node(&node_ref)
                    .and_then(Node::as_cue)
                    .map(|cue| cue.strength),
                node: node_ref,
                activation: reach.activation,
                hops: reach.hops,
            })
            .collect();
        nodes.sort_by(|a, b| {
            b.activation
                .partial_cmp(&a.activation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node.cmp(&b.node))
        });

        let edges = collect_edges(network, &nodes);
        let engrams = collect_engrams(network, &nodes);

        debug!(
            network = network.name(),
            mode = %mode,
            seeds = seeds.len(),
            activated = nodes.len(),
            engrams = engrams.len(),
            "recall"
        );

        Recall {
            mode,
            seeds,
            missing,
            activated_graph: ActivatedGraph { nodes, edges },
            engrams,
        }
    }

    /// Propagate activation from `seeds`. More than one seed behaves as a
    /// single virtual hub linked to each seed at [`HUB_WEIGHT`]; the hub hop
    /// is not decayed, so every seed starts at full activation.
    fn spread(&self, network: &Network, seeds: &[NodeRef]) -> BTreeMap<NodeRef, Reach> {
        let decay = self.config.decay_per_hop.clamp(0.0, 1.0);
        let floor = propagation_floor();
        let mut best: BTreeMap<NodeRef, Reach> = BTreeMap::new();

        let spoke = SEED_ACTIVATION * HUB_WEIGHT;
        for seed in seeds.iter().filter(|s| network.node(s).is_some()) {
            best.insert(
                seed.clone(),
                Reach {
                    activation: spoke,
                    hops: 0,
                },
            );
        }

        let mut frontier: Vec<(NodeRef, f64)> = best
            .iter()
            .map(|(node, reach)| (node.clone(), reach.activation))
            .collect();

        for hop in 1..=self.config.max_hops {
            let mut improved = BTreeSet::new();
            for (node_ref, source) in &frontier {
                let Some(node) = network.node(node_ref) else {
                    continue;
                };
                for (target, connection) in node.links().iter() {
                    let candidate = source * connection.weight * decay;
                    if candidate < floor {
                        continue;
                    }
                    match best.get_mut(target) {
                        Some(reach) if reach.activation >= candidate => continue,
                        Some(reach) => {
                            reach.activation = candidate;
                            reach.hops = hop;
                        }
                        None => {
                            best.insert(
                                target.clone(),
                                Reach {
                                    activation: candidate,
                                    hops: hop,
                                },
                            );
                        }
                    }
                    improved.insert(target.clone());
                }
            }
            if improved.is_empty() {
                break;
            }
            frontier = improved
                .into_iter()
                .filter_map(|node| best.get(&node).map(|r| (node, r.activation)))
                .collect();
        }

        best
    }
}

fn resolve_text(network: &Network, text: &str, resolution: &mut Resolution) {
    if let Some(node) = network.find_node(text, None) {
        resolution.push_seed(node.node_ref());
        return;
    }
    for token in text.split_whitespace() {
        if let Some(node) = network.find_node(token, None) {
            resolution.push_seed(node.node_ref());
            continue;
        }
        let mut matched = false;
        for term in significant_terms(token) {
            if let Some(node) = network.find_node(&term, None) {
                resolution.push_seed(node.node_ref());
                matched = true;
            }
        }
        if !matched {
            resolution.missing.push(token.to_string());
        }
    }
}

fn collect_edges(network: &Network, nodes: &[ActivatedNode]) -> Vec<ActivatedEdge> {
    let active: HashSet<&NodeRef> = nodes.iter().map(|n| &n.node).collect();
    let mut edges = Vec::new();
    for activated in nodes {
        let Some(node) = network.node(&activated.node) else {
            continue;
        };
        for (target, connection) in node.links().iter() {
            if !active.contains(target) {
                continue;
            }
            let keep = match connection.relation {
                Relation::MemberOf => false,
                Relation::Contains => true,
                Relation::Peer => activated.node < *target,
            };
            if keep {
                edges.push(ActivatedEdge {
                    from: activated.node.clone(),
                    to: target.clone(),
                    weight: connection.weight,
                    relation: connection.relation,
                });
            }
        }
    }
    edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));
    edges
}

fn collect_engrams(network: &Network, nodes: &[ActivatedNode]) -> Vec<Engram> {
    let mut seen = HashSet::new();
    let mut engrams = Vec::new();
    for activated in nodes {
        for engram in network.engrams_for(&activated.node) {
            if seen.insert(engram.id.as_str()) {
                engrams.push(engram.clone());
            }
        }
    }
    engrams
}
