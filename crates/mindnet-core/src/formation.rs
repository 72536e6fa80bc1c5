//! Remembering: admit an engram, then fold it into the network.

use crate::config::FormationConfig;
use crate::engram::Engram;
use crate::error::{MemoryError, ParseError, Result};
use crate::mindmap::{self, MindmapNode};
use crate::network::Network;
use crate::node::{normalize_key, NodeRef};
use crate::tokenize::{merge_terms, significant_terms};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// Number of content terms used to name a schema when the engram has no
/// mindmap of its own.
const CONTENT_NAME_TERMS: usize = 3;

// ── Contracts ───────────────────────────────────────────────────

/// Decides whether an engram is worth consolidating.
pub trait Evaluator {
    fn evaluate(&self, engram: &Engram, network: &Network) -> Verdict;
}

/// Folds an admitted engram into a network.
pub trait Consolidator {
    fn consolidate(&self, engram: Engram, network: &mut Network) -> Result<Consolidation>;
}

/// Why an engram was turned away. Rejection is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Blank,
    TooFewTerms { found: usize, required: usize },
    Duplicate { schema: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Blank => f.write_str("content is blank"),
            Rejection::TooFewTerms { found, required } => {
                write!(f, "{found} significant terms, {required} required")
            }
            Rejection::Duplicate { schema } => {
                write!(f, "already remembered under `{schema}`")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admit)
    }
}

/// What a consolidation changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    pub engram_id: String,
    pub schema_name: String,
    /// Every cue the engram resolved to, in first-occurrence order.
    pub terms: Vec<String>,
    pub created_cues: usize,
    /// Schemas newly linked or reinforced by term overlap, with the overlap.
    pub linked_schemas: Vec<(String, f64)>,
}

/// Caller-facing result of a remember call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationOutcome {
    pub consolidated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(skip)]
    pub rejection: Option<Rejection>,
}

impl FormationOutcome {
    fn consolidated(schema_name: String) -> Self {
        Self {
            consolidated: true,
            schema_name: Some(schema_name),
            rejection: None,
        }
    }

    fn rejected(rejection: Rejection) -> Self {
        Self {
            consolidated: false,
            schema_name: None,
            rejection: Some(rejection),
        }
    }
}

// ── Engram reading ──────────────────────────────────────────────

/// The engram's mindmap, or `None` when its schema text is blank.
fn read_tree(engram: &Engram) -> std::result::Result<Option<MindmapNode>, ParseError> {
    if engram.schema.trim().is_empty() {
        return Ok(None);
    }
    mindmap::parse(&engram.schema).map(Some)
}

/// Significant terms of the content followed by those of every mindmap node.
fn engram_terms(engram: &Engram, tree: Option<&MindmapNode>) -> Vec<String> {
    let mut lists = vec![significant_terms(&engram.content)];
    if let Some(tree) = tree {
        lists.extend(tree.names().into_iter().map(significant_terms));
    }
    merge_terms(lists)
}

/// Name of the schema an engram consolidates into: its mindmap root, or the
/// leading content terms when it has no mindmap.
pub fn schema_name_for(tree: Option<&MindmapNode>, content_terms: &[String]) -> Option<String> {
    match tree {
        Some(tree) => normalize_key(&tree.name),
        None => normalize_key(
            &content_terms
                .iter()
                .take(CONTENT_NAME_TERMS)
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
        ),
    }
}

// ── Evaluator ───────────────────────────────────────────────────

/// Rejects blank engrams, engrams with too few significant terms, and
/// engrams whose content is already attached to their target schema.
#[derive(Debug, Clone)]
pub struct NoveltyEvaluator {
    min_significant_terms: usize,
}

impl NoveltyEvaluator {
    pub fn new(min_significant_terms: usize) -> Self {
        Self {
            min_significant_terms,
        }
    }
}

impl Default for NoveltyEvaluator {
    fn default() -> Self {
        Self::new(FormationConfig::default().min_significant_terms)
    }
}

impl Evaluator for NoveltyEvaluator {
    fn evaluate(&self, engram: &Engram, network: &Network) -> Verdict {
        if engram.is_blank() {
            return Verdict::Reject(Rejection::Blank);
        }
        // A malformed mindmap is admitted here and fails consolidation.
        let Ok(tree) = read_tree(engram) else {
            return Verdict::Admit;
        };
        let terms = engram_terms(engram, tree.as_ref());
        if terms.len() < self.min_significant_terms {
            return Verdict::Reject(Rejection::TooFewTerms {
                found: terms.len(),
                required: self.min_significant_terms,
            });
        }
        let content_terms = significant_terms(&engram.content);
        let Some(name) = schema_name_for(tree.as_ref(), &content_terms) else {
            return Verdict::Admit;
        };
        let Ok(target) = NodeRef::schema(&name) else {
            return Verdict::Admit;
        };
        if network
            .engrams_for(&target)
            .any(|existing| existing.digest == engram.digest)
        {
            return Verdict::Reject(Rejection::Duplicate { schema: name });
        }
        Verdict::Admit
    }
}

// ── Consolidator ────────────────────────────────────────────────

/// Consolidates by term: every significant term becomes (or reinforces) a
/// cue, the cues join one schema, mindmap structure becomes cue links, and
/// schemas sharing enough terms are linked to each other.
#[derive(Debug, Clone, Default)]
pub struct OverlapConsolidator {
    config: FormationConfig,
}

impl OverlapConsolidator {
    pub fn new(config: FormationConfig) -> Self {
        Self { config }
    }

    fn resolve_cues(&self, network: &mut Network, terms: &[String]) -> Result<usize> {
        let mut created = 0;
        for term in terms {
            if network.cue(term).is_some() {
                network
                    .upsert_cue(term, self.config.initial_strength)?
                    .reinforce(self.config.reinforcement_rate);
            } else {
                network.upsert_cue(term, self.config.initial_strength)?;
                created += 1;
            }
        }
        Ok(created)
    }

    fn link_structure(&self, network: &mut Network, tree: &MindmapNode) -> Result<()> {
        let mut pairs = BTreeSet::new();
        for (parent, child) in tree.edges() {
            for from in significant_terms(parent) {
                for to in significant_terms(child) {
                    if from == to {
                        continue;
                    }
                    let pair = if from < to {
                        (from.clone(), to)
                    } else {
                        (to, from.clone())
                    };
                    pairs.insert(pair);
                }
            }
        }
        for (a, b) in pairs {
            network.reinforce_link(
                &NodeRef::cue(&a)?,
                &NodeRef::cue(&b)?,
                self.config.link_weight,
                self.config.link_reinforcement,
            )?;
        }
        Ok(())
    }

    fn link_overlapping(&self, network: &mut Network, name: &str) -> Result<Vec<(String, f64)>> {
        let Some(target) = network.schema(name) else {
            return Err(MemoryError::NotFound(format!("schema:{name}")));
        };
        let members: BTreeSet<&str> = target.cues().collect();
        let overlapping: Vec<(String, f64)> = network
            .schemas()
            .filter(|other| other.name() != name)
            .filter_map(|other| {
                let shared = other.cues().filter(|c| members.contains(c)).count();
                let smaller = members.len().min(other.cue_count());
                if shared == 0 || smaller == 0 {
                    return None;
                }
                let overlap = shared as f64 / smaller as f64;
                (overlap >= self.config.overlap_threshold)
                    .then(|| (other.name().to_string(), overlap))
            })
            .collect();

        let from = NodeRef::schema(name)?;
        for (other, overlap) in &overlapping {
            network.reinforce_link(
                &from,
                &NodeRef::schema(other)?,
                *overlap,
                self.config.link_reinforcement,
            )?;
        }
        Ok(overlapping)
    }

    /// Where the engram is attached: its schema, plus the first term of the
    /// mindmap root (or of the whole engram) when enabled.
    fn attach_targets(
        &self,
        network: &Network,
        name: &str,
        tree: Option<&MindmapNode>,
        terms: &[String],
    ) -> Result<Vec<NodeRef>> {
        let mut targets = vec![NodeRef::schema(name)?];
        if self.config.attach_to_salient_cue {
            let salient = tree
                .and_then(|t| significant_terms(&t.name).into_iter().next())
                .or_else(|| terms.first().cloned());
            if let Some(word) = salient.filter(|w| network.cue(w).is_some()) {
                targets.push(NodeRef::cue(&word)?);
            }
        }
        Ok(targets)
    }
}

impl Consolidator for OverlapConsolidator {
    fn consolidate(&self, engram: Engram, network: &mut Network) -> Result<Consolidation> {
        let tree = read_tree(&engram).map_err(MemoryError::ConsolidateFailed)?;
        let terms = engram_terms(&engram, tree.as_ref());
        let content_terms = significant_terms(&engram.content);
        let name = schema_name_for(tree.as_ref(), &content_terms)
            .ok_or_else(|| MemoryError::validation("engram", "no significant terms"))?;

        let created_cues = self.resolve_cues(network, &terms)?;

        network.upsert_schema(&name)?;
        for term in &terms {
            network.absorb(&name, term, self.config.membership_weight)?;
        }

        if let Some(tree) = tree.as_ref() {
            self.link_structure(network, tree)?;
        }
        let linked_schemas = self.link_overlapping(network, &name)?;

        let targets = self.attach_targets(network, &name, tree.as_ref(), &terms)?;
        let engram_id = engram.id.clone();
        network.attach_engram(engram, &targets)?;

        info!(
            network = network.name(),
            schema = %name,
            terms = terms.len(),
            created_cues,
            linked = linked_schemas.len(),
            "consolidated engram"
        );

        Ok(Consolidation {
            engram_id,
            schema_name: name,
            terms,
            created_cues,
            linked_schemas,
        })
    }
}

// ── Pipeline ────────────────────────────────────────────────────

/// Evaluator followed by consolidator.
#[derive(Debug, Clone)]
pub struct Formation<E = NoveltyEvaluator, C = OverlapConsolidator> {
    evaluator: E,
    consolidator: C,
}

impl Formation {
    pub fn new(config: FormationConfig) -> Self {
        Self {
            evaluator: NoveltyEvaluator::new(config.min_significant_terms),
            consolidator: OverlapConsolidator::new(config),
        }
    }
}

impl Default for Formation {
    fn default() -> Self {
        Self::new(FormationConfig::default())
    }
}

impl<E: Evaluator, C: Consolidator> Formation<E, C> {
    pub fn with_parts(evaluator: E, consolidator: C) -> Self {
        Self {
            evaluator,
            consolidator,
        }
    }

    /// Evaluate `engram` and consolidate it if admitted. The network is left
    /// untouched on rejection.
    pub fn remember(&self, engram: Engram, network: &mut Network) -> Result<FormationOutcome> {
        match self.evaluator.evaluate(&engram, network) {
            Verdict::Admit => {
                let consolidation = self.consolidator.consolidate(engram, network)?;
                Ok(FormationOutcome::consolidated(consolidation.schema_name))
            }
            Verdict::Reject(rejection) => {
                debug!(network = network.name(), %rejection, "engram rejected");
                Ok(FormationOutcome::rejected(rejection))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engram::EngramType;
    use crate::error::ErrorKind;
    use crate::mindmap::keywords_mindmap;
    use crate::node::{GraphNode, Relation};

    fn engram(content: &str, keywords: &[&str]) -> Engram {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
        Engram::new(content, keywords_mindmap(&keywords), EngramType::Atomic)
    }

    fn remember(net: &mut Network, content: &str, keywords: &[&str]) -> FormationOutcome {
        Formation::default().remember(engram(content, keywords), net).unwrap()
    }

    #[test]
    fn remember_builds_cues_schema_and_links() {
        let mut net = Network::new("tester").unwrap();
        let outcome = remember(&mut net, "Fixed bug in parser module", &["bug", "parser"]);
        assert!(outcome.consolidated);
        assert_eq!(outcome.schema_name.as_deref(), Some("bug parser"));

        let schema = net.schema("bug parser").unwrap();
        let members: Vec<&str> = schema.cues().collect();
        assert_eq!(members, vec!["bug", "fixed", "module", "parser"]);

        let bug = NodeRef::cue("bug").unwrap();
        let parser = NodeRef::cue("parser").unwrap();
        let link = net.node(&bug).unwrap().links().get(&parser).unwrap();
        assert_eq!(link.relation, Relation::Peer);
        assert_eq!(link.weight, 0.5);

        // attached to the schema and to the salient cue
        assert_eq!(net.engrams_for(&NodeRef::schema("bug parser").unwrap()).count(), 1);
        assert_eq!(net.engrams_for(&bug).count(), 1);
        assert_eq!(net.engram_count(), 1);
    }

    #[test]
    fn repeated_terms_reinforce_without_duplicating() {
        let mut net = Network::new("tester").unwrap();
        remember(&mut net, "Fixed bug in parser module", &["bug", "parser"]);
        let before = net.cue("bug").unwrap().strength;
        let cues_before = net.cue_count();
        remember(&mut net, "Another bug report", &["bug"]);
        let after = net.cue("bug").unwrap().strength;
        assert!(after > before);
        assert_eq!(net.cue_count(), cues_before + 2); // another, report
        assert_eq!(net.cues().filter(|c| c.word() == "bug").count(), 1);
    }

    #[test]
    fn blank_and_duplicate_engrams_are_rejected_silently() {
        let mut net = Network::new("tester").unwrap();
        let outcome = remember(&mut net, "   ", &["bug"]);
        assert!(!outcome.consolidated);
        assert_eq!(outcome.rejection, Some(Rejection::Blank));
        assert!(net.is_empty());

        remember(&mut net, "Fixed bug in parser module", &["bug", "parser"]);
        let snapshot = net.clone();
        let again = remember(&mut net, "fixed  BUG in parser module", &["bug", "parser"]);
        assert!(!again.consolidated);
        assert!(matches!(again.rejection, Some(Rejection::Duplicate { .. })));
        assert_eq!(net, snapshot);

        // same content under a different schema is new
        assert!(remember(&mut net, "Fixed bug in parser module", &["regression"]).consolidated);
    }

    #[test]
    fn stopword_only_content_is_rejected() {
        let mut net = Network::new("tester").unwrap();
        let outcome = remember(&mut net, "it is what it is", &[]);
        assert_eq!(
            outcome.rejection,
            Some(Rejection::TooFewTerms {
                found: 0,
                required: 1
            })
        );
    }

    #[test]
    fn malformed_schema_fails_consolidation() {
        let mut net = Network::new("tester").unwrap();
        let bad = Engram::new("Fixed bug", "mindmap\n  root\n  second root", EngramType::Atomic);
        let err = Formation::default().remember(bad, &mut net).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConsolidateFailed);
        assert!(err.fragment().is_some());
        assert!(net.is_empty());
    }

    #[test]
    fn blank_schema_is_named_from_content() {
        let mut net = Network::new("tester").unwrap();
        let outcome = remember(&mut net, "The lexer drops unicode escapes silently", &[]);
        assert_eq!(outcome.schema_name.as_deref(), Some("lexer drops unicode"));
        let lexer = NodeRef::cue("lexer").unwrap();
        assert_eq!(net.engrams_for(&lexer).count(), 1);
    }

    #[test]
    fn overlapping_schemas_are_linked() {
        let mut net = Network::new("tester").unwrap();
        remember(&mut net, "Fixed bug in parser module", &["bug", "parser"]);
        remember(&mut net, "Parser crashed on unicode input", &["parser", "unicode"]);
        let first = NodeRef::schema("bug parser").unwrap();
        let second = NodeRef::schema("parser unicode").unwrap();
        // one shared term out of four
        assert!(net.node(&first).unwrap().links().get(&second).is_none());

        remember(&mut net, "Lexer bug in parser", &["bug", "lexer"]);
        let third = NodeRef::schema("bug lexer").unwrap();
        let link = net.node(&third).unwrap().links().get(&first).unwrap();
        assert_eq!(link.relation, Relation::Peer);
        assert!((link.weight - 2.0 / 3.0).abs() < 1e-9);
        assert!(net.node(&first).unwrap().links().get(&third).is_some());
    }

    #[test]
    fn membership_edges_point_both_ways() {
        let mut net = Network::new("tester").unwrap();
        remember(&mut net, "Fixed bug", &["bug"]);
        let schema = net.find_node("bug", Some(crate::node::NodeKind::Schema)).unwrap();
        let bug = NodeRef::cue("bug").unwrap();
        assert_eq!(schema.links().get(&bug).unwrap().relation, Relation::Contains);
        let cue = net.node(&bug).unwrap();
        assert_eq!(
            cue.links().get(&schema.node_ref()).unwrap().relation,
            Relation::MemberOf
        );
    }

    struct AdmitAll;

    impl Evaluator for AdmitAll {
        fn evaluate(&self, _: &Engram, _: &Network) -> Verdict {
            Verdict::Admit
        }
    }

    #[test]
    fn custom_evaluator_plugs_into_pipeline() {
        let mut net = Network::new("tester").unwrap();
        let formation = Formation::with_parts(AdmitAll, OverlapConsolidator::default());
        formation.remember(engram("Fixed bug", &["bug"]), &mut net).unwrap();
        let again = formation.remember(engram("Fixed bug", &["bug"]), &mut net).unwrap();
        assert!(again.consolidated);
        assert_eq!(net.engram_count(), 2);
    }
}
