//! Graph nodes: word-level cues and event-level schemas.
//!
//! Nodes never point at each other directly. Every edge is stored as the
//! target's [`NodeRef`] inside the source node's link table, and the nodes
//! themselves live in the [`Network`](crate::network::Network) arena.

use crate::error::{MemoryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Normalize a cue word or schema name: trimmed, lowercased, with internal
/// whitespace runs collapsed to a single space.
pub fn normalize_key(raw: &str) -> Option<String> {
    let key = raw
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn require_key(raw: &str, what: &'static str) -> Result<String> {
    normalize_key(raw).ok_or_else(|| MemoryError::validation(what, "must not be empty"))
}

/// Node variant. The declaration order is also the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Cue,
    Schema,
}

impl NodeKind {
    /// Layer rank used for dominance checks (cue = 1, schema = 2).
    pub fn layer(self) -> u8 {
        match self {
            NodeKind::Cue => 1,
            NodeKind::Schema => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Cue => "cue",
            NodeKind::Schema => "schema",
        }
    }
}

/// Identity of a node within one network: its kind plus normalized key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeRef {
    pub fn cue(word: &str) -> Result<Self> {
        Ok(Self {
            kind: NodeKind::Cue,
            key: require_key(word, "cue word")?,
        })
    }

    pub fn schema(name: &str) -> Result<Self> {
        Ok(Self {
            kind: NodeKind::Schema,
            key: require_key(name, "schema name")?,
        })
    }

    pub fn layer(&self) -> u8 {
        self.kind.layer()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

/// How the source of an edge relates to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Associative link between any two nodes.
    Peer,
    /// A schema owning one of its member cues.
    Contains,
    /// The back-edge of [`Relation::Contains`].
    MemberOf,
}

impl Relation {
    /// The relation seen from the other end of the edge.
    pub fn inverse(self) -> Self {
        match self {
            Relation::Peer => Relation::Peer,
            Relation::Contains => Relation::MemberOf,
            Relation::MemberOf => Relation::Contains,
        }
    }

    /// Check layer dominance: only a higher layer may own a lower one.
    pub fn permits(self, from: &NodeRef, to: &NodeRef) -> bool {
        if from == to {
            return false;
        }
        match self {
            Relation::Peer => true,
            Relation::Contains => from.layer() > to.layer(),
            Relation::MemberOf => from.layer() < to.layer(),
        }
    }
}

/// One outgoing edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub weight: f64,
    pub relation: Relation,
}

/// Outgoing edge table shared by both node kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Links {
    edges: BTreeMap<NodeRef, Connection>,
}

impl Links {
    fn attach(
        &mut self,
        owner: &NodeRef,
        target: &NodeRef,
        relation: Relation,
        weight: f64,
    ) -> Result<()> {
        if !relation.permits(owner, target) {
            return Err(MemoryError::LayerViolation {
                from: owner.clone(),
                to: target.clone(),
                relation,
            });
        }
        self.edges.insert(
            target.clone(),
            Connection {
                weight: clamp_unit(weight),
                relation,
            },
        );
        Ok(())
    }

    fn detach(&mut self, target: &NodeRef) -> bool {
        self.edges.remove(target).is_some()
    }

    pub fn get(&self, target: &NodeRef) -> Option<&Connection> {
        self.edges.get(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeRef, &Connection)> {
        self.edges.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeRef, &mut Connection)> {
        self.edges.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Capabilities shared by every graph node.
///
/// `connect` and `disconnect` only touch this node's side of the edge; the
/// network installs the mirrored side for symmetric links.
pub trait GraphNode {
    fn kind(&self) -> NodeKind;
    fn key(&self) -> &str;
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;

    fn layer(&self) -> u8 {
        self.kind().layer()
    }

    fn node_ref(&self) -> NodeRef {
        NodeRef {
            kind: self.kind(),
            key: self.key().to_string(),
        }
    }

    fn connect(&mut self, target: &NodeRef, relation: Relation, weight: f64) -> Result<()> {
        let owner = self.node_ref();
        self.links_mut().attach(&owner, target, relation, weight)
    }

    fn disconnect(&mut self, target: &NodeRef) -> bool {
        self.links_mut().detach(target)
    }

    fn equals(&self, other: &dyn GraphNode) -> bool {
        self.kind() == other.kind() && self.key() == other.key()
    }

    fn degree(&self) -> usize {
        self.links().len()
    }
}

/// A single word.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    word: String,
    pub strength: f64,
    links: Links,
    pub(crate) engrams: Vec<String>,
}

impl Cue {
    pub const DEFAULT_STRENGTH: f64 = 0.5;

    pub fn new(word: &str) -> Result<Self> {
        Ok(Self {
            word: require_key(word, "cue word")?,
            strength: Self::DEFAULT_STRENGTH,
            links: Links::default(),
            engrams: Vec::new(),
        })
    }

    pub fn with_strength(word: &str, strength: f64) -> Result<Self> {
        let mut cue = Self::new(word)?;
        cue.strength = clamp_unit(strength);
        Ok(cue)
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    /// Move strength toward 1.0 by `rate` of the remaining headroom.
    pub fn reinforce(&mut self, rate: f64) -> f64 {
        self.strength = reinforce_value(self.strength, rate);
        self.strength
    }

    /// Ids of engrams attached to this cue, in attach order.
    pub fn engram_ids(&self) -> &[String] {
        &self.engrams
    }
}

impl GraphNode for Cue {
    fn kind(&self) -> NodeKind {
        NodeKind::Cue
    }
    fn key(&self) -> &str {
        &self.word
    }
    fn links(&self) -> &Links {
        &self.links
    }
    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

/// A named cluster of cues representing one event or concept.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    cues: BTreeSet<String>,
    links: Links,
    pub(crate) engrams: Vec<String>,
}

impl Schema {
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: require_key(name, "schema name")?,
            cues: BTreeSet::new(),
            links: Links::default(),
            engrams: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record `word` as a member. Returns false if it already was one.
    pub fn add_cue(&mut self, word: &str) -> Result<bool> {
        Ok(self.cues.insert(require_key(word, "cue word")?))
    }

    pub fn remove_cue(&mut self, word: &str) -> bool {
        normalize_key(word).is_some_and(|key| self.cues.remove(&key))
    }

    pub fn has_cue(&self, word: &str) -> bool {
        normalize_key(word).is_some_and(|key| self.cues.contains(&key))
    }

    /// Member words in lexical order.
    pub fn cues(&self) -> impl Iterator<Item = &str> {
        self.cues.iter().map(String::as_str)
    }

    pub fn cue_count(&self) -> usize {
        self.cues.len()
    }

    /// Edges to anything that is not a member cue.
    pub fn external_connections(&self) -> impl Iterator<Item = (&NodeRef, &Connection)> {
        self.links
            .iter()
            .filter(|(_, conn)| conn.relation != Relation::Contains)
    }

    pub fn engram_ids(&self) -> &[String] {
        &self.engrams
    }
}

impl GraphNode for Schema {
    fn kind(&self) -> NodeKind {
        NodeKind::Schema
    }
    fn key(&self) -> &str {
        &self.name
    }
    fn links(&self) -> &Links {
        &self.links
    }
    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

/// A node stored in the network arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Cue(Cue),
    Schema(Schema),
}

impl Node {
    pub fn as_cue(&self) -> Option<&Cue> {
        match self {
            Node::Cue(cue) => Some(cue),
            Node::Schema(_) => None,
        }
    }

    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            Node::Schema(schema) => Some(schema),
            Node::Cue(_) => None,
        }
    }

    pub fn engram_ids(&self) -> &[String] {
        match self {
            Node::Cue(cue) => &cue.engrams,
            Node::Schema(schema) => &schema.engrams,
        }
    }

    pub(crate) fn engrams_mut(&mut self) -> &mut Vec<String> {
        match self {
            Node::Cue(cue) => &mut cue.engrams,
            Node::Schema(schema) => &mut schema.engrams,
        }
    }
}

impl GraphNode for Node {
    fn kind(&self) -> NodeKind {
        match self {
            Node::Cue(_) => NodeKind::Cue,
            Node::Schema(_) => NodeKind::Schema,
        }
    }
    fn key(&self) -> &str {
        match self {
            Node::Cue(cue) => cue.key(),
            Node::Schema(schema) => schema.key(),
        }
    }
    fn links(&self) -> &Links {
        match self {
            Node::Cue(cue) => cue.links(),
            Node::Schema(schema) => schema.links(),
        }
    }
    fn links_mut(&mut self) -> &mut Links {
        match self {
            Node::Cue(cue) => cue.links_mut(),
            Node::Schema(schema) => schema.links_mut(),
        }
    }
}

pub(crate) fn reinforce_value(current: f64, rate: f64) -> f64 {
    let current = clamp_unit(current);
    clamp_unit(current + clamp_unit(rate) * (1.0 - current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_trimmed_and_lowercased() {
        let cue = Cue::new("  Parser ").unwrap();
        assert_eq!(cue.word(), "parser");
        let schema = Schema::new("Bug   Parser").unwrap();
        assert_eq!(schema.name(), "bug parser");
    }

    #[test]
    fn empty_keys_are_rejected() {
        assert!(matches!(Cue::new("   "), Err(MemoryError::Validation { .. })));
        assert!(matches!(Schema::new(""), Err(MemoryError::Validation { .. })));
    }

    #[test]
    fn equality_is_identity_based() {
        let a = Cue::with_strength("Bug", 0.9).unwrap();
        let b = Cue::new("bug").unwrap();
        assert!(a.equals(&b));
        let s = Schema::new("bug").unwrap();
        assert!(!a.equals(&s));
    }

    #[test]
    fn cue_cannot_own_schema() {
        let mut cue = Cue::new("bug").unwrap();
        let schema = NodeRef::schema("fix").unwrap();
        let err = cue.connect(&schema, Relation::Contains, 1.0).unwrap_err();
        assert!(matches!(err, MemoryError::LayerViolation { .. }));
        assert!(cue.connect(&schema, Relation::MemberOf, 1.0).is_ok());
        assert_eq!(cue.degree(), 1);
    }

    #[test]
    fn schema_owns_cue_but_not_schema() {
        let mut schema = Schema::new("fix").unwrap();
        let cue = NodeRef::cue("bug").unwrap();
        let other = NodeRef::schema("release").unwrap();
        assert!(schema.connect(&cue, Relation::Contains, 0.8).is_ok());
        assert!(schema.connect(&other, Relation::Contains, 0.8).is_err());
        assert!(schema.connect(&other, Relation::Peer, 0.4).is_ok());
        assert_eq!(schema.external_connections().count(), 1);
    }

    #[test]
    fn self_links_are_rejected() {
        let mut cue = Cue::new("bug").unwrap();
        let me = cue.node_ref();
        assert!(cue.connect(&me, Relation::Peer, 0.5).is_err());
    }

    #[test]
    fn disconnect_removes_edge() {
        let mut cue = Cue::new("bug").unwrap();
        let other = NodeRef::cue("parser").unwrap();
        cue.connect(&other, Relation::Peer, 2.0).unwrap();
        assert_eq!(cue.links().get(&other).unwrap().weight, 1.0);
        assert!(cue.disconnect(&other));
        assert!(!cue.disconnect(&other));
    }

    #[test]
    fn schema_membership() {
        let mut schema = Schema::new("fix").unwrap();
        assert!(schema.add_cue("Bug").unwrap());
        assert!(!schema.add_cue("bug").unwrap());
        assert!(schema.has_cue("BUG"));
        assert_eq!(schema.cues().collect::<Vec<_>>(), vec!["bug"]);
        assert!(schema.remove_cue("bug"));
        assert!(!schema.has_cue("bug"));
    }

    #[test]
    fn reinforcement_is_bounded() {
        let mut cue = Cue::new("bug").unwrap();
        let before = cue.strength;
        let after = cue.reinforce(0.2);
        assert!(after > before);
        for _ in 0..500 {
            cue.reinforce(0.5);
        }
        assert!(cue.strength <= 1.0);
    }
}
