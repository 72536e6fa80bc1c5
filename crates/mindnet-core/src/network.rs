//! The per-identity graph container.

use crate::engram::Engram;
use crate::error::{MemoryError, Result};
use crate::mindmap::MindmapNode;
use crate::node::{
    clamp_unit, normalize_key, reinforce_value, Connection, Cue, GraphNode, Node, NodeKind,
    NodeRef, Relation, Schema,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Arena of cues and schemas keyed by identity, plus the engrams attached
/// to them. Edges are stored as key pairs inside each node's link table.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    name: String,
    nodes: BTreeMap<NodeRef, Node>,
    engrams: BTreeMap<String, Engram>,
}

/// An edge as seen from its source node.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<'a> {
    pub from: &'a NodeRef,
    pub to: &'a NodeRef,
    pub connection: &'a Connection,
}

impl Network {
    pub fn new(name: &str) -> Result<Self> {
        let name = normalize_key(name)
            .ok_or_else(|| MemoryError::validation("network name", "must not be empty"))?;
        Ok(Self {
            name,
            nodes: BTreeMap::new(),
            engrams: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Lookup ──────────────────────────────────────────────────

    /// Find a node by key. Without a kind, a cue wins over a schema of the
    /// same name.
    pub fn find_node(&self, key: &str, kind: Option<NodeKind>) -> Option<&Node> {
        let key = normalize_key(key)?;
        let kinds: &[NodeKind] = match kind {
            Some(NodeKind::Cue) => &[NodeKind::Cue],
            Some(NodeKind::Schema) => &[NodeKind::Schema],
            None => &[NodeKind::Cue, NodeKind::Schema],
        };
        kinds.iter().find_map(|&kind| {
            self.nodes.get(&NodeRef {
                kind,
                key: key.clone(),
            })
        })
    }

    pub fn node(&self, node: &NodeRef) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn cue(&self, word: &str) -> Option<&Cue> {
        self.find_node(word, Some(NodeKind::Cue)).and_then(Node::as_cue)
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.find_node(name, Some(NodeKind::Schema))
            .and_then(Node::as_schema)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn cues(&self) -> impl Iterator<Item = &Cue> {
        self.nodes.values().filter_map(Node::as_cue)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.nodes.values().filter_map(Node::as_schema)
    }

    /// Every stored edge, including both halves of symmetric links.
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.nodes.iter().flat_map(|(from, node)| {
            node.links().iter().map(move |(to, connection)| Edge {
                from,
                to,
                connection,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn cue_count(&self) -> usize {
        self.cues().count()
    }

    pub fn schema_count(&self) -> usize {
        self.schemas().count()
    }

    /// The `n` best-connected nodes, by degree then key then kind.
    pub fn hubs(&self, n: usize) -> Vec<&Node> {
        let mut ranked: Vec<&Node> = self.nodes.values().collect();
        ranked.sort_by(|a, b| {
            b.degree()
                .cmp(&a.degree())
                .then_with(|| a.key().cmp(b.key()))
                .then_with(|| a.kind().cmp(&b.kind()))
        });
        ranked.truncate(n);
        ranked
    }

    // ── Upsert ──────────────────────────────────────────────────

    /// Return the cue for `word`, creating it at `strength` if absent.
    pub fn upsert_cue(&mut self, word: &str, strength: f64) -> Result<&mut Cue> {
        let node_ref = NodeRef::cue(word)?;
        if !self.nodes.contains_key(&node_ref) {
            let cue = Cue::with_strength(&node_ref.key, strength)?;
            self.nodes.insert(node_ref.clone(), Node::Cue(cue));
        }
        match self.nodes.get_mut(&node_ref) {
            Some(Node::Cue(cue)) => Ok(cue),
            _ => Err(MemoryError::NotFound(node_ref.to_string())),
        }
    }

    /// Return the schema called `name`, creating it if absent.
    pub fn upsert_schema(&mut self, name: &str) -> Result<&mut Schema> {
        let node_ref = NodeRef::schema(name)?;
        if !self.nodes.contains_key(&node_ref) {
            let schema = Schema::new(&node_ref.key)?;
            self.nodes.insert(node_ref.clone(), Node::Schema(schema));
        }
        match self.nodes.get_mut(&node_ref) {
            Some(Node::Schema(schema)) => Ok(schema),
            _ => Err(MemoryError::NotFound(node_ref.to_string())),
        }
    }

    pub(crate) fn node_mut(&mut self, node: &NodeRef) -> Option<&mut Node> {
        self.nodes.get_mut(node)
    }

    // ── Edges ───────────────────────────────────────────────────

    /// Install a symmetric edge: `relation` on `a`, its inverse on `b`.
    pub fn connect(
        &mut self,
        a: &NodeRef,
        b: &NodeRef,
        relation: Relation,
        weight: f64,
    ) -> Result<()> {
        self.require(a)?;
        self.require(b)?;
        if !relation.permits(a, b) {
            return Err(MemoryError::LayerViolation {
                from: a.clone(),
                to: b.clone(),
                relation,
            });
        }
        self.connect_directed(a, b, relation, weight)?;
        self.connect_directed(b, a, relation.inverse(), weight)
    }

    /// Install only the `a → b` half of an edge.
    pub fn connect_directed(
        &mut self,
        a: &NodeRef,
        b: &NodeRef,
        relation: Relation,
        weight: f64,
    ) -> Result<()> {
        self.require(b)?;
        let node = self
            .nodes
            .get_mut(a)
            .ok_or_else(|| MemoryError::NotFound(a.to_string()))?;
        node.connect(b, relation, weight)
    }

    /// Remove both halves of an edge. Returns true if anything was removed.
    pub fn disconnect(&mut self, a: &NodeRef, b: &NodeRef) -> bool {
        let forward = self.nodes.get_mut(a).is_some_and(|n| n.disconnect(b));
        let backward = self.nodes.get_mut(b).is_some_and(|n| n.disconnect(a));
        forward || backward
    }

    /// Strengthen an existing peer link between `a` and `b`, or create it at
    /// `initial`. Returns the resulting weight.
    pub fn reinforce_link(
        &mut self,
        a: &NodeRef,
        b: &NodeRef,
        initial: f64,
        rate: f64,
    ) -> Result<f64> {
        let (weight, relation) = match self.nodes.get(a).and_then(|n| n.links().get(b)) {
            Some(existing) => (reinforce_value(existing.weight, rate), existing.relation),
            None => (clamp_unit(initial), Relation::Peer),
        };
        self.connect(a, b, relation, weight)?;
        Ok(weight)
    }

    /// Make `cue` a member of `schema`, with containment edges both ways.
    pub fn absorb(&mut self, schema: &str, cue: &str, weight: f64) -> Result<()> {
        let schema_ref = NodeRef::schema(schema)?;
        let cue_ref = NodeRef::cue(cue)?;
        self.require(&cue_ref)?;
        match self.nodes.get_mut(&schema_ref) {
            Some(Node::Schema(s)) => {
                s.add_cue(&cue_ref.key)?;
            }
            _ => return Err(MemoryError::NotFound(schema_ref.to_string())),
        }
        self.connect(&schema_ref, &cue_ref, Relation::Contains, weight)
    }

    fn require(&self, node: &NodeRef) -> Result<()> {
        if self.nodes.contains_key(node) {
            Ok(())
        } else {
            Err(MemoryError::NotFound(node.to_string()))
        }
    }

    // ── Engrams ─────────────────────────────────────────────────

    /// Store `engram` and attach it to each of `targets` that exists.
    pub fn attach_engram(&mut self, engram: Engram, targets: &[NodeRef]) -> Result<()> {
        for target in targets {
            self.require(target)?;
        }
        for target in targets {
            if let Some(node) = self.nodes.get_mut(target) {
                let ids = node.engrams_mut();
                if !ids.contains(&engram.id) {
                    ids.push(engram.id.clone());
                }
            }
        }
        debug!(engram = %engram.id, targets = targets.len(), "attached engram");
        self.engrams.insert(engram.id.clone(), engram);
        Ok(())
    }

    pub fn engram(&self, id: &str) -> Option<&Engram> {
        self.engrams.get(id)
    }

    pub fn engrams(&self) -> impl Iterator<Item = &Engram> {
        self.engrams.values()
    }

    pub fn engram_count(&self) -> usize {
        self.engrams.len()
    }

    /// Engrams attached to `node`, in attach order.
    pub fn engrams_for<'a>(&'a self, node: &NodeRef) -> impl Iterator<Item = &'a Engram> + 'a {
        self.nodes
            .get(node)
            .map(|n| n.engram_ids())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.engrams.get(id))
    }

    pub(crate) fn insert_engram(&mut self, engram: Engram) {
        self.engrams.insert(engram.id.clone(), engram);
    }

    // ── Maintenance ─────────────────────────────────────────────

    /// Weaken every edge weight and cue strength by `rate`, never below
    /// `floor`. Nothing is removed.
    pub fn decay(&mut self, rate: f64, floor: f64) {
        let keep = 1.0 - clamp_unit(rate);
        let floor = clamp_unit(floor);
        for node in self.nodes.values_mut() {
            if let Node::Cue(cue) = node {
                cue.strength = (cue.strength * keep).max(floor.min(cue.strength));
            }
            for (_, connection) in node.links_mut().iter_mut() {
                connection.weight = (connection.weight * keep).max(floor.min(connection.weight));
            }
        }
    }

    /// Render the network as a mindmap: schemas under the network name, member
    /// cues under each schema.
    pub fn to_mindmap(&self) -> MindmapNode {
        let mut root = MindmapNode::new(self.name.clone());
        for schema in self.schemas() {
            let mut branch = MindmapNode::new(schema.name());
            for word in schema.cues() {
                branch.children.push(MindmapNode::new(word));
            }
            root.children.push(branch);
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engram::EngramType;

    fn sample() -> Network {
        let mut net = Network::new("tester").unwrap();
        for word in ["bug", "parser", "lexer", "module"] {
            net.upsert_cue(word, 0.5).unwrap();
        }
        net.upsert_schema("fix parser").unwrap();
        net.absorb("fix parser", "bug", 0.8).unwrap();
        net.absorb("fix parser", "parser", 0.8).unwrap();
        let bug = NodeRef::cue("bug").unwrap();
        let parser = NodeRef::cue("parser").unwrap();
        let lexer = NodeRef::cue("lexer").unwrap();
        net.connect(&bug, &parser, Relation::Peer, 0.5).unwrap();
        net.connect(&parser, &lexer, Relation::Peer, 0.5).unwrap();
        net
    }

    #[test]
    fn upsert_never_duplicates() {
        let mut net = Network::new("tester").unwrap();
        net.upsert_cue("Bug", 0.5).unwrap().reinforce(0.2);
        let cue = net.upsert_cue(" bug ", 0.5).unwrap();
        assert!(cue.strength > 0.5);
        assert_eq!(net.cue_count(), 1);
        net.upsert_schema("Fix").unwrap();
        net.upsert_schema("fix").unwrap();
        assert_eq!(net.schema_count(), 1);
        assert!(net.upsert_cue("  ", 0.5).is_err());
    }

    #[test]
    fn find_node_prefers_cue() {
        let mut net = Network::new("tester").unwrap();
        net.upsert_cue("bug", 0.5).unwrap();
        net.upsert_schema("bug").unwrap();
        assert_eq!(net.find_node("BUG", None).unwrap().kind(), NodeKind::Cue);
        assert_eq!(
            net.find_node("bug", Some(NodeKind::Schema)).unwrap().kind(),
            NodeKind::Schema
        );
        assert!(net.find_node("missing", None).is_none());
        assert!(net.find_node("", None).is_none());
    }

    #[test]
    fn connect_is_symmetric_with_inverse_relation() {
        let net = sample();
        let schema = NodeRef::schema("fix parser").unwrap();
        let bug = NodeRef::cue("bug").unwrap();
        let s = net.node(&schema).unwrap();
        assert_eq!(s.links().get(&bug).unwrap().relation, Relation::Contains);
        let c = net.node(&bug).unwrap();
        assert_eq!(c.links().get(&schema).unwrap().relation, Relation::MemberOf);
        assert!(net.schema("fix parser").unwrap().has_cue("bug"));
    }

    #[test]
    fn connect_enforces_layer_dominance() {
        let mut net = sample();
        let schema = NodeRef::schema("fix parser").unwrap();
        let lexer = NodeRef::cue("lexer").unwrap();
        let err = net.connect(&lexer, &schema, Relation::Contains, 1.0).unwrap_err();
        assert!(matches!(err, MemoryError::LayerViolation { .. }));
        assert!(net.node(&lexer).unwrap().links().get(&schema).is_none());
        let missing = NodeRef::cue("ghost").unwrap();
        assert!(matches!(
            net.connect(&lexer, &missing, Relation::Peer, 1.0),
            Err(MemoryError::NotFound(_))
        ));
    }

    #[test]
    fn disconnect_removes_both_halves() {
        let mut net = sample();
        let bug = NodeRef::cue("bug").unwrap();
        let parser = NodeRef::cue("parser").unwrap();
        assert!(net.disconnect(&bug, &parser));
        assert!(net.node(&parser).unwrap().links().get(&bug).is_none());
        assert!(!net.disconnect(&bug, &parser));
    }

    #[test]
    fn reinforce_link_grows_weight() {
        let mut net = sample();
        let bug = NodeRef::cue("bug").unwrap();
        let parser = NodeRef::cue("parser").unwrap();
        let w = net.reinforce_link(&bug, &parser, 0.5, 0.2).unwrap();
        assert!((w - 0.6).abs() < 1e-9);
        let module = NodeRef::cue("module").unwrap();
        let fresh = net.reinforce_link(&bug, &module, 0.5, 0.2).unwrap();
        assert_eq!(fresh, 0.5);
        assert_eq!(
            net.node(&module).unwrap().links().get(&bug).unwrap().weight,
            0.5
        );
    }

    #[test]
    fn hubs_are_ranked_by_degree_then_key() {
        let net = sample();
        let hubs: Vec<String> = net.hubs(3).iter().map(|n| n.node_ref().to_string()).collect();
        // parser: bug, lexer, schema = 3; bug: parser, schema = 2; fix parser: 2
        assert_eq!(hubs, vec!["cue:parser", "cue:bug", "schema:fix parser"]);
        assert_eq!(net.hubs(100).len(), net.len());
    }

    #[test]
    fn engrams_are_attached_and_listed() {
        let mut net = sample();
        let engram = Engram::new("Fixed bug in parser", "", EngramType::Atomic);
        let id = engram.id.clone();
        let schema = NodeRef::schema("fix parser").unwrap();
        net.attach_engram(engram, &[schema.clone()]).unwrap();
        let attached: Vec<&str> = net.engrams_for(&schema).map(|e| e.id.as_str()).collect();
        assert_eq!(attached, vec![id.as_str()]);
        assert_eq!(net.engram_count(), 1);
        let ghost = NodeRef::schema("ghost").unwrap();
        assert_eq!(net.engrams_for(&ghost).count(), 0);
    }

    #[test]
    fn decay_weakens_without_removing() {
        let mut net = sample();
        let before = net.len();
        net.decay(0.5, 0.1);
        assert_eq!(net.len(), before);
        assert_eq!(net.cue("bug").unwrap().strength, 0.25);
        let bug = NodeRef::cue("bug").unwrap();
        let parser = NodeRef::cue("parser").unwrap();
        assert_eq!(net.node(&bug).unwrap().links().get(&parser).unwrap().weight, 0.25);
        net.decay(0.9, 0.1);
        assert_eq!(net.cue("bug").unwrap().strength, 0.1);
    }

    #[test]
    fn mindmap_export_lists_schemas_and_members() {
        let net = sample();
        let tree = net.to_mindmap();
        assert_eq!(tree.name, "tester");
        assert_eq!(tree.names(), vec!["tester", "fix parser", "bug", "parser"]);
    }
}
