//! Associative memory network engine for mindnet.
//!
//! Each identity owns one [`Network`] of word-level cues and event-level
//! schemas. Observations are folded in by the formation pipeline
//! (`remember`), and spreading activation pulls the related subgraph back
//! out (`recall`). Networks persist as one MessagePack file per identity.

pub mod activation;
pub mod config;
pub mod context;
pub mod engram;
pub mod error;
pub mod formation;
pub mod mindmap;
pub mod network;
pub mod node;
pub mod store;
pub mod tokenize;

pub use activation::{ActivatedEdge, ActivatedGraph, ActivatedNode, ActivationEngine, Mode, Query, Recall};
pub use config::{ActivationConfig, CognitionConfig, FormationConfig};
pub use context::{Cognition, IdentityContext};
pub use engram::{Engram, EngramType};
pub use error::{ErrorKind, MemoryError, ParseError, Result};
pub use formation::{
    Consolidation, Consolidator, Evaluator, Formation, FormationOutcome, NoveltyEvaluator,
    OverlapConsolidator, Rejection, Verdict,
};
pub use mindmap::{MindmapNode, SerializeOptions, ValidationReport};
pub use network::{Edge, Network};
pub use node::{Connection, Cue, GraphNode, Node, NodeKind, NodeRef, Relation, Schema};
pub use store::{Loaded, NetworkStore};
