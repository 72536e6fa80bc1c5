//! Tunable parameters for recall and consolidation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CognitionConfig {
    #[serde(default)]
    pub activation: ActivationConfig,
    #[serde(default)]
    pub formation: FormationConfig,
}

/// Spreading activation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ActivationConfig {
    /// Multiplier applied on every hop (0.0–1.0).
    #[serde(default = "default_decay_per_hop")]
    pub decay_per_hop: f64,
    /// Maximum number of hops from any seed.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    /// Number of hub nodes used as seeds when no query is given.
    #[serde(default = "default_hub_seeds")]
    pub hub_seeds: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            decay_per_hop: default_decay_per_hop(),
            max_hops: default_max_hops(),
            hub_seeds: default_hub_seeds(),
        }
    }
}

/// Consolidation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FormationConfig {
    /// Strength given to a newly created cue.
    #[serde(default = "default_initial_strength")]
    pub initial_strength: f64,
    /// Fraction of the remaining headroom added to a reinforced cue.
    #[serde(default = "default_reinforcement_rate")]
    pub reinforcement_rate: f64,
    /// Weight of a newly created associative link.
    #[serde(default = "default_link_weight")]
    pub link_weight: f64,
    /// Fraction of the remaining headroom added to a reused link.
    #[serde(default = "default_link_reinforcement")]
    pub link_reinforcement: f64,
    /// Weight of schema membership edges.
    #[serde(default = "default_membership_weight")]
    pub membership_weight: f64,
    /// Minimum share of terms two schemas must have in common to be linked.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
    /// Engrams with fewer significant terms are rejected.
    #[serde(default = "default_min_significant_terms")]
    pub min_significant_terms: usize,
    /// Also attach each engram to the first cue of its schema root.
    #[serde(default = "default_true")]
    pub attach_to_salient_cue: bool,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            initial_strength: default_initial_strength(),
            reinforcement_rate: default_reinforcement_rate(),
            link_weight: default_link_weight(),
            link_reinforcement: default_link_reinforcement(),
            membership_weight: default_membership_weight(),
            overlap_threshold: default_overlap_threshold(),
            min_significant_terms: default_min_significant_terms(),
            attach_to_salient_cue: true,
        }
    }
}

fn default_decay_per_hop() -> f64 {
    0.8
}
fn default_max_hops() -> usize {
    4
}
fn default_hub_seeds() -> usize {
    5
}
fn default_initial_strength() -> f64 {
    0.5
}
fn default_reinforcement_rate() -> f64 {
    0.2
}
fn default_link_weight() -> f64 {
    0.5
}
fn default_link_reinforcement() -> f64 {
    0.2
}
fn default_membership_weight() -> f64 {
    0.8
}
fn default_overlap_threshold() -> f64 {
    0.3
}
fn default_min_significant_terms() -> usize {
    1
}
fn default_true() -> bool {
    true
}
