//! Per-identity working state.
//!
//! There is no process-wide memory instance. A caller opens an
//! [`IdentityContext`] for one identity, runs recall and formation against
//! it with a shared [`Cognition`], and saves it back through the store.

use crate::activation::{ActivationEngine, Mode, Query, Recall};
use crate::config::CognitionConfig;
use crate::engram::Engram;
use crate::error::Result;
use crate::formation::{Formation, FormationOutcome};
use crate::network::Network;
use crate::store::{validate_identity, NetworkStore};
use std::path::PathBuf;

/// Recall and formation configured from one [`CognitionConfig`]. Immutable,
/// so a single instance can be shared by every identity.
#[derive(Debug, Clone, Default)]
pub struct Cognition {
    activation: ActivationEngine,
    formation: Formation,
}

impl Cognition {
    pub fn new(config: &CognitionConfig) -> Self {
        Self {
            activation: ActivationEngine::new(config.activation.clone()),
            formation: Formation::new(config.formation.clone()),
        }
    }

    pub fn activation(&self) -> &ActivationEngine {
        &self.activation
    }

    pub fn formation(&self) -> &Formation {
        &self.formation
    }
}

/// One identity's network, loaded and ready for use.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    identity: String,
    network: Network,
    warnings: Vec<String>,
    dirty: bool,
}

impl IdentityContext {
    /// Load `identity` from `store`, or start it empty.
    pub fn open(store: &NetworkStore, identity: &str) -> Result<Self> {
        let identity = validate_identity(identity)?;
        let loaded = store.load(&identity)?;
        Ok(Self {
            identity,
            network: loaded.network,
            warnings: loaded.warnings,
            dirty: false,
        })
    }

    /// Wrap an already loaded network.
    pub fn from_network(network: Network) -> Result<Self> {
        Ok(Self {
            identity: validate_identity(network.name())?,
            network,
            warnings: Vec::new(),
            dirty: false,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Problems met while loading, such as a corrupt file.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether the network changed since it was opened or last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn recall(&self, cognition: &Cognition, query: &Query, mode: Mode) -> Recall {
        cognition.activation.recall(&self.network, query, mode)
    }

    pub fn remember(&mut self, cognition: &Cognition, engram: Engram) -> Result<FormationOutcome> {
        let outcome = cognition.formation.remember(engram, &mut self.network)?;
        self.dirty |= outcome.consolidated;
        Ok(outcome)
    }

    pub fn decay(&mut self, rate: f64, floor: f64) {
        self.network.decay(rate, floor);
        self.dirty = true;
    }

    /// Write the network back if it changed. Returns the path written.
    pub fn save(&mut self, store: &NetworkStore) -> Result<Option<PathBuf>> {
        if !self.dirty {
            return Ok(None);
        }
        let path = store.save(&self.identity, &self.network)?;
        self.dirty = false;
        Ok(Some(path))
    }

    pub fn into_network(self) -> Network {
        self.network
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engram::EngramType;
    use tempfile::TempDir;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn remember_marks_dirty_and_save_persists() {
        let tmp = TempDir::new().unwrap();
        let store = NetworkStore::new(tmp.path());
        let cognition = Cognition::default();

        let mut ctx = IdentityContext::open(&store, "tester").unwrap();
        assert!(!ctx.is_dirty());
        assert_eq!(ctx.save(&store).unwrap(), None);

        let engram = Engram::from_keywords(
            "Fixed bug in parser module",
            &keywords(&["bug", "parser"]),
            EngramType::Atomic,
        );
        assert!(ctx.remember(&cognition, engram).unwrap().consolidated);
        assert!(ctx.is_dirty());
        assert!(ctx.save(&store).unwrap().is_some());
        assert!(!ctx.is_dirty());

        let reopened = IdentityContext::open(&store, "tester").unwrap();
        assert_eq!(reopened.network(), ctx.network());
        let recall = reopened.recall(&cognition, &Query::from("bug"), Mode::Balanced);
        assert_eq!(recall.engrams[0].content, "Fixed bug in parser module");
    }

    #[test]
    fn rejected_engram_leaves_context_clean() {
        let mut ctx = IdentityContext::from_network(Network::new("tester").unwrap()).unwrap();
        let outcome = ctx
            .remember(&Cognition::default(), Engram::new("  ", "", EngramType::Atomic))
            .unwrap();
        assert!(!outcome.consolidated);
        assert!(!ctx.is_dirty());
    }

    #[test]
    fn invalid_identity_is_rejected_before_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let store = NetworkStore::new(tmp.path());
        assert!(IdentityContext::open(&store, "../escape").is_err());
        assert!(store.identities().unwrap().is_empty());
    }
}
