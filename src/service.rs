//! Per-identity memory service.
//!
//! Writes for one identity are serialized by an async mutex taken with
//! bounded backoff. Reads run against an `Arc<Network>` snapshot and never
//! wait for a writer: a remember in flight either has not published its new
//! snapshot yet, or has, and recall sees one or the other.

use crate::config::{Config, LockConfig};
use mindnet_core::store::validate_identity;
use mindnet_core::{
    Cognition, Engram, EngramType, FormationOutcome, IdentityContext, MemoryError, Mode, Network,
    NetworkStore, Query, Recall, Result,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Held while an identity's network is being rewritten. Dropping it
/// releases the identity, whatever the outcome.
#[derive(Debug)]
pub struct IdentityGuard {
    identity: String,
    _guard: OwnedMutexGuard<()>,
}

impl IdentityGuard {
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

pub struct MemoryService {
    store: NetworkStore,
    cognition: Cognition,
    lock: LockConfig,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    sessions: RwLock<HashMap<String, Arc<Network>>>,
}

impl MemoryService {
    pub fn new(store: NetworkStore, cognition: Cognition, lock: LockConfig) -> Self {
        Self {
            store,
            cognition,
            lock,
            locks: Mutex::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            NetworkStore::new(config.store_path()),
            Cognition::new(&config.cognition),
            config.lock.clone(),
        )
    }

    pub fn store(&self) -> &NetworkStore {
        &self.store
    }

    pub fn cognition(&self) -> &Cognition {
        &self.cognition
    }

    // ── Locking ─────────────────────────────────────────────────

    /// Take the write lock for `identity`, retrying with exponential backoff.
    pub async fn acquire(&self, identity: &str) -> Result<IdentityGuard> {
        let identity = validate_identity(identity)?;
        let mutex = self.locks.lock().entry(identity.clone()).or_default().clone();

        let attempts = self.lock.retries.max(1);
        let mut delay = self.lock.backoff_ms;
        for attempt in 1..=attempts {
            if let Ok(guard) = mutex.clone().try_lock_owned() {
                return Ok(IdentityGuard {
                    identity,
                    _guard: guard,
                });
            }
            if attempt == attempts {
                break;
            }
            debug!(identity = %identity, attempt, delay_ms = delay, "identity busy, backing off");
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = delay.saturating_mul(2).min(self.lock.max_backoff_ms);
        }

        warn!(identity = %identity, attempts, "gave up waiting for identity lock");
        Err(MemoryError::ConcurrencyConflict { identity, attempts })
    }

    // ── Remember ────────────────────────────────────────────────

    /// The remember contract: `content` plus keywords, consolidated as an
    /// atomic engram.
    pub async fn remember(
        &self,
        identity: &str,
        content: &str,
        keywords: &[String],
    ) -> Result<FormationOutcome> {
        let engram = Engram::from_keywords(content, keywords, EngramType::Atomic);
        self.remember_engram(identity, engram).await
    }

    /// Load, consolidate and save under the identity lock. The network is
    /// always reloaded from disk so the write builds on the latest file.
    pub async fn remember_engram(&self, identity: &str, engram: Engram) -> Result<FormationOutcome> {
        let guard = self.acquire(identity).await?;
        let mut ctx = self.open(guard.identity())?;

        let outcome = ctx.remember(&self.cognition, engram)?;
        if let Some(path) = ctx.save(&self.store)? {
            info!(
                identity = guard.identity(),
                schema = outcome.schema_name.as_deref().unwrap_or_default(),
                path = %path.display(),
                "remembered"
            );
            self.publish(ctx);
        }
        Ok(outcome)
    }

    // ── Recall ──────────────────────────────────────────────────

    /// Recall against the identity's current snapshot. Takes no lock.
    pub fn recall(&self, identity: &str, query: &Query, mode: Mode) -> Result<Recall> {
        let network = self.snapshot(identity)?;
        Ok(self.cognition.activation().recall(&network, query, mode))
    }

    /// Recall with no query: seeds are the best-connected hubs.
    pub fn prime(&self, identity: &str, mode: Mode) -> Result<Recall> {
        self.recall(identity, &Query::Absent, mode)
    }

    /// The loaded network for `identity`, reading it from disk on first use.
    pub fn snapshot(&self, identity: &str) -> Result<Arc<Network>> {
        let identity = validate_identity(identity)?;
        if let Some(network) = self.sessions.read().get(&identity) {
            return Ok(Arc::clone(network));
        }
        let network = Arc::new(self.open(&identity)?.into_network());
        let mut sessions = self.sessions.write();
        Ok(Arc::clone(sessions.entry(identity).or_insert(network)))
    }

    // ── Maintenance ─────────────────────────────────────────────

    /// Weaken every link and cue of `identity` and save the result.
    pub async fn decay(&self, identity: &str, rate: f64, floor: f64) -> Result<PathBuf> {
        let guard = self.acquire(identity).await?;
        let mut ctx = self.open(guard.identity())?;
        ctx.decay(rate, floor);
        let path = self.store.save(guard.identity(), ctx.network())?;
        info!(identity = guard.identity(), rate, floor, "decayed network");
        self.publish(ctx);
        Ok(path)
    }

    /// Drop the in-memory snapshot for `identity`, and its lock entry when
    /// nobody holds or waits on it. The file is kept.
    pub fn evict(&self, identity: &str) -> bool {
        let Ok(identity) = validate_identity(identity) else {
            return false;
        };
        {
            let mut locks = self.locks.lock();
            // acquire clones the Arc under this map lock, so a count of one is stable here
            if locks.get(&identity).is_some_and(|m| Arc::strong_count(m) == 1) {
                locks.remove(&identity);
            }
        }
        let evicted = self.sessions.write().remove(&identity).is_some();
        if evicted {
            debug!(identity = %identity, "evicted session");
        }
        evicted
    }

    pub fn identities(&self) -> Result<Vec<String>> {
        self.store.identities()
    }

    fn open(&self, identity: &str) -> Result<IdentityContext> {
        let ctx = IdentityContext::open(&self.store, identity)?;
        for warning in ctx.warnings() {
            warn!(identity, "{warning}");
        }
        Ok(ctx)
    }

    fn publish(&self, ctx: IdentityContext) {
        let identity = ctx.identity().to_string();
        self.sessions
            .write()
            .insert(identity, Arc::new(ctx.into_network()));
    }
}
