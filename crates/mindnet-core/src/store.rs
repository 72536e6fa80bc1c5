//! One MessagePack file per identity.
//!
//! Layout: `<root>/<identity>/semantic.bin`. Writes go to a temp file in the
//! same directory and are renamed over the target, so a crash mid-write
//! leaves the previous version intact.

use crate::engram::Engram;
use crate::error::{MemoryError, Result};
use crate::network::Network;
use crate::node::{normalize_key, GraphNode, Node, NodeKind, NodeRef, Relation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const NETWORK_FILE: &str = "semantic.bin";
pub const FORMAT_VERSION: u32 = 1;

// ── Records ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkRecord {
    version: u32,
    name: String,
    cues: Vec<CueRecord>,
    schemas: Vec<SchemaRecord>,
    #[serde(default)]
    engrams: Vec<Engram>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CueRecord {
    word: String,
    strength: f64,
    connections: Vec<ConnectionRecord>,
    #[serde(default)]
    engrams: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaRecord {
    name: String,
    cues: Vec<String>,
    external_connections: Vec<ConnectionRecord>,
    #[serde(default)]
    engrams: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectionRecord {
    kind: NodeKind,
    key: String,
    relation: Relation,
    weight: f64,
}

fn connection_records(node: &Node) -> Vec<ConnectionRecord> {
    node.links()
        .iter()
        .map(|(target, connection)| ConnectionRecord {
            kind: target.kind,
            key: target.key.clone(),
            relation: connection.relation,
            weight: connection.weight,
        })
        .collect()
}

impl NetworkRecord {
    fn capture(network: &Network) -> Self {
        let mut cues = Vec::new();
        let mut schemas = Vec::new();
        for node in network.nodes() {
            match node {
                Node::Cue(cue) => cues.push(CueRecord {
                    word: cue.word().to_string(),
                    strength: cue.strength,
                    connections: connection_records(node),
                    engrams: cue.engram_ids().to_vec(),
                }),
                Node::Schema(schema) => schemas.push(SchemaRecord {
                    name: schema.name().to_string(),
                    cues: schema.cues().map(str::to_string).collect(),
                    external_connections: connection_records(node),
                    engrams: schema.engram_ids().to_vec(),
                }),
            }
        }
        Self {
            version: FORMAT_VERSION,
            name: network.name().to_string(),
            cues,
            schemas,
            engrams: network.engrams().cloned().collect(),
        }
    }

    /// Rebuild a network. Any dangling reference is an error: the file is
    /// either fully consistent or treated as corrupt.
    fn restore(self) -> Result<Network> {
        if self.version != FORMAT_VERSION {
            return Err(MemoryError::validation(
                "format version",
                format!("expected {FORMAT_VERSION}, found {}", self.version),
            ));
        }
        let mut network = Network::new(&self.name)?;

        for cue in &self.cues {
            network.upsert_cue(&cue.word, cue.strength)?;
        }
        for schema in &self.schemas {
            network.upsert_schema(&schema.name)?;
            for word in &schema.cues {
                if network.cue(word).is_none() {
                    return Err(MemoryError::NotFound(format!("cue:{word}")));
                }
                network.upsert_schema(&schema.name)?.add_cue(word)?;
            }
        }
        for engram in self.engrams {
            network.insert_engram(engram);
        }

        let owned = self
            .cues
            .into_iter()
            .map(|c| (NodeRef::cue(&c.word), c.connections, c.engrams))
            .chain(
                self.schemas
                    .into_iter()
                    .map(|s| (NodeRef::schema(&s.name), s.external_connections, s.engrams)),
            );
        for (owner, connections, engrams) in owned {
            let owner = owner?;
            for record in connections {
                let target = NodeRef {
                    kind: record.kind,
                    key: record.key,
                };
                network.connect_directed(&owner, &target, record.relation, record.weight)?;
            }
            if let Some(id) = engrams.iter().find(|id| network.engram(id).is_none()) {
                return Err(MemoryError::NotFound(format!("engram:{id}")));
            }
            if let Some(node) = network.node_mut(&owner) {
                *node.engrams_mut() = engrams;
            }
        }
        Ok(network)
    }
}

/// Encode a network in the on-disk format.
pub fn encode(network: &Network) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(&NetworkRecord::capture(network))?)
}

/// Decode bytes produced by [`encode`]. `path` is only used in the error.
pub fn decode(bytes: &[u8], path: &Path) -> Result<Network> {
    let corrupt = |reason: String| MemoryError::CorruptStore {
        path: path.to_path_buf(),
        reason,
    };
    let record: NetworkRecord =
        rmp_serde::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    record.restore().map_err(|e| corrupt(e.to_string()))
}

/// Normalize an identity and make sure it is safe to use as a directory name.
pub fn validate_identity(identity: &str) -> Result<String> {
    let name = normalize_key(identity)
        .ok_or_else(|| MemoryError::validation("identity", "must not be empty"))?;
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.starts_with('.') {
        return Err(MemoryError::validation(
            "identity",
            format!("`{name}` is not a valid directory name"),
        ));
    }
    Ok(name)
}

// ── Store ───────────────────────────────────────────────────────

/// A network read from disk, plus anything worth telling the caller about.
#[derive(Debug)]
pub struct Loaded {
    pub network: Network,
    /// Recoverable problems, such as a corrupt file replaced by an empty network.
    pub warnings: Vec<String>,
    /// Whether a file existed for this identity.
    pub existed: bool,
}

#[derive(Debug, Clone)]
pub struct NetworkStore {
    root: PathBuf,
}

impl NetworkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, identity: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_identity(identity)?).join(NETWORK_FILE))
    }

    /// Load the network for `identity`. A missing file gives a fresh network;
    /// a corrupt one gives a fresh network and a warning.
    pub fn load(&self, identity: &str) -> Result<Loaded> {
        let name = validate_identity(identity)?;
        let path = self.path_for(&name)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(identity = %name, "no stored network, starting fresh");
                return Ok(Loaded {
                    network: Network::new(&name)?,
                    warnings: Vec::new(),
                    existed: false,
                });
            }
            Err(e) => return Err(e.into()),
        };

        match decode(&bytes, &path) {
            Ok(network) => {
                info!(
                    identity = %name,
                    cues = network.cue_count(),
                    schemas = network.schema_count(),
                    "loaded network"
                );
                Ok(Loaded {
                    network,
                    warnings: Vec::new(),
                    existed: true,
                })
            }
            Err(e) => {
                warn!(identity = %name, "{e}; starting fresh");
                Ok(Loaded {
                    network: Network::new(&name)?,
                    warnings: vec![e.to_string()],
                    existed: true,
                })
            }
        }
    }

    /// Atomically replace the stored network for `identity`.
    pub fn save(&self, identity: &str, network: &Network) -> Result<PathBuf> {
        let path = self.path_for(identity)?;
        let dir = path
            .parent()
            .ok_or_else(|| MemoryError::validation("store path", path.display().to_string()))?;
        fs::create_dir_all(dir)?;

        let bytes = encode(network)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| MemoryError::Io(e.error))?;

        debug!(path = %path.display(), bytes = bytes.len(), "saved network");
        Ok(path)
    }

    /// Identities that have a stored network, sorted.
    pub fn identities(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().join(NETWORK_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                identities.push(name.to_string());
            }
        }
        identities.sort();
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engram::EngramType;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn sample() -> Network {
        let mut net = Network::new("tester").unwrap();
        net.upsert_cue("bug", 0.7).unwrap();
        net.upsert_cue("parser", 0.5).unwrap();
        net.upsert_schema("bug parser").unwrap();
        net.absorb("bug parser", "bug", 0.8).unwrap();
        net.absorb("bug parser", "parser", 0.8).unwrap();
        let bug = NodeRef::cue("bug").unwrap();
        let parser = NodeRef::cue("parser").unwrap();
        net.connect(&bug, &parser, Relation::Peer, 0.5).unwrap();
        let engram = Engram::new("Fixed bug in parser module", "", EngramType::Pattern);
        net.attach_engram(engram, &[NodeRef::schema("bug parser").unwrap(), bug])
            .unwrap();
        net
    }

    #[test]
    fn missing_file_gives_fresh_network() {
        let tmp = TempDir::new().unwrap();
        let store = NetworkStore::new(tmp.path());
        let loaded = store.load("Tester").unwrap();
        assert!(!loaded.existed);
        assert!(loaded.network.is_empty());
        assert_eq!(loaded.network.name(), "tester");
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = NetworkStore::new(tmp.path());
        let net = sample();
        let path = store.save("tester", &net).unwrap();
        assert_eq!(path, tmp.path().join("tester").join(NETWORK_FILE));

        let loaded = store.load("tester").unwrap();
        assert!(loaded.existed);
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.network, net);
    }

    #[test]
    fn corrupt_file_degrades_with_warning() {
        let tmp = TempDir::new().unwrap();
        let store = NetworkStore::new(tmp.path());
        let path = store.path_for("tester").unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"definitely not msgpack").unwrap();

        let loaded = store.load("tester").unwrap();
        assert!(loaded.network.is_empty());
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("corrupt store"));

        // the next save heals the file
        store.save("tester", &sample()).unwrap();
        assert!(store.load("tester").unwrap().warnings.is_empty());
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let mut record = NetworkRecord::capture(&sample());
        record.version = 99;
        let bytes = rmp_serde::to_vec_named(&record).unwrap();
        let err = decode(&bytes, Path::new("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptStore);
    }

    #[test]
    fn decode_rejects_dangling_edges() {
        let mut record = NetworkRecord::capture(&sample());
        record.cues.retain(|c| c.word != "parser");
        let bytes = rmp_serde::to_vec_named(&record).unwrap();
        assert!(decode(&bytes, Path::new("x")).is_err());
    }

    #[test]
    fn identities_must_be_safe_directory_names() {
        assert_eq!(validate_identity(" Tester ").unwrap(), "tester");
        for bad in ["", "../etc", "a/b", "a\\b", ".hidden"] {
            assert_eq!(validate_identity(bad).unwrap_err().kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn identities_lists_saved_networks() {
        let tmp = TempDir::new().unwrap();
        let store = NetworkStore::new(tmp.path().join("store"));
        assert!(store.identities().unwrap().is_empty());
        store.save("zed", &Network::new("zed").unwrap()).unwrap();
        store.save("alice", &Network::new("alice").unwrap()).unwrap();
        fs::create_dir_all(tmp.path().join("store").join("stray")).unwrap();
        assert_eq!(store.identities().unwrap(), vec!["alice", "zed"]);
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = NetworkStore::new(tmp.path());
        store.save("tester", &sample()).unwrap();
        store.save("tester", &sample()).unwrap();
        let entries: Vec<_> = fs::read_dir(tmp.path().join("tester")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
