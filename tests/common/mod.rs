use mindnet::{Config, LockConfig, MemoryService};
use tempfile::TempDir;

/// A service rooted in a fresh temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn service() -> (TempDir, MemoryService) {
    service_with_lock(LockConfig::default())
}

pub fn service_with_lock(lock: LockConfig) -> (TempDir, MemoryService) {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        store_dir: tmp.path().join("networks").to_string_lossy().into_owned(),
        lock,
        ..Config::default()
    };
    let service = MemoryService::from_config(&config);
    (tmp, service)
}

pub fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}
