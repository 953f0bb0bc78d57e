use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

/// Key prefix for the hosted inference API (`GROQ_API_KEY_1` .. `GROQ_API_KEY_9`, `GROQ_API_KEY`).
pub const KEY_PREFIX: &str = "GROQ_API_KEY";
/// Value shipped in the sample secrets template; never a real key.
pub const PLACEHOLDER_VALUE: &str = "your_first_api_key_here";
const MAX_NUMBERED_KEYS: usize = 9;

/// Read-only key/value namespace credentials are discovered in.
pub trait KeyValueSource {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory source. Backs the secrets file and tests.
#[derive(Debug, Default)]
pub struct MapSource {
    name: String,
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new(name: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

impl KeyValueSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Managed secret store: a flat JSON object of string values.
pub struct SecretsFile;

impl SecretsFile {
    /// A missing file is an empty store; an unreadable one is warned about and treated as empty.
    pub fn load(path: &Path) -> MapSource {
        let name = format!("secrets file {}", path.display());

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{name} not present, skipping");
                return MapSource::new(name, HashMap::new());
            }
            Err(e) => {
                warn!("Error reading {name}: {e}");
                return MapSource::new(name, HashMap::new());
            }
        };

        match serde_json::from_str::<HashMap<String, serde_json::Value>>(&raw) {
            Ok(entries) => {
                let values = entries
                    .into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                    .collect();
                MapSource::new(name, values)
            }
            Err(e) => {
                warn!("Error parsing {name}: {e}");
                MapSource::new(name, HashMap::new())
            }
        }
    }
}

/// Process environment (after `.env` has been loaded).
pub struct EnvSource;

impl KeyValueSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Layered discovery, first non-empty layer wins:
/// 1. numbered keys in the secret store
/// 2. numbered keys in the environment
/// 3. the unsuffixed key in the environment
pub fn discover_credentials(
    secret_store: &dyn KeyValueSource,
    environment: &dyn KeyValueSource,
    prefix: &str,
) -> Vec<String> {
    let from_store = numbered_keys(secret_store, prefix);
    if !from_store.is_empty() {
        return from_store;
    }

    let from_env = numbered_keys(environment, prefix);
    if !from_env.is_empty() {
        return from_env;
    }

    match usable(environment.get(prefix)) {
        Some(key) => {
            info!("Loaded single API key from {prefix}");
            vec![key]
        }
        None => Vec::new(),
    }
}

fn numbered_keys(source: &dyn KeyValueSource, prefix: &str) -> Vec<String> {
    (1..=MAX_NUMBERED_KEYS)
        .filter_map(|i| {
            let key_name = format!("{prefix}_{i}");
            let key = usable(source.get(&key_name))?;
            info!("Loaded {key_name} from {}", source.name());
            Some(key)
        })
        .collect()
}

fn usable(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != PLACEHOLDER_VALUE)
}
