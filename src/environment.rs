//! # Backend Environment
//!
//! Process-wide distributed-FS client environment, assembled exactly once.
//!
//! The snapshot collects the client installation root and any client
//! configuration files found under the configured directory, and is handed to
//! connectors as backend-native settings. Initialization is idempotent and
//! thread-safe; re-entry returns the existing snapshot.

use crate::constants::{ENV_DFS_CONF_DIR, ENV_DFS_HOME};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tracing::{debug, warn};

static ENVIRONMENT: OnceLock<BackendEnvironment> = OnceLock::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Immutable snapshot of the backend client environment
#[derive(Debug, Default)]
pub struct BackendEnvironment {
    settings: HashMap<String, String>,
}

impl BackendEnvironment {
    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    fn from_process_env() -> Self {
        let mut settings = HashMap::new();

        match std::env::var(ENV_DFS_HOME) {
            Ok(home) if !home.is_empty() => {
                settings.insert("dfs.home".to_string(), home);
            }
            _ => {
                warn!("{ENV_DFS_HOME} is not set, skipping backend environment bootstrap");
                return Self { settings };
            }
        }

        if let Ok(conf_dir) = std::env::var(ENV_DFS_CONF_DIR) {
            if !conf_dir.is_empty() {
                settings.insert("dfs.conf.dir".to_string(), conf_dir.clone());
                let conf_files = collect_conf_files(&conf_dir);
                if !conf_files.is_empty() {
                    settings.insert("dfs.conf.files".to_string(), conf_files.join(":"));
                }
            }
        }

        debug!(entries = settings.len(), "backend environment assembled");
        Self { settings }
    }
}

/// Client configuration files under the conf dir, e.g. `core-site.xml`
fn collect_conf_files(conf_dir: &str) -> Vec<String> {
    let pattern = Regex::new(r"^.*-site\.xml$").expect("static pattern");
    let entries = match std::fs::read_dir(conf_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = conf_dir, error = %e, "failed to read backend conf dir");
            return Vec::new();
        }
    };
    let mut files: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| pattern.is_match(name))
        .map(|name| format!("{conf_dir}/{name}"))
        .collect();
    files.sort();
    files
}

/// Initialize the process-wide backend environment, or return the existing
/// snapshot
pub fn ensure_initialized() -> &'static BackendEnvironment {
    ENVIRONMENT.get_or_init(|| {
        let environment = BackendEnvironment::from_process_env();
        INITIALIZED.store(true, Ordering::Release);
        environment
    })
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}
