//! Store configuration.
//!
//! [`StoreConfig`] is an explicit value handed to [`crate::SqlStore`] at
//! construction. It can be built in code or loaded from a TOML file:
//!
//! ```toml
//! database = "sessions"
//! nodes = ["/var/lib/sqlkv/sessions.db"]
//! table = "session_cache"   # optional, defaults to `database`
//! timeout_ms = 5000
//! clock = "engine"          # or "caller"
//! reclaim_interval_ms = 60000
//! reclaim_batch_size = 500
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::error::{Error, Result};
use crate::store::ExpiryClock;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Configuration for a single store instance.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Logical keyspace identifier.
    pub database: String,
    /// Endpoints tried in order until one answers.
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Physical table name override. Defaults to `database`.
    ///
    /// The effective name must match `[a-z_][a-z0-9_]*` so that distinct
    /// names always map to distinct tables.
    #[serde(default)]
    pub table: Option<String>,
    /// Per-operation deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Clock used for expiry computation and comparison.
    #[serde(default)]
    pub clock: ExpiryClock,
    /// Background reclamation period in seconds. `None` disables it.
    #[serde(default)]
    pub reclaim_interval_ms: Option<u64>,
    /// Rows removed per reclamation batch.
    #[serde(default = "default_reclaim_batch_size")]
    pub reclaim_batch_size: usize,
}

fn default_timeout_ms() -> u64 {
    constants::DEFAULT_TIMEOUT_MS
}

fn default_reclaim_batch_size() -> usize {
    constants::DEFAULT_RECLAIM_BATCH_SIZE
}

impl StoreConfig {
    /// Create a config for `database` with defaults and no nodes.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            nodes: Vec::new(),
            table: None,
            timeout_ms: constants::DEFAULT_TIMEOUT_MS,
            clock: ExpiryClock::default(),
            reclaim_interval_ms: None,
            reclaim_batch_size: constants::DEFAULT_RECLAIM_BATCH_SIZE,
        }
    }

    /// Create a config for an in-memory database.
    pub fn memory(database: impl Into<String>) -> Self {
        Self::new(database).with_node(constants::MEMORY_NODE)
    }

    /// Append an endpoint.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Override the physical table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the per-operation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the expiry clock.
    #[must_use]
    pub const fn with_clock(mut self, clock: ExpiryClock) -> Self {
        self.clock = clock;
        self
    }

    /// Enable background reclamation every `interval`.
    ///
    /// Sub-millisecond intervals round up to 1 ms; zero is left for
    /// [`Self::validate`] to reject.
    #[must_use]
    pub fn reclaim_every(mut self, interval: Duration) -> Self {
        let millis = interval.as_nanos().div_ceil(1_000_000);
        self.reclaim_interval_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Set the reclamation batch size.
    #[must_use]
    pub const fn with_reclaim_batch_size(mut self, size: usize) -> Self {
        self.reclaim_batch_size = size;
        self
    }

    /// Per-operation deadline.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Background reclamation period, if enabled.
    pub fn reclaim_interval(&self) -> Option<Duration> {
        self.reclaim_interval_ms.map(Duration::from_millis)
    }

    /// Table name: the override or the database identifier.
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.database)
    }

    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Required fields are missing or have invalid types
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration, collecting every problem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing all of:
    /// - Empty database identifier or table override
    /// - No nodes, or an empty node string
    /// - A table name outside `[a-z_][a-z0-9_]*`
    /// - Zero or oversized timeout, zero reclamation interval or batch size
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.database.trim().is_empty() {
            errors.push("database cannot be empty".to_string());
        }

        match &self.table {
            Some(table) if table.trim().is_empty() => {
                errors.push("table override cannot be empty".to_string());
            },
            _ => {
                let name = self.table_name();
                if !name.is_empty()
                    && let Err(reason) = check_table_name(name)
                {
                    errors.push(reason);
                }
            },
        }

        if self.nodes.is_empty() {
            errors.push(format!(
                "nodes cannot be empty. Use a file path or '{}'",
                constants::MEMORY_NODE
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.trim().is_empty() {
                errors.push(format!("node {i} is empty"));
            }
        }
        if self.nodes.len() > 1 && self.nodes.iter().any(|n| n == constants::MEMORY_NODE) {
            warnings.push(format!(
                "'{}' never fails to open, so nodes listed after it are unreachable",
                constants::MEMORY_NODE
            ));
        }

        if self.timeout_ms == 0 {
            errors.push("timeout_ms cannot be 0".to_string());
        } else if self.timeout_ms > constants::MAX_TIMEOUT_MS {
            errors.push(format!(
                "timeout_ms {} exceeds maximum {}",
                self.timeout_ms,
                constants::MAX_TIMEOUT_MS
            ));
        }

        match self.reclaim_interval_ms {
            Some(0) => errors.push("reclaim_interval_ms cannot be 0".to_string()),
            Some(ms) if ms < constants::MIN_RECOMMENDED_RECLAIM_INTERVAL_MS => {
                warnings.push(format!("reclaim_interval_ms {ms} is very short"));
            },
            _ => {},
        }

        if self.reclaim_batch_size == 0 {
            errors.push("reclaim_batch_size cannot be 0".to_string());
        }

        if !errors.is_empty() {
            return Err(Error::Config(errors.join("; ")));
        }

        Ok(ValidationResult { warnings })
    }
}

/// Table names are used verbatim, so the accepted alphabet is one that
/// SQLite neither rewrites nor folds: lowercase ASCII, digits, underscore.
fn check_table_name(name: &str) -> std::result::Result<(), String> {
    let valid_start = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid_start || !valid_rest {
        return Err(format!(
            "table name '{name}' must match [a-z_][a-z0-9_]* (set `table` to override)"
        ));
    }
    if name.len() > constants::MAX_TABLE_NAME_LEN {
        return Err(format!(
            "table name '{name}' exceeds {} characters",
            constants::MAX_TABLE_NAME_LEN
        ));
    }
    if name.starts_with("sqlite_") {
        return Err(format!("table name '{name}' uses the reserved sqlite_ prefix"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
database = "sessions"
nodes = [":memory:"]
"#;
        let config: StoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database, "sessions");
        assert_eq!(config.nodes, vec![":memory:".to_string()]);
        assert_eq!(config.table, None);
        assert_eq!(config.timeout_ms, constants::DEFAULT_TIMEOUT_MS);
        assert_eq!(config.clock, ExpiryClock::Engine);
        assert_eq!(config.reclaim_interval(), None);
        assert_eq!(config.table_name(), "sessions");
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
database = "sessions"
nodes = ["/tmp/a.db", "/tmp/b.db"]
table = "session_cache"
timeout_ms = 250
clock = "caller"
reclaim_interval_ms = 30000
reclaim_batch_size = 10
"#;
        let config: StoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.table_name(), "session_cache");
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.clock, ExpiryClock::Caller);
        assert_eq!(config.reclaim_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.reclaim_batch_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml_str = r#"
database = "x"
nodes = [":memory:"]
ttl = 5
"#;
        assert!(toml::from_str::<StoreConfig>(toml_str).is_err());
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new("cache")
            .with_node("/tmp/cache.db")
            .with_table("cache_v2")
            .with_timeout(Duration::from_secs(2))
            .with_clock(ExpiryClock::Caller)
            .reclaim_every(Duration::from_secs(15))
            .with_reclaim_batch_size(64);

        assert_eq!(config.nodes, vec!["/tmp/cache.db".to_string()]);
        assert_eq!(config.table_name(), "cache_v2");
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.reclaim_interval_ms, Some(15_000));
        assert_eq!(config.reclaim_batch_size, 64);
    }

    #[test]
    fn test_validate_requires_nodes() {
        let err = StoreConfig::new("cache").validate().unwrap_err();
        assert!(err.to_string().contains("nodes cannot be empty"));
    }

    #[test]
    fn test_validate_multiple_errors() {
        let config = StoreConfig {
            database: String::new(),
            nodes: vec![String::new()],
            table: Some(" ".to_string()),
            timeout_ms: 0,
            clock: ExpiryClock::Engine,
            reclaim_interval_ms: Some(0),
            reclaim_batch_size: 0,
        };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("database cannot be empty"));
        assert!(err.contains("table override"));
        assert!(err.contains("node 0 is empty"));
        assert!(err.contains("timeout_ms"));
        assert!(err.contains("reclaim_interval_ms"));
        assert!(err.contains("reclaim_batch_size"));
    }

    #[test]
    fn test_validate_warns_on_unreachable_nodes() {
        let config = StoreConfig::memory("cache").with_node("/tmp/never.db");
        let result = config.validate().unwrap();
        assert!(result.has_warnings());
    }

    #[test]
    fn test_validate_warns_on_short_reclaim_interval() {
        let config = StoreConfig::memory("cache").reclaim_every(Duration::from_millis(200));
        assert!(config.validate().unwrap().has_warnings());

        let config = StoreConfig::memory("cache").reclaim_every(Duration::from_secs(60));
        assert!(!config.validate().unwrap().has_warnings());
    }

    #[test]
    fn test_sub_second_reclaim_interval_kept() {
        let config = StoreConfig::memory("cache").reclaim_every(Duration::from_millis(250));
        assert_eq!(config.reclaim_interval(), Some(Duration::from_millis(250)));
        assert!(config.validate().is_ok());

        let config = StoreConfig::memory("cache").reclaim_every(Duration::from_micros(10));
        assert_eq!(config.reclaim_interval(), Some(Duration::from_millis(1)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_timeout() {
        let config = StoreConfig::memory("cache").with_timeout(Duration::from_secs(30 * 24 * 3600));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("timeout_ms"));

        let config =
            StoreConfig::memory("cache").with_timeout(Duration::from_millis(constants::MAX_TIMEOUT_MS));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_table_names() {
        for name in ["sessions", "_private", "cache_v2", "a1"] {
            assert!(StoreConfig::memory(name).validate().is_ok(), "{name}");
        }
        for name in ["my-db", "My_DB", "MY_DB", "9lives", "a b", "x\"y", "sqlite_master"] {
            let err = StoreConfig::memory(name).validate().unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{name}");
        }
        assert!(StoreConfig::memory("x").with_table(&"t".repeat(200)).validate().is_err());
    }

    #[test]
    fn test_table_override_replaces_database_name() {
        let config = StoreConfig::memory("my-app.cache").with_table("app_cache");
        assert!(config.validate().is_ok());
        assert_eq!(config.table_name(), "app_cache");

        let config = StoreConfig::memory("cache").with_table("App-Cache");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database = \"from_file\"\nnodes = [\":memory:\"]").unwrap();

        let config = StoreConfig::load_from(file.path()).unwrap();
        assert_eq!(config.database, "from_file");
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = StoreConfig::load_from("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
