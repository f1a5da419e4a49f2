//! Hierarchical logger-name → level threshold resolution
//!
//! Logger names are dot-separated (`app.db.pool`). A name inherits the
//! threshold of its most specific configured ancestor, falling back to the
//! root threshold.

use super::error::{PipelineError, Result};
use super::log_level::{Level, LevelFilter};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Name → threshold configuration source
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::{LevelConfig, LevelFilter};
///
/// let config = LevelConfig::parse("warn,app=info,app.db=debug").unwrap();
/// assert_eq!(config.root, LevelFilter::Warn);
/// assert_eq!(config.levels["app.db"], LevelFilter::Debug);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(default)]
    pub root: LevelFilter,
    #[serde(default)]
    pub levels: BTreeMap<String, LevelFilter>,
}

impl LevelConfig {
    pub fn new(root: LevelFilter) -> Self {
        Self {
            root,
            levels: BTreeMap::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, prefix: impl Into<String>, filter: LevelFilter) -> Self {
        self.levels.insert(prefix.into(), filter);
        self
    }

    /// Reject malformed prefixes such as `app.` or `a..b`
    pub fn validate(&self) -> Result<()> {
        self.levels.keys().try_for_each(|prefix| validate_prefix(prefix))
    }

    /// Parse comma-separated directives.
    ///
    /// A bare level sets the root threshold; `prefix=level` sets a prefix.
    /// The prefixes `root` and the empty string also address the root.
    pub fn parse(directives: &str) -> Result<Self> {
        let mut config = LevelConfig::default();
        for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((prefix, level)) => {
                    let prefix = prefix.trim();
                    let filter: LevelFilter = level.parse()?;
                    if prefix.is_empty() || prefix.eq_ignore_ascii_case("root") {
                        config.root = filter;
                    } else {
                        validate_prefix(prefix)?;
                        config.levels.insert(prefix.to_string(), filter);
                    }
                }
                None => config.root = directive.parse()?,
            }
        }
        Ok(config)
    }
}

impl FromStr for LevelConfig {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        LevelConfig::parse(s)
    }
}

impl fmt::Display for LevelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.to_str().to_lowercase())?;
        for (prefix, filter) in &self.levels {
            write!(f, ",{}={}", prefix, filter.to_str().to_lowercase())?;
        }
        Ok(())
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.starts_with('.') || prefix.ends_with('.') || prefix.contains("..") {
        return Err(PipelineError::config(
            "LevelResolver",
            format!("malformed logger prefix '{}'", prefix),
        ));
    }
    Ok(())
}

#[derive(Debug)]
struct LevelMap {
    root: LevelFilter,
    prefixes: HashMap<String, LevelFilter>,
}

impl LevelMap {
    fn from_config(config: &LevelConfig) -> Self {
        Self {
            root: config.root,
            prefixes: config
                .levels
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    fn resolve(&self, name: &str) -> LevelFilter {
        if self.prefixes.is_empty() {
            return self.root;
        }
        let mut candidate = name;
        loop {
            if let Some(filter) = self.prefixes.get(candidate) {
                return *filter;
            }
            match candidate.rfind('.') {
                Some(idx) => candidate = &candidate[..idx],
                None => return self.root,
            }
        }
    }

    fn to_config(&self) -> LevelConfig {
        LevelConfig {
            root: self.root,
            levels: self
                .prefixes
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}

/// Thread-safe, hot-reloadable level resolver.
///
/// Lookups run under a shared read lock and never allocate. Mutations build a
/// new map and swap it in whole, so a reader sees either the old or the new
/// mapping and never a mix.
#[derive(Debug)]
pub struct LevelResolver {
    map: RwLock<Arc<LevelMap>>,
    generation: AtomicU64,
}

impl LevelResolver {
    pub fn new(root: LevelFilter) -> Self {
        Self::from_config(&LevelConfig::new(root))
    }

    pub fn from_config(config: &LevelConfig) -> Self {
        Self {
            map: RwLock::new(Arc::new(LevelMap::from_config(config))),
            generation: AtomicU64::new(0),
        }
    }

    /// Effective threshold for `name`
    pub fn resolve_level(&self, name: &str) -> LevelFilter {
        self.map.read().resolve(name)
    }

    #[inline]
    pub fn is_enabled(&self, name: &str, level: Level) -> bool {
        self.resolve_level(name).allows(level)
    }

    pub fn root_level(&self) -> LevelFilter {
        self.map.read().root
    }

    /// Incremented on every mutation; lets callers invalidate cached lookups
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn set_root(&self, filter: LevelFilter) {
        self.update(|map| map.root = filter);
    }

    pub fn set_level(&self, prefix: &str, filter: LevelFilter) -> Result<()> {
        validate_prefix(prefix)?;
        self.update(|map| {
            map.prefixes.insert(prefix.to_string(), filter);
        });
        Ok(())
    }

    pub fn remove_level(&self, prefix: &str) {
        self.update(|map| {
            map.prefixes.remove(prefix);
        });
    }

    /// Replace the whole mapping
    pub fn reload(&self, config: &LevelConfig) {
        let next = Arc::new(LevelMap::from_config(config));
        *self.map.write() = next;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Current mapping as a config value
    pub fn snapshot(&self) -> LevelConfig {
        self.map.read().to_config()
    }

    fn update(&self, mutate: impl FnOnce(&mut LevelMap)) {
        let mut guard = self.map.write();
        let mut next = LevelMap {
            root: guard.root,
            prefixes: guard.prefixes.clone(),
        };
        mutate(&mut next);
        *guard = Arc::new(next);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for LevelResolver {
    fn default() -> Self {
        Self::new(LevelFilter::default())
    }
}
