//! Session configuration loaded from JSON

use crate::{Result, SessionError};
use link_quality::FuzzyConfig;
use route_validation::DEFAULT_THRESHOLD_PCT;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Number of ranked alternatives computed per server pair
pub const DEFAULT_ALTERNATIVES: usize = 3;

/// A routed server and the address the external collector probes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: String,
    pub address: String,
}

impl ServerEntry {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub servers: Vec<ServerEntry>,
    #[serde(default = "default_alternatives")]
    pub alternatives: usize,
    /// Percentage error at or under which a prediction counts as accurate
    #[serde(default = "default_threshold")]
    pub accuracy_threshold_pct: f64,
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
}

fn default_alternatives() -> usize {
    DEFAULT_ALTERNATIVES
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD_PCT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                ServerEntry::new("Google_Cloud", "8.8.8.8"),
                ServerEntry::new("AWS", "1.1.1.1"),
                ServerEntry::new("Azure", "208.67.222.222"),
                ServerEntry::new("Oracle_Cloud", "9.9.9.9"),
                ServerEntry::new("Exadata_X11", "4.4.4.4"),
            ],
            alternatives: DEFAULT_ALTERNATIVES,
            accuracy_threshold_pct: DEFAULT_THRESHOLD_PCT,
            fuzzy: FuzzyConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading session config from {:?}", path);

        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to the default server set when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config {:?} not found, using default servers", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(SessionError::Config("no servers declared".to_string()));
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.id.is_empty() {
                return Err(SessionError::Config("empty server id".to_string()));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(SessionError::Config(format!("duplicate server id {}", server.id)));
            }
        }

        if self.alternatives == 0 {
            return Err(SessionError::Config("alternatives must be at least 1".to_string()));
        }
        if !self.accuracy_threshold_pct.is_finite() || self.accuracy_threshold_pct < 0.0 {
            return Err(SessionError::Config(format!(
                "accuracy threshold {}%",
                self.accuracy_threshold_pct
            )));
        }

        self.fuzzy.validate()?;
        Ok(())
    }

    /// Declared server IDs, in order
    pub fn server_ids(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.id.clone()).collect()
    }
}
