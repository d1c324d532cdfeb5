//!
//! Run configuration: named configs loaded from YAML files.
//!
//! A configuration file maps config names to run configurations:
//!
//! ```yaml
//! configs:
//!   ping:
//!     network: Ping
//!     sim-time-limit: 5.0
//!     seed-0: 42
//!     parameters:
//!       a.initiator: "true"
//!     warnings:
//!       b: false
//! ```
//!
//! Recognized per-config options: `network` (registry type to
//! instantiate), `sim-time-limit` and `cpu-time-limit` in seconds,
//! `event-limit`, `seed-N` keys seeding the N-th random number stream,
//! `parameters` (dotted module-path bindings) and `warnings` (per-path
//! toggles for non-fatal diagnostics).
//!

use crate::net::Sim;
use crate::runtime::{Builder, SimError};
use crate::time::{Duration, SimTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

mod registry;
pub use registry::Registry;

///
/// A configuration file holding named run configurations.
///
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    /// The named configurations of this file.
    #[serde(default)]
    pub configs: BTreeMap<String, Config>,
}

impl ConfigFile {
    ///
    /// Parses a configuration file from raw YAML.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error on malformed YAML.
    ///
    pub fn parse(raw: &str) -> Result<ConfigFile, SimError> {
        serde_yml::from_str(raw).map_err(|e| SimError::Config(e.to_string()))
    }

    ///
    /// Loads and parses a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the file cannot be read or
    /// parsed.
    ///
    pub fn load(path: impl AsRef<Path>) -> Result<ConfigFile, SimError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            SimError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    ///
    /// Retrieves a named configuration.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if no such config exists.
    ///
    pub fn get(&self, name: &str) -> Result<&Config, SimError> {
        self.configs
            .get(name)
            .ok_or_else(|| SimError::Config(format!("no configuration named '{name}'")))
    }

    /// The names of all contained configurations, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.configs.keys().map(String::as_str).collect()
    }
}

///
/// A single run configuration.
///
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// The network type to instantiate, resolved through a [`Registry`].
    pub network: String,

    /// Stop the run once the simulation time exceeds this bound,
    /// in seconds.
    pub sim_time_limit: Option<f64>,
    /// Stop the run at the next dispatch boundary once this much
    /// wall-clock time was consumed, in seconds.
    pub cpu_time_limit: Option<f64>,
    /// Stop the run after this many dispatched events.
    pub event_limit: Option<usize>,

    /// Per-module parameter bindings, keyed by dotted paths.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Per-module-path toggles for non-fatal diagnostics.
    #[serde(default)]
    pub warnings: BTreeMap<String, bool>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_yml::Value>,
}

impl Config {
    ///
    /// The random number stream seeds of this configuration, collected
    /// from its `seed-N` keys into a dense vector.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error on unrecognized options,
    /// non-integer seeds, or gaps in the stream numbering.
    ///
    pub fn seeds(&self) -> Result<Vec<u64>, SimError> {
        let mut seeds = BTreeMap::new();
        for (key, value) in &self.extra {
            let Some(n) = key.strip_prefix("seed-") else {
                return Err(SimError::Config(format!("unrecognized option '{key}'")));
            };
            let n = n.parse::<usize>().map_err(|_| {
                SimError::Config(format!("invalid seed stream number in '{key}'"))
            })?;
            let seed = value.as_u64().ok_or_else(|| {
                SimError::Config(format!("'{key}' must be a non-negative integer"))
            })?;
            seeds.insert(n, seed);
        }

        let mut dense = Vec::with_capacity(seeds.len());
        for (n, seed) in seeds {
            if n != dense.len() {
                return Err(SimError::Config(format!(
                    "seed streams must be numbered contiguously from 0, 'seed-{}' is missing",
                    dense.len()
                )));
            }
            dense.push(seed);
        }
        Ok(dense)
    }

    ///
    /// Instantiates this configuration: a simulation holding the
    /// configured network with all parameter bindings applied, and a
    /// matching pre-configured [`Builder`].
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the network type is unknown
    /// or an option is malformed.
    ///
    pub fn instantiate(&self, registry: &Registry) -> Result<(Sim, Builder), SimError> {
        let mut builder = Builder::new().seeds(self.seeds()?);
        if let Some(limit) = self.sim_time_limit {
            builder = builder.max_time(SimTime::from(limit));
        }
        if let Some(limit) = self.cpu_time_limit {
            builder = builder.cpu_time_limit(Duration::from_secs_f64(limit));
        }
        if let Some(limit) = self.event_limit {
            builder = builder.max_itr(limit);
        }

        let mut sim = Sim::new();
        for (key, value) in &self.parameters {
            sim.globals().parameters.insert(key.clone(), value.clone());
        }
        for (path, enabled) in &self.warnings {
            sim.globals().set_warnings(path.clone(), *enabled);
        }
        registry.build_network(&self.network, &mut sim)?;

        Ok((sim, builder))
    }
}
