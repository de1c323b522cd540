// Copyright (c) 2024 The Regents of the University of Michigan.
// Part of clusterstats, released under the BSD 3-Clause License.

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::builtin::BuiltIn;
use crate::source::command::run_with_timeout;
use crate::{Error, DEFAULT_NO_ACCOUNTING_MARKER, DEFAULT_QUERY_TIMEOUT, DEFAULT_SUBMIT_MARKER};

/// Cluster configuration
///
/// `Configuration` stores the cluster configuration for each defined
/// cluster.
///
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// The cluster configurations.
    #[serde(default)]
    pub(crate) cluster: Vec<Cluster>,
}

/// Cluster
///
/// `Cluster` stores everything needed to gather accounting data on a single
/// cluster. It is read from the `clusters.toml` file.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Cluster {
    /// The cluster's name.
    pub name: String,

    /// The method used to automatically identify this cluster.
    pub identify: IdentificationMethod,

    /// The accounting tools available on the cluster.
    pub source: SourceType,

    /// Phrase that marks submission lines in the workflow log.
    pub submit_marker: Option<String>,

    /// Phrase in the history check output that marks jobs without accounting.
    pub no_accounting_marker: Option<String>,

    /// Seconds to wait on a single accounting query.
    pub timeout: Option<u64>,
}

/// Methods to identify clusters.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationMethod {
    /// Identify a cluster when an environment variable is equal to a value.
    ByEnvironment(String, String),
    /// Identify a cluster when Slurm reports the given `ClusterName`.
    ClusterName(String),
    /// Identify a cluster always (true) or never (false)
    Always(bool),
}

/// Types of accounting sources.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Query with the Biowulf `jobhist` and `jobdata` utilities.
    BiowulfTools,
    /// Query with Slurm's `sacct`.
    Sacct,
}

impl Configuration {
    /// Identify the cluster.
    ///
    /// Identifying the current cluster consumes the `Configuration`.
    ///
    /// # Errors
    /// * `clusterstats::Error::ClusterNameNotFound` when a cluster by the given name
    ///   is not present in the configuration (when `name = Some(_)`).
    /// * `clusterstats::Error::ClusterNotFound` when the automatic identification
    ///   fails to find a cluster in the configuration.
    ///
    pub fn identify(self, name: Option<&str>) -> Result<Cluster, Error> {
        let cluster = if let Some(name) = name {
            self.cluster
                .into_iter()
                .find(|c| c.name == name)
                .ok_or_else(|| Error::ClusterNameNotFound(name.to_string()))?
        } else {
            let mut slurm_cluster_name = None;
            self.cluster
                .into_iter()
                .find(|c| c.identity_matches(&mut slurm_cluster_name))
                .ok_or_else(Error::ClusterNotFound)?
        };

        info!("Identified cluster '{}'.", cluster.name);
        Ok(cluster)
    }

    /// Open the cluster configuration
    ///
    /// Open `$HOME/.config/clusterstats/clusters.toml` if it exists and merge
    /// it with the built-in configuration.
    ///
    /// # Errors
    /// Returns `Err(clusterstats::Error)` when the file cannot be read or if
    /// there is as parse error.
    ///
    pub fn open() -> Result<Self, Error> {
        let home = match env::var("CLUSTERSTATS_HOME") {
            Ok(clusterstats_home) => PathBuf::from(clusterstats_home),
            Err(_) => home::home_dir().ok_or_else(Error::NoHome)?,
        };
        let clusters_toml_path = home
            .join(".config")
            .join("clusterstats")
            .join("clusters.toml");
        Self::open_from_path(clusters_toml_path)
    }

    fn open_from_path(clusters_toml_path: PathBuf) -> Result<Self, Error> {
        let mut clusters = Self::built_in();

        let clusters_file = match File::open(&clusters_toml_path) {
            Ok(file) => file,
            Err(error) => match error.kind() {
                io::ErrorKind::NotFound => {
                    trace!(
                        "'{}' does not exist, using built-in clusters.",
                        &clusters_toml_path.display()
                    );
                    return Ok(clusters);
                }
                _ => return Err(Error::FileRead(clusters_toml_path, error)),
            },
        };

        let mut buffer = BufReader::new(clusters_file);
        let mut clusters_string = String::new();
        buffer
            .read_to_string(&mut clusters_string)
            .map_err(|e| Error::FileRead(clusters_toml_path.clone(), e))?;

        trace!("Parsing '{}'.", &clusters_toml_path.display());
        let user_config = Self::parse_str(&clusters_toml_path, &clusters_string)?;
        clusters.merge(&user_config);
        Ok(clusters)
    }

    /// Parse a `Configuration` from a TOML string
    ///
    /// Does *NOT* merge with the built-in configuration.
    ///
    /// # Errors
    /// * `Error::TOMLParse` when `toml` is not a valid configuration.
    /// * `Error::EmptyClusterMarker` when a cluster sets a marker to `""`.
    ///
    pub(crate) fn parse_str(path: &Path, toml: &str) -> Result<Self, Error> {
        let configuration: Configuration =
            toml::from_str(toml).map_err(|e| Error::TOMLParse(path.into(), e))?;

        // An empty marker matches every line.
        for cluster in &configuration.cluster {
            for (key, marker) in [
                ("submit_marker", &cluster.submit_marker),
                ("no_accounting_marker", &cluster.no_accounting_marker),
            ] {
                if marker.as_deref() == Some("") {
                    return Err(Error::EmptyClusterMarker(
                        path.into(),
                        cluster.name.clone(),
                        key.into(),
                    ));
                }
            }
        }

        Ok(configuration)
    }

    /// Merge keys from another configuration into this one.
    ///
    /// Merging adds new keys from `b` into self. It also overrides any keys in
    /// both with the value in `b`.
    ///
    fn merge(&mut self, b: &Self) {
        let mut new_cluster = b.cluster.clone();
        new_cluster.extend(self.cluster.clone());
        self.cluster = new_cluster;
    }
}

impl Cluster {
    /// Check if the cluster's identity matches the current environment.
    ///
    /// `slurm_cluster_name` caches the result of `scontrol` so that it runs
    /// at most once while checking all clusters.
    ///
    fn identity_matches(&self, slurm_cluster_name: &mut Option<Option<String>>) -> bool {
        trace!(
            "Checking cluster '{}' via '{:?}'.",
            self.name,
            self.identify
        );
        match &self.identify {
            IdentificationMethod::Always(condition) => *condition,
            IdentificationMethod::ByEnvironment(variable, value) => {
                env::var(variable).is_ok_and(|x| x == *value)
            }
            IdentificationMethod::ClusterName(name) => slurm_cluster_name
                .get_or_insert_with(query_cluster_name)
                .as_ref()
                .is_some_and(|x| x == name),
        }
    }

    /// The phrase that marks submission lines in the workflow log.
    pub fn submit_marker(&self) -> &str {
        self.submit_marker.as_deref().unwrap_or(DEFAULT_SUBMIT_MARKER)
    }

    /// The phrase that marks jobs without accounting data.
    pub fn no_accounting_marker(&self) -> &str {
        self.no_accounting_marker
            .as_deref()
            .unwrap_or(DEFAULT_NO_ACCOUNTING_MARKER)
    }

    /// Seconds to wait on a single accounting query.
    pub fn timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT)
    }
}

/// Parse the `key = value` lines printed by `scontrol show config`.
pub(crate) fn parse_scontrol_config(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Seconds to wait on `scontrol show config`.
const SCONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// Ask Slurm for the name of the current cluster.
///
/// # Returns
/// `None` when `scontrol` is not available or does not report a name.
///
fn query_cluster_name() -> Option<String> {
    read_cluster_name("scontrol", &["show", "config"], SCONTROL_TIMEOUT)
}

fn read_cluster_name(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    debug!("Querying the cluster name with {program}.");
    let never_terminate = AtomicBool::new(false);

    match run_with_timeout(program, args, timeout, &never_terminate) {
        Ok(output) => {
            let config = parse_scontrol_config(&output);
            let name = config.get("ClusterName").cloned();
            trace!("{program} reports ClusterName = {name:?}.");
            name
        }
        Err(error @ Error::QueryTimeout(..)) => {
            warn!("{error}");
            None
        }
        Err(error) => {
            trace!("Unable to query the cluster name: {error}");
            None
        }
    }
}
