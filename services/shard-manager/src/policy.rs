//! Policy file loader.
//!
//! ```yaml
//! upsf:
//!   shards:
//!     - name: shard-a
//!       serviceGatewayUserPlane: up-1
//!       prefixes: [10.0.0.0/24]
//!       exclude: [10.0.0.1]
//! ```
//!
//! An entry with `serviceGatewayUserPlane` statically binds the shard. An
//! entry with `prefixes` is a predefined shard the registrar creates.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use upsf_reconcile::{IpPrefix, Policy, PrefixError, ShardTemplate};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed policy file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("shard entry {index} has no name")]
    MissingName { index: usize },

    #[error("shard {name} is defined more than once")]
    DuplicateShard { name: String },

    #[error("shard {name}: {source}")]
    InvalidAddress {
        name: String,
        #[source]
        source: PrefixError,
    },
}

#[derive(Debug, Default, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    upsf: Option<UpsfSection>,
}

#[derive(Debug, Default, Deserialize)]
struct UpsfSection {
    #[serde(default)]
    shards: Option<Vec<ShardEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShardEntry {
    name: Option<String>,
    service_gateway_user_plane: Option<String>,
    prefixes: Option<Vec<String>>,
    #[serde(default)]
    exclude: Vec<String>,
}

/// Load the policy file. A missing file is an empty policy.
pub fn load_policy(path: &Path) -> Result<Policy, PolicyError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Policy file not found, running without policy");
            return Ok(Policy::new());
        }
        Err(source) => {
            return Err(PolicyError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    parse_policy(&contents)
}

/// Parse policy YAML.
pub fn parse_policy(contents: &str) -> Result<Policy, PolicyError> {
    let mut policy = Policy::new();
    if contents.trim().is_empty() {
        return Ok(policy);
    }

    let file: Option<PolicyFile> = serde_yaml::from_str(contents)?;
    let entries = file
        .and_then(|f| f.upsf)
        .and_then(|s| s.shards)
        .unwrap_or_default();

    let mut seen = BTreeSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry
            .name
            .filter(|n| !n.is_empty())
            .ok_or(PolicyError::MissingName { index })?;

        if !seen.insert(name.clone()) {
            return Err(PolicyError::DuplicateShard { name });
        }

        if let Some(user_plane) = entry.service_gateway_user_plane.filter(|up| !up.is_empty()) {
            policy.bind(name.clone(), user_plane);
        }

        if let Some(prefixes) = entry.prefixes {
            let template = parse_template(name, &prefixes, &entry.exclude)?;
            policy.add_template(template);
        }
    }

    Ok(policy)
}

fn parse_template(
    name: String,
    prefixes: &[String],
    excludes: &[String],
) -> Result<ShardTemplate, PolicyError> {
    let invalid = |source| PolicyError::InvalidAddress {
        name: name.clone(),
        source,
    };

    let prefixes = prefixes
        .iter()
        .map(|p| p.parse::<IpPrefix>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(invalid)?;

    let excludes = excludes
        .iter()
        .map(|a| {
            a.trim()
                .parse::<IpAddr>()
                .map_err(|_| PrefixError::InvalidAddress(a.clone()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(invalid)?;

    Ok(ShardTemplate {
        name,
        prefixes,
        excludes,
    })
}
