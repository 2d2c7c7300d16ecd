//! Static placement policy: shard bindings and predefined shard templates.
//!
//! A policy is built once at startup and never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use crate::prefix::IpPrefix;

/// A predefined shard to create if the store does not have it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTemplate {
    pub name: String,
    pub prefixes: Vec<IpPrefix>,
    pub excludes: Vec<IpAddr>,
}

impl ShardTemplate {
    /// Session capacity: usable hosts across all prefixes, minus excluded
    /// hosts. Saturates at `u32::MAX`.
    pub fn max_session_count(&self) -> u32 {
        let excludes: BTreeSet<&IpAddr> = self.excludes.iter().collect();
        let total = self.prefixes.iter().fold(0u128, |total, prefix| {
            let excluded = excludes.iter().filter(|addr| prefix.is_host(addr)).count() as u128;
            total.saturating_add(prefix.host_count() - excluded)
        });
        u32::try_from(total).unwrap_or(u32::MAX)
    }

    pub fn prefix_strings(&self) -> Vec<String> {
        self.prefixes.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    /// Shard name to statically bound user plane name.
    bindings: BTreeMap<String, String>,

    templates: Vec<ShardTemplate>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a shard to a user plane. A later binding for the same shard
    /// replaces the earlier one.
    pub fn bind(&mut self, shard: impl Into<String>, user_plane: impl Into<String>) {
        self.bindings.insert(shard.into(), user_plane.into());
    }

    pub fn add_template(&mut self, template: ShardTemplate) {
        self.templates.push(template);
    }

    /// Statically bound user plane for a shard, if any.
    pub fn binding(&self, shard: &str) -> Option<&str> {
        self.bindings.get(shard).map(String::as_str)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn templates(&self) -> &[ShardTemplate] {
        &self.templates
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.templates.is_empty()
    }
}
