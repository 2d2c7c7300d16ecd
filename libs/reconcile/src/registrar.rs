//! Creation of predefined shards.
//!
//! Policy is create-if-absent: a shard that already exists is never touched,
//! even if its attributes differ from the template.

use crate::load::is_admissible;
use crate::model::{NewShard, Snapshot};
use crate::policy::Policy;

/// Attributes applied to every shard the registrar creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDefaults {
    pub virtual_mac: String,
}

impl Default for ShardDefaults {
    fn default() -> Self {
        Self {
            virtual_mac: DEFAULT_VIRTUAL_MAC.to_string(),
        }
    }
}

/// Virtual MAC assigned to created shards unless configured otherwise.
pub const DEFAULT_VIRTUAL_MAC: &str = "00:00:01:00:00:00";

/// Shards to create for templates missing from the snapshot, in template order.
///
/// A created shard starts on its statically bound user plane when that plane
/// is admissible, and unassigned otherwise.
pub fn ensure_predefined(
    snapshot: &Snapshot,
    policy: &Policy,
    defaults: &ShardDefaults,
) -> Vec<NewShard> {
    policy
        .templates()
        .iter()
        .filter(|template| snapshot.shard(&template.name).is_none())
        .map(|template| {
            let desired_user_plane = policy
                .binding(&template.name)
                .and_then(|name| snapshot.user_plane(name))
                .filter(|up| is_admissible(up, snapshot))
                .map(|up| up.name.clone())
                .unwrap_or_default();

            NewShard {
                name: template.name.clone(),
                virtual_mac: defaults.virtual_mac.clone(),
                max_session_count: template.max_session_count(),
                prefixes: template.prefix_strings(),
                desired_user_plane,
            }
        })
        .collect()
}
