//! Shard to user plane mapping.
//!
//! [`reconcile`] is a pure function of the snapshot and the policy: it
//! recomputes the desired placement of every shard and returns only the
//! shards whose stored desired state differs.

use crate::connections::assign_to;
use crate::load::LoadModel;
use crate::model::{Assignment, Shard, ShardChange, Snapshot};
use crate::policy::Policy;

/// Outcome of one mapping computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingPlan {
    /// Shards to rewrite, in shard name order.
    pub changes: Vec<ShardChange>,

    /// The snapshot held no user planes at all; every mapped shard is reset.
    pub no_user_planes: bool,

    /// Static bindings whose user plane is missing or not admissible,
    /// as (shard, user plane).
    pub unavailable_bindings: Vec<(String, String)>,

    /// Shards without a binding for which no admissible user plane exists.
    pub unplaced: Vec<String>,

    /// Number of shards examined.
    pub shards: usize,
}

impl MappingPlan {
    pub fn is_converged(&self) -> bool {
        self.changes.is_empty()
    }
}

/// How the target of a shard was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement<'a> {
    Static(&'a str),
    Kept(&'a str),
    Selected(&'a str),
    Unmapped,
}

/// Compute the desired mapping for every shard in the snapshot.
///
/// Shards are processed in name order. A static binding always wins when its
/// user plane is admissible and unmaps the shard otherwise. A shard without a
/// binding keeps its current user plane while that plane stays admissible;
/// otherwise it goes to the least-loaded admissible plane, whose pass-local
/// load is raised by one for the shards that follow.
pub fn reconcile(snapshot: &Snapshot, policy: &Policy) -> MappingPlan {
    let mut shards: Vec<&Shard> = snapshot.shards.iter().collect();
    shards.sort_by(|a, b| a.name.cmp(&b.name));

    let mut plan = MappingPlan {
        shards: shards.len(),
        ..Default::default()
    };

    if snapshot.user_planes.is_empty() {
        plan.no_user_planes = true;
        plan.changes = shards
            .into_iter()
            .filter(|shard| shard.is_mapped())
            .map(|shard| change(shard, Assignment::unmapped()))
            .collect();
        return plan;
    }

    let mut loads = LoadModel::new(snapshot);

    for shard in shards {
        let placement = match policy.binding(&shard.name) {
            Some(bound) if loads.is_candidate(bound) => Placement::Static(bound),
            Some(bound) => {
                plan.unavailable_bindings
                    .push((shard.name.clone(), bound.to_string()));
                Placement::Unmapped
            }
            None if loads.is_candidate(&shard.desired_user_plane) => {
                Placement::Kept(&shard.desired_user_plane)
            }
            None => match loads.select_least_loaded() {
                Some(up) => {
                    loads.record_assignment(&up.name);
                    Placement::Selected(&up.name)
                }
                None => {
                    plan.unplaced.push(shard.name.clone());
                    Placement::Unmapped
                }
            },
        };

        let assignment = match placement {
            Placement::Static(name) | Placement::Kept(name) | Placement::Selected(name) => {
                match loads.user_plane(name) {
                    Some(up) => assign_to(snapshot, up),
                    None => Assignment::unmapped(),
                }
            }
            Placement::Unmapped => Assignment::unmapped(),
        };

        if assignment.differs_from(shard) {
            plan.changes.push(change(shard, assignment));
        }
    }

    plan
}

fn change(shard: &Shard, assignment: Assignment) -> ShardChange {
    ShardChange {
        shard: shard.name.clone(),
        previous_user_plane: shard.desired_user_plane.clone(),
        assignment,
        prefixes: shard.prefixes.clone(),
    }
}
