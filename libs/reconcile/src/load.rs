//! Load model for user plane selection.
//!
//! A user plane is a candidate iff it has a non-zero session capacity and its
//! controlling service gateway is present in the snapshot. Load is the ratio
//! of allocated to maximum sessions, compared exactly; ties go to the
//! lexicographically smallest user plane name.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{Snapshot, UserPlane};

/// Relative load of a user plane, `allocated / max`.
///
/// Ordered by exact rational comparison. A zero-capacity plane is loaded
/// beyond every plane with capacity.
#[derive(Debug, Clone, Copy)]
pub struct Load {
    allocated: u32,
    max: u32,
}

impl Load {
    pub fn new(allocated: u32, max: u32) -> Self {
        Self { allocated, max }
    }
}

impl Ord for Load {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.max, other.max) {
            (0, 0) => Ordering::Equal,
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            _ => {
                let lhs = u64::from(self.allocated) * u64::from(other.max);
                let rhs = u64::from(other.allocated) * u64::from(self.max);
                lhs.cmp(&rhs)
            }
        }
    }
}

impl PartialOrd for Load {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Load {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Load {}

impl std::fmt::Display for Load {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.allocated, self.max)
    }
}

/// Returns true if the user plane may receive shards.
pub fn is_admissible(user_plane: &UserPlane, snapshot: &Snapshot) -> bool {
    user_plane.max_session_count > 0
        && user_plane
            .service_gateway
            .as_deref()
            .is_some_and(|sg| snapshot.has_service_gateway(sg))
}

/// Pass-local view of the admissible user planes and their loads.
///
/// Assignments recorded during a pass raise the plane's allocated count so
/// later shards in the same pass see it. The counters are dropped with the
/// model; nothing is written back.
#[derive(Debug)]
pub struct LoadModel<'a> {
    candidates: BTreeMap<&'a str, Candidate<'a>>,
}

#[derive(Debug)]
struct Candidate<'a> {
    user_plane: &'a UserPlane,
    allocated: u32,
}

impl Candidate<'_> {
    fn load(&self) -> Load {
        Load::new(self.allocated, self.user_plane.max_session_count)
    }
}

impl<'a> LoadModel<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let candidates = snapshot
            .user_planes
            .iter()
            .filter(|up| is_admissible(up, snapshot))
            .map(|up| {
                (
                    up.name.as_str(),
                    Candidate {
                        user_plane: up,
                        allocated: up.allocated_session_count,
                    },
                )
            })
            .collect();
        Self { candidates }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn is_candidate(&self, name: &str) -> bool {
        self.candidates.contains_key(name)
    }

    pub fn user_plane(&self, name: &str) -> Option<&'a UserPlane> {
        self.candidates.get(name).map(|c| c.user_plane)
    }

    pub fn load_of(&self, name: &str) -> Option<Load> {
        self.candidates.get(name).map(Candidate::load)
    }

    /// Least-loaded candidate under the pass-local counters.
    pub fn select_least_loaded(&self) -> Option<&'a UserPlane> {
        // BTreeMap iterates in name order, so min_by keeps the first of equals.
        self.candidates
            .values()
            .min_by(|a, b| a.load().cmp(&b.load()))
            .map(|c| c.user_plane)
    }

    /// Count one more session against the named plane for the rest of the pass.
    pub fn record_assignment(&mut self, name: &str) {
        if let Some(candidate) = self.candidates.get_mut(name) {
            candidate.allocated = candidate.allocated.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceGateway;

    fn user_plane(name: &str, gateway: &str, max: u32, allocated: u32) -> UserPlane {
        UserPlane {
            name: name.to_string(),
            service_gateway: Some(gateway.to_string()),
            max_session_count: max,
            allocated_session_count: allocated,
            ..Default::default()
        }
    }

    fn snapshot(user_planes: Vec<UserPlane>) -> Snapshot {
        Snapshot {
            service_gateways: vec![ServiceGateway {
                name: "sg-1".to_string(),
            }],
            user_planes,
            ..Default::default()
        }
    }

    #[test]
    fn test_load_ordering_is_exact_ratio() {
        assert_eq!(Load::new(1, 2), Load::new(5, 10));
        assert!(Load::new(1, 3) < Load::new(1, 2));
        assert!(Load::new(9, 10) < Load::new(10, 10));
        assert!(Load::new(10, 10) < Load::new(11, 10));
        assert!(Load::new(1_000_000, 1) < Load::new(0, 0));
    }

    #[test]
    fn test_admissibility() {
        let snap = snapshot(vec![]);
        assert!(is_admissible(&user_plane("up-a", "sg-1", 10, 0), &snap));
        assert!(!is_admissible(&user_plane("up-b", "sg-1", 0, 0), &snap));
        assert!(!is_admissible(&user_plane("up-c", "sg-missing", 10, 0), &snap));

        let orphan = UserPlane {
            name: "up-d".to_string(),
            max_session_count: 10,
            ..Default::default()
        };
        assert!(!is_admissible(&orphan, &snap));
    }

    #[test]
    fn test_select_least_loaded_skips_inadmissible() {
        let snap = snapshot(vec![
            user_plane("up-a", "sg-1", 10, 9),
            user_plane("up-b", "sg-1", 0, 0),
            user_plane("up-c", "sg-gone", 10, 0),
        ]);
        let model = LoadModel::new(&snap);
        assert!(model.is_candidate("up-a"));
        assert!(!model.is_candidate("up-b"));
        assert!(!model.is_candidate("up-c"));
        assert_eq!(model.select_least_loaded().unwrap().name, "up-a");
    }

    #[test]
    fn test_select_least_loaded_breaks_ties_by_name() {
        let snap = snapshot(vec![
            user_plane("up-b", "sg-1", 10, 5),
            user_plane("up-a", "sg-1", 20, 10),
        ]);
        let model = LoadModel::new(&snap);
        assert_eq!(model.select_least_loaded().unwrap().name, "up-a");
    }

    #[test]
    fn test_select_least_loaded_none_without_candidates() {
        let snap = snapshot(vec![user_plane("up-a", "sg-1", 0, 0)]);
        let model = LoadModel::new(&snap);
        assert!(model.is_empty());
        assert!(model.select_least_loaded().is_none());
    }

    #[test]
    fn test_recorded_assignments_shift_selection() {
        let snap = snapshot(vec![
            user_plane("up-a", "sg-1", 4, 0),
            user_plane("up-b", "sg-1", 4, 0),
        ]);
        let mut model = LoadModel::new(&snap);

        let mut picks = Vec::new();
        for _ in 0..4 {
            let name = model.select_least_loaded().unwrap().name.as_str();
            picks.push(name);
            model.record_assignment(name);
        }

        assert_eq!(picks, vec!["up-a", "up-b", "up-a", "up-b"]);
        assert_eq!(model.load_of("up-a"), Some(Load::new(2, 4)));
        // The snapshot itself is untouched.
        assert_eq!(snap.user_planes[0].allocated_session_count, 0);
    }
}
