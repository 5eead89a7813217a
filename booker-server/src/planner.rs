//! Availability planner: which tables (or merged pairs) can seat a party?
//!
//! The planner is a pure read: given the venue's tables and the set of tables
//! occupied during the slot, it computes candidates without taking holds.
//! Between "planner says T is free" and "coordinator acquires a hold on T"
//! another client may win; the coordinator owns that race.

use serde::{Deserialize, Serialize};

use booker_core::{TableId, TableInfo};

/// One way to seat the party: a table, optionally merged with a partner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCandidate {
    /// The table the UI would preselect
    pub table: TableInfo,
    /// Merge partner, present only for pair candidates
    pub merged_with: Option<TableInfo>,
    /// Seats the candidate offers in total
    pub combined_capacity: i32,
}

/// Compute seating candidates for a party.
///
/// Singleton pass first: every free table with enough capacity, no partner.
/// Only when that yields nothing, the merge pass looks at unordered pairs of
/// free mergeable tables in the same room with enough combined capacity, and
/// emits each pair in **both** orientations, so a caller that preselected
/// either table finds a valid merge option.
///
/// No ranking is imposed; callers may sort by `combined_capacity` to prefer
/// tight fits.
#[must_use]
pub fn plan_candidates(
    tables: &[TableInfo],
    occupied: &std::collections::HashSet<TableId>,
    party_size: i32,
) -> Vec<TableCandidate> {
    let available: Vec<&TableInfo> = tables.iter().filter(|t| !occupied.contains(&t.id)).collect();

    let mut candidates: Vec<TableCandidate> = available
        .iter()
        .filter(|t| t.capacity >= party_size)
        .map(|t| TableCandidate {
            table: (*t).clone(),
            merged_with: None,
            combined_capacity: t.capacity,
        })
        .collect();

    if !candidates.is_empty() {
        return candidates;
    }

    for (i, first) in available.iter().enumerate() {
        if !first.can_merge {
            continue;
        }
        for second in available.iter().skip(i + 1) {
            if !second.can_merge || first.room_id != second.room_id {
                continue;
            }

            let combined = first.capacity + second.capacity;
            if combined < party_size {
                continue;
            }

            candidates.push(TableCandidate {
                table: (*first).clone(),
                merged_with: Some((*second).clone()),
                combined_capacity: combined,
            });
            candidates.push(TableCandidate {
                table: (*second).clone(),
                merged_with: Some((*first).clone()),
                combined_capacity: combined,
            });
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use booker_core::RoomId;
    use std::collections::HashSet;

    fn table(name: &str, room: RoomId, capacity: i32, can_merge: bool) -> TableInfo {
        TableInfo {
            id: TableId::new(),
            room_id: room,
            name: name.to_string(),
            capacity,
            can_merge,
            zone: "main".to_string(),
        }
    }

    #[test]
    fn singleton_candidates_for_fitting_tables() {
        let room = RoomId::new();
        let tables = vec![table("T1", room, 2, false), table("T2", room, 4, false)];

        let candidates = plan_candidates(&tables, &HashSet::new(), 4);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].table.name, "T2");
        assert!(candidates[0].merged_with.is_none());
    }

    #[test]
    fn occupied_tables_are_excluded() {
        let room = RoomId::new();
        let t1 = table("T1", room, 4, false);
        let t2 = table("T2", room, 4, false);
        let occupied: HashSet<TableId> = [t1.id].into();

        let candidates = plan_candidates(&[t1, t2.clone()], &occupied, 4);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].table.id, t2.id);
    }

    #[test]
    fn merge_pass_emits_both_orientations() {
        let room = RoomId::new();
        let t1 = table("T1", room, 2, true);
        let t2 = table("T2", room, 3, true);

        let candidates = plan_candidates(&[t1.clone(), t2.clone()], &HashSet::new(), 4);
        assert_eq!(candidates.len(), 2, "no singleton fits, one pair, two orientations");

        let primaries: Vec<TableId> = candidates.iter().map(|c| c.table.id).collect();
        assert!(primaries.contains(&t1.id));
        assert!(primaries.contains(&t2.id));
        for candidate in &candidates {
            assert_eq!(candidate.combined_capacity, 5);
            assert!(candidate.merged_with.is_some());
        }
    }

    #[test]
    fn merge_requires_both_tables_free() {
        let room = RoomId::new();
        let t1 = table("T1", room, 2, true);
        let t2 = table("T2", room, 3, true);
        let occupied: HashSet<TableId> = [t1.id].into();

        let candidates = plan_candidates(&[t1, t2], &occupied, 4);
        assert!(candidates.is_empty());
    }

    #[test]
    fn merge_pass_skipped_when_singleton_exists() {
        let room = RoomId::new();
        let tables = vec![
            table("T1", room, 2, true),
            table("T2", room, 3, true),
            table("Big", room, 6, true),
        ];

        let candidates = plan_candidates(&tables, &HashSet::new(), 4);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].table.name, "Big");
        assert!(candidates[0].merged_with.is_none());
    }

    #[test]
    fn merge_never_crosses_rooms() {
        let t1 = table("T1", RoomId::new(), 2, true);
        let t2 = table("T2", RoomId::new(), 3, true);

        let candidates = plan_candidates(&[t1, t2], &HashSet::new(), 4);
        assert!(candidates.is_empty());
    }

    #[test]
    fn non_mergeable_tables_never_pair() {
        let room = RoomId::new();
        let t1 = table("T1", room, 2, false);
        let t2 = table("T2", room, 3, true);

        let candidates = plan_candidates(&[t1, t2], &HashSet::new(), 4);
        assert!(candidates.is_empty());
    }

    #[test]
    fn undersized_pairs_are_skipped() {
        let room = RoomId::new();
        let t1 = table("T1", room, 2, true);
        let t2 = table("T2", room, 2, true);

        let candidates = plan_candidates(&[t1, t2], &HashSet::new(), 5);
        assert!(candidates.is_empty());
    }
}
