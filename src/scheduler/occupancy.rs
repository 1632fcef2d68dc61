//! Per-projector occupancy tracking.
//!
//! Booked windows are half-open minute intervals `[start, end)` kept in a
//! sorted map from interval start to interval end. Inserts coalesce
//! overlapping and adjacent intervals, removals split stored intervals where
//! needed, so the map always holds a minimal set of disjoint intervals in
//! ascending order.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};

/// Set of occupied minute intervals for one projector.
#[derive(Debug, Clone, Default)]
pub struct OccupancyIndex {
    /// start -> end, disjoint and non-adjacent.
    intervals: BTreeMap<i64, i64>,
}

impl OccupancyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// True when any stored interval shares a minute with `[start, end)`.
    ///
    /// Half-open semantics: a window ending at minute M does not conflict
    /// with one starting at M.
    pub fn intersects(&self, start: i64, end: i64) -> bool {
        if start >= end {
            return false;
        }
        if let Some((_, &prev_end)) = self.intervals.range(..=start).next_back() {
            if prev_end > start {
                return true;
            }
        }
        self.intervals
            .range((Excluded(start), Excluded(end)))
            .next()
            .is_some()
    }

    /// Mark `[start, end)` as occupied.
    ///
    /// Overlap with existing intervals is not re-checked here; the engine is
    /// the single synchronization point and verifies it before committing.
    /// Overlapping or touching intervals are merged into one.
    pub fn reserve(&mut self, start: i64, end: i64) {
        if start >= end {
            return;
        }
        let mut new_start = start;
        let mut new_end = end;

        if let Some((&prev_start, &prev_end)) = self.intervals.range(..=start).next_back() {
            if prev_end >= start {
                new_start = prev_start;
                new_end = new_end.max(prev_end);
                self.intervals.remove(&prev_start);
            }
        }

        let absorbed: Vec<i64> = self
            .intervals
            .range((Included(new_start), Included(new_end)))
            .map(|(&s, _)| s)
            .collect();
        for s in absorbed {
            if let Some(e) = self.intervals.remove(&s) {
                new_end = new_end.max(e);
            }
        }

        self.intervals.insert(new_start, new_end);
    }

    /// Remove `[start, end)` from the occupied set.
    ///
    /// Best-effort subtraction: minutes of the range that were not occupied
    /// are ignored, stored intervals extending past the range are split.
    pub fn release(&mut self, start: i64, end: i64) {
        if start >= end {
            return;
        }
        let mut touched: Vec<(i64, i64)> = Vec::new();

        if let Some((&prev_start, &prev_end)) = self.intervals.range(..start).next_back() {
            if prev_end > start {
                touched.push((prev_start, prev_end));
            }
        }
        touched.extend(self.intervals.range(start..end).map(|(&s, &e)| (s, e)));

        for (s, e) in touched {
            self.intervals.remove(&s);
            if s < start {
                self.intervals.insert(s, start);
            }
            if e > end {
                self.intervals.insert(end, e);
            }
        }
    }

    /// The merged interval list in ascending order.
    pub fn snapshot(&self) -> Vec<(i64, i64)> {
        self.intervals.iter().map(|(&s, &e)| (s, e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::OccupancyIndex;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_empty_never_intersects() {
        let index = OccupancyIndex::new();
        assert!(!index.intersects(0, 100));
        assert!(index.is_empty());
    }

    #[test]
    fn test_intersects_half_open() {
        let mut index = OccupancyIndex::new();
        index.reserve(100, 200);

        assert!(index.intersects(150, 160));
        assert!(index.intersects(50, 101));
        assert!(index.intersects(199, 300));
        assert!(index.intersects(100, 200));
        assert!(index.intersects(0, 1000));

        // Touching at either endpoint is not a conflict.
        assert!(!index.intersects(0, 100));
        assert!(!index.intersects(200, 300));
    }

    #[test]
    fn test_degenerate_query_never_intersects() {
        let mut index = OccupancyIndex::new();
        index.reserve(100, 200);
        assert!(!index.intersects(150, 150));
        assert!(!index.intersects(160, 150));
    }

    #[test]
    fn test_merge_on_insert() {
        let mut index = OccupancyIndex::new();
        index.reserve(100, 200);
        index.reserve(200, 300); // adjacent
        index.reserve(50, 120); // overlapping from the left
        index.reserve(250, 400); // overlapping from the right
        assert_eq!(index.snapshot(), vec![(50, 400)]);
    }

    #[test]
    fn test_insert_bridges_gap() {
        let mut index = OccupancyIndex::new();
        index.reserve(0, 10);
        index.reserve(20, 30);
        index.reserve(5, 25);
        assert_eq!(index.snapshot(), vec![(0, 30)]);
    }

    #[test]
    fn test_disjoint_inserts_stay_sorted() {
        let mut index = OccupancyIndex::new();
        index.reserve(300, 400);
        index.reserve(0, 50);
        index.reserve(100, 200);
        assert_eq!(index.snapshot(), vec![(0, 50), (100, 200), (300, 400)]);
    }

    #[test]
    fn test_release_roundtrip() {
        let mut index = OccupancyIndex::new();
        index.reserve(100, 200);
        index.release(100, 200);
        assert!(index.is_empty());
        assert!(!index.intersects(100, 200));
    }

    #[test]
    fn test_release_splits_interval() {
        let mut index = OccupancyIndex::new();
        index.reserve(0, 100);
        index.release(40, 60);
        assert_eq!(index.snapshot(), vec![(0, 40), (60, 100)]);
        assert!(!index.intersects(40, 60));
        assert!(index.intersects(39, 40));
        assert!(index.intersects(60, 61));
    }

    #[test]
    fn test_release_is_best_effort() {
        let mut index = OccupancyIndex::new();
        index.reserve(0, 100);
        // Range only partially occupied.
        index.release(50, 150);
        assert_eq!(index.snapshot(), vec![(0, 50)]);
        // Range not occupied at all.
        index.release(500, 600);
        assert_eq!(index.snapshot(), vec![(0, 50)]);
    }

    #[test]
    fn test_release_spanning_multiple_intervals() {
        let mut index = OccupancyIndex::new();
        index.reserve(0, 10);
        index.reserve(20, 30);
        index.reserve(40, 50);
        index.release(5, 45);
        assert_eq!(index.snapshot(), vec![(0, 5), (45, 50)]);
    }

    proptest! {
        /// The index agrees with a naive minute-set model and keeps its
        /// intervals disjoint, ascending, and non-adjacent under arbitrary
        /// reserve/release interleavings.
        #[test]
        fn prop_matches_minute_set_model(
            ops in prop::collection::vec(
                (any::<bool>(), 0i64..500, 1i64..60),
                1..40,
            )
        ) {
            let mut index = OccupancyIndex::new();
            let mut model: BTreeSet<i64> = BTreeSet::new();

            for (is_reserve, start, len) in ops {
                let end = start + len;
                if is_reserve {
                    index.reserve(start, end);
                    model.extend(start..end);
                } else {
                    index.release(start, end);
                    for minute in start..end {
                        model.remove(&minute);
                    }
                }
            }

            let snapshot = index.snapshot();
            for window in snapshot.windows(2) {
                let (_, prev_end) = window[0];
                let (next_start, _) = window[1];
                prop_assert!(prev_end < next_start);
            }
            for &(s, e) in &snapshot {
                prop_assert!(s < e);
            }

            let occupied: i64 = snapshot.iter().map(|(s, e)| e - s).sum();
            prop_assert_eq!(occupied as usize, model.len());

            for probe_start in (0..560).step_by(7) {
                let probe_end = probe_start + 5;
                let expected = (probe_start..probe_end).any(|m| model.contains(&m));
                prop_assert_eq!(index.intersects(probe_start, probe_end), expected);
            }
        }
    }
}
