//! Loop marks: a sorted, de-duplicated list of timestamps.

use crate::types::LoopSegment;

pub const DEFAULT_MARK_EPSILON: f64 = 0.001;

/// Strictly ascending mark timestamps, no two within the set's epsilon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkSet {
    marks: Vec<f64>,
}

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.marks
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    /// Insert `t` keeping order. Returns false if a mark already sits within `eps`.
    pub fn insert_unique(&mut self, t: f64, eps: f64) -> bool {
        insert_unique(&mut self.marks, t, eps)
    }

    /// Drop every mark within `eps` of `t`. Returns how many were removed.
    pub fn remove_near(&mut self, t: f64, eps: f64) -> usize {
        let before = self.marks.len();
        self.marks.retain(|m| (m - t).abs() >= eps);
        before - self.marks.len()
    }

    pub fn resolve_segment(&self, playhead: f64, total_duration: f64) -> Option<LoopSegment> {
        resolve_segment(&self.marks, playhead, total_duration)
    }

    /// First mark strictly after `t + eps`, wrapping to the first mark.
    pub fn next_after(&self, t: f64, eps: f64) -> Option<f64> {
        self.marks
            .iter()
            .copied()
            .find(|&m| m > t + eps)
            .or_else(|| self.marks.first().copied())
    }

    /// The mark closest to `t` and its distance.
    pub fn nearest(&self, t: f64) -> Option<(f64, f64)> {
        self.marks
            .iter()
            .map(|&m| (m, (m - t).abs()))
            .fold(None, |best: Option<(f64, f64)>, cur| match best {
                Some(b) if b.1 <= cur.1 => Some(b),
                _ => Some(cur),
            })
    }
}

/// Insert into an already-sorted list without re-sorting.
///
/// Scans ascending: a mark within `eps` makes this a no-op, otherwise `t` goes
/// in front of the first larger mark (or at the end).
pub fn insert_unique(marks: &mut Vec<f64>, t: f64, eps: f64) -> bool {
    match marks.iter().position(|&m| (m - t).abs() < eps || m > t) {
        Some(i) if (marks[i] - t).abs() < eps => false,
        Some(i) => {
            marks.insert(i, t);
            true
        }
        None => {
            marks.push(t);
            true
        }
    }
}

/// Which loop segment the playhead is in, given sorted marks.
///
/// Before (or on) the first mark: `[0, first]`. After (or on) the last mark:
/// `[last, total_duration]`. Otherwise the first consecutive pair bracketing
/// the playhead, so an interior mark belongs to the segment ending there.
pub fn resolve_segment(marks: &[f64], playhead: f64, total_duration: f64) -> Option<LoopSegment> {
    let (&first, &last) = (marks.first()?, marks.last()?);

    if playhead <= first {
        return Some(LoopSegment { start: 0.0, end: first });
    }
    if playhead >= last {
        return Some(LoopSegment {
            start: last,
            end: total_duration,
        });
    }

    marks
        .windows(2)
        .find(|pair| playhead >= pair[0] && playhead <= pair[1])
        .map(|pair| LoopSegment {
            start: pair[0],
            end: pair[1],
        })
        .or(Some(LoopSegment {
            start: last,
            end: total_duration,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64) -> Option<LoopSegment> {
        Some(LoopSegment { start, end })
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut marks = MarkSet::new();
        for t in [5.0, 1.0, 3.0, 9.0, 0.5] {
            assert!(marks.insert_unique(t, DEFAULT_MARK_EPSILON));
        }
        assert_eq!(marks.as_slice(), &[0.5, 1.0, 3.0, 5.0, 9.0]);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut marks = MarkSet::new();
        assert!(marks.insert_unique(2.0, DEFAULT_MARK_EPSILON));
        let snapshot = marks.clone();
        assert!(!marks.insert_unique(2.0, DEFAULT_MARK_EPSILON));
        assert!(!marks.insert_unique(2.0005, DEFAULT_MARK_EPSILON));
        assert_eq!(marks, snapshot);
        assert!(marks.insert_unique(2.002, DEFAULT_MARK_EPSILON));
        assert_eq!(marks.len(), 2);
    }

    #[test]
    fn test_resolve_segment_two_marks() {
        let marks = [2.0, 5.0];
        assert_eq!(resolve_segment(&marks, 0.0, 10.0), seg(0.0, 2.0));
        assert_eq!(resolve_segment(&marks, 2.0, 10.0), seg(0.0, 2.0));
        assert_eq!(resolve_segment(&marks, 3.0, 10.0), seg(2.0, 5.0));
        // last mark: the trailing segment wins
        assert_eq!(resolve_segment(&marks, 5.0, 10.0), seg(5.0, 10.0));
        assert_eq!(resolve_segment(&marks, 9.0, 10.0), seg(5.0, 10.0));
    }

    #[test]
    fn test_interior_mark_belongs_to_segment_ending_there() {
        let marks = [2.0, 5.0, 8.0];
        assert_eq!(resolve_segment(&marks, 5.0, 10.0), seg(2.0, 5.0));
        assert_eq!(resolve_segment(&marks, 5.1, 10.0), seg(5.0, 8.0));
    }

    #[test]
    fn test_resolve_segment_empty() {
        assert_eq!(resolve_segment(&[], 3.0, 10.0), None);
        assert_eq!(MarkSet::new().resolve_segment(3.0, 10.0), None);
    }

    #[test]
    fn test_next_after_wraps() {
        let mut marks = MarkSet::new();
        marks.insert_unique(2.0, DEFAULT_MARK_EPSILON);
        marks.insert_unique(6.0, DEFAULT_MARK_EPSILON);
        assert_eq!(marks.next_after(0.0, DEFAULT_MARK_EPSILON), Some(2.0));
        assert_eq!(marks.next_after(2.0, DEFAULT_MARK_EPSILON), Some(6.0));
        assert_eq!(marks.next_after(7.0, DEFAULT_MARK_EPSILON), Some(2.0));
        assert_eq!(MarkSet::new().next_after(1.0, DEFAULT_MARK_EPSILON), None);
    }

    #[test]
    fn test_nearest_and_remove() {
        let mut marks = MarkSet::new();
        for t in [1.0, 4.0, 4.5] {
            marks.insert_unique(t, DEFAULT_MARK_EPSILON);
        }
        assert_eq!(marks.nearest(4.3).map(|(m, _)| m), Some(4.5));
        assert_eq!(marks.nearest(0.0).map(|(m, _)| m), Some(1.0));
        assert_eq!(marks.remove_near(4.0005, DEFAULT_MARK_EPSILON), 1);
        assert_eq!(marks.as_slice(), &[1.0, 4.5]);
    }
}
