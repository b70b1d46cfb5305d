//! Strip Engine
//!
//! Passes never delete words directly; they push word ranges here and a single
//! compaction removes them all at once.
//!
//! # Compaction Algorithm
//! 1. Sort the pending ranges by start and merge overlapping or touching ones
//! 2. Walk the buffer once, advancing a cursor through the merged ranges and copying
//!    every word outside them down to its compacted position
//! 3. Truncate the buffer and clear the list

use std::ops::Range;

use smallvec::SmallVec;

/// Pending word ranges scheduled for deletion.
#[derive(Debug, Clone, Default)]
pub struct StripList {
    /// Unsorted, possibly overlapping ranges.
    /// Uses SmallVec - most passes strip only a handful of instructions
    ranges: SmallVec<[Range<usize>; 8]>,
}

impl StripList {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of ranges pushed (before merging).
    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Schedule `range` for deletion. Empty ranges are ignored.
    #[inline]
    pub fn push(&mut self, range: Range<usize>) {
        if range.start < range.end {
            self.ranges.push(range);
        }
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Sorted, disjoint, non-adjacent ranges covering every pending word.
    pub fn merged(&self) -> Vec<Range<usize>> {
        let mut sorted: Vec<Range<usize>> = self.ranges.to_vec();
        sorted.sort_by_key(|range| (range.start, range.end));

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        merged
    }

    /// Whether `position` lies inside a pending range.
    pub fn contains(&self, position: usize) -> bool {
        self.ranges.iter().any(|range| range.contains(&position))
    }

    /// Remove every pending range from `words` and clear the list.
    ///
    /// # Returns
    /// Number of words removed.
    pub fn compact(&mut self, words: &mut Vec<u32>) -> usize {
        let merged: Vec<Range<usize>> = self.merged();
        self.ranges.clear();

        let len: usize = words.len();
        let mut write: usize = 0;
        let mut cursor = merged.iter().peekable();

        for read in 0..len {
            while cursor.peek().is_some_and(|range| read >= range.end) {
                cursor.next();
            }
            let stripped: bool = cursor.peek().is_some_and(|range| range.contains(&read));
            if !stripped {
                words[write] = words[read];
                write += 1;
            }
        }

        words.truncate(write);
        len - write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overlapping_and_adjacent() {
        let mut list = StripList::new();
        list.push(10..12);
        list.push(2..4);
        list.push(3..6);
        list.push(6..7);
        list.push(8..8);

        assert_eq!(list.len(), 4);
        assert_eq!(list.merged(), vec![2..7, 10..12]);
    }

    #[test]
    fn test_compact() {
        let mut words: Vec<u32> = (0..10).collect();
        let mut list = StripList::new();
        list.push(7..9);
        list.push(1..3);
        list.push(2..4);

        assert_eq!(list.compact(&mut words), 5);
        assert_eq!(words, vec![0, 4, 5, 6, 9]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_compact_empty_is_noop() {
        let mut words: Vec<u32> = vec![1, 2, 3];
        let mut list = StripList::new();
        assert_eq!(list.compact(&mut words), 0);
        assert_eq!(words, vec![1, 2, 3]);
    }

    #[test]
    fn test_compact_to_end() {
        let mut words: Vec<u32> = vec![1, 2, 3, 4];
        let mut list = StripList::new();
        list.push(2..4);
        assert_eq!(list.compact(&mut words), 2);
        assert_eq!(words, vec![1, 2]);
        assert!(!list.contains(2));
    }
}
