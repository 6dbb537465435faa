//! Splitting the settings-index space across workers.
//!
//! Ranges are contiguous, ascending, non-empty, and together cover
//! `0..total` exactly once.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("range {index} is empty")]
    EmptyRange { index: usize },

    #[error("range {index} starts at {found}, expected {expected}")]
    Discontiguous {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("ranges cover 0..{covered}, expected 0..{total}")]
    Incomplete { covered: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    ranges: Vec<Range<usize>>,
}

impl Partition {
    /// Splits `0..total` into `min(workers, total)` near-equal ranges.
    ///
    /// Range `t` starts at `floor(t * total / k)`. Zero workers is treated
    /// as one; an empty index space yields no ranges.
    pub fn even(total: usize, workers: usize) -> Self {
        let k = workers.max(1).min(total);
        let bound = |t: usize| ((t as u128 * total as u128) / k.max(1) as u128) as usize;
        let ranges = (0..k).map(|t| bound(t)..bound(t + 1)).collect();
        Self { ranges }
    }

    /// Uses caller-supplied ranges after checking them against `total`.
    pub fn from_ranges(ranges: Vec<Range<usize>>, total: usize) -> Result<Self, PartitionError> {
        let partition = Self { ranges };
        partition.verify(total)?;
        Ok(partition)
    }

    pub fn verify(&self, total: usize) -> Result<(), PartitionError> {
        let mut expected = 0;
        for (index, range) in self.ranges.iter().enumerate() {
            if range.start != expected {
                return Err(PartitionError::Discontiguous {
                    index,
                    expected,
                    found: range.start,
                });
            }
            if range.is_empty() {
                return Err(PartitionError::EmptyRange { index });
            }
            expected = range.end;
        }
        if expected != total {
            return Err(PartitionError::Incomplete {
                covered: expected,
                total,
            });
        }
        Ok(())
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn workers(&self) -> usize {
        self.ranges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_bounds() {
        let p = Partition::even(10, 3);
        assert_eq!(p.ranges(), &[0..3, 3..6, 6..10]);
        assert!(p.verify(10).is_ok());
    }

    #[test]
    fn more_workers_than_points() {
        let p = Partition::even(3, 8);
        assert_eq!(p.workers(), 3);
        assert_eq!(p.ranges(), &[0..1, 1..2, 2..3]);
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(Partition::even(5, 0).ranges(), &[0..5]);
    }

    #[test]
    fn empty_space_has_no_ranges() {
        let p = Partition::even(0, 4);
        assert_eq!(p.workers(), 0);
        assert!(p.verify(0).is_ok());
    }

    #[test]
    fn gaps_overlaps_and_short_cover_are_rejected() {
        assert_eq!(
            Partition::from_ranges(vec![0..3, 4..10], 10),
            Err(PartitionError::Discontiguous {
                index: 1,
                expected: 3,
                found: 4
            })
        );
        assert_eq!(
            Partition::from_ranges(vec![0..5, 3..10], 10),
            Err(PartitionError::Discontiguous {
                index: 1,
                expected: 5,
                found: 3
            })
        );
        assert_eq!(
            Partition::from_ranges(vec![0..5, 5..5, 5..10], 10),
            Err(PartitionError::EmptyRange { index: 1 })
        );
        assert_eq!(
            Partition::from_ranges(vec![0..5], 10),
            Err(PartitionError::Incomplete {
                covered: 5,
                total: 10
            })
        );
    }
}
