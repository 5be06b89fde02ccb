use std::num::{NonZeroU64, ParseIntError};
use std::str::FromStr;

/// A selection of [`Frame`](super::Frame)s.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum FrameSelection {
    /// Include all frames that are in a trajectory.
    #[default]
    All,
    /// Include frames that lie within a certain [`Range`].
    Range(Range),
    /// Include frames that match the indices in this list.
    ///
    /// Invariant: The indices in the FrameList are _unique_ and _sorted_.
    FrameList(Vec<usize>),
}

impl FrameSelection {
    /// Determine whether some index `idx` is included in this [`FrameSelection`].
    ///
    /// Will return [`None`] once the index is beyond the scope of this `FrameSelection`.
    pub fn is_included(&self, idx: usize) -> Option<bool> {
        match self {
            FrameSelection::All => Some(true),
            FrameSelection::Range(range) => range.is_included(idx as u64),
            FrameSelection::FrameList(indices) => {
                if *indices.last()? < idx {
                    None
                } else {
                    Some(indices.binary_search(&idx).is_ok())
                }
            }
        }
    }

    /// Returns the exclusive upper bound of this selection, if it has one.
    pub fn until(&self) -> Option<usize> {
        match self {
            FrameSelection::All => None,
            FrameSelection::Range(range) => range.end.map(|end| end as usize),
            FrameSelection::FrameList(indices) => Some(indices.last().map_or(0, |&last| last + 1)),
        }
    }
}

/// A selection of [`Frame`](super::Frame)s to be read from a [`DcdReader`](super::DcdReader).
///
/// The `start` of a [`Range`] is always bounded, and is zero by default.
/// The `end` may be bounded or unbounded. In case the end is unbounded ([`None`]), a `Range`
/// instructs the `DcdReader` to just read up to and including the last frame. If it is bounded
/// by [`Some`] value, the frames up to that index will be read.
/// The `step` describes the number of frames that passed in each stride.
/// The number of skipped `Frame`s is equal to `step` - 1.
/// For instance, given a `step` of four, one `Frame` is read and the following three are skipped.
///
/// # Note
///
/// An instance where `start` > `end` is a valid `Range`, but it will not make much sense,
/// since the `Range` will be understood to produce zero steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// The `start` of a [`Range`] is always bounded, and is zero by default.
    pub start: u64,
    /// The `end` may be bounded or unbounded.
    ///
    /// When `end` is bounded, it is an exclusive bound.
    pub end: Option<u64>,
    /// The `step` describes the number of frames that passed in each stride.
    pub step: NonZeroU64,
}

impl Range {
    pub fn new(start: Option<u64>, end: Option<u64>, step: Option<NonZeroU64>) -> Self {
        let mut sel = Self {
            end,
            ..Self::default()
        };
        if let Some(start) = start {
            sel.start = start;
        }
        if let Some(step) = step {
            sel.step = step;
        }
        sel
    }

    fn is_included(&self, idx: u64) -> Option<bool> {
        if let Some(end) = self.end {
            // Determine whether `idx` is already beyond the defined range.
            if end <= idx {
                return None;
            }
        }
        let in_range = self.start <= idx;
        let in_step = in_range && (idx - self.start) % self.step == 0;
        Some(in_step)
    }
}

impl Default for Range {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            step: NonZeroU64::MIN,
        }
    }
}

impl FromStr for Range {
    type Err = ParseIntError;

    /// Parse a range in the format `start:stop:step`, where each of the values is optional.
    ///
    /// - `:100` selects the first 100 frames.
    /// - `3:14` selects the 4th up to and including the 14th frames, 11 frames in total.
    /// - `:100:2` selects every second frame from the first 100 frames, 50 in total.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components = s.split(':');
        let mut next = || components.next().filter(|c| !c.is_empty());
        let start = next().map(str::parse).transpose()?;
        let end = next().map(str::parse).transpose()?;
        let step = next().map(NonZeroU64::from_str).transpose()?;
        Ok(Range::new(start, end, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_selection() {
        let list_empty = FrameSelection::FrameList(vec![]);
        let list_zero = FrameSelection::FrameList(vec![0]);
        let range_empty = FrameSelection::Range(Range::new(None, Some(0), None));

        for idx in 0..1000 {
            assert!(list_empty.is_included(idx).is_none());
            if idx > 0 {
                assert!(list_zero.is_included(idx).is_none());
            }
            assert!(range_empty.is_included(idx).is_none());
        }
        assert_eq!(list_empty.until(), Some(0));
        assert_eq!(list_zero.until(), Some(1));
    }

    #[test]
    fn first_n() {
        let n = 100;
        let step = NonZeroU64::new(17).unwrap();

        let list = FrameSelection::FrameList((0..n).collect());
        let until = FrameSelection::Range(Range::new(None, Some(n as u64), None));
        let from_n = FrameSelection::Range(Range::new(Some(n as u64), None, None));
        let until_stepped = FrameSelection::Range(Range::new(None, Some(n as u64), Some(step)));
        let from_n_stepped = FrameSelection::Range(Range::new(Some(n as u64), None, Some(step)));
        let all = FrameSelection::All;

        for idx in 0..2 * n {
            if idx < n {
                assert_eq!(list.is_included(idx), Some(true));
                assert_eq!(until.is_included(idx), Some(true));
                assert_eq!(
                    until_stepped.is_included(idx),
                    Some(idx as u64 % step.get() == 0),
                );
            } else {
                assert!(list.is_included(idx).is_none());
                assert!(until.is_included(idx).is_none());
                assert!(until_stepped.is_included(idx).is_none());
            }
            let from_n_included = idx >= n;
            assert_eq!(from_n.is_included(idx), Some(from_n_included));
            assert_eq!(
                from_n_stepped.is_included(idx),
                Some(from_n_included && (idx - n) as u64 % step.get() == 0),
            );
            assert_eq!(all.is_included(idx), Some(true));
        }
    }

    #[test]
    fn sparse_list() {
        let list = FrameSelection::FrameList(vec![2, 3, 7]);
        let included: Vec<_> = (0..10).map(|idx| list.is_included(idx)).collect();
        assert_eq!(
            included,
            [
                Some(false),
                Some(false),
                Some(true),
                Some(true),
                Some(false),
                Some(false),
                Some(false),
                Some(true),
                None,
                None
            ]
        );
        assert_eq!(list.until(), Some(8));
    }

    #[test]
    fn parse() {
        let step = |s| NonZeroU64::new(s).unwrap();
        let parse = |s: &str| s.parse::<Range>().unwrap();
        assert_eq!(parse(":100"), Range::new(None, Some(100), None));
        assert_eq!(parse("3:14"), Range::new(Some(3), Some(14), None));
        assert_eq!(parse(":100:2"), Range::new(None, Some(100), Some(step(2))));
        assert_eq!(parse("5"), Range::new(Some(5), None, None));
        assert_eq!(parse("::3"), Range::new(None, None, Some(step(3))));
        assert_eq!(parse(""), Range::default());
        assert!("a:b".parse::<Range>().is_err());
        assert!("::0".parse::<Range>().is_err());
    }
}
