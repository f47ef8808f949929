//! The `cursor` module defines the [`Cursor`] position type used to
//! delimit the readable and writable windows of a
//! [`crate::StagedIovec`]: an explicit (segment index, byte offset)
//! pair into an ordered sequence of fixed-size segments.
//!
//! Cursors are plain values; all arithmetic goes through the segment
//! lengths, so a cursor stays meaningful when the adapter that owns
//! it moves.
use std::ops::Range;

/// A [`Cursor`] addresses one byte position in a segment sequence.
///
/// Canonical form: either `offset` is strictly inside `lens[segment]`,
/// or the cursor is the one-past-the-end sentinel
/// `(lens.len(), 0)`.  [`Cursor::advance`] always returns canonical
/// cursors, assuming the segment lengths are all nonzero.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Cursor {
    pub segment: usize,
    pub offset: usize,
}

impl Cursor {
    /// The start of the segment sequence.
    pub const ORIGIN: Cursor = Cursor {
        segment: 0,
        offset: 0,
    };

    /// Moves the cursor forward by `count` bytes over segments with
    /// the given `lens`.
    ///
    /// The caller must ensure `count <= self.remaining(lens)`; the
    /// method panics (out-of-bounds index) otherwise.
    #[must_use]
    pub fn advance(mut self, lens: &[usize], mut count: usize) -> Cursor {
        while count > 0 {
            let left_in_segment = lens[self.segment] - self.offset;
            if count < left_in_segment {
                self.offset += count;
                return self;
            }

            count -= left_in_segment;
            self.segment += 1;
            self.offset = 0;
        }

        self
    }

    /// Returns the number of bytes between the cursor and the end of
    /// the segment sequence.
    #[must_use]
    pub fn remaining(self, lens: &[usize]) -> usize {
        if self.segment >= lens.len() {
            return 0;
        }

        lens[self.segment..].iter().sum::<usize>() - self.offset
    }

    /// Returns an iterator of `(segment index, byte range)` pairs
    /// that covers exactly `count` bytes starting at the cursor.
    ///
    /// The caller must ensure `count <= self.remaining(lens)`.
    #[must_use]
    pub fn span(self, lens: &[usize], count: usize) -> Span<'_> {
        Span {
            lens,
            cursor: self,
            left: count,
        }
    }
}

/// Iterator over the per-segment byte ranges covered by a cursor and
/// a byte count.  See [`Cursor::span`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct Span<'a> {
    lens: &'a [usize],
    cursor: Cursor,
    left: usize,
}

impl Iterator for Span<'_> {
    type Item = (usize, Range<usize>);

    fn next(&mut self) -> Option<(usize, Range<usize>)> {
        if self.left == 0 {
            return None;
        }

        let begin = self.cursor.offset;
        let take = (self.lens[self.cursor.segment] - begin).min(self.left);
        let item = (self.cursor.segment, begin..begin + take);

        self.left -= take;
        // Either the segment is exhausted, or `left` just hit zero;
        // stepping to the next segment is correct in both cases.
        self.cursor = Cursor {
            segment: self.cursor.segment + 1,
            offset: 0,
        };

        Some(item)
    }
}

// Walk a cursor through two segments, one byte at a time.
#[test]
fn test_advance_miri() {
    let lens = [4usize, 6];

    let mut cursor = Cursor::ORIGIN;
    for expected in [
        Cursor {
            segment: 0,
            offset: 1,
        },
        Cursor {
            segment: 0,
            offset: 2,
        },
        Cursor {
            segment: 0,
            offset: 3,
        },
        Cursor {
            segment: 1,
            offset: 0,
        },
        Cursor {
            segment: 1,
            offset: 1,
        },
    ] {
        cursor = cursor.advance(&lens, 1);
        assert_eq!(cursor, expected);
    }

    // A multi-byte step across the segment boundary lands in the
    // same place as the equivalent single-byte steps.
    assert_eq!(
        Cursor::ORIGIN.advance(&lens, 5),
        Cursor {
            segment: 1,
            offset: 1
        }
    );

    // Advancing over everything yields the end sentinel.
    assert_eq!(
        Cursor::ORIGIN.advance(&lens, 10),
        Cursor {
            segment: 2,
            offset: 0
        }
    );

    // Zero-byte steps are no-ops, including at the sentinel.
    let end = Cursor::ORIGIN.advance(&lens, 10);
    assert_eq!(end.advance(&lens, 0), end);
}

#[test]
fn test_remaining_miri() {
    let lens = [4usize, 6];

    assert_eq!(Cursor::ORIGIN.remaining(&lens), 10);
    assert_eq!(Cursor::ORIGIN.advance(&lens, 3).remaining(&lens), 7);
    assert_eq!(Cursor::ORIGIN.advance(&lens, 4).remaining(&lens), 6);
    assert_eq!(Cursor::ORIGIN.advance(&lens, 10).remaining(&lens), 0);
    assert_eq!(Cursor::ORIGIN.remaining(&[]), 0);
}

#[test]
fn test_span_miri() {
    let lens = [4usize, 6, 2];

    // A span inside one segment.
    let ranges: Vec<_> = Cursor::ORIGIN.advance(&lens, 1).span(&lens, 2).collect();
    assert_eq!(ranges, vec![(0, 1..3)]);

    // A span that covers the rest of the first segment exactly.
    let ranges: Vec<_> = Cursor::ORIGIN.advance(&lens, 1).span(&lens, 3).collect();
    assert_eq!(ranges, vec![(0, 1..4)]);

    // A span across all three segments.
    let ranges: Vec<_> = Cursor::ORIGIN.advance(&lens, 2).span(&lens, 9).collect();
    assert_eq!(ranges, vec![(0, 2..4), (1, 0..6), (2, 0..1)]);

    // Empty spans yield nothing, even at the end sentinel.
    assert_eq!(Cursor::ORIGIN.span(&lens, 0).count(), 0);
    assert_eq!(Cursor::ORIGIN.advance(&lens, 12).span(&lens, 0).count(), 0);
}
