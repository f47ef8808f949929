use std::io::IoSlice;
use std::io::IoSliceMut;

use smallvec::SmallVec;

use super::cursor::Cursor;

/// The immutable view sequence returned by [`StagedIovec::data`] and
/// [`StagedIovec::segments`]: directly usable with
/// [`std::io::Write::write_vectored`].
pub type ReadableSlices<'a> = SmallVec<[IoSlice<'a>; 4]>;

/// The mutable view sequence returned by [`StagedIovec::prepare`]:
/// directly usable with [`std::io::Read::read_vectored`].
pub type WritableSlices<'a> = SmallVec<[IoSliceMut<'a>; 4]>;

/// Failure reason for [`StagedIovec::prepare`]: the requested
/// reservation does not fit in the space still ahead of the staging
/// window.
///
/// The adapter's state is untouched when this error is returned; the
/// caller may retry with a smaller reservation, or drain the readable
/// bytes first and retry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CapacityError {
    requested: usize,
    available: usize,
}

impl CapacityError {
    /// Returns the reservation size passed to [`StagedIovec::prepare`].
    #[must_use]
    #[inline(always)]
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Returns the largest reservation that would have succeeded
    /// instead.
    #[must_use]
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.available
    }
}

impl std::fmt::Display for CapacityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reservation exceeds the backing segments' remaining capacity. requested={} available={}",
            self.requested, self.available
        )
    }
}

impl std::error::Error for CapacityError {}

/// A [`StagedIovec`] wraps a fixed sequence of caller-owned mutable
/// byte segments and slides a two-part window over them: a *readable*
/// region of already-produced bytes, and a *writable* region staged
/// by the most recent [`StagedIovec::prepare`] call.  Producers
/// reserve, fill, and [`StagedIovec::commit`]; consumers read
/// [`StagedIovec::data`] and [`StagedIovec::consume`].
///
/// The adapter never allocates, copies, or resizes the backing
/// memory; it only tracks cursors into the segment sequence.  The sum
/// of the segment lengths is a hard ceiling on readable plus staged
/// bytes: the window slides forward through the segment list and does
/// not wrap, although draining the adapter completely rewinds it to
/// the front of the sequence.
///
/// Construction takes `&'this mut` borrows of the segments, so the
/// adapter has exclusive access to the memory for its whole lifetime;
/// every view it hands out is a plain reborrow, and stale views are
/// rejected at compile time rather than by runtime checks.
#[derive(Debug, Default)]
pub struct StagedIovec<'this> {
    segments: SmallVec<[&'this mut [u8]; 4]>,
    // Segment lengths, in order.  Lengths are fixed at construction;
    // caching them keeps cursor arithmetic away from the `&mut`
    // segment borrows.
    lens: SmallVec<[usize; 4]>,
    max_size: usize,
    begin: Cursor,    // start of the readable region
    out: Cursor,      // start of the writable region
    in_size: usize,   // readable bytes
    out_size: usize,  // staged (reserved, uncommitted) bytes
}

impl<'this> StagedIovec<'this> {
    /// Creates an adapter over `segments`, in order.
    ///
    /// Empty segments are skipped: they contribute no capacity.  The
    /// adapter starts with no readable and no staged bytes.
    #[must_use]
    pub fn new(segments: impl IntoIterator<Item = &'this mut [u8]>) -> Self {
        let segments: SmallVec<[&'this mut [u8]; 4]> = segments
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect();
        let lens: SmallVec<[usize; 4]> = segments.iter().map(|segment| segment.len()).collect();
        let max_size = lens.iter().sum();

        let ret = StagedIovec {
            segments,
            lens,
            max_size,
            begin: Cursor::ORIGIN,
            out: Cursor::ORIGIN,
            in_size: 0,
            out_size: 0,
        };
        ret.check_rep();
        ret
    }

    /// Returns the number of readable bytes.
    #[must_use]
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.in_size
    }

    /// Determines whether the adapter holds zero readable bytes.
    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.in_size == 0
    }

    /// Returns the maximum number of bytes, both readable and staged,
    /// that the adapter can ever hold.
    #[must_use]
    #[inline(always)]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the same fixed total as [`StagedIovec::max_size`]: the
    /// adapter never grows.
    #[must_use]
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Returns the largest reservation the next
    /// [`StagedIovec::prepare`] call can satisfy.
    ///
    /// This is the smaller of the logical headroom
    /// (`max_size() - size()`) and the physical space between the
    /// staging cursor and the end of the segment sequence; the two
    /// only differ once readable bytes have been partially drained,
    /// because drained space ahead of the window is not reused in
    /// place.
    #[must_use]
    pub fn remaining(&self) -> usize {
        (self.max_size - self.in_size).min(self.out.remaining(&self.lens))
    }

    /// Returns immutable views over exactly [`StagedIovec::size`]
    /// readable bytes, spanning as many segments as needed, in order.
    #[must_use]
    pub fn data(&self) -> ReadableSlices<'_> {
        self.begin
            .span(&self.lens, self.in_size)
            .map(|(segment, range)| IoSlice::new(&self.segments[segment][range]))
            .collect()
    }

    /// Returns immutable views describing the entire original segment
    /// sequence, unchanged, for introspection.
    #[must_use]
    pub fn segments(&self) -> ReadableSlices<'_> {
        self.segments
            .iter()
            .map(|segment| IoSlice::new(segment))
            .collect()
    }

    /// Reserves exactly `count` writable bytes immediately after the
    /// readable region and returns mutable views over them.
    ///
    /// A successful call replaces any previous reservation; bytes
    /// written through the previous reservation's views but never
    /// committed are simply overwritten.  On failure the adapter is
    /// left exactly as it was.
    ///
    /// Fails when `size() + count` exceeds [`StagedIovec::max_size`],
    /// or when fewer than `count` bytes remain between the staging
    /// cursor and the end of the segment sequence.  The reservation
    /// is all-or-nothing: no partial reservation is made.
    pub fn prepare(&mut self, count: usize) -> Result<WritableSlices<'_>, CapacityError> {
        let available = self.remaining();
        if count > available {
            return Err(CapacityError {
                requested: count,
                available,
            });
        }

        self.out_size = count;
        self.check_rep();

        let mut ret = WritableSlices::new();
        let mut left = count;
        let mut offset = self.out.offset;
        for segment in self.segments.iter_mut().skip(self.out.segment) {
            if left == 0 {
                break;
            }

            let take = (segment.len() - offset).min(left);
            ret.push(IoSliceMut::new(&mut segment[offset..offset + take]));
            left -= take;
            offset = 0;
        }

        assert_eq!(left, 0); // `available` already bounds the walk.
        Ok(ret)
    }

    /// Promotes the first `count` bytes of the current reservation to
    /// the readable region and discards the rest of the reservation.
    ///
    /// Saturates: committing more than the reservation holds promotes
    /// the whole reservation.  The next [`StagedIovec::prepare`]
    /// starts fresh right after the promoted bytes; it does not
    /// resume the discarded remainder.
    pub fn commit(&mut self, count: usize) {
        let take = count.min(self.out_size);

        self.out = self.out.advance(&self.lens, take);
        self.in_size += take;
        self.out_size = 0;
        self.maybe_rewind();
        self.check_rep();
    }

    /// Removes the first `count` bytes from the readable region.
    ///
    /// Saturates: consuming more than [`StagedIovec::size`] empties
    /// the readable region.  Draining the adapter completely (no
    /// readable bytes, no pending reservation) rewinds the window to
    /// the front of the segment sequence, making the full capacity
    /// available again.
    pub fn consume(&mut self, count: usize) {
        let take = count.min(self.in_size);

        self.begin = self.begin.advance(&self.lens, take);
        self.in_size -= take;
        self.maybe_rewind();
        self.check_rep();
    }

    /// Returns a copy of the readable bytes as a single contiguous
    /// [`Vec<u8>`].
    #[must_use]
    pub fn flatten(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(self.in_size);
        for slice in self.data() {
            ret.extend_from_slice(&slice);
        }

        ret
    }

    /// Rewinds the cursors to the origin once nothing is live.  The
    /// window never wraps, so this is the only way drained space at
    /// the front of the segment sequence becomes usable again.
    #[inline(always)]
    fn maybe_rewind(&mut self) {
        if self.in_size == 0 && self.out_size == 0 {
            self.begin = Cursor::ORIGIN;
            self.out = Cursor::ORIGIN;
        }
    }

    #[cfg_attr(test, mutants::skip)] // internal consistency checks only
    #[inline(always)]
    fn check_rep(&self) {
        debug_assert!(self.in_size + self.out_size <= self.max_size);
        debug_assert_eq!(self.begin.advance(&self.lens, self.in_size), self.out);
        debug_assert!(self.out.remaining(&self.lens) >= self.out_size);
    }
}

// A fresh adapter is empty, reports the summed capacity, and skips
// zero-length segments.
#[test]
fn test_empty_miri() {
    let mut first = [0u8; 4];
    let mut hole = [0u8; 0];
    let mut second = [0u8; 6];
    let iovec = StagedIovec::new([&mut first[..], &mut hole[..], &mut second[..]]);

    assert_eq!(iovec.size(), 0);
    assert!(iovec.is_empty());
    assert_eq!(iovec.max_size(), 10);
    assert_eq!(iovec.capacity(), 10);
    assert_eq!(iovec.remaining(), 10);
    assert_eq!(iovec.data().len(), 0);
    assert_eq!(iovec.flatten(), b"");

    let segments = iovec.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].len(), 4);
    assert_eq!(segments[1].len(), 6);
}

// An adapter over no segments (or only empty ones) saturates
// everything at zero.
#[test]
fn test_degenerate_miri() {
    let mut iovec = StagedIovec::new(std::iter::empty());

    assert_eq!(iovec.max_size(), 0);
    assert!(iovec.prepare(0).expect("zero fits").is_empty());
    let err = iovec.prepare(1).expect_err("no capacity at all");
    assert_eq!(err.requested(), 1);
    assert_eq!(err.available(), 0);

    iovec.commit(10);
    iovec.consume(10);
    assert_eq!(iovec.size(), 0);
}

// Reserve, fill, commit, read back, drain: the full cycle over a
// single segment.
#[test]
fn test_roundtrip_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    let mut views = iovec.prepare(5).expect("5 of 10 fits");
    assert_eq!(views.len(), 1);
    views[0].copy_from_slice(b"hello");
    drop(views);
    iovec.commit(5);

    assert_eq!(iovec.size(), 5);
    assert_eq!(iovec.flatten(), b"hello");

    iovec.consume(5);
    assert_eq!(iovec.size(), 0);
    assert_eq!(iovec.max_size(), 10);
}

// Capacity arithmetic from the adapter's contract: 6 + 5 > 10 fails,
// 6 + 4 = 10 fits, and a full adapter rejects everything.
#[test]
fn test_capacity_law_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    let mut views = iovec.prepare(6).expect("6 of 10 fits");
    views[0].copy_from_slice(b"abcdef");
    drop(views);
    iovec.commit(6);
    assert_eq!(iovec.size(), 6);

    let err = iovec.prepare(5).expect_err("6 + 5 > 10");
    assert_eq!(err.requested(), 5);
    assert_eq!(err.available(), 4);
    // Strong guarantee: the failed call changed nothing.
    assert_eq!(iovec.size(), 6);
    assert_eq!(iovec.flatten(), b"abcdef");

    let mut views = iovec.prepare(4).expect("6 + 4 = 10 fits");
    views[0].copy_from_slice(b"ghij");
    drop(views);
    iovec.commit(4);
    assert_eq!(iovec.size(), 10);
    assert_eq!(iovec.flatten(), b"abcdefghij");

    assert!(iovec.prepare(1).is_err());
    assert!(iovec.prepare(0).is_ok());
}

// Committing less than the reservation discards the remainder; the
// freed space is immediately reservable again.
#[test]
fn test_partial_commit_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    let mut views = iovec.prepare(5).expect("5 of 10 fits");
    views[0].copy_from_slice(b"xyz..");
    drop(views);
    iovec.commit(3);

    assert_eq!(iovec.size(), 3);
    assert_eq!(iovec.flatten(), b"xyz");

    // The discarded 2 bytes are not lost capacity: 3 + 7 = 10.
    let views = iovec.prepare(7).expect("3 + 7 = 10 fits");
    assert_eq!(views.iter().map(|view| view.len()).sum::<usize>(), 7);
}

// A new reservation starts where the previous one started, not where
// it left off.
#[test]
fn test_prepare_replaces_reservation_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    let mut views = iovec.prepare(5).expect("fits");
    views[0].copy_from_slice(b"aaaaa");
    drop(views);

    let mut views = iovec.prepare(3).expect("fits");
    views[0].copy_from_slice(b"bbb");
    drop(views);
    iovec.commit(3);

    assert_eq!(iovec.flatten(), b"bbb");
}

// Commit and consume both saturate instead of failing.
#[test]
fn test_saturation_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    // Committing with no reservation is a no-op.
    iovec.commit(4);
    assert_eq!(iovec.size(), 0);

    let mut views = iovec.prepare(5).expect("fits");
    views[0].copy_from_slice(b"01234");
    drop(views);
    // Committing more than the reservation promotes the whole
    // reservation, same as commit(5).
    iovec.commit(100);
    assert_eq!(iovec.size(), 5);
    assert_eq!(iovec.flatten(), b"01234");

    // Consuming more than size() empties the readable region.
    iovec.consume(100);
    assert_eq!(iovec.size(), 0);
    iovec.consume(1);
    assert_eq!(iovec.size(), 0);
}

// A reservation spans segments without copying: 7 bytes over a 4-byte
// and a 6-byte segment come back as a 4-byte and a 3-byte view.
#[test]
fn test_span_two_segments_miri() {
    let mut first = [0u8; 4];
    let mut second = [0u8; 6];
    let mut iovec = StagedIovec::new([&mut first[..], &mut second[..]]);

    let mut views = iovec.prepare(7).expect("7 of 10 fits");
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].len(), 4);
    assert_eq!(views[1].len(), 3);
    views[0].copy_from_slice(b"0123");
    views[1].copy_from_slice(b"456");
    drop(views);
    iovec.commit(7);

    // The readable views mirror the same split; bytes come back in
    // order, with no corruption across the boundary.
    let data = iovec.data();
    assert_eq!(data.len(), 2);
    assert_eq!(&*data[0], b"0123");
    assert_eq!(&*data[1], b"456");
    drop(data);
    assert_eq!(iovec.flatten(), b"0123456");

    // Consuming past the boundary leaves a single-segment tail.
    iovec.consume(5);
    assert_eq!(iovec.flatten(), b"56");
    let data = iovec.data();
    assert_eq!(data.len(), 1);
}

// Partially drained space ahead of the window is not reusable in
// place, but a full drain rewinds the window and restores the whole
// capacity.
#[test]
fn test_drain_and_rewind_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    let mut views = iovec.prepare(10).expect("fits");
    views[0].copy_from_slice(b"0123456789");
    drop(views);
    iovec.commit(10);

    iovec.consume(4);
    assert_eq!(iovec.size(), 6);
    // 6 + 4 = 10 would fit logically, but the window has slid past
    // the drained bytes and there is no room left ahead of it.
    let err = iovec.prepare(4).expect_err("no space ahead of the window");
    assert_eq!(err.available(), 0);
    assert_eq!(iovec.remaining(), 0);
    assert_eq!(iovec.flatten(), b"456789");

    iovec.consume(6);
    assert_eq!(iovec.size(), 0);
    assert_eq!(iovec.remaining(), 10);

    let mut views = iovec.prepare(10).expect("rewound to the front");
    views[0].copy_from_slice(b"abcdefghij");
    drop(views);
    iovec.commit(10);
    assert_eq!(iovec.flatten(), b"abcdefghij");
}

// Discarding a reservation on an otherwise drained adapter also
// rewinds it.
#[test]
fn test_rewind_after_discard_miri() {
    let mut first = [0u8; 4];
    let mut second = [0u8; 6];
    let mut iovec = StagedIovec::new([&mut first[..], &mut second[..]]);

    let mut views = iovec.prepare(6).expect("fits");
    views[0].copy_from_slice(b"0123");
    views[1].copy_from_slice(b"45");
    drop(views);
    iovec.commit(6);

    // Drain while a new reservation is pending: no rewind yet.
    let _ = iovec.prepare(4).expect("6 + 4 = 10 fits");
    iovec.consume(6);
    assert_eq!(iovec.size(), 0);

    // Discarding the pending reservation drains the adapter
    // completely and rewinds it.
    iovec.commit(0);
    assert_eq!(iovec.remaining(), 10);
    assert!(iovec.prepare(10).is_ok());
}

// Zero-sized operations are all no-ops.
#[test]
fn test_zero_ops_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    assert!(iovec.prepare(0).expect("always fits").is_empty());
    iovec.commit(0);
    iovec.consume(0);
    assert_eq!(iovec.size(), 0);
    assert_eq!(iovec.remaining(), 10);
}

// Moving the adapter is safe: cursors are index pairs, not addresses
// into the moved-from value.
#[test]
fn test_move_miri() {
    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    let mut views = iovec.prepare(5).expect("fits");
    views[0].copy_from_slice(b"moved");
    drop(views);
    iovec.commit(5);

    let mut boxed = Box::new(iovec);
    assert_eq!(boxed.flatten(), b"moved");
    boxed.consume(2);
    assert_eq!(boxed.flatten(), b"ved");
}

#[test]
fn test_error_display_miri() {
    let mut backing = [0u8; 4];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    let err = iovec.prepare(9).expect_err("9 > 4");
    let message = format!("{}", err);
    assert!(message.contains("requested=9"));
    assert!(message.contains("available=4"));
}
