//! The `staged_iovec` crate exposes a [`StagedIovec`] adapter that
//! turns a fixed sequence of caller-owned mutable byte segments into
//! a staged producer/consumer window, without ever allocating or
//! copying the backing memory.
//!
//! Producers drive the classic reserve/fill/commit cycle:
//! [`StagedIovec::prepare`] hands out mutable views over the next `n`
//! bytes of raw capacity (possibly spanning several segments), and
//! [`StagedIovec::commit`] promotes the filled prefix into the
//! readable region.  Consumers inspect the readable region with
//! [`StagedIovec::data`] and drop bytes off its front with
//! [`StagedIovec::consume`].  The only fallible operation is
//! `prepare`: reserving more than the segments can hold fails with a
//! [`CapacityError`] and leaves the adapter untouched, so callers can
//! drain and retry.
//!
//! The views are [`std::io::IoSlice`]/[`std::io::IoSliceMut`]
//! sequences, so a network loop can hand them straight to
//! `write_vectored`/`read_vectored`.  Stale views are impossible by
//! construction: readable views borrow the adapter shared, writable
//! views borrow it exclusively, and any mutating call invalidates
//! both at compile time.
//!
//! The adapter never outlives the borrows it is built from, holds no
//! lock, and performs no I/O of its own; it is a building block for
//! single-owner stream-processing code.
mod cursor;
mod implementation;

pub use implementation::CapacityError;
pub use implementation::ReadableSlices;
pub use implementation::StagedIovec;
pub use implementation::WritableSlices;

impl std::io::Read for StagedIovec<'_> {
    /// Copies readable bytes out of the adapter and consumes them.
    fn read(&mut self, mut dst: &mut [u8]) -> std::io::Result<usize> {
        let mut written = 0;
        for slice in self.data() {
            if dst.is_empty() {
                break;
            }

            let to_write = slice.len().min(dst.len());
            dst[..to_write].copy_from_slice(&slice[..to_write]);
            written += to_write;
            dst = &mut dst[to_write..];
        }

        self.consume(written);
        Ok(written)
    }
}

impl std::io::Write for StagedIovec<'_> {
    /// Reserves, fills, and commits in one step.
    ///
    /// Accepts at most [`StagedIovec::remaining`] bytes; a full
    /// adapter returns `Ok(0)`, which `write_all` surfaces as
    /// [`std::io::ErrorKind::WriteZero`].
    fn write(&mut self, src: &[u8]) -> std::io::Result<usize> {
        let take = src.len().min(self.remaining());
        let mut src = &src[..take];

        let mut views = self
            .prepare(take)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::OutOfMemory, e))?;
        for view in views.iter_mut() {
            let len = view.len();
            view.copy_from_slice(&src[..len]);
            src = &src[len..];
        }

        drop(views);
        self.commit(take);
        Ok(take)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_read_miri() {
    use std::io::Read;
    use std::io::Write;

    let mut first = [0u8; 4];
    let mut second = [0u8; 6];
    let mut iovec = StagedIovec::new([&mut first[..], &mut second[..]]);

    assert_eq!(iovec.write(b"123456").expect("should succeed"), 6);

    let mut dst = Vec::new();
    iovec.read_to_end(&mut dst).expect("should succeed");
    assert_eq!(dst, b"123456");
    assert!(iovec.is_empty());
}

#[test]
fn test_read_short_miri() {
    use std::io::Read;
    use std::io::Write;

    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    assert_eq!(iovec.write(b"123456").expect("should succeed"), 6);

    // A short read consumes exactly what it copies out.
    let mut dst = [0u8; 4];
    assert_eq!(iovec.read(&mut dst).expect("should succeed"), 4);
    assert_eq!(&dst, b"1234");
    assert_eq!(iovec.flatten(), b"56");
}

#[test]
fn test_write_saturates_miri() {
    use std::io::Write;

    let mut backing = [0u8; 10];
    let mut iovec = StagedIovec::new([&mut backing[..]]);

    // A long write accepts as much as fits; a full adapter accepts
    // nothing.
    assert_eq!(iovec.write(b"0123456789abcdef").expect("should succeed"), 10);
    assert_eq!(iovec.write(b"x").expect("should succeed"), 0);
    assert_eq!(iovec.flatten(), b"0123456789");

    assert_eq!(
        iovec
            .write_all(b"x")
            .expect_err("adapter is full")
            .kind(),
        std::io::ErrorKind::WriteZero
    );
}

// The readable views plug straight into vectored I/O.
#[test]
fn test_write_vectored_interop_miri() {
    use std::io::Write;

    let mut first = [0u8; 4];
    let mut second = [0u8; 6];
    let mut iovec = StagedIovec::new([&mut first[..], &mut second[..]]);

    let mut views = iovec.prepare(7).expect("7 of 10 fits");
    views[0].copy_from_slice(b"0123");
    views[1].copy_from_slice(b"456");
    drop(views);
    iovec.commit(7);

    let mut dst = Vec::new();
    assert_eq!(
        dst.write_vectored(&iovec.data()).expect("must succeed"),
        7
    );
    assert_eq!(dst, b"0123456");
}
