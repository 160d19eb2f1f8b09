use std::{
    cmp::{max, min},
    fmt,
    io::{self, Read},
    ops,
};

use crate::Error;
use super::Input;


/// The initial size of the buffer in bytes.
const START_BUFFER_SIZE: usize = 8 * 1024;

/// The maximum size the internal buffer can grow to.
///
/// This is just a security mechanism: the buffer only ever has to hold one
/// header line, one ASCII token or one binary value at a time. A request for
/// more means the input is degenerated (e.g. a "header line" megabytes long)
/// and results in `Error::LookAheadTooBig` instead of unbounded memory use.
pub(crate) const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

// The correctness of some code depends on this.
static_assertions::const_assert!(START_BUFFER_SIZE <= MAX_BUFFER_SIZE);
static_assertions::const_assert!(MAX_BUFFER_SIZE <= u32::max_value() as usize);


pub(crate) struct Buffer<R: Read> {
    reader: R,

    buf: Vec<u8>,

    /// Points to the first byte in `buf` that is real data. Invariants:
    /// - `0 <= start <= buf.len()`
    /// - `start <= end`
    start: usize,

    /// Points to the byte after the last byte of real data. Invariants:
    /// - `0 <= end <= buf.len()`
    /// - `start <= end`
    end: usize,

    consumed_total: usize,
}

impl<R: Read> fmt::Debug for Buffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Buffer {{ consumed_total: {}, .. }}", self.consumed_total)
    }
}

impl<R: Read> Buffer<R> {
    pub(crate) fn new(reader: R) -> Result<Self, Error> {
        let mut out = Self {
            buf: vec![0; START_BUFFER_SIZE],
            reader,
            start: 0,
            end: 0,
            consumed_total: 0,
        };

        // Read once to prefill the buffer.
        out.fill_buf()?;

        Ok(out)
    }

    // =======================================================================
    // ===== Internal methods
    // =======================================================================

    fn cap(&self) -> usize {
        self.buf.len()
    }

    /// Tries to fill the buffer with some new data, starting at `self.end`.
    ///
    /// `self.end` must not be equal to `self.cap()`! This function doesn't
    /// grow the buffer, it simply reads some data to the back of the buffer.
    fn fill_buf(&mut self) -> Result<usize, io::Error> {
        loop {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(n) => {
                    self.end += n;
                    return Ok(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Makes sure there is space for at least `additional` more bytes after
    /// `self.end`, either by moving the data to the front or by growing the
    /// buffer.
    #[inline(never)]
    fn grow_buf(&mut self, additional: usize) -> Result<(), Error> {
        let space_after = self.cap() - self.end;
        let space_before = self.start;

        if space_after >= additional {
            return Ok(());
        }

        // Moving the data to the front only helps if that frees enough space.
        // And we only do it if the data to move is small compared to the
        // buffer: otherwise alternating small and large requests could
        // make us move almost the whole buffer again and again.
        if space_after + space_before >= additional && self.len() < self.cap() / 2 {
            self.buf.copy_within(self.start..self.end, 0);
        } else {
            let required = self.len() + additional;
            if required > MAX_BUFFER_SIZE {
                return Err(Error::LookAheadTooBig);
            }

            // At least twice the current size, otherwise reallocations
            // might be too frequent.
            let new_len = min(max(required, self.cap() * 2), MAX_BUFFER_SIZE);

            // `Vec::resize` would copy everything anyway, so we use this copy
            // to also move the data to the start of the new buffer.
            let mut new = Vec::with_capacity(new_len);
            new.extend_from_slice(&self.buf[self.start..self.end]);
            new.resize(new_len, 0);
            self.buf = new;
        }

        // In both cases, the data starts at the very beginning now.
        self.end -= self.start;
        self.start = 0;

        Ok(())
    }

    /// Reads until `additional` more bytes are buffered or the reader is
    /// exhausted. Returns the number of bytes read.
    #[inline(never)]
    fn fill_buf_by(&mut self, additional: usize) -> Result<usize, Error> {
        self.grow_buf(additional)?;

        let mut bytes_read = 0;
        while bytes_read < additional {
            match self.fill_buf()? {
                0 => break,
                n => bytes_read += n,
            }
        }

        Ok(bytes_read)
    }
}

impl<R: Read> ops::Deref for Buffer<R> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.buf[self.start..self.end]
    }
}

impl<R: Read> Input for Buffer<R> {
    fn prepare(&mut self, num_bytes: usize) -> Result<(), Error> {
        #[cold]
        #[inline(never)]
        fn fill(this: &mut Buffer<impl Read>, diff: usize) -> Result<(), Error> {
            let bytes_read = this.fill_buf_by(diff)?;
            if bytes_read < diff {
                return Err(Error::TruncatedData { offset: this.offset() + this.len() });
            }

            Ok(())
        }

        if self.len() < num_bytes {
            return fill(self, num_bytes - self.len());
        }

        Ok(())
    }

    fn saturating_prepare(&mut self, num_bytes: usize) -> Result<(), Error> {
        if self.len() < num_bytes {
            let diff = num_bytes - self.len();
            self.fill_buf_by(diff)?;
        }

        Ok(())
    }

    fn consume(&mut self, num_bytes: usize) {
        assert!(self.start + num_bytes <= self.end);

        self.start += num_bytes;
        self.consumed_total += num_bytes;

        // If we consumed all the data, we set both indices to 0.
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    fn is_eof(&mut self) -> Result<bool, Error> {
        if self.len() == 0 {
            self.grow_buf(1)?;
            Ok(self.fill_buf()? == 0)
        } else {
            Ok(false)
        }
    }

    fn offset(&self) -> usize {
        self.consumed_total
    }
}


#[cfg(test)]
mod tests {
    use std::io;
    use super::*;

    /// A reader that returns at most `chunk` bytes per `read` call, to
    /// exercise the refill logic.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl io::Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = min(min(self.chunk, buf.len()), self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn prepare_across_chunks() -> Result<(), Error> {
        let data = (0..=255u8).cycle().take(20_000).collect::<Vec<_>>();
        let mut buf = Buffer::new(Trickle { data: &data, chunk: 7 })?;

        buf.skip(3)?;
        assert_eq!(buf.offset(), 3);

        // Larger than the start buffer size, so the buffer has to grow.
        buf.prepare(10_000)?;
        assert_eq!(&buf[..10_000], &data[3..10_003]);
        buf.consume(10_000);

        assert_eq!(buf.offset(), 10_003);
        assert!(!buf.is_eof()?);
        buf.skip(20_000 - 10_003)?;
        assert!(buf.is_eof()?);

        Ok(())
    }

    #[test]
    fn prepare_past_eof() -> Result<(), Error> {
        let mut buf = Buffer::new(&b"abc"[..])?;
        buf.skip(1)?;

        match buf.prepare(5) {
            Err(Error::TruncatedData { offset }) => assert_eq!(offset, 3),
            other => panic!("unexpected result: {:?}", other),
        }

        buf.saturating_prepare(5)?;
        assert_eq!(&buf[..], b"bc");

        Ok(())
    }

    #[test]
    fn take_until_eof() -> Result<(), Error> {
        let mut buf = Buffer::new(&b"hello world"[..])?;

        let first = buf.take_until(b' ', false, |sd| Ok(sd.data.to_vec()))?;
        assert_eq!(first, b"hello");
        buf.skip(1)?;

        assert!(buf.take_until(b' ', false, |_| Ok(())).is_err());

        let second = buf.take_until(b' ', true, |sd| Ok(sd.data.to_vec()))?;
        assert_eq!(second, b"world");
        assert!(buf.is_eof()?);

        Ok(())
    }

    #[test]
    fn lookahead_limit() -> Result<(), Error> {
        let data = vec![b'x'; MAX_BUFFER_SIZE + 10];
        let mut buf = Buffer::new(&data[..])?;

        match buf.take_until(b'\n', false, |_| Ok(())) {
            Err(Error::LookAheadTooBig) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        Ok(())
    }
}
