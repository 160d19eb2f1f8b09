//! Forward-only parsing on top of an `io::Read`.
//!
//! The [`Input`] trait offers a window of already buffered bytes (via
//! `Deref<Target = [u8]>`) plus methods to make more bytes available and to
//! consume them. Nothing is ever un-consumed: the byte position only
//! increases, which is all PLY needs.

use crate::Error;


pub(crate) mod buf;

pub(crate) use self::buf::Buffer;


pub(crate) trait Input: std::ops::Deref<Target = [u8]> {
    /// Makes sure at least `num_bytes` bytes are buffered. Fails with
    /// `TruncatedData` if the reader is exhausted before that.
    fn prepare(&mut self, num_bytes: usize) -> Result<(), Error>;

    /// Like `prepare`, but hitting EOF is not an error. Afterwards, fewer
    /// than `num_bytes` bytes are buffered only if the reader is exhausted.
    fn saturating_prepare(&mut self, num_bytes: usize) -> Result<(), Error>;

    /// Removes `num_bytes` bytes from the front of the buffer. Panics if
    /// fewer bytes are buffered.
    fn consume(&mut self, num_bytes: usize);

    fn is_eof(&mut self) -> Result<bool, Error>;

    /// The number of bytes consumed so far.
    fn offset(&self) -> usize;


    fn spanned_data(&self, num_bytes: usize) -> SpannedData<'_> {
        SpannedData {
            data: &self[..num_bytes],
            offset: self.offset(),
        }
    }

    fn skip(&mut self, num_bytes: usize) -> Result<(), Error> {
        self.prepare(num_bytes)?;
        self.consume(num_bytes);

        Ok(())
    }

    fn skip_until(&mut self, stopper: impl Stopper) -> Result<(), Error> {
        loop {
            if self.is_eof()? {
                break;
            }

            if stopper.should_stop(self[0]) {
                break;
            }

            self.consume(1);
        }

        Ok(())
    }

    fn with_bytes<F, O>(&mut self, num_bytes: usize, func: F) -> Result<O, Error>
    where
        F: FnOnce(SpannedData) -> Result<O, Error>,
    {
        self.prepare(num_bytes)?;
        let out = func(self.spanned_data(num_bytes))?;
        self.consume(num_bytes);

        Ok(out)
    }

    /// Passes all bytes up to (excluding) the first byte for which `stopper`
    /// returns `true` to `func` and consumes them. The stop byte itself is
    /// not consumed. If `stop_at_eof` is `false`, reaching EOF before a stop
    /// byte is an error.
    fn take_until<F, O>(
        &mut self,
        stopper: impl Stopper,
        stop_at_eof: bool,
        func: F,
    ) -> Result<O, Error>
    where
        F: FnOnce(SpannedData) -> Result<O, Error>
    {
        let mut pos = 0;
        loop {
            if self.len() <= pos {
                if stop_at_eof {
                    self.saturating_prepare(pos + 1)?;
                    if self.len() <= pos {
                        break;
                    }
                } else {
                    self.prepare(pos + 1)?;
                }
            }

            if stopper.should_stop(self[pos]) {
                break;
            }

            pos += 1;
        }

        let out = func(self.spanned_data(pos))?;
        self.consume(pos);

        Ok(out)
    }

    fn is_next(&mut self, expected: &[u8]) -> Result<bool, Error> {
        self.saturating_prepare(expected.len())?;
        Ok(self.starts_with(expected))
    }
}

/// A slice of input data together with the offset of its first byte.
#[derive(Debug)]
pub(crate) struct SpannedData<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) offset: usize,
}

impl<'a> SpannedData<'a> {
    /// Returns the data as string if it's valid ASCII, `None` otherwise.
    pub(crate) fn as_ascii(&self) -> Option<&'a str> {
        if self.data.is_ascii() {
            std::str::from_utf8(self.data).ok()
        } else {
            None
        }
    }

    /// Lossy string representation for error messages. Very long data is
    /// cut off.
    pub(crate) fn lossy(&self) -> String {
        let len = std::cmp::min(self.data.len(), 80);
        String::from_utf8_lossy(&self.data[..len]).into_owned()
    }
}

pub(crate) trait Stopper {
    fn should_stop(&self, byte: u8) -> bool;
}

impl Stopper for u8 {
    fn should_stop(&self, byte: u8) -> bool {
        byte == *self
    }
}

impl<F: Fn(u8) -> bool> Stopper for F {
    fn should_stop(&self, byte: u8) -> bool {
        self(byte)
    }
}
