//! Minimal utilities for reading and writing the little-endian primitives
//! that every BSATN encoding bottoms out in.
//!
//! [`BufWriter`] and [`BufReader`] deal in raw bytes only; framing decisions
//! (length prefixes, sum tags, and the like) belong to [`crate::bsatn`].

use core::cell::Cell;
use core::str::Utf8Error;

use ethnum::{i256, u256};
use thiserror::Error;

/// An error that occurred when decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended before the value was fully decoded.
    #[error("buffer has less than expected {expected} bytes remaining")]
    Eof { expected: usize },
    /// A sum tag (or bool byte) was outside the valid range.
    #[error("invalid tag {tag} for sum type {sum_name}")]
    InvalidTag { tag: u8, sum_name: &'static str },
    /// A string was not valid UTF-8.
    #[error("string was not valid UTF-8: {0}")]
    InvalidUtf8(Utf8Error),
    /// The outer frame left bytes unconsumed.
    #[error("{num_bytes} trailing bytes after decoded value")]
    TrailingBytes { num_bytes: usize },
    /// A length prefix exceeded the configured cap.
    #[error("length prefix {len} exceeds the configured maximum {max}")]
    BadLength { len: usize, max: usize },
    /// Products/sums were nested deeper than the configured cap.
    #[error("nesting depth exceeds the configured maximum {max}")]
    TooDeep { max: usize },
}

impl From<Utf8Error> for DecodeError {
    fn from(err: Utf8Error) -> Self {
        DecodeError::InvalidUtf8(err)
    }
}

/// A byte sink that BSATN values are encoded into.
///
/// Writing is infallible; encoders are deterministic
/// and byte-identical across runs for the same logical value.
pub trait BufWriter {
    /// Writes the `slice` to the buffer.
    fn put_slice(&mut self, slice: &[u8]);

    /// Writes a `u8` to the buffer.
    fn put_u8(&mut self, val: u8) {
        self.put_slice(&[val]);
    }
}

macro_rules! impl_put {
    ($($put:ident($prim:ty),)*) => {
        /// Little-endian writers for every fixed-width primitive.
        pub trait BufWriterExt: BufWriter {
            $(fn $put(&mut self, val: $prim) {
                self.put_slice(&val.to_le_bytes());
            })*
        }
        impl<W: BufWriter + ?Sized> BufWriterExt for W {}
    };
}

impl_put! {
    put_u16(u16),
    put_u32(u32),
    put_u64(u64),
    put_u128(u128),
    put_u256(u256),
    put_i8(i8),
    put_i16(i16),
    put_i32(i32),
    put_i64(i64),
    put_i128(i128),
    put_i256(i256),
    put_f32(f32),
    put_f64(f64),
}

impl BufWriter for Vec<u8> {
    fn put_slice(&mut self, slice: &[u8]) {
        self.extend_from_slice(slice);
    }
}

impl BufWriter for &mut Vec<u8> {
    fn put_slice(&mut self, slice: &[u8]) {
        self.extend_from_slice(slice);
    }
}

/// A byte source that BSATN values are decoded from.
///
/// On failure, the cursor is not advanced,
/// so a reader can be reused after a clean error.
pub trait BufReader<'de> {
    /// Reads and returns a byte slice of `size` bytes, advancing the cursor.
    fn get_slice(&mut self, size: usize) -> Result<&'de [u8], DecodeError>;

    /// Returns the number of bytes left to read.
    fn remaining(&self) -> usize;

    /// Reads a fixed-size byte array, advancing the cursor.
    fn get_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.get_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Reads a `u8`, advancing the cursor by one byte.
    fn get_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.get_array::<1>()?[0])
    }
}

macro_rules! impl_get {
    ($($get:ident($prim:ty),)*) => {
        /// Little-endian readers for every fixed-width primitive.
        pub trait BufReaderExt<'de>: BufReader<'de> {
            $(fn $get(&mut self) -> Result<$prim, DecodeError> {
                Ok(<$prim>::from_le_bytes(self.get_array()?))
            })*
        }
        impl<'de, R: BufReader<'de> + ?Sized> BufReaderExt<'de> for R {}
    };
}

impl_get! {
    get_u16(u16),
    get_u32(u32),
    get_u64(u64),
    get_u128(u128),
    get_u256(u256),
    get_i8(i8),
    get_i16(i16),
    get_i32(i32),
    get_i64(i64),
    get_i128(i128),
    get_i256(i256),
    get_f32(f32),
    get_f64(f64),
}

impl<'de> BufReader<'de> for &'de [u8] {
    fn get_slice(&mut self, size: usize) -> Result<&'de [u8], DecodeError> {
        if self.len() < size {
            return Err(DecodeError::Eof { expected: size });
        }
        let (ret, rest) = self.split_at(size);
        *self = rest;
        Ok(ret)
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}

/// A cursor over a byte buffer, tracking the read position separately
/// so the buffer itself can be pooled and reused.
///
/// `&Cursor<I>` implements [`BufReader`],
/// allowing several sequential reads through a shared reference.
#[derive(Debug)]
pub struct Cursor<I> {
    /// The underlying byte buffer.
    pub buf: I,
    /// The position of the next unread byte.
    pub pos: Cell<usize>,
}

impl<I> Cursor<I> {
    /// Returns a cursor at the start of `buf`.
    pub fn new(buf: I) -> Self {
        Self { buf, pos: Cell::new(0) }
    }
}

impl<'de, I: AsRef<[u8]>> BufReader<'de> for &'de Cursor<I> {
    fn get_slice(&mut self, size: usize) -> Result<&'de [u8], DecodeError> {
        let buf = self.buf.as_ref();
        let pos = self.pos.get();
        if buf.len() - pos < size {
            return Err(DecodeError::Eof { expected: size });
        }
        self.pos.set(pos + size);
        Ok(&buf[pos..pos + size])
    }

    fn remaining(&self) -> usize {
        self.buf.as_ref().len() - self.pos.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_reader_advances_exactly() {
        let mut reader: &[u8] = &[1, 2, 3, 4, 5];
        assert_eq!(reader.get_u8().unwrap(), 1);
        assert_eq!(reader.get_u16().unwrap(), u16::from_le_bytes([2, 3]));
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn slice_reader_eof_does_not_consume() {
        let mut reader: &[u8] = &[1, 2];
        assert!(matches!(reader.get_u32(), Err(DecodeError::Eof { .. })));
        // A failed read leaves the cursor where it was.
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.get_u16().unwrap(), u16::from_le_bytes([1, 2]));
    }

    #[test]
    fn cursor_tracks_position_through_shared_ref() {
        let cursor = Cursor::new(vec![0xaa, 0xbb, 0xcc]);
        let mut reader = &cursor;
        assert_eq!(reader.get_u8().unwrap(), 0xaa);
        let mut reader2 = &cursor;
        assert_eq!(reader2.get_u8().unwrap(), 0xbb);
        assert_eq!(cursor.pos.get(), 2);
    }
}
