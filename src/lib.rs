/*!

***Bit fields in, bit fields out***

bitcursor packs and unpacks integers of any width from 1 to 64 bits into caller owned byte buffers. Bits are addressed MSB-first: the buffer is one long big-endian bit string, and the first bit read becomes the most significant bit of the result.

## Features

 - ✔ arbitrary reads and writes from 1 up to and including 64 bits, signed or unsigned
 - ✔ two's-complement sign extension for any width (a lone set bit decodes to `-1`)
 - ✔ whole byte little and big endian helpers (`le16` ... `be64`) at any alignment
 - ✔ free look-ahead: a reader is `Copy`, so [`BitReader::peek`] is a struct copy
 - ✔ sticky overflow errors instead of per call `Option`s or `Result`s
 - ✔ zero allocations
 - ✔ `no_std` compatible

## Example

A reader never fails a read. Running off the end of the buffer returns zero bits and flips a sticky error that can be checked once at the end of a record.

```rust
use bitcursor::{BitReader, Error};
let mut bits = BitReader::new(&[0b0111_1110]);
assert_eq!(bits.read_i32(1), 0);
assert_eq!(bits.read_i32(1), -1);
assert_eq!(bits.read_i32(5), -1);
assert_eq!(bits.read_i32(1), 0);
assert_eq!(bits.error(), None);

// Only 0 bits are left, so what follows is zero padded
assert_eq!(bits.read_u16(12), 0);
assert_eq!(bits.error(), Some(Error::Overflow));
```

Speculative decoding is done on a snapshot, which never moves the original:

```rust
use bitcursor::BitReader;
let mut bits = BitReader::new(&[0xab, 0xcd]);
let mut ahead = bits.peek();
assert_eq!(ahead.read_be16(), 0xabcd);
assert_eq!(bits.position(), 0);
assert_eq!(bits.read_u8(4), 0xa);
```

The writer mirrors the reader over a mutable buffer that is sized up front. Confirm the whole sequence fit with [`BitWriter::flush`] before trusting the buffer.

```rust
use bitcursor::{BitReader, BitWriter};
let mut buf = [0u8; 2];
{
    let mut writer = BitWriter::new(&mut buf);
    writer.write_u16(5, 16);
    writer.write_u16(6, 0);
    writer.write_bit(false);
    writer.write_u8(4, 0b0100);
    writer.flush().unwrap();
}

assert_eq!(buf, [0x80, 0x04]);

let mut bits = BitReader::new(&buf);
assert_eq!(bits.read_u16(5), 16);
assert_eq!(bits.read_u16(6), 0);
assert_eq!(bits.read_bit(), false);
assert_eq!(bits.read_u8(4), 0b0100);
```

### `no_std` crates

This crate has a feature, `std`, that is enabled by default. To use this crate
in a `no_std` context, add the following to your `Cargo.toml`:

```toml
[dependencies]
bitcursor = { version = "x", default-features = false }
```

*/

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

mod writer;
pub use writer::BitWriter;

/// The widest field a single read or write can move
///
/// ```rust
/// const _: () = assert!(
///     bitcursor::MAX_FIELD_BITS >= 64,
///     "unexpected field width limit"
/// );
/// ```
pub const MAX_FIELD_BITS: u32 = u64::BITS;

/// The failure a cursor records once it runs off the end of its buffer
///
/// Cursors keep the first error they hit until they are reset, so it only
/// needs to be inspected at a natural checkpoint like the end of a record.
///
/// ```rust
/// use bitcursor::{BitReader, Error};
/// let mut bits = BitReader::new(&[]);
/// assert_eq!(bits.read_bit(), false);
/// assert_eq!(bits.error(), Some(Error::Overflow));
/// assert_eq!(Error::Overflow.to_string(), "bit cursor overflowed its buffer");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// More bits were read, skipped, or written than the buffer holds
    #[error("bit cursor overflowed its buffer")]
    Overflow,
}

#[inline]
pub(crate) fn bit_mask(bits: u32) -> u64 {
    u64::MAX
        .checked_shr(MAX_FIELD_BITS.saturating_sub(bits))
        .unwrap_or(0)
}

/// Interprets the low `bits` bits of `value` as a two's-complement number
#[inline]
pub(crate) fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 {
        return 0;
    }

    let shift = MAX_FIELD_BITS.saturating_sub(bits);
    ((value << shift) as i64) >> shift
}

macro_rules! gen_read {
    ($(#[$meta:meta])* $name:ident, $t:ty) => {
        $(#[$meta])*
        #[inline]
        pub fn $name(&mut self, bits: u32) -> $t {
            debug_assert!(bits <= <$t>::BITS, concat!("field too wide for ", stringify!($t)));
            self.read_bits(bits) as $t
        }
    };
}

macro_rules! gen_read_signed {
    ($(#[$meta:meta])* $name:ident, $t:ty) => {
        $(#[$meta])*
        #[inline]
        pub fn $name(&mut self, bits: u32) -> $t {
            debug_assert!(bits <= <$t>::BITS, concat!("field too wide for ", stringify!($t)));
            self.read_signed_bits(bits) as $t
        }
    };
}

macro_rules! gen_read_endian {
    ($(#[$meta:meta])* $le:ident, $be:ident, $t:ty) => {
        $(#[$meta])*
        #[inline]
        pub fn $le(&mut self) -> $t {
            (self.read_bits(<$t>::BITS) as $t).swap_bytes()
        }

        $(#[$meta])*
        #[inline]
        pub fn $be(&mut self) -> $t {
            self.read_bits(<$t>::BITS) as $t
        }
    };
}

/// Reads MSB-first bit fields from a byte slice
///
/// The reader is a plain value: the borrowed slice, the absolute bit position
/// and the sticky error. The position may run past the end of the slice, in
/// which case missing bits read as zero and [`Error::Overflow`] is recorded.
///
/// ```rust
/// use bitcursor::BitReader;
/// let mut bits = BitReader::new(&[0b1001_0011]);
/// assert_eq!(bits.read_bit(), true);
/// assert_eq!(bits.read_bit(), false);
/// assert_eq!(bits.read_u8(6), 0b01_0011);
/// assert!(bits.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitReader<'a> {
    /// Bytes being decoded
    data: &'a [u8],

    /// Absolute offset of the next bit, may exceed the bit length of `data`
    pos: usize,

    /// Set by the first read that runs off the end of `data`
    error: Option<Error>,
}

impl<'a> BitReader<'a> {
    /// Creates a reader positioned at the first bit of `data`
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            error: None,
        }
    }

    /// The underlying byte slice
    #[inline]
    pub fn get_ref(&self) -> &'a [u8] {
        self.data
    }

    /// Total number of bits in the underlying slice
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.data.len().saturating_mul(8)
    }

    /// Number of bits consumed (or skipped) so far
    ///
    /// This keeps counting past the end of the buffer.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0xff]);
    /// bits.skip(3);
    /// assert_eq!(bits.position(), 3);
    /// bits.skip(10);
    /// assert_eq!(bits.position(), 13);
    /// ```
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bits left before the end of the buffer, clamped at zero
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0xff]);
    /// assert_eq!(bits.bits_remaining(), 8);
    /// bits.skip(9);
    /// assert_eq!(bits.bits_remaining(), 0);
    /// ```
    #[inline]
    pub fn bits_remaining(&self) -> usize {
        self.len_bits().saturating_sub(self.pos)
    }

    /// Returns true if at least `bits` bits are left in the buffer
    #[inline]
    pub fn has_bits_remaining(&self, bits: usize) -> bool {
        self.bits_remaining() >= bits
    }

    /// Returns true if there are no bits left in the buffer
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Returns true if the reader is not partway through a byte
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0b1010_1010, 0b0101_0101]);
    /// assert!(bits.is_byte_aligned());
    /// assert_eq!(bits.read_bit(), true);
    /// assert!(!bits.is_byte_aligned());
    /// ```
    #[inline]
    pub fn is_byte_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// The whole bytes at the end of the buffer that have not been touched yet
    ///
    /// The slice holds `bits_remaining() / 8` bytes, so a partially consumed
    /// byte is never part of it and it is empty once fewer than 8 bits remain.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0x01, 0x02, 0x03]);
    /// bits.skip(8);
    /// assert_eq!(bits.remaining_bytes(), &[0x02, 0x03]);
    /// bits.skip(1);
    /// assert_eq!(bits.remaining_bytes(), &[0x03]);
    /// ```
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        let whole = self.bits_remaining() / 8;
        let start = self.data.len().saturating_sub(whole);
        self.data.get(start..).unwrap_or(&[])
    }

    /// The sticky error, if a read has run off the end of the buffer
    #[inline]
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Rewinds to the first bit and clears the error
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0x80]);
    /// bits.skip(9);
    /// assert!(bits.error().is_some());
    /// bits.reset();
    /// assert_eq!(bits.error(), None);
    /// assert_eq!(bits.read_bit(), true);
    /// ```
    #[inline]
    pub fn reset(&mut self) {
        self.pos = 0;
        self.error = None;
    }

    /// Returns an independent copy of the reader at the current position
    ///
    /// Reading from the snapshot never moves the original, and later reads
    /// on the original never move the snapshot.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0b0100_0001]);
    /// bits.skip(1);
    /// for _ in 0..4 {
    ///     let mut ahead = bits.peek();
    ///     assert_eq!(ahead.read_bit(), true);
    ///     assert_eq!(ahead.read_bit(), false);
    /// }
    /// assert_eq!(bits.position(), 1);
    /// ```
    #[inline]
    pub fn peek(&self) -> BitReader<'a> {
        *self
    }

    /// Advances the position by `bits` without decoding anything
    ///
    /// Skipping past the end of the buffer records [`Error::Overflow`].
    #[inline]
    pub fn skip(&mut self, bits: usize) {
        self.advance(bits);
    }

    /// Consume a bit and return if the bit was set
    ///
    /// Past the end of the buffer this returns `false` and records the
    /// overflow.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0b1000_0000]);
    /// assert_eq!(bits.read_bit(), true);
    /// assert_eq!(bits.read_bit(), false);
    /// ```
    #[inline]
    pub fn read_bit(&mut self) -> bool {
        self.read_bits(1) == 1
    }

    /// Reads an arbitrary number of bits from 1 to 64 (inclusive) and
    /// returns the unsigned result
    ///
    /// The first bit read is the most significant bit of the result. Bits
    /// beyond the end of the buffer read as zero and the position still
    /// advances by the full width. Reading zero bits returns zero and leaves
    /// the reader untouched.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0xff, 0x00, 0xab, 0xcd]);
    /// assert_eq!(bits.read_bits(4), 0xf);
    /// assert_eq!(bits.read_bits(24), 0xf00abc);
    /// assert_eq!(bits.read_bits(8), 0xd0);
    /// assert!(bits.error().is_some());
    /// ```
    #[inline]
    pub fn read_bits(&mut self, bits: u32) -> u64 {
        debug_assert!(bits <= MAX_FIELD_BITS, "field wider than 64 bits");
        let bits = bits.min(MAX_FIELD_BITS);
        if bits == 0 {
            return 0;
        }

        let start = self.advance(bits as usize);
        self.fetch(start, bits)
    }

    /// Reads an arbitrary number of bits from 1 to 64 (inclusive) and
    /// returns the signed result. If the most significant bit is enabled,
    /// the result will be negative.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0xfa, 0x93]);
    /// assert_eq!(bits.read_signed_bits(4), -1);
    /// assert_eq!(bits.read_signed_bits(4), -6);
    /// assert_eq!(bits.read_signed_bits(4), -7);
    /// assert_eq!(bits.read_signed_bits(4), 3);
    /// ```
    ///
    /// Reading the number of bits equivalent to a builtin type will always
    /// equal the unsigned read casted.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0xff]);
    /// let mut other = bits.peek();
    /// assert_eq!(bits.read_signed_bits(8) as i8, other.read_byte() as i8);
    /// ```
    #[inline]
    pub fn read_signed_bits(&mut self, bits: u32) -> i64 {
        let bits = bits.min(MAX_FIELD_BITS);
        sign_extend(self.read_bits(bits), bits)
    }

    gen_read!(
        /// Reads up to 8 bits as an unsigned byte
        read_u8,
        u8
    );
    gen_read!(
        /// Reads up to 16 bits as an unsigned short
        read_u16,
        u16
    );
    gen_read!(
        /// Reads up to 32 bits as an unsigned int
        ///
        /// ```rust
        /// use bitcursor::BitReader;
        /// let mut bits = BitReader::new(&[0b1100_0000]);
        /// assert_eq!(bits.read_u32(3), 0b110);
        /// ```
        read_u32,
        u32
    );
    gen_read!(
        /// Reads up to 64 bits as an unsigned long
        read_u64,
        u64
    );
    gen_read_signed!(
        /// Reads up to 8 bits as a sign extended byte
        read_i8,
        i8
    );
    gen_read_signed!(
        /// Reads up to 16 bits as a sign extended short
        read_i16,
        i16
    );
    gen_read_signed!(
        /// Reads up to 32 bits as a sign extended int
        ///
        /// ```rust
        /// use bitcursor::BitReader;
        /// let mut bits = BitReader::new(&[0b0111_1110]);
        /// assert_eq!(bits.read_i32(1), 0);
        /// assert_eq!(bits.read_i32(1), -1);
        /// assert_eq!(bits.read_i32(5), -1);
        /// ```
        read_i32,
        i32
    );
    gen_read_signed!(
        /// Reads up to 64 bits as a sign extended long
        read_i64,
        i64
    );

    /// Consumes 8 bits as a byte
    #[inline]
    pub fn read_byte(&mut self) -> u8 {
        self.read_bits(8) as u8
    }

    gen_read_endian!(
        /// Consumes 16 bits, little or big endian byte order respectively
        ///
        /// ```rust
        /// use bitcursor::BitReader;
        /// let mut bits = BitReader::new(&[0x00, 0x11, 0x22, 0x33]);
        /// assert_eq!(bits.read_le16(), 0x1100);
        /// assert_eq!(bits.read_be16(), 0x2233);
        /// ```
        read_le16,
        read_be16,
        u16
    );
    gen_read_endian!(
        /// Consumes 32 bits, little or big endian byte order respectively
        read_le32,
        read_be32,
        u32
    );
    gen_read_endian!(
        /// Consumes 64 bits, little or big endian byte order respectively
        read_le64,
        read_be64,
        u64
    );

    /// Fills `buf` with consecutive bytes from the stream
    ///
    /// The reader does not need to be byte aligned. Bytes past the end of
    /// the data are zero filled and the overflow recorded.
    ///
    /// ```rust
    /// use bitcursor::BitReader;
    /// let mut bits = BitReader::new(&[0b1010_1010, 0b0101_0101]);
    /// let mut buf = [0; 1];
    /// assert_eq!(bits.read_bit(), true);
    /// bits.read_bytes(&mut buf);
    /// assert_eq!(&buf, &[0b0101_0100]);
    /// assert_eq!(bits.error(), None);
    /// ```
    pub fn read_bytes(&mut self, buf: &mut [u8]) {
        if self.is_byte_aligned() && self.has_bits_remaining(buf.len().saturating_mul(8)) {
            let start = self.pos >> 3;
            if let Some(src) = self.data.get(start..start + buf.len()) {
                buf.copy_from_slice(src);
                self.pos += buf.len() * 8;
                return;
            }
        }

        for dst in buf.iter_mut() {
            *dst = self.read_byte();
        }
    }

    /// Moves the position forward, recording an overflow when it crosses the
    /// end of the buffer, and returns where the consumed span starts
    #[inline]
    fn advance(&mut self, bits: usize) -> usize {
        let start = self.pos;
        let end = start.saturating_add(bits);
        if end > self.len_bits() {
            self.overflow(bits);
        }

        self.pos = end;
        start
    }

    #[cold]
    fn overflow(&mut self, bits: usize) {
        if self.error.is_none() {
            log::debug!(
                "bit reader overflow: {} bits requested at bit {} of {}",
                bits,
                self.pos,
                self.len_bits()
            );
            self.error = Some(Error::Overflow);
        }
    }

    /// Assembles `bits` (1 to 64) bits starting at bit `start`, reading zero
    /// for anything past the end of the buffer
    #[inline]
    fn fetch(&self, start: usize, bits: u32) -> u64 {
        // A 64 bit field starting mid byte spans at most 9 bytes
        let mut window = [0u8; 16];
        let tail = self.data.get(start >> 3..).unwrap_or(&[]);
        for (dst, src) in window.iter_mut().zip(tail) {
            *dst = *src;
        }

        let window = u128::from_be_bytes(window) << (start & 7);
        (window >> (u128::BITS - bits)) as u64
    }
}

impl<'a> From<&'a [u8]> for BitReader<'a> {
    #[inline]
    fn from(data: &'a [u8]) -> Self {
        BitReader::new(data)
    }
}
