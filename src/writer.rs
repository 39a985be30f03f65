use crate::{bit_mask, Error, MAX_FIELD_BITS};

macro_rules! gen_write {
    ($(#[$meta:meta])* $name:ident, $t:ty) => {
        $(#[$meta])*
        #[inline]
        pub fn $name(&mut self, bits: u32, value: $t) {
            debug_assert!(bits <= <$t>::BITS, concat!("field too wide for ", stringify!($t)));
            self.write_bits(bits, value as u64);
        }
    };
}

macro_rules! gen_write_signed {
    ($(#[$meta:meta])* $name:ident, $t:ty) => {
        $(#[$meta])*
        #[inline]
        pub fn $name(&mut self, bits: u32, value: $t) {
            debug_assert!(bits <= <$t>::BITS, concat!("field too wide for ", stringify!($t)));
            self.write_signed_bits(bits, i64::from(value));
        }
    };
}

macro_rules! gen_write_endian {
    ($(#[$meta:meta])* $le:ident, $be:ident, $t:ty) => {
        $(#[$meta])*
        #[inline]
        pub fn $le(&mut self, value: $t) {
            self.write_bits(<$t>::BITS, value.swap_bytes() as u64);
        }

        $(#[$meta])*
        #[inline]
        pub fn $be(&mut self, value: $t) {
            self.write_bits(<$t>::BITS, value as u64);
        }
    };
}

/// Writes MSB-first bit fields into a preallocated byte slice
///
/// The slice is the writer's whole capacity; size it up front to the exact
/// number of bytes the write sequence needs. A write that does not fit stores
/// nothing, records [`Error::Overflow`] and still advances the position, so
/// a sequence of writes can be checked once with [`BitWriter::flush`].
///
/// Bits are staged in a 64 bit buffer and committed to the slice a whole
/// byte at a time. [`BitWriter::flush`] (or dropping the writer) also stores
/// the partially filled last byte, zero padded in its low bits.
///
/// ```rust
/// use bitcursor::BitWriter;
///
/// let mut buffer = [0u8; 2];
/// {
///     let mut writer = BitWriter::new(&mut buffer);
///     writer.write_bit(true);
///     writer.write_u8(8, 0xff);
///     writer.write_bits(4, 0xa);
///     assert_eq!(writer.position(), 13);
///     assert!(writer.flush().is_ok());
/// }
///
/// assert_eq!(buffer, [0xff, 0xd0]);
/// ```
#[derive(Debug)]
pub struct BitWriter<'a> {
    data: &'a mut [u8],

    /// Index of the next byte in `data` to commit
    byte_pos: usize,

    /// Staged bits, left aligned
    bit_buf: u64,

    /// Number of staged bits in `bit_buf`
    bit_count: u32,

    /// Absolute bit offset, keeps counting past the end after an overflow
    pos: usize,

    error: Option<Error>,
}

impl<'a> BitWriter<'a> {
    /// Creates a writer positioned at the first bit of `data`
    ///
    /// Existing contents of `data` are overwritten as bits are committed.
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_buf: 0,
            bit_count: 0,
            pos: 0,
            error: None,
        }
    }

    /// Total number of bits the underlying slice can hold
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.data.len().saturating_mul(8)
    }

    /// Number of bits written so far, including any that overflowed
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bits that can still be written, clamped at zero
    ///
    /// ```rust
    /// use bitcursor::BitWriter;
    /// let mut buffer = [0u8; 1];
    /// let mut writer = BitWriter::new(&mut buffer);
    /// writer.write_bits(3, 0b101);
    /// assert_eq!(writer.bits_remaining(), 5);
    /// writer.write_bits(6, 0);
    /// assert_eq!(writer.bits_remaining(), 0);
    /// ```
    #[inline]
    pub fn bits_remaining(&self) -> usize {
        self.len_bits().saturating_sub(self.pos)
    }

    /// Returns true if the writer is not partway through a byte
    #[inline]
    pub fn is_byte_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// The sticky error, if a write did not fit
    #[inline]
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Rewinds to the first bit and clears the error
    ///
    /// The contents of the slice are left as they are; they are overwritten
    /// by subsequent writes.
    #[inline]
    pub fn reset(&mut self) {
        self.byte_pos = 0;
        self.bit_buf = 0;
        self.bit_count = 0;
        self.pos = 0;
        self.error = None;
    }

    /// Write a single bit
    ///
    /// ```rust
    /// use bitcursor::BitWriter;
    ///
    /// let mut buffer = [0u8; 1];
    /// {
    ///     let mut writer = BitWriter::new(&mut buffer);
    ///     writer.write_bit(true);
    ///     writer.write_bit(false);
    ///     writer.write_bit(true);
    /// }
    ///
    /// assert_eq!(buffer, [0b1010_0000]);
    /// ```
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(1, u64::from(bit));
    }

    /// Write the low `bits` bits (1 to 64 inclusive) of `value`, most
    /// significant bit first
    ///
    /// Higher bits of `value` are ignored. Writing zero bits does nothing.
    ///
    /// ```rust
    /// use bitcursor::BitWriter;
    ///
    /// let mut buffer = [0u8; 2];
    /// {
    ///     let mut writer = BitWriter::new(&mut buffer);
    ///
    ///     // Write 12 bits with value 0xABC
    ///     writer.write_bits(12, 0xABC);
    ///     writer.flush().unwrap();
    /// }
    ///
    /// assert_eq!(buffer, [0xAB, 0xC0]);
    /// ```
    #[inline]
    pub fn write_bits(&mut self, bits: u32, value: u64) {
        debug_assert!(bits <= MAX_FIELD_BITS, "field wider than 64 bits");
        let bits = bits.min(MAX_FIELD_BITS);
        if bits == 0 {
            return;
        }

        if !self.reserve(bits as usize) {
            return;
        }

        self.write_bits_internal(bits, value & bit_mask(bits));
    }

    /// Write the low `bits` bits (1 to 64 inclusive) of the two's-complement
    /// representation of `value`
    ///
    /// ```rust
    /// use bitcursor::{BitReader, BitWriter};
    ///
    /// let mut buffer = [0u8; 1];
    /// {
    ///     let mut writer = BitWriter::new(&mut buffer);
    ///
    ///     // -3 in 4 bits is 0b1101
    ///     writer.write_signed_bits(4, -3);
    ///     writer.flush().unwrap();
    /// }
    ///
    /// assert_eq!(buffer, [0b1101_0000]);
    /// assert_eq!(BitReader::new(&buffer).read_signed_bits(4), -3);
    /// ```
    #[inline]
    pub fn write_signed_bits(&mut self, bits: u32, value: i64) {
        self.write_bits(bits, value as u64);
    }

    gen_write!(
        /// Write the low `bits` bits of an unsigned byte
        write_u8,
        u8
    );
    gen_write!(
        /// Write the low `bits` bits of an unsigned short
        write_u16,
        u16
    );
    gen_write!(
        /// Write the low `bits` bits of an unsigned int
        write_u32,
        u32
    );
    gen_write!(
        /// Write the low `bits` bits of an unsigned long
        write_u64,
        u64
    );
    gen_write_signed!(
        /// Write the low `bits` bits of a signed byte
        write_i8,
        i8
    );
    gen_write_signed!(
        /// Write the low `bits` bits of a signed short
        write_i16,
        i16
    );
    gen_write_signed!(
        /// Write the low `bits` bits of a signed int
        write_i32,
        i32
    );
    gen_write_signed!(
        /// Write the low `bits` bits of a signed long
        write_i64,
        i64
    );

    /// Write 8 bits as a byte
    #[inline]
    pub fn write_byte(&mut self, value: u8) {
        self.write_bits(8, u64::from(value));
    }

    gen_write_endian!(
        /// Write 16 bits, little or big endian byte order respectively
        ///
        /// ```rust
        /// use bitcursor::BitWriter;
        ///
        /// let mut buffer = [0u8; 4];
        /// {
        ///     let mut writer = BitWriter::new(&mut buffer);
        ///     writer.write_le16(0x1100);
        ///     writer.write_be16(0x2233);
        /// }
        ///
        /// assert_eq!(buffer, [0x00, 0x11, 0x22, 0x33]);
        /// ```
        write_le16,
        write_be16,
        u16
    );
    gen_write_endian!(
        /// Write 32 bits, little or big endian byte order respectively
        write_le32,
        write_be32,
        u32
    );
    gen_write_endian!(
        /// Write 64 bits, little or big endian byte order respectively
        write_le64,
        write_be64,
        u64
    );

    /// Write the provided buffer as bytes
    ///
    /// If the writer is not byte aligned, the bytes straddle byte boundaries.
    /// The whole buffer must fit; otherwise nothing is written and the
    /// overflow is recorded.
    ///
    /// ```rust
    /// use bitcursor::BitWriter;
    ///
    /// let mut buffer = [0u8; 2];
    /// {
    ///     let mut writer = BitWriter::new(&mut buffer);
    ///     writer.write_bit(true);
    ///     writer.write_bytes(&[0xff]);
    ///     writer.flush().unwrap();
    /// }
    ///
    /// assert_eq!(buffer, [0xff, 0x80]);
    /// ```
    pub fn write_bytes(&mut self, buf: &[u8]) {
        if !self.reserve(buf.len().saturating_mul(8)) {
            return;
        }

        if self.bit_count == 0 {
            // Fast path: nothing staged, so bytes go straight to the slice
            let end = self.byte_pos + buf.len();
            if let Some(dst) = self.data.get_mut(self.byte_pos..end) {
                dst.copy_from_slice(buf);
            }
            self.byte_pos = end;
        } else {
            let mut chunks = buf.chunks_exact(8);
            for c in chunks.by_ref() {
                let arr = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                self.write_bits_internal(64, u64::from_be_bytes(arr));
            }

            for &byte in chunks.remainder() {
                self.write_bits_internal(8, u64::from(byte));
            }
        }
    }

    /// Stores any staged bits and reports whether every write so far fit
    ///
    /// A partially filled last byte is stored with its unwritten low bits
    /// zeroed. Writing may continue afterwards; that byte is rewritten as
    /// more bits arrive. Nothing is truncated on error: everything written
    /// before the first overflow stays in the buffer.
    ///
    /// ```rust
    /// use bitcursor::{BitWriter, Error};
    ///
    /// let mut buffer = [0u8; 1];
    /// let mut writer = BitWriter::new(&mut buffer);
    /// writer.write_bits(3, 0b101);
    /// assert_eq!(writer.flush(), Ok(()));
    ///
    /// writer.write_bits(6, 0);
    /// assert_eq!(writer.flush(), Err(Error::Overflow));
    /// drop(writer);
    ///
    /// assert_eq!(buffer, [0b1010_0000]);
    /// ```
    pub fn flush(&mut self) -> Result<(), Error> {
        self.commit();
        if self.bit_count > 0 {
            if let Some(dst) = self.data.get_mut(self.byte_pos) {
                *dst = (self.bit_buf >> 56) as u8;
            }
        }

        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Claims `bits` bits of capacity, advancing the position either way.
    /// Returns false (after recording the overflow) if they do not fit.
    #[inline]
    fn reserve(&mut self, bits: usize) -> bool {
        let end = self.pos.saturating_add(bits);
        let fits = end <= self.len_bits();
        if !fits {
            self.overflow(bits);
        }

        self.pos = end;
        fits
    }

    #[cold]
    fn overflow(&mut self, bits: usize) {
        if self.error.is_none() {
            log::debug!(
                "bit writer overflow: {} bits requested at bit {} of {}",
                bits,
                self.pos,
                self.len_bits()
            );
            self.error = Some(Error::Overflow);
        }
    }

    /// Moves whole bytes from the staging buffer into the slice
    #[inline]
    fn commit(&mut self) {
        let full_bytes = (self.bit_count / 8) as usize;
        if full_bytes == 0 {
            return;
        }

        let bytes = self.bit_buf.to_be_bytes();
        let end = self.byte_pos + full_bytes;
        if let Some(dst) = self.data.get_mut(self.byte_pos..end) {
            for (d, s) in dst.iter_mut().zip(bytes.iter()) {
                *d = *s;
            }
        }
        self.byte_pos = end;

        let flush_bits = full_bytes * 8;
        if full_bytes < 8 {
            self.bit_buf <<= flush_bits;
            self.bit_count -= flush_bits as u32;
        } else {
            self.bit_buf = 0;
            self.bit_count = 0;
        }
    }

    #[inline]
    fn write_bits_internal(&mut self, mut bits: u32, mut value: u64) {
        debug_assert!(bits <= 64);
        debug_assert!(bits == 64 || value < (1u64 << bits));

        while bits > 0 {
            let space_in_buf = 64 - self.bit_count;
            let bits_to_write = bits.min(space_in_buf);

            let chunk = value >> (bits - bits_to_write);
            self.bit_buf |= chunk << (space_in_buf - bits_to_write);
            if bits == bits_to_write {
                value = 0;
            } else {
                value &= (1u64 << (bits - bits_to_write)) - 1;
            }

            self.bit_count += bits_to_write;
            bits -= bits_to_write;

            self.commit();
        }
    }
}

impl<'a> Drop for BitWriter<'a> {
    fn drop(&mut self) {
        // The error stays observable through `error()` until this point and
        // there is nowhere to report it from a drop
        let _ = self.flush();
    }
}

#[cfg(feature = "std")]
impl<'a> std::io::Write for BitWriter<'a> {
    /// Writes all of `buf` or fails with [`std::io::ErrorKind::WriteZero`]
    /// once the writer has overflowed
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_bytes(buf);
        match self.error {
            Some(e) => Err(std::io::Error::new(std::io::ErrorKind::WriteZero, e)),
            None => Ok(buf.len()),
        }
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        BitWriter::flush(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::WriteZero, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitReader;

    #[test]
    fn test_write_primitives() {
        let mut buffer = [0u8; 15];
        {
            let mut writer = BitWriter::new(&mut buffer);
            writer.write_byte(0xab);
            writer.write_be16(0x1234);
            writer.write_le32(0xdeadbeef);
            writer.write_be64(0x0102_0304_0506_0708);
            assert_eq!(writer.flush(), Ok(()));
            assert_eq!(writer.bits_remaining(), 0);
        }

        assert_eq!(
            buffer,
            [0xab, 0x12, 0x34, 0xef, 0xbe, 0xad, 0xde, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn test_partial_byte_is_committed_on_flush() {
        let mut buffer = [0xffu8; 2];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_bits(3, 0b101);
        assert_eq!(writer.flush(), Ok(()));
        assert_eq!(writer.position(), 3);
        assert!(!writer.is_byte_aligned());

        // Keep writing after a flush
        writer.write_bits(7, 0b111_1111);
        assert_eq!(writer.flush(), Ok(()));
        drop(writer);

        assert_eq!(buffer, [0b1011_1111, 0b1100_0000]);
    }

    #[test]
    fn test_drop_flushes() {
        let mut buffer = [0u8; 1];
        {
            let mut writer = BitWriter::new(&mut buffer);
            writer.write_bits(2, 0b11);
        }

        assert_eq!(buffer, [0b1100_0000]);
    }

    #[test]
    fn test_overflow_keeps_prior_writes() {
        let mut buffer = [0u8; 2];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_bits(12, 0xabc);
        writer.write_bits(5, 0x1f);
        assert_eq!(writer.error(), Some(Error::Overflow));
        assert_eq!(writer.position(), 17);
        assert_eq!(writer.bits_remaining(), 0);

        // Even a write that would have fit before is rejected now
        writer.write_bits(1, 1);
        assert_eq!(writer.position(), 18);
        assert_eq!(writer.flush(), Err(Error::Overflow));
        drop(writer);

        assert_eq!(buffer, [0xab, 0xc0]);
    }

    #[test]
    fn test_reset() {
        let mut buffer = [0u8; 1];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_bits(9, 0);
        assert_eq!(writer.error(), Some(Error::Overflow));

        writer.reset();
        assert_eq!(writer.error(), None);
        assert_eq!(writer.position(), 0);
        writer.write_byte(0x5a);
        assert_eq!(writer.flush(), Ok(()));
        drop(writer);

        assert_eq!(buffer, [0x5a]);
    }

    #[test]
    fn test_signed_fields() {
        let mut buffer = [0u8; 2];
        {
            let mut writer = BitWriter::new(&mut buffer);
            writer.write_i8(1, -1);
            writer.write_i16(5, -1);
            writer.write_i32(3, 3);
            writer.write_i64(7, -64);
        }

        let mut bits = BitReader::new(&buffer);
        assert_eq!(bits.read_i8(1), -1);
        assert_eq!(bits.read_i16(5), -1);
        assert_eq!(bits.read_i32(3), 3);
        assert_eq!(bits.read_i64(7), -64);
        assert_eq!(bits.error(), None);
    }

    #[test]
    fn test_full_width_writes() {
        let mut buffer = [0u8; 17];
        {
            let mut writer = BitWriter::new(&mut buffer);
            writer.write_bit(true);
            writer.write_u64(64, u64::MAX - 1);
            writer.write_i64(64, i64::MIN);
            assert_eq!(writer.flush(), Ok(()));
        }

        let mut bits = BitReader::new(&buffer);
        assert_eq!(bits.read_bit(), true);
        assert_eq!(bits.read_u64(64), u64::MAX - 1);
        assert_eq!(bits.read_i64(64), i64::MIN);
        assert_eq!(bits.read_u8(7), 0);
    }

    #[test]
    fn test_high_bits_are_ignored() {
        let mut buffer = [0u8; 1];
        {
            let mut writer = BitWriter::new(&mut buffer);
            writer.write_bits(4, 0xff3);
            writer.write_bits(4, 0);
        }

        assert_eq!(buffer, [0x30]);
    }

    #[test]
    fn test_write_bytes_unaligned() {
        let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa];
        let mut buffer = [0u8; 11];
        {
            let mut writer = BitWriter::new(&mut buffer);
            writer.write_bits(4, 0xf);
            writer.write_bytes(&data);
            writer.write_bits(4, 0xf);
            assert_eq!(writer.flush(), Ok(()));
        }

        assert_eq!(
            buffer,
            [0xf1, 0x12, 0x23, 0x34, 0x45, 0x56, 0x67, 0x78, 0x89, 0x9a, 0xaf]
        );
    }

    #[test]
    fn test_write_bytes_overflow_is_all_or_nothing() {
        let mut buffer = [0u8; 2];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_byte(0x01);
        writer.write_bytes(&[0x02, 0x03]);
        assert_eq!(writer.position(), 24);
        assert_eq!(writer.flush(), Err(Error::Overflow));
        drop(writer);

        assert_eq!(buffer, [0x01, 0x00]);
    }

    #[test]
    fn test_zero_width_write() {
        let mut buffer = [0u8; 0];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_bits(0, 1);
        writer.write_bytes(&[]);
        assert_eq!(writer.position(), 0);
        assert_eq!(writer.flush(), Ok(()));
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_io_write() {
        use std::io::Write;

        let mut buffer = [0u8; 3];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_all(&[0xaa, 0xbb]).unwrap();
        Write::flush(&mut writer).unwrap();

        let err = writer.write_all(&[0xcc, 0xdd]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WriteZero);
        drop(writer);

        assert_eq!(buffer, [0xaa, 0xbb, 0x00]);
    }
}
