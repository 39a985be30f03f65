#![no_main]
use bitcursor::{BitReader, Error};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The first byte drives the field widths, the rest is the stream
    let (widths, stream) = match data.split_first() {
        Some((&w, rest)) => (w, rest),
        None => return,
    };

    let mut bits = BitReader::new(stream);
    let mut width = u32::from(widths % 64) + 1;
    loop {
        let had_bits = bits.has_bits_remaining(width as usize);
        let ahead = bits.peek();
        bits.read_signed_bits(width);
        assert_eq!(ahead.position() + width as usize, bits.position());

        if !had_bits {
            assert_eq!(bits.error(), Some(Error::Overflow));
            assert_eq!(bits.bits_remaining(), 0);
            assert!(bits.remaining_bytes().is_empty());
            break;
        }

        width = width % 64 + 1;
    }
});
