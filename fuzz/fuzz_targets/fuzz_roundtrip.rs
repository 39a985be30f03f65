#![no_main]
use bitcursor::{BitReader, BitWriter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let (widths, stream) = match data.split_first() {
        Some((&w, rest)) => (w, rest),
        None => return,
    };

    let mut out = vec![0u8; stream.len()];
    {
        let mut reader = BitReader::new(stream);
        let mut writer = BitWriter::new(&mut out);
        let mut width = u32::from(widths % 64) + 1;
        while !reader.is_empty() {
            let bits = width.min(reader.bits_remaining() as u32);
            writer.write_bits(bits, reader.read_bits(bits));
            width = (width * 7) % 64 + 1;
        }

        assert_eq!(reader.error(), None);
        assert_eq!(writer.flush(), Ok(()));
    }

    assert_eq!(out.as_slice(), stream);
});
