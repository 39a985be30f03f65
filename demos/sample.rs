use bitcursor::{BitReader, Error};
use std::io::Read;

/// GLONASS `tk` from RTCM message 1020: hours, minutes and a 30 second flag
#[derive(Debug)]
struct Tk {
    hours: u8,
    minutes: u8,
    half_minute: bool,
}

fn read_tk(data: &[u8]) -> Result<Tk, Error> {
    let mut reader = BitReader::new(data);
    let tk = Tk {
        hours: reader.read_u8(5),
        minutes: reader.read_u8(6),
        half_minute: reader.read_bit(),
    };

    match reader.error() {
        Some(e) => Err(e),
        None => Ok(tk),
    }
}

fn main() -> std::io::Result<()> {
    let stdin = std::io::stdin();
    let mut data = Vec::new();
    stdin.lock().read_to_end(&mut data)?;
    println!("{:?}", read_tk(&data));
    Ok(())
}
