//! Gzip helpers for the wire payload.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Gzip-compress `data`.
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a gzip stream.
pub fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let payload = br#"[{"id":"PollCount","type":"counter","delta":1}]"#;
        let packed = gzip(payload).unwrap();
        assert_ne!(packed.as_slice(), payload.as_slice());
        assert_eq!(gunzip(&packed).unwrap(), payload);
    }

    #[test]
    fn rejects_garbage() {
        assert!(gunzip(b"definitely not gzip").is_err());
    }
}
