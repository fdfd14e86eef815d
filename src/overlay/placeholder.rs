//! Blank placeholder image
//!
//! Encodes a fully transparent RGBA PNG so the transcoder has a valid overlay
//! before the first real scoreboard arrives.

use std::io::{self, Write};

use bytes::{BufMut, Bytes, BytesMut};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};

/// Canonical overlay width in pixels
pub const PLACEHOLDER_WIDTH: u32 = 800;
/// Canonical overlay height in pixels
pub const PLACEHOLDER_HEIGHT: u32 = 100;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 8 bits per channel
const BIT_DEPTH: u8 = 8;
/// Truecolor with alpha
const COLOR_TYPE_RGBA: u8 = 6;

/// Encode a transparent `width` x `height` PNG
pub fn blank_png(width: u32, height: u32) -> io::Result<Bytes> {
    let mut ihdr = BytesMut::with_capacity(13);
    ihdr.put_u32(width);
    ihdr.put_u32(height);
    ihdr.put_u8(BIT_DEPTH);
    ihdr.put_u8(COLOR_TYPE_RGBA);
    ihdr.put_u8(0); // compression: deflate
    ihdr.put_u8(0); // filter method 0
    ihdr.put_u8(0); // no interlace

    // Each scanline is a filter-type byte (0 = none) followed by RGBA pixels
    let row = vec![0u8; 1 + width as usize * 4];
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    for _ in 0..height {
        encoder.write_all(&row)?;
    }
    let idat = encoder.finish()?;

    let mut png = BytesMut::with_capacity(PNG_SIGNATURE.len() + 3 * 12 + ihdr.len() + idat.len());
    png.put_slice(&PNG_SIGNATURE);
    put_chunk(&mut png, b"IHDR", &ihdr);
    put_chunk(&mut png, b"IDAT", &idat);
    put_chunk(&mut png, b"IEND", &[]);

    Ok(png.freeze())
}

fn put_chunk(out: &mut BytesMut, kind: &[u8; 4], data: &[u8]) {
    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);

    out.put_u32(data.len() as u32);
    out.put_slice(kind);
    out.put_slice(data);
    out.put_u32(crc.sum());
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::ZlibDecoder;

    use super::*;

    fn chunk(png: &[u8], offset: usize) -> (&[u8], &[u8], u32, usize) {
        let len = u32::from_be_bytes(png[offset..offset + 4].try_into().unwrap()) as usize;
        let kind = &png[offset + 4..offset + 8];
        let data = &png[offset + 8..offset + 8 + len];
        let crc = u32::from_be_bytes(png[offset + 8 + len..offset + 12 + len].try_into().unwrap());
        (kind, data, crc, offset + 12 + len)
    }

    #[test]
    fn test_blank_png_layout() {
        let png = blank_png(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);

        let (kind, ihdr, crc, next) = chunk(&png, 8);
        assert_eq!(kind, b"IHDR");
        assert_eq!(u32::from_be_bytes(ihdr[0..4].try_into().unwrap()), 800);
        assert_eq!(u32::from_be_bytes(ihdr[4..8].try_into().unwrap()), 100);
        assert_eq!(ihdr[8], BIT_DEPTH);
        assert_eq!(ihdr[9], COLOR_TYPE_RGBA);

        let mut expected = Crc::new();
        expected.update(b"IHDR");
        expected.update(ihdr);
        assert_eq!(crc, expected.sum());

        let (kind, idat, _, next) = chunk(&png, next);
        assert_eq!(kind, b"IDAT");
        let mut pixels = Vec::new();
        ZlibDecoder::new(idat).read_to_end(&mut pixels).unwrap();
        assert_eq!(pixels.len(), 100 * (1 + 800 * 4));
        assert!(pixels.iter().all(|&b| b == 0));

        let (kind, data, _, end) = chunk(&png, next);
        assert_eq!(kind, b"IEND");
        assert!(data.is_empty());
        assert_eq!(end, png.len());
    }
}
