// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding
//!
//! The stored artifact goes through two lossy passes: the NV21 buffer is
//! first compressed at the intermediate quality, decoded again, and
//! re-encoded at the stored quality. This reproduces the output
//! characteristics of the original capture path.

use crate::errors::SaveError;
use crate::media::yuv;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use tracing::debug;

/// Encode an NV21 buffer to the final JPEG byte stream.
///
/// Returns `SaveError::NoImage` when the codec cannot produce output; the
/// caller treats that as a dropped frame, not a fatal error.
pub fn encode_nv21(
    nv21: &[u8],
    width: u32,
    height: u32,
    intermediate_quality: u8,
    stored_quality: u8,
) -> Result<Vec<u8>, SaveError> {
    let rgb = yuv::nv21_to_rgb(nv21, width, height)
        .map_err(|e| SaveError::Encode(e.to_string()))?;

    let intermediate = encode_rgb(&rgb, intermediate_quality)?;

    let decoded = image::load_from_memory_with_format(&intermediate, ImageFormat::Jpeg)
        .map_err(|_| SaveError::NoImage)?;

    let stored = encode_rgb(&decoded.to_rgb8(), stored_quality)?;
    debug!(
        width,
        height,
        bytes = stored.len(),
        "Frame encoded"
    );
    Ok(stored)
}

fn encode_rgb(image: &RgbImage, quality: u8) -> Result<Vec<u8>, SaveError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| SaveError::Encode(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{INTERMEDIATE_JPEG_QUALITY, STORED_JPEG_QUALITY};

    fn gray_nv21(width: usize, height: usize) -> Vec<u8> {
        let mut nv21 = vec![128u8; width * height];
        nv21.extend(vec![128u8; width * height / 2]);
        nv21
    }

    #[test]
    fn test_encode_produces_decodable_jpeg() {
        let nv21 = gray_nv21(32, 24);
        let jpeg = encode_nv21(
            &nv21,
            32,
            24,
            INTERMEDIATE_JPEG_QUALITY,
            STORED_JPEG_QUALITY,
        )
        .unwrap();

        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        match encode_nv21(&[0u8; 4], 32, 24, 100, 95) {
            Err(SaveError::Encode(_)) => {}
            other => panic!("expected encode error, got {:?}", other),
        }
    }
}
