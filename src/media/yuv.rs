// SPDX-License-Identifier: GPL-3.0-only

//! Color-space conversion
//!
//! Packs a three-plane YUV 4:2:0 buffer into semi-planar NV21 (full Y plane
//! followed by interleaved VU pairs), and converts NV21 to RGB with integer
//! BT.601 math for the encoder.

use crate::capture::types::{CaptureFrame, FramePlane};
use crate::errors::ConvertError;
use image::RgbImage;

/// Pack a planar frame into an NV21 buffer.
///
/// Handles arbitrary per-plane row padding and pixel stride; planes are never
/// assumed tightly packed. Fails only when a plane is smaller than its
/// declared geometry requires, in which case the frame is dropped upstream.
pub fn frame_to_nv21(frame: &CaptureFrame) -> Result<Vec<u8>, ConvertError> {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);

    let [y_plane, u_plane, v_plane] = &frame.planes;

    check_plane("luma", y_plane, w, h)?;
    check_plane("chroma-u", u_plane, cw, ch)?;
    check_plane("chroma-v", v_plane, cw, ch)?;

    let mut nv21 = Vec::with_capacity(w * h + 2 * cw * ch);

    for row in 0..h {
        let start = row * y_plane.row_stride;
        if y_plane.pixel_stride == 1 {
            nv21.extend_from_slice(&y_plane.data[start..start + w]);
        } else {
            for col in 0..w {
                nv21.push(y_plane.data[start + col * y_plane.pixel_stride]);
            }
        }
    }

    // Chroma order is swapped relative to the planar input: V leads each pair
    for row in 0..ch {
        let u_start = row * u_plane.row_stride;
        let v_start = row * v_plane.row_stride;
        for col in 0..cw {
            nv21.push(v_plane.data[v_start + col * v_plane.pixel_stride]);
            nv21.push(u_plane.data[u_start + col * u_plane.pixel_stride]);
        }
    }

    Ok(nv21)
}

fn check_plane(
    name: &'static str,
    plane: &FramePlane,
    cols: usize,
    rows: usize,
) -> Result<(), ConvertError> {
    if cols == 0 || rows == 0 {
        return Err(ConvertError::PlaneGeometry {
            plane: name,
            needed: 1,
            available: plane.data.len(),
        });
    }
    let needed = (rows - 1) * plane.row_stride + (cols - 1) * plane.pixel_stride + 1;
    if plane.data.len() < needed {
        return Err(ConvertError::PlaneGeometry {
            plane: name,
            needed,
            available: plane.data.len(),
        });
    }
    Ok(())
}

/// Convert an NV21 buffer to an RGB image.
///
/// Integer BT.601 arithmetic, two pixels per chroma sample.
pub fn nv21_to_rgb(nv21: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    let y_size = w * h;
    let needed = y_size + 2 * cw * ch;

    if nv21.len() < needed {
        return Err(ConvertError::PlaneGeometry {
            plane: "nv21",
            needed,
            available: nv21.len(),
        });
    }

    let y_plane = &nv21[..y_size];
    let vu_plane = &nv21[y_size..];

    let mut rgb = vec![0u8; w * h * 3];

    for row in 0..h {
        let vu_row_start = (row / 2) * cw * 2;
        let y_row_start = row * w;
        let rgb_row_start = row * w * 3;

        for col in 0..w {
            let vu_offset = vu_row_start + (col / 2) * 2;
            let v = vu_plane[vu_offset] as i32 - 128;
            let u = vu_plane[vu_offset + 1] as i32 - 128;

            let y = ((y_plane[y_row_start + col] as i32 - 16) * 149) >> 7;
            let r_v = (179 * v) >> 7;
            let g_u = (44 * u) >> 7;
            let g_v = (91 * v) >> 7;
            let b_u = (227 * u) >> 7;

            let offset = rgb_row_start + col * 3;
            rgb[offset] = (y + r_v).clamp(0, 255) as u8;
            rgb[offset + 1] = (y - g_u - g_v).clamp(0, 255) as u8;
            rgb[offset + 2] = (y + b_u).clamp(0, 255) as u8;
        }
    }

    RgbImage::from_raw(width, height, rgb).ok_or(ConvertError::PlaneGeometry {
        plane: "rgb",
        needed,
        available: 0,
    })
}
