// SPDX-License-Identifier: GPL-3.0-only

//! Media processing: color-space conversion, JPEG encoding, and embedded
//! metadata tagging.

pub mod exif;
pub mod jpeg;
pub mod yuv;
