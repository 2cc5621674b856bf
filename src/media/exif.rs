// SPDX-License-Identifier: GPL-3.0-only

//! Embedded metadata tagging
//!
//! Rewrites a JPEG already on disk with an EXIF block carrying capture time,
//! orientation, and (for known locations) GPS coordinates. The TIFF structure
//! is serialized here: a 0th IFD with the orientation and modification time,
//! an Exif sub-IFD with the original/digitized times, and a GPS sub-IFD that
//! is present only when the fix is not the (0, 0) sentinel.
//!
//! All date/time strings are rendered in UTC regardless of host timezone.

use crate::constants::{EXIF_DATETIME_FORMAT, EXIF_GPS_DATESTAMP_FORMAT};
use crate::errors::SaveError;
use crate::location::LocationFix;
use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Timelike, Utc};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::path::Path;
use tracing::debug;

/// Everything the tagger embeds for one frame
#[derive(Debug, Clone, Copy)]
pub struct ExifInfo {
    /// Capture instant, epoch milliseconds
    pub timestamp_ms: i64,
    /// Rotation to record in the orientation tag
    pub rotation_degrees: u32,
    /// Session location; the zero sentinel suppresses all GPS tags
    pub location: LocationFix,
}

// TIFF field types
const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_UNDEFINED: u16 = 7;

// 0th IFD tags
const TAG_ORIENTATION: u16 = 0x0112;
const TAG_DATETIME: u16 = 0x0132;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;

// Exif sub-IFD tags
const TAG_EXIF_VERSION: u16 = 0x9000;
const TAG_DATETIME_ORIGINAL: u16 = 0x9003;
const TAG_DATETIME_DIGITIZED: u16 = 0x9004;

// GPS sub-IFD tags
const TAG_GPS_VERSION_ID: u16 = 0x0000;
const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
const TAG_GPS_LATITUDE: u16 = 0x0002;
const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
const TAG_GPS_LONGITUDE: u16 = 0x0004;
const TAG_GPS_TIMESTAMP: u16 = 0x0007;
const TAG_GPS_PROCESSING_METHOD: u16 = 0x001B;
const TAG_GPS_DATESTAMP: u16 = 0x001D;

/// Orientation tag values for the supported rotations; anything else maps to
/// the normal orientation.
pub fn orientation_code(rotation_degrees: u32) -> u16 {
    match rotation_degrees {
        0 => 1,
        90 => 6,
        180 => 3,
        270 => 8,
        _ => 1,
    }
}

/// Open the file at `path` for metadata-only mutation and commit all tags in
/// a single terminal write.
pub fn tag_file(path: &Path, info: &ExifInfo) -> Result<(), SaveError> {
    let tiff = build_tiff(info)?;

    let bytes = std::fs::read(path).map_err(|e| SaveError::Tag(e.to_string()))?;
    let mut jpeg =
        Jpeg::from_bytes(Bytes::from(bytes)).map_err(|e| SaveError::Tag(e.to_string()))?;
    jpeg.set_exif(Some(Bytes::from(tiff)));

    let mut file = std::fs::File::create(path).map_err(|e| SaveError::Tag(e.to_string()))?;
    jpeg.encoder()
        .write_to(&mut file)
        .map_err(|e| SaveError::Tag(e.to_string()))?;

    debug!(path = %path.display(), "Metadata committed");
    Ok(())
}

/// Serialize the TIFF block for the given metadata.
pub fn build_tiff(info: &ExifInfo) -> Result<Vec<u8>, SaveError> {
    let instant = DateTime::<Utc>::from_timestamp_millis(info.timestamp_ms)
        .ok_or_else(|| SaveError::Tag(format!("bad timestamp {}", info.timestamp_ms)))?;
    let datetime = instant.format(EXIF_DATETIME_FORMAT).to_string();

    let mut exif_ifd = Ifd::new();
    exif_ifd.bytes(TAG_EXIF_VERSION, TYPE_UNDEFINED, b"0230");
    exif_ifd.ascii(TAG_DATETIME_ORIGINAL, &datetime);
    exif_ifd.ascii(TAG_DATETIME_DIGITIZED, &datetime);

    let gps_ifd = if info.location.is_unknown() {
        None
    } else {
        let mut gps = Ifd::new();
        gps.bytes(TAG_GPS_VERSION_ID, TYPE_BYTE, &[2, 3, 0, 0]);
        gps.ascii(
            TAG_GPS_LATITUDE_REF,
            if info.location.latitude >= 0.0 { "N" } else { "S" },
        );
        gps.rationals(TAG_GPS_LATITUDE, &to_dms(info.location.latitude));
        gps.ascii(
            TAG_GPS_LONGITUDE_REF,
            if info.location.longitude >= 0.0 { "E" } else { "W" },
        );
        gps.rationals(TAG_GPS_LONGITUDE, &to_dms(info.location.longitude));
        gps.rationals(
            TAG_GPS_TIMESTAMP,
            &[
                (instant.hour(), 1),
                (instant.minute(), 1),
                (instant.second(), 1),
            ],
        );
        // UNDEFINED payload with the character-code prefix, byte-for-byte
        // what platform metadata writers produce for "GPS"
        gps.bytes(
            TAG_GPS_PROCESSING_METHOD,
            TYPE_UNDEFINED,
            b"ASCII\0\0\0GPS",
        );
        gps.ascii(
            TAG_GPS_DATESTAMP,
            &instant.format(EXIF_GPS_DATESTAMP_FORMAT).to_string(),
        );
        Some(gps)
    };

    let mut ifd0 = Ifd::new();
    ifd0.short(TAG_ORIENTATION, orientation_code(info.rotation_degrees));
    ifd0.ascii(TAG_DATETIME, &datetime);
    // Pointer values are patched below once the layout is known
    ifd0.long(TAG_EXIF_IFD, 0);
    if gps_ifd.is_some() {
        ifd0.long(TAG_GPS_IFD, 0);
    }

    // Layout: header, 0th IFD + values, Exif IFD + values, GPS IFD + values
    let ifd0_start = 8u32;
    let exif_start = ifd0_start + ifd0.byte_len();
    let gps_start = exif_start + exif_ifd.byte_len();

    ifd0.set_long(TAG_EXIF_IFD, exif_start);
    if gps_ifd.is_some() {
        ifd0.set_long(TAG_GPS_IFD, gps_start);
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.write_u16::<LittleEndian>(42)
        .map_err(|e| SaveError::Tag(e.to_string()))?;
    out.write_u32::<LittleEndian>(ifd0_start)
        .map_err(|e| SaveError::Tag(e.to_string()))?;

    ifd0.write(&mut out, ifd0_start)?;
    exif_ifd.write(&mut out, exif_start)?;
    if let Some(gps) = gps_ifd {
        gps.write(&mut out, gps_start)?;
    }

    Ok(out)
}

/// Split an absolute coordinate into degree/minute/second rationals. Seconds
/// carry seven decimal digits of precision.
fn to_dms(value: f64) -> [(u32, u32); 3] {
    let v = value.abs();
    let degrees = v.floor();
    let minutes = ((v - degrees) * 60.0).floor();
    let seconds = (v - degrees) * 3600.0 - minutes * 60.0;
    [
        (degrees as u32, 1),
        (minutes as u32, 1),
        ((seconds * 10_000_000.0).round() as u32, 10_000_000),
    ]
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Raw little-endian value bytes, `count * type_size` long
    value: Vec<u8>,
}

/// One image file directory under construction
struct Ifd {
    entries: Vec<Entry>,
}

impl Ifd {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn ascii(&mut self, tag: u16, s: &str) {
        let mut value = s.as_bytes().to_vec();
        value.push(0);
        let count = value.len() as u32;
        self.entries.push(Entry {
            tag,
            field_type: TYPE_ASCII,
            count,
            value,
        });
    }

    fn short(&mut self, tag: u16, v: u16) {
        self.entries.push(Entry {
            tag,
            field_type: TYPE_SHORT,
            count: 1,
            value: v.to_le_bytes().to_vec(),
        });
    }

    fn long(&mut self, tag: u16, v: u32) {
        self.entries.push(Entry {
            tag,
            field_type: TYPE_LONG,
            count: 1,
            value: v.to_le_bytes().to_vec(),
        });
    }

    fn set_long(&mut self, tag: u16, v: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.value = v.to_le_bytes().to_vec();
        }
    }

    fn bytes(&mut self, tag: u16, field_type: u16, data: &[u8]) {
        self.entries.push(Entry {
            tag,
            field_type,
            count: data.len() as u32,
            value: data.to_vec(),
        });
    }

    fn rationals(&mut self, tag: u16, values: &[(u32, u32)]) {
        let mut value = Vec::with_capacity(values.len() * 8);
        for (num, den) in values {
            value.extend_from_slice(&num.to_le_bytes());
            value.extend_from_slice(&den.to_le_bytes());
        }
        self.entries.push(Entry {
            tag,
            field_type: TYPE_RATIONAL,
            count: values.len() as u32,
            value,
        });
    }

    /// Total serialized size: entry table plus the out-of-line value area
    /// (values longer than four bytes, padded to even offsets).
    fn byte_len(&self) -> u32 {
        let table = 2 + 12 * self.entries.len() as u32 + 4;
        let values: u32 = self
            .entries
            .iter()
            .map(|e| {
                if e.value.len() > 4 {
                    (e.value.len() as u32 + 1) & !1
                } else {
                    0
                }
            })
            .sum();
        table + values
    }

    /// Serialize this IFD assuming it begins at `start` within the TIFF block.
    fn write(&self, out: &mut Vec<u8>, start: u32) -> Result<(), SaveError> {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.tag);

        let table_len = 2 + 12 * entries.len() as u32 + 4;
        let mut value_offset = start + table_len;
        let mut value_area: Vec<u8> = Vec::new();

        out.write_u16::<LittleEndian>(entries.len() as u16)
            .map_err(|e| SaveError::Tag(e.to_string()))?;

        for entry in &entries {
            out.write_u16::<LittleEndian>(entry.tag)
                .map_err(|e| SaveError::Tag(e.to_string()))?;
            out.write_u16::<LittleEndian>(entry.field_type)
                .map_err(|e| SaveError::Tag(e.to_string()))?;
            out.write_u32::<LittleEndian>(entry.count)
                .map_err(|e| SaveError::Tag(e.to_string()))?;

            if entry.value.len() <= 4 {
                let mut inline = entry.value.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                out.write_u32::<LittleEndian>(value_offset)
                    .map_err(|e| SaveError::Tag(e.to_string()))?;
                value_area.extend_from_slice(&entry.value);
                if entry.value.len() % 2 == 1 {
                    value_area.push(0);
                }
                value_offset += (entry.value.len() as u32 + 1) & !1;
            }
        }

        // No further IFD in the chain
        out.write_u32::<LittleEndian>(0)
            .map_err(|e| SaveError::Tag(e.to_string()))?;
        out.extend_from_slice(&value_area);
        Ok(())
    }
}
