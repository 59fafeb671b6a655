//! EXIF extraction via `kamadak-exif`.
//!
//! Only a fixed subset is read: camera and lens, capture time, exposure
//! settings, orientation and GPS position. Values are formatted for display
//! here (`"1/250"`, `"f/2.8"`, `"50.0 mm"`, `"0.7 EV"`) so the JSON model
//! carries ready-to-print strings. Which of these fields actually reach the
//! output is decided later by the configured whitelist.

use super::backend::BackendError;
use super::params::Orientation;
use chrono::NaiveDateTime;
use exif::{Exif, In, Tag, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Every field name this module can produce, in display order.
pub const KNOWN_FIELDS: &[&str] = &[
    "Make",
    "Model",
    "LensModel",
    "DateTimeOriginal",
    "FocalLength",
    "FNumber",
    "ISO",
    "ExposureTime",
    "ExposureCompensation",
    "MeteringMode",
    "ExposureProgram",
    "Flash",
    "Orientation",
];

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// The EXIF subset of one source image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    /// Formatted values keyed by names from [`KNOWN_FIELDS`].
    pub fields: BTreeMap<String, String>,
    pub captured_at: Option<NaiveDateTime>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub orientation: Orientation,
}

/// Read the EXIF subset from a file. Missing or unsupported EXIF is not an
/// error; it yields an empty [`ExifData`].
pub fn read_exif(path: &Path) -> Result<ExifData, BackendError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(extract(&exif)),
        Err(exif::Error::Io(e)) => Err(BackendError::Io(e)),
        Err(_) => Ok(ExifData::default()),
    }
}

fn extract(exif: &Exif) -> ExifData {
    let mut data = ExifData::default();
    let field = |tag: Tag| primary_value(exif, tag);

    for (name, tag) in [("Make", Tag::Make), ("Model", Tag::Model), ("LensModel", Tag::LensModel)] {
        if let Some(text) = field(tag).and_then(ascii) {
            data.fields.insert(name.to_string(), text);
        }
    }

    if let Some(text) = field(Tag::DateTimeOriginal).and_then(ascii) {
        data.captured_at = NaiveDateTime::parse_from_str(&text, EXIF_DATETIME_FORMAT).ok();
        data.fields.insert("DateTimeOriginal".to_string(), text);
    }

    if let Some(mm) = field(Tag::FocalLength).and_then(rational) {
        data.fields.insert("FocalLength".to_string(), format!("{:.1} mm", mm));
    }
    if let Some(f) = field(Tag::FNumber).and_then(rational) {
        data.fields.insert("FNumber".to_string(), format!("f/{:.1}", f));
    }
    if let Some(iso) = field(Tag::PhotographicSensitivity).and_then(|v| v.get_uint(0)) {
        data.fields.insert("ISO".to_string(), iso.to_string());
    }
    if let Some(Value::Rational(v)) = field(Tag::ExposureTime)
        && let Some(r) = v.first()
        && let Some(text) = format_exposure_time(r.num, r.denom)
    {
        data.fields.insert("ExposureTime".to_string(), text);
    }
    if let Some(ev) = field(Tag::ExposureBiasValue).and_then(rational) {
        data.fields.insert("ExposureCompensation".to_string(), format!("{:.1} EV", ev));
    }

    for (name, tag) in [
        ("MeteringMode", Tag::MeteringMode),
        ("ExposureProgram", Tag::ExposureProgram),
        ("Flash", Tag::Flash),
    ] {
        if let Some(f) = exif.get_field(tag, In::PRIMARY) {
            data.fields.insert(name.to_string(), f.display_value().to_string());
        }
    }

    if let Some(o) = field(Tag::Orientation).and_then(|v| v.get_uint(0)) {
        data.orientation = Orientation::from_exif(o);
        data.fields.insert("Orientation".to_string(), o.to_string());
    }

    data.lat = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S');
    data.lon = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W');
    data
}

fn primary_value(exif: &Exif, tag: Tag) -> Option<&Value> {
    exif.get_field(tag, In::PRIMARY).map(|f| &f.value)
}

fn ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => {
            let joined: Vec<u8> = parts.iter().flatten().copied().collect();
            let text = String::from_utf8_lossy(&joined)
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn rational(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Rational(v) => v.first().map(|r| r.to_f64()),
        Value::SRational(v) => v.first().map(|r| r.to_f64()),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: char) -> Option<f64> {
    let Value::Rational(dms) = &exif.get_field(tag, In::PRIMARY)?.value else {
        return None;
    };
    if dms.len() < 3 {
        return None;
    }
    let reference = ascii(&exif.get_field(ref_tag, In::PRIMARY)?.value)?;
    let decimal = dms_to_decimal(dms[0].to_f64(), dms[1].to_f64(), dms[2].to_f64());
    decimal.is_finite().then(|| {
        if reference.starts_with(negative_ref) {
            -decimal
        } else {
            decimal
        }
    })
}

/// Degrees, minutes, seconds to decimal degrees (unsigned).
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Exposure time as a reduced fraction, e.g. `10/2500` → `"1/250"`.
pub fn format_exposure_time(num: u32, denom: u32) -> Option<String> {
    if denom == 0 {
        return None;
    }
    let divisor = gcd(num, denom).max(1);
    Some(format!("{}/{}", num / divisor, denom / divisor))
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
