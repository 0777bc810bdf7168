//! EXIF extraction for photos (§4.2 step 5). Best-effort: any read or
//! parse failure degrades to defaults rather than failing the file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct PhotoExif {
    pub orientation: u32,
    pub date_taken: Option<DateTime<Utc>>,
}

pub fn read_exif(path: &Path) -> PhotoExif {
    let Ok(file) = File::open(path) else { return PhotoExif::default() };
    let mut reader = BufReader::new(file);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
        return PhotoExif::default();
    };

    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1);

    let date_taken = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .or_else(|| exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY))
        .and_then(|f| match &f.value {
            exif::Value::Ascii(ref v) if !v.is_empty() => std::str::from_utf8(&v[0]).ok().map(str::to_string),
            _ => None,
        })
        .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y:%m:%d %H:%M:%S").ok())
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));

    PhotoExif { orientation, date_taken }
}
