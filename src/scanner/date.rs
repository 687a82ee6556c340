//! Capture-date lookup for the relocation workflow.
//!
//! Dates come from two places, tried in order:
//!
//! 1. The file name, for camera-style names such as `IMG_20230115_103000.jpg`
//!    or `VID_20221231_235959.mp4`.
//! 2. The EXIF `DateTimeOriginal` tag (falling back to `DateTime`).
//!
//! Extraction is a collaborator of the relocator, so it sits behind the
//! [`DateExtractor`] trait and can be swapped in tests.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::OnceLock;

use exif::{In, Reader, Tag, Value};
use regex::Regex;

/// A capture date resolved to year and month (day when known).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureDate {
    /// Four-digit year
    pub year: u16,
    /// Month, 1-12
    pub month: u8,
    /// Day of month, if the source carried one
    pub day: Option<u8>,
}

impl CaptureDate {
    /// Build a date, rejecting out-of-range months and days.
    #[must_use]
    pub fn new(year: u16, month: u8, day: Option<u8>) -> Option<Self> {
        if year == 0 || !(1..=12).contains(&month) {
            return None;
        }
        if let Some(d) = day {
            if !(1..=31).contains(&d) {
                return None;
            }
        }
        Some(Self { year, month, day })
    }

    /// Year directory name, e.g. `2023`.
    #[must_use]
    pub fn year_dir(&self) -> String {
        format!("{:04}", self.year)
    }

    /// Month directory name, e.g. `01`.
    #[must_use]
    pub fn month_dir(&self) -> String {
        format!("{:02}", self.month)
    }
}

/// Resolves a capture date for a file.
pub trait DateExtractor: Send + Sync {
    /// Return the capture date of `path`, or `None` if it cannot be determined.
    fn extract_date(&self, path: &Path) -> Option<CaptureDate>;
}

/// Reads the date from camera-style file names.
///
/// The name starts with a three letter prefix drawn from `I M G V I D`
/// (`IMG_`, `VID_`, `MVI_`, ...) followed by `yyyymmdd_`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilenameDateExtractor;

fn filename_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[IMGVID]{3}_([0-9]{4})([0-9]{2})([0-9]{2})_[0-9]*").ok())
        .as_ref()
}

impl DateExtractor for FilenameDateExtractor {
    fn extract_date(&self, path: &Path) -> Option<CaptureDate> {
        let name = path.file_name()?.to_string_lossy();
        let caps = filename_pattern()?.captures(&name)?;
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok();
        CaptureDate::new(year, month, day)
    }
}

/// Reads the date from embedded EXIF metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifDateExtractor;

impl ExifDateExtractor {
    fn read_field(path: &Path) -> Option<String> {
        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let exif = Reader::new().read_from_container(&mut reader).ok()?;

        let field = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;

        match &field.value {
            Value::Ascii(parts) => parts
                .first()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

/// Parse an EXIF timestamp of the form `YYYY:MM:DD HH:MM:SS`.
#[must_use]
pub fn parse_exif_datetime(value: &str) -> Option<CaptureDate> {
    let dt = chrono::NaiveDateTime::parse_from_str(value.trim(), "%Y:%m:%d %H:%M:%S").ok()?;
    use chrono::Datelike;
    CaptureDate::new(
        u16::try_from(dt.year()).ok()?,
        u8::try_from(dt.month()).ok()?,
        u8::try_from(dt.day()).ok(),
    )
}

impl DateExtractor for ExifDateExtractor {
    fn extract_date(&self, path: &Path) -> Option<CaptureDate> {
        let raw = Self::read_field(path)?;
        let date = parse_exif_datetime(&raw);
        if date.is_none() {
            log::debug!("Unparseable EXIF date '{}' in {}", raw, path.display());
        }
        date
    }
}

/// Tries each extractor in turn and returns the first date found.
pub struct ChainedDateExtractor {
    extractors: Vec<Box<dyn DateExtractor>>,
}

impl ChainedDateExtractor {
    /// Chain the given extractors.
    #[must_use]
    pub fn new(extractors: Vec<Box<dyn DateExtractor>>) -> Self {
        Self { extractors }
    }
}

impl Default for ChainedDateExtractor {
    /// File name first, then EXIF.
    fn default() -> Self {
        Self::new(vec![
            Box::new(FilenameDateExtractor),
            Box::new(ExifDateExtractor),
        ])
    }
}

impl DateExtractor for ChainedDateExtractor {
    fn extract_date(&self, path: &Path) -> Option<CaptureDate> {
        self.extractors.iter().find_map(|e| e.extract_date(path))
    }
}
