use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use fxhash::FxHashMap;
use ndarray::Array1;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

use super::error::SpectrumError;

/// Header key holding the acquisition timestamp.
pub const KEY_DATE_AND_TIME: &str = "Date and Time";
/// Header key holding the exposure time in seconds.
pub const KEY_EXPOSURE_TIME: &str = "Exposure Time (secs)";
/// Header key holding the pre-amplifier gain setting.
pub const KEY_PRE_AMP_GAIN: &str = "Pre-Amplifier Gain";
/// Header key holding the input side slit width in micrometers.
pub const KEY_SLIT_WIDTH: &str = "Input Side Slit Width (um)";
/// The camera writes exactly one of these two temperature keys depending on
/// whether the sensor had stabilized. Lookup order matters: the stabilized
/// reading wins when both happen to be present.
pub const TEMPERATURE_KEYS: [&str; 2] = ["Temperature (C)", "Unstabilized Temperature (C)"];

/// Format of the `Date and Time` header value written by the spectrometer,
/// e.g. `Tue Aug 12 14:03:22.1234 2025`.
const TIMESTAMP_FORMAT: &[FormatItem<'_>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second].[subsecond] [year]"
);

/// One acquisition: wavelength and photo-electron count per detector bin,
/// bins in ascending wavelength order.
#[derive(Debug, Clone, Default)]
pub struct Spectrum {
    pub wavelengths: Array1<f64>,
    pub counts: Array1<f64>,
}

impl Spectrum {
    /// Number of detector bins.
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// Mean spacing of the wavelength axis in nm, rounded to 3 decimals.
    pub fn bin_size(&self) -> f64 {
        if self.wavelengths.len() < 2 {
            return 0.0;
        }
        let mut sum = 0.0;
        for pair in self.wavelengths.windows(2) {
            sum += pair[1] - pair[0];
        }
        let mean = sum / (self.wavelengths.len() - 1) as f64;
        (mean * 1000.0).round() / 1000.0
    }
}

/// The key-value header block of an acquisition file.
///
/// Keys map to the raw string values from the instrument; later duplicates
/// overwrite earlier ones. Typed accessors are provided for the fields the
/// analysis depends on.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionMetadata {
    fields: FxHashMap<String, String>,
}

impl AcquisitionMetadata {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|v| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Key-value pairs in key order, for deterministic table rendering.
    pub fn iter_sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_by_key(|(k, _)| *k);
        pairs
    }

    fn require(&self, key: &str) -> Result<&str, SpectrumError> {
        self.get(key)
            .ok_or_else(|| SpectrumError::MissingKey(key.to_string()))
    }

    /// Ordered lookup over a set of alternative header keys. Fails only if
    /// none of the alternatives is present.
    pub fn first_of(&self, keys: &[&str]) -> Result<&str, SpectrumError> {
        keys.iter()
            .find_map(|key| self.get(key))
            .ok_or_else(|| SpectrumError::MissingKey(keys.join(" / ")))
    }

    /// The raw `Date and Time` header value.
    pub fn date_and_time(&self) -> Result<&str, SpectrumError> {
        self.require(KEY_DATE_AND_TIME)
    }

    /// The acquisition timestamp parsed from the instrument format.
    pub fn timestamp(&self) -> Result<PrimitiveDateTime, SpectrumError> {
        let raw = self.date_and_time()?;
        PrimitiveDateTime::parse(raw, TIMESTAMP_FORMAT)
            .map_err(|e| SpectrumError::BadTimestamp(raw.to_string(), e))
    }

    pub fn exposure_secs(&self) -> Result<f64, SpectrumError> {
        let raw = self.require(KEY_EXPOSURE_TIME)?;
        raw.parse()
            .map_err(|_| SpectrumError::BadHeaderValue {
                key: KEY_EXPOSURE_TIME.to_string(),
                value: raw.to_string(),
            })
    }

    /// The pre-amplifier gain. The instrument writes values like `4x`, so
    /// only the leading integer is taken.
    pub fn pre_amp_gain(&self) -> Result<i64, SpectrumError> {
        let raw = self.require(KEY_PRE_AMP_GAIN)?;
        let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().map_err(|_| SpectrumError::BadHeaderValue {
            key: KEY_PRE_AMP_GAIN.to_string(),
            value: raw.to_string(),
        })
    }

    pub fn slit_width_um(&self) -> Result<f64, SpectrumError> {
        let raw = self.require(KEY_SLIT_WIDTH)?;
        raw.parse().map_err(|_| SpectrumError::BadHeaderValue {
            key: KEY_SLIT_WIDTH.to_string(),
            value: raw.to_string(),
        })
    }

    /// The EMCCD temperature, trying the stabilized key first and the
    /// unstabilized one second.
    pub fn temperature_celsius(&self) -> Result<f64, SpectrumError> {
        let raw = self.first_of(&TEMPERATURE_KEYS)?;
        raw.parse().map_err(|_| SpectrumError::BadHeaderValue {
            key: TEMPERATURE_KEYS.join(" / "),
            value: raw.to_string(),
        })
    }
}

/// Read an acquisition file, splitting it at `cut` lines into the metadata
/// header and the spectral data body.
pub fn read_acquisition_file(
    path: &Path,
    cut: usize,
) -> Result<(AcquisitionMetadata, Spectrum), SpectrumError> {
    let lines = read_lines(path)?;
    let split = cut.min(lines.len());
    let metadata = parse_header(&lines[..split]);
    let spectrum = parse_body(path, &lines[split..], split)?;
    Ok((metadata, spectrum))
}

/// Read only the spectral body of an acquisition file.
pub fn read_spectrum(path: &Path, cut: usize) -> Result<Spectrum, SpectrumError> {
    let lines = read_lines(path)?;
    let split = cut.min(lines.len());
    parse_body(path, &lines[split..], split)
}

/// Read only the metadata header of an acquisition file.
pub fn read_acquisition(path: &Path, cut: usize) -> Result<AcquisitionMetadata, SpectrumError> {
    let lines = read_lines(path)?;
    let split = cut.min(lines.len());
    Ok(parse_header(&lines[..split]))
}

fn read_lines(path: &Path) -> Result<Vec<String>, SpectrumError> {
    if !path.exists() {
        return Err(SpectrumError::BadFilePath(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

/// Parse the header block. Only lines containing a colon contribute; the
/// split happens at the first colon and both sides are trimmed.
fn parse_header(lines: &[String]) -> AcquisitionMetadata {
    let mut metadata = AcquisitionMetadata::default();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            metadata.insert(key.trim(), value.trim());
        }
    }
    metadata
}

/// Parse the data rows. The first whitespace-delimited token of each row is
/// the wavelength and the last token is the count.
fn parse_body(path: &Path, lines: &[String], offset: usize) -> Result<Spectrum, SpectrumError> {
    let mut wavelengths = Vec::with_capacity(lines.len());
    let mut counts = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let line_number = offset + index + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(SpectrumError::ShortRow {
                line: line_number,
                path: path.to_path_buf(),
            });
        }
        wavelengths.push(parse_float(tokens[0], line_number, path)?);
        counts.push(parse_float(tokens[tokens.len() - 1], line_number, path)?);
    }
    Ok(Spectrum {
        wavelengths: Array1::from_vec(wavelengths),
        counts: Array1::from_vec(counts),
    })
}

fn parse_float(token: &str, line: usize, path: &Path) -> Result<f64, SpectrumError> {
    token.parse().map_err(|_| SpectrumError::BadNumber {
        value: token.to_string(),
        line,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_acquisition(dir: &Path, name: &str, header: &[&str], rows: &[(f64, f64)]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in header {
            writeln!(file, "{line}").unwrap();
        }
        for (w, c) in rows {
            writeln!(file, "{w:.6}\t{c:.6}").unwrap();
        }
        path
    }

    #[test]
    fn round_trip_preserves_arrays_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let header = [
            "Date and Time:  Tue Aug 12 14:03:22.1234 2025",
            "Exposure Time (secs): 10",
            "a comment line without a delimiter",
            "Pre-Amplifier Gain: 4x",
        ];
        let rows: Vec<(f64, f64)> = (0..10).map(|i| (500.0 + 0.5 * i as f64, 300.0 + i as f64)).collect();
        let path = write_acquisition(dir.path(), "it_0.txt", &header, &rows);

        let (metadata, spectrum) = read_acquisition_file(&path, 4).unwrap();
        assert_eq!(spectrum.len(), 10);
        for (i, (w, c)) in rows.iter().enumerate() {
            assert!((spectrum.wavelengths[i] - w).abs() < 1e-9);
            assert!((spectrum.counts[i] - c).abs() < 1e-9);
        }
        assert_eq!(metadata.date_and_time().unwrap(), "Tue Aug 12 14:03:22.1234 2025");
        assert_eq!(metadata.exposure_secs().unwrap(), 10.0);
        assert_eq!(metadata.pre_amp_gain().unwrap(), 4);
        // The comment line carries no colon and is skipped
        assert_eq!(metadata.len(), 3);
    }

    #[test]
    fn later_duplicate_keys_overwrite() {
        let metadata = parse_header(&[
            "Gain: 1".to_string(),
            "Gain: 2".to_string(),
        ]);
        assert_eq!(metadata.get("Gain"), Some("2"));
    }

    #[test]
    fn value_keeps_text_after_first_colon() {
        let metadata = parse_header(&["Date and Time: Tue Aug 12 14:03:22.1234 2025".to_string()]);
        assert_eq!(
            metadata.get("Date and Time"),
            Some("Tue Aug 12 14:03:22.1234 2025")
        );
    }

    #[test]
    fn temperature_lookup_tries_both_keys_in_order() {
        let mut metadata = AcquisitionMetadata::default();
        metadata.insert("Unstabilized Temperature (C)", "-59.5");
        assert_eq!(metadata.temperature_celsius().unwrap(), -59.5);

        metadata.insert("Temperature (C)", "-60");
        assert_eq!(metadata.temperature_celsius().unwrap(), -60.0);
    }

    #[test]
    fn missing_both_temperature_keys_is_an_error() {
        let metadata = AcquisitionMetadata::default();
        assert!(matches!(
            metadata.temperature_celsius(),
            Err(SpectrumError::MissingKey(_))
        ));
    }

    #[test]
    fn timestamp_parses_instrument_format() {
        let mut metadata = AcquisitionMetadata::default();
        metadata.insert(KEY_DATE_AND_TIME, "Tue Aug 12 14:03:22.1234 2025");
        let ts = metadata.timestamp().unwrap();
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.minute(), 3);
        assert_eq!(ts.year(), 2025);
    }

    #[test]
    fn short_row_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "Key: value\n512.5\n").unwrap();
        assert!(matches!(
            read_spectrum(&path, 1),
            Err(SpectrumError::ShortRow { line: 2, .. })
        ));
    }

    #[test]
    fn malformed_number_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "512.5 oops\n").unwrap();
        assert!(matches!(
            read_spectrum(&path, 0),
            Err(SpectrumError::BadNumber { .. })
        ));
    }

    #[test]
    fn missing_file_fails_with_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        assert!(matches!(
            read_spectrum(&path, 0),
            Err(SpectrumError::BadFilePath(_))
        ));
    }

    #[test]
    fn bin_size_is_mean_spacing_rounded() {
        let spectrum = Spectrum {
            wavelengths: ndarray::arr1(&[500.0, 500.4, 500.8, 501.2]),
            counts: ndarray::arr1(&[1.0, 2.0, 3.0, 4.0]),
        };
        assert_eq!(spectrum.bin_size(), 0.4);
    }
}
