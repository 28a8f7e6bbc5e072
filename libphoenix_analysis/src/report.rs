//! Page renderers for the phase report.
//!
//! Each page is drawn with plotters into an RGB buffer sized for A4 at
//! 150 dpi and handed to the [`PdfWriter`](crate::pdf::PdfWriter). Pure
//! layout helpers are split out from the drawing code so the table and
//! range logic can be tested without a rendering pass.

use ndarray::Array1;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::config::Config;
use super::constants::{PAGE_HEIGHT_PX, PAGE_WIDTH_PX, PHOTONS_PER_MW};
use super::dataset::{ExposureRecord, MetadataRow, PhaseDataset};
use super::error::ReportError;
use super::pdf::PdfWriter;
use super::spectrum::{AcquisitionMetadata, KEY_DATE_AND_TIME, KEY_EXPOSURE_TIME, TEMPERATURE_KEYS};

/// Intensity floor of the spectrum plots; the detector baseline sits just
/// above this, so anything below is empty space.
const Y_FLOOR: f64 = 250.0;

pub(crate) type DrawResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn draw_error(error: impl std::fmt::Display) -> ReportError {
    ReportError::DrawError(error.to_string())
}

pub(crate) fn blank_page() -> Vec<u8> {
    vec![255u8; (PAGE_WIDTH_PX * PAGE_HEIGHT_PX * 3) as usize]
}

/// Widen a degenerate range so plotters always receives a valid axis.
pub(crate) fn pad_range(low: f64, high: f64) -> (f64, f64) {
    if high > low {
        (low, high)
    } else {
        (low - 1.0, low + 1.0)
    }
}

/// Metadata lines for the acquisition table. The timestamp, exposure time,
/// temperature, and spectrograph internals get their own presentation
/// elsewhere on the page, so they are dropped from the table.
fn header_table_lines(metadata: &AcquisitionMetadata) -> Vec<String> {
    let mut trimmed = metadata.clone();
    trimmed.remove(KEY_DATE_AND_TIME);
    trimmed.remove(KEY_EXPOSURE_TIME);
    for key in TEMPERATURE_KEYS {
        trimmed.remove(key);
    }
    trimmed
        .iter_sorted()
        .into_iter()
        .filter(|(key, _)| !key.starts_with("SR193i"))
        .map(|(key, value)| format!("{key}: {value}"))
        .collect()
}

/// Acquisition settings summary for an exposure page.
fn settings_lines(record: &ExposureRecord) -> Vec<String> {
    vec![
        format!("Acquired: {}", record.date_and_time),
        format!("Exposure time: {} s", record.exposure_secs),
        format!("Pre-amplifier gain: {}x", record.gain),
        format!("Slit width: {} um", record.slit_width_um),
        format!("Wavelength bin size: {} nm", record.bin_size),
        format!("Laser power: {} mW", record.power_mw),
        format!("Iterations: {}", record.stack.nrows()),
    ]
}

/// Per-collection signal table plus the increment between each consecutive
/// pair of collections.
fn signal_difference_lines(signals: &[(String, f64)]) -> Vec<String> {
    let mut lines: Vec<String> = signals
        .iter()
        .map(|(collection, signal)| format!("{collection}: signal = {signal:.1}"))
        .collect();
    for pair in signals.windows(2) {
        lines.push(format!(
            "{} - {}: {:+.1}",
            pair[1].0,
            pair[0].0,
            pair[1].1 - pair[0].1
        ));
    }
    lines
}

/// Combined spectra normalized to counts per second per gain unit so
/// collections with different exposure settings are comparable.
fn normalized_spectra(records: &[&ExposureRecord]) -> Vec<(String, Vec<(f64, f64)>)> {
    records
        .iter()
        .map(|record| {
            let factor = record.exposure_secs * record.gain as f64;
            let counts = record
                .wavelengths
                .iter()
                .zip(record.combined.iter())
                .map(|(&w, &c)| (w, c / factor))
                .collect();
            (record.collection.clone(), counts)
        })
        .collect()
}

/// Per-wavelength difference between each consecutive pair of collection
/// spectra, labeled "later - earlier". One output series per pair, so a
/// single collection yields nothing to plot.
fn difference_spectra(spectra: &[(String, Vec<(f64, f64)>)]) -> Vec<(String, Vec<(f64, f64)>)> {
    spectra
        .windows(2)
        .map(|pair| {
            let label = format!("{} - {}", pair[1].0, pair[0].0);
            let points = pair[1]
                .1
                .iter()
                .zip(pair[0].1.iter())
                .map(|(&(w, later), &(_, earlier))| (w, later - earlier))
                .collect();
            (label, points)
        })
        .collect()
}

/// Vertical range of the exposure plots: a fixed floor up to 20% above the
/// larger of the stack mean and the combined maximum.
fn exposure_y_range(record: &ExposureRecord) -> (f64, f64) {
    let stack_mean = record.stack.mean().unwrap_or(0.0);
    let combined_max = record
        .combined
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    pad_range(Y_FLOOR, (1.2 * stack_mean).max(1.2 * combined_max))
}

fn wavelength_range(wavelengths: &Array1<f64>) -> (f64, f64) {
    if wavelengths.is_empty() {
        return (0.0, 1.0);
    }
    pad_range(wavelengths[0], wavelengths[wavelengths.len() - 1])
}

pub(crate) fn draw_text_block(
    area: &DrawingArea<BitMapBackend, Shift>,
    heading: &str,
    lines: &[String],
    origin: (i32, i32),
) -> DrawResult {
    area.draw(&Text::new(
        heading.to_string(),
        origin,
        ("sans-serif", 36).into_font(),
    ))?;
    for (index, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.clone(),
            (origin.0, origin.1 + 56 + 30 * index as i32),
            ("sans-serif", 22).into_font(),
        ))?;
    }
    Ok(())
}

fn draw_title(
    area: &DrawingArea<BitMapBackend, Shift>,
    heading: &str,
    lines: &[String],
) -> DrawResult {
    area.fill(&WHITE)?;
    area.draw(&Text::new(
        heading.to_string(),
        (120, 400),
        ("sans-serif", 64).into_font(),
    ))?;
    for (index, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.clone(),
            (120, 540 + 44 * index as i32),
            ("sans-serif", 30).into_font(),
        ))?;
    }
    Ok(())
}

/// Append a title page: a large heading and free-form subtitle lines.
pub fn page_title(
    writer: &mut PdfWriter,
    heading: &str,
    lines: &[String],
) -> Result<(), ReportError> {
    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        draw_title(&area, heading, lines).map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}

/// Append the acquisition overview page of one collection: the shared
/// instrument settings and the EMCCD temperature timeline across all
/// samples, with a marker at every sample boundary.
pub fn page_acquisition(
    writer: &mut PdfWriter,
    config: &Config,
    dataset: &PhaseDataset,
    collection: &str,
) -> Result<(), ReportError> {
    let rows = dataset.collection_metadata(collection);
    if rows.is_empty() {
        log::warn!("No metadata recorded for {collection}, skipping acquisition page");
        return Ok(());
    }

    let table_row: &MetadataRow = rows
        .iter()
        .copied()
        .find(|row| row.sample == config.baseline_exposure && row.iteration == 0)
        .unwrap_or(rows[0]);
    let table = header_table_lines(&table_row.metadata);

    // Temperature timeline in minutes since the first acquisition of the
    // collection, cut at the boundary between samples.
    let start = rows[0].metadata.timestamp()?;
    let mut points = Vec::with_capacity(rows.len());
    let mut cuts = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let elapsed = (row.metadata.timestamp()? - start).as_seconds_f64() / 60.0;
        points.push((elapsed, row.metadata.temperature_celsius()?));
        if let Some(next) = rows.get(index + 1) {
            if next.sample != row.sample {
                cuts.push(elapsed);
            }
        }
    }

    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        draw_acquisition(&area, collection, &table, &points, &cuts).map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}

fn draw_acquisition(
    area: &DrawingArea<BitMapBackend, Shift>,
    collection: &str,
    table: &[String],
    points: &[(f64, f64)],
    cuts: &[f64],
) -> DrawResult {
    area.fill(&WHITE)?;
    let (upper, lower) = area.clone().split_vertically(PAGE_HEIGHT_PX as i32 / 2);
    draw_text_block(
        &upper,
        &format!("{collection}: acquisition settings"),
        table,
        (80, 80),
    )?;

    let (t_min, t_max) = pad_range(
        points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min),
        points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max),
    );
    let (temp_min, temp_max) = pad_range(
        points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min) - 0.5,
        points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max) + 0.5,
    );

    let mut chart = ChartBuilder::on(&lower)
        .margin(40)
        .caption("EMCCD temperature timeline", ("sans-serif", 30))
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(t_min..t_max, temp_min..temp_max)?;
    chart
        .configure_mesh()
        .x_desc("Elapsed (min)")
        .y_desc("Temperature (C)")
        .draw()?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())),
    )?;
    for &cut in cuts {
        chart.draw_series(LineSeries::new(
            vec![(cut, temp_min), (cut, temp_max)],
            &BLACK,
        ))?;
    }
    Ok(())
}

/// Append the exposure page for one (sample, collection) pair: an
/// acquisition settings table, the raw iteration overlay, and the combined
/// spectrum.
pub fn page_exposure(
    writer: &mut PdfWriter,
    dataset: &PhaseDataset,
    collection: &str,
    sample: &str,
) -> Result<(), ReportError> {
    let Some(record) = dataset.exposure(sample, collection) else {
        log::warn!("No exposure recorded for {sample} in {collection}, skipping page");
        return Ok(());
    };
    let settings = settings_lines(record);

    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        draw_exposure(&area, record, &settings).map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}

fn draw_exposure(
    area: &DrawingArea<BitMapBackend, Shift>,
    record: &ExposureRecord,
    settings: &[String],
) -> DrawResult {
    area.fill(&WHITE)?;
    let (table, charts) = area.clone().split_vertically(420);
    draw_text_block(
        &table,
        &format!("{} / {}", record.collection, record.sample),
        settings,
        (80, 60),
    )?;

    let (upper, lower) = charts.split_vertically((PAGE_HEIGHT_PX as i32 - 420) / 2);
    let (x_min, x_max) = wavelength_range(&record.wavelengths);
    let (y_min, y_max) = exposure_y_range(record);

    let mut overlay = ChartBuilder::on(&upper)
        .margin(40)
        .caption("Raw iterations", ("sans-serif", 30))
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    overlay
        .configure_mesh()
        .x_desc("Wavelength (nm)")
        .y_desc("Counts")
        .draw()?;
    for (index, row) in record.stack.outer_iter().enumerate() {
        overlay
            .draw_series(LineSeries::new(
                record
                    .wavelengths
                    .iter()
                    .zip(row.iter())
                    .map(|(&w, &c)| (w, c)),
                &Palette99::pick(index),
            ))?
            .label(format!("it_{index}"))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(index))
            });
    }
    overlay
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()?;

    let mut combined = ChartBuilder::on(&lower)
        .margin(40)
        .caption("Combined spectrum", ("sans-serif", 30))
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    combined
        .configure_mesh()
        .x_desc("Wavelength (nm)")
        .y_desc("Counts")
        .draw()?;
    combined.draw_series(LineSeries::new(
        record
            .wavelengths
            .iter()
            .zip(record.combined.iter())
            .map(|(&w, &c)| (w, c)),
        &RED,
    ))?;
    Ok(())
}

/// Append the dose response page of one material sample: the combined
/// spectra of every collection normalized by exposure and gain, the
/// per-wavelength difference between consecutive collections, the fitted
/// signal per collection, and the increment table.
pub fn page_diff(
    writer: &mut PdfWriter,
    config: &Config,
    dataset: &PhaseDataset,
    sample: &str,
    signals: &[(String, f64)],
) -> Result<(), ReportError> {
    let records: Vec<&ExposureRecord> = dataset
        .layout
        .collections
        .iter()
        .filter_map(|collection| dataset.exposure(sample, collection))
        .collect();
    if records.is_empty() {
        log::warn!("No exposures recorded for {sample}, skipping dose response page");
        return Ok(());
    }

    let mut lines = signal_difference_lines(signals);
    for record in &records {
        let photons = record.power_mw * PHOTONS_PER_MW * record.exposure_secs;
        lines.push(format!(
            "{}: {:.3e} photons delivered",
            record.collection, photons
        ));
    }

    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        draw_diff(&area, config, sample, &records, signals, &lines).map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}

fn draw_diff(
    area: &DrawingArea<BitMapBackend, Shift>,
    config: &Config,
    sample: &str,
    records: &[&ExposureRecord],
    signals: &[(String, f64)],
    lines: &[String],
) -> DrawResult {
    area.fill(&WHITE)?;
    let chart_height = PAGE_HEIGHT_PX as i32 - 520;
    let (charts, table) = area.clone().split_vertically(chart_height);
    let (spectra_area, rest) = charts.split_vertically(chart_height / 3);
    let (diff_area, trend_area) = rest.split_vertically(chart_height / 3);

    let (x_min, x_max) = wavelength_range(&records[0].wavelengths);
    let normalized = normalized_spectra(records);
    let y_max = normalized
        .iter()
        .flat_map(|(_, counts)| counts.iter().map(|p| p.1))
        .fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = pad_range(0.0, 1.1 * y_max);

    let mut spectra = ChartBuilder::on(&spectra_area)
        .margin(40)
        .caption(
            format!("{sample}: combined spectra by collection"),
            ("sans-serif", 30),
        )
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    spectra
        .configure_mesh()
        .x_desc("Wavelength (nm)")
        .y_desc("Counts / (s * gain)")
        .draw()?;
    for (index, (collection, counts)) in normalized.iter().enumerate() {
        spectra
            .draw_series(LineSeries::new(counts.iter().copied(), &Palette99::pick(index)))?
            .label(collection.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(index))
            });
    }
    spectra
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()?;

    let differences = difference_spectra(&normalized);
    if !differences.is_empty() {
        let d_min = differences
            .iter()
            .flat_map(|(_, points)| points.iter().map(|p| p.1))
            .fold(f64::INFINITY, f64::min);
        let d_max = differences
            .iter()
            .flat_map(|(_, points)| points.iter().map(|p| p.1))
            .fold(f64::NEG_INFINITY, f64::max);
        let (d_min, d_max) = pad_range(d_min - 0.1 * d_min.abs(), d_max + 0.1 * d_max.abs());
        let mut diffs = ChartBuilder::on(&diff_area)
            .margin(40)
            .caption("Successive differences", ("sans-serif", 30))
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(x_min..x_max, d_min..d_max)?;
        diffs
            .configure_mesh()
            .x_desc("Wavelength (nm)")
            .y_desc("Counts / (s * gain)")
            .draw()?;
        for (index, (label, points)) in differences.iter().enumerate() {
            diffs
                .draw_series(LineSeries::new(points.iter().copied(), &Palette99::pick(index)))?
                .label(label.clone())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(index))
                });
        }
        diffs
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.8))
            .draw()?;
    }

    if !signals.is_empty() {
        let signal_max = signals.iter().map(|s| s.1).fold(f64::NEG_INFINITY, f64::max);
        let signal_min = signals.iter().map(|s| s.1).fold(f64::INFINITY, f64::min);
        let (s_min, s_max) = pad_range(signal_min - 0.05 * signal_min.abs(), signal_max * 1.05);
        let mut trend = ChartBuilder::on(&trend_area)
            .margin(40)
            .caption(
                format!("Fitted signal above {}", config.baseline_exposure),
                ("sans-serif", 30),
            )
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0.0..signals.len() as f64 + 1.0, s_min..s_max)?;
        trend
            .configure_mesh()
            .x_desc("Collection")
            .y_desc("Integrated signal")
            .draw()?;
        trend.draw_series(LineSeries::new(
            signals
                .iter()
                .enumerate()
                .map(|(i, s)| (i as f64 + 1.0, s.1)),
            &BLUE,
        ))?;
        trend.draw_series(
            signals
                .iter()
                .enumerate()
                .map(|(i, s)| Circle::new((i as f64 + 1.0, s.1), 5, BLUE.filled())),
        )?;
    }

    draw_text_block(&table, "Signal increments", lines, (80, 40))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn record(collection: &str) -> ExposureRecord {
        ExposureRecord {
            sample: String::from("LiF-A"),
            collection: collection.to_string(),
            wavelengths: arr1(&[500.0, 500.5, 501.0]),
            combined: arr1(&[300.0, 900.0, 320.0]),
            stack: arr2(&[[290.0, 880.0, 310.0], [310.0, 920.0, 330.0]]),
            exposure_secs: 10.0,
            gain: 4,
            slit_width_um: 100.0,
            power_mw: 1.25,
            bin_size: 0.5,
            date_and_time: String::from("Tue Aug 12 14:03:22.1234 2025"),
        }
    }

    #[test]
    fn header_table_hides_fields_shown_elsewhere() {
        let mut metadata = AcquisitionMetadata::default();
        metadata.insert(KEY_DATE_AND_TIME, "Tue Aug 12 14:03:22.1234 2025");
        metadata.insert(KEY_EXPOSURE_TIME, "10");
        metadata.insert("Unstabilized Temperature (C)", "-59.5");
        metadata.insert("SR193i Grating", "1200 l/mm");
        metadata.insert("Model", "iXon Ultra 888");

        let lines = header_table_lines(&metadata);
        assert_eq!(lines, vec!["Model: iXon Ultra 888"]);
    }

    #[test]
    fn exposure_range_floor_and_headroom() {
        let record = record("Coll1");
        let (low, high) = exposure_y_range(&record);
        assert_eq!(low, 250.0);
        // Combined max (900) dominates the stack mean here
        assert!((high - 1080.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_ranges_are_widened() {
        assert_eq!(pad_range(5.0, 5.0), (4.0, 6.0));
        assert_eq!(pad_range(1.0, 2.0), (1.0, 2.0));
    }

    #[test]
    fn difference_spectra_diff_consecutive_normalized_collections() {
        let first = record("Coll1");
        let mut second = record("Coll2");
        second.combined = arr1(&[340.0, 980.0, 360.0]);

        // Exposure 10 s at gain 4 divides every count by 40
        let normalized = normalized_spectra(&[&first, &second]);
        assert_eq!(normalized[0].1[1], (500.5, 22.5));

        let differences = difference_spectra(&normalized);
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].0, "Coll2 - Coll1");
        assert_eq!(
            differences[0].1,
            vec![(500.0, 1.0), (500.5, 2.0), (501.0, 1.0)]
        );
    }

    #[test]
    fn difference_spectra_need_at_least_two_collections() {
        let only = record("Coll1");
        let normalized = normalized_spectra(&[&only]);
        assert!(difference_spectra(&normalized).is_empty());
    }

    #[test]
    fn signal_differences_cover_consecutive_pairs() {
        let signals = vec![
            (String::from("Coll1"), 100.0),
            (String::from("Coll2"), 150.0),
            (String::from("Coll3"), 130.0),
        ];
        let lines = signal_difference_lines(&signals);
        assert_eq!(lines.len(), 5);
        assert!(lines[3].contains("+50.0"));
        assert!(lines[4].contains("-20.0"));
    }

    #[test]
    fn shape_only_page_renders_into_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = PdfWriter::new(&dir.path().join("r.pdf"), "t");
        let mut buffer = blank_page();
        {
            let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
                .into_drawing_area();
            area.fill(&WHITE).unwrap();
            area.draw(&Rectangle::new([(100, 100), (400, 400)], BLUE.filled()))
                .unwrap();
            area.present().unwrap();
        }
        writer.add_page(buffer).unwrap();
        writer.close().unwrap();
    }
}
