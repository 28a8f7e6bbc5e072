//! Page renderers for the simulation report.
//!
//! Summarizes the Geant4 output of a source characterization run: the
//! generated primaries, the energy deposited in the sensitive volume, the
//! geometry parameters, and the decay-corrected source activities.

use plotters::coord::Shift;
use plotters::prelude::*;
use time::Date;

use super::constants::{
    AMBE_HALF_LIFE_DAYS, AMBE_INIT_ACTIVITY_BQ, AMBE_PRODUCTION_DATE, CO60_HALF_LIFE_DAYS,
    CO60_INIT_ACTIVITY_BQ, CO60_PRODUCTION_DATE, PAGE_HEIGHT_PX, PAGE_WIDTH_PX,
};
use super::decay;
use super::error::ReportError;
use super::pdf::PdfWriter;
use super::report::{blank_page, draw_error, draw_text_block, pad_range, DrawResult};
use super::simulation::{
    gamma_percentage, total_edep, unique_event_numbers, HitRecord, PrimaryRecord, PDG_GAMMA,
    PDG_NEUTRON,
};

/// Bin count of every primaries histogram.
const HISTOGRAM_BINS: usize = 72;

/// Equal-width binning of `values`, returned as (low, high, count) per bin.
fn histogram(values: &[f64], bins: usize) -> Vec<(f64, f64, f64)> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let (min, max) = pad_range(
        values.iter().copied().fold(f64::INFINITY, f64::min),
        values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    );
    let width = (max - min) / bins as f64;
    let mut counts = vec![0.0; bins];
    for &value in values {
        let index = (((value - min) / width) as usize).min(bins - 1);
        counts[index] += 1.0;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (min + i as f64 * width, min + (i + 1) as f64 * width, count))
        .collect()
}

fn draw_histogram(
    area: &DrawingArea<BitMapBackend, Shift>,
    title: &str,
    x_desc: &str,
    series: &[(&str, Vec<(f64, f64, f64)>)],
) -> DrawResult {
    if series.iter().all(|(_, bins)| bins.is_empty()) {
        return Ok(());
    }
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max = 0.0f64;
    for (_, bins) in series {
        for &(lo, hi, count) in bins {
            x_min = x_min.min(lo);
            x_max = x_max.max(hi);
            y_max = y_max.max(count);
        }
    }
    let (x_min, x_max) = pad_range(x_min.min(x_max), x_max);
    let (y_min, y_max) = pad_range(0.0, 1.1 * y_max);

    let mut chart = ChartBuilder::on(area)
        .margin(40)
        .caption(title, ("sans-serif", 28))
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Counts")
        .draw()?;
    for (index, (label, bins)) in series.iter().enumerate() {
        chart
            .draw_series(bins.iter().map(|&(lo, hi, count)| {
                Rectangle::new([(lo, 0.0), (hi, count)], Palette99::pick(index).mix(0.5).filled())
            }))?
            .label(label.to_string())
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 12, y + 6)], Palette99::pick(index).filled())
            });
    }
    if series.len() > 1 {
        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.8))
            .draw()?;
    }
    Ok(())
}

/// Primaries statistics for the summary table.
fn primaries_lines(neutrons: &[PrimaryRecord], gammas: &[PrimaryRecord]) -> Vec<String> {
    vec![
        format!("# Primaries: {}", neutrons.len()),
        format!("# Gammas: {}", gammas.len()),
        format!("Gamma percentage: {}%", gamma_percentage(neutrons, gammas)),
    ]
}

/// Append the primaries characterization page: summary statistics, the
/// primary neutron and gamma energy spectra, and the neutron emission
/// direction components.
pub fn page_primaries(
    writer: &mut PdfWriter,
    neutrons: &[PrimaryRecord],
    gammas: &[PrimaryRecord],
) -> Result<(), ReportError> {
    let stats = primaries_lines(neutrons, gammas);
    let neutron_energies: Vec<f64> = neutrons.iter().map(|p| p.energy_mev).collect();
    let gamma_energies: Vec<f64> = gammas.iter().map(|p| p.energy_mev).collect();
    let dir_x: Vec<f64> = neutrons.iter().map(|p| p.dir_x).collect();
    let dir_y: Vec<f64> = neutrons.iter().map(|p| p.dir_y).collect();
    let dir_z: Vec<f64> = neutrons.iter().map(|p| p.dir_z).collect();

    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        area.fill(&WHITE).map_err(draw_error)?;

        let (table, charts) = area.clone().split_vertically(260);
        draw_text_block(&table, "Primaries characterization", &stats, (80, 50))
            .map_err(draw_error)?;

        let panel_height = (PAGE_HEIGHT_PX as i32 - 260) / 3;
        let (first, rest) = charts.split_vertically(panel_height);
        let (second, third) = rest.split_vertically(panel_height);
        draw_histogram(
            &first,
            "Primary neutron energy spectrum",
            "Energy (MeV)",
            &[("neutrons", histogram(&neutron_energies, HISTOGRAM_BINS))],
        )
        .map_err(draw_error)?;
        draw_histogram(
            &second,
            "Primary gamma energy spectrum",
            "Energy (MeV)",
            &[("gammas", histogram(&gamma_energies, HISTOGRAM_BINS))],
        )
        .map_err(draw_error)?;
        draw_histogram(
            &third,
            "Primary neutron direction components",
            "Direction cosine",
            &[
                ("x", histogram(&dir_x, HISTOGRAM_BINS)),
                ("y", histogram(&dir_y, HISTOGRAM_BINS)),
                ("z", histogram(&dir_z, HISTOGRAM_BINS)),
            ],
        )
        .map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}

/// Energy deposition summary for the hits page.
fn hits_lines(hits: &[HitRecord]) -> Vec<String> {
    vec![
        format!("Hit records: {}", hits.len()),
        format!("Events with hits: {}", unique_event_numbers(hits).len()),
        format!(
            "Neutron energy deposited: {:.4} MeV",
            total_edep(hits, PDG_NEUTRON)
        ),
        format!(
            "Gamma energy deposited: {:.4} MeV",
            total_edep(hits, PDG_GAMMA)
        ),
    ]
}

/// Append the hits page: counts and energy deposition per species, plus the
/// deposited energy spectrum across all hit records.
pub fn page_hits(writer: &mut PdfWriter, hits: &[HitRecord]) -> Result<(), ReportError> {
    let lines = hits_lines(hits);
    let edep: Vec<f64> = hits.iter().map(|h| h.edep_mev).collect();

    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        area.fill(&WHITE).map_err(draw_error)?;
        let (table, chart) = area.clone().split_vertically(PAGE_HEIGHT_PX as i32 / 2);
        draw_text_block(&table, "Energy deposition", &lines, (80, 60)).map_err(draw_error)?;
        draw_histogram(
            &chart,
            "Deposited energy per hit",
            "Energy (MeV)",
            &[("hits", histogram(&edep, HISTOGRAM_BINS))],
        )
        .map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}

/// Append the geometry parameter table page.
pub fn page_geometry(
    writer: &mut PdfWriter,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<(), ReportError> {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(" | "));
    for row in rows {
        lines.push(row.join(" | "));
    }

    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        area.fill(&WHITE).map_err(draw_error)?;
        draw_text_block(&area, "Geometry parameters", &lines, (80, 80)).map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}

fn source_activity_lines(on: Date) -> Vec<String> {
    let co60_days = decay::days_elapsed(CO60_PRODUCTION_DATE, on);
    let co60_bq = decay::remaining_activity(CO60_INIT_ACTIVITY_BQ, CO60_HALF_LIFE_DAYS, co60_days);
    let ambe_days = decay::days_elapsed(AMBE_PRODUCTION_DATE, on);
    let ambe_bq = decay::remaining_activity(AMBE_INIT_ACTIVITY_BQ, AMBE_HALF_LIFE_DAYS, ambe_days);
    vec![
        format!("Reference date: {on}"),
        format!("Co-60: {co60_days} days since production, {co60_bq:.3e} Bq remaining"),
        format!("AmBe: {ambe_days} days since production, {ambe_bq:.3e} Bq remaining"),
    ]
}

/// Append the source activity page: the check source activities decay
/// corrected to the given reference date.
pub fn page_source_activity(writer: &mut PdfWriter, on: Date) -> Result<(), ReportError> {
    let lines = source_activity_lines(on);

    let mut buffer = blank_page();
    {
        let area = BitMapBackend::with_buffer(&mut buffer, (PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
            .into_drawing_area();
        area.fill(&WHITE).map_err(draw_error)?;
        draw_text_block(&area, "Check source activities", &lines, (80, 80))
            .map_err(draw_error)?;
        area.present().map_err(draw_error)?;
    }
    writer.add_page(buffer)
}
