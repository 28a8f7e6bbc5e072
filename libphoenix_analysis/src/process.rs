use std::sync::{Arc, Mutex};

use time::OffsetDateTime;

use super::config::Config;
use super::dataset::PhaseDataset;
use super::error::ProcessorError;
use super::fit;
use super::pdf::PdfWriter;
use super::report;
use super::sim_report;
use super::simulation::{self, HIT_PREAMBLE_LINES};

/// Geant4 ntuple output of the sensitive volume hits.
const HITS_FILE: &str = "output0_nt_Hits.csv";
/// Generated primary neutrons, one row per primary.
const NEUTRONS_FILE: &str = "generated_neutrons.csv";
/// Generated primary gammas, one row per primary.
const GAMMAS_FILE: &str = "generated_gammas.csv";
/// Geometry parameter table written by the simulation at startup.
const GEO_PARAMS_FILE: &str = "geo_params.csv";

fn set_progress(status: &Arc<Mutex<f32>>, fraction: f32) {
    match status.lock() {
        Ok(mut stat) => *stat = fraction,
        Err(e) => log::error!("Could not update progress status: {e}"),
    }
}

/// Build the phase datasets and render the phase report.
///
/// Pages come out in measurement order: a report title page, then per
/// collection a title, the acquisition overview, and one exposure page per
/// sample, and finally one dose response page per material sample.
pub fn process_phase(config: &Config, status: &Arc<Mutex<f32>>) -> Result<(), ProcessorError> {
    log::info!("Building datasets for phase {}...", config.phase_name());
    let dataset = PhaseDataset::build(config)?;

    let materials = dataset.layout.material_samples(config);
    let page_units = dataset.layout.collections.len() * (dataset.layout.samples.len() + 1)
        + materials.len();
    let total = page_units as f32;
    let mut done = 0.0f32;

    let mut writer = PdfWriter::new(&config.report_path, &config.phase_name());
    report::page_title(
        &mut writer,
        &config.phase_name(),
        &[
            config.report_description.clone(),
            format!(
                "{} collections, {} samples",
                dataset.layout.collections.len(),
                dataset.layout.samples.len()
            ),
        ],
    )?;

    for collection in &dataset.layout.collections {
        log::info!("Rendering pages for {collection}...");
        report::page_title(
            &mut writer,
            collection,
            &[format!("{} samples", dataset.layout.samples.len())],
        )?;
        report::page_acquisition(&mut writer, config, &dataset, collection)?;
        done += 1.0;
        set_progress(status, done / total);
        for sample in &dataset.layout.samples {
            report::page_exposure(&mut writer, &dataset, collection, sample)?;
            done += 1.0;
            set_progress(status, done / total);
        }
    }

    for sample in materials {
        log::info!("Fitting dose response for {sample}...");
        let signals = fit::collection_signals(&dataset, sample, &config.baseline_exposure)?;
        report::page_diff(&mut writer, config, &dataset, sample, &signals)?;
        done += 1.0;
        set_progress(status, done / total);
    }

    writer.close()?;
    log::info!(
        "Wrote phase report to {}",
        config.report_path.to_string_lossy()
    );
    Ok(())
}

/// Read the Geant4 output and render the simulation report.
pub fn process_simulation(
    config: &Config,
    status: &Arc<Mutex<f32>>,
) -> Result<(), ProcessorError> {
    let Some(data_dir) = config.sim_data_path.as_ref() else {
        log::info!("No simulation data configured, skipping simulation report.");
        return Ok(());
    };
    log::info!(
        "Reading simulation output from {}...",
        data_dir.to_string_lossy()
    );
    let hits = simulation::read_hits(&data_dir.join(HITS_FILE), HIT_PREAMBLE_LINES)?;
    let neutrons = simulation::read_primaries(&data_dir.join(NEUTRONS_FILE))?;
    let gammas = simulation::read_primaries(&data_dir.join(GAMMAS_FILE))?;
    let (geo_headers, geo_rows) = simulation::read_geo_params(&data_dir.join(GEO_PARAMS_FILE))?;

    let today = OffsetDateTime::now_utc().date();
    let report_path = config.sim_report_file();
    let mut writer = PdfWriter::new(&report_path, "Simulation Report");
    report::page_title(
        &mut writer,
        "Simulation Report",
        &[
            data_dir.to_string_lossy().into_owned(),
            format!("Created: {today}"),
        ],
    )?;
    set_progress(status, 0.2);
    sim_report::page_primaries(&mut writer, &neutrons, &gammas)?;
    set_progress(status, 0.4);
    sim_report::page_hits(&mut writer, &hits)?;
    set_progress(status, 0.6);
    sim_report::page_geometry(&mut writer, &geo_headers, &geo_rows)?;
    set_progress(status, 0.8);
    sim_report::page_source_activity(&mut writer, today)?;
    writer.close()?;
    set_progress(status, 1.0);
    log::info!(
        "Wrote simulation report to {}",
        report_path.to_string_lossy()
    );
    Ok(())
}

/// The function to be called by a separate thread (typically the CLI).
/// Runs the phase analysis and, when simulation data is configured, the
/// simulation report afterwards.
pub fn process(config: Config, status: Arc<Mutex<f32>>) -> Result<(), ProcessorError> {
    process_phase(&config, &status)?;
    if config.has_simulation() {
        process_simulation(&config, &status)?;
    }
    set_progress(&status, 1.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_updates_are_visible_through_the_handle() {
        let status = Arc::new(Mutex::new(0.0f32));
        set_progress(&status, 0.5);
        assert_eq!(*status.lock().unwrap(), 0.5);
    }
}
