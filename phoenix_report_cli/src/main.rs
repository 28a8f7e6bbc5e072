//! # phoenix_report_cli
//!
//! Part of the phoenix_analysis crate family.
//!
//! Command line tool to generate Project Phoenix measurement reports. Point
//! it at a YAML configuration and it renders the phase report (and, when
//! simulation data is configured, the simulation report) as PDF files.
//!
//! ## Use
//!
//! Generate a template configuration:
//!
//! ```bash
//! phoenix_report_cli new -p config.yml
//! ```
//!
//! Run an analysis:
//!
//! ```bash
//! phoenix_report_cli -p config.yml
//! ```

use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use libphoenix_analysis::config::Config;
use libphoenix_analysis::process::process;

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could not create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn main() {
    // Create a cli
    let matches = Command::new("phoenix_report_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );

        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Phase Path: {}", config.phase_path.to_string_lossy());
    log::info!("Report Path: {}", config.report_path.to_string_lossy());
    match &config.sim_data_path {
        Some(path) => log::info!("Simulation Data Path: {}", path.to_string_lossy()),
        None => log::info!("Simulation Data Path: none"),
    }
    log::info!("Combine Method: {}", config.combine_method);
    log::info!(
        "Exposures: {} Baseline: {}",
        config.exposures.join(", "),
        config.baseline_exposure
    );

    if !config.does_phase_exist() {
        log::error!(
            "Phase directory {} does not exist!",
            config.phase_path.to_string_lossy()
        );
        return;
    }

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    let status = Arc::new(Mutex::new(0.0));
    let sent_status = status.clone();
    // Spawn the task!
    let handle = std::thread::spawn(|| process(config, sent_status));

    loop {
        // No UI here, so sleep ~1 sec between progress updates
        std::thread::sleep(std::time::Duration::from_secs(1));
        match status.lock() {
            Ok(stat) => pb.set_position((*stat * 100.0) as u64),
            Err(e) => log::error!("{e}"),
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(_) => log::info!("Successfully generated reports!"),
                    Err(e) => log::error!("Report generation failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join report generation task!"),
            }
            break;
        }
    }

    pb.finish();

    log::info!("Done.");
}
