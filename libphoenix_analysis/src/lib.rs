//! # phoenix_analysis
//!
//! phoenix_analysis is the Project Phoenix data analysis toolkit, written in Rust.
//! It takes the raw output of the optical spectroscopy measurement campaigns
//! (acquisition text files written by the spectrometer) together with the
//! Geant4 simulation output of the irradiation sources, and renders PDF
//! reports summarizing a measurement phase.
//!
//! ## Installation
//!
//! Install from source by cloning the repository and using
//! `cargo install --path ./phoenix_report_cli` from the top level of the
//! repository. No system libraries beyond a working font installation are
//! required.
//!
//! ## Data layout
//!
//! A measurement phase is a directory of collections, each collection holding
//! one directory per sample/exposure condition plus a laser power reading:
//!
//! ```text
//! Phase2/
//!   Coll1/
//!     power.txt
//!     BL/
//!       it_0.txt
//!       it_1.txt
//!     AM/
//!     H2O/
//!     LiF-A/
//!   Coll2/
//!   ...
//! ```
//!
//! Each `it_<n>.txt` is one acquisition: a key-value header block followed by
//! whitespace-delimited wavelength/count rows. Iterations are numbered from
//! zero without gaps; enumeration stops at the first missing index.
//!
//! ## Configuration
//!
//! Analyses are configured with a YAML file:
//!
//! ```yaml
//! phase_path: /data/phoenix/Phase2
//! report_path: /data/phoenix/Phase2/report1.pdf
//! sim_data_path: /data/phoenix/G4P-AmBeCube
//! sim_report_path: /data/phoenix/sim_report1.pdf
//! header_cut: 31
//! combine_method: mean-weighted
//! collection_prefix: Coll
//! material_prefix: LiF
//! exposures:
//! - BL
//! - AM
//! - H2O
//! baseline_exposure: BL
//! ignore:
//! - power.txt
//! report_description: Phase 2 AmBe irradiation campaign
//! ```
//!
//! A template can be generated with `phoenix_report_cli new -p config.yml`.
//!
//! ## Output
//!
//! The phase report contains a title page, per-collection acquisition
//! overviews with the EMCCD temperature timeline, per-exposure pages showing
//! the raw iterations and the combined spectrum, and per-material dose
//! response pages based on a double-Gaussian fit of the baseline-subtracted
//! emission peak. When simulation data is configured a second report
//! summarizes the generated primaries, the energy deposition, the geometry
//! parameters, and the decay-corrected source activities.

pub mod config;
pub mod constants;
pub mod dataset;
pub mod decay;
pub mod error;
pub mod fit;
pub mod iteration;
pub mod pdf;
pub mod process;
pub mod report;
pub mod sim_report;
pub mod simulation;
pub mod spectrum;
