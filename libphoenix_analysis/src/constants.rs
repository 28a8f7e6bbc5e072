//! Instrument, fit, and source constants shared across the analysis.

use time::macros::date;
use time::Date;

/// Number of header lines in an acquisition file before the data rows begin.
pub const DEFAULT_HEADER_CUT: usize = 31;

/// Lower index (inclusive) of the spectral window handed to the peak fitter.
pub const FIT_WINDOW_LOW: usize = 40;
/// Upper index (exclusive) of the spectral window handed to the peak fitter.
pub const FIT_WINDOW_HIGH: usize = 350;

/// Seed for the primary Gaussian center (nm).
pub const PEAK1_MEAN_SEED: f64 = 510.0;
/// Seed for the primary Gaussian width (nm).
pub const PEAK1_SIGMA_SEED: f64 = 25.0;
/// Seed for the secondary Gaussian center (nm).
pub const PEAK2_MEAN_SEED: f64 = 530.0;
/// The secondary component starts twice as wide as the primary.
pub const PEAK2_SIGMA_SEED: f64 = 2.0 * PEAK1_SIGMA_SEED;

/// Excitation photon energy in eV.
pub const PHOTON_ENERGY_EV: f64 = 2.786;
/// Conversion factor from eV to Joules.
pub const EV_TO_J: f64 = 1.602e-19;
/// Photons emitted per second per mW of laser power.
pub const PHOTONS_PER_MW: f64 = 1e-3 / (PHOTON_ENERGY_EV * EV_TO_J);

/// Co-60 check source: initial activity in Bq (1 mCi).
pub const CO60_INIT_ACTIVITY_BQ: f64 = 37_000_000.0;
/// Co-60 check source: production date.
pub const CO60_PRODUCTION_DATE: Date = date!(2016 - 01 - 26);
/// Co-60 half-life in days.
pub const CO60_HALF_LIFE_DAYS: f64 = 1925.28;

/// AmBe source: initial activity in Bq (2.2 uCi).
pub const AMBE_INIT_ACTIVITY_BQ: f64 = 81_000.0;
/// AmBe source: production date.
pub const AMBE_PRODUCTION_DATE: Date = date!(2021 - 02 - 09);
/// AmBe half-life in days (driven by the Am-241 parent).
pub const AMBE_HALF_LIFE_DAYS: f64 = 157_788.0;

/// Report pages are rasterized at A4 portrait, 150 dpi.
pub const PAGE_WIDTH_PX: u32 = 1240;
pub const PAGE_HEIGHT_PX: u32 = 1754;
pub const PAGE_DPI: f64 = 150.0;
