use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("Could not open acquisition file because {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Acquisition file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Failed to parse numeric value {value:?} on line {line} of {path:?}")]
    BadNumber {
        value: String,
        line: usize,
        path: PathBuf,
    },
    #[error("Data row on line {line} of {path:?} has fewer than 2 columns")]
    ShortRow { line: usize, path: PathBuf },
    #[error("Acquisition header is missing required key: {0}")]
    MissingKey(String),
    #[error("Acquisition header value {value:?} for key {key:?} is malformed")]
    BadHeaderValue { key: String, value: String },
    #[error("Failed to parse acquisition timestamp {0:?}: {1}")]
    BadTimestamp(String, #[source] time::error::Parse),
}

#[derive(Debug, Error)]
pub enum IterationError {
    #[error("Iteration stack failed due to spectrum error: {0}")]
    SpectrumError(#[from] SpectrumError),
    #[error("Iteration {iteration} has {found} bins but the stack expects {expected}")]
    BinCountMismatch {
        iteration: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown combination method: {0}")]
    InvalidMethod(String),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset builder failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Phase directory {0:?} does not exist")]
    BadPhasePath(PathBuf),
    #[error("No collection directories matching prefix {prefix:?} under {path:?}")]
    NoCollections { prefix: String, path: PathBuf },
    #[error("Power file {0:?} does not exist")]
    BadPowerPath(PathBuf),
    #[error("Power file {0:?} has an unexpected format; expected the reading on line 2, field 2")]
    BadPowerFormat(PathBuf),
    #[error("Failed to parse power value {value:?} in {path:?}")]
    BadPowerValue { value: String, path: PathBuf },
    #[error("Dataset builder failed due to iteration error: {0}")]
    IterationError(#[from] IterationError),
    #[error("Dataset builder failed due to spectrum error: {0}")]
    SpectrumError(#[from] SpectrumError),
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("Fit window [{low}, {high}) does not fit in a spectrum of {len} bins")]
    WindowOutOfBounds { low: usize, high: usize, len: usize },
    #[error("Wavelength axis has {x_len} bins but the intensity array has {y_len}")]
    AxisMismatch { x_len: usize, y_len: usize },
    #[error("Failed to build the double-Gaussian model: {0}")]
    ModelError(String),
    #[error("Peak fit did not converge: {0}")]
    NoConvergence(String),
    #[error("No baseline spectrum found for collection {0:?}")]
    MissingBaseline(String),
    #[error("No combined spectrum for sample {sample:?} in collection {collection:?}")]
    MissingSample { sample: String, collection: String },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Could not open simulation file because {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Simulation reader failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Simulation reader failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Report failed to assemble the PDF document: {0}")]
    PdfError(String),
    #[error("Report page buffer has the wrong size for an A4 page")]
    PageBuffer,
    #[error("Report failed while drawing a page: {0}")]
    DrawError(String),
    #[error("Report failed due to dataset error: {0}")]
    DatasetError(#[from] DatasetError),
    #[error("Report failed due to fit error: {0}")]
    FitError(#[from] FitError),
    #[error("Report failed due to spectrum error: {0}")]
    SpectrumError(#[from] SpectrumError),
    #[error("Report failed due to simulation error: {0}")]
    SimulationError(#[from] SimulationError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Dataset error: {0}")]
    DatasetError(#[from] DatasetError),
    #[error("Processor failed due to Fit error: {0}")]
    FitError(#[from] FitError),
    #[error("Processor failed due to Report error: {0}")]
    ReportError(#[from] ReportError),
    #[error("Processor failed due to Simulation error: {0}")]
    SimulationError(#[from] SimulationError),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
