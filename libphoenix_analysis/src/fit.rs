use nalgebra::DVector;
use ndarray::Array1;
use varpro::model::builder::SeparableModelBuilder;
use varpro::solvers::levmar::{LevMarProblemBuilder, LevMarSolver};

use super::constants::{
    FIT_WINDOW_HIGH, FIT_WINDOW_LOW, PEAK1_MEAN_SEED, PEAK1_SIGMA_SEED, PEAK2_MEAN_SEED,
    PEAK2_SIGMA_SEED,
};
use super::dataset::PhaseDataset;
use super::error::FitError;

/// The first component of a converged double-Gaussian fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakFit {
    pub amplitude: f64,
    pub sigma: f64,
    pub mean: f64,
}

impl PeakFit {
    /// Integrated area of the Gaussian component: amplitude * sigma * sqrt(2 pi).
    pub fn signal(&self) -> f64 {
        self.amplitude * self.sigma * (2.0 * std::f64::consts::PI).sqrt()
    }
}

fn gaussian(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|v| (-((v - mean).powi(2)) / (2.0 * sigma.powi(2))).exp())
}

fn gaussian_pd_mean(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|v| (v - mean) / sigma.powi(2) * (-((v - mean).powi(2)) / (2.0 * sigma.powi(2))).exp())
}

fn gaussian_pd_sigma(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|v| {
        let exponent = -((v - mean).powi(2)) / (2.0 * sigma.powi(2));
        (v - mean).powi(2) / sigma.powi(3) * exponent.exp()
    })
}

/// Fit a two-component Gaussian sum to the fixed spectral window
/// `[FIT_WINDOW_LOW, FIT_WINDOW_HIGH)` of the input arrays and return the
/// first component.
///
/// The component centers and widths are the nonlinear parameters, seeded at
/// the fixed instrument values; the amplitudes are linear coefficients solved
/// exactly by the VarPro formulation. A non-converging solve is surfaced
/// as-is; there is no reseeding or retry.
pub fn fit_double_gaussian(
    wavelengths: &Array1<f64>,
    intensities: &Array1<f64>,
) -> Result<PeakFit, FitError> {
    if wavelengths.len() != intensities.len() {
        return Err(FitError::AxisMismatch {
            x_len: wavelengths.len(),
            y_len: intensities.len(),
        });
    }
    if intensities.len() < FIT_WINDOW_HIGH {
        return Err(FitError::WindowOutOfBounds {
            low: FIT_WINDOW_LOW,
            high: FIT_WINDOW_HIGH,
            len: intensities.len(),
        });
    }

    let window = FIT_WINDOW_LOW..FIT_WINDOW_HIGH;
    let x_data = DVector::from_iterator(
        window.len(),
        wavelengths.iter().copied().skip(FIT_WINDOW_LOW).take(window.len()),
    );
    let y_data = DVector::from_iterator(
        window.len(),
        intensities.iter().copied().skip(FIT_WINDOW_LOW).take(window.len()),
    );

    let model = SeparableModelBuilder::<f64>::new(vec![
        "mean1".to_string(),
        "sigma1".to_string(),
        "mean2".to_string(),
        "sigma2".to_string(),
    ])
    .initial_parameters(vec![
        PEAK1_MEAN_SEED,
        PEAK1_SIGMA_SEED,
        PEAK2_MEAN_SEED,
        PEAK2_SIGMA_SEED,
    ])
    .independent_variable(x_data)
    .function(&["mean1", "sigma1"], gaussian)
    .partial_deriv("mean1", gaussian_pd_mean)
    .partial_deriv("sigma1", gaussian_pd_sigma)
    .function(&["mean2", "sigma2"], gaussian)
    .partial_deriv("mean2", gaussian_pd_mean)
    .partial_deriv("sigma2", gaussian_pd_sigma)
    .build()
    .map_err(|e| FitError::ModelError(e.to_string()))?;

    let problem = LevMarProblemBuilder::new(model)
        .observations(y_data)
        .build()
        .map_err(|e| FitError::ModelError(e.to_string()))?;

    let (result, _statistics) = LevMarSolver::default()
        .fit_with_statistics(problem)
        .map_err(|_| {
            FitError::NoConvergence(String::from(
                "Levenberg-Marquardt did not converge from the fixed seeds",
            ))
        })?;

    let nonlinear = result.nonlinear_parameters();
    let amplitudes = result.linear_coefficients().ok_or_else(|| {
        FitError::NoConvergence(String::from("solver returned no linear coefficients"))
    })?;

    Ok(PeakFit {
        amplitude: amplitudes[0],
        mean: nonlinear[0],
        sigma: nonlinear[1],
    })
}

/// Derive the integrated signal of `sample` for every collection of the
/// dataset: subtract the scalar mean of the reference (`baseline`) combined
/// spectrum from the sample's combined spectrum, fit, and take the first
/// component's area.
pub fn collection_signals(
    dataset: &PhaseDataset,
    sample: &str,
    baseline: &str,
) -> Result<Vec<(String, f64)>, FitError> {
    let mut signals = Vec::new();
    for collection in &dataset.layout.collections {
        let target = dataset
            .exposure(sample, collection)
            .ok_or_else(|| FitError::MissingSample {
                sample: sample.to_string(),
                collection: collection.clone(),
            })?;
        let reference = dataset
            .exposure(baseline, collection)
            .ok_or_else(|| FitError::MissingBaseline(collection.clone()))?;
        let baseline_level = reference.combined.mean().unwrap_or(0.0);
        let corrected = &target.combined - baseline_level;
        let fit = fit_double_gaussian(&target.wavelengths, &corrected)?;
        signals.push((collection.clone(), fit.signal()));
    }
    Ok(signals)
}
