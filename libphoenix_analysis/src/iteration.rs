use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::error::IterationError;
use super::spectrum;

/// How the repeated iterations of one exposure are collapsed into a single
/// representative spectrum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineMethod {
    /// Per-bin arithmetic mean across iterations.
    #[serde(rename = "simple-average")]
    SimpleAverage,
    /// Per-bin weighted mean with weight `exp(-|x - mean| / std)`, which
    /// softly down-weights sporadic spikes (cosmic rays, readout noise)
    /// without an explicit rejection threshold. Bins where the standard
    /// deviation is zero fall back to the plain mean.
    #[default]
    #[serde(rename = "mean-weighted")]
    MeanWeighted,
}

impl FromStr for CombineMethod {
    type Err = IterationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple-average" => Ok(Self::SimpleAverage),
            "mean-weighted" => Ok(Self::MeanWeighted),
            other => Err(IterationError::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimpleAverage => write!(f, "simple-average"),
            Self::MeanWeighted => write!(f, "mean-weighted"),
        }
    }
}

/// All iterations of one (collection, sample) pair stacked into a matrix.
///
/// Rows are iterations, columns are wavelength bins. Every row was acquired
/// on the same wavelength axis; no rebinning is performed.
#[derive(Debug, Clone, Default)]
pub struct IterationStack {
    pub wavelengths: Array1<f64>,
    pub counts: Array2<f64>,
}

impl IterationStack {
    /// Enumerate `it_0.txt`, `it_1.txt`, ... in `dir`, reading each spectrum
    /// into a row of the stack. Enumeration stops at the first missing index,
    /// so a gap terminates the stack even if higher indices exist.
    ///
    /// A directory without `it_0.txt` yields a valid empty stack; a file that
    /// exists but fails to parse is an error.
    pub fn build(dir: &Path, cut: usize) -> Result<Self, IterationError> {
        let mut wavelengths: Option<Array1<f64>> = None;
        let mut rows: Vec<f64> = Vec::new();
        let mut iterations = 0;
        loop {
            let path = dir.join(format!("it_{iterations}.txt"));
            if !path.exists() {
                break;
            }
            let spectrum = spectrum::read_spectrum(&path, cut)?;
            match &wavelengths {
                None => wavelengths = Some(spectrum.wavelengths),
                Some(axis) => {
                    if spectrum.counts.len() != axis.len() {
                        return Err(IterationError::BinCountMismatch {
                            iteration: iterations,
                            expected: axis.len(),
                            found: spectrum.counts.len(),
                        });
                    }
                }
            }
            rows.extend(spectrum.counts.iter());
            iterations += 1;
        }

        let wavelengths = wavelengths.unwrap_or_else(|| Array1::zeros(0));
        let bins = wavelengths.len();
        let counts = Array2::from_shape_vec((iterations, bins), rows)
            .expect("every row has the same bin count");
        Ok(Self {
            wavelengths,
            counts,
        })
    }

    pub fn iterations(&self) -> usize {
        self.counts.nrows()
    }

    pub fn bins(&self) -> usize {
        self.counts.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.nrows() == 0
    }

    /// Collapse the stack to one representative spectrum.
    pub fn combine(&self, method: CombineMethod) -> Array1<f64> {
        combine(self.counts.view(), method)
    }
}

/// Collapse an iteration matrix to one spectrum. The output always has the
/// same column count as the input.
pub fn combine(matrix: ArrayView2<'_, f64>, method: CombineMethod) -> Array1<f64> {
    let bins = matrix.ncols();
    if matrix.nrows() == 0 {
        return Array1::zeros(bins);
    }
    match method {
        CombineMethod::SimpleAverage => matrix
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(bins)),
        CombineMethod::MeanWeighted => {
            let mut combined = Array1::zeros(bins);
            for (bin, column) in matrix.axis_iter(Axis(1)).enumerate() {
                let mean = column.mean().unwrap_or(0.0);
                let std = column.std(0.0);
                combined[bin] = if std > 0.0 {
                    let mut weighted_sum = 0.0;
                    let mut weight_sum = 0.0;
                    for &value in &column {
                        let weight = (-(value - mean).abs() / std).exp();
                        weighted_sum += value * weight;
                        weight_sum += weight;
                    }
                    if weight_sum > 0.0 && weight_sum.is_finite() {
                        weighted_sum / weight_sum
                    } else {
                        mean
                    }
                } else {
                    mean
                };
            }
            combined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use std::io::Write;

    fn write_iteration(dir: &Path, index: usize, counts: &[f64]) {
        let path = dir.join(format!("it_{index}.txt"));
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "Exposure Time (secs): 10").unwrap();
        for (i, c) in counts.iter().enumerate() {
            writeln!(file, "{} {}", 500.0 + i as f64, c).unwrap();
        }
    }

    #[test]
    fn simple_average_is_column_mean() {
        let matrix = arr2(&[[1.0, 2.0, 3.0], [3.0, 6.0, 9.0]]);
        let combined = combine(matrix.view(), CombineMethod::SimpleAverage);
        assert_eq!(combined, ndarray::arr1(&[2.0, 4.0, 6.0]));
    }

    #[test]
    fn identical_rows_mean_weighted_returns_common_row() {
        let matrix = arr2(&[[5.0, 7.0, 11.0], [5.0, 7.0, 11.0], [5.0, 7.0, 11.0]]);
        let combined = combine(matrix.view(), CombineMethod::MeanWeighted);
        assert_eq!(combined, ndarray::arr1(&[5.0, 7.0, 11.0]));
    }

    #[test]
    fn single_row_mean_weighted_equals_simple_average() {
        let matrix = arr2(&[[1.5, 2.5, 3.5, 4.5]]);
        let weighted = combine(matrix.view(), CombineMethod::MeanWeighted);
        let simple = combine(matrix.view(), CombineMethod::SimpleAverage);
        assert_eq!(weighted, simple);
    }

    #[test]
    fn combine_preserves_column_count() {
        let matrix = arr2(&[[1.0, 2.0, 3.0, 4.0, 5.0], [2.0, 3.0, 4.0, 5.0, 6.0]]);
        for method in [CombineMethod::SimpleAverage, CombineMethod::MeanWeighted] {
            assert_eq!(combine(matrix.view(), method).len(), matrix.ncols());
        }
    }

    #[test]
    fn mean_weighted_downweights_an_outlier() {
        // Nine well-behaved iterations and one spike; the robust mean must
        // land below the plain mean but above the quiet value.
        let mut rows = vec![[100.0]; 9];
        rows.push([1000.0]);
        let matrix = Array2::from_shape_vec((10, 1), rows.concat()).unwrap();
        let weighted = combine(matrix.view(), CombineMethod::MeanWeighted)[0];
        let simple = combine(matrix.view(), CombineMethod::SimpleAverage)[0];
        assert!(weighted < simple);
        assert!(weighted > 100.0);
    }

    #[test]
    fn build_stops_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        write_iteration(dir.path(), 0, &[1.0, 2.0, 3.0]);
        write_iteration(dir.path(), 2, &[4.0, 5.0, 6.0]);
        let stack = IterationStack::build(dir.path(), 1).unwrap();
        assert_eq!(stack.iterations(), 1);
        assert_eq!(stack.bins(), 3);
    }

    #[test]
    fn build_of_empty_directory_is_a_valid_empty_stack() {
        let dir = tempfile::tempdir().unwrap();
        let stack = IterationStack::build(dir.path(), 1).unwrap();
        assert!(stack.is_empty());
        assert_eq!(stack.combine(CombineMethod::MeanWeighted).len(), 0);
    }

    #[test]
    fn malformed_first_iteration_is_an_error_not_an_empty_stack() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("it_0.txt"), "header: x\n500.0 oops\n").unwrap();
        assert!(matches!(
            IterationStack::build(dir.path(), 1),
            Err(IterationError::SpectrumError(_))
        ));
    }

    #[test]
    fn mismatched_bin_count_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_iteration(dir.path(), 0, &[1.0, 2.0, 3.0]);
        write_iteration(dir.path(), 1, &[1.0, 2.0]);
        assert!(matches!(
            IterationStack::build(dir.path(), 1),
            Err(IterationError::BinCountMismatch { iteration: 1, .. })
        ));
    }

    #[test]
    fn unknown_method_string_is_rejected() {
        assert!(matches!(
            "median".parse::<CombineMethod>(),
            Err(IterationError::InvalidMethod(_))
        ));
        assert_eq!(
            "mean-weighted".parse::<CombineMethod>().unwrap(),
            CombineMethod::MeanWeighted
        );
    }
}
