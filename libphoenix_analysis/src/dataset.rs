use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};

use super::config::Config;
use super::error::DatasetError;
use super::iteration::IterationStack;
use super::spectrum::{self, AcquisitionMetadata};

/// The validated result of the discovery step: which collections and which
/// sample/exposure conditions exist on disk for one phase.
///
/// Discovery is separated from aggregation so the builder never has to trust
/// raw directory listings: only names matching the configured prefixes (and
/// not on the ignore list) survive.
#[derive(Debug, Clone)]
pub struct PhaseLayout {
    pub phase: PathBuf,
    /// Collection directory names, sorted (e.g. `Coll1`, `Coll2`, ...).
    pub collections: Vec<String>,
    /// Sample/exposure names: the fixed exposures first, then the material
    /// samples discovered in the first collection, sorted.
    pub samples: Vec<String>,
}

impl PhaseLayout {
    /// Discover the collections and samples of the phase named by `config`.
    pub fn discover(config: &Config) -> Result<Self, DatasetError> {
        let root = &config.phase_path;
        if !root.exists() {
            return Err(DatasetError::BadPhasePath(root.clone()));
        }

        let collections = prefixed_dirs(root, &config.collection_prefix, &config.ignore)?;
        if collections.is_empty() {
            return Err(DatasetError::NoCollections {
                prefix: config.collection_prefix.clone(),
                path: root.clone(),
            });
        }

        // Material sample folders are discovered dynamically in the first
        // collection; the fixed exposures are always expected.
        let mut samples = config.exposures.clone();
        let first_collection = root.join(&collections[0]);
        for name in prefixed_dirs(&first_collection, &config.material_prefix, &config.ignore)? {
            if !samples.contains(&name) {
                samples.push(name);
            }
        }

        Ok(Self {
            phase: root.clone(),
            collections,
            samples,
        })
    }

    /// The discovered material samples (everything beyond the fixed exposures).
    pub fn material_samples<'a>(&'a self, config: &Config) -> Vec<&'a str> {
        self.samples
            .iter()
            .filter(|s| !config.exposures.contains(s))
            .map(|s| s.as_str())
            .collect()
    }
}

fn prefixed_dirs(
    parent: &Path,
    prefix: &str,
    ignore: &[String],
) -> Result<Vec<String>, DatasetError> {
    let mut names = Vec::new();
    for entry in parent.read_dir()? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() && name.starts_with(prefix) && !ignore.contains(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// One observation of the fully indexed raw table:
/// (sample, collection, iteration, wavelength) -> intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub sample: String,
    pub collection: String,
    pub iteration: usize,
    pub wavelength: f64,
    pub intensity: f64,
}

/// One row of the combined table: (sample, collection, wavelength) -> intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub sample: String,
    pub collection: String,
    pub wavelength: f64,
    pub intensity: f64,
}

/// One row of the metadata table: (sample, collection, iteration) -> header
/// block, plus the laser power injected from the collection's `power.txt`.
#[derive(Debug, Clone)]
pub struct MetadataRow {
    pub sample: String,
    pub collection: String,
    pub iteration: usize,
    pub power_mw: f64,
    pub metadata: AcquisitionMetadata,
}

/// Everything the report consumes for one (sample, collection) pair: the
/// wavelength axis, the combined spectrum, the acquisition settings, and the
/// raw iteration matrix for overlay plotting.
#[derive(Debug, Clone)]
pub struct ExposureRecord {
    pub sample: String,
    pub collection: String,
    pub wavelengths: Array1<f64>,
    pub combined: Array1<f64>,
    /// Raw iteration matrix, rows = iterations.
    pub stack: Array2<f64>,
    pub exposure_secs: f64,
    pub gain: i64,
    pub slit_width_um: f64,
    pub power_mw: f64,
    pub bin_size: f64,
    pub date_and_time: String,
}

/// The in-memory datasets for one phase, built once per analysis run and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PhaseDataset {
    pub layout: PhaseLayout,
    pub raw: Vec<RawRow>,
    pub combined: Vec<CombinedRow>,
    pub metadata: Vec<MetadataRow>,
    pub exposures: Vec<ExposureRecord>,
}

impl PhaseDataset {
    /// Walk the phase directory and build the raw, combined, and metadata
    /// tables. Samples are the outer enumeration and collections the inner
    /// one, matching how the physical measurement passes were structured.
    pub fn build(config: &Config) -> Result<Self, DatasetError> {
        let layout = PhaseLayout::discover(config)?;

        // One power reading per collection, read up front.
        let mut powers: BTreeMap<String, f64> = BTreeMap::new();
        for collection in &layout.collections {
            let power = read_power(&config.power_file(collection))?;
            powers.insert(collection.clone(), power);
        }

        let mut dataset = Self {
            layout: layout.clone(),
            raw: Vec::new(),
            combined: Vec::new(),
            metadata: Vec::new(),
            exposures: Vec::new(),
        };

        for sample in &layout.samples {
            for collection in &layout.collections {
                let dir = config.sample_dir(collection, sample);
                let stack = IterationStack::build(&dir, config.header_cut)?;
                if stack.is_empty() {
                    log::warn!("No iterations found in {dir:?}, skipping");
                    continue;
                }
                let power_mw = powers[collection];
                dataset.ingest_pair(config, sample, collection, &dir, stack, power_mw)?;
            }
        }

        log::info!(
            "Built phase dataset: {} raw rows, {} combined rows, {} metadata rows",
            dataset.raw.len(),
            dataset.combined.len(),
            dataset.metadata.len()
        );
        Ok(dataset)
    }

    fn ingest_pair(
        &mut self,
        config: &Config,
        sample: &str,
        collection: &str,
        dir: &Path,
        stack: IterationStack,
        power_mw: f64,
    ) -> Result<(), DatasetError> {
        let combined = stack.combine(config.combine_method);

        for (iteration, row) in stack.counts.outer_iter().enumerate() {
            for (bin, &intensity) in row.iter().enumerate() {
                self.raw.push(RawRow {
                    sample: sample.to_string(),
                    collection: collection.to_string(),
                    iteration,
                    wavelength: stack.wavelengths[bin],
                    intensity,
                });
            }
        }

        for (bin, &intensity) in combined.iter().enumerate() {
            self.combined.push(CombinedRow {
                sample: sample.to_string(),
                collection: collection.to_string(),
                wavelength: stack.wavelengths[bin],
                intensity,
            });
        }

        // Acquisition settings for the exposure come from the first iteration.
        let mut first: Option<AcquisitionMetadata> = None;
        for iteration in 0..stack.iterations() {
            let path = dir.join(format!("it_{iteration}.txt"));
            let metadata = spectrum::read_acquisition(&path, config.header_cut)?;
            if iteration == 0 {
                first = Some(metadata.clone());
            }
            self.metadata.push(MetadataRow {
                sample: sample.to_string(),
                collection: collection.to_string(),
                iteration,
                power_mw,
                metadata,
            });
        }
        let first = first.unwrap_or_default();
        let bin_size = spectrum::Spectrum {
            wavelengths: stack.wavelengths.clone(),
            counts: combined.clone(),
        }
        .bin_size();
        self.exposures.push(ExposureRecord {
            sample: sample.to_string(),
            collection: collection.to_string(),
            exposure_secs: first.exposure_secs()?,
            gain: first.pre_amp_gain()?,
            slit_width_um: first.slit_width_um()?,
            date_and_time: first.date_and_time()?.to_string(),
            power_mw,
            bin_size,
            wavelengths: stack.wavelengths,
            combined,
            stack: stack.counts,
        });
        Ok(())
    }

    /// The report-facing record for one (sample, collection) pair.
    pub fn exposure(&self, sample: &str, collection: &str) -> Option<&ExposureRecord> {
        self.exposures
            .iter()
            .find(|e| e.sample == sample && e.collection == collection)
    }

    /// Metadata rows of one collection, across all samples, in ingestion order.
    pub fn collection_metadata(&self, collection: &str) -> Vec<&MetadataRow> {
        self.metadata
            .iter()
            .filter(|row| row.collection == collection)
            .collect()
    }
}

/// Read the laser power in mW from a collection's `power.txt`: line 2 holds a
/// comma-separated pair whose second field is the reading.
pub fn read_power(path: &Path) -> Result<f64, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::BadPowerPath(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let line = text
        .lines()
        .nth(1)
        .ok_or_else(|| DatasetError::BadPowerFormat(path.to_path_buf()))?;
    let field = line
        .split(',')
        .nth(1)
        .ok_or_else(|| DatasetError::BadPowerFormat(path.to_path_buf()))?;
    field
        .trim()
        .parse()
        .map_err(|_| DatasetError::BadPowerValue {
            value: field.trim().to_string(),
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEST_CUT: usize = 4;

    fn write_iteration(dir: &Path, index: usize, bins: usize, offset: f64) {
        let path = dir.join(format!("it_{index}.txt"));
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "Date and Time: Tue Aug 12 14:03:22.1234 2025").unwrap();
        writeln!(file, "Exposure Time (secs): 10").unwrap();
        writeln!(file, "Pre-Amplifier Gain: 4x").unwrap();
        writeln!(file, "Input Side Slit Width (um): 100").unwrap();
        for bin in 0..bins {
            writeln!(file, "{} {}", 500.0 + bin as f64, offset + bin as f64).unwrap();
        }
    }

    fn write_tree(root: &Path, collections: usize, samples: &[&str], iterations: usize, bins: usize) {
        for c in 1..=collections {
            let coll = root.join(format!("Coll{c}"));
            std::fs::create_dir_all(&coll).unwrap();
            std::fs::write(coll.join("power.txt"), "reading\nlaser, 1.25\n").unwrap();
            for sample in samples {
                let dir = coll.join(sample);
                std::fs::create_dir_all(&dir).unwrap();
                for it in 0..iterations {
                    write_iteration(&dir, it, bins, (c * 100 + it) as f64);
                }
            }
        }
    }

    fn test_config(root: &Path, samples: &[&str]) -> Config {
        Config {
            phase_path: root.to_path_buf(),
            header_cut: TEST_CUT,
            exposures: samples.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        }
    }

    #[test]
    fn synthetic_tree_produces_expected_table_shapes() {
        // 2 collections x 2 samples x 3 iterations x 5 wavelength bins
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), 2, &["BL", "AM"], 3, 5);
        let config = test_config(dir.path(), &["BL", "AM"]);

        let dataset = PhaseDataset::build(&config).unwrap();
        assert_eq!(dataset.raw.len(), 2 * 2 * 3 * 5);
        assert_eq!(dataset.combined.len(), 2 * 2 * 5);
        assert_eq!(dataset.metadata.len(), 2 * 2 * 3);
        assert_eq!(dataset.exposures.len(), 2 * 2);
    }

    #[test]
    fn power_reading_is_injected_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), 1, &["BL"], 1, 2);
        let config = test_config(dir.path(), &["BL"]);

        let dataset = PhaseDataset::build(&config).unwrap();
        assert!(dataset.metadata.iter().all(|row| row.power_mw == 1.25));
        assert_eq!(dataset.exposure("BL", "Coll1").unwrap().power_mw, 1.25);
    }

    #[test]
    fn samples_are_outer_enumeration_collections_inner() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), 2, &["BL", "AM"], 1, 1);
        let config = test_config(dir.path(), &["BL", "AM"]);

        let dataset = PhaseDataset::build(&config).unwrap();
        let order: Vec<(String, String)> = dataset
            .exposures
            .iter()
            .map(|e| (e.sample.clone(), e.collection.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("BL".into(), "Coll1".into()),
                ("BL".into(), "Coll2".into()),
                ("AM".into(), "Coll1".into()),
                ("AM".into(), "Coll2".into()),
            ]
        );
    }

    #[test]
    fn discovery_finds_material_samples_by_prefix_and_honors_ignore() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), 2, &["BL"], 1, 2);
        let first = dir.path().join("Coll1");
        std::fs::create_dir_all(first.join("LiF-A")).unwrap();
        std::fs::create_dir_all(first.join("LiF-outlier")).unwrap();
        std::fs::create_dir_all(first.join("notes")).unwrap();

        let mut config = test_config(dir.path(), &["BL"]);
        config.ignore.push(String::from("LiF-outlier"));

        let layout = PhaseLayout::discover(&config).unwrap();
        assert_eq!(layout.collections, vec!["Coll1", "Coll2"]);
        assert_eq!(layout.samples, vec!["BL", "LiF-A"]);
        assert_eq!(layout.material_samples(&config), vec!["LiF-A"]);
    }

    #[test]
    fn missing_phase_directory_is_an_error() {
        let config = test_config(Path::new("/no/such/phase"), &["BL"]);
        assert!(matches!(
            PhaseLayout::discover(&config),
            Err(DatasetError::BadPhasePath(_))
        ));
    }

    #[test]
    fn phase_without_collections_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["BL"]);
        assert!(matches!(
            PhaseLayout::discover(&config),
            Err(DatasetError::NoCollections { .. })
        ));
    }

    #[test]
    fn power_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power.txt");
        std::fs::write(&path, "Power reading 2025-08-12\nlaser, 3.72\n").unwrap();
        assert_eq!(read_power(&path).unwrap(), 3.72);

        std::fs::write(&path, "only one line").unwrap();
        assert!(matches!(
            read_power(&path),
            Err(DatasetError::BadPowerFormat(_))
        ));

        std::fs::write(&path, "x\nlaser, not-a-number\n").unwrap();
        assert!(matches!(
            read_power(&path),
            Err(DatasetError::BadPowerValue { .. })
        ));

        assert!(matches!(
            read_power(&dir.path().join("absent.txt")),
            Err(DatasetError::BadPowerPath(_))
        ));
    }
}
