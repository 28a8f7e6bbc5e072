use std::path::Path;

use serde::Deserialize;

use super::error::SimulationError;

/// Column order of the Geant4 hits ntuple CSV.
pub const HIT_COLUMNS: [&str; 16] = [
    "fEvent", "fEntry", "fPreProc", "fPostProc", "fTrackID", "fParentID", "fPDG", "fKinetic",
    "fEdep", "fX1", "fY1", "fZ1", "fX2", "fY2", "fZ2", "Copy",
];

/// Number of ntuple preamble lines before the data rows.
pub const HIT_PREAMBLE_LINES: usize = 20;

/// PDG code of the photon.
pub const PDG_GAMMA: i64 = 22;
/// PDG code of the neutron.
pub const PDG_NEUTRON: i64 = 2112;

/// One step/hit record from the Geant4 hits ntuple, in `HIT_COLUMNS` order.
#[derive(Debug, Clone, Deserialize)]
pub struct HitRecord {
    pub event: i64,
    pub entry: i64,
    pub pre_process: String,
    pub post_process: String,
    pub track_id: i64,
    pub parent_id: i64,
    pub pdg: i64,
    pub kinetic_mev: f64,
    pub edep_mev: f64,
    pub x1: f64,
    pub y1: f64,
    pub z1: f64,
    pub x2: f64,
    pub y2: f64,
    pub z2: f64,
    pub copy_number: i64,
}

/// One generated primary from the generator CSVs
/// (`generated_neutrons.csv` / `generated_gammas.csv`).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PrimaryRecord {
    #[serde(rename = "E_MeV")]
    pub energy_mev: f64,
    pub dir_x: f64,
    pub dir_y: f64,
    pub dir_z: f64,
}

/// Read the hits ntuple, skipping the fixed-length preamble the Geant4
/// analysis manager writes before the data rows.
pub fn read_hits(path: &Path, preamble: usize) -> Result<Vec<HitRecord>, SimulationError> {
    let text = read_to_string(path)?;
    let body = skip_lines(&text, preamble);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Read a generator CSV (headered).
pub fn read_primaries(path: &Path) -> Result<Vec<PrimaryRecord>, SimulationError> {
    let text = read_to_string(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Read the geometry-parameter CSV as a string table for report rendering.
pub fn read_geo_params(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), SimulationError> {
    let text = read_to_string(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(|f| f.to_string()).collect());
    }
    Ok((headers, rows))
}

/// Unique event numbers present in a hit table, sorted.
pub fn unique_event_numbers(hits: &[HitRecord]) -> Vec<i64> {
    let mut events: Vec<i64> = hits.iter().map(|h| h.event).collect();
    events.sort_unstable();
    events.dedup();
    events
}

/// Total energy deposited by all hits of one particle species.
pub fn total_edep(hits: &[HitRecord], pdg: i64) -> f64 {
    hits.iter()
        .filter(|h| h.pdg == pdg)
        .map(|h| h.edep_mev)
        .sum()
}

/// Percentage of gamma primaries relative to neutron primaries, rounded to
/// two decimals.
pub fn gamma_percentage(neutrons: &[PrimaryRecord], gammas: &[PrimaryRecord]) -> f64 {
    if neutrons.is_empty() {
        return 0.0;
    }
    let ratio = gammas.len() as f64 / neutrons.len() as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

fn read_to_string(path: &Path) -> Result<String, SimulationError> {
    if !path.exists() {
        return Err(SimulationError::BadFilePath(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn skip_lines(text: &str, count: usize) -> String {
    text.lines()
        .skip(count)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit_line(event: i64, pdg: i64, edep: f64) -> String {
        format!("{event},0,none,Transportation,1,0,{pdg},1.0,{edep},0,0,0,1,1,1,3")
    }

    #[test]
    fn hits_are_read_after_the_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output0_nt_Hits.csv");
        let mut text = String::new();
        for i in 0..HIT_PREAMBLE_LINES {
            text.push_str(&format!("#preamble {i}\n"));
        }
        text.push_str(&hit_line(0, PDG_NEUTRON, 0.5));
        text.push('\n');
        text.push_str(&hit_line(0, PDG_GAMMA, 0.25));
        text.push('\n');
        text.push_str(&hit_line(2, PDG_NEUTRON, 1.5));
        text.push('\n');
        std::fs::write(&path, text).unwrap();

        let hits = read_hits(&path, HIT_PREAMBLE_LINES).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[1].post_process, "Transportation");
        assert_eq!(unique_event_numbers(&hits), vec![0, 2]);
        assert_eq!(total_edep(&hits, PDG_NEUTRON), 2.0);
        assert_eq!(total_edep(&hits, PDG_GAMMA), 0.25);
    }

    #[test]
    fn primaries_are_read_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated_neutrons.csv");
        std::fs::write(&path, "E_MeV,dir_x,dir_y,dir_z\n4.5,0.1,0.2,0.3\n2.25,-0.1,0.0,1.0\n")
            .unwrap();
        let primaries = read_primaries(&path).unwrap();
        assert_eq!(primaries.len(), 2);
        assert_eq!(primaries[0].energy_mev, 4.5);
        assert_eq!(primaries[1].dir_z, 1.0);
    }

    #[test]
    fn gamma_percentage_is_rounded() {
        let neutron = PrimaryRecord {
            energy_mev: 1.0,
            dir_x: 0.0,
            dir_y: 0.0,
            dir_z: 1.0,
        };
        let neutrons = vec![neutron; 3];
        let gammas = vec![neutron; 1];
        assert_eq!(gamma_percentage(&neutrons, &gammas), 33.33);
        assert_eq!(gamma_percentage(&[], &gammas), 0.0);
    }

    #[test]
    fn geo_params_become_a_string_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo_params.csv");
        std::fs::write(&path, "name,value,unit\ncube_size,10,mm\nshield,5,cm\n").unwrap();
        let (headers, rows) = read_geo_params(&path).unwrap();
        assert_eq!(headers, vec!["name", "value", "unit"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["shield", "5", "cm"]);
    }

    #[test]
    fn missing_simulation_file_is_an_error() {
        assert!(matches!(
            read_hits(Path::new("/no/hits.csv"), HIT_PREAMBLE_LINES),
            Err(SimulationError::BadFilePath(_))
        ));
    }
}
