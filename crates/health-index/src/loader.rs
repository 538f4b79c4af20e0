use crate::scoring::{ConfigSnapshot, Gender, Measurement, SnapshotDocument};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "failed to read scoring input: {}", err),
            LoadError::Json(err) => write!(f, "invalid configuration snapshot: {}", err),
            LoadError::Csv(err) => write!(f, "invalid measurement CSV data: {}", err),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(err) => Some(err),
            LoadError::Json(err) => Some(err),
            LoadError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads a snapshot document (`{ revision, parameters, rules }`) as JSON.
pub fn read_snapshot<R: Read>(reader: R) -> Result<ConfigSnapshot, LoadError> {
    let document: SnapshotDocument = serde_json::from_reader(reader)?;
    Ok(ConfigSnapshot::from_document(document))
}

pub fn read_snapshot_path<P: AsRef<Path>>(path: P) -> Result<ConfigSnapshot, LoadError> {
    let file = File::open(path)?;
    read_snapshot(file)
}

#[derive(Debug, Deserialize)]
struct MeasurementRow {
    employee_id: String,
    parameter_id: String,
    value: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    gender: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

impl MeasurementRow {
    fn into_measurement(self) -> Result<Measurement, csv::Error> {
        let gender = match self.gender.as_deref().map(str::trim) {
            None => None,
            Some("male") => Some(Gender::Male),
            Some("female") => Some(Gender::Female),
            Some(other) => {
                return Err(csv::Error::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unsupported gender '{other}' for employee {}", self.employee_id),
                )));
            }
        };

        Ok(Measurement::new(
            self.employee_id.trim(),
            self.parameter_id.trim(),
            self.value,
            gender,
        ))
    }
}

/// Reads `employee_id,parameter_id,value,gender` rows that already passed
/// upstream format validation. An empty gender cell means unknown.
pub fn read_measurements<R: Read>(reader: R) -> Result<Vec<Measurement>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut measurements = Vec::new();
    for row in csv_reader.deserialize::<MeasurementRow>() {
        measurements.push(row?.into_measurement()?);
    }
    Ok(measurements)
}

pub fn read_measurements_path<P: AsRef<Path>>(path: P) -> Result<Vec<Measurement>, LoadError> {
    let file = File::open(path)?;
    read_measurements(file)
}
