use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::models::Coordinate;

const BUILTIN_PINCODES: &[(&str, f64, f64)] = &[
    ("560016", 13.0366, 77.6402), // Bangalore, KR Puram
    ("560001", 12.9716, 77.5946), // Bangalore, central
    ("560079", 12.9020, 77.5736), // Bangalore, HSR Layout
    ("110001", 28.6448, 77.2167), // New Delhi
    ("400001", 18.9388, 72.8355), // Mumbai
    ("700001", 22.5726, 88.3639), // Kolkata
    ("600001", 13.0827, 80.2707), // Chennai
];

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("failed to read gazetteer file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid gazetteer JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("coordinate for pincode {pincode} is out of range ({latitude}, {longitude})")]
    InvalidCoordinate {
        pincode: String,
        latitude: f64,
        longitude: f64,
    },
}

/// Read-only pincode to coordinate table.
///
/// Lookups are exact string matches. The table is built once and shared
/// behind an `Arc`; nothing mutates it after construction.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: HashMap<String, Coordinate>,
}

impl Gazetteer {
    pub fn new(entries: HashMap<String, Coordinate>) -> Result<Self, GazetteerError> {
        for (pincode, coordinate) in &entries {
            ensure_valid(pincode, coordinate)?;
        }
        Ok(Self { entries })
    }

    pub fn builtin() -> Self {
        let entries = BUILTIN_PINCODES
            .iter()
            .map(|(pincode, lat, lon)| (pincode.to_string(), Coordinate::new(*lat, *lon)))
            .collect();
        Self { entries }
    }

    /// Parses `{"<pincode>": {"latitude": .., "longitude": ..}}`.
    pub fn from_json_str(raw: &str) -> Result<Self, GazetteerError> {
        let entries: HashMap<String, Coordinate> = serde_json::from_str(raw)?;
        Self::new(entries)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GazetteerError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| GazetteerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Returns a table where `overrides` replace or add to `self`.
    pub fn extended_with(mut self, overrides: Gazetteer) -> Self {
        self.entries.extend(overrides.entries);
        self
    }

    pub fn lookup(&self, pincode: &str) -> Option<Coordinate> {
        self.entries.get(pincode).copied()
    }

    pub fn contains(&self, pincode: &str) -> bool {
        self.entries.contains_key(pincode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by pincode.
    pub fn entries(&self) -> BTreeMap<&str, Coordinate> {
        self.entries
            .iter()
            .map(|(pincode, coordinate)| (pincode.as_str(), *coordinate))
            .collect()
    }
}

// Out-of-range coordinates are dropped.
impl FromIterator<(String, Coordinate)> for Gazetteer {
    fn from_iter<T: IntoIterator<Item = (String, Coordinate)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .filter(|(_, coordinate)| coordinate.is_valid())
                .collect(),
        }
    }
}

fn ensure_valid(pincode: &str, coordinate: &Coordinate) -> Result<(), GazetteerError> {
    if coordinate.is_valid() {
        Ok(())
    } else {
        Err(GazetteerError::InvalidCoordinate {
            pincode: pincode.to_string(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
        })
    }
}
