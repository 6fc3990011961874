//! Station catalog reading and selection
//!
//! The catalog is the provider's stations file: a CSV with a header row and the
//! columns `station_id, lat, lon, source, reports, country` in that order.
//! Columns are read by position so header naming differences do not matter.
//!
//! Stations reporting at coordinates (0.0, 0.0) carry no usable location and
//! stations with an unknown report class cannot be requested; both are dropped
//! and counted as problematic rather than failing the whole catalog. A row that
//! cannot be parsed at all is a precondition error.

use crate::ReportType;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Minimum number of columns a catalog row must carry
const CATALOG_COLUMNS: usize = 6;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Catalog file could not be opened or read
    #[error("IO error: {0}")]
    IoError(String),

    /// A row could not be parsed into a station
    #[error("malformed catalog row {row}: {message}")]
    MalformedRow {
        /// 1-based data row number (header excluded)
        row: usize,
        /// What was wrong with it
        message: String,
    },
}

/// One weather station from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Provider station identifier (e.g., "725030-14732")
    pub station_id: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Upstream data source label
    pub source: String,
    /// Report frequency class
    pub report_type: ReportType,
    /// Country code
    pub country: String,
}

impl CatalogEntry {
    /// Create an entry carrying only the fields the download engine consumes
    pub fn new(station_id: impl Into<String>, report_type: ReportType) -> Self {
        Self {
            station_id: station_id.into(),
            latitude: 0.0,
            longitude: 0.0,
            source: String::new(),
            report_type,
            country: String::new(),
        }
    }
}

/// Parsed station catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    problematic: usize,
}

impl Catalog {
    /// Read a catalog from a CSV file
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|e| {
            CatalogError::IoError(format!("Failed to open catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_reader(file)?;

        info!(
            path = %path.display(),
            stations = catalog.entries.len(),
            problematic = catalog.problematic,
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Read a catalog from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut catalog = Catalog::default();

        for (index, record) in csv_reader.records().enumerate() {
            let row = index + 1;
            let record = record.map_err(|e| CatalogError::MalformedRow {
                row,
                message: e.to_string(),
            })?;

            match parse_row(row, &record)? {
                Some(entry) => catalog.entries.push(entry),
                None => catalog.problematic += 1,
            }
        }

        if catalog.problematic > 0 {
            warn!(
                problematic = catalog.problematic,
                "Problematic stations eliminated from catalog"
            );
        }

        Ok(catalog)
    }

    /// Usable stations in catalog order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of usable stations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no usable stations
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rows dropped for missing location or unknown report class
    pub fn problematic(&self) -> usize {
        self.problematic
    }

    /// Number of usable stations reporting with the given frequency
    pub fn count_of(&self, report_type: ReportType) -> usize {
        self.entries
            .iter()
            .filter(|e| e.report_type == report_type)
            .count()
    }

    /// Select the stations to download.
    ///
    /// Stations are grouped subhourly, hourly, daily regardless of the order
    /// of `report_types`, and keep catalog order inside each group. Task
    /// generation relies on this order being stable across runs.
    pub fn select(&self, report_types: &[ReportType]) -> Vec<CatalogEntry> {
        let selected: Vec<CatalogEntry> = ReportType::ALL
            .iter()
            .filter(|rt| report_types.contains(*rt))
            .flat_map(|rt| self.entries.iter().filter(move |e| e.report_type == *rt))
            .cloned()
            .collect();

        debug!(
            requested = ?report_types,
            selected = selected.len(),
            "Selected catalog stations"
        );
        selected
    }
}

fn parse_row(row: usize, record: &csv::StringRecord) -> Result<Option<CatalogEntry>, CatalogError> {
    if record.len() < CATALOG_COLUMNS {
        return Err(CatalogError::MalformedRow {
            row,
            message: format!(
                "expected {CATALOG_COLUMNS} columns, found {}",
                record.len()
            ),
        });
    }

    let field = |i: usize| record.get(i).unwrap_or_default();

    let station_id = field(0);
    if station_id.is_empty() {
        return Err(CatalogError::MalformedRow {
            row,
            message: "station id is empty".to_string(),
        });
    }

    let parse_coord = |i: usize, name: &str| {
        f64::from_str(field(i)).map_err(|e| CatalogError::MalformedRow {
            row,
            message: format!("invalid {name} '{}': {e}", field(i)),
        })
    };
    let latitude = parse_coord(1, "latitude")?;
    let longitude = parse_coord(2, "longitude")?;

    if latitude == 0.0 && longitude == 0.0 {
        debug!(row, station_id, "Skipping station without location");
        return Ok(None);
    }

    let report_type = match ReportType::from_str(field(4)) {
        Ok(rt) => rt,
        Err(_) => {
            debug!(row, station_id, reports = field(4), "Skipping station with unknown report class");
            return Ok(None);
        }
    };

    Ok(Some(CatalogEntry {
        station_id: station_id.to_string(),
        latitude,
        longitude,
        source: field(3).to_string(),
        report_type,
        country: field(5).to_string(),
    }))
}
