//! Conversion of table rows into WGS 84 point records.

use deforest_map_geography_models::{GeoCollection, GeoRecord, SpatialReference};
use deforest_map_observation_models::{DataWarning, Field, Table};
use geo::Point;

use crate::GeoError;

/// Result of [`project`].
#[derive(Debug, Clone, PartialEq)]
pub struct Projected {
    /// Rows that had valid coordinates.
    pub collection: GeoCollection,
    /// One [`DataWarning::DroppedRow`] per discarded row.
    pub warnings: Vec<DataWarning>,
}

fn check(lat: Option<f64>, lon: Option<f64>) -> Result<(f64, f64), String> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) {
                Err(format!("latitude {lat} outside [-90, 90]"))
            } else if !(-180.0..=180.0).contains(&lon) {
                Err(format!("longitude {lon} outside [-180, 180]"))
            } else {
                Ok((lat, lon))
            }
        }
        (None, Some(_)) => Err("missing latitude".to_string()),
        (Some(_), None) => Err("missing longitude".to_string()),
        (None, None) => Err("missing latitude and longitude".to_string()),
    }
}

/// Attaches a point to every row with valid coordinates.
///
/// Rows with a missing or out-of-range coordinate are dropped and reported.
/// Coordinates are taken as WGS 84 and never reprojected.
///
/// # Errors
///
/// * [`GeoError::MissingCoordinateColumns`] if the schema has no latitude
///   or no longitude column
pub fn project(table: &Table) -> Result<Projected, GeoError> {
    let missing: Vec<Field> = [Field::Latitude, Field::Longitude]
        .into_iter()
        .filter(|f| !table.schema.has_field(*f))
        .collect();
    if !missing.is_empty() {
        return Err(GeoError::MissingCoordinateColumns { missing });
    }

    let mut records = Vec::with_capacity(table.len());
    let mut warnings = Vec::new();

    for (row, record) in table.records.iter().enumerate() {
        match check(record.latitude, record.longitude) {
            Ok((lat, lon)) => records.push(GeoRecord {
                row,
                record: record.clone(),
                point: Point::new(lon, lat),
                cluster: None,
            }),
            Err(reason) => {
                log::debug!("Dropping row {row}: {reason}");
                warnings.push(DataWarning::DroppedRow { row, reason });
            }
        }
    }

    log::info!(
        "Projected {} of {} rows ({} dropped)",
        records.len(),
        table.len(),
        warnings.len()
    );

    Ok(Projected {
        collection: GeoCollection {
            schema: table.schema.clone(),
            records,
            reference: SpatialReference::Wgs84,
        },
        warnings,
    })
}
