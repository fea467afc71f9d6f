//! CSV export of typed tables.
//!
//! Output is reproducible byte for byte: columns keep their ingestion
//! order, numbers use the shortest representation that parses back to the
//! same `f64`, timestamps use one canonical layout and missing values are
//! empty cells. Re-importing an export and exporting it again yields the
//! same bytes.

use chrono::{NaiveDateTime, NaiveTime, Timelike as _};
use deforest_map_observation_models::{ColumnBinding, Field, Record, Table};

use crate::IngestError;

/// Formats a timestamp as `YYYY-MM-DD` at midnight, otherwise as an ISO
/// 8601 date-time with fractional seconds only when present.
#[must_use]
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }
}

fn format_numeric(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn cell(record: &Record, binding: ColumnBinding) -> String {
    match binding {
        ColumnBinding::Field(Field::Timestamp) => record
            .timestamp
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default(),
        ColumnBinding::Field(Field::VegetationType) => {
            record.vegetation_type.clone().unwrap_or_default()
        }
        ColumnBinding::Field(field) => format_numeric(record.numeric(field)),
        ColumnBinding::Extra(idx) => record
            .extra
            .get(idx)
            .cloned()
            .flatten()
            .unwrap_or_default(),
    }
}

/// Writes `table` as comma-separated text with a header row and `\n` line
/// endings.
///
/// # Errors
///
/// Returns [`IngestError`] if writing to `writer` fails.
pub fn write_csv<W: std::io::Write>(table: &Table, writer: W) -> Result<(), IngestError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    writer.write_record(table.schema.names())?;

    for record in &table.records {
        writer.write_record(
            table
                .schema
                .columns()
                .iter()
                .map(|column| cell(record, column.binding)),
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Serializes `table` to CSV bytes.
///
/// # Errors
///
/// Returns [`IngestError`] if CSV serialization fails.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>, IngestError> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    log::debug!("Exported {} rows ({} bytes)", table.len(), buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::{ColumnMapping, coerce};
    use crate::loader::{LoadOptions, RawTable};

    fn import(bytes: &[u8]) -> Table {
        let raw = RawTable::from_bytes(bytes, "inline", &LoadOptions::new()).unwrap();
        coerce(&raw, &ColumnMapping::default()).unwrap().table
    }

    #[test]
    fn export_roundtrip_is_stable() {
        let source = "Fecha,Superficie_Deforestada,Tipo_Vegetacion,Notas,Altitud\n\
                      2020-01-01,10.50,Selva,\"a, b\",1e3\n\
                      2021-06-30 12:30:00,0.1,Bosque seco,x,-0\n";
        let first = to_csv_bytes(&import(source.as_bytes())).unwrap();
        let second = to_csv_bytes(&import(&first)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            String::from_utf8(first).unwrap(),
            "Fecha,Superficie_Deforestada,Tipo_Vegetacion,Notas,Altitud\n\
             2020-01-01,10.5,Selva,\"a, b\",1000\n\
             2021-06-30T12:30:00,0.1,Bosque seco,x,-0\n"
        );
    }

    #[test]
    fn missing_values_are_empty_cells() {
        let table = import(b"Superficie_Deforestada,Altitud,Tipo_Vegetacion\n1,,\n");
        let out = String::from_utf8(to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(out, "Superficie_Deforestada,Altitud,Tipo_Vegetacion\n1,,\n");
    }

    #[test]
    fn keeps_column_order() {
        let table = import(b"Altitud,Superficie_Deforestada\n5,6\n");
        let out = String::from_utf8(to_csv_bytes(&table).unwrap()).unwrap();
        assert!(out.starts_with("Altitud,Superficie_Deforestada\n5,6"));
    }

    #[test]
    fn formats_fractional_seconds_only_when_present() {
        let ts = NaiveDateTime::parse_from_str("2020-02-03T04:05:06.25", "%Y-%m-%dT%H:%M:%S%.f")
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2020-02-03T04:05:06.250");
    }
}
