//! `GeoJSON` rendering of a [`GeoCollection`].

use deforest_map_geography_models::{GeoCollection, GeoRecord};
use deforest_map_observation_models::{ColumnBinding, ColumnKind, Field, Schema};
use deforest_map_table::export::format_timestamp;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, feature::Id};

/// Feature properties written for every record regardless of the schema.
const RESERVED: [&str; 2] = ["row", "cluster"];

fn properties(schema: &Schema, geo: &GeoRecord) -> JsonObject {
    let mut props = JsonObject::new();
    for column in schema.columns() {
        let value = match (column.binding, column.kind) {
            (ColumnBinding::Field(Field::Timestamp), _) => geo
                .record
                .timestamp
                .as_ref()
                .map_or(JsonValue::Null, |ts| JsonValue::from(format_timestamp(ts))),
            (ColumnBinding::Field(_), ColumnKind::Numeric) => geo
                .record
                .numeric_value(column)
                .map_or(JsonValue::Null, JsonValue::from),
            _ => geo
                .record
                .text_value(column)
                .map_or(JsonValue::Null, JsonValue::from),
        };
        props.insert(column.name.clone(), value);
    }

    // Reserved keys win over same-named source columns.
    props.insert("row".to_string(), JsonValue::from(geo.row));
    props.insert(
        "cluster".to_string(),
        geo.cluster.map_or(JsonValue::Null, JsonValue::from),
    );

    props
}

/// Renders every record as a `Point` feature.
///
/// Each feature carries its source row (also used as the feature id), its
/// cluster label (or `null`), and every column value keyed by header name.
/// A column named `row` or `cluster` is shadowed by those two properties.
#[must_use]
pub fn to_feature_collection(collection: &GeoCollection) -> FeatureCollection {
    for column in collection.schema.columns() {
        if RESERVED.contains(&column.name.as_str()) {
            log::warn!(
                "Column '{}' is shadowed by the reserved feature property",
                column.name
            );
        }
    }

    let features = collection
        .records
        .iter()
        .map(|geo| Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::Point(vec![
                geo.longitude(),
                geo.latitude(),
            ]))),
            id: Some(Id::Number(geo.row.into())),
            properties: Some(properties(&collection.schema, geo)),
            foreign_members: None,
        })
        .collect();

    let bbox = collection.bounds().map(|rect| {
        vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y]
    });

    FeatureCollection {
        bbox,
        features,
        foreign_members: None,
    }
}

/// Serializes [`to_feature_collection`] to a `GeoJSON` string.
#[must_use]
pub fn to_geojson_string(collection: &GeoCollection) -> String {
    let text = to_feature_collection(collection).to_string();
    log::debug!(
        "Rendered {} features as GeoJSON ({} bytes)",
        collection.len(),
        text.len()
    );
    text
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use deforest_map_geography_models::SpatialReference;
    use deforest_map_observation_models::{Column, Record};
    use geo::Point;
    use geojson::GeoJson;

    use super::*;

    fn collection() -> GeoCollection {
        let field = |name: &str, field: Field| Column {
            name: name.to_string(),
            kind: field.kind(),
            binding: ColumnBinding::Field(field),
        };
        GeoCollection {
            schema: Schema::new(vec![
                field("Fecha", Field::Timestamp),
                field("Superficie_Deforestada", Field::DeforestedArea),
                field("Tipo_Vegetacion", Field::VegetationType),
                Column {
                    name: "Notas".to_string(),
                    kind: ColumnKind::Categorical,
                    binding: ColumnBinding::Extra(0),
                },
            ]),
            records: vec![
                GeoRecord {
                    row: 3,
                    record: Record {
                        timestamp: NaiveDate::from_ymd_opt(2020, 5, 1)
                            .unwrap()
                            .and_hms_opt(0, 0, 0),
                        deforested_area: Some(1.5),
                        vegetation_type: Some("Selva".to_string()),
                        extra: vec![None],
                        ..Record::default()
                    },
                    point: Point::new(-62.0, -3.0),
                    cluster: Some(2),
                },
                GeoRecord {
                    row: 5,
                    record: Record {
                        extra: vec![Some("x".to_string())],
                        ..Record::default()
                    },
                    point: Point::new(-60.0, -1.0),
                    cluster: None,
                },
            ],
            reference: SpatialReference::Wgs84,
        }
    }

    #[test]
    fn features_carry_properties() {
        let fc = to_feature_collection(&collection());
        assert_eq!(fc.features.len(), 2);

        let first = &fc.features[0];
        assert_eq!(first.property("row"), Some(&JsonValue::from(3)));
        assert_eq!(first.property("cluster"), Some(&JsonValue::from(2)));
        assert_eq!(first.property("Fecha"), Some(&JsonValue::from("2020-05-01")));
        assert_eq!(
            first.property("Superficie_Deforestada"),
            Some(&JsonValue::from(1.5))
        );
        assert_eq!(first.property("Notas"), Some(&JsonValue::Null));

        let second = &fc.features[1];
        assert_eq!(second.property("cluster"), Some(&JsonValue::Null));
        assert_eq!(second.property("Notas"), Some(&JsonValue::from("x")));
    }

    #[test]
    fn reserved_properties_are_not_overwritten_by_columns() {
        let mut c = collection();
        c.schema = Schema::new(vec![
            Column {
                name: "row".to_string(),
                kind: ColumnKind::Categorical,
                binding: ColumnBinding::Extra(0),
            },
            Column {
                name: "cluster".to_string(),
                kind: ColumnKind::Categorical,
                binding: ColumnBinding::Extra(1),
            },
        ]);
        for geo in &mut c.records {
            geo.record.extra = vec![Some("source-row".to_string()), Some("high".to_string())];
        }

        let fc = to_feature_collection(&c);
        assert_eq!(fc.features[0].property("row"), Some(&JsonValue::from(3)));
        assert_eq!(fc.features[0].property("cluster"), Some(&JsonValue::from(2)));
        assert_eq!(fc.features[1].property("row"), Some(&JsonValue::from(5)));
        assert_eq!(fc.features[1].property("cluster"), Some(&JsonValue::Null));
    }

    #[test]
    fn bbox_spans_points() {
        let fc = to_feature_collection(&collection());
        assert_eq!(fc.bbox, Some(vec![-62.0, -3.0, -60.0, -1.0]));
    }

    #[test]
    fn string_output_parses_back() {
        let text = to_geojson_string(&collection());
        let parsed: GeoJson = text.parse().unwrap();
        let GeoJson::FeatureCollection(fc) = parsed else {
            panic!("expected a feature collection");
        };
        assert_eq!(fc.features.len(), 2);
        let geometry = fc.features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.value, geojson::Value::Point(vec![-62.0, -3.0]));
    }

    #[test]
    fn empty_collection_has_no_bbox() {
        let fc = to_feature_collection(&GeoCollection::default());
        assert!(fc.features.is_empty());
        assert_eq!(fc.bbox, None);
    }
}
