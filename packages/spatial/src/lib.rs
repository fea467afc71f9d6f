#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Reference geometry for the map branch.
//!
//! Loads land or country polygons from `GeoJSON`, builds an R-tree over
//! their bounding boxes, and answers point-in-polygon questions. The
//! outline is informational only: it never changes which observations are
//! kept, it only tells the caller how many fall outside every polygon.

use geo::{BoundingRect, Contains, MultiPolygon, Rect};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Errors that can occur while loading an outline.
#[derive(Debug, Error)]
pub enum OutlineError {
    /// The text is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// No polygon or multipolygon geometry was found.
    #[error("Outline contains no polygons")]
    NoPolygons,
}

/// A polygon stored in the R-tree with its label.
struct OutlineEntry {
    name: Option<String>,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for OutlineEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Reference polygons (e.g. a world land outline) with an R-tree index.
pub struct WorldOutline {
    polygons: RTree<OutlineEntry>,
}

impl std::fmt::Debug for WorldOutline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldOutline")
            .field("polygons", &self.polygons.size())
            .finish()
    }
}

/// Property keys tried, in order, to label a feature.
const NAME_KEYS: &[&str] = &["name", "NAME", "ADMIN", "admin"];

impl WorldOutline {
    /// Parses a `GeoJSON` `FeatureCollection`, `Feature` or bare geometry.
    ///
    /// Polygon and multipolygon geometries are kept; anything else is
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// * [`OutlineError::GeoJson`] if the text is not valid `GeoJSON`
    /// * [`OutlineError::NoPolygons`] if nothing usable was found
    pub fn from_geojson(text: &str) -> Result<Self, OutlineError> {
        let geojson: GeoJson = text.parse()?;

        let mut entries = Vec::new();
        match geojson {
            GeoJson::Geometry(geometry) => push_geometry(&mut entries, None, geometry),
            GeoJson::Feature(feature) => push_feature(&mut entries, feature),
            GeoJson::FeatureCollection(collection) => {
                for feature in collection.features {
                    push_feature(&mut entries, feature);
                }
            }
        }

        if entries.is_empty() {
            return Err(OutlineError::NoPolygons);
        }

        log::info!("Loaded {} outline polygons into spatial index", entries.len());

        Ok(Self {
            polygons: RTree::bulk_load(entries),
        })
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn polygon_count(&self) -> usize {
        self.polygons.size()
    }

    /// Bounding box of every polygon.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        if self.polygons.size() == 0 {
            return None;
        }
        let envelope = self.polygons.root().envelope();
        let (lower, upper) = (envelope.lower(), envelope.upper());
        Some(Rect::new((lower[0], lower[1]), (upper[0], upper[1])))
    }

    /// Whether any polygon contains the point.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.find(lon, lat).is_some()
    }

    /// Label of the first polygon containing the point, if it has one.
    #[must_use]
    pub fn region_at(&self, lon: f64, lat: f64) -> Option<&str> {
        self.find(lon, lat)?.name.as_deref()
    }

    fn find(&self, lon: f64, lat: f64) -> Option<&OutlineEntry> {
        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        self.polygons
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.polygon.contains(&point))
    }

    /// Number of `(lon, lat)` points outside every polygon.
    pub fn count_outside<I>(&self, points: I) -> usize
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points
            .into_iter()
            .filter(|&(lon, lat)| !self.contains(lon, lat))
            .count()
    }
}

fn push_feature(entries: &mut Vec<OutlineEntry>, feature: geojson::Feature) {
    let name = NAME_KEYS
        .iter()
        .find_map(|key| feature.property(key).and_then(|v| v.as_str()))
        .map(str::to_string);

    match feature.geometry {
        Some(geometry) => push_geometry(entries, name, geometry),
        None => log::warn!("Skipping outline feature without geometry"),
    }
}

fn push_geometry(entries: &mut Vec<OutlineEntry>, name: Option<String>, geometry: geojson::Geometry) {
    let Some(polygon) = to_multipolygon(geometry) else {
        log::warn!(
            "Skipping non-polygon outline geometry{}",
            name.as_deref().map(|n| format!(" '{n}'")).unwrap_or_default()
        );
        return;
    };

    let envelope = compute_envelope(&polygon);
    entries.push(OutlineEntry {
        name,
        envelope,
        polygon,
    });
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "West" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-10.0, -10.0], [0.0, -10.0], [0.0, 10.0], [-10.0, 10.0], [-10.0, -10.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "ADMIN": "East" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[20.0, 0.0], [30.0, 0.0], [30.0, 5.0], [20.0, 5.0], [20.0, 0.0]]]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Point", "coordinates": [1.0, 1.0] }
            }
        ]
    }"#;

    #[test]
    fn loads_polygons_and_skips_other_geometries() {
        let outline = WorldOutline::from_geojson(TWO_SQUARES).unwrap();
        assert_eq!(outline.polygon_count(), 2);
    }

    #[test]
    fn point_lookups() {
        let outline = WorldOutline::from_geojson(TWO_SQUARES).unwrap();
        assert!(outline.contains(-5.0, 0.0));
        assert_eq!(outline.region_at(-5.0, 0.0), Some("West"));
        assert_eq!(outline.region_at(25.0, 2.0), Some("East"));
        assert!(!outline.contains(10.0, 0.0));
        assert_eq!(
            outline.count_outside([(-5.0, 0.0), (10.0, 0.0), (50.0, 50.0)]),
            2
        );
    }

    #[test]
    fn bounds_cover_every_polygon() {
        let outline = WorldOutline::from_geojson(TWO_SQUARES).unwrap();
        let bounds = outline.bounds().unwrap();
        assert!((bounds.min().x + 10.0).abs() < f64::EPSILON);
        assert!((bounds.max().x - 30.0).abs() < f64::EPSILON);
        assert!((bounds.max().y - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bare_geometry_is_accepted() {
        let outline = WorldOutline::from_geojson(
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#,
        )
        .unwrap();
        assert!(outline.contains(0.5, 0.5));
        assert_eq!(outline.region_at(0.5, 0.5), None);
    }

    #[test]
    fn rejects_outlines_without_polygons() {
        assert!(matches!(
            WorldOutline::from_geojson(r#"{"type":"Point","coordinates":[0,0]}"#),
            Err(OutlineError::NoPolygons)
        ));
        assert!(matches!(
            WorldOutline::from_geojson("not json"),
            Err(OutlineError::GeoJson(_))
        ));
    }
}
