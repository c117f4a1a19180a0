//! Boundary loading from `GeoJSON`.
//!
//! Accepts a bare geometry, a single feature, or a feature collection. All
//! polygonal parts are merged into one observation window; points and
//! lines are ignored.

use std::path::Path;

use geo::{MultiPolygon, Polygon};
use geojson::GeoJson;
use lgcp_grid::BoundaryRegion;

use crate::IngestError;

/// Parses a `GeoJSON` document into a [`BoundaryRegion`].
///
/// # Errors
///
/// Returns an error if the document is not valid `GeoJSON` or contains no
/// polygon geometry.
pub fn parse_boundary(geojson_str: &str) -> Result<BoundaryRegion, IngestError> {
    let geojson: GeoJson = geojson_str.parse()?;

    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::Geometry(geom) => vec![geom],
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geom in geometries {
        let geo_geom: geo::Geometry<f64> = geom.try_into()?;
        collect_polygons(geo_geom, &mut polygons);
    }

    if polygons.is_empty() {
        return Err(IngestError::NoPolygons);
    }

    log::debug!("Parsed boundary with {} polygon parts", polygons.len());
    Ok(BoundaryRegion::new(MultiPolygon(polygons)))
}

/// Reads and parses a `GeoJSON` boundary file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or [`parse_boundary`] fails.
pub fn load_boundary(path: &Path) -> Result<BoundaryRegion, IngestError> {
    let contents = std::fs::read_to_string(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let region = parse_boundary(&contents)?;
    log::info!(
        "Loaded boundary from {} ({} parts)",
        path.display(),
        region.part_count()
    );
    Ok(region)
}

fn collect_polygons(geometry: geo::Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        geo::Geometry::Polygon(p) => out.push(p),
        geo::Geometry::MultiPolygon(mp) => out.extend(mp),
        geo::Geometry::Rect(r) => out.push(r.to_polygon()),
        geo::Geometry::Triangle(t) => out.push(t.to_polygon()),
        geo::Geometry::GeometryCollection(gc) => {
            for inner in gc {
                collect_polygons(inner, out);
            }
        }
        other => log::debug!("Ignoring non-polygonal boundary geometry: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use lgcp_grid::Boundary;

    use super::*;

    const SQUARE: &str = r#"{
        "type": "Polygon",
        "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
    }"#;

    #[test]
    fn parses_bare_polygon() {
        let region = parse_boundary(SQUARE).unwrap();
        assert!((region.area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn merges_feature_collection_parts() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"name": "west"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"name": "east"},
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[5, 0], [7, 0], [7, 2], [5, 2], [5, 0]]],
                            [[[8, 0], [9, 0], [9, 1], [8, 1], [8, 0]]]
                        ]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"name": "marker"},
                    "geometry": {"type": "Point", "coordinates": [1, 1]}
                },
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        }"#;
        let region = parse_boundary(doc).unwrap();
        assert_eq!(region.part_count(), 3);
        assert!((region.area() - 9.0).abs() < 1e-9);
        let bounds = region.bounding_rect().unwrap();
        assert!((bounds.max().x - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_documents_without_polygons() {
        let doc = r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 1]}}"#;
        assert!(matches!(parse_boundary(doc), Err(IngestError::NoPolygons)));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            parse_boundary("{not geojson"),
            Err(IngestError::GeoJson(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join("lgcp_grid_ingest_boundary_test.geojson");
        std::fs::write(&path, SQUARE).unwrap();
        let region = load_boundary(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(region.part_count(), 1);

        assert!(matches!(
            load_boundary(Path::new("/nonexistent/boundary.geojson")),
            Err(IngestError::Io { .. })
        ));
    }
}
