//! Output formatting and persistence for street scores and isochrones.
//!
//! Supports a JSON run summary, the score table as CSV and both score and
//! isochrone layers as GeoJSON in lon/lat.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use geo::{LineString, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::geometry::LocalProjection;
use crate::model::{Isochrone, RoadSegment};
use crate::network::IsochroneSets;
use crate::scoring::StreetScoreRow;

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Writes the score table as CSV, replacing any previous file.
pub fn write_scores_csv(path: &Path, rows: &[StreetScoreRow]) -> Result<()> {
    ensure_parent(path)?;
    debug!(path = %path.display(), rows = rows.len(), "Writing score CSV");

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating '{}'", path.display()))?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Score CSV written");
    Ok(())
}

fn line_to_geojson(line: &LineString) -> Value {
    Value::LineString(line.0.iter().map(|c| vec![c.x, c.y]).collect())
}

fn polygon_to_geojson(polygon: &Polygon) -> Value {
    let mut rings = vec![polygon.exterior().0.iter().map(|c| vec![c.x, c.y]).collect::<Vec<_>>()];
    for interior in polygon.interiors() {
        rings.push(interior.0.iter().map(|c| vec![c.x, c.y]).collect());
    }
    Value::Polygon(rings)
}

fn feature(geometry: Value, properties: serde_json::Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: properties.as_object().cloned(),
        foreign_members: None,
    }
}

fn write_features(path: &Path, features: Vec<Feature>) -> Result<()> {
    ensure_parent(path)?;
    let count = features.len();
    let geojson = GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });
    let json = serde_json::to_string(&geojson).context("serializing GeoJSON")?;
    fs::write(path, json).with_context(|| format!("writing GeoJSON to '{}'", path.display()))?;
    info!(path = %path.display(), features = count, "GeoJSON written");
    Ok(())
}

/// Writes one LineString feature per score row. `roads` are in the metric
/// frame of `projection` and are converted back to lon/lat.
pub fn write_scores_geojson(
    path: &Path,
    rows: &[StreetScoreRow],
    roads: &[RoadSegment],
    projection: &LocalProjection,
) -> Result<()> {
    let geometry_by_link: HashMap<&str, &LineString> = roads
        .iter()
        .map(|r| (r.link_id.as_str(), &r.geometry))
        .collect();

    let mut features = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(line) = geometry_by_link.get(row.link_id.as_str()) else {
            continue;
        };
        let properties = serde_json::to_value(row).context("serializing score row")?;
        features.push(feature(
            line_to_geojson(&projection.unproject_line(line)),
            properties,
        ));
    }
    write_features(path, features)
}

fn isochrone_features(
    isochrones: &[Isochrone],
    category: &str,
    projection: &LocalProjection,
) -> Vec<Feature> {
    isochrones
        .iter()
        .map(|iso| {
            feature(
                polygon_to_geojson(&projection.unproject_polygon(&iso.polygon)),
                serde_json::json!({
                    "stop_id": iso.stop_id,
                    "route_type": iso.mode.gtfs_code(),
                    "station_type": iso.mode.label(),
                    "category": category,
                }),
            )
        })
        .collect()
}

/// Writes every isochrone polygon in lon/lat, tagged with its category
/// (`wide_bus`, `wide_rail` or `near_rail`).
pub fn write_isochrones_geojson(
    path: &Path,
    sets: &IsochroneSets,
    projection: &LocalProjection,
) -> Result<()> {
    let mut features = isochrone_features(&sets.wide_bus, "wide_bus", projection);
    features.extend(isochrone_features(&sets.wide_rail, "wide_rail", projection));
    features.extend(isochrone_features(&sets.near_rail, "near_rail", projection));
    write_features(path, features)
}
