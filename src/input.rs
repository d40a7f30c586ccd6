//! Loaders for the files the ETL collaborators leave in the data directory.
//!
//! Every loader returns `Ok(None)` when its file is absent so the pipeline
//! can treat the feature as unavailable, and an error with context when the
//! file exists but cannot be read.

use anyhow::{Context, Result, bail};
use geo::{Coord, LineString};
use geojson::{Feature, GeoJson};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::model::{RoadSegment, RouteMode, ScheduleEvent, WeekdayFlags};
use crate::network::WalkNode;
use crate::significance::facility::{CATEGORIES, FacilityTables, InventoryRecord};

/// Locations of every input file under one data directory.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub schedule: PathBuf,
    pub stops: PathBuf,
    pub walk_nodes: PathBuf,
    pub walk_edges: PathBuf,
    pub roads: PathBuf,
    pub link_points: PathBuf,
    pub amenity_scores: PathBuf,
    pub inventory: PathBuf,
}

impl InputPaths {
    pub fn under(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            schedule: dir.join("schedule.csv"),
            stops: dir.join("stops.csv"),
            walk_nodes: dir.join("walk_nodes.csv"),
            walk_edges: dir.join("walk_edges.csv"),
            roads: dir.join("LINE_EPSG4326.geojson"),
            link_points: dir.join("POINT_EPSG4326.geojson"),
            amenity_scores: dir.join("amenities").join("all_scores.json"),
            inventory: dir.join("amenities").join("Inventory.csv"),
        }
    }
}

/// Parses a GTFS `HH:MM:SS` time into seconds since the start of the
/// service day. Hours past 23 are kept as is.
pub fn parse_gtfs_time(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)
}

fn open_if_present(path: &Path) -> Result<Option<File>> {
    if !path.exists() {
        debug!(path = %path.display(), "Input file absent");
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    Ok(Some(file))
}

fn read_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<Vec<T>>> {
    let Some(file) = open_if_present(path)? else {
        return Ok(None);
    };
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let record: T =
            result.with_context(|| format!("parsing '{}' record {}", path.display(), line + 1))?;
        rows.push(record);
    }

    Ok(Some(rows))
}

/// One merged row of stop_times, trips, routes and calendar.
#[derive(Debug, Deserialize)]
struct ScheduleRow {
    stop_id: String,
    route_id: String,
    service_id: String,
    #[serde(default)]
    direction_id: Option<u8>,
    route_type: u16,
    #[serde(default)]
    arrival_time: Option<String>,
    #[serde(default)]
    departure_time: Option<String>,
    #[serde(default)]
    monday: Option<u8>,
    #[serde(default)]
    tuesday: Option<u8>,
    #[serde(default)]
    wednesday: Option<u8>,
    #[serde(default)]
    thursday: Option<u8>,
    #[serde(default)]
    friday: Option<u8>,
}

impl From<ScheduleRow> for ScheduleEvent {
    fn from(row: ScheduleRow) -> Self {
        let flag = |v: Option<u8>| v.map(|v| v != 0);
        let time = |v: &Option<String>| v.as_deref().and_then(parse_gtfs_time);
        ScheduleEvent {
            arrival: time(&row.arrival_time),
            departure: time(&row.departure_time),
            weekdays: WeekdayFlags([
                flag(row.monday),
                flag(row.tuesday),
                flag(row.wednesday),
                flag(row.thursday),
                flag(row.friday),
            ]),
            stop_id: row.stop_id,
            route_id: row.route_id,
            service_id: row.service_id,
            direction_id: row.direction_id,
            mode: RouteMode::from_gtfs(row.route_type),
        }
    }
}

pub fn load_schedule(path: &Path) -> Result<Option<Vec<ScheduleEvent>>> {
    let rows: Option<Vec<ScheduleRow>> = read_csv(path)?;
    Ok(rows.map(|rows| rows.into_iter().map(ScheduleEvent::from).collect()))
}

#[derive(Debug, Deserialize)]
struct StopRow {
    stop_id: String,
    #[serde(default)]
    stop_lat: Option<f64>,
    #[serde(default)]
    stop_lon: Option<f64>,
}

/// Stop locations as lon/lat coordinates. Rows without coordinates are
/// skipped; the first row of a repeated stop id wins.
pub fn load_stop_locations(path: &Path) -> Result<Option<HashMap<String, Coord>>> {
    let Some(rows) = read_csv::<StopRow>(path)? else {
        return Ok(None);
    };
    let mut locations = HashMap::new();
    for row in rows {
        if let (Some(lat), Some(lon)) = (row.stop_lat, row.stop_lon) {
            locations.entry(row.stop_id).or_insert(Coord { x: lon, y: lat });
        }
    }
    Ok(Some(locations))
}

#[derive(Debug, Deserialize)]
struct NodeRow {
    osmid: i64,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct EdgeRow {
    u: i64,
    v: i64,
    length: f64,
}

/// Walk network nodes in lon/lat and edges with their length in metres.
pub type WalkNetworkParts = (Vec<WalkNode>, Vec<(i64, i64, f64)>);

pub fn load_walk_network(nodes: &Path, edges: &Path) -> Result<Option<WalkNetworkParts>> {
    let Some(node_rows) = read_csv::<NodeRow>(nodes)? else {
        return Ok(None);
    };
    let Some(edge_rows) = read_csv::<EdgeRow>(edges)? else {
        return Ok(None);
    };
    let nodes = node_rows
        .into_iter()
        .map(|n| WalkNode {
            osm_id: n.osmid,
            location: Coord { x: n.x, y: n.y },
        })
        .collect();
    let edges = edge_rows.into_iter().map(|e| (e.u, e.v, e.length)).collect();
    Ok(Some((nodes, edges)))
}

fn read_features(path: &Path) -> Result<Option<Vec<Feature>>> {
    if !path.exists() {
        debug!(path = %path.display(), "Input file absent");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading '{}'", path.display()))?;
    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("parsing GeoJSON '{}'", path.display()))?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(Some(fc.features)),
        GeoJson::Feature(feature) => Ok(Some(vec![feature])),
        GeoJson::Geometry(_) => bail!("'{}' holds a bare geometry, expected features", path.display()),
    }
}

/// String form of a property that may be encoded as a number or a string.
fn property_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn to_coords(positions: &[Vec<f64>]) -> Vec<Coord> {
    positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect()
}

fn line_from_geometry(value: &geojson::Value) -> Option<LineString> {
    match value {
        geojson::Value::LineString(positions) => Some(LineString::new(to_coords(positions))),
        geojson::Value::MultiLineString(lines) => {
            let mut coords: Vec<Coord> = Vec::new();
            for line in lines {
                for c in to_coords(line) {
                    if coords.last() != Some(&c) {
                        coords.push(c);
                    }
                }
            }
            Some(LineString::new(coords))
        }
        _ => None,
    }
}

/// Road segments in lon/lat. Features without a `link_id` or a line
/// geometry are skipped with a warning.
pub fn load_roads(path: &Path) -> Result<Option<Vec<RoadSegment>>> {
    let Some(features) = read_features(path)? else {
        return Ok(None);
    };
    let mut roads = Vec::with_capacity(features.len());
    let mut skipped = 0usize;

    for feature in &features {
        let link_id = property_string(feature, "link_id");
        let line = feature
            .geometry
            .as_ref()
            .and_then(|g| line_from_geometry(&g.value));
        match (link_id, line) {
            (Some(link_id), Some(geometry)) => roads.push(RoadSegment {
                link_id,
                name: property_string(feature, "name"),
                geometry,
            }),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Road features without link_id or line geometry");
    }
    Ok(Some(roads))
}

/// The `link_id` values listed by the study-area point layer.
pub fn load_link_filter(path: &Path) -> Result<Option<HashSet<String>>> {
    let Some(features) = read_features(path)? else {
        return Ok(None);
    };
    Ok(Some(
        features
            .iter()
            .filter_map(|f| property_string(f, "link_id"))
            .collect(),
    ))
}

fn tagged(tag: Option<&str>, id: &str) -> String {
    match tag {
        Some(tag) => format!("{tag}_{id}"),
        None => id.to_string(),
    }
}

fn numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Per-stop amenity scores from `all_scores.json`:
/// `{ "<stop_id>": { "amenity_scores": { "<category>": <score>, ... } } }`.
pub fn load_amenity_scores(
    path: &Path,
    tag: Option<&str>,
) -> Result<Option<HashMap<String, HashMap<String, f64>>>> {
    if !path.exists() {
        debug!(path = %path.display(), "Input file absent");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading '{}'", path.display()))?;
    let entries: HashMap<String, serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("parsing '{}'", path.display()))?;

    let scores = entries
        .into_iter()
        .map(|(stop_id, entry)| {
            let categories = entry
                .get("amenity_scores")
                .and_then(|v| v.as_object())
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(k, v)| numeric(v).map(|n| (k.clone(), n)))
                        .collect()
                })
                .unwrap_or_default();
            (tagged(tag, &stop_id), categories)
        })
        .collect();
    Ok(Some(scores))
}

/// Physical inventory from `Inventory.csv`, keyed by tagged `Stop ID`.
/// Category cells that are not numeric read as absent.
pub fn load_inventory(
    path: &Path,
    tag: Option<&str>,
) -> Result<Option<HashMap<String, InventoryRecord>>> {
    let Some(rows) = read_csv::<HashMap<String, String>>(path)? else {
        return Ok(None);
    };
    let mut inventory = HashMap::new();

    for row in rows {
        let Some(stop_id) = row.get("Stop ID").map(|s| s.trim()).filter(|s| !s.is_empty()) else {
            continue;
        };
        let stop_type = row
            .get("Bus Stop Type")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let mut values = [None; 6];
        for (i, category) in CATEGORIES.iter().enumerate() {
            values[i] = row.get(*category).and_then(|v| v.trim().parse::<f64>().ok());
        }
        inventory
            .entry(tagged(tag, stop_id))
            .or_insert(InventoryRecord { stop_type, values });
    }

    Ok(Some(inventory))
}

/// Both facility tables. Absent files leave their table empty.
pub fn load_facility_tables(paths: &InputPaths, tag: Option<&str>) -> Result<FacilityTables> {
    Ok(FacilityTables {
        amenity_scores: load_amenity_scores(&paths.amenity_scores, tag)?.unwrap_or_default(),
        inventory: load_inventory(&paths.inventory, tag)?.unwrap_or_default(),
    })
}
