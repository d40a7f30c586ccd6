use approx::assert_relative_eq;
use geo::{Coord, Point};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use transit_access_rater::config::ScoringConfig;
use transit_access_rater::error::ScoringError;
use transit_access_rater::input::InputPaths;
use transit_access_rater::model::{RoadSegment, RouteMode, ScheduleEvent, Stop, WeekdayFlags};
use transit_access_rater::network::{WalkGraph, WalkNode, compute_isochrones};
use transit_access_rater::output::write_scores_csv;
use transit_access_rater::pipeline::{PipelineInputs, run_pipeline};

const ORIGIN: Coord = Coord { x: -71.0, y: 42.0 };
const H: u32 = 3600;

/// Degrees of longitude and latitude spanning 100 m at the origin.
fn step() -> (f64, f64) {
    let dy = 100.0 / 111_320.0;
    let dx = dy / ORIGIN.y.to_radians().cos();
    (dx, dy)
}

fn lon_lat(i: i64, j: i64) -> Coord {
    lon_lat_at(i as f64, j as f64)
}

fn lon_lat_at(x: f64, y: f64) -> Coord {
    let (dx, dy) = step();
    Coord {
        x: ORIGIN.x + x * dx,
        y: ORIGIN.y + y * dy,
    }
}

/// Main street end, 405 m east of the origin.
fn main_street_end() -> Coord {
    lon_lat_at(4.05, 0.0)
}

/// 100 m street grid spanning x in [-100, 500] and y in [-200, 200] metres.
fn walk_grid() -> (Vec<WalkNode>, Vec<(i64, i64, f64)>) {
    let id = |i: i64, j: i64| (i + 10) * 100 + (j + 10);
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for i in -1..=5 {
        for j in -2..=2 {
            nodes.push(WalkNode {
                osm_id: id(i, j),
                location: lon_lat(i, j),
            });
            if i < 5 {
                edges.push((id(i, j), id(i + 1, j), 100.0));
            }
            if j < 2 {
                edges.push((id(i, j), id(i, j + 1), 100.0));
            }
        }
    }
    (nodes, edges)
}

fn event(stop: &str, route: &str, arrival: u32) -> ScheduleEvent {
    ScheduleEvent {
        stop_id: stop.into(),
        route_id: route.into(),
        service_id: "weekday".into(),
        direction_id: None,
        mode: RouteMode::Bus,
        arrival: Some(arrival),
        departure: Some(arrival),
        weekdays: WeekdayFlags::all(true),
    }
}

/// One bus stop at the centre of the grid served by routes A, B and C with
/// five peak arrivals an hour on A, a remote stop far outside the study
/// area, the scored main street and a street beyond walking range.
fn bus_city() -> PipelineInputs {
    let mut schedule: Vec<ScheduleEvent> = (0..30).map(|i| event("center", "A", 7 * H + i * 60)).collect();
    schedule.push(event("center", "B", 12 * H));
    schedule.push(event("center", "C", 12 * H));
    schedule.push(event("remote", "Z", 7 * H));

    let (walk_nodes, walk_edges) = walk_grid();
    let main = RoadSegment {
        link_id: "main".into(),
        name: Some("Main St".into()),
        geometry: vec![lon_lat(0, 0), main_street_end()].into(),
    };
    let far = RoadSegment {
        link_id: "far".into(),
        name: Some("Far Rd".into()),
        geometry: vec![lon_lat(40, 0), lon_lat(41, 0)].into(),
    };
    let duplicate = RoadSegment {
        name: Some("Duplicate".into()),
        ..main.clone()
    };

    PipelineInputs {
        schedule,
        stop_locations: HashMap::from([
            ("center".to_string(), lon_lat(2, 0)),
            ("remote".to_string(), lon_lat(200, 0)),
        ]),
        walk_nodes,
        walk_edges,
        roads: vec![main, far, duplicate],
        link_filter: None,
        facilities: Default::default(),
    }
}

#[test]
fn test_full_pipeline_bus_city() {
    let output = run_pipeline(&bus_city(), &ScoringConfig::default()).unwrap();

    assert_eq!(output.summary.stops, 2);
    assert_eq!(output.summary.stops_in_scope, 1);
    assert_eq!(output.isochrones.wide_bus.len(), 1);
    assert!(output.isochrones.wide_rail.is_empty());
    assert!(output.isochrones.near_rail.is_empty());

    let factors = &output.bus_factors[0];
    assert_eq!(factors.factor_e, 2.0);
    assert_eq!(factors.factor_s, 1.0);
    assert_eq!(factors.factor_f, 1.75);
    assert_eq!(factors.factor_q, 0.5);
    assert_relative_eq!(factors.significance, 4.0);

    assert_eq!(output.rows.len(), 2);
    let main = &output.rows[0];
    assert_eq!(main.link_id, "main");
    assert_eq!(main.name.as_deref(), Some("Main St"));
    // Samples every 10 m from 0 to 400 plus the endpoint at 405.
    assert_eq!(main.points_count, 42);
    assert_eq!(main.stops_computecount, 42);
    assert_relative_eq!(main.sig_mean_mean, 4.0);
    assert_relative_eq!(main.score, 4.0 * 2f64.ln(), epsilon = 1e-9);
    assert_eq!(main.score_rail, 0.0);

    let far = &output.rows[1];
    assert!(far.points_count > 0);
    assert_eq!(far.stops_computecount, 0);
    assert_eq!(far.score, 0.0);
}

#[test]
fn test_city_without_stops_fails_scoring() {
    let inputs = PipelineInputs {
        schedule: Vec::new(),
        ..bus_city()
    };
    let err = run_pipeline(&inputs, &ScoringConfig::default()).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<ScoringError>(),
        Some(ScoringError::EmptyInput)
    ));
}

#[test]
fn test_unreachable_stop_is_skipped() {
    // A lone node with no edges reaches only itself.
    let nodes = vec![
        WalkNode { osm_id: 1, location: Coord { x: 0.0, y: 0.0 } },
        WalkNode { osm_id: 2, location: Coord { x: 100.0, y: 0.0 } },
        WalkNode { osm_id: 3, location: Coord { x: 0.0, y: 100.0 } },
        WalkNode { osm_id: 4, location: Coord { x: 5000.0, y: 5000.0 } },
    ];
    let edges = vec![(1, 2, 100.0), (1, 3, 100.0), (2, 3, 141.0)];
    let graph = WalkGraph::from_parts(nodes, edges).unwrap();
    let stops = vec![
        Stop::new("good", RouteMode::Bus, Point::new(1.0, 1.0)),
        Stop::new("island", RouteMode::Bus, Point::new(5000.0, 5001.0)),
        Stop::new("broken", RouteMode::Bus, Point::new(f64::NAN, 0.0)),
    ];

    let sets = compute_isochrones(&stops, &graph, &ScoringConfig::default());
    let ids: Vec<&str> = sets.wide_bus.iter().map(|i| i.stop_id.as_str()).collect();
    assert_eq!(ids, vec!["good"]);
}

#[test]
fn test_pipeline_from_files() {
    let dir = std::env::temp_dir().join("transit_access_rater_it_files");
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("amenities")).unwrap();
    let city = bus_city();

    let mut schedule = String::from(
        "stop_id,route_id,service_id,direction_id,route_type,arrival_time,departure_time,monday,tuesday,wednesday,thursday,friday\n",
    );
    for e in &city.schedule {
        let arrival = e.arrival.unwrap();
        let time = format!("{:02}:{:02}:{:02}", arrival / 3600, arrival % 3600 / 60, arrival % 60);
        writeln!(schedule, "{},{},{},,3,{time},{time},1,1,1,1,1", e.stop_id, e.route_id, e.service_id).unwrap();
    }
    fs::write(dir.join("schedule.csv"), schedule).unwrap();

    let mut stops = String::from("stop_id,stop_lat,stop_lon\n");
    for (id, c) in &city.stop_locations {
        writeln!(stops, "{id},{},{}", c.y, c.x).unwrap();
    }
    fs::write(dir.join("stops.csv"), stops).unwrap();

    let mut nodes = String::from("osmid,x,y\n");
    for n in &city.walk_nodes {
        writeln!(nodes, "{},{},{}", n.osm_id, n.location.x, n.location.y).unwrap();
    }
    fs::write(dir.join("walk_nodes.csv"), nodes).unwrap();

    let mut edges = String::from("u,v,length\n");
    for (u, v, length) in &city.walk_edges {
        writeln!(edges, "{u},{v},{length}").unwrap();
    }
    fs::write(dir.join("walk_edges.csv"), edges).unwrap();

    let (a, b) = (lon_lat(0, 0), main_street_end());
    let roads = format!(
        r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{"link_id":7,"name":"Main St"}},"geometry":{{"type":"LineString","coordinates":[[{},{}],[{},{}]]}}}}]}}"#,
        a.x, a.y, b.x, b.y
    );
    fs::write(dir.join("LINE_EPSG4326.geojson"), roads).unwrap();
    fs::write(
        dir.join("amenities").join("Inventory.csv"),
        "Stop ID,Bus Stop Type,shelter,seating,trash can,route info,schedule,sign\ncenter,Shelter,,,,,,\n",
    )
    .unwrap();

    let inputs = PipelineInputs::load(&InputPaths::under(&dir), None).unwrap();
    let output = run_pipeline(&inputs, &ScoringConfig::default()).unwrap();

    // The inventory backfills shelter and seating: q = 2.0 * 1.0 / 2.
    assert_eq!(output.bus_factors[0].factor_q, 1.0);
    assert_relative_eq!(output.bus_factors[0].significance, 4.5);
    assert_eq!(output.rows.len(), 1);
    assert_eq!(output.rows[0].link_id, "7");
    assert!(output.rows[0].score > 0.0);

    let csv_path = dir.join("output").join("bus_rail_score.csv");
    write_scores_csv(&csv_path, &output.rows).unwrap();
    assert_eq!(fs::read_to_string(&csv_path).unwrap().lines().count(), 2);

    fs::remove_dir_all(&dir).unwrap();
}
