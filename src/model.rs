//! Value records shared by the isochrone engine, the significance model and
//! the street scorer.
//!
//! Every record is keyed by a stable identifier (`stop_id`, `link_id`) so the
//! later stages join through hash maps instead of positional tables.

use chrono::Weekday;
use geo::{Coord, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type StopId = String;
pub type RouteId = String;

/// GTFS `route_type`, folded into the modes this engine distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RouteMode {
    Streetcar,
    Subway,
    LongRail,
    Bus,
    Ferry,
    Tram,
    CableCar,
    Funicular,
    Trolleybus,
    Monorail,
    Other(u16),
}

impl RouteMode {
    pub fn from_gtfs(value: u16) -> Self {
        match value {
            0 => Self::Streetcar,
            1 => Self::Subway,
            2 => Self::LongRail,
            3 => Self::Bus,
            4 => Self::Ferry,
            5 => Self::Tram,
            6 => Self::CableCar,
            7 => Self::Funicular,
            11 => Self::Trolleybus,
            12 => Self::Monorail,
            other => Self::Other(other),
        }
    }

    pub fn gtfs_code(self) -> u16 {
        match self {
            Self::Streetcar => 0,
            Self::Subway => 1,
            Self::LongRail => 2,
            Self::Bus => 3,
            Self::Ferry => 4,
            Self::Tram => 5,
            Self::CableCar => 6,
            Self::Funicular => 7,
            Self::Trolleybus => 11,
            Self::Monorail => 12,
            Self::Other(code) => code,
        }
    }

    pub fn is_bus(self) -> bool {
        self == Self::Bus
    }

    /// Modes scored by the rail significance pipeline (streetcars included).
    pub fn is_rail(self) -> bool {
        matches!(
            self,
            Self::Streetcar | Self::Subway | Self::LongRail | Self::Tram | Self::Monorail
        )
    }

    /// Modes that get a near isochrone and take part in the rail side of
    /// street scoring. Streetcars are excluded.
    pub fn is_station_mode(self) -> bool {
        matches!(
            self,
            Self::Subway | Self::LongRail | Self::Tram | Self::Monorail
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Streetcar => "Streetcar",
            Self::Subway => "Subway",
            Self::LongRail => "Rail_long",
            Self::Bus => "Bus",
            Self::Ferry => "Ferry",
            Self::Tram => "Tram",
            Self::CableCar => "Cable car",
            Self::Funicular => "Funicular",
            Self::Trolleybus => "Trolleybus",
            Self::Monorail => "Monorail",
            Self::Other(_) => "Others",
        }
    }
}

/// Physical amenities present at a stop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityFlags {
    pub shelter: bool,
    pub seating: bool,
    pub trash_can: bool,
    pub route_info: bool,
    pub schedule: bool,
    pub sign: bool,
}

impl FacilityFlags {
    /// Amenities other than the shelter itself.
    pub fn amenities_count(&self) -> usize {
        [
            self.trash_can,
            self.seating,
            self.schedule,
            self.route_info,
            self.sign,
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// A bus or rail stop served by at least one route of a single mode.
///
/// `location` is in the engine's metric frame once the pipeline has
/// projected it.
#[derive(Clone, Debug, PartialEq)]
pub struct Stop {
    pub id: StopId,
    pub mode: RouteMode,
    pub routes: BTreeSet<RouteId>,
    pub location: Point,
    pub facilities: FacilityFlags,
}

impl Stop {
    pub fn new(id: impl Into<StopId>, mode: RouteMode, location: Point) -> Self {
        Self {
            id: id.into(),
            mode,
            routes: BTreeSet::new(),
            location,
            facilities: FacilityFlags::default(),
        }
    }

    pub fn with_routes<I, R>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RouteId>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_facilities(mut self, facilities: FacilityFlags) -> Self {
        self.facilities = facilities;
        self
    }
}

/// Service flags for Monday through Friday. `None` means the calendar had
/// no value for that day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekdayFlags(pub [Option<bool>; 5]);

impl WeekdayFlags {
    pub const WEEKDAYS: [Weekday; 5] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    pub fn all(value: bool) -> Self {
        Self([Some(value); 5])
    }

    /// Weekend days have no flag.
    pub fn get(&self, day: Weekday) -> Option<bool> {
        self.0
            .get(day.num_days_from_monday() as usize)
            .copied()
            .flatten()
    }
}

/// One scheduled visit of a route at a stop.
///
/// Times are seconds since the start of the service day and may exceed
/// 24 hours for trips running past midnight.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleEvent {
    pub stop_id: StopId,
    pub route_id: RouteId,
    pub service_id: String,
    pub direction_id: Option<u8>,
    pub mode: RouteMode,
    pub arrival: Option<u32>,
    pub departure: Option<u32>,
    pub weekdays: WeekdayFlags,
}

/// Walking-reachable area around a stop.
#[derive(Clone, Debug, PartialEq)]
pub struct Isochrone {
    pub stop_id: StopId,
    pub mode: RouteMode,
    pub polygon: Polygon,
}

/// A wide isochrone carrying the significance of the stop it belongs to.
/// `significance` is `None` when the stop had no factor record at all.
#[derive(Clone, Debug, PartialEq)]
pub struct SignificanceArea {
    pub stop_id: StopId,
    pub polygon: Polygon,
    pub significance: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoadSegment {
    pub link_id: String,
    pub name: Option<String>,
    pub geometry: LineString,
}

impl RoadSegment {
    pub fn first_coord(&self) -> Option<Coord> {
        self.geometry.0.first().copied()
    }
}

/// A location sampled along a road segment.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplePoint {
    pub link_id: String,
    pub name: Option<String>,
    pub point: Point,
}

/// Street-level aggregate for one road segment and one isochrone set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SegmentScore {
    pub link_id: String,
    pub name: Option<String>,
    pub points_count: usize,
    pub stops_computecount: usize,
    pub sig_mean_mean: f64,
    #[serde(rename = "Score")]
    pub score: f64,
}
