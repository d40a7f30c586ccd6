//! Facility-quality factor for bus stops.
//!
//! Amenity presence is resolved from two external tables: per-stop amenity
//! quality scores and a physical inventory that also records the stop type.
//! Stops for which neither table reports any amenity get the amenities
//! implied by their stop type.

use std::collections::HashMap;

use crate::model::{FacilityFlags, Stop, StopId};

/// Amenity categories, in the column naming used by both source tables.
pub const CATEGORIES: [&str; 6] = [
    "shelter",
    "seating",
    "trash can",
    "route info",
    "schedule",
    "sign",
];

/// One row of the physical inventory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryRecord {
    pub stop_type: Option<String>,
    /// Raw values in [`CATEGORIES`] order.
    pub values: [Option<f64>; 6],
}

/// External amenity inputs, keyed by namespaced stop id.
#[derive(Debug, Clone, Default)]
pub struct FacilityTables {
    pub amenity_scores: HashMap<StopId, HashMap<String, f64>>,
    pub inventory: HashMap<StopId, InventoryRecord>,
}

/// Amenities implied by an inventory stop type.
pub fn flags_for_stop_type(stop_type: &str) -> Option<FacilityFlags> {
    let none = FacilityFlags::default();
    let flags = match stop_type {
        "Sign Strapped to Pole"
        | "Sign on Post"
        | "Sign on Moveable on Street"
        | "Sign on Moveable Pedestal" => FacilityFlags { sign: true, ..none },
        "Shelter" => FacilityFlags {
            shelter: true,
            seating: true,
            ..none
        },
        "Bench" | "Simme Seat" => FacilityFlags {
            seating: true,
            ..none
        },
        "Stop at Rail Station" | "Park and Ride" | "Text Painted on Street"
        | "Temporary Bus Stop" => none,
        _ => return None,
    };
    Some(flags)
}

fn flags_from_values(values: [f64; 6]) -> FacilityFlags {
    let present = |i: usize| values[i] > 0.0;
    FacilityFlags {
        shelter: present(0),
        seating: present(1),
        trash_can: present(2),
        route_info: present(3),
        schedule: present(4),
        sign: present(5),
    }
}

impl FacilityTables {
    pub fn is_empty(&self) -> bool {
        self.amenity_scores.is_empty() && self.inventory.is_empty()
    }

    /// Resolves the amenities of one stop. Each category takes the amenity
    /// score when present, else the inventory value, else zero.
    pub fn resolve(&self, stop_id: &str) -> FacilityFlags {
        let scores = self.amenity_scores.get(stop_id);
        let inventory = self.inventory.get(stop_id);

        let mut values = [0.0; 6];
        for (i, category) in CATEGORIES.iter().enumerate() {
            let score = scores
                .and_then(|s| s.get(*category))
                .copied()
                .filter(|v| !v.is_nan());
            let listed = inventory.and_then(|r| r.values[i]).filter(|v| !v.is_nan());
            values[i] = score.or(listed).unwrap_or(0.0);
        }

        if values.iter().all(|v| *v == 0.0) {
            if let Some(backfill) = inventory
                .and_then(|r| r.stop_type.as_deref())
                .and_then(flags_for_stop_type)
            {
                return backfill;
            }
        }

        flags_from_values(values)
    }

    /// Copies of `stops` with their facility flags resolved.
    pub fn apply(&self, stops: &[Stop]) -> Vec<Stop> {
        stops
            .iter()
            .map(|stop| stop.clone().with_facilities(self.resolve(&stop.id)))
            .collect()
    }
}

/// `shelter_index * amenities_index / 2`, within [0.5, 2.0].
pub fn score_q(flags: &FacilityFlags) -> f64 {
    let shelter_index = if flags.shelter { 2.0 } else { 1.0 };
    let amenities_index = match flags.amenities_count() {
        0..=1 => 1.0,
        2..=3 => 1.5,
        _ => 2.0,
    };
    shelter_index * amenities_index / 2.0
}

pub fn compute_factor_q<'a>(bus_stops: impl IntoIterator<Item = &'a Stop>) -> HashMap<StopId, f64> {
    bus_stops
        .into_iter()
        .map(|stop| (stop.id.clone(), score_q(&stop.facilities)))
        .collect()
}
