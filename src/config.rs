use anyhow::{Context, Result};
use serde::Deserialize;

/// A half-open `[start, end)` window in seconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PeakWindow {
    pub start: u32,
    pub end: u32,
}

impl PeakWindow {
    pub const fn hours(start: u32, end: u32) -> Self {
        Self {
            start: start * 3600,
            end: end * 3600,
        }
    }

    pub fn contains(&self, seconds: u32) -> bool {
        seconds >= self.start && seconds < self.end
    }
}

/// Tunable constants of the scoring engine.
///
/// Distances are in metres of the local projected frame. Stored as a JSON
/// object on disk; every key is optional:
/// ```json
/// {
///   "wide_radius": 700.0,
///   "near_radius": 100.0,
///   "peak_windows": [{ "start": 21600, "end": 32400 }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Walking budget of the isochrone drawn for every stop.
    pub wide_radius: f64,
    /// Walking budget of the station-access isochrone drawn for rail stops.
    pub near_radius: f64,
    /// Straight-line radius around a bus stop searched for rail stations.
    pub rail_search_radius: f64,
    /// Spacing of sample points along road segments.
    pub sample_spacing: f64,
    /// Buffer around road midpoints that defines the in-scope stops.
    pub study_area_buffer: f64,
    pub peak_windows: Vec<PeakWindow>,
    /// Divisor turning peak arrival counts into hourly rates.
    pub peak_span_hours: f64,
    /// Added to the rail product in place of a facility score.
    pub rail_facility_score: f64,
    pub presentation_cap: f64,
    pub presentation_range: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            wide_radius: 700.0,
            near_radius: 100.0,
            rail_search_radius: 3000.0,
            sample_spacing: 10.0,
            study_area_buffer: 750.0,
            peak_windows: vec![PeakWindow::hours(6, 9), PeakWindow::hours(16, 19)],
            peak_span_hours: 6.0,
            rail_facility_score: 2.5,
            presentation_cap: 22.0,
            presentation_range: 12.6,
        }
    }
}

impl ScoringConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config '{path}'"))?;
        let config: ScoringConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("wide_radius", self.wide_radius),
            ("near_radius", self.near_radius),
            ("rail_search_radius", self.rail_search_radius),
            ("sample_spacing", self.sample_spacing),
            ("peak_span_hours", self.peak_span_hours),
            ("presentation_cap", self.presentation_cap),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                anyhow::bail!("config value '{name}' must be positive, got {value}");
            }
        }
        if let Some(window) = self.peak_windows.iter().find(|w| w.end <= w.start) {
            anyhow::bail!(
                "peak window [{}, {}) is empty",
                window.start,
                window.end
            );
        }
        Ok(())
    }

    pub fn is_peak(&self, seconds: u32) -> bool {
        self.peak_windows.iter().any(|w| w.contains(seconds))
    }
}
