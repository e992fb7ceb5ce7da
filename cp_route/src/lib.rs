//! Core checkpoint route optimization library implemented in Rust.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod solver;

mod routecard;
pub use routecard::{
    build_route_card, find_min_speed, LegRecord, MinSpeed, MAX_SPEED_KMH, MIN_SPEED_KMH,
};

/// Reserved name for the event start location.
pub const START_NAME: &str = "Start";
/// Reserved name for the event finish location.
pub const FINISH_NAME: &str = "Finish";

/// Upper bound on intermediate checkpoints; keeps the 2^N * N state tables bounded.
pub const MAX_CHECKPOINTS: usize = 17;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("schedule has no time slots")]
    EmptySlots,
    #[error("slot start times are not strictly ascending")]
    SlotOrder,
    #[error("openings row for {0} has {1} slots, expected {2}")]
    SlotRowMismatch(String, usize, usize),
    #[error("missing openings row for {0}")]
    MissingOpenings(String),
    #[error("duplicate checkpoint name {0}")]
    DuplicateCheckpoint(String),
    #[error("no intermediate checkpoints to route")]
    NoCheckpoints,
    #[error("{0} checkpoints exceed the supported maximum of {MAX_CHECKPOINTS}")]
    TooManyCheckpoints(usize),
    #[error("excluded checkpoint {0} is not in the schedule")]
    UnknownExclusion(String),
    #[error("unknown checkpoint {0} in route")]
    UnknownCheckpoint(String),
    #[error("walking speed must be positive, got {0}")]
    InvalidSpeed(f64),
}

/// Distance and ascent for one ordered leg between two named locations.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LegMetrics {
    pub km: f64,
    pub height_gain_m: f64,
}

/// Ordered-pair distance records. Legs are directional: the ascent going up a
/// hill is not the ascent coming back down.
#[derive(Clone, Debug, Default)]
pub struct DistanceTable {
    legs: BTreeMap<(String, String), LegMetrics>,
}

impl DistanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: &str, to: &str, km: f64, height_gain_m: f64) {
        self.legs.insert(
            (from.to_string(), to.to_string()),
            LegMetrics { km, height_gain_m },
        );
    }

    pub fn get(&self, from: &str, to: &str) -> Option<LegMetrics> {
        self.legs.get(&(from.to_string(), to.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

/// Event schedule: intermediate checkpoints in index order plus the discrete
/// opening-slot tables for them and for the Finish.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    pub names: Vec<String>,
    pub slot_starts: Vec<u32>,
    pub open: Vec<Vec<bool>>,
    pub finish_open: Vec<bool>,
}

impl Schedule {
    /// Build a schedule from the external shape: a full name sequence that
    /// includes the reserved `Start` / `Finish` literals, slot start minutes,
    /// and a name -> 0/1-per-slot openings mapping (`Finish` row required).
    pub fn from_names(
        checkpoint_names: &[String],
        slot_starts: Vec<u32>,
        openings: &BTreeMap<String, Vec<u8>>,
    ) -> Result<Self, RouteError> {
        if slot_starts.is_empty() {
            return Err(RouteError::EmptySlots);
        }
        if slot_starts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RouteError::SlotOrder);
        }

        let names: Vec<String> = checkpoint_names
            .iter()
            .filter(|n| n.as_str() != START_NAME && n.as_str() != FINISH_NAME)
            .cloned()
            .collect();
        let mut seen = BTreeSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(RouteError::DuplicateCheckpoint(name.clone()));
            }
        }
        if names.is_empty() {
            return Err(RouteError::NoCheckpoints);
        }
        if names.len() > MAX_CHECKPOINTS {
            return Err(RouteError::TooManyCheckpoints(names.len()));
        }

        let want = slot_starts.len();
        let row = |name: &str| -> Result<Vec<bool>, RouteError> {
            let bits = openings
                .get(name)
                .ok_or_else(|| RouteError::MissingOpenings(name.to_string()))?;
            if bits.len() != want {
                return Err(RouteError::SlotRowMismatch(
                    name.to_string(),
                    bits.len(),
                    want,
                ));
            }
            Ok(bits.iter().map(|&b| b != 0).collect())
        };

        let open = names.iter().map(|n| row(n)).collect::<Result<Vec<_>, _>>()?;
        let finish_open = row(FINISH_NAME)?;

        Ok(Self {
            names,
            slot_starts,
            open,
            finish_open,
        })
    }
}

/// Solver configuration. Defaults carry the event constants: 7 minute dwell,
/// Naismith 10 m of ascent per extra minute, 10:00 departure, 17:00 cutoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Params {
    pub speed_kmh: f64,
    pub dwell_min: f64,
    /// Metres of ascent that add one minute of travel time.
    pub naismith: f64,
    pub start_minute: f64,
    pub end_minute: f64,
    pub excluded: BTreeSet<String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            speed_kmh: 4.0,
            dwell_min: 7.0,
            naismith: 10.0,
            start_minute: 600.0,
            end_minute: 1020.0,
            excluded: BTreeSet::new(),
        }
    }
}

/// Result of one solve: visited-checkpoint count, route in visit order
/// (intermediate names only), and the arrival minute at Finish. An infeasible
/// instance yields `count = 0` with an empty route rather than an error.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Solution {
    pub count: usize,
    pub route: Vec<String>,
    pub finish_minute: Option<f64>,
}

/// A validated instance over the flat index space: intermediates `0..N`,
/// `N` = Start, `N + 1` = Finish, with the travel-time matrix already built
/// for a concrete walking speed and exclusions removed.
#[derive(Clone, Debug)]
pub struct Instance {
    pub(crate) names: Vec<String>,
    pub(crate) slot_starts: Vec<u32>,
    pub(crate) open: Vec<Vec<bool>>,
    pub(crate) finish_open: Vec<bool>,
    pub(crate) travel: Vec<Vec<f64>>,
    pub(crate) start_minute: f64,
    pub(crate) end_minute: f64,
    pub(crate) dwell_min: f64,
}

impl Instance {
    pub fn build(
        schedule: &Schedule,
        distances: &DistanceTable,
        params: &Params,
    ) -> Result<Self, RouteError> {
        if !(params.speed_kmh > 0.0) {
            return Err(RouteError::InvalidSpeed(params.speed_kmh));
        }
        for name in &params.excluded {
            if !schedule.names.contains(name) {
                return Err(RouteError::UnknownExclusion(name.clone()));
            }
        }

        let mut names = Vec::new();
        let mut open = Vec::new();
        for (i, name) in schedule.names.iter().enumerate() {
            if params.excluded.contains(name) {
                continue;
            }
            names.push(name.clone());
            open.push(schedule.open[i].clone());
        }
        if names.is_empty() {
            return Err(RouteError::NoCheckpoints);
        }

        let all = names.len() + 2;
        let node_names: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .chain([START_NAME, FINISH_NAME])
            .collect();

        let mut travel = vec![vec![f64::INFINITY; all]; all];
        for i in 0..all {
            for j in 0..all {
                if i == j {
                    travel[i][j] = 0.0;
                    continue;
                }
                if let Some(leg) = distances.get(node_names[i], node_names[j]) {
                    travel[i][j] = travel_minutes(leg, params.speed_kmh, params.naismith);
                }
            }
        }

        Ok(Self {
            names,
            slot_starts: schedule.slot_starts.clone(),
            open,
            finish_open: schedule.finish_open.clone(),
            travel,
            start_minute: params.start_minute,
            end_minute: params.end_minute,
            dwell_min: params.dwell_min,
        })
    }

    pub fn checkpoint_count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn start_idx(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn finish_idx(&self) -> usize {
        self.names.len() + 1
    }

    pub(crate) fn node_index(&self, name: &str) -> Option<usize> {
        match name {
            START_NAME => Some(self.start_idx()),
            FINISH_NAME => Some(self.finish_idx()),
            _ => self.names.iter().position(|n| n == name),
        }
    }

    /// Map an arrival minute to its slot index. Slots run on a half-hour grid:
    /// the minute-of-hour must be strictly past 30 to advance to the `:30`
    /// label, so an arrival at exactly `:30` still falls in the hour slot.
    /// Arrivals past the last slot clamp to it; arrivals before the first
    /// slot, or whose label matches no scheduled slot, have no index.
    pub fn slot_index(&self, minute: f64) -> Option<usize> {
        if minute < self.slot_starts[0] as f64 {
            return None;
        }
        let whole = minute.floor() as u32;
        let (h, m) = (whole / 60, whole % 60);
        let slot_time = h * 60 + if m > 30 { 30 } else { 0 };
        if slot_time > self.slot_starts[self.slot_starts.len() - 1] {
            return Some(self.slot_starts.len() - 1);
        }
        self.slot_starts.iter().position(|&s| s == slot_time)
    }

    /// Earliest slot at or after `minute` when checkpoint `cp` is open,
    /// together with the instant one can enter it: `max(minute, slot start)`.
    pub fn next_open_slot(&self, cp: usize, minute: f64) -> Option<(usize, f64)> {
        let first = self.slot_index(minute).unwrap_or(0);
        for s in first..self.slot_starts.len() {
            if self.open[cp][s] {
                return Some((s, minute.max(self.slot_starts[s] as f64)));
            }
        }
        None
    }

    /// As `next_open_slot`, for the Finish. No clamp to the first slot here:
    /// a Finish arrival before the grid opens is not admissible.
    pub(crate) fn next_finish_slot(&self, minute: f64) -> Option<(usize, f64)> {
        let first = self.slot_index(minute)?;
        for s in first..self.slot_starts.len() {
            if self.finish_open[s] {
                return Some((s, minute.max(self.slot_starts[s] as f64)));
            }
        }
        None
    }

    /// Run the bitmask DP and return the best route.
    pub fn solve(&self) -> Solution {
        solver::run(self)
    }
}

/// Flat travel time plus Naismith ascent allowance, in minutes.
pub(crate) fn travel_minutes(leg: LegMetrics, speed_kmh: f64, naismith: f64) -> f64 {
    leg.km / speed_kmh * 60.0 + leg.height_gain_m / naismith
}

/// Render a minute-of-day as `H:MM`.
pub fn format_minute(minute: f64) -> String {
    if !minute.is_finite() {
        return "--".to_string();
    }
    let whole = minute.floor() as u32;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Convenience entry point: validate, build the travel matrix, and solve.
pub fn solve(
    schedule: &Schedule,
    distances: &DistanceTable,
    params: &Params,
) -> Result<Solution, RouteError> {
    Ok(Instance::build(schedule, distances, params)?.solve())
}
