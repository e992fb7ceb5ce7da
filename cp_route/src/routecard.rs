//! Route-card replay and minimum-speed search.
//!
//! The replay re-derives per-leg timings from the route alone, using the same
//! slot clock as the solver, so a solved route always replays to the solver's
//! stored departure and finish times.

use serde::Serialize;

use crate::{
    format_minute, DistanceTable, Instance, Params, RouteError, Schedule, Solution, FINISH_NAME,
    START_NAME,
};

/// Lower bound of the speed search, km/h.
pub const MIN_SPEED_KMH: f64 = 3.0;
/// Upper bound of the speed search, km/h.
pub const MAX_SPEED_KMH: f64 = 20.0;
const SPEED_TOLERANCE_KMH: f64 = 0.01;

/// One leg of the printable route card.
#[derive(Clone, Debug, Serialize)]
pub struct LegRecord {
    pub leg: usize,
    pub from: String,
    pub to: String,
    pub distance_km: f64,
    pub height_gain_m: f64,
    pub travel_min: f64,
    pub arrival: String,
    pub depart: String,
    pub time_slot: String,
    pub is_open: bool,
    pub wait_min: f64,
    pub cumulative_min: f64,
}

/// Replay a solved route second-by-second into per-leg records.
///
/// Legs into a closed checkpoint with no later opening are emitted with
/// `is_open = false` and zero wait; that cannot arise from a solved route and
/// exists for diagnostics only.
pub fn build_route_card(
    instance: &Instance,
    distances: &DistanceTable,
    solution: &Solution,
) -> Result<Vec<LegRecord>, RouteError> {
    let stops: Vec<&str> = solution
        .route
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(FINISH_NAME))
        .collect();

    let mut card = Vec::with_capacity(stops.len());
    let mut from_name = START_NAME;
    let mut from_idx = instance.start_idx();
    let mut clock = instance.start_minute;

    for (leg, &to_name) in stops.iter().enumerate() {
        let to_idx = instance
            .node_index(to_name)
            .ok_or_else(|| RouteError::UnknownCheckpoint(to_name.to_string()))?;
        let metrics = distances.get(from_name, to_name).unwrap_or_default();
        let travel = instance.travel[from_idx][to_idx];
        let arrival = clock + travel;

        let is_finish = to_idx == instance.finish_idx();
        let resolved = if is_finish {
            instance.next_finish_slot(arrival)
        } else {
            instance.next_open_slot(to_idx, arrival)
        };
        let (slot, is_open, wait, open_at) = match resolved {
            Some((slot, open_at)) => (Some(slot), true, open_at - arrival, open_at),
            None => (instance.slot_index(arrival), false, 0.0, arrival),
        };
        let depart = if is_finish {
            open_at
        } else {
            open_at + instance.dwell_min
        };

        card.push(LegRecord {
            leg: leg + 1,
            from: from_name.to_string(),
            to: to_name.to_string(),
            distance_km: metrics.km,
            height_gain_m: metrics.height_gain_m,
            travel_min: travel,
            arrival: format_minute(arrival),
            depart: format_minute(depart),
            time_slot: slot
                .map(|s| format_minute(instance.slot_starts[s] as f64))
                .unwrap_or_else(|| "--".to_string()),
            is_open,
            wait_min: wait,
            cumulative_min: depart - instance.start_minute,
        });

        from_name = to_name;
        from_idx = to_idx;
        clock = depart;
    }

    Ok(card)
}

/// Outcome of the minimum-speed search.
#[derive(Clone, Debug)]
pub enum MinSpeed {
    /// Slowest acceptable pace and the route it yields.
    Found { speed_kmh: f64, solution: Solution },
    /// Even at the upper speed bound some checkpoint stays out of reach.
    CannotVisitAll,
}

/// Bisect walking speed over `[3, 20]` km/h for the slowest pace at which the
/// solver still visits every non-excluded checkpoint. The travel matrix is
/// rebuilt at each midpoint; feasibility is monotone in speed, so the search
/// brackets the threshold to within 0.01 km/h.
pub fn find_min_speed(
    schedule: &Schedule,
    distances: &DistanceTable,
    params: &Params,
) -> Result<MinSpeed, RouteError> {
    let solve_at = |speed_kmh: f64| -> Result<Option<Solution>, RouteError> {
        let mut at_speed = params.clone();
        at_speed.speed_kmh = speed_kmh;
        let instance = Instance::build(schedule, distances, &at_speed)?;
        let solution = instance.solve();
        Ok((solution.count == instance.checkpoint_count()).then_some(solution))
    };

    let Some(mut best) = solve_at(MAX_SPEED_KMH)? else {
        return Ok(MinSpeed::CannotVisitAll);
    };

    let (mut lo, mut hi) = (MIN_SPEED_KMH, MAX_SPEED_KMH);
    while hi - lo > SPEED_TOLERANCE_KMH {
        let mid = 0.5 * (lo + hi);
        match solve_at(mid)? {
            Some(solution) => {
                hi = mid;
                best = solution;
            }
            None => lo = mid,
        }
    }

    Ok(MinSpeed::Found {
        speed_kmh: hi,
        solution: best,
    })
}
