//! End-to-end scenarios through the public name-based API: a realistic
//! day-long event with staggered openings, exclusions, and the speed search.

use std::collections::BTreeMap;

use cp_route::{
    build_route_card, find_min_speed, solve, DistanceTable, Instance, MinSpeed, Params,
    RouteError, Schedule, FINISH_NAME, START_NAME,
};

const CHECKPOINTS: [&str; 4] = ["Quarry", "Summit", "Ford", "Cairn"];

fn event_schedule() -> Schedule {
    // 15 half-hour slots from 10:00 to 17:00.
    let slot_starts: Vec<u32> = (0..15).map(|s| 600 + 30 * s).collect();
    let window = |from: usize, to: usize| -> Vec<u8> {
        (0..15).map(|s| u8::from(s >= from && s <= to)).collect()
    };

    let mut names = vec![START_NAME.to_string()];
    names.extend(CHECKPOINTS.iter().map(|c| c.to_string()));
    names.push(FINISH_NAME.to_string());

    let mut openings: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    openings.insert("Quarry".to_string(), window(0, 5));
    openings.insert("Summit".to_string(), window(2, 8));
    openings.insert("Ford".to_string(), window(5, 11));
    openings.insert("Cairn".to_string(), window(8, 14));
    openings.insert(FINISH_NAME.to_string(), window(8, 14));

    Schedule::from_names(&names, slot_starts, &openings).unwrap()
}

fn event_distances() -> DistanceTable {
    let rows = [
        (START_NAME, "Quarry", 2.0, 50.0),
        (START_NAME, "Summit", 4.0, 250.0),
        (START_NAME, "Ford", 7.0, 0.0),
        (START_NAME, "Cairn", 9.0, 100.0),
        ("Quarry", "Summit", 3.0, 200.0),
        ("Summit", "Quarry", 3.0, 0.0),
        ("Quarry", "Ford", 6.0, 50.0),
        ("Ford", "Quarry", 6.0, 100.0),
        ("Quarry", "Cairn", 8.0, 150.0),
        ("Cairn", "Quarry", 8.0, 50.0),
        ("Summit", "Ford", 4.0, 0.0),
        ("Ford", "Summit", 4.0, 150.0),
        ("Summit", "Cairn", 5.0, 100.0),
        ("Cairn", "Summit", 5.0, 250.0),
        ("Ford", "Cairn", 3.0, 100.0),
        ("Cairn", "Ford", 3.0, 0.0),
        ("Quarry", FINISH_NAME, 10.0, 0.0),
        ("Summit", FINISH_NAME, 6.0, 0.0),
        ("Ford", FINISH_NAME, 4.0, 0.0),
        ("Cairn", FINISH_NAME, 2.0, 0.0),
    ];
    let mut table = DistanceTable::new();
    for (from, to, km, gain) in rows {
        table.insert(from, to, km, gain);
    }
    table
}

fn event_params() -> Params {
    Params {
        speed_kmh: 5.0,
        dwell_min: 7.0,
        naismith: 10.0,
        start_minute: 600.0,
        end_minute: 1020.0,
        excluded: Default::default(),
    }
}

#[test]
fn visits_every_checkpoint_at_walking_pace() {
    let solution = solve(&event_schedule(), &event_distances(), &event_params()).unwrap();
    assert_eq!(solution.count, 4);
    assert_eq!(solution.route.len(), 4);
    let finish = solution.finish_minute.unwrap();
    assert!(finish > 600.0 && finish <= 1020.0);
}

#[test]
fn route_card_replays_the_solution() {
    let schedule = event_schedule();
    let distances = event_distances();
    let params = event_params();
    let instance = Instance::build(&schedule, &distances, &params).unwrap();
    let solution = instance.solve();
    let card = build_route_card(&instance, &distances, &solution).unwrap();

    assert_eq!(card.len(), solution.count + 1);
    assert!(card.iter().all(|leg| leg.is_open));
    assert!(card.iter().all(|leg| leg.wait_min >= 0.0));
    assert_eq!(card[0].from, START_NAME);
    assert_eq!(card[card.len() - 1].to, FINISH_NAME);

    // The replayed Finish arrival is the solver's finish minute.
    let finish = params.start_minute + card[card.len() - 1].cumulative_min;
    assert!((finish - solution.finish_minute.unwrap()).abs() < 1e-6);
}

#[test]
fn more_speed_never_visits_fewer_checkpoints() {
    let schedule = event_schedule();
    let distances = event_distances();
    let mut params = event_params();

    let mut last_count = 0;
    for speed in [3.0, 4.0, 5.0, 8.0, 12.0] {
        params.speed_kmh = speed;
        let solution = solve(&schedule, &distances, &params).unwrap();
        assert!(solution.count >= last_count, "count dropped at {speed} km/h");
        last_count = solution.count;
    }
}

#[test]
fn excluding_a_checkpoint_shrinks_the_route() {
    let mut params = event_params();
    params.excluded.insert("Summit".to_string());
    let solution = solve(&event_schedule(), &event_distances(), &params).unwrap();
    assert_eq!(solution.count, 3);
    assert!(!solution.route.contains(&"Summit".to_string()));
}

#[test]
fn unknown_exclusion_is_rejected() {
    let mut params = event_params();
    params.excluded.insert("Bothy".to_string());
    assert!(matches!(
        solve(&event_schedule(), &event_distances(), &params),
        Err(RouteError::UnknownExclusion(_))
    ));
}

#[test]
fn speed_search_covers_the_whole_event() {
    match find_min_speed(&event_schedule(), &event_distances(), &event_params()).unwrap() {
        MinSpeed::Found { speed_kmh, solution } => {
            assert!(speed_kmh >= 3.0 && speed_kmh <= 20.0);
            assert_eq!(solution.count, 4);
        }
        MinSpeed::CannotVisitAll => panic!("event should be coverable inside the speed range"),
    }
}
