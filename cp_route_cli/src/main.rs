use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cp_route::{
    build_route_card, find_min_speed, format_minute, DistanceTable, Instance, LegRecord, MinSpeed,
    Params, Schedule, Solution, FINISH_NAME, MAX_SPEED_KMH, START_NAME,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Checkpoint route planning CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve for the route visiting the most checkpoints at a fixed speed
    Solve(SolveArgs),
    /// Search for the slowest walking speed that still visits every checkpoint
    MinSpeed(MinSpeedArgs),
    /// Validate an instance file and summarise its schedule
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct SolveArgs {
    /// Instance JSON file
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Walking speed in km/h (overrides the instance config)
    #[arg(long)]
    speed: Option<f64>,

    /// Dwell minutes per checkpoint (overrides the instance config)
    #[arg(long)]
    dwell: Option<f64>,

    /// Checkpoint to skip (repeatable)
    #[arg(long, action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Emit a JSON report instead of the table
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct MinSpeedArgs {
    /// Instance JSON file
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Checkpoint to skip (repeatable)
    #[arg(long, action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Emit a JSON report instead of the table
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Instance JSON file
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct InstanceFile {
    checkpoints: Vec<String>,
    slot_starts: Vec<u32>,
    openings: BTreeMap<String, Vec<u8>>,
    distances: Vec<DistanceRow>,
    #[serde(default)]
    config: ConfigSection,
}

#[derive(Debug, Deserialize)]
struct DistanceRow {
    from: String,
    to: String,
    km: f64,
    #[serde(default)]
    height_gain_m: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigSection {
    speed_kmh: f64,
    dwell_min: f64,
    naismith: f64,
    start_minute: f64,
    end_minute: f64,
    excluded: Vec<String>,
}

impl Default for ConfigSection {
    fn default() -> Self {
        let params = Params::default();
        Self {
            speed_kmh: params.speed_kmh,
            dwell_min: params.dwell_min,
            naismith: params.naismith,
            start_minute: params.start_minute,
            end_minute: params.end_minute,
            excluded: Vec::new(),
        }
    }
}

struct LoadedInstance {
    schedule: Schedule,
    distances: DistanceTable,
    params: Params,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Solve(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::MinSpeed(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::Check(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Solve(args) => handle_solve(args),
        Command::MinSpeed(args) => handle_min_speed(args),
        Command::Check(args) => handle_check(args),
    }
}

fn load_instance(
    path: &Path,
    speed: Option<f64>,
    dwell: Option<f64>,
    exclude: &[String],
) -> Result<LoadedInstance> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file: InstanceFile = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let schedule = Schedule::from_names(&file.checkpoints, file.slot_starts, &file.openings)?;

    let mut distances = DistanceTable::new();
    for row in &file.distances {
        distances.insert(&row.from, &row.to, row.km, row.height_gain_m);
    }

    let mut params = Params {
        speed_kmh: file.config.speed_kmh,
        dwell_min: file.config.dwell_min,
        naismith: file.config.naismith,
        start_minute: file.config.start_minute,
        end_minute: file.config.end_minute,
        excluded: file.config.excluded.iter().cloned().collect(),
    };
    if let Some(value) = speed {
        params.speed_kmh = value;
    }
    if let Some(value) = dwell {
        params.dwell_min = value;
    }
    params.excluded.extend(exclude.iter().cloned());

    Ok(LoadedInstance {
        schedule,
        distances,
        params,
    })
}

fn handle_solve(args: SolveArgs) -> Result<()> {
    let loaded = load_instance(&args.input, args.speed, args.dwell, &args.exclude)?;
    let instance = Instance::build(&loaded.schedule, &loaded.distances, &loaded.params)?;

    let t_solve = Instant::now();
    let solution = instance.solve();
    info!(
        "Solved {} checkpoints in {:.1} ms",
        instance.checkpoint_count(),
        t_solve.elapsed().as_secs_f64() * 1000.0
    );

    if solution.count == 0 {
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "count": 0,
                    "route": [],
                    "finish_minute": null,
                }))?
            );
        } else {
            println!("No feasible route within the event window.");
        }
        return Ok(());
    }

    let card = build_route_card(&instance, &loaded.distances, &solution)?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report(&loaded.params, &solution, &card))?
        );
    } else {
        print_summary(&loaded.params, &solution);
        print_card(&card);
    }
    Ok(())
}

fn handle_min_speed(args: MinSpeedArgs) -> Result<()> {
    let loaded = load_instance(&args.input, None, None, &args.exclude)?;

    let t_search = Instant::now();
    let outcome = find_min_speed(&loaded.schedule, &loaded.distances, &loaded.params)?;
    info!(
        "Speed search finished in {:.1} ms",
        t_search.elapsed().as_secs_f64() * 1000.0
    );

    match outcome {
        MinSpeed::CannotVisitAll => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "feasible": false }))?
                );
            } else {
                println!("Cannot visit every checkpoint even at {MAX_SPEED_KMH} km/h.");
            }
        }
        MinSpeed::Found { speed_kmh, solution } => {
            let mut params = loaded.params.clone();
            params.speed_kmh = speed_kmh;
            let instance = Instance::build(&loaded.schedule, &loaded.distances, &params)?;
            let card = build_route_card(&instance, &loaded.distances, &solution)?;
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report(&params, &solution, &card))?
                );
            } else {
                println!("Minimum speed: {speed_kmh:.2} km/h");
                print_summary(&params, &solution);
                print_card(&card);
            }
        }
    }
    Ok(())
}

fn handle_check(args: CheckArgs) -> Result<()> {
    let loaded = load_instance(&args.input, None, None, &[])?;
    let instance = Instance::build(&loaded.schedule, &loaded.distances, &loaded.params)?;

    let schedule = &loaded.schedule;
    let first = schedule.slot_starts[0];
    let last = schedule.slot_starts[schedule.slot_starts.len() - 1];
    println!(
        "{} checkpoint(s), {} slot(s) from {} to {}",
        schedule.names.len(),
        schedule.slot_starts.len(),
        format_minute(first as f64),
        format_minute(last as f64)
    );
    for (i, name) in schedule.names.iter().enumerate() {
        let open_slots = schedule.open[i].iter().filter(|&&b| b).count();
        println!("  {name:<16} open in {open_slots} slot(s)");
    }
    println!(
        "  {:<16} open in {} slot(s)",
        FINISH_NAME,
        schedule.finish_open.iter().filter(|&&b| b).count()
    );

    let mut missing = Vec::new();
    for name in &schedule.names {
        if loaded.distances.get(START_NAME, name).is_none() {
            missing.push(format!("{START_NAME} -> {name}"));
        }
        if loaded.distances.get(name, FINISH_NAME).is_none() {
            missing.push(format!("{name} -> {FINISH_NAME}"));
        }
    }
    for leg in &missing {
        warn!("No distance record for {leg}");
    }
    println!(
        "Instance OK: {} active checkpoint(s), {} distance record(s), window {}..{}",
        instance.checkpoint_count(),
        loaded.distances.len(),
        format_minute(loaded.params.start_minute),
        format_minute(loaded.params.end_minute)
    );
    Ok(())
}

fn report(params: &Params, solution: &Solution, card: &[LegRecord]) -> serde_json::Value {
    json!({
        "count": solution.count,
        "route": solution.route,
        "finish_minute": solution.finish_minute,
        "finish": solution.finish_minute.map(format_minute),
        "speed_kmh": params.speed_kmh,
        "legs": card,
    })
}

fn print_summary(params: &Params, solution: &Solution) {
    let finish = solution
        .finish_minute
        .map(format_minute)
        .unwrap_or_else(|| "--".to_string());
    println!(
        "Visited {} checkpoint(s) at {:.2} km/h, finishing {}",
        solution.count, params.speed_kmh, finish
    );
    println!("Route: {}", solution.route.join(" -> "));
    println!();
}

fn print_card(card: &[LegRecord]) {
    println!(
        "{:>3}  {:<16} {:<16} {:>6} {:>6} {:>7} {:>7} {:>6} {:>6} {:>7} {:>8}",
        "leg", "from", "to", "km", "gain", "travel", "arrive", "slot", "wait", "depart", "cum"
    );
    for leg in card {
        println!(
            "{:>3}  {:<16} {:<16} {:>6.2} {:>6.0} {:>7.1} {:>7} {:>6} {:>6.1} {:>7} {:>8.1}{}",
            leg.leg,
            leg.from,
            leg.to,
            leg.distance_km,
            leg.height_gain_m,
            leg.travel_min,
            leg.arrival,
            leg.time_slot,
            leg.wait_min,
            leg.depart,
            leg.cumulative_min,
            if leg.is_open { "" } else { "  (closed)" }
        );
    }
}
