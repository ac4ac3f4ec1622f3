//! rangesim CLI - Run range simulations from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use rangesim::{
    compute::{PopulationStats, Simulation},
    schema::SimulationConfig,
    trajectory::{RecorderConfig, TrajectoryRecorder},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [steps]", args[0]);
        eprintln!();
        eprintln!("Run a stage-structured range simulation from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  steps        Number of simulation steps (default: from config)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {e}");
        process::exit(1);
    });

    let mut config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {e}");
        process::exit(1);
    });

    if let Some(arg) = args.get(2) {
        config.steps = arg.parse().unwrap_or_else(|e| {
            eprintln!("Invalid step count {arg:?}: {e}");
            process::exit(1);
        });
    }

    let scenario = config.build().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        process::exit(1);
    });

    let steps = config.steps;
    let run = config.run.clone();

    println!("Range Simulation");
    println!("================");
    println!(
        "Grid: {}x{} ({} classes)",
        config.width, config.height, config.classes
    );
    println!(
        "Mode: {:?}, boundary: {:?}, seed: {}",
        run.mode, run.boundary, run.seed
    );
    println!(
        "Kernel: {0}x{0}, recording class {1}, recruiting into class {2}",
        scenario.neighborhood.size(),
        run.record,
        run.recruit
    );
    println!("Steps: {steps}");
    println!();

    let mut simulation =
        Simulation::with_backend(&scenario, run.clone(), steps, config.dispersal_backend)
            .unwrap_or_else(|e| {
                eprintln!("Invalid configuration: {e}");
                process::exit(1);
            });

    let initial_stats = PopulationStats::from_population(simulation.population());
    println!("Initial state:");
    print_stats(&initial_stats);
    println!();

    let output_path = config_path.with_extension("rtrj");
    let mut recorder = TrajectoryRecorder::new(
        &output_path,
        config.width,
        config.height,
        run.record,
        RecorderConfig::default(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Error creating {}: {e}", output_path.display());
        process::exit(1);
    });
    record(&mut recorder, simulation.recorded());

    println!("Running simulation...");
    let start = Instant::now();

    for i in 0..steps {
        if let Err(e) = simulation.step() {
            eprintln!("Simulation failed: {e}");
            process::exit(1);
        }
        record(&mut recorder, simulation.recorded());

        // Print progress every 10%
        if (i + 1) % (steps / 10).max(1) == 0 {
            let stats = PopulationStats::from_population(simulation.population());
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Step {}/{}: total={:.1}, occupied={}, {:.1} steps/s",
                i + 1,
                steps,
                stats.total,
                stats.occupied_cells,
                (i + 1) as f32 / elapsed
            );
        }
    }

    let elapsed = start.elapsed();
    let final_stats = PopulationStats::from_population(simulation.population());

    println!();
    println!("Final state:");
    print_stats(&final_stats);
    println!();
    println!(
        "Time: {:.2}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        steps as f32 / elapsed.as_secs_f32()
    );

    match recorder.finalize() {
        Ok(stats) => println!("Trajectory: {} ({stats})", output_path.display()),
        Err(e) => {
            eprintln!("Error writing {}: {e}", output_path.display());
            process::exit(1);
        }
    }
}

fn record(recorder: &mut TrajectoryRecorder, frame: &[f64]) {
    if let Err(e) = recorder.record_frame(frame) {
        eprintln!("Error writing trajectory frame: {e}");
        process::exit(1);
    }
}

fn print_stats(stats: &PopulationStats) {
    println!("  Total population: {:.1}", stats.total);
    let classes: Vec<String> = stats.class_totals.iter().map(|t| format!("{t:.1}")).collect();
    println!("  Per class: [{}]", classes.join(", "));
    println!("  Occupied cells: {}", stats.occupied_cells);
    println!("  Max density: {:.1}", stats.max_density);
}

fn print_example_config() {
    let config = SimulationConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing example config: {e}");
            process::exit(1);
        }
    }
}
