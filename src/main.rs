//! fogsim demo CLI
//!
//! Runs a small smart-building scenario: temperature sensors on two edge
//! nodes, a filter module at the edge, an aggregator in the cloud and a
//! fan actuator closing the loop. Prints the metrics snapshot as JSON.
//!
//! # Example
//!
//! ```bash
//! fogsim --max-time 5000
//! RUST_LOG=fogsim=debug fogsim --config run.toml --output metrics.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fogsim::{
    Actuator, ActuatorId, AppEdge, Application, DeviceId, EdgeKind, FileExporter, FogResult,
    JsonExporter, MetricsExporter, ModuleMapping, RelayDevice, ScenarioBuilder, Sensor, SensorId,
    SimulationConfig,
};

#[derive(Parser, Debug)]
#[command(name = "fogsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML file with `resource_manage_interval` and `max_simulation_time`
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Override the run length in ticks
    #[arg(short = 't', long)]
    max_time: Option<u64>,

    /// Write the snapshot to this file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,fogsim=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> FogResult<()> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(max_time) = args.max_time {
        config.max_simulation_time = max_time;
    }

    let exporter: Box<dyn MetricsExporter> = match &args.output {
        Some(path) => Box::new(FileExporter::new(path)),
        None => Box::new(JsonExporter::stdout()),
    };

    info!(
        interval = config.resource_manage_interval,
        max_time = config.max_simulation_time,
        "starting demo scenario"
    );

    let app = smart_building()?;
    let mut mapping = ModuleMapping::new();
    mapping
        .add("edge-0", "filter")
        .add("edge-1", "filter")
        .add("cloud", "aggregate");

    let cloud = DeviceId::new(0);
    let proxy = DeviceId::new(1);
    let edge_0 = DeviceId::new(2);
    let edge_1 = DeviceId::new(3);

    let mut scenario = ScenarioBuilder::new()
        .config(config)
        .relay(RelayDevice::new(cloud, "cloud").with_mips(44_800).with_power(16.8, 0.0001))
        .relay(RelayDevice::new(proxy, "proxy").with_parent(cloud, 100).with_mips(2_800))
        .relay(RelayDevice::new(edge_0, "edge-0").with_parent(proxy, 2).with_mips(1_000).with_power(0.8, 0.002))
        .relay(RelayDevice::new(edge_1, "edge-1").with_parent(proxy, 4).with_mips(1_000).with_power(0.8, 0.002))
        .sensor(Sensor::new(SensorId::new(0), "thermo-0", "TEMP", app.id()).attached_to(edge_0, 1).every(5))
        .sensor(Sensor::new(SensorId::new(1), "thermo-1", "TEMP", app.id()).attached_to(edge_1, 1).every(7))
        .actuator(Actuator::new(ActuatorId::new(0), "fan-0", "fan").attached_to(edge_0, 1))
        .application(app, mapping)
        .exporter(exporter)
        .build()?;

    let snapshot = scenario.run()?;
    info!(
        sensor_tuples = snapshot.tuples_sent_by_sensors(),
        network_usage = snapshot.network_usage(),
        events = scenario.events_processed(),
        "demo complete"
    );
    Ok(())
}

fn smart_building() -> FogResult<Application> {
    let mut app = Application::new("smart-building");
    app.add_module("filter", 10).add_module("aggregate", 10);
    app.add_edge(AppEdge::new("TEMP", "filter", "TEMP", EdgeKind::Sensor).cpu_length(1_000).data_size(500))
        .add_edge(AppEdge::new("filter", "aggregate", "CLEAN", EdgeKind::Module).cpu_length(2_000).data_size(100))
        .add_edge(AppEdge::new("aggregate", "FAN", "SETPOINT", EdgeKind::Actuator).cpu_length(100).data_size(10));
    let control = app.add_loop(&["TEMP", "filter", "aggregate", "FAN"])?;
    app.set_loop_deadline(control, 250.0);
    Ok(app)
}
