use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use birdwatch_app::{
    ConfigReconciler, EnvironmentReconciler, HttpRemote, OperatorError, RemoteService,
};
use birdwatch_core::{
    ConfigField, FactorField, RunConfig, SavedRun, SimulationSnapshot, parse_integer,
};
use birdwatch_render::{MAX_PIXELS, render_png};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

#[derive(Parser, Debug)]
#[command(
    name = "birdwatch-control",
    version,
    about = "One-shot commands against a running bird migration simulation service"
)]
struct Cli {
    /// Base URL of the simulation service.
    #[arg(
        long,
        env = "BIRDWATCH_BACKEND_URL",
        default_value = "http://localhost:8080"
    )]
    base_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the service answers.
    Ping,
    /// Print a summary of the current snapshot.
    Status,
    /// Start the run and report the resulting state.
    Start,
    /// Stop the run and report the resulting state.
    Stop,
    /// Print the run configuration.
    Config,
    /// Update one run configuration field and push the whole config.
    Set {
        /// simulationSpeed, worldSize or initialBirds (snake case and short
        /// aliases accepted).
        field: String,
        /// New whole-number value.
        value: String,
    },
    /// Print the time step, or set it when a value is given.
    TimeStep { value: Option<String> },
    /// Print the global environment factors, or edit and submit them.
    Environment {
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        food: Option<f64>,
        #[arg(long)]
        predators: Option<f64>,
    },
    /// List the per-zone environment overrides.
    Zones,
    /// Ask the service to save the current run.
    Save,
    /// Fetch the saved run and print what it contains.
    Load,
    /// Render the current snapshot to a PNG file.
    Render {
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 800)]
        width: u32,
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let remote = Arc::new(
        HttpRemote::new(&cli.base_url, Duration::from_secs(cli.timeout_secs.max(1)))
            .context("failed to build HTTP client")?,
    );

    match cli.command {
        Command::Ping => ping_command(&remote).await?,
        Command::Status => status_command(&remote).await?,
        Command::Start => run_command(&remote, true).await?,
        Command::Stop => run_command(&remote, false).await?,
        Command::Config => config_command(&remote).await?,
        Command::Set { field, value } => set_command(remote, &field, &value).await?,
        Command::TimeStep { value } => time_step_command(remote, value.as_deref()).await?,
        Command::Environment {
            temperature,
            food,
            predators,
        } => environment_command(remote, temperature, food, predators).await?,
        Command::Zones => zones_command(&remote).await?,
        Command::Save => {
            remote.save_run().await.context("failed to save run")?;
            println!("{}", "Run saved".green().bold());
        }
        Command::Load => load_command(&remote).await?,
        Command::Render { out, width, height } => {
            render_command(&remote, out, width, height).await?
        }
    }

    Ok(())
}

async fn ping_command(remote: &HttpRemote) -> Result<()> {
    remote.ping().await.context("service did not answer")?;
    println!("{} {}", "reachable".green().bold(), remote.base_url());
    Ok(())
}

async fn fetch_snapshot(remote: &HttpRemote) -> Result<SimulationSnapshot> {
    let update = remote
        .fetch_snapshot()
        .await
        .context("failed to fetch snapshot")?;
    let mut snapshot = SimulationSnapshot::default();
    snapshot.merge(update);
    Ok(snapshot)
}

async fn status_command(remote: &HttpRemote) -> Result<()> {
    let snapshot = fetch_snapshot(remote).await?;
    print_snapshot(&snapshot);
    Ok(())
}

async fn run_command(remote: &HttpRemote, start: bool) -> Result<()> {
    if start {
        remote.start().await.context("failed to start run")?;
    } else {
        remote.stop().await.context("failed to stop run")?;
    }
    let snapshot = fetch_snapshot(remote).await?;
    print_running(snapshot.is_running);
    if snapshot.is_running != start {
        println!(
            "{}",
            "service acknowledged the command but reports a different state".yellow()
        );
    }
    Ok(())
}

async fn config_command(remote: &HttpRemote) -> Result<()> {
    let config = remote
        .fetch_config()
        .await
        .context("failed to fetch run config")?;
    print_config(&config);
    let step = remote
        .fetch_time_step()
        .await
        .context("failed to fetch time step")?;
    println!("{:<18} {}", "timeStep".bold(), step.time_step);
    Ok(())
}

async fn set_command(remote: Arc<HttpRemote>, field: &str, raw: &str) -> Result<()> {
    let reconciler = ConfigReconciler::new(remote);
    reconciler
        .load()
        .await
        .context("failed to load run config before editing")?;
    match reconciler.set_field_from_input(field, raw).await {
        Ok(()) => {
            println!("{}", "Config pushed".green().bold());
            print_config(&reconciler.config());
            Ok(())
        }
        Err(OperatorError::Remote(err)) => bail!("config push failed: {err}"),
        Err(err) => bail!("rejected: {err}"),
    }
}

async fn time_step_command(remote: Arc<HttpRemote>, value: Option<&str>) -> Result<()> {
    let reconciler = ConfigReconciler::new(remote);
    let Some(raw) = value else {
        reconciler
            .load_time_step()
            .await
            .context("failed to fetch time step")?;
        println!("{:<18} {}", "timeStep".bold(), reconciler.time_step().time_step);
        return Ok(());
    };
    let value = parse_integer("timeStep", raw)?;
    reconciler
        .set_time_step(value)
        .await
        .context("failed to set time step")?;
    println!("{} {}", "timeStep =>".green().bold(), value);
    Ok(())
}

async fn environment_command(
    remote: Arc<HttpRemote>,
    temperature: Option<f64>,
    food: Option<f64>,
    predators: Option<f64>,
) -> Result<()> {
    let reconciler = EnvironmentReconciler::new(remote);
    reconciler
        .load()
        .await
        .context("failed to load environment")?;

    let edits = [
        (FactorField::Temperature, temperature),
        (FactorField::FoodAvailability, food),
        (FactorField::PredatorPresence, predators),
    ];
    let mut edited = false;
    for (field, value) in edits {
        if let Some(value) = value {
            reconciler.edit_factor(field, value)?;
            edited = true;
        }
    }

    if edited {
        reconciler
            .submit(|factors| {
                println!(
                    "{} temperature {:.1}, food {:.2}, predators {:.2}",
                    "submitted".green().bold(),
                    factors.temperature,
                    factors.food_availability,
                    factors.predator_presence
                );
            })
            .await
            .context("failed to submit environment")?;
        return Ok(());
    }

    let factors = reconciler.factors();
    for field in FactorField::ALL {
        println!("{:<18} {}", field.wire_name().bold(), factors.get(field));
    }
    Ok(())
}

async fn zones_command(remote: &HttpRemote) -> Result<()> {
    let zones = remote.fetch_zones().await.context("failed to fetch zones")?;
    if zones.is_empty() {
        println!("{}", "No zones reported by the service".yellow());
        return Ok(());
    }
    println!(
        "{:<6} {:>12} {:>8} {:>10}",
        "ID".bold().cyan(),
        "TEMPERATURE".bold().cyan(),
        "FOOD".bold().cyan(),
        "PREDATORS".bold().cyan()
    );
    println!("{}", "-".repeat(40).dimmed());
    for zone in zones {
        println!(
            "{:<6} {:>12.1} {:>8.2} {:>10.2}",
            zone.id.bold(),
            zone.temperature,
            zone.food_availability,
            zone.predator_presence
        );
    }
    Ok(())
}

async fn load_command(remote: &HttpRemote) -> Result<()> {
    let SavedRun {
        state,
        config,
        time_step,
    } = remote.load_run().await.context("failed to load saved run")?;
    let mut snapshot = SimulationSnapshot::default();
    snapshot.merge(state);
    println!("{}", "Saved run".green().bold());
    print_snapshot(&snapshot);
    if let Some(config) = config {
        print_config(&config);
    }
    if let Some(step) = time_step {
        println!("{:<18} {}", "timeStep".bold(), step);
    }
    Ok(())
}

async fn render_command(remote: &HttpRemote, out: PathBuf, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        bail!("render size must be non-zero, got {width}x{height}");
    }
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        bail!("render size {width}x{height} exceeds the {MAX_PIXELS} pixel limit");
    }
    let snapshot = fetch_snapshot(remote).await?;
    let png = render_png(&snapshot, width, height).context("failed to render PNG")?;
    std::fs::write(&out, &png).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "{} {} ({}x{}, {} entities)",
        "wrote".green().bold(),
        out.display(),
        width,
        height,
        snapshot.entity_count()
    );
    Ok(())
}

fn print_running(running: bool) {
    if running {
        println!("{}", "RUNNING".black().on_green().bold());
    } else {
        println!("{}", "STOPPED".white().on_bright_black().bold());
    }
}

fn print_snapshot(snapshot: &SimulationSnapshot) {
    let (migrating, resting, searching) = snapshot.bird_states();
    print_running(snapshot.is_running);
    println!("{:<18} {}", "time".bold(), snapshot.time);
    println!("{:<18} {}", "worldSize".bold(), snapshot.world_size);
    println!("{:<18} {}", "collisionCount".bold(), snapshot.collision_count);
    println!(
        "{:<18} {} ({} migrating, {} resting, {} searching food)",
        "birds".bold(),
        snapshot.birds.len(),
        migrating,
        resting,
        searching
    );
    println!("{:<18} {}", "predators".bold(), snapshot.predators.len());
    println!("{:<18} {}", "obstacles".bold(), snapshot.obstacles.len());
    println!("{:<18} {}", "resources".bold(), snapshot.resources.len());
    println!(
        "{:<18} {}",
        "temperatureZones".bold(),
        snapshot.temperature_zones.len()
    );
}

fn print_config(config: &RunConfig) {
    for field in ConfigField::ALL {
        println!(
            "{:<18} {}",
            field.wire_name().bold(),
            config.get(field).to_string().cyan()
        );
    }
    if let Some(count) = config.obstacle_count {
        println!("{:<18} {}", "obstacleCount".dimmed(), count);
    }
    if let Some(count) = config.resource_count {
        println!("{:<18} {}", "resourceCount".dimmed(), count);
    }
}
