use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempo_engine::{Animation, Conductor, Direction};
use tempo_schema::{ActionRegistry, NodeKind, Schedule, ScheduleNode};
use tracing::{error, info, trace, warn};
use tracing_subscriber::{fmt, EnvFilter};

use anyhow::{bail, Context};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the shape and duration of a schedule
    Info {
        /// Path to the schedule JSON
        #[arg(value_name = "SCHEDULE")]
        schedule: PathBuf,
    },
    /// Run a schedule to completion
    Play {
        /// Path to the schedule JSON
        #[arg(value_name = "SCHEDULE")]
        schedule: PathBuf,

        /// Ticks per second to simulate
        #[arg(long, default_value_t = 60)]
        fps: u32,

        /// Playback rate multiplier
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Sleep between frames instead of running flat out
        #[arg(long)]
        realtime: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogFormat {
    Pretty,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(cli.log_level.to_string().parse().unwrap())
        .from_env_lossy();

    let subscriber_builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match cli.log_format {
        LogFormat::Json => subscriber_builder.json().init(),
        LogFormat::Pretty => subscriber_builder.pretty().init(),
    }

    if let Err(err) = run(cli) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Info { schedule } => info_command(&schedule),
        Command::Play {
            schedule,
            fps,
            speed,
            realtime,
        } => play_command(&schedule, fps, speed, realtime),
    }
}

fn load_schedule(path: &Path) -> anyhow::Result<Schedule> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading schedule {}", path.display()))?;
    let schedule =
        Schedule::from_json(&text).with_context(|| format!("parsing schedule {}", path.display()))?;
    Ok(schedule)
}

/// Registers a logging stand-in for every action the document names, so
/// schedules play without the host that normally supplies callbacks.
fn stub_registry(schedule: &Schedule) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    let mut names = Vec::new();
    collect_actions(&schedule.root, &mut names);
    for name in names {
        let label = name.clone();
        registry.register(name, move || info!(action = %label, "action fired"));
    }
    registry
}

fn collect_actions(node: &ScheduleNode, out: &mut Vec<String>) {
    match &node.kind {
        NodeKind::Action { name } => out.push(name.clone()),
        NodeKind::Parallel { children } | NodeKind::Sequential { children } => {
            for child in children {
                collect_actions(child, out);
            }
        }
        _ => {}
    }
}

fn info_command(path: &Path) -> anyhow::Result<()> {
    let schedule = load_schedule(path)?;
    let animation = schedule.build(&stub_registry(&schedule))?;

    let mut tree = String::new();
    describe(&schedule.root, 0, &mut tree);
    print!("{tree}");
    match animation.total_duration() {
        Some(total) => println!("total duration: {total}ms"),
        None => println!("total duration: indeterminate"),
    }
    Ok(())
}

fn describe(node: &ScheduleNode, depth: usize, out: &mut String) {
    use std::fmt::Write as _;

    let pad = "  ".repeat(depth);
    let mut line = match &node.kind {
        NodeKind::Pause { duration_ms } => format!("pause {duration_ms}ms"),
        NodeKind::Tween {
            target, keyframes, ..
        } => format!("tween {target} ({} keyframes)", keyframes.len()),
        NodeKind::Spring { target, to, .. } => format!("spring {target} -> {to}"),
        NodeKind::Action { name } => format!("action {name}"),
        NodeKind::Parallel { children } => format!("parallel ({} children)", children.len()),
        NodeKind::Sequential { children } => format!("sequential ({} children)", children.len()),
    };
    if node.loops == -1 {
        line.push_str(", loops forever");
    } else if node.loops != 1 {
        let _ = write!(line, ", loops {}", node.loops);
    }
    if node.direction == Direction::Backward {
        line.push_str(", backward");
    }
    let _ = writeln!(out, "{pad}{line}");

    if let NodeKind::Parallel { children } | NodeKind::Sequential { children } = &node.kind {
        for child in children {
            describe(child, depth + 1, out);
        }
    }
}

fn play_command(path: &Path, fps: u32, speed: f64, realtime: bool) -> anyhow::Result<()> {
    if fps == 0 {
        bail!("fps must be at least 1");
    }
    let schedule = load_schedule(path)?;
    let animation = schedule.build(&stub_registry(&schedule))?;
    if animation.total_duration().is_none() {
        warn!("schedule never finishes on its own; stop it with ctrl-c");
    }

    let mut conductor = Conductor::new();
    conductor.set_speed(speed);
    let track = conductor.play(animation);

    let frame = Duration::from_secs_f64(1.0 / f64::from(fps));
    let started = Instant::now();
    let mut frames: u64 = 0;

    info!(fps, speed, "playing {}", path.display());
    loop {
        let alive = conductor.advance(frame);
        frames += 1;
        if let Some(animation) = conductor.track(track) {
            trace!(
                time = animation.total_current_time(),
                loop_index = animation.current_loop(),
                "tick"
            );
        }
        if !alive {
            break;
        }
        if realtime {
            thread::sleep(frame);
        }
    }

    let final_time = conductor
        .track(track)
        .map(|animation| animation.total_current_time())
        .unwrap_or(0);
    info!(
        frames,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "finished at {final_time}ms"
    );
    Ok(())
}
