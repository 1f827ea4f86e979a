//! comic-gestures - replay recorded pointer traces through the gesture recognizer
//!
//! Subcommands:
//! - `replay`: print every event the recognizer emits for a trace
//! - `check-config`: validate a threshold file and print the merged result

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use comic_gestures::backend::{CalloopScheduler, ManualScheduler, RecognizerHost};
use comic_gestures::input::{ChannelMask, GestureEvent, GestureRecognizer};
use comic_gestures::scheduler::{MonotonicClock, Scheduler, FRAME_INTERVAL};
use comic_gestures::trace::{EventRecord, Trace, TraceInput};
use comic_gestures::{ConfigPatch, RecognitionConfig};

#[derive(Parser, Debug)]
#[command(name = "comic-gestures")]
#[command(about = "Multi-touch gesture recognizer for the comic reader", long_about = None)]
struct Args {
    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a recorded trace (.json or .toml) through the recognizer
    Replay {
        trace: PathBuf,

        /// Threshold file (defaults to ~/.config/comic-gestures/gestures.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Replay on wall-clock timers instead of trace timestamps
        #[arg(short, long)]
        realtime: bool,

        /// Print one JSON object per event
        #[arg(short, long)]
        json: bool,
    },

    /// Validate a threshold file and print the merged configuration
    CheckConfig { file: PathBuf },
}

fn main() -> Result<()> {
    // Set up panic hook to log panics before crashing
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        let crash_log = log_dir().join("crash.log");
        if let Ok(mut f) = std::fs::OpenOptions::new().create(true).append(true).open(&crash_log) {
            use std::io::Write;
            let _ = writeln!(f, "[{}] PANIC: {}", chrono::Local::now(), panic_info);
        }
    }));

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let args = Args::parse();

    // Rotates daily
    let file_appender = rolling::daily(&log_dir, "comic-gestures.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Quiet by default, verbose with --debug
    let default_filter = if args.debug {
        "debug,comic_gestures=debug"
    } else {
        "warn,comic_gestures=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!(log_path = %log_dir.display(), "comic-gestures starting");

    match args.command {
        Command::Replay {
            trace,
            config,
            realtime,
            json,
        } => {
            let config = match config {
                Some(path) => RecognitionConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => RecognitionConfig::load_or_default(),
            };
            let trace = Trace::load(&trace).with_context(|| format!("Failed to load trace {}", trace.display()))?;
            if realtime {
                replay_realtime(&trace, config, json)
            } else {
                replay(&trace, config, json)
            }
        }
        Command::CheckConfig { file } => check_config(&file),
    }
}

/// ~/.local/state/comic-gestures, or /tmp/comic-gestures
fn log_dir() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local/state")))
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join("comic-gestures")
}

fn print_event(event: &GestureEvent, json: bool) {
    if json {
        match serde_json::to_string(&EventRecord::from(event)) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode event: {}", e),
        }
    } else {
        println!("{}", event);
    }
}

fn prepare<S: Scheduler>(
    recognizer: &mut GestureRecognizer<S>,
    trace: &Trace,
    json: bool,
) -> Result<()> {
    if let Some(device) = trace.device {
        recognizer
            .update_config(&ConfigPatch::for_device(device))
            .context("Device preset rejected")?;
        info!(?device, "Applied device preset");
    }
    recognizer.subscribe(ChannelMask::ALL, move |event| print_event(event, json));
    Ok(())
}

fn replay(trace: &Trace, config: RecognitionConfig, json: bool) -> Result<()> {
    let mut recognizer = GestureRecognizer::with_config(config, ManualScheduler::new())?;
    prepare(&mut recognizer, trace, json)?;

    trace.replay(&mut recognizer);
    info!(events = trace.events.len(), duration = ?trace.duration(), "Replay finished");
    Ok(())
}

struct ReplayHost {
    recognizer: GestureRecognizer<CalloopScheduler<ReplayHost>>,
    remaining: Rc<Cell<usize>>,
}

impl RecognizerHost for ReplayHost {
    fn recognizer(&mut self) -> &mut GestureRecognizer<CalloopScheduler<ReplayHost>> {
        &mut self.recognizer
    }
}

fn replay_realtime(trace: &Trace, config: RecognitionConfig, json: bool) -> Result<()> {
    let mut event_loop: EventLoop<'static, ReplayHost> =
        EventLoop::try_new().context("Failed to create event loop")?;
    let handle = event_loop.handle();
    let clock = MonotonicClock::new();
    let epoch = clock.epoch();

    let mut recognizer = GestureRecognizer::with_config(config, CalloopScheduler::new(handle.clone(), epoch))?;
    prepare(&mut recognizer, trace, json)?;

    let remaining = Rc::new(Cell::new(trace.events.len()));
    for event in &trace.events {
        let input = event.to_input();
        let remaining = remaining.clone();
        handle
            .insert_source(Timer::from_deadline(epoch + event.time()), move |_, _, host: &mut ReplayHost| {
                match input.clone() {
                    TraceInput::Pointer(pointer) => {
                        host.recognizer.handle_pointer(pointer);
                    }
                    TraceInput::Wheel(wheel) => {
                        host.recognizer.handle_wheel(wheel);
                    }
                }
                remaining.set(remaining.get() - 1);
                TimeoutAction::Drop
            })
            .map_err(|e| anyhow::anyhow!("Failed to insert trace timer: {:?}", e.error))?;
    }

    let mut host = ReplayHost {
        recognizer,
        remaining,
    };

    info!(events = trace.events.len(), "Replaying on the event loop");
    // A trace that never lifts its last contact leaves nothing scheduled
    while host.remaining.get() > 0 || host.recognizer.scheduler().pending() > 0 {
        event_loop
            .dispatch(Some(FRAME_INTERVAL), &mut host)
            .context("Event loop dispatch failed")?;
    }

    info!(elapsed = ?clock.now(), "Replay finished");
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = RecognitionConfig::load(path).with_context(|| format!("Invalid config {}", path.display()))?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
