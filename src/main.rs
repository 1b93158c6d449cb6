//! # winmirror - live window mirroring session
//!
//! Drives a capture session over the headless engine: every window the
//! engine reports is scheduled for periodic capture, and a small simulation
//! moves the cursor and resizes windows so the texture swap protocol gets
//! exercised.

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winmirror::engine::headless::HeadlessEngine;
use winmirror::engine::Point;
use winmirror::{Session, SessionCommand, SessionConfig};

#[derive(Parser)]
#[command(name = "winmirror")]
#[command(about = "Mirror live window contents into double-buffered capture textures")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/winmirror/winmirror.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Stop after this many ticks (runs until Ctrl+C otherwise)
    #[arg(long)]
    ticks: Option<u64>,

    /// Tick interval in milliseconds
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Number of simulated top-level windows
    #[arg(long, default_value_t = 3)]
    windows: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so `[general] debug` can raise the filter
    let loaded = SessionConfig::load(&cli.config);
    let verbose = wants_debug(&cli, loaded.as_ref().ok());

    // Initialize logging
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("🚀 Starting winmirror");
    info!("📄 Version: {}", winmirror::VERSION);
    if let (Some(date), Some(commit)) = (option_env!("BUILD_DATE"), option_env!("GIT_COMMIT")) {
        debug!("Built {} from {}", date, commit);
    }

    let config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            SessionConfig::default()
        }
    };

    let engine = Arc::new(HeadlessEngine::with_demo_windows(cli.windows));
    let mut session = Session::new(config, engine.clone(), engine.clone())?;

    let commands = session.commands();
    session.on_window_added(move |window| {
        info!(
            "🪟 Window {} added: \"{}\" {}x{}",
            window.id(),
            window.title(),
            window.width(),
            window.height()
        );
        commands.push(SessionCommand::Schedule {
            id: window.id(),
            schedule: None,
        });
        commands.push(SessionCommand::RequestCaptureIcon(window.id()));
    });
    session.on_window_removed(|window| info!("🗑️ Window {} removed", window.id()));
    session.on_desktop_added(|desktop| {
        info!("🖥️ Desktop {} added: {:?}", desktop.id(), desktop.raw_rect())
    });
    session.on_desktop_removed(|desktop| info!("🖥️ Desktop {} removed", desktop.id()));

    info!("✨ winmirror is running; press Ctrl+C to stop");

    let mut interval = tokio::time::interval(Duration::from_millis(cli.tick_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last = Instant::now();
    let mut tick: u64 = 0;
    let mut captures = 0usize;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f32();
                last = now;

                simulate(&engine, tick);
                let report = session.update(dt);
                captures += report.captures_completed;
                if report.messages > 0 {
                    debug!("Tick {}: {:?}", tick, report);
                }

                tick += 1;
                if cli.ticks.is_some_and(|limit| tick >= limit) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("🛑 Ctrl+C received");
                break;
            }
        }
    }

    info!("📊 {} ticks, {} captures completed", tick, captures);
    for window in session.windows() {
        info!(
            "  {} {:?} \"{}\": {} captures, texture {:?}",
            window.id(),
            window.kind(),
            window.title(),
            engine.capture_count(window.id()),
            window.texture_size()
        );
    }

    info!("👋 winmirror shutting down");
    Ok(())
}

/// `--debug` or `[general] debug` in the loaded config.
fn wants_debug(cli: &Cli, config: Option<&SessionConfig>) -> bool {
    cli.debug || config.is_some_and(|config| config.general.debug)
}

/// Wander the cursor across the screen and periodically resize the
/// front-most window.
fn simulate(engine: &HeadlessEngine, tick: u64) {
    use winmirror::CaptureEngine;

    let screen = engine.screen_rect();
    let x = ((tick * 7) % screen.width.max(1) as u64) as i32;
    let y = ((tick * 3) % screen.height.max(1) as u64) as i32;
    engine.set_cursor(Point { x, y }, (32, 32));

    if tick > 0 && tick % 120 == 0 {
        if let Some(id) = engine.window_id_from_point(Point { x: 100, y: 100 }) {
            let (width, height) = engine.window_texture_size(id);
            let grow = if (tick / 120) % 2 == 0 { 16 } else { 0 };
            engine.resize_window(id, width + grow, height + 16 - grow);
            debug!("Simulated resize of window {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["winmirror"]).unwrap();
        assert!(!cli.debug);
        assert_eq!(cli.tick_ms, 16);
        assert_eq!(cli.windows, 3);
        assert!(cli.ticks.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "winmirror",
            "--debug",
            "--ticks",
            "10",
            "--tick-ms",
            "5",
            "--windows",
            "7",
            "--config",
            "/tmp/wm.toml",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.ticks, Some(10));
        assert_eq!(cli.tick_ms, 5);
        assert_eq!(cli.windows, 7);
        assert_eq!(cli.config, "/tmp/wm.toml");
    }

    #[test]
    fn test_config_debug_enables_debug_logging() {
        let cli = Cli::try_parse_from(["winmirror"]).unwrap();
        let mut config = SessionConfig::default();
        assert!(!wants_debug(&cli, Some(&config)));
        assert!(!wants_debug(&cli, None));

        config.general.debug = true;
        assert!(wants_debug(&cli, Some(&config)));

        let cli = Cli::try_parse_from(["winmirror", "--debug"]).unwrap();
        assert!(wants_debug(&cli, None));
    }

    #[test]
    fn test_simulation_keeps_cursor_on_screen() {
        use winmirror::CaptureEngine;

        let engine = HeadlessEngine::with_demo_windows(2);
        for tick in 0..1000 {
            simulate(&engine, tick);
            assert!(engine.screen_rect().contains(engine.cursor_position()));
        }
    }
}
