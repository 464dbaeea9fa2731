// BDM Knowledge Headless Installer
// Main library entry point

pub mod api;
pub mod persist;
pub mod poll;
pub mod settings;
pub mod tui;
pub mod utils;
pub mod wizard;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::api::HttpApi;
use crate::persist::StateStore;
use crate::settings::Settings;
use crate::wizard::Wizard;

/// Initialize logging system with dual format (JSON + human-readable)
fn init_logging(with_stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = resolve_log_folder()?;
    std::fs::create_dir_all(&log_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("installer-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("installer-{}.txt", timestamp));

    // Configure dual-format logging:
    // - JSON format to .log file
    // - Human-readable format to .txt file
    // - Optional: human-readable to stdout (disabled for TUI to avoid corrupting the terminal UI)
    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

/// Log folder lives next to the wizard state so a support bundle is one
/// directory.
fn resolve_log_folder() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base = dirs::config_dir().ok_or("No config directory available for this user")?;
    Ok(base.join("bdm-installer").join("logs"))
}

fn build_wizard() -> anyhow::Result<Wizard> {
    let settings = Settings::load()?;
    info!(
        "[PHASE: initialization] [STEP: settings] Backend {} (api base {}), timeout {}s",
        settings.api_base_url, settings.api_base, settings.request_timeout_secs
    );

    let api = Arc::new(HttpApi::new(&settings)?);
    let state_path = match settings.state_file {
        Some(path) => path,
        None => StateStore::default_path()?,
    };
    let store = StateStore::new(state_path);
    Ok(Wizard::new(api, store))
}

/// Headless TUI installer entry point.
pub fn run_tui() {
    // Initialize logging (no stdout to avoid corrupting the TUI)
    if let Err(e) = init_logging(false) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Headless TUI installer starting at {}",
        chrono::Utc::now()
    );

    let wizard = match build_wizard() {
        Ok(wizard) => wizard,
        Err(e) => {
            error!("[PHASE: initialization] Failed to initialize installer: {:#}", e);
            eprintln!("Failed to initialize installer: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tui::run(wizard) {
        error!("[PHASE: tui] TUI exited with error: {:#}", e);
        eprintln!("Installer TUI error: {:#}", e);
        std::process::exit(1);
    }

    info!("[PHASE: tui] [STEP: exit] Installer TUI exited cleanly");
}

/// Non-interactive TUI smoke test mode (for automated checks).
/// Renders a single frame for a specific page and exits 0.
pub fn run_tui_smoke(target: Option<String>) {
    // Initialize logging (no stdout to avoid corrupting the terminal)
    if let Err(e) = init_logging(false) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Headless TUI smoke starting at {}",
        chrono::Utc::now()
    );

    let target = target.unwrap_or_else(|| "language".to_string());
    match tui::smoke(&target) {
        Ok(()) => {
            println!("TUI smoke OK: rendered page '{}'", target);
        }
        Err(e) => {
            error!("[PHASE: tui] [STEP: smoke] Smoke render failed: {:#}", e);
            eprintln!("TUI smoke FAILED: {:#}", e);
            std::process::exit(1);
        }
    }
}
