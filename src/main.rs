#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use display_topology::config::Settings;
use display_topology::geometry::Size;
use display_topology::parse::modeline::{parse_modeline, RefreshContext};
use display_topology::query::Snapshot;
use display_topology::serialize::{serialize_metamode_with_header, serialize_modeline};
use display_topology::underscan::{apply_underscan, pixels_to_percent};
use display_topology::{build_layout, Layout};

#[derive(Parser, Debug)]
#[command(name = "dpytopo", version, about = "Inspect recorded display topology snapshots")]
struct Cli {
    /// Log level, overriding LOG_LEVEL and the settings file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Settings file to use instead of the one in the config directory
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the layout from a JSON snapshot and print every screen's metamodes
    Show { snapshot: PathBuf },

    /// Parse one modeline and print its canonical form and refresh rate
    Modeline {
        line: String,
        #[arg(long)]
        doublescan_in_vtotal: bool,
    },

    /// Print the ViewPortOut of an underscan of PIXELS on each side
    Underscan { width: i32, height: i32, pixels: i32 },
}

fn parse_level(level: &str) -> TraceLevel {
    match level.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn show(path: &Path, settings: &Settings) -> Result<()> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot from {:?}", path))?;
    let snapshot = Snapshot::from_json(&contents)
        .with_context(|| format!("Failed to parse snapshot {:?}", path))?;
    let outcome = build_layout(&snapshot, settings).context("Failed to build layout")?;
    if !outcome.warnings.is_empty() {
        warn!(count = outcome.warnings.len(), "Snapshot contained skipped records");
    }
    print_layout(&outcome.layout)
}

fn print_layout(layout: &Layout) -> Result<()> {
    for screen in layout.screens_by_number() {
        let Some(s) = layout.screen(screen) else {
            continue;
        };
        println!(
            "Screen {}: {}x{}+{}+{}",
            s.number, s.rect.width, s.rect.height, s.rect.x, s.rect.y
        );
        for display in &s.displays {
            if let Some(d) = layout.display(*display) {
                let primary = if s.primary_display == Some(*display) { " (primary)" } else { "" };
                println!(
                    "  {} [{}] {} modelines{}",
                    d.names.target_id,
                    d.names.randr,
                    d.modelines.len(),
                    primary
                );
            }
        }
        for index in 0..s.metamodes.len() {
            let marker = if s.cur_metamode == Some(index) { '*' } else { ' ' };
            let text = serialize_metamode_with_header(layout, screen, index)
                .with_context(|| format!("Failed to serialize metamode {} of screen {}", index, s.number))?;
            println!("  {} {}", marker, text);
        }
    }
    for aux in &layout.aux_displays {
        println!(
            "Auxiliary {}: {}x{}+{}+{}",
            aux.name.as_deref().unwrap_or("display"),
            aux.rect.width,
            aux.rect.height,
            aux.rect.x,
            aux.rect.y
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_result = match &cli.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .or_else(|| settings_result.as_ref().ok().map(|s| s.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&level))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let settings = settings_result?;
    info!(log_level = %level, verbose_warnings = settings.verbose_warnings, "Starting dpytopo");

    match cli.command {
        Command::Show { snapshot } => show(&snapshot, &settings)?,
        Command::Modeline {
            line,
            doublescan_in_vtotal,
        } => {
            let ctx = RefreshContext {
                serial_video: None,
                doublescan_in_vtotal: doublescan_in_vtotal || settings.doublescan_in_vtotal,
            };
            let modeline = parse_modeline(&line, &ctx).context("Failed to parse modeline")?;
            println!("{}", serialize_modeline(&modeline));
            if let Some(clock) = modeline.clock_mhz() {
                println!("{:.3} MHz", clock);
            }
            println!("{:.3} Hz", modeline.refresh_rate);
        }
        Command::Underscan {
            width,
            height,
            pixels,
        } => {
            let vpo = apply_underscan(Size::new(width, height), pixels);
            println!(
                "viewportout={}x{}+{}+{} ({:.2}%)",
                vpo.width,
                vpo.height,
                vpo.x,
                vpo.y,
                pixels_to_percent(width, pixels)
            );
        }
    }
    Ok(())
}
