//! GPU Fan Control CLI
//!
//! Command-line interface for running and inspecting the GPU-driven chassis fan controller.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};

use gpu_fan_control::config::{FanConfig, TelemetryBackend};
use gpu_fan_control::cooling::{ControlLoop, ExponentialCurve, FanDutyCycle, Shutdown, Smoother};
use gpu_fan_control::device::{
    DryRunSink, FanSink, IpmiTool, TemperatureSource, locate_program, open_temperature_source,
    running_as_root,
};
use gpu_fan_control::storage;
use gpu_fan_control::utils::parsing::{parse_preset, parse_zone_list};
use gpu_fan_control::utils::sensors::SystemSensors;

// =============================================================================
// CLI Arguments
// =============================================================================

/// GPU temperature driven IPMI fan controller
#[derive(Parser, Debug)]
#[command(name = "gpu-fan-control")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the fan control loop until interrupted
    Run {
        /// Config file (default: ~/.config/gpu-fan-control/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use a built-in preset instead of the config file: quiet, conservative
        #[arg(short, long)]
        preset: Option<String>,

        /// Log fan changes without calling ipmitool
        #[arg(long)]
        dry_run: bool,

        /// Override the fan zones, e.g. 0x00,0x01
        #[arg(short, long)]
        zones: Option<String>,

        /// Start even without root or with the telemetry or IPMI tool missing from PATH
        #[arg(long)]
        skip_preflight: bool,
    },

    /// Read GPU temperatures once and show the duty the curve would choose
    Status {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the fan zones, e.g. 0x00,0x01
        #[arg(short, long)]
        zones: Option<String>,
    },

    /// Set a fixed fan duty on every configured zone
    SetFan {
        /// Duty cycle percentage (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        duty: u8,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the fan zones, e.g. 0x00,0x01
        #[arg(short, long)]
        zones: Option<String>,

        /// Skip the root check
        #[arg(long)]
        skip_preflight: bool,
    },

    /// Print the temperature to duty table of the configured curve
    Curve {
        /// Temperature step in degrees
        #[arg(short, long, default_value = "2")]
        step: f32,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tabulate a built-in preset instead
        #[arg(short, long)]
        preset: Option<String>,
    },

    /// Diagnostic: List all available system sensors
    Sensors,

    /// Write a config file with defaults or a preset
    InitConfig {
        /// Preset to write: quiet, conservative
        #[arg(short, long, default_value = "quiet")]
        preset: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Destination (default: ~/.config/gpu-fan-control/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the effective configuration
    ShowConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    match args.command {
        Command::Run {
            config,
            preset,
            dry_run,
            zones,
            skip_preflight,
        } => cmd_run(
            config.as_deref(),
            preset.as_deref(),
            zones.as_deref(),
            dry_run,
            skip_preflight,
        ),
        Command::Status { config, zones } => cmd_status(config.as_deref(), zones.as_deref()),
        Command::SetFan {
            duty,
            config,
            zones,
            skip_preflight,
        } => cmd_set_fan(duty, config.as_deref(), zones.as_deref(), skip_preflight),
        Command::Curve {
            step,
            config,
            preset,
        } => cmd_curve(step, config.as_deref(), preset.as_deref()),
        Command::Sensors => cmd_sensors(),
        Command::InitConfig {
            preset,
            force,
            config,
        } => cmd_init_config(&preset, force, config.as_deref()),
        Command::ShowConfig { config } => cmd_show_config(config.as_deref()),
    }
}

// =============================================================================
// Config Helpers
// =============================================================================

/// Resolve and validate the configuration. A preset wins over any file,
/// `zones` overrides the configured fan zones.
fn load_config(
    path: Option<&Path>,
    preset: Option<&str>,
    zones: Option<&str>,
) -> Result<FanConfig> {
    let mut config = match preset {
        Some(name) => parse_preset(name)?.to_config(),
        None => {
            let (config, source) =
                storage::resolve_config(path).context("Failed to load configuration")?;
            match source {
                Some(p) => info!("Loaded configuration from {}", p.display()),
                None => info!("No config file found, using defaults"),
            }
            config
        }
    };

    if let Some(list) = zones {
        config.ipmi.zones = parse_zone_list(list)?;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// `ipmitool raw` fails without root.
fn require_root() -> Result<()> {
    if !running_as_root() {
        bail!("Fan control requires root (run with sudo, or use --dry-run / --skip-preflight)");
    }
    Ok(())
}

/// Fail early without root or when a required external tool is missing.
fn preflight(config: &FanConfig, dry_run: bool) -> Result<()> {
    if !dry_run {
        require_root()?;
    }

    let mut required = Vec::new();
    if config.telemetry.backend != TelemetryBackend::Sysinfo {
        required.push(config.telemetry.program());
    }
    if !dry_run {
        required.push(config.ipmi.program.as_str());
    }

    for program in required {
        match locate_program(program) {
            Some(path) => info!("Found {} at {}", program, path.display()),
            None => bail!(
                "'{}' not found on PATH (use --skip-preflight to start anyway)",
                program
            ),
        }
    }
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_run(
    path: Option<&Path>,
    preset: Option<&str>,
    zones: Option<&str>,
    dry_run: bool,
    skip_preflight: bool,
) -> Result<()> {
    let config = load_config(path, preset, zones)?;

    if skip_preflight {
        warn!("Skipping tool preflight");
    } else {
        preflight(&config, dry_run)?;
    }

    let source = open_temperature_source(&config.telemetry);
    let sink: Box<dyn FanSink> = if dry_run {
        Box::new(DryRunSink::new())
    } else {
        Box::new(IpmiTool::from_config(&config.ipmi))
    };

    // Setup Ctrl+C handler
    let shutdown = Shutdown::new();
    let s = shutdown.clone();
    ctrlc::set_handler(move || {
        s.trigger();
    })
    .context("Failed to set Ctrl+C handler")?;

    info!(
        "Curve {:.0}-{:.0}°C -> {}-{}%, factor {}, hysteresis {}%, smoothing {} samples ({})",
        config.temp_low,
        config.temp_high,
        config.min_speed,
        config.max_speed,
        config.exponential_factor,
        config.hysteresis,
        config.smoothing_samples,
        config.aggregation
    );
    info!("Fan zones: {:02x?}", config.ipmi.zones);

    let mut control = ControlLoop::new(&config, source, sink);
    control.run(&shutdown);

    println!(
        "\n✅ Fan control stopped after {} cycles (last duty {}).",
        control.state().cycles,
        control.state().last_applied
    );
    Ok(())
}

fn cmd_status(path: Option<&Path>, zones: Option<&str>) -> Result<()> {
    let config = load_config(path, None, zones)?;
    let curve = ExponentialCurve::from_config(&config);

    let mut source = open_temperature_source(&config.telemetry);
    let samples = source
        .read()
        .with_context(|| format!("Failed to read temperatures from {}", source.name()))?;

    println!("📊 GPU Temperatures ({})", source.name());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for sample in &samples {
        println!("   {:<24} {:>6.1}°C", sample.device_id, sample.celsius);
    }

    // Single-sample window: driving temperature is the plain aggregate
    let mut smoother = Smoother::new(1, config.aggregation);
    if let Some(smoothed) = smoother.update(&samples) {
        println!(
            "   {:<24} {:>6.1}°C",
            format!("Driving ({})", smoothed.aggregation),
            smoothed.driving
        );
        println!("   {:<24} {:>7}", "Curve duty", curve.speed(smoothed.driving).to_string());
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let ipmi = IpmiTool::from_config(&config.ipmi);
    for &zone in ipmi.zones() {
        match ipmi.read_duty(zone) {
            Ok(duty) => println!("   Zone 0x{:02x}                {:>6}%", zone, duty),
            Err(e) => println!("   Zone 0x{:02x}                ⚠️  {}", zone, e),
        }
    }

    Ok(())
}

fn cmd_set_fan(
    duty: u8,
    path: Option<&Path>,
    zones: Option<&str>,
    skip_preflight: bool,
) -> Result<()> {
    let config = load_config(path, None, zones)?;
    if !skip_preflight {
        require_root()?;
    }
    let mut ipmi = IpmiTool::from_config(&config.ipmi);
    let duty = FanDutyCycle::from_percent(f32::from(duty));

    ipmi.apply(duty)
        .with_context(|| format!("Failed to set fan duty to {}", duty))?;
    println!("✅ Fan duty set to {} on zones {:02x?}", duty, ipmi.zones());
    Ok(())
}

fn cmd_curve(step: f32, path: Option<&Path>, preset: Option<&str>) -> Result<()> {
    if !step.is_finite() || step <= 0.0 {
        bail!("Step must be a positive number of degrees");
    }

    let config = load_config(path, preset, None)?;
    let curve = ExponentialCurve::from_config(&config);

    println!(
        "Curve: {:.1}-{:.1}°C -> {}-{}%, factor {}",
        config.temp_low, config.temp_high, config.min_speed, config.max_speed, config.exponential_factor
    );
    println!("{:>8} | {:>8} | {:>5}", "Temp", "Duty", "Raw");
    println!("{}", "─".repeat(28));
    for (temp, duty) in curve.table(step) {
        println!("{:>6.1}°C | {:>8} | 0x{:02x}", temp, duty.to_string(), duty.raw());
    }
    Ok(())
}

fn cmd_sensors() -> Result<()> {
    println!("🔍 Scanning for system sensors...");
    let sensors = SystemSensors::new();
    let count = sensors.count();

    if count == 0 {
        println!("❌ No sensors detected. (Is the GPU driver's hwmon interface loaded?)");
        return Ok(());
    }

    println!("✅ Found {} sensors:\n", count);
    println!("{:<40} | {:<12} | {:<10} | {:<10}", "Label", "Id", "Temp", "Critical");
    println!("{}", "─".repeat(81));

    let all_sensors = sensors.list_all();
    for sensor in &all_sensors {
        let temperature = sensor
            .temperature
            .map(|t| format!("{:.1}°C", t))
            .unwrap_or_else(|| "-".to_string());
        let critical = sensor
            .critical
            .map(|c| format!("{:.1}°C", c))
            .unwrap_or_else(|| "-".to_string());

        let prefix = if sensor.is_gpu() { "👉" } else { "  " };

        println!(
            "{} {:<40} | {:<12} | {:<10} | {}",
            prefix,
            sensor.label,
            sensor.id.as_deref().unwrap_or("-"),
            temperature,
            critical
        );
    }

    println!("{}", "─".repeat(81));
    if all_sensors.iter().any(|s| s.is_gpu()) {
        println!("👉 = Sensor used by the sysinfo telemetry backend");
    } else {
        println!("⚠️  Warning: No sensor matches a GPU label; the sysinfo backend would fail.");
    }

    Ok(())
}

fn cmd_init_config(preset: &str, force: bool, path: Option<&Path>) -> Result<()> {
    let config = parse_preset(preset)?.to_config();
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => storage::get_config_path()?,
    };

    if force {
        storage::save_config(&path, &config)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else if !storage::ensure_config_exists(&path, &config)
        .with_context(|| format!("Failed to write {}", path.display()))?
    {
        println!("⚠️  {} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }

    println!("✅ Wrote '{}' preset to {}", preset, path.display());
    Ok(())
}

fn cmd_show_config(path: Option<&Path>) -> Result<()> {
    let (config, source) =
        storage::resolve_config(path).context("Failed to load configuration")?;

    match source {
        Some(p) => println!("# {}", p.display()),
        None => println!("# built-in defaults"),
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?
    );

    if let Err(e) = config.validate() {
        println!("\n⚠️  Invalid: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> FanConfig {
        let mut config = FanConfig::default();
        config.telemetry.backend = TelemetryBackend::Sysinfo;
        config.ipmi.program = "/nonexistent/ipmitool".into();
        config
    }

    #[test]
    fn test_dry_run_preflight_needs_neither_root_nor_ipmitool() {
        assert!(preflight(&offline_config(), true).is_ok());
    }

    #[test]
    fn test_live_preflight_requires_root_and_ipmitool() {
        // Unprivileged: root check fails. Root: the missing tool fails.
        assert!(preflight(&offline_config(), false).is_err());
        assert_eq!(require_root().is_ok(), running_as_root());
    }

    #[test]
    fn test_zone_override_replaces_configured_zones() {
        let config = load_config(None, Some("quiet"), Some("0x00, 1")).unwrap();
        assert_eq!(config.ipmi.zones, vec![0x00, 0x01]);

        assert!(load_config(None, Some("quiet"), Some("fan0")).is_err());
    }
}
