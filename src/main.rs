//! corebench - command line front end

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use corebench::config::{self, Config};
use corebench::device::DeviceInfo;
use corebench::{report, BenchmarkSession, GateAction, RunOptions, ThermalCapability};

/// corebench - calibrated CPU, memory and rendering benchmark
#[derive(Parser)]
#[command(name = "corebench")]
#[command(author = "ForgeMyPC")]
#[command(version)]
#[command(about = "Measure CPU and memory performance against a fixed baseline device")]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full benchmark (default)
    Run(RunArgs),

    /// Show the detected CPU and thermal sensor support
    Detect,

    /// Show configuration file location
    Config {
        /// Write a config file with default values if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Timed iterations per loop
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Untimed warm-up passes
    #[arg(long)]
    warmup: Option<usize>,

    /// Worker threads for the multi-core loop
    #[arg(short, long)]
    threads: Option<usize>,

    /// What to do when the device is already warm
    #[arg(long, value_enum)]
    gate_action: Option<GateAction>,

    /// Also run the rendering suite
    #[arg(long)]
    render: bool,

    /// Print the result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(iterations) = self.iterations {
            config.suite.iterations = iterations;
        }
        if let Some(warmup) = self.warmup {
            config.suite.warmup_passes = warmup;
        }
        if let Some(threads) = self.threads {
            config.suite.threads = Some(threads);
        }
        if let Some(action) = self.gate_action {
            config.gate.action = action;
        }
        if self.render {
            config.render.enabled = true;
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Run(args)) => run(&args),
        None => run(&RunArgs::default()),
        Some(Commands::Detect) => detect(),
        Some(Commands::Config { init }) => show_config_info(init),
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let mut config = Config::load()?;
    args.apply(&mut config);
    config.validate().context("Invalid benchmark settings")?;

    let options = RunOptions {
        // Keep stdout clean for machine-readable output.
        quiet: args.quiet || args.json,
        progress: None,
    };

    if !options.quiet {
        println!("{}", "Running benchmark, please keep the device idle...".bright_cyan());
    }

    let result = BenchmarkSession::new(config).run(&options);

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        println!("{json}");
    } else {
        report::print(&result);
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn detect() -> Result<()> {
    let device = DeviceInfo::detect().context("Failed to detect CPU")?;

    println!("{}", "Device\n".bright_cyan().bold());
    println!("{} {}", "CPU:".bright_yellow(), device.summary().bright_white());
    println!("  {} {}", "Vendor:".bright_cyan(), device.vendor);
    if let Some(freq) = device.frequency_mhz {
        println!("  {} {} MHz", "Clock:".bright_cyan(), freq);
    }
    if let Some(max) = device.max_frequency_mhz {
        println!("  {} {} MHz", "Max Clock:".bright_cyan(), max);
    }
    println!(
        "  {} {:.1} GB",
        "RAM:".bright_cyan(),
        device.total_memory_mb as f64 / 1024.0
    );
    match &device.os_version {
        Some(version) => println!("  {} {} {}", "OS:".bright_cyan(), device.os, version),
        None => println!("  {} {}", "OS:".bright_cyan(), device.os),
    }

    let capability = ThermalCapability::probe();
    println!();
    println!("{} {:?}", "Thermal:".bright_yellow(), capability);
    if capability.is_available() {
        println!("  {} {}", "Status:".bright_cyan(), capability.query());
    } else {
        println!(
            "  {} {}",
            "Status:".bright_cyan(),
            "No sensor found (the thermal gate will always pass)".bright_yellow()
        );
    }

    Ok(())
}

fn show_config_info(init: bool) -> Result<()> {
    println!("{}", "corebench Configuration\n".bright_cyan().bold());

    let path = config::get_config_path()?;
    println!("{} {}", "Config file:".bright_yellow(), path.bright_white());

    if init {
        Config::init()?;
    }

    if std::path::Path::new(&path).exists() {
        println!("  {} {}", "Status:".bright_cyan(), "Exists".bright_green());
    } else {
        println!(
            "  {} {}",
            "Status:".bright_cyan(),
            "Not created yet (will use defaults). Run `corebench config --init` to create it."
                .bright_yellow()
        );
    }

    let cfg = Config::load()?;
    println!();
    println!("{}", "Effective settings:".bright_yellow());
    println!("  {} {}", "Iterations:".bright_cyan(), cfg.suite.iterations);
    println!("  {} {}", "Warm-up passes:".bright_cyan(), cfg.suite.warmup_passes);
    println!(
        "  {} {}",
        "Threads:".bright_cyan(),
        cfg.suite.threads.map_or_else(|| "auto".to_string(), |t| t.to_string())
    );
    println!("  {} {:?}", "Gate action:".bright_cyan(), cfg.gate.action);
    println!("  {} {}", "Rendering:".bright_cyan(), cfg.render.enabled);

    Ok(())
}
