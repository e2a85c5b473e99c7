//! Protoscope CLI - infer protocol definitions from captured serial traffic

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use protoscope_core::cli::{
    print_exit_codes, render_analysis, render_definition, render_frames, CliResult, ExitCodes,
    OutputFormat,
};
use protoscope_core::config::{default_config_path, init_directories, AnalyzerConfig};
use protoscope_core::core::codec;
use protoscope_core::core::splitter::{self, EmptyEntries, DEFAULT_CANDIDATES};
use protoscope_core::{loader, Analyzer, DefinitionGenerator, LogData, ProtocolDefinition};

/// Protoscope CLI
#[derive(Parser, Debug)]
#[command(
    name = "protoscope",
    version,
    about = "Infer message structure from captured serial traffic",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Analyzer settings (TOML); defaults to the user config file when present
    #[arg(short, long, env = "PROTOSCOPE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Emit diagnostics as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a capture and optionally write its protocol definition
    Analyze {
        /// Capture file (hex dump, pure hex or plain text)
        log: PathBuf,

        /// Write the definition here (.json, .yaml or .yml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Device name recorded in the definition
        #[arg(long)]
        device_name: Option<String>,
    },

    /// Show how a capture splits into frames
    Frames {
        /// Capture file
        log: PathBuf,

        /// Explicit terminator, escaped (e.g. "\r\n", "\x03")
        #[arg(short, long)]
        terminator: Option<String>,
    },

    /// Display a saved protocol definition
    Show {
        /// Definition file (.json, .yaml or .yml)
        definition: PathBuf,
    },

    /// Print the effective analyzer configuration
    Config {
        /// Write the default configuration to the user config file
        #[arg(long)]
        init: bool,
    },

    /// List exit codes
    ExitCodes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = run(&cli).unwrap_or_else(CliResult::from);
    match &result {
        CliResult::Error(_, msg) => eprintln!("error: {msg}"),
        CliResult::Success(Some(msg)) if !cli.quiet => eprintln!("{msg}"),
        CliResult::Success(_) => {}
    }
    result.to_exit_code()
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: &Cli) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::Analyze { log, output, device_name } => {
            analyze(cli, log, output.as_deref(), device_name.as_deref())
        }
        Commands::Frames { log, terminator } => frames(cli, log, terminator.as_deref()),
        Commands::Show { definition } => show(cli, definition),
        Commands::Config { init } => show_config(cli, *init),
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalyzerConfig> {
    match &cli.config {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => AnalyzerConfig::load_default().context("loading default config"),
    }
}

fn load_log(path: &Path) -> anyhow::Result<LogData> {
    let loaded = loader::load_file(path).with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(format = %loaded.format, bytes = loaded.bytes.len(), "Capture loaded");
    Ok(loaded.into_log_data(DEFAULT_CANDIDATES))
}

fn analyze(
    cli: &Cli,
    log_path: &Path,
    output: Option<&Path>,
    device_name: Option<&str>,
) -> anyhow::Result<CliResult> {
    let config = load_config(cli)?;
    let log = load_log(log_path)?;
    let analyzer = Analyzer::new(config);
    let result = analyzer.analyze(&log);

    if !cli.quiet || cli.format == OutputFormat::Json {
        print!("{}", render_analysis(&result, cli.format)?);
        if cli.format == OutputFormat::Json {
            println!();
        }
    }

    if result.message_count == 0 || result.confidence == 0.0 {
        return Ok(CliResult::insufficient_data(format!(
            "no structure found in {}",
            log_path.display()
        )));
    }

    if let Some(path) = output {
        let mut generator = DefinitionGenerator::new(&analyzer.config().definition);
        if let Some(name) = device_name {
            generator = generator.with_device_name(name);
        }
        let definition = generator.generate(&result, &log)?;
        definition.save(path)?;
        return Ok(CliResult::success_with_message(format!(
            "Definition written to {}",
            path.display()
        )));
    }

    Ok(CliResult::success())
}

fn frames(cli: &Cli, log_path: &Path, terminator: Option<&str>) -> anyhow::Result<CliResult> {
    let loaded = loader::load_file(log_path).with_context(|| format!("loading {}", log_path.display()))?;

    let frames = match terminator {
        Some(escaped) => {
            let bytes = codec::unescape(escaped).context("parsing --terminator")?;
            if bytes.is_empty() {
                return Ok(CliResult::error(
                    ExitCodes::INVALID_ARGS,
                    "terminator must not be empty",
                ));
            }
            splitter::split(&loaded.bytes, &bytes, EmptyEntries::Skip)
        }
        None => {
            let (chosen, frames) = splitter::frames(&loaded.bytes, DEFAULT_CANDIDATES);
            if let Some(idx) = chosen {
                tracing::info!(terminator = %codec::escape(DEFAULT_CANDIDATES[idx]), "Framing terminator chosen");
            }
            frames
        }
    };

    print!("{}", render_frames(&frames, cli.format)?);
    Ok(CliResult::success())
}

fn show(cli: &Cli, path: &Path) -> anyhow::Result<CliResult> {
    let definition = ProtocolDefinition::load(path)?;
    print!("{}", render_definition(&definition, cli.format)?);
    if cli.format == OutputFormat::Json {
        println!();
    }
    Ok(CliResult::success())
}

fn show_config(cli: &Cli, init: bool) -> anyhow::Result<CliResult> {
    if init {
        let Some(path) = default_config_path() else {
            return Ok(CliResult::error(
                ExitCodes::CONFIG_ERROR,
                "no configuration directory on this platform",
            ));
        };
        if path.exists() {
            return Ok(CliResult::error(
                ExitCodes::CONFIG_ERROR,
                format!("{} already exists", path.display()),
            ));
        }
        init_directories().context("creating config directory")?;
        AnalyzerConfig::default().save(&path)?;
        return Ok(CliResult::success_with_message(format!(
            "Default configuration written to {}",
            path.display()
        )));
    }

    let config = load_config(cli)?;
    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        if let Some(path) = cli.config.clone().or_else(default_config_path) {
            println!("# {}", path.display());
        }
        print!("{}", config.to_toml()?);
    }
    Ok(CliResult::success())
}
