//! Command line interface for the Rice binding generator.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use ricegen::config::CONFIG_FILE_NAME;
use ricegen::diagnostics::Severity;
use ricegen::discovery::discover_headers;
use ricegen::emit::EmitOptions;
use ricegen::output::{OutputWriter, write_report};
use ricegen::{ExitCode, GenerateError, GenerateResult, Generator, ProviderFactory, Settings};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Rice binding generator
#[derive(Parser)]
#[command(
    name = "ricegen",
    version = env!("CARGO_PKG_VERSION"),
    about = "Generate Rice (Ruby) binding code from C and C++ headers",
    next_line_help = true
)]
struct Cli {
    /// Path to a custom ricegen.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default ricegen.toml in the current directory
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Generate binding units for the given headers
    Generate {
        /// Headers in include order; defaults to the configured input
        headers: Vec<PathBuf>,

        /// Output directory, overriding output.dir
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Project name for the aggregate Init function, overriding `project`
        #[arg(short, long)]
        project: Option<String>,

        /// Write the exclusion report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Run the whole pipeline without writing any file
        #[arg(long)]
        dry_run: bool,
    },

    /// Display the effective settings
    Config,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match &cli.command {
        Commands::Init { force } => init(*force),
        Commands::Config => match show_config(cli.config.as_deref()) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::ConfigError
            }
        },
        Commands::Generate {
            headers,
            output,
            project,
            report,
            dry_run,
        } => {
            let request = Request {
                headers,
                output: output.as_deref(),
                project: project.as_deref(),
                report: report.as_deref(),
                dry_run: *dry_run,
            };
            match generate(cli.config.as_deref(), request) {
                Ok(code) => code,
                Err(e) => report_error(&e),
            }
        }
    };
    code.into()
}

struct Request<'a> {
    headers: &'a [PathBuf],
    output: Option<&'a Path>,
    project: Option<&'a str>,
    report: Option<&'a Path>,
    dry_run: bool,
}

fn load_settings(config: Option<&Path>) -> GenerateResult<Settings> {
    let settings = match config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    Ok(settings)
}

fn generate(config: Option<&Path>, request: Request<'_>) -> GenerateResult<ExitCode> {
    let mut settings = load_settings(config)?;
    if let Some(output) = request.output {
        settings.output.dir = output.to_path_buf();
    }
    if let Some(project) = request.project {
        settings.project = Some(project.to_string());
    }

    let rules = settings.compile_rules()?;
    let headers = discover_headers(&settings.input, request.headers)?;
    let factory = ProviderFactory::from_settings(&settings);
    let generation = Generator::new(&rules)
        .with_options(EmitOptions {
            include_prefix: settings.output.include_prefix.clone(),
        })
        .with_project(settings.project.clone())
        .run(&factory, &headers)?;

    for diagnostic in generation.diagnostics.iter() {
        if diagnostic.severity >= Severity::Warning {
            eprintln!("{diagnostic}");
        }
    }
    for entry in &generation.report.excluded {
        let location = match (&entry.header, entry.line) {
            (Some(header), Some(line)) => format!(" ({header}:{line})"),
            (Some(header), None) => format!(" ({header})"),
            _ => String::new(),
        };
        match &entry.reason {
            Some(reason) => eprintln!("excluded {} {}{location}: {} - {reason}", entry.kind, entry.name, entry.verdict),
            None => eprintln!("excluded {} {}{location}: {}", entry.kind, entry.name, entry.verdict),
        }
    }

    if let Some(path) = request.report {
        write_report(path, &generation.report)?;
        eprintln!("Wrote report to {}", path.display());
    }

    if request.dry_run {
        eprintln!(
            "Dry run: {} units from {} headers, {} declarations excluded",
            generation.units.len(),
            generation.stats.headers,
            generation.stats.excluded
        );
    } else {
        let writer = OutputWriter::new(&settings.output.dir, &settings.output.extension);
        let summary = writer.write(&generation)?;
        eprintln!(
            "Generated {} files ({} unchanged) in {}",
            summary.total(),
            summary.unchanged.len(),
            writer.dir().display()
        );
    }

    let code = ExitCode::from_run(generation.has_errors());
    if !code.is_success() {
        eprintln!("{}", code.description());
    }
    Ok(code)
}

fn init(force: bool) -> ExitCode {
    match Settings::init_config_file(".", force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            ExitCode::Success
        }
        Err(e) => report_error(&GenerateError::Config(e)),
    }
}

fn show_config(config: Option<&Path>) -> anyhow::Result<()> {
    let settings = match config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Settings::load().with_context(|| format!("Failed to load {CONFIG_FILE_NAME}"))?,
    };
    let text = toml::to_string_pretty(&settings).context("Failed to serialize settings")?;
    println!("{text}");
    Ok(())
}

fn report_error(error: &GenerateError) -> ExitCode {
    eprintln!("Error [{}]: {error}", error.status_code());
    for suggestion in error.recovery_suggestions() {
        eprintln!("  hint: {suggestion}");
    }
    ExitCode::from_error(error)
}
