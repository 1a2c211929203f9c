//! Command-line tools around the vsui synchronization library.
//!
//! Validates object maps, resolves mapped locators against recorded UI
//! snapshots and prints what a project wizard run is expected to produce.
//!
//! # Usage
//!
//! ```bash
//! # Validate an object map and list its locators
//! vsui check-map names.json
//!
//! # Resolve a mapped locator against a snapshot of the IDE
//! vsui find names.json snapshot.json options_OK_Button
//!
//! # Wait up to 2 seconds and target another process
//! vsui find names.json snapshot.json qt_cpp_Label -c QtWidgetsApplication1 -o 2000
//!
//! # Files a CMake-based Qt Widgets project must create
//! vsui expect "Qt Widgets Application" --workdir C:\work --cmake
//!
//! # Check them on disk after the scenario ran
//! vsui expect "Qt Widgets Application" --workdir C:\work --project QtWidgetsApplication3 --check
//!
//! # Show the suite environment
//! vsui --format json env
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use vsui_core::config::{parse_ide_version, SuiteConfig, VsuiConfig};
use vsui_core::context::{fix_app_context, IDE_CONTEXT_NAME};
use vsui_core::memory::MemoryDriver;
use vsui_core::object_map::{ObjectMap, ObjectMapError};
use vsui_core::project::{BuildSystem, ProjectError, ProjectExpectations, ProjectTemplate};
use vsui_core::wait::{wait_for_object, WaitError, WaitOptions};

/// Tools for GUI test object maps, UI snapshots and wizard expectations.
#[derive(Parser)]
#[command(name = "vsui")]
#[command(about = "Inspect object maps, UI snapshots and project wizard expectations")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an object map and list its locators
    CheckMap {
        /// Path to the object map JSON file
        map: PathBuf,
    },

    /// Resolve a mapped locator against a recorded UI snapshot
    Find {
        /// Path to the object map JSON file
        map: PathBuf,
        /// Path to the UI snapshot JSON file
        snapshot: PathBuf,
        /// Name of the locator in the map
        name: String,
        /// Application context to search
        #[arg(short, long, default_value = IDE_CONTEXT_NAME)]
        context: String,
        /// Timeout in milliseconds (0 evaluates once)
        #[arg(short = 'o', long, default_value = "0", env = "VSUI_TIMEOUT")]
        timeout: u64,
    },

    /// Print the files and build output a wizard run must produce
    Expect {
        /// Template name, e.g. "Qt Console Application" or ConsoleApplication
        template: String,
        /// Directory the project is created in
        #[arg(short, long, env = "SQUISH_VSTOOLS_WORKDIR")]
        workdir: PathBuf,
        /// Project name (defaults to the proposed name with suffix 1)
        #[arg(short, long)]
        project: Option<String>,
        /// Use the CMake build system instead of Qt/MSBuild
        #[arg(long)]
        cmake: bool,
        /// The solution has no x64 platform
        #[arg(long)]
        no_x64: bool,
        /// Fail if any expected file is missing on disk
        #[arg(long)]
        check: bool,
        /// IDE version the run targets, e.g. 16 or 17.9
        #[arg(long, env = "SQUISH_VSTOOLS_VERSION", value_parser = parse_ide_version_arg)]
        ide_version: Option<u32>,
    },

    /// Show the suite environment and timing settings
    Env,

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    /// A validation ran and found problems.
    CheckFailed(String),
    /// Unreadable or malformed input.
    Input(String),
    /// The requested element or context does not exist.
    NotFound(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::CheckFailed(_) => ExitCode::from(1),
            CliError::Input(_) => ExitCode::from(2),
            CliError::NotFound(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::CheckFailed(msg) => write!(f, "Check failed: {}", msg),
            CliError::Input(msg) => write!(f, "Invalid input: {}", msg),
            CliError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl From<ObjectMapError> for CliError {
    fn from(e: ObjectMapError) -> Self {
        match e {
            ObjectMapError::Io(_) | ObjectMapError::Json(_) | ObjectMapError::UnknownName(_) => {
                CliError::Input(e.to_string())
            }
            other => CliError::CheckFailed(other.to_string()),
        }
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::Input(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::CheckMap { ref map } => check_map(map, cli.format),
        Command::Find {
            ref map,
            ref snapshot,
            ref name,
            ref context,
            timeout,
        } => find(map, snapshot, name, context, timeout, cli.format).await,
        Command::Expect {
            ref template,
            ref workdir,
            ref project,
            cmake,
            no_x64,
            check,
            ide_version,
        } => {
            let template: ProjectTemplate = template
                .parse()
                .map_err(|e: ProjectError| CliError::Input(e.to_string()))?;
            let build_system = if cmake { BuildSystem::CMake } else { BuildSystem::MsBuild };
            let project = project.clone().unwrap_or_else(|| format!("{}1", template.expected_name()));
            let expectations = ProjectExpectations::new(workdir, &project, template, build_system, !no_x64, ide_version)
                .map_err(|e| CliError::CheckFailed(e.to_string()))?;
            expect(&expectations, check, cli.format)
        }
        Command::Env => env(cli.format),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "vsui", &mut io::stdout());
            Ok(())
        }
    }
}

fn check_map(path: &Path, format: OutputFormat) -> Result<(), CliError> {
    let map = ObjectMap::load(path)?;
    debug!(entries = map.len(), path = %path.display(), "object map valid");

    if format == OutputFormat::Json {
        let entries: Vec<serde_json::Value> = map
            .iter()
            .map(|(name, locator)| {
                serde_json::json!({
                    "name": name,
                    "depth": locator.depth(),
                    "locator": locator.describe(),
                })
            })
            .collect();
        print_json(&serde_json::json!({ "valid": true, "roots": map.roots(), "entries": entries }))
    } else {
        for (name, locator) in map.iter() {
            println!("{}: {}", name, locator);
        }
        eprintln!("{} locators, {} top-level", map.len(), map.roots().len());
        Ok(())
    }
}

async fn find(
    map: &Path,
    snapshot: &Path,
    name: &str,
    context: &str,
    timeout: u64,
    format: OutputFormat,
) -> Result<(), CliError> {
    let map = ObjectMap::load(map)?;
    let locator = map.get(name)?;
    let driver = MemoryDriver::load_snapshot(snapshot)
        .map_err(|e| CliError::Input(format!("{}: {}", snapshot.display(), e)))?;

    let ctx = fix_app_context(&driver, context)
        .await
        .map_err(|e| CliError::NotFound(e.to_string()))?;

    let options = WaitOptions::from_millis(timeout).interval(VsuiConfig::load().wait_options().interval);
    let element = wait_for_object(&driver, &ctx, &locator, options)
        .await
        .map_err(|e| match e {
            WaitError::ElementNotFound { .. } | WaitError::TimedOut { .. } => CliError::NotFound(e.to_string()),
            WaitError::Driver(d) => CliError::Input(d.to_string()),
        })?;

    if format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "name": name,
            "context": ctx,
            "locator": locator.describe(),
            "element": element,
        }))
    } else {
        println!("{}", element.describe());
        if let Some(text) = &element.text {
            println!("  text: {}", text);
        }
        if !element.enabled {
            println!("  disabled");
        }
        if !element.children.is_empty() {
            println!("  children: {}", element.children.len());
        }
        Ok(())
    }
}

fn parse_ide_version_arg(value: &str) -> Result<u32, String> {
    parse_ide_version(value).ok_or_else(|| format!("'{}' is not a version number", value))
}

fn expect(expectations: &ProjectExpectations, check: bool, format: OutputFormat) -> Result<(), CliError> {
    let missing: Vec<String> = if check {
        expectations.missing_files().iter().map(|p| p.display().to_string()).collect()
    } else {
        Vec::new()
    };

    if format == OutputFormat::Json {
        let mut value = serde_json::to_value(expectations).map_err(|e| CliError::Input(e.to_string()))?;
        if check {
            value["missing"] = serde_json::json!(missing);
        }
        print_json(&value)?;
    } else {
        println!("template: {}", expectations.template);
        println!("build system: {}", expectations.build_system);
        println!("wizard pages: {}", expectations.wizard_pages);
        if expectations.creation_path_label {
            println!("creation path label: checked");
        } else {
            println!("creation path label: not shown");
        }
        match expectations.opened_file_pattern {
            Some(pattern) => println!("opened file: {}", pattern),
            None => println!("opened file: none"),
        }
        println!("files:");
        for file in &expectations.written_files {
            println!("  {}", file.display());
        }
        match &expectations.build_output {
            Some(output) => println!("build output: {}", output.display()),
            None => println!("build output: not checked"),
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::CheckFailed(format!("{} expected files missing: {}", missing.len(), missing.join(", "))))
    }
}

fn env(format: OutputFormat) -> Result<(), CliError> {
    let suite = SuiteConfig::from_env().map_err(|e| CliError::Input(e.to_string()))?;
    let tuning = VsuiConfig::load();

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "suite": suite, "tuning": tuning }));
    }

    if suite.qt_installations.is_empty() {
        println!("Qt versions: none (set SQUISH_VSTOOLS_QTDIRS)");
    } else {
        println!("Qt versions:");
        for qt in &suite.qt_installations {
            println!("  {} = {}", qt.name, qt.path.display());
        }
    }
    match &suite.workdir {
        Some(dir) if suite.existing_workdir().is_some() => println!("workdir: {}", dir.display()),
        Some(dir) => println!("workdir: {} (missing)", dir.display()),
        None => println!("workdir: none (set SQUISH_VSTOOLS_WORKDIR)"),
    }
    match (suite.ide_version, suite.ide_release()) {
        (Some(v), Some(year)) => println!("IDE version: {} (Visual Studio {})", v, year),
        (Some(v), None) => println!("IDE version: {}", v),
        (None, _) => println!("IDE version: any"),
    }
    println!(
        "timing: poll {}ms, timeout {}ms, settle {}ms, backoff {}ms, max {} cycles",
        tuning.poll_interval_ms, tuning.default_timeout_ms, tuning.settle_timeout_ms, tuning.backoff_ms, tuning.max_cycles
    );
    Ok(())
}
