use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use versioner::{BuildContext, BuildOptions, BuildPlan, load_build_config, projects_or_root};
use versioner_auth::resolve_credentials;
use versioner_config::{Config, find_config};
use versioner_receipt::{incoming_receipt_path, receipt_path};
use versioner_types::{BuildIntents, Reporter};
use versioner_upload::DefaultPublicationRules;

#[derive(Parser, Debug)]
#[command(name = "versioner", version)]
#[command(about = "Resolve the build type, version and upload lifecycle of a multi-project build")]
struct Cli {
    /// Root of the build's source tree
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Build a final release.
    #[arg(long)]
    release: bool,

    /// Build a milestone (requires --next-snapshot or `next_snapshot` in config).
    #[arg(long)]
    milestone: bool,

    /// Build a timestamped snapshot and write the build receipt.
    #[arg(long)]
    snapshot: bool,

    /// Mint a fresh timestamp even when incoming-distributions/ holds a build receipt.
    #[arg(long)]
    ignore_incoming_build_receipt: bool,

    /// The version being worked towards (overrides config).
    #[arg(long)]
    next_version: Option<String>,

    /// Milestone qualifier (overrides config).
    #[arg(long)]
    next_snapshot: Option<String>,

    /// Build against the authenticated remote repository.
    #[arg(long)]
    use_repo: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the version of this build.
    Version,
    /// Print the authoritative build timestamp.
    Timestamp,
    /// Print build type, version, repository and upload lifecycle tasks per project.
    Plan,
    /// Print configuration and credential diagnostics.
    Doctor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    // Config discovery walks parents and the implicit project takes the root's name.
    cli.root = std::path::absolute(&cli.root)
        .with_context(|| format!("failed to resolve root directory {}", cli.root.display()))?;

    let mut overrides = Config::new();
    overrides.versions.next_version = cli.next_version.clone();
    overrides.versions.next_snapshot = cli.next_snapshot.clone();
    overrides.versions.use_repo = cli.use_repo;
    overrides.build.ignore_incoming_build_receipt = cli.ignore_incoming_build_receipt;

    let config = load_build_config(&cli.root, &overrides)?;
    let intents = BuildIntents {
        release: cli.release,
        milestone: cli.milestone,
        snapshot: cli.snapshot,
    };
    let opts = BuildOptions::from_config(&cli.root, intents, &config);

    let mut reporter = CliReporter;

    match cli.cmd {
        Commands::Version => {
            let ctx = BuildContext::configure(&opts, &mut reporter)?;
            let version = ctx.render_version(&mut reporter)?;
            match cli.format {
                OutputFormat::Text => println!("{version}"),
                OutputFormat::Json => print_json(&VersionOutput {
                    build_type: ctx.build_type().to_string(),
                    version,
                })?,
            }
        }
        Commands::Timestamp => {
            let ctx = BuildContext::configure(&opts, &mut reporter)?;
            match cli.format {
                OutputFormat::Text => println!("{}", ctx.timestamp()),
                OutputFormat::Json => print_json(&TimestampOutput {
                    timestamp: ctx.timestamp().to_string(),
                    receipt: ctx.receipt().map(Path::to_path_buf),
                })?,
            }
        }
        Commands::Plan => {
            let ctx = BuildContext::configure(&opts, &mut reporter)?;
            let credentials = resolve_credentials(None).credentials;
            let projects = projects_or_root(&config, &cli.root);
            let plan = ctx.plan(&projects, &DefaultPublicationRules, &credentials, &mut reporter)?;
            match cli.format {
                OutputFormat::Text => print_plan(&plan),
                OutputFormat::Json => print_json(&plan)?,
            }
        }
        Commands::Doctor => {
            let report = run_doctor(&cli.root, &config);
            match cli.format {
                OutputFormat::Text => print_doctor(&report),
                OutputFormat::Json => print_json(&report)?,
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct VersionOutput {
    build_type: String,
    version: String,
}

#[derive(Serialize)]
struct TimestampOutput {
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<PathBuf>,
}

#[derive(Serialize)]
struct DoctorReport {
    root: PathBuf,
    config_file: Option<PathBuf>,
    incoming_receipt: bool,
    receipt: bool,
    next_version: Option<String>,
    next_snapshot: Option<String>,
    use_repo: bool,
    projects: usize,
    credentials_detected: bool,
    username_source: String,
    password_source: String,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn print_plan(plan: &BuildPlan) {
    println!("build_type: {}", plan.build_type);
    println!("timestamp: {}", plan.timestamp);
    println!("version: {}", plan.version);
    if let Some(receipt) = &plan.receipt {
        println!("receipt: {}", receipt.display());
    }
    println!("repository: {}", plan.repository.as_deref().unwrap_or("none"));

    for project in &plan.projects {
        println!();
        println!("{}", project.name);
        println!("  uploadMain: {}", project.upload_main.join(", "));
        println!("  uploadJni: {}", project.upload_jni.join(", "));
    }
}

fn run_doctor(root: &Path, config: &Config) -> DoctorReport {
    let credentials = resolve_credentials(None);

    DoctorReport {
        root: root.to_path_buf(),
        config_file: find_config(root),
        incoming_receipt: incoming_receipt_path(root).is_file(),
        receipt: receipt_path(root).is_file(),
        next_version: config.next_version().map(String::from),
        next_snapshot: config.next_snapshot().map(String::from),
        use_repo: config.use_repo(),
        projects: config.projects().len(),
        credentials_detected: credentials.credentials.is_present(),
        username_source: credentials.username_source.to_string(),
        password_source: credentials.password_source.to_string(),
    }
}

fn print_doctor(report: &DoctorReport) {
    println!("root: {}", report.root.display());
    match &report.config_file {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: not found"),
    }
    println!("incoming_receipt: {}", presence(report.incoming_receipt));
    println!("receipt: {}", presence(report.receipt));
    println!("next_version: {}", report.next_version.as_deref().unwrap_or("unset"));
    println!("next_snapshot: {}", report.next_snapshot.as_deref().unwrap_or("unset"));
    println!("use_repo: {}", report.use_repo);
    println!("projects: {}", report.projects);
    println!();
    println!("credentials_detected: {}", report.credentials_detected);
    println!("username_source: {}", report.username_source);
    println!("password_source: {}", report.password_source);
}

fn presence(present: bool) -> &'static str {
    if present { "present" } else { "absent" }
}
