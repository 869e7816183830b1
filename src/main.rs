use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fabric_ops::console::{ConsoleConfig, HttpConsole};
use fabric_ops::controller::{self, OrderingServiceNodeParams};
use fabric_ops::msp::{self, Identity, Organization, Policy};
use fabric_ops::telemetry::{init_tracing, LogFormat};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log output format
    #[arg(
        long,
        global = true,
        value_enum,
        env = "FABRIC_OPS_LOG_FORMAT",
        default_value_t = LogFormat::Text
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage ordering service nodes
    #[command(subcommand)]
    Orderer(OrdererCommands),
    /// Compile and inspect MSP definitions
    #[command(subcommand)]
    Msp(MspCommands),
    /// Show version and build information
    Version,
}

#[derive(Subcommand)]
enum OrdererCommands {
    /// Bring an ordering service node to the state declared in a file
    Apply(ApplyArgs),
}

#[derive(Args)]
struct ApplyArgs {
    /// YAML file with the ordering service node parameters
    #[arg(long, short)]
    file: PathBuf,

    #[command(flatten)]
    console: ConsoleArgs,
}

#[derive(Args)]
struct ConsoleArgs {
    /// Operations console URL
    #[arg(long, env = "FABRIC_CONSOLE_ENDPOINT")]
    api_endpoint: String,

    #[arg(long, env = "FABRIC_CONSOLE_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "FABRIC_CONSOLE_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "FABRIC_CONSOLE_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

impl From<ConsoleArgs> for ConsoleConfig {
    fn from(args: ConsoleArgs) -> Self {
        Self {
            api_endpoint: args.api_endpoint,
            api_key: args.api_key,
            api_secret: args.api_secret,
            api_timeout: Duration::from_secs(args.api_timeout),
        }
    }
}

#[derive(Subcommand)]
enum MspCommands {
    /// Compile an organization into an MSP configuration group
    Compile(CompileArgs),
    /// Read an organization back out of an MSP configuration group
    Extract(ExtractArgs),
    /// Write an enrolled identity as an MSP directory
    Directory(DirectoryArgs),
}

#[derive(Args)]
struct CompileArgs {
    /// YAML or JSON file describing the organization
    #[arg(long)]
    organization: PathBuf,

    /// Include the Endorsement policy
    #[arg(long)]
    endorsement: bool,

    /// YAML or JSON map of additional policies by name
    #[arg(long)]
    policies: Option<PathBuf>,
}

#[derive(Args)]
struct ExtractArgs {
    #[arg(long)]
    msp_id: String,

    /// JSON file holding the MSP configuration group
    #[arg(long)]
    file: PathBuf,
}

#[derive(Args)]
struct DirectoryArgs {
    /// YAML or JSON file with the identity's certificates and key
    #[arg(long)]
    identity: PathBuf,

    /// Existing directory to write into; a temporary one is created otherwise
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("fabric-ops v{}", env!("CARGO_PKG_VERSION"));
        println!("Build Date: {}", env!("BUILD_DATE"));
        println!("Git SHA: {}", env!("GIT_SHA"));
        return Ok(());
    }

    init_tracing(cli.log_format);

    match cli.command {
        Commands::Orderer(OrdererCommands::Apply(args)) => apply_orderer(args).await,
        Commands::Msp(MspCommands::Compile(args)) => compile_msp(args),
        Commands::Msp(MspCommands::Extract(args)) => extract_msp(args),
        Commands::Msp(MspCommands::Directory(args)) => write_directory(args),
        Commands::Version => Ok(()),
    }
}

async fn apply_orderer(args: ApplyArgs) -> Result<()> {
    let contents = read_file(&args.file)?;
    let params = OrderingServiceNodeParams::from_yaml(&contents)
        .with_context(|| format!("invalid parameters in {}", args.file.display()))?;

    let config = ConsoleConfig::from(args.console);
    info!(endpoint = %config.api_endpoint, "Connecting to operations console");
    let console = HttpConsole::new(config)?;

    let outcome = controller::reconcile(&console, &params).await?;
    print_json(&outcome)
}

fn compile_msp(args: CompileArgs) -> Result<()> {
    let organization: Organization = load(&args.organization)?;
    let policies: BTreeMap<String, Policy> = match &args.policies {
        Some(path) => load(path)?,
        None => BTreeMap::new(),
    };

    let tree = msp::organization_to_msp(&organization, args.endorsement, &policies)?;
    print_json(&tree.to_value()?)
}

fn extract_msp(args: ExtractArgs) -> Result<()> {
    let contents = read_file(&args.file)?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", args.file.display()))?;

    let organization = msp::msp_to_organization(&args.msp_id, &value)?;
    print_json(&organization)
}

fn write_directory(args: DirectoryArgs) -> Result<()> {
    let identity: Identity = load(&args.identity)?;
    let path = msp::write_msp_directory(&identity, args.output.as_deref())?;
    info!(identity = %identity.name, "Wrote MSP directory");
    println!("{}", path.display());
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// YAML is a superset of JSON, so one parser covers both
fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = read_file(path)?;
    serde_yaml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
