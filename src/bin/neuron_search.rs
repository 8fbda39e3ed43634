use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use neuron_search::config::ConfigLoader;
use neuron_search::domain::KeyType;
use neuron_search::error::LookupError;
use neuron_search::fixtures::FixtureStore;
use neuron_search::output::{JsonOutput, OutputMode, TextOutput};
use neuron_search::resolver::Resolver;
use neuron_search::s3::S3HttpClient;

#[derive(Parser)]
#[command(name = "neuron-search")]
#[command(about = "Look up a NeuronBridge key across the backing stores")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve one key into a report")]
    Lookup(LookupArgs),
    #[command(about = "Show published versions and the one lookups use")]
    Versions(VersionsArgs),
    #[command(about = "List accepted key types")]
    Types,
}

#[derive(Args)]
struct LookupArgs {
    key: String,

    /// Key type label ("Body ID") or alias (body-id).
    #[arg(long = "type", short = 't')]
    key_type: String,

    /// JSON dump standing in for the document and wide-column stores.
    #[arg(long)]
    fixtures: Utf8PathBuf,
}

#[derive(Args)]
struct VersionsArgs {
    #[arg(long)]
    fixtures: Utf8PathBuf,

    #[arg(long)]
    version: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<LookupError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &LookupError) -> u8 {
    match error {
        LookupError::InvalidKeyType(_)
        | LookupError::InvalidKey { .. }
        | LookupError::VersionNotFound(_) => 2,
        LookupError::Store { .. } | LookupError::Catalog(_) | LookupError::ObjectStorage(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    match cli.command {
        Commands::Lookup(args) => run_lookup(args, cli.config, output_mode),
        Commands::Versions(args) => run_versions(args, cli.config, output_mode),
        Commands::Types => {
            for key_type in KeyType::ALL {
                println!("{}\t{}", key_type.alias(), key_type.label());
            }
            Ok(())
        }
    }
}

fn build_resolver(
    fixtures: &Utf8PathBuf,
    config: Option<Utf8PathBuf>,
) -> Result<Resolver<Arc<FixtureStore>, Arc<FixtureStore>, S3HttpClient>, LookupError> {
    let config = ConfigLoader::resolve(config.as_deref())?;
    let store = Arc::new(FixtureStore::load(fixtures)?);
    let objects = S3HttpClient::new(&config.object_storage)?;
    Resolver::new(Arc::clone(&store), store, objects, config)
}

fn run_lookup(
    args: LookupArgs,
    config: Option<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let resolver = build_resolver(&args.fixtures, config)?;
    // the library validates keys exactly as given
    let key = args.key.trim();
    let result = match output_mode {
        OutputMode::Json => resolver.resolve_with_progress(key, &args.key_type, &JsonOutput),
        OutputMode::Text => resolver.resolve_with_progress(key, &args.key_type, &TextOutput),
    };

    match (result, output_mode) {
        (Ok(report), OutputMode::Json) => JsonOutput::print_report(&report).into_diagnostic(),
        (Ok(report), OutputMode::Text) => TextOutput::print_report(&report).into_diagnostic(),
        (Err(error), OutputMode::Json) => {
            JsonOutput::print_error(&error.report()).into_diagnostic()?;
            Err(error.into())
        }
        (Err(error), OutputMode::Text) => {
            TextOutput::print_error(&error.report());
            Err(error.into())
        }
    }
}

fn run_versions(
    args: VersionsArgs,
    config: Option<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let resolver = build_resolver(&args.fixtures, config)?;
    let summary = resolver.versions().summarize(args.version.as_deref())?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_versions(&summary).into_diagnostic(),
        OutputMode::Text => TextOutput::print_versions(&summary).into_diagnostic(),
    }
}
