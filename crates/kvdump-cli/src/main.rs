use clap::{ArgAction, Parser, Subcommand};
use kvdump::{AddFailurePolicy, BulkDriver, DumpConfig, ImportReport};
use kvdump_store::{FsStore, KeySpec, Store};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kvdump-cli")]
#[command(about = "Export, import and clear a file-backed key-value store as JSON")]
struct Cli {
    /// Directory holding the store state file.
    #[arg(long, global = true, default_value = ".")]
    state_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    CreateContainer(CreateContainerArgs),
    Export(ExportArgs),
    Import(ImportArgs),
    Clear(ClearArgs),
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
struct CreateContainerArgs {
    #[arg(long)]
    name: String,
    /// Key field. Repeat for a compound key.
    #[arg(long = "key-path")]
    key_paths: Vec<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    auto_increment: bool,
}

#[derive(clap::Args, Debug)]
struct DriverArgs {
    /// Give up on the request phase after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct ExportArgs {
    /// Write the document here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    #[command(flatten)]
    driver: DriverArgs,
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// Read the document from here instead of stdin.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    best_effort: bool,
    #[command(flatten)]
    driver: DriverArgs,
}

#[derive(clap::Args, Debug)]
struct ClearArgs {
    /// Clear only this container.
    #[arg(long)]
    container: Option<String>,
    #[command(flatten)]
    driver: DriverArgs,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::CreateContainer(args) => create_container_command(&cli.state_dir, args),
        Commands::Export(args) => export_command(&cli.state_dir, args).await,
        Commands::Import(args) => import_command(&cli.state_dir, args).await,
        Commands::Clear(args) => clear_command(&cli.state_dir, args).await,
        Commands::List(args) => list_command(&cli.state_dir, args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(state_dir: &Path) -> Result<FsStore, String> {
    FsStore::new(state_dir).map_err(|error| error.to_string())
}

fn build_driver(args: &DriverArgs, policy: AddFailurePolicy) -> BulkDriver {
    let mut config = DumpConfig::default().with_add_failure_policy(policy);
    if let Some(millis) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(millis));
    }
    BulkDriver::new(config)
}

/// No key path means out-of-line keys, which are always generated.
fn key_spec_from_args(mut key_paths: Vec<String>, auto_increment: bool) -> Result<KeySpec, String> {
    match (key_paths.len(), auto_increment) {
        (0, _) => Ok(KeySpec::out_of_line()),
        (1, true) => Ok(KeySpec::auto_increment(key_paths.remove(0))),
        (1, false) => Ok(KeySpec::inline(key_paths.remove(0))),
        (_, true) => Err("--auto-increment needs exactly one --key-path".to_string()),
        (_, false) => Ok(KeySpec::compound(key_paths)),
    }
}

fn create_container_command(state_dir: &Path, args: CreateContainerArgs) -> Result<ExitCode, String> {
    let key_spec = key_spec_from_args(args.key_paths, args.auto_increment)?;
    let store = open_store(state_dir)?;
    store
        .create_container(args.name.clone(), key_spec)
        .map_err(|error| error.to_string())?;
    info!(container = %args.name, "container created");
    Ok(ExitCode::SUCCESS)
}

async fn export_command(state_dir: &Path, args: ExportArgs) -> Result<ExitCode, String> {
    let store = open_store(state_dir)?;
    let driver = build_driver(&args.driver, AddFailurePolicy::default());
    let text = driver
        .export_to_text(&store)
        .await
        .map_err(|error| error.to_string())?;

    match args.output {
        Some(path) => std::fs::write(&path, text)
            .map_err(|e| format!("failed writing document '{}': {e}", path.display()))?,
        None => println!("{text}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn import_command(state_dir: &Path, args: ImportArgs) -> Result<ExitCode, String> {
    let text = read_document(args.input.as_deref())?;
    let store = open_store(state_dir)?;
    let policy = if args.best_effort {
        AddFailurePolicy::BestEffort
    } else {
        AddFailurePolicy::FailFast
    };
    let report = build_driver(&args.driver, policy)
        .import_from_text(&store, &text)
        .await
        .map_err(|error| error.to_string())?;

    print_import_summary(&report);
    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

async fn clear_command(state_dir: &Path, args: ClearArgs) -> Result<ExitCode, String> {
    let store = open_store(state_dir)?;
    let driver = build_driver(&args.driver, AddFailurePolicy::default());
    match args.container.as_deref() {
        Some(name) => driver.clear_container(&store, name).await,
        None => driver.clear(&store).await,
    }
    .map_err(|error| error.to_string())?;
    Ok(ExitCode::SUCCESS)
}

async fn list_command(state_dir: &Path, args: ListArgs) -> Result<ExitCode, String> {
    let store = open_store(state_dir)?;
    let names = store
        .container_names()
        .await
        .map_err(|error| error.to_string())?;

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let key_spec = store.key_spec(&name).map_err(|error| error.to_string())?;
        entries.push((name, key_spec));
    }

    if args.json {
        let listing: Vec<serde_json::Value> = entries
            .iter()
            .map(|(name, key_spec)| serde_json::json!({ "name": name, "key_spec": key_spec }))
            .collect();
        let json = serde_json::to_string_pretty(&listing).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for (name, key_spec) in &entries {
            println!(
                "{name}: key_path={} auto_increment={}",
                key_spec
                    .key_path
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "<none>".to_string()),
                key_spec.auto_increment
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn read_document(input: Option<&Path>) -> Result<String, String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed reading document '{}': {e}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("failed reading document from stdin: {e}"))?;
            Ok(text)
        }
    }
}

fn print_import_summary(report: &ImportReport) {
    println!("records_imported: {}", report.records_imported());
    for (container, count) in &report.imported {
        println!("imported: {container} {count}");
    }
    if !report.skipped_containers.is_empty() {
        println!("skipped_containers: {}", report.skipped_containers.join(", "));
    }
    for failure in &report.failures {
        println!(
            "failed: {} #{}: {}",
            failure.container, failure.index, failure.reason
        );
    }
    if !report.incomplete_containers.is_empty() {
        println!(
            "incomplete_containers: {}",
            report.incomplete_containers.join(", ")
        );
    }
}
