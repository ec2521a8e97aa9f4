//! gemctl: operator CLI for Discovery Engine search engines and data stores.
//!
//! Feeds declared state into the reconcilers and prints the resulting
//! state as JSON on stdout. Logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gemctl::model::{DataSchema, ReconciliationMode};
use gemctl::names;
use gemctl::poller::PollPolicy;
use gemctl::reconciler::{
    DataStoreReconciler, DataStoreSpec, DataStoreStatus, EngineReconciler, EngineSpec,
    EngineStatus, Phase, ReconcileOptions, Reconciler,
};
use gemctl::{Config, DiscoveryEngineClient};

/// gemctl - manage Discovery Engine search engines and data stores
#[derive(Parser, Debug)]
#[command(name = "gemctl", version, about)]
struct Args {
    /// Google Cloud project ID
    #[arg(long, global = true)]
    project: Option<String>,

    /// Location (e.g. us, eu, global)
    #[arg(long, global = true)]
    location: Option<String>,

    /// Collection ID
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Use ambient credentials instead of `gcloud auth print-access-token`
    #[arg(long, global = true)]
    use_service_account: bool,

    /// API base URL override
    #[arg(long, global = true, env = "GEMCTL_ENDPOINT")]
    endpoint: Option<String>,

    /// Credential helper command line, e.g. "gcloud auth print-access-token"
    #[arg(long, global = true)]
    token_command: Option<String>,

    /// Wait for create operations to finish
    #[arg(long, global = true)]
    wait: bool,

    /// Operation wait budget in seconds
    #[arg(long, global = true, default_value = "300", value_parser = clap::value_parser!(u64).range(1..))]
    poll_timeout: u64,

    /// Seconds between operation polls
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage data stores
    #[command(subcommand)]
    DataStore(DataStoreCommand),
    /// Manage search engines
    #[command(subcommand)]
    Engine(EngineCommand),
}

#[derive(clap::Args, Debug)]
struct DataStoreArgs {
    /// Data store ID
    id: String,
    #[arg(long)]
    display_name: String,
    /// Import source, e.g. gs://bucket/docs/*
    #[arg(long)]
    source_uri: String,
    #[arg(long, value_enum, default_value_t = SchemaArg::Document)]
    data_schema: SchemaArg,
    #[arg(long, value_enum, default_value_t = ModeArg::Incremental)]
    reconciliation_mode: ModeArg,
}

#[derive(Subcommand, Debug)]
enum DataStoreCommand {
    /// Create a data store and import its documents
    Create(DataStoreArgs),
    /// Re-provision a data store with the same ID
    Update(DataStoreArgs),
    /// Show a data store
    Read { id: String },
    /// Delete a data store
    Delete { id: String },
    /// List data stores in the collection
    List,
    /// List documents in a data store branch
    Documents {
        id: String,
        #[arg(long, default_value = names::DEFAULT_BRANCH)]
        branch: String,
    },
}

#[derive(clap::Args, Debug)]
struct EngineArgs {
    /// Engine ID
    id: String,
    #[arg(long)]
    display_name: String,
    /// Data store ID to connect (repeatable)
    #[arg(long = "data-store")]
    data_stores: Vec<String>,
    /// Value for commonConfig.companyName
    #[arg(long)]
    company_name: Option<String>,
}

#[derive(Subcommand, Debug)]
enum EngineCommand {
    /// Create a search engine
    Create(EngineArgs),
    /// Re-provision an engine with the same ID
    Update(EngineArgs),
    /// Show an engine
    Read { id: String },
    /// Delete an engine
    Delete { id: String },
    /// List engines in a collection
    List {
        /// Collection to list (defaults to --collection)
        #[arg(long)]
        collection_id: Option<String>,
    },
    /// Show an engine with all readable data stores and their schemas
    Config { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SchemaArg {
    Document,
    Custom,
    Csv,
    Content,
}

impl From<SchemaArg> for DataSchema {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Document => DataSchema::Document,
            SchemaArg::Custom => DataSchema::Custom,
            SchemaArg::Csv => DataSchema::Csv,
            SchemaArg::Content => DataSchema::Content,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Incremental,
    Full,
}

impl From<ModeArg> for ReconciliationMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Incremental => ReconciliationMode::Incremental,
            ModeArg::Full => ReconciliationMode::Full,
        }
    }
}

impl From<DataStoreArgs> for DataStoreSpec {
    fn from(args: DataStoreArgs) -> Self {
        DataStoreSpec {
            id: args.id,
            display_name: args.display_name,
            source_uri: args.source_uri,
            data_schema: args.data_schema.into(),
            reconciliation_mode: args.reconciliation_mode.into(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemctl=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = Config {
        project_id: args.project,
        location: args.location,
        collection: args.collection,
        use_service_account: args.use_service_account,
        endpoint: args.endpoint,
        token_command: args.token_command.as_deref().map(split_command),
    };
    let client = Arc::new(
        DiscoveryEngineClient::connect(config)
            .await
            .context("Unable to create Discovery Engine client")?,
    );
    let options = ReconcileOptions {
        wait_for_operations: args.wait,
        poll: PollPolicy {
            timeout: Duration::from_secs(args.poll_timeout),
            interval: Duration::from_secs(args.poll_interval),
        },
    };

    match args.command {
        Command::DataStore(cmd) => run_data_store(client, options, cmd).await,
        Command::Engine(cmd) => run_engine(client, options, cmd).await,
    }
}

async fn run_data_store(
    client: Arc<DiscoveryEngineClient>,
    options: ReconcileOptions,
    cmd: DataStoreCommand,
) -> Result<ExitCode> {
    let reconciler = DataStoreReconciler::new(Arc::clone(&client), options);
    match cmd {
        DataStoreCommand::Create(args) => {
            let spec: DataStoreSpec = args.into();
            let status = reconciler.create(&spec).await?;
            print_json(&status)?;
            Ok(exit_for(status.phase))
        }
        DataStoreCommand::Update(args) => {
            let spec: DataStoreSpec = args.into();
            let status = reconciler.update(&spec).await?;
            print_json(&status)?;
            Ok(exit_for(status.phase))
        }
        DataStoreCommand::Read { id } => {
            let status = reconciler
                .read(&DataStoreStatus::new(id.as_str()))
                .await
                .with_context(|| format!("Failed to read data store {}", id))?;
            print_json(&status)?;
            Ok(ExitCode::SUCCESS)
        }
        DataStoreCommand::Delete { id } => {
            let result = reconciler.delete(&id).await?;
            print_json(&result)?;
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        DataStoreCommand::List => {
            let stores = client
                .list_data_stores()
                .await
                .context("Failed to list data stores")?;
            info!("Found {} data store(s)", stores.len());
            print_json(&stores)?;
            Ok(ExitCode::SUCCESS)
        }
        DataStoreCommand::Documents { id, branch } => {
            let name = client.names().data_store(&id);
            let docs = client
                .list_documents(&name, &branch)
                .await
                .with_context(|| format!("Failed to list documents of {}", id))?;
            print_json(&docs)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_engine(
    client: Arc<DiscoveryEngineClient>,
    options: ReconcileOptions,
    cmd: EngineCommand,
) -> Result<ExitCode> {
    let reconciler = EngineReconciler::new(Arc::clone(&client), options);
    match cmd {
        EngineCommand::Create(args) => {
            let (reconciler, spec) = engine_spec(reconciler, args);
            let status = reconciler.create(&spec).await?;
            print_json(&status)?;
            Ok(exit_for(status.phase))
        }
        EngineCommand::Update(args) => {
            let (reconciler, spec) = engine_spec(reconciler, args);
            let status = reconciler.update(&spec).await?;
            print_json(&status)?;
            Ok(exit_for(status.phase))
        }
        EngineCommand::Read { id } => {
            let status = reconciler
                .read(&EngineStatus::new(id.as_str()))
                .await
                .with_context(|| format!("Failed to read engine {}", id))?;
            print_json(&status)?;
            Ok(ExitCode::SUCCESS)
        }
        EngineCommand::Delete { id } => {
            let result = reconciler.delete(&id).await?;
            print_json(&result)?;
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        EngineCommand::List { collection_id } => {
            let collection =
                collection_id.unwrap_or_else(|| client.names().collection_id().to_string());
            let engines = client
                .list_engines(&collection)
                .await
                .context("Failed to list engines")?;
            info!("Found {} engine(s)", engines.len());
            print_json(&engines)?;
            Ok(ExitCode::SUCCESS)
        }
        EngineCommand::Config { id } => {
            let name = client.names().engine(&id);
            let config = client
                .get_engine_full_config(&name)
                .await
                .with_context(|| format!("Failed to read engine {}", id))?;
            print_json(&config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn engine_spec(reconciler: EngineReconciler, args: EngineArgs) -> (EngineReconciler, EngineSpec) {
    let reconciler = match args.company_name {
        Some(company) => reconciler.with_company_name(company),
        None => reconciler,
    };
    let spec = EngineSpec {
        id: args.id,
        display_name: args.display_name,
        data_store_ids: args.data_stores,
    };
    (reconciler, spec)
}

/// Splits a helper command line on whitespace into program and arguments.
fn split_command(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

fn exit_for(phase: Phase) -> ExitCode {
    match phase {
        Phase::Ready => ExitCode::SUCCESS,
        Phase::Failed => ExitCode::FAILURE,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_command_before_subcommand() {
        let args = Args::try_parse_from([
            "gemctl",
            "--token-command",
            "my-helper --print",
            "data-store",
            "list",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::DataStore(DataStoreCommand::List)
        ));
        assert_eq!(
            args.token_command.as_deref().map(split_command),
            Some(vec!["my-helper".to_string(), "--print".to_string()])
        );
    }

    #[test]
    fn test_token_command_after_subcommand() {
        let args = Args::try_parse_from([
            "gemctl",
            "engine",
            "read",
            "eng1",
            "--token-command",
            "gcloud auth print-access-token",
        ])
        .unwrap();
        match args.command {
            Command::Engine(EngineCommand::Read { id }) => assert_eq!(id, "eng1"),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(
            split_command(args.token_command.as_deref().unwrap()),
            vec!["gcloud", "auth", "print-access-token"]
        );
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result =
            Args::try_parse_from(["gemctl", "--poll-interval", "0", "engine", "list"]);
        assert!(result.is_err());

        let args =
            Args::try_parse_from(["gemctl", "--poll-interval", "2", "engine", "list"]).unwrap();
        assert_eq!(args.poll_interval, 2);
        assert_eq!(args.poll_timeout, 300);
    }
}
