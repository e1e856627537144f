//! jira-cli: command line access to JIRA built on `jira-lib-rust`.
//!
//! Usage:
//!   jira-cli issue get PROJ-1 PROJ-2 ...      Fetch issues concurrently
//!   jira-cli issue search "project = PROJ"    Run a JQL search
//!   jira-cli batch run requests.json          Replay a list of REST calls
//!   jira-cli cache stats                      Inspect the metadata cache
//!
//! Exit codes: 0 on success, 1 when the command or any batched request failed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jira_lib_rust::batch::RequestBatcher;
use jira_lib_rust::cache::CacheManager;
use jira_lib_rust::client::{fetch_issues, JiraApiExt, MetadataCache, MetadataCategory};
use jira_lib_rust::output::{issue_line, render_batch, render_value, OutputFormat};
use jira_lib_rust::types::QueryParams;
use jira_lib_rust::{JiraClient, JiraConfig};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// JIRA command line client
///
/// Credentials come from the config file, JIRA_EMAIL + JIRA_API_TOKEN,
/// JIRA_PAT, or the OS keyring.
#[derive(Parser)]
#[command(name = "jira-cli", version)]
#[command(about = "JIRA command line client with concurrent bulk requests", long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true, env = "JIRA_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Maximum concurrent requests for bulk commands
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Remote(RemoteCommands),

    /// Metadata cache maintenance
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// Commands that talk to the JIRA server.
#[derive(Subcommand)]
enum RemoteCommands {
    /// Issue commands
    #[command(subcommand)]
    Issue(IssueCommands),

    /// Comment commands
    #[command(subcommand)]
    Comment(CommentCommands),

    /// Worklog commands
    #[command(subcommand)]
    Worklog(WorklogCommands),

    /// Sprint commands
    #[command(subcommand)]
    Sprint(SprintCommands),

    /// Board commands
    #[command(subcommand)]
    Board(BoardCommands),

    /// Saved filter commands
    #[command(subcommand)]
    Filter(FilterCommands),

    /// Run REST calls from a file through the batcher
    #[command(subcommand)]
    Batch(BatchCommands),

    /// List fields (cached)
    Fields {
        /// Refetch instead of using the cache
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Subcommand)]
enum IssueCommands {
    /// Fetch one or more issues concurrently
    Get {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Comma-separated fields to return
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Search with JQL
    Search {
        jql: String,

        #[arg(long, default_value_t = 50)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        start_at: u32,
    },
    /// List available transitions
    Transitions { key: String },
    /// Apply a transition by id
    Transition { key: String, transition_id: String },
    /// Assign to an account id
    Assign {
        key: String,
        account_id: String,
    },
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Add a plain-text comment
    Add { key: String, text: String },
    /// List comments
    List { key: String },
}

#[derive(Subcommand)]
enum WorklogCommands {
    /// Log time, e.g. `worklog add PROJ-1 "1h 30m"`
    Add {
        key: String,
        time_spent: String,

        #[arg(long)]
        comment: Option<String>,
    },
    /// List worklogs
    List { key: String },
}

#[derive(Subcommand)]
enum SprintCommands {
    /// Show a sprint
    Get { id: u64 },
    /// List issues in a sprint
    Issues { id: u64 },
}

#[derive(Subcommand)]
enum BoardCommands {
    /// List sprints on a board
    Sprints {
        id: u64,

        /// future, active or closed
        #[arg(long)]
        state: Option<String>,
    },
}

#[derive(Subcommand)]
enum FilterCommands {
    /// Show a saved filter
    Get { id: u64 },
    /// List favourite filters
    Favourites,
}

#[derive(Subcommand)]
enum BatchCommands {
    /// Execute a JSON array of {method, endpoint, params?, data?}
    Run { file: PathBuf },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache location and entry count
    Stats,
    /// Remove all entries, or one category
    Clear {
        #[arg(long)]
        category: Option<String>,
    },
    /// Remove expired entries
    Purge,
}

/// One entry of a `batch run` file.
#[derive(Debug, Deserialize)]
struct BatchEntry {
    method: String,
    endpoint: String,
    #[serde(default)]
    params: Option<QueryParams>,
    #[serde(default)]
    data: Option<Value>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,jira_lib_rust={level},jira_cli={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let format = cli.format;
    match cli.command {
        Commands::Cache(cmd) => {
            let config =
                JiraConfig::resolve(cli.config.as_deref()).context("loading configuration")?;
            cache_command(&cmd, &config, format).await
        }
        Commands::Remote(cmd) => {
            let config =
                JiraConfig::load(cli.config.as_deref()).context("loading configuration")?;
            let max_concurrent = cli.max_concurrent.unwrap_or(config.max_concurrent);
            remote_command(cmd, &config, max_concurrent, format).await
        }
    }
}

async fn remote_command(
    cmd: RemoteCommands,
    config: &JiraConfig,
    max_concurrent: usize,
    format: OutputFormat,
) -> Result<ExitCode> {
    let client = Arc::new(JiraClient::from_config(config).context("creating JIRA client")?);
    debug!(base_url = client.base_url(), max_concurrent, "client ready");

    match cmd {
        RemoteCommands::Issue(cmd) => issue_command(cmd, client, max_concurrent, format).await,
        RemoteCommands::Comment(CommentCommands::Add { key, text }) => {
            let v = client.add_comment(&key, &text).await?;
            emit(&v, format, &format!("comment added to {key}"))
        }
        RemoteCommands::Comment(CommentCommands::List { key }) => {
            emit(&client.get_comments(&key).await?, format, "")
        }
        RemoteCommands::Worklog(WorklogCommands::Add {
            key,
            time_spent,
            comment,
        }) => {
            let v = client
                .add_worklog(&key, &time_spent, comment.as_deref())
                .await?;
            emit(&v, format, &format!("logged {time_spent} on {key}"))
        }
        RemoteCommands::Worklog(WorklogCommands::List { key }) => {
            emit(&client.get_worklogs(&key).await?, format, "")
        }
        RemoteCommands::Sprint(SprintCommands::Get { id }) => {
            emit(&client.get_sprint(id).await?, format, "")
        }
        RemoteCommands::Sprint(SprintCommands::Issues { id }) => {
            emit(&client.get_sprint_issues(id).await?, format, "")
        }
        RemoteCommands::Board(BoardCommands::Sprints { id, state }) => emit(
            &client.get_board_sprints(id, state.as_deref()).await?,
            format,
            "",
        ),
        RemoteCommands::Filter(FilterCommands::Get { id }) => {
            emit(&client.get_filter(id).await?, format, "")
        }
        RemoteCommands::Filter(FilterCommands::Favourites) => {
            emit(&client.get_favourite_filters().await?, format, "")
        }
        RemoteCommands::Batch(BatchCommands::Run { file }) => {
            batch_run(&file, client, max_concurrent, format).await
        }
        RemoteCommands::Fields { refresh } => {
            let cache = Arc::new(CacheManager::from_settings(&config.cache));
            let metadata = MetadataCache::new(client, cache);
            if refresh {
                metadata.refresh(MetadataCategory::Fields).await?;
            }
            emit(&metadata.fields().await?, format, "")
        }
    }
}

async fn issue_command(
    cmd: IssueCommands,
    client: Arc<JiraClient>,
    max_concurrent: usize,
    format: OutputFormat,
) -> Result<ExitCode> {
    match cmd {
        IssueCommands::Get { keys, fields } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let fields = (!fields.is_empty()).then_some(fields.as_slice());
            let progress = progress_printer(keys.len() > 1 && std::io::stderr().is_terminal());
            let batch = fetch_issues(client, &keys, fields, max_concurrent, Some(&progress)).await?;

            match format {
                OutputFormat::Json => {
                    let mut out = Map::new();
                    for (key, r) in batch.iter() {
                        let entry = match (&r.data, &r.error) {
                            (Some(data), _) => data.clone(),
                            (None, err) => json!({ "error": err }),
                        };
                        out.insert(key.to_string(), entry);
                    }
                    println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
                }
                OutputFormat::Text => {
                    for (key, r) in batch.iter() {
                        match &r.data {
                            Some(issue) if r.success => println!("{}", issue_line(issue)),
                            _ => println!(
                                "{key}  FAIL  {}",
                                r.error.as_deref().unwrap_or("unknown error")
                            ),
                        }
                    }
                }
            }
            Ok(exit_for(batch.result.all_succeeded()))
        }
        IssueCommands::Search {
            jql,
            limit,
            start_at,
        } => {
            let v = client
                .search_issues(&jql, start_at, limit, Some(&["summary", "status"]))
                .await?;
            emit(&v, format, "")
        }
        IssueCommands::Transitions { key } => {
            emit(&client.get_transitions(&key).await?, format, "")
        }
        IssueCommands::Transition { key, transition_id } => {
            let v = client.transition_issue(&key, &transition_id).await?;
            emit(&v, format, &format!("{key} transitioned ({transition_id})"))
        }
        IssueCommands::Assign { key, account_id } => {
            let v = client.assign_issue(&key, Some(&account_id)).await?;
            emit(&v, format, &format!("{key} assigned to {account_id}"))
        }
    }
}

async fn batch_run(
    file: &Path,
    client: Arc<JiraClient>,
    max_concurrent: usize,
    format: OutputFormat,
) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading batch file {}", file.display()))?;
    let entries: Vec<BatchEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing batch file {}", file.display()))?;

    let mut batcher = RequestBatcher::new(client, max_concurrent)?;
    for e in entries {
        batcher.add(e.method, e.endpoint, e.params, e.data);
    }
    info!(requests = batcher.len(), max_concurrent, "running batch file");

    let progress = progress_printer(std::io::stderr().is_terminal());
    let result = batcher.execute(Some(&progress)).await;
    println!("{}", render_batch(&result, format)?);
    Ok(exit_for(result.all_succeeded()))
}

async fn cache_command(
    cmd: &CacheCommands,
    config: &JiraConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let cache = CacheManager::from_settings(&config.cache);
    let dir = config.cache.resolved_dir();
    match cmd {
        CacheCommands::Stats => {
            let v = json!({
                "backend": cache.backend_name(),
                "directory": dir.display().to_string(),
                "entries": cache.len().await?,
            });
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&v)?),
                OutputFormat::Text => println!(
                    "backend: {}\ndirectory: {}\nentries: {}",
                    v["backend"].as_str().unwrap_or("-"),
                    dir.display(),
                    v["entries"]
                ),
            }
        }
        CacheCommands::Clear {
            category: Some(category),
        } => {
            let n = cache.invalidate_category(category).await?;
            println!("removed {n} entries from {category}");
        }
        CacheCommands::Clear { category: None } => {
            cache.clear().await?;
            println!("cache cleared");
        }
        CacheCommands::Purge => {
            let n = cache.purge_expired().await?;
            println!("purged {n} expired entries");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Print a payload. Empty responses (204) print `done_message` in text mode.
fn emit(value: &Value, format: OutputFormat, done_message: &str) -> Result<ExitCode> {
    let rendered = render_value(value, format)?;
    if rendered.is_empty() {
        if !done_message.is_empty() {
            println!("{done_message}");
        }
    } else if value.is_null() && format == OutputFormat::Json && !done_message.is_empty() {
        println!("{}", json!({ "ok": true, "message": done_message }));
    } else {
        println!("{rendered}");
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_for(all_succeeded: bool) -> ExitCode {
    if all_succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn progress_printer(enabled: bool) -> impl Fn(usize, usize) + Send + Sync {
    move |done, total| {
        if enabled {
            eprint!("\r{done}/{total} requests finished");
            if done == total {
                eprintln!();
            }
        }
    }
}
