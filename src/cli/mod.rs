pub mod daemon;
pub mod jobs;
pub mod searches;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde_json::Value;

/// Job Collector - aggregate job postings and email saved-search digests
#[derive(Parser, Debug)]
#[command(
    name = "jobc",
    version,
    about = "Job Collector - aggregate job postings and email saved-search digests"
)]
pub struct Cli {
    /// Daemon host
    #[arg(long, default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Daemon port
    #[arg(long, default_value_t = 8390, global = true)]
    pub port: u16,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the collector daemon in the foreground
    Serve {
        /// Path to configuration file
        #[arg(short = 'c', long = "config")]
        config: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short = 'p', long)]
        port: Option<u16>,

        /// Data directory path
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },

    /// Show daemon status
    Status,

    /// Fetch postings from the providers into the store
    Ingest {
        /// Search keywords sent to every provider
        #[arg(short = 'k', long, default_value = "")]
        keywords: String,

        /// Location filter sent to every provider
        #[arg(short = 'l', long)]
        location: Option<String>,

        /// Only ingest from this provider (reed, adzuna)
        #[arg(short = 's', long)]
        source: Option<String>,

        /// Per-provider result cap
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List stored jobs, newest first
    Jobs {
        /// Maximum number of jobs
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search stored jobs
    Search {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage saved searches
    Searches {
        #[command(subcommand)]
        action: SearchesCommand,
    },

    /// Run the notification sweep for one saved search or all of them
    Run {
        /// Saved search name
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        name: Option<String>,

        /// Sweep every saved search
        #[arg(long)]
        all: bool,
    },

    /// Show jobs not yet reported for a saved search, and mark them reported
    New {
        /// Saved search name
        name: String,

        /// Only print how many jobs are new; nothing is marked
        #[arg(long)]
        count: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show totals, saved searches and the latest jobs
    Dashboard {
        /// Number of latest jobs to show
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SearchesCommand {
    /// List saved searches
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one saved search
    Show {
        /// Saved search name
        name: String,
    },

    /// Show a saved search's current matches, flagging those already reported
    Feed {
        /// Saved search name
        name: String,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create or replace a saved search
    Add {
        /// Saved search name
        name: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Filter flags shared by `search` and `searches add`.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Keywords; every word must appear in title, company or location
    #[arg(short = 'q', long)]
    pub q: Option<String>,

    /// Exact provider tag
    #[arg(long)]
    pub source: Option<String>,

    /// Location substring
    #[arg(long)]
    pub location: Option<String>,

    /// Only jobs posted on or after this date (YYYY-MM-DD)
    #[arg(long = "posted-after")]
    pub posted_after: Option<String>,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Build the base URL for the daemon HTTP API.
pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

/// Daemon URL for `segments`, each percent-encoded as a single path
/// component so names containing `/`, `?` or `#` stay intact.
pub fn api_url(host: &str, port: u16, segments: &[&str]) -> anyhow::Result<Url> {
    let mut url = Url::parse(&base_url(host, port))
        .with_context(|| format!("Invalid daemon address {}:{}", host, port))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Daemon address {}:{} cannot carry a path", host, port))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Format a connection error message for when the daemon is not reachable.
pub fn connection_error_message(host: &str, port: u16) -> String {
    format!(
        "Could not connect to daemon at {}:{}. Is it running? (try: jobc serve)",
        host, port
    )
}

/// Map a reqwest error into a user-facing error.
pub fn handle_request_error(err: reqwest::Error, host: &str, port: u16) -> anyhow::Error {
    if err.is_connect() || err.is_timeout() {
        anyhow::anyhow!("{}", connection_error_message(host, port))
    } else {
        anyhow::anyhow!("Request failed: {}", err)
    }
}

/// Read a daemon response as JSON, turning error bodies into an error.
pub async fn read_response(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        let message = body["message"].as_str().unwrap_or("Unknown error");
        anyhow::bail!("{} ({})", message, status.as_u16());
    }
    Ok(body)
}

/// Truncate `s` to `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let (host, port) = (cli.host.as_str(), cli.port);
    match &cli.command {
        Some(Commands::Serve {
            config,
            port: port_override,
            data_dir,
        }) => daemon::cmd_serve(host, config.as_deref(), *port_override, data_dir.as_deref()).await,
        Some(Commands::Status) => daemon::cmd_status(host, port, cli.verbose).await,
        Some(Commands::Ingest {
            keywords,
            location,
            source,
            limit,
        }) => {
            jobs::cmd_ingest(
                host,
                port,
                keywords,
                location.as_deref(),
                source.as_deref(),
                *limit,
            )
            .await
        }
        Some(Commands::Jobs { limit, json }) => jobs::cmd_jobs(host, port, *limit, *json).await,
        Some(Commands::Search { filter, json }) => {
            jobs::cmd_search(host, port, filter, *json).await
        }
        Some(Commands::Searches { action }) => match action {
            SearchesCommand::List { json } => searches::cmd_list(host, port, *json).await,
            SearchesCommand::Show { name } => searches::cmd_show(host, port, name).await,
            SearchesCommand::Feed { name, limit, json } => {
                searches::cmd_feed(host, port, name, *limit, *json).await
            }
            SearchesCommand::Add { name, filter } => {
                searches::cmd_add(host, port, name, filter).await
            }
        },
        Some(Commands::Run { name, all }) => {
            searches::cmd_run(host, port, name.as_deref(), *all).await
        }
        Some(Commands::New { name, count, json }) => {
            if *count {
                searches::cmd_new_count(host, port, name, *json).await
            } else {
                searches::cmd_new(host, port, name, *json).await
            }
        }
        Some(Commands::Dashboard { limit, json }) => {
            jobs::cmd_dashboard(host, port, *limit, *json).await
        }
        None => {
            // No subcommand provided -- print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
