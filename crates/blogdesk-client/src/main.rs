//! blogdesk admin command-line client
//!
//! Lists one page of any dashboard resource through the same query engine
//! the dashboard uses, and runs the destructive writes an operator most
//! often needs from a shell.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use anyhow::{Context, Result, bail};
use blogdesk_client::{AdminApi, ApiClient, MutationOutcome, resources};
use blogdesk_core::utils::parse_calendar_date;
use blogdesk_core::{Config, SortOrder};
use blogdesk_query::{
    DateRange, FetchError, FetchState, InvalidationBus, ListController, ListView, QueryCache,
    RemoteListFetcher, ScopeSegment,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Command line interface for the blogdesk admin API
#[derive(Parser)]
#[command(
    name = "blogdesk-admin",
    version = env!("CARGO_PKG_VERSION"),
    about = "Command-line client for the blogdesk admin dashboard API"
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// API base URL (overrides configuration)
    #[arg(long, env = "BLOGDESK_API_URL", value_name = "URL")]
    base_url: Option<String>,

    /// Session token (overrides configuration)
    #[arg(long, env = "BLOGDESK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Print one page of a resource
    List {
        /// Resource name, see `resources`
        resource: String,

        /// Page number, 1-based
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Items per page
        #[arg(short, long)]
        limit: Option<u32>,

        /// Sort order (asc, desc)
        #[arg(short, long)]
        order: Option<SortOrder>,

        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,

        /// First day included
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Last day included; needs --from
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date, requires = "from")]
        to: Option<NaiveDate>,

        /// Filter values, repeatable
        #[arg(long, value_name = "NAME=V1,V2", value_parser = parse_filter)]
        filter: Vec<FilterArg>,

        /// Scope segment, repeatable
        #[arg(long, value_name = "NAME=VALUE")]
        scope: Vec<ScopeSegment>,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a user
    DeleteUser {
        /// User id
        id: u64,
    },

    /// Delete a scheduled blog topic
    DeleteTopic {
        /// Topic id
        id: u64,
    },

    /// End the session on the server
    Logout,

    /// Show the resource catalogue
    Resources,
}

/// One `--filter` argument
#[derive(Debug, Clone)]
struct FilterArg {
    name: String,
    values: Vec<String>,
}

fn parse_filter(arg: &str) -> std::result::Result<FilterArg, String> {
    let (name, values) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=V1,V2, got {arg:?}"))?;
    if name.is_empty() {
        return Err("filter name must not be empty".to_string());
    }
    Ok(FilterArg {
        name: name.to_string(),
        values: values
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
            .collect(),
    })
}

fn parse_date(arg: &str) -> std::result::Result<NaiveDate, String> {
    parse_calendar_date(arg).map_err(|e| e.to_string())
}

/// Date filter from `--from` and `--to`
fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Option<DateRange>> {
    let Some(from) = from else {
        return Ok(None);
    };
    let range = match to {
        Some(to) => DateRange::between(from, to).context("Invalid --to")?,
        None => DateRange::on(from),
    };
    Ok(Some(range))
}

/// Options of the `list` subcommand
struct ListArgs {
    resource: String,
    page: u32,
    limit: Option<u32>,
    order: Option<SortOrder>,
    search: Option<String>,
    date_range: Option<DateRange>,
    filters: Vec<FilterArg>,
    scope: Vec<ScopeSegment>,
    json: bool,
}

/// Main entry point for the admin client
///
/// # Errors
///
/// Returns error if configuration, the request, or output fails
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(token) = cli.token {
        config.api.access_token = Some(token);
    }

    blogdesk_core::init_logging(&config.logging).context("Failed to initialize logging")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.api.base_url,
        "blogdesk-admin starting"
    );

    match cli.command {
        Commands::List {
            resource,
            page,
            limit,
            order,
            search,
            from,
            to,
            filter,
            scope,
            json,
        } => {
            let limit = limit
                .map(|limit| config.query.check_page_size(limit))
                .transpose()
                .context("Invalid --limit")?;
            let args = ListArgs {
                resource,
                page,
                limit,
                order,
                search,
                date_range: date_range(from, to)?,
                filters: filter,
                scope,
                json,
            };
            list(&config, args).await
        }
        Commands::DeleteUser { id } => {
            let outcome = admin(&config)?.delete_user(id).await?;
            report(&format!("Deleted user {id}"), &outcome);
            Ok(())
        }
        Commands::DeleteTopic { id } => {
            let outcome = admin(&config)?.delete_topic(id).await?;
            report(&format!("Deleted topic {id}"), &outcome);
            Ok(())
        }
        Commands::Logout => {
            let outcome = admin(&config)?.logout().await?;
            report("Logged out", &outcome);
            Ok(())
        }
        Commands::Resources => {
            show_resources();
            Ok(())
        }
    }
}

/// Load configuration from file or environment
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn admin(config: &Config) -> Result<AdminApi> {
    let client = ApiClient::from_config(&config.api)?;
    let cache = Arc::new(QueryCache::new(config.query.gc_time()));
    Ok(AdminApi::new(client, InvalidationBus::new(cache)))
}

async fn list(config: &Config, args: ListArgs) -> Result<()> {
    let Some(spec) = resources::lookup(&args.resource) else {
        bail!("Unknown resource {:?}; run `blogdesk-admin resources`", args.resource);
    };

    let client = ApiClient::from_config(&config.api)?;
    let cache = Arc::new(QueryCache::new(config.query.gc_time()));
    let fetcher = RemoteListFetcher::from_config(Arc::new(client), cache, &config.query);

    let limit = args
        .limit
        .or(spec.default_limit)
        .unwrap_or(config.query.default_limit);
    let order = args.order.unwrap_or(config.query.default_order);

    let mut controller =
        ListController::new(spec.name, limit, order, config.query.search_debounce());
    for segment in args.scope {
        controller.set_scope(segment.name, segment.value);
    }
    if let Some(search) = args.search {
        controller.set_search_term(search, Instant::now());
        controller.flush_search();
    }
    controller.set_date_range(args.date_range);
    for filter in args.filters {
        controller.set_filter(filter.name, filter.values);
    }
    controller.set_page(args.page);

    let mut view: ListView<Value> = ListView::new(controller, fetcher);
    let outcome = view.settle(3).await;
    debug!(?outcome, key = %view.controller().current_key(), "List view settled");

    if view.controller().pagination().page() != args.page {
        eprintln!(
            "Page {} is past the end; showing page {}",
            args.page,
            view.controller().pagination().page()
        );
    }

    let page = match view.state() {
        FetchState::Success(page) => Arc::clone(page),
        FetchState::Error(e @ FetchError::SessionExpired { .. }) => {
            bail!("{e}; log in again and update the access token")
        }
        FetchState::Error(e) => bail!("Failed to list {}: {e}", spec.name),
        FetchState::Pending => bail!("No response for {}", spec.name),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page.results)?);
    } else {
        for item in &page.results {
            println!("{item}");
        }
    }
    println!("{} ({} total)", view.controller().page_label(), page.count);

    view.unmount();
    Ok(())
}

fn report(action: &str, outcome: &MutationOutcome) {
    let prefixes: Vec<String> = outcome.invalidated.iter().map(ToString::to_string).collect();
    println!("{action}");
    println!("Invalidated: {}", prefixes.join(", "));
}

fn show_resources() {
    println!("{:<20} {:>8}  PATH", "RESOURCE", "STALE");
    for spec in resources::RESOURCES {
        println!(
            "{:<20} {:>7}s  {}",
            spec.name,
            spec.stale_time.as_secs(),
            spec.path
        );
    }
}
