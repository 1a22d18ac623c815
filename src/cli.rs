//! Command-line interface for the challenge data proxy
//!
//! Parses arguments with clap and runs one command against the on-disk
//! cache: read the data, query the table, export rows, purge or inspect the
//! cache entry.

use clap::{Args, Parser, Subcommand};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::admin::{NoticeLevel, TableController};
use crate::cache::{Cache, CacheError, DiskStore};
use crate::config::{AppConfig, ConfigError};
use crate::data::{DataNormalizer, RemoteDataSource, TransportError};
use crate::endpoint::{Caller, DataEndpoint};
use crate::export::{select_for_export, to_csv, EmptySelectionError, ExportError};
use crate::proxy::{DatasetProxy, FetchError};
use crate::request::RequestParams;

/// Error types for running CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("could not set up the upstream client: {0}")]
    Client(#[from] TransportError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// The endpoint answered with an error body
    #[error("request failed with status {status}: {message}")]
    Request { status: u16, message: String },

    #[error("{0}")]
    Cache(#[from] CacheError),

    #[error("no cache directory available; pass --cache-dir")]
    NoCacheDir,

    #[error("{0}")]
    EmptySelection(#[from] EmptySelectionError),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("{0}")]
    Table(String),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cached proxy over the challenge data API
#[derive(Parser, Debug)]
#[command(name = "mp-challenge")]
#[command(about = "Cached proxy over the challenge data API")]
#[command(version)]
pub struct Cli {
    /// Upstream URL to fetch the data from
    #[arg(long, global = true, value_name = "URL")]
    pub upstream_url: Option<String>,

    /// Directory holding the cached dataset
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Cache bypass flags shared by the reading commands
#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheFlags {
    /// Refetch even when the cached data is fresh
    #[arg(long, conflicts_with = "reset")]
    pub refresh: bool,

    /// Drop the cached data, then read again
    #[arg(long)]
    pub reset: bool,
}

impl CacheFlags {
    fn apply(self, params: RequestParams) -> RequestParams {
        match (self.refresh, self.reset) {
            (_, true) => params.with("reset", "1"),
            (true, false) => params.with("refresh", "1"),
            _ => params,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the dataset as JSON
    GetData {
        #[command(flatten)]
        cache: CacheFlags,
    },

    /// Print one page of the table view as JSON
    Table {
        /// Case-insensitive search text
        #[arg(short = 's', long = "search")]
        search: Option<String>,

        /// Month bucket to show, e.g. Mar-2019
        #[arg(long)]
        date_filter: Option<String>,

        /// Column to sort by (id, fname, lname, email, date)
        #[arg(long)]
        orderby: Option<String>,

        /// Sort direction (asc or desc)
        #[arg(long)]
        order: Option<String>,

        #[arg(long)]
        page: Option<usize>,

        #[arg(long)]
        per_page: Option<usize>,

        #[command(flatten)]
        cache: CacheFlags,
    },

    /// Export the selected rows as CSV
    Export {
        /// Row id to export; repeat for several rows
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<i64>,

        /// Write to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Drop the cached data without fetching
    Purge,

    /// Show the state of the cached data
    Status,
}

impl Cli {
    /// Applies the global flags on top of `config`
    pub fn apply_overrides(&self, config: AppConfig) -> Result<AppConfig, CliError> {
        let config = match &self.upstream_url {
            Some(url) => config.with_upstream_url(url)?,
            None => config,
        };
        Ok(match &self.cache_dir {
            Some(dir) => config.with_cache_dir(dir),
            None => config,
        })
    }
}

/// Assembles the cached proxy described by `config`
pub fn build_proxy(config: &AppConfig) -> Result<DatasetProxy, CliError> {
    let source = RemoteDataSource::new(config.upstream_url.clone(), config.timeout)?;
    let store = match &config.cache_dir {
        Some(dir) => DiskStore::with_dir(dir),
        None => DiskStore::new().ok_or(CliError::NoCacheDir)?,
    };
    Ok(DatasetProxy::new(
        Arc::new(source),
        DataNormalizer::new().with_date_format(config.date_format.clone()),
        Cache::new(store, config.cache_ttl),
    ))
}

/// Runs `command`, writing its output to `out`
pub async fn run(command: Command, config: &AppConfig, out: &mut dyn Write) -> Result<(), CliError> {
    // Checked before any I/O so an empty selection never touches the network
    if let Command::Export { ids, .. } = &command {
        if ids.is_empty() {
            return Err(EmptySelectionError.into());
        }
    }

    let proxy = Arc::new(build_proxy(config)?);

    match command {
        Command::GetData { cache } => {
            // The local user counts as logged in
            let endpoint = DataEndpoint::new(proxy).require_login(config.require_login);
            let response = endpoint
                .handle(Caller::Authenticated, &cache.apply(RequestParams::new()))
                .await;
            if !response.is_success() {
                return Err(CliError::Request {
                    status: response.status,
                    message: response.body["message"].as_str().unwrap_or_default().to_string(),
                });
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&response.body)?)?;
        }
        Command::Table {
            search,
            date_filter,
            orderby,
            order,
            page,
            per_page,
            cache,
        } => {
            let mut params = RequestParams::new();
            let pairs = [
                ("s", search),
                ("date-filter", date_filter),
                ("orderby", orderby),
                ("order", order),
                ("paged", page.map(|p| p.to_string())),
                ("per_page", per_page.map(|p| p.to_string())),
            ];
            for (key, value) in pairs {
                if let Some(value) = value {
                    params = params.with(key, value);
                }
            }

            let controller = TableController::new(proxy).per_page(config.per_page);
            let page = controller.render(&cache.apply(params)).await;

            let Some(view) = page.view else {
                let message = page
                    .notices
                    .iter()
                    .find(|n| n.level == NoticeLevel::Error)
                    .map(|n| n.message.clone())
                    .unwrap_or_else(|| "no data available".to_string());
                return Err(CliError::Table(message));
            };
            for notice in &page.notices {
                eprintln!("{}", notice.message);
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
        }
        Command::Export { ids, output } => {
            let dataset = proxy.get_or_refresh(false).await?;
            let selected: HashSet<i64> = ids.into_iter().collect();
            let rows = select_for_export(&dataset, &selected)?;
            let csv = to_csv(&dataset, &rows)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)?;
                    writeln!(out, "Exported {} row(s) to {}", rows.len(), path.display())?;
                }
                None => out.write_all(csv.as_bytes())?,
            }
        }
        Command::Purge => {
            let existed = proxy.invalidate()?;
            if existed {
                writeln!(out, "Success: cached data purged")?;
            } else {
                writeln!(out, "Success: no cached data to purge")?;
            }
        }
        Command::Status => match proxy.cached_entry() {
            Some(entry) => {
                writeln!(out, "cached: yes")?;
                writeln!(out, "rows: {}", entry.value.rows.len())?;
                writeln!(out, "stored at: {}", entry.stored_at.to_rfc3339())?;
                if let Some(expires) = entry.expires_at() {
                    writeln!(out, "expires at: {}", expires.to_rfc3339())?;
                }
                writeln!(out, "expired: {}", if entry.is_expired() { "yes" } else { "no" })?;
            }
            None => writeln!(out, "cached: no")?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheStore};
    use crate::data::{Dataset, Row};
    use std::time::Duration;
    use tempfile::TempDir;

    fn offline_config(dir: &TempDir) -> AppConfig {
        AppConfig::default()
            // Nothing listens on port 9; any fetch fails fast
            .with_upstream_url("http://127.0.0.1:9/")
            .unwrap()
            .with_cache_dir(dir.path())
    }

    fn seed(dir: &TempDir) {
        let dataset = Dataset {
            title: Some("People".to_string()),
            headers: ["ID", "First Name", "Last Name", "Email", "Date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: vec![
                Row {
                    fname: Some("Ann".to_string()),
                    date: Some("March 18, 2019".to_string()),
                    timestamp: Some(1552944355),
                    ..Row::new(1)
                },
                Row {
                    fname: Some("Bo".to_string()),
                    date: Some("April 23, 2019".to_string()),
                    timestamp: Some(1556000000),
                    ..Row::new(2)
                },
            ],
        };
        let store = DiskStore::with_dir(dir.path());
        store
            .write(
                crate::proxy::CACHE_KEY,
                &CacheEntry::new(dataset, Duration::from_secs(3600)),
            )
            .unwrap();
    }

    async fn run_to_string(command: Command, config: &AppConfig) -> Result<String, CliError> {
        let mut out = Vec::new();
        run(command, config, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_table_arguments() {
        let cli = Cli::parse_from([
            "mp-challenge",
            "table",
            "-s",
            "bo",
            "--orderby",
            "date",
            "--order",
            "desc",
            "--page",
            "2",
            "--refresh",
        ]);
        match cli.command {
            Command::Table {
                search,
                orderby,
                order,
                page,
                cache,
                ..
            } => {
                assert_eq!(search.as_deref(), Some("bo"));
                assert_eq!(orderby.as_deref(), Some("date"));
                assert_eq!(order.as_deref(), Some("desc"));
                assert_eq!(page, Some(2));
                assert!(cache.refresh);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_refresh_and_reset_conflict() {
        assert!(Cli::try_parse_from(["mp-challenge", "get-data", "--refresh", "--reset"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["mp-challenge", "purge", "--cache-dir", "/tmp/x"]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.command, Command::Purge);
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "mp-challenge",
            "--upstream-url",
            "http://localhost:1/",
            "status",
        ]);
        let config = cli.apply_overrides(AppConfig::default()).unwrap();
        assert_eq!(config.upstream_url, "http://localhost:1/");
        assert_eq!(config.cache_dir, None);

        let bad = Cli::parse_from(["mp-challenge", "--upstream-url", "nope", "status"]);
        assert!(matches!(
            bad.apply_overrides(AppConfig::default()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_cache_flags_map_to_request_parameters() {
        let reset = CacheFlags { refresh: false, reset: true }.apply(RequestParams::new());
        assert!(reset.flag("reset"));
        let refresh = CacheFlags { refresh: true, reset: false }.apply(RequestParams::new());
        assert!(refresh.flag("refresh"));
        assert!(CacheFlags::default().apply(RequestParams::new()).is_empty());
    }

    #[tokio::test]
    async fn test_export_without_ids_fails() {
        let dir = TempDir::new().unwrap();
        let result = run_to_string(
            Command::Export { ids: vec![], output: None },
            &offline_config(&dir),
        )
        .await;
        assert!(matches!(result, Err(CliError::EmptySelection(_))));
    }

    #[tokio::test]
    async fn test_export_from_cache_to_stdout() {
        let dir = TempDir::new().unwrap();
        seed(&dir);

        let csv = run_to_string(
            Command::Export { ids: vec![2, 1], output: None },
            &offline_config(&dir),
        )
        .await
        .unwrap();

        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert!(lines[1].starts_with("\"1\",\"Ann\""));
        assert!(lines[2].starts_with("\"2\",\"Bo\""));
    }

    #[tokio::test]
    async fn test_export_to_file() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let path = dir.path().join("out.csv");

        let message = run_to_string(
            Command::Export { ids: vec![1], output: Some(path.clone()) },
            &offline_config(&dir),
        )
        .await
        .unwrap();

        assert!(message.contains("Exported 1 row(s)"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"Ann\""));
    }

    #[tokio::test]
    async fn test_table_from_cache() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let command = Cli::parse_from(["mp-challenge", "table", "-s", "bo"]).command;

        let json = run_to_string(command, &offline_config(&dir)).await.unwrap();

        let view: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(view["total_items"], 1);
        assert_eq!(view["rows"][0]["id"], 2);
        assert_eq!(view["columns"][0]["key"], "cb");
    }

    #[tokio::test]
    async fn test_table_without_data_fails() {
        let dir = TempDir::new().unwrap();
        let command = Cli::parse_from(["mp-challenge", "table"]).command;

        let result = run_to_string(command, &offline_config(&dir)).await;

        assert!(matches!(result, Err(CliError::Table(_))));
    }

    #[tokio::test]
    async fn test_get_data_failure_reports_status() {
        let dir = TempDir::new().unwrap();
        let command = Cli::parse_from(["mp-challenge", "get-data"]).command;

        let result = run_to_string(command, &offline_config(&dir)).await;

        assert!(matches!(result, Err(CliError::Request { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_get_data_serves_cache() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let command = Cli::parse_from(["mp-challenge", "get-data"]).command;

        let json = run_to_string(command, &offline_config(&dir)).await.unwrap();

        let body: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(body["title"], "People");
        assert_eq!(body["rows"].as_array().map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn test_purge_and_status() {
        let dir = TempDir::new().unwrap();
        seed(&dir);
        let config = offline_config(&dir);

        let status = run_to_string(Command::Status, &config).await.unwrap();
        assert!(status.contains("cached: yes"));
        assert!(status.contains("rows: 2"));
        assert!(status.contains("expired: no"));

        let purged = run_to_string(Command::Purge, &config).await.unwrap();
        assert!(purged.contains("purged"));
        let again = run_to_string(Command::Purge, &config).await.unwrap();
        assert!(again.contains("no cached data"));

        let status = run_to_string(Command::Status, &config).await.unwrap();
        assert_eq!(status.trim(), "cached: no");
    }
}
