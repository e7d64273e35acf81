//! WackyDocs offline worker host.
//!
//! Drives the offline worker from the command line. Bucket contents persist
//! between invocations in a JSON snapshot; queued mutations persist in
//! SQLite.
//!
//! ## Usage
//!
//! ```bash
//! # Populate the static bucket and take over
//! wackydocs-sw install
//!
//! # Resolve a navigation through the cache
//! wackydocs-sw fetch /dashboard --navigate
//!
//! # Queue a word while offline, replay it later
//! wackydocs-sw queue vocabulary '{"word": "apple", "meaning": "사과"}'
//! wackydocs-sw sync vocabulary-sync
//! ```

mod api;
mod state;

use std::path::PathBuf;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use http::Method;
use swkit_common::{init_logging, LogConfig, LogFormat};
use swkit_net::{resolve, Destination, Request};
use swkit_queue::{OfflineStore, QueueKind};
use swkit_sw::{FetchOutcome, ServiceWorkerEvent};
use tracing::{info, warn};
use wackydocs_core::types::CsrfToken;
use wackydocs_core::AppConfig;

use api::SiteClient;
use state::HostState;

#[derive(Parser)]
#[command(name = "wackydocs-sw")]
#[command(author, version, about = "WackyDocs offline worker host", long_about = None)]
struct Cli {
    /// Config file (JSON); defaults to the platform config dir
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log format: pretty, compact or json
    #[arg(long, default_value = "compact", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Worker(WorkerCommands),

    /// Delete a vocabulary entry through the site API
    DeleteVocab {
        id: u64,
        #[command(flatten)]
        csrf: CsrfArgs,
    },

    /// Delete a vocabulary category through the site API
    DeleteCategory {
        id: u64,
        #[command(flatten)]
        csrf: CsrfArgs,
    },
}

/// Commands that run against the offline worker.
#[derive(Subcommand)]
enum WorkerCommands {
    /// Run the install handler, then activate if it asked to skip waiting
    Install,

    /// Run the activate handler
    Activate,

    /// Pass a request through the fetch handler
    Fetch {
        /// Absolute URL or path relative to the origin
        url: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Print the response body
        #[arg(long)]
        body: bool,
    },

    /// Fire a background sync event
    Sync {
        /// vocabulary-sync or quiz-score-sync
        tag: String,
    },

    /// Deliver a push message
    Push {
        /// JSON payload {"title", "body", "tag"?}; omit for an empty push
        payload: Option<String>,
    },

    /// Click a notification
    Click {
        /// open or close; omit for a click on the notification body
        action: Option<String>,
        /// Notification tag
        #[arg(long, default_value = "wackydocs-notification")]
        tag: String,
    },

    /// Queue a mutation for the next sync
    Queue {
        /// vocabulary or quiz-score
        kind: String,
        /// JSON payload
        payload: String,
    },

    /// Show buckets and queue sizes
    Status,
}

#[derive(clap::Args)]
struct CsrfArgs {
    /// Use this CSRF token instead of scraping one
    #[arg(long)]
    token: Option<String>,
    /// Page to scrape the CSRF token from
    #[arg(long, default_value = "/dashboard")]
    page: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format: LogFormat = cli.log_format.parse()?;
    init_logging(LogConfig::from_verbosity(cli.verbose).with_format(format))?;

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::DeleteVocab { id, csrf } => {
            let client = site_client(&config)?;
            let token = csrf_token(&client, csrf).await?;
            report_delete("Vocabulary", id, client.delete_vocab(id, &token).await?.success);
            Ok(())
        }
        Commands::DeleteCategory { id, csrf } => {
            let client = site_client(&config)?;
            let token = csrf_token(&client, csrf).await?;
            report_delete("Category", id, client.delete_category(id, &token).await?.success);
            Ok(())
        }
        Commands::Worker(command) => {
            let mut host = HostState::open(config).context("failed to start worker")?;
            let result = run_worker_command(&host, command).await;

            for event in host.drain_events() {
                log_event(&event);
            }
            host.persist().await.context("failed to save cache snapshot")?;
            result
        }
    }
}

async fn run_worker_command(host: &HostState, command: WorkerCommands) -> anyhow::Result<()> {
    let worker = &host.worker;

    match command {
        WorkerCommands::Install => {
            let report = worker.install().await;
            match &report.error {
                None => println!("Cached {} files into {}", report.cached, report.cache),
                Some(e) => println!("Install finished without caching: {e}"),
            }
            if report.skip_waiting {
                let activated = worker.activate().await;
                println!(
                    "Activated; removed {} old bucket(s)",
                    activated.deleted.len()
                );
            }
        }

        WorkerCommands::Activate => {
            let report = worker.activate().await;
            for name in &report.deleted {
                println!("Deleted {name}");
            }
            println!("Claimed {} client(s)", report.claimed);
        }

        WorkerCommands::Fetch {
            url,
            navigate,
            method,
            body,
        } => {
            let origin = host.config.origin()?;
            let url = resolve(&origin, &url)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid method {method}"))?;

            let mut request = Request::new(method, url);
            if navigate {
                request = request.destination(Destination::Document);
            }

            match worker.handle_fetch(request).await? {
                FetchOutcome::Bypass => println!("Not intercepted"),
                FetchOutcome::Respond { response, source } => {
                    println!(
                        "{} from {:?} ({} bytes)",
                        response.status,
                        source,
                        response.body.len()
                    );
                    if body {
                        match response.text() {
                            Ok(text) => println!("{text}"),
                            Err(_) => println!("<binary body>"),
                        }
                    }
                }
            }
        }

        WorkerCommands::Sync { tag } => {
            let report = worker.handle_sync(&tag).await;
            if let Some(e) = &report.error {
                bail!("sync {tag} failed: {e}");
            }
            println!(
                "{}: {} replayed, {} rejected, {} kept",
                report.tag, report.replayed, report.rejected, report.kept
            );
            if report.stranded > 0 {
                println!("{} delivered item(s) could not be dequeued", report.stranded);
            }
        }

        WorkerCommands::Push { payload } => {
            let data = payload.map(Bytes::from);
            match worker.handle_push(data.as_deref()).await? {
                Some(notification) => {
                    println!("Showing [{}] {}", notification.tag, notification.title)
                }
                None => println!("Empty push ignored"),
            }
        }

        WorkerCommands::Click { action, tag } => {
            match worker
                .handle_notification_click(&tag, action.as_deref())
                .await?
            {
                Some(client) => println!("Opened {}", client.url),
                None => println!("Dismissed"),
            }
        }

        WorkerCommands::Queue { kind, payload } => {
            let kind: QueueKind = kind.parse()?;
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("payload is not JSON")?;
            let item = worker.queue_offline(kind, payload).await?;
            println!("Queued {} item {}", item.kind, item.id);
        }

        WorkerCommands::Status => {
            let config = worker.config();
            println!("Version: {}", config.version);
            {
                let caches = worker.caches();
                let caches = caches.read().await;
                for name in caches.keys() {
                    let entries = caches.get(name).map_or(0, |c| c.len());
                    println!("  {name}: {entries} entries");
                }
            }
            let store = worker.store();
            for kind in [QueueKind::Vocabulary, QueueKind::QuizScore] {
                println!("  queued {kind}: {}", store.len(kind).await?);
            }
        }
    }

    Ok(())
}

fn site_client(config: &AppConfig) -> anyhow::Result<SiteClient> {
    Ok(SiteClient::new(
        config.origin()?,
        &config.user_agent,
        config.request_timeout(),
    )?)
}

async fn csrf_token(client: &SiteClient, args: CsrfArgs) -> anyhow::Result<CsrfToken> {
    match args.token {
        Some(token) => Ok(CsrfToken(token)),
        None => Ok(client.csrf_token(&args.page).await?),
    }
}

fn report_delete(what: &str, id: u64, success: bool) {
    if success {
        println!("{what} {id} deleted");
    } else {
        println!("{what} {id} could not be deleted");
    }
}

fn log_event(event: &ServiceWorkerEvent) {
    match event {
        ServiceWorkerEvent::StateChange {
            worker_id,
            new_state,
        } => info!(?worker_id, ?new_state, "Worker state changed"),
        ServiceWorkerEvent::ControllerChange { client_id } => {
            info!(client_id = %client_id, "Controller changed")
        }
        ServiceWorkerEvent::NotificationShown(n) => info!(tag = %n.tag, "Notification shown"),
        ServiceWorkerEvent::NotificationClosed { tag } => info!(tag = %tag, "Notification closed"),
        ServiceWorkerEvent::WindowOpened { client_id, url } => {
            info!(client_id = %client_id, url = %url, "Window opened")
        }
        ServiceWorkerEvent::SyncCompleted(report) if report.kept + report.stranded > 0 => {
            warn!(
                tag = %report.tag,
                kept = report.kept,
                stranded = report.stranded,
                "Sync left items queued"
            )
        }
        ServiceWorkerEvent::SyncCompleted(report) => {
            info!(tag = %report.tag, replayed = report.replayed, "Sync completed")
        }
    }
}
