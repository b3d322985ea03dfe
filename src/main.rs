use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};

mod api;
mod config;
mod daemon;
mod db;
mod error;
mod export;
mod feed;
mod interests;
mod models;
mod ranking;
mod rescore;
mod retention;
mod scoring;

use api::ApiState;
use config::Config;
use db::Repository;
use error::Result;
use feed::FeedFetcher;
use interests::InterestStore;
use models::NewFeed;

#[derive(Parser)]
#[command(name = "feedrank", about = "AI-ranked RSS feed service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage RSS feeds
    Feeds {
        #[command(subcommand)]
        command: FeedsCommand,
    },
    /// Fetch new articles from feeds
    Fetch {
        /// Fetch from a specific feed only
        #[arg(long)]
        feed_id: Option<i64>,
    },
    /// Scoring commands
    Score {
        #[command(subcommand)]
        command: ScoreCommand,
    },
    /// Run one background cycle: fetch, score, retention, rescore check
    Cycle,
    /// Run the background cycle on an interval, forever
    Daemon {
        /// Seconds between cycles (defaults to the configured value)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Start the HTTP API server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Manage the interest profile
    Interests {
        #[command(subcommand)]
        command: InterestsCommand,
    },
    /// Export scored articles to external services
    Export {
        #[command(subcommand)]
        command: ExportCommand,
    },
}

#[derive(Subcommand)]
enum FeedsCommand {
    /// Add a new RSS feed
    Add {
        url: String,
        /// Feed category
        #[arg(short, long, default_value = "")]
        category: String,
    },
    /// List all feeds
    List {
        #[arg(long)]
        enabled_only: bool,
    },
    /// Remove a feed by ID
    Remove { feed_id: i64 },
}

#[derive(Subcommand)]
enum ScoreCommand {
    /// Output unscored articles as JSON for external evaluation
    Prepare {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Write scores back to the database from a JSON array string
    Write { json: String },
    /// Write scores from a JSON file
    WriteFile { path: PathBuf },
}

#[derive(Subcommand)]
enum InterestsCommand {
    /// Print the current interest profile
    Show,
    /// Replace the interest profile from a YAML file
    Set { path: PathBuf },
}

#[derive(Subcommand)]
enum ExportCommand {
    /// Export scored articles to a Notion database
    Notion {
        /// Minimum relevance score to export
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let repo = Repository::new(&config.db_path).await?;
    let store = InterestStore::new(&config.interests_path);

    match cli.command {
        Command::Feeds { command } => feeds_command(&repo, command).await?,
        Command::Fetch { feed_id } => fetch_command(&repo, feed_id).await?,
        Command::Score { command } => score_command(&repo, &store, command).await?,
        Command::Cycle => {
            let fetcher = FeedFetcher::new();
            let stats =
                daemon::run_cycle(&repo, &store, &fetcher, config.scoring_batch_limit).await;
            println!(
                "Fetched: {}, Scored: {}, Archived: {}",
                stats.fetched, stats.scored, stats.archived
            );
        }
        Command::Daemon { interval } => {
            let secs = interval.unwrap_or(config.cycle_interval_secs);
            daemon::run_daemon(
                &repo,
                &store,
                Duration::from_secs(secs),
                config.scoring_batch_limit,
            )
            .await;
        }
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .map_err(|e| error::AppError::Config(format!("invalid bind address: {e}")))?;
            let state = ApiState {
                repo: Arc::new(repo),
                interests: Arc::new(store),
                token: config.api_token.clone(),
            };
            api::serve(state, addr).await?;
        }
        Command::Interests { command } => interests_command(&repo, &store, command).await?,
        Command::Export { command } => export_command(&repo, &config, command).await?,
    }

    Ok(())
}

async fn feeds_command(repo: &Repository, command: FeedsCommand) -> Result<()> {
    match command {
        FeedsCommand::Add { url, category } => {
            let fetcher = FeedFetcher::new();
            let mut new_feed = fetcher.discover_feed(&url).await.unwrap_or(NewFeed {
                url: url.clone(),
                title: String::new(),
                site_url: String::new(),
                category: String::new(),
            });
            new_feed.category = category;

            match repo.insert_feed(new_feed).await? {
                Some(feed) => {
                    let label = if feed.title.is_empty() {
                        &feed.url
                    } else {
                        &feed.title
                    };
                    println!("Added feed #{}: {}", feed.id, label);
                }
                None => {
                    eprintln!("Error: feed already exists: {url}");
                    std::process::exit(1);
                }
            }
        }
        FeedsCommand::List { enabled_only } => {
            let feeds = repo.get_all_feeds(enabled_only).await?;
            if feeds.is_empty() {
                println!("No feeds found. Add one with: feedrank feeds add <url>");
                return Ok(());
            }
            for f in feeds {
                let status = if f.enabled { "ON" } else { "OFF" };
                let fetched = f
                    .last_fetched_at
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                let label = if f.title.is_empty() { &f.url } else { &f.title };
                println!("  #{} [{}] {}", f.id, status, label);
                println!("       URL: {}", f.url);
                let category = if f.category.is_empty() {
                    "-"
                } else {
                    f.category.as_str()
                };
                println!("       Category: {}  Last fetched: {}", category, fetched);
            }
        }
        FeedsCommand::Remove { feed_id } => {
            if repo.delete_feed(feed_id).await? {
                println!("Removed feed #{feed_id}");
            } else {
                eprintln!("Feed #{feed_id} not found");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn fetch_command(repo: &Repository, feed_id: Option<i64>) -> Result<()> {
    let fetcher = FeedFetcher::new();
    let feeds = match feed_id {
        Some(id) => match repo.get_feed(id).await? {
            Some(feed) => vec![feed],
            None => {
                eprintln!("Feed #{id} not found");
                std::process::exit(1);
            }
        },
        None => repo.get_all_feeds(true).await?,
    };

    println!("Fetching articles...");
    let mut total = 0usize;
    for feed in feeds {
        let label = if feed.title.is_empty() {
            feed.url.clone()
        } else {
            feed.title.clone()
        };
        match fetcher.fetch_feed(feed.id, &feed.url).await {
            Ok(articles) => {
                let mut new_count = 0usize;
                for article in articles {
                    if repo.insert_article(article, Utc::now()).await? {
                        new_count += 1;
                    }
                }
                repo.update_feed_last_fetched(feed.id, Utc::now()).await?;
                println!("  {label}: {new_count} new articles");
                total += new_count;
            }
            Err(e) => {
                println!("  {label}: ERROR ({e})");
            }
        }
    }
    println!("Total: {total} new articles");
    Ok(())
}

async fn score_command(
    repo: &Repository,
    store: &InterestStore,
    command: ScoreCommand,
) -> Result<()> {
    match command {
        ScoreCommand::Prepare { limit } => {
            let interests = store.load()?;
            match scoring::prepare_batch(repo, &interests, limit).await? {
                Some(batch) => println!("{batch}"),
                None => println!("{}", serde_json::json!({ "status": "no_unscored_articles", "count": 0 })),
            }
        }
        ScoreCommand::Write { json } => {
            let items = scoring::parse_score_items(&json)?;
            let written = repo.upsert_scores(items, Utc::now()).await?;
            println!("Wrote {written} scores");
        }
        ScoreCommand::WriteFile { path } => {
            let json = std::fs::read_to_string(&path)?;
            let items = scoring::parse_score_items(&json)?;
            let written = repo.upsert_scores(items, Utc::now()).await?;
            println!("Wrote {written} scores");
        }
    }
    Ok(())
}

async fn interests_command(
    repo: &Repository,
    store: &InterestStore,
    command: InterestsCommand,
) -> Result<()> {
    match command {
        InterestsCommand::Show => {
            let profile = store.load()?;
            println!("{}", serde_yaml::to_string(&profile)?);
        }
        InterestsCommand::Set { path } => {
            let content = std::fs::read_to_string(&path)?;
            let profile: models::InterestProfile = serde_yaml::from_str(&content)?;
            store.save(repo, &profile).await?;
            println!("Saved interest profile ({} topics)", profile.topics.len());
        }
    }
    Ok(())
}

async fn export_command(repo: &Repository, config: &Config, command: ExportCommand) -> Result<()> {
    match command {
        ExportCommand::Notion { min_score, limit } => {
            let token = config
                .notion_token
                .clone()
                .or_else(|| std::env::var("NOTION_TOKEN").ok())
                .ok_or_else(|| {
                    error::AppError::Config("notion_token not configured".to_string())
                })?;
            let database_id = config
                .notion_database_id
                .clone()
                .or_else(|| std::env::var("NOTION_DATABASE_ID").ok())
                .ok_or_else(|| {
                    error::AppError::Config("notion_database_id not configured".to_string())
                })?;

            println!("Exporting to Notion...");
            let exporter = export::NotionExporter::new(token, database_id);
            let stats = exporter.export(repo, min_score, limit).await?;
            println!(
                "Done! Exported: {}, Skipped (duplicate): {}, Errors: {}",
                stats.exported, stats.skipped_duplicate, stats.errors
            );
        }
    }
    Ok(())
}
