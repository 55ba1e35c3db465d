//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the parsed arguments
//! and returns an `anyhow::Result<()>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::cover::CoverStore;
use crate::db;
use crate::model::BookMetadata;
use crate::reconcile::backup::BackupStore;
use crate::reconcile::providers::google::GoogleBooksClient;
use crate::reconcile::throttle::RateLimiter;
use crate::reconcile::{
    ConsolidatedMetadata, Event, EventBus, FieldOptions, MetadataWriter, ProviderChain,
    ProviderId, ProviderRegistry, ReconciliationEngine, RefreshOptions, RefreshRequest,
    RefreshSelection, TaskTracker,
};

/// Book Minder CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Add a book file to the library
    Add {
        /// Path to the book file
        path: PathBuf,
        /// Library the book belongs to
        #[arg(short, long, default_value = "1")]
        library: i64,
        /// Initial title
        #[arg(long)]
        title: Option<String>,
        /// Initial author
        #[arg(long)]
        author: Option<String>,
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List all books in the database
    List {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Refresh metadata from external providers
    Refresh {
        /// Refresh every book in this library
        #[arg(short, long, conflicts_with = "book")]
        library: Option<i64>,
        /// Refresh specific book IDs
        #[arg(short, long)]
        book: Vec<i64>,
        /// Stage results as proposals for review instead of applying them
        #[arg(long)]
        review: bool,
        /// Use system-default provider settings
        #[arg(short, long)]
        quick: bool,
        /// Provider trust order, most trusted first (e.g. --provider google --provider amazon)
        #[arg(short, long)]
        provider: Vec<String>,
        /// Union fetched categories with existing ones instead of replacing
        #[arg(long)]
        merge_categories: bool,
        /// Download and replace cover images
        #[arg(long)]
        refresh_covers: bool,
        /// Google Books API key (or set GOOGLE_BOOKS_API_KEY env var)
        #[arg(long, env = "GOOGLE_BOOKS_API_KEY")]
        api_key: Option<String>,
        /// User recorded as the batch owner
        #[arg(long, default_value = "1")]
        user: i64,
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List refresh jobs that need attention
    Jobs {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show one job and its pending proposals
    Job {
        /// Job ID
        id: i64,
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Accept or reject a proposal
    Review {
        /// Job the proposal belongs to
        job: i64,
        /// Proposal ID
        proposal: i64,
        /// Decision: accepted or rejected
        status: String,
        /// User recorded as the reviewer
        #[arg(long, default_value = "1")]
        user: i64,
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Delete a refresh job and its proposals
    DeleteJob {
        /// Job ID
        id: i64,
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Add {
            path,
            library,
            title,
            author,
            db,
        } => cmd_add(&rt, path, *library, title.as_deref(), author.as_deref(), db.as_deref()),
        Commands::List { db } => cmd_list(&rt, db.as_deref()),
        Commands::Refresh {
            library,
            book,
            review,
            quick,
            provider,
            merge_categories,
            refresh_covers,
            api_key,
            user,
            db,
        } => cmd_refresh(
            &rt,
            RefreshArgs {
                library: *library,
                books: book.clone(),
                review: *review,
                quick: *quick,
                providers: provider.clone(),
                merge_categories: *merge_categories,
                refresh_covers: *refresh_covers,
                api_key: api_key.clone(),
                user: *user,
            },
            db.as_deref(),
        ),
        Commands::Jobs { db } => cmd_jobs(&rt, db.as_deref()),
        Commands::Job { id, db } => cmd_job(&rt, *id, db.as_deref()),
        Commands::Review {
            job,
            proposal,
            status,
            user,
            db,
        } => cmd_review(&rt, *job, *proposal, status, *user, db.as_deref()),
        Commands::DeleteJob { id, db } => cmd_delete_job(&rt, *id, db.as_deref()),
    }
}

struct RefreshArgs {
    library: Option<i64>,
    books: Vec<i64>,
    review: bool,
    quick: bool,
    providers: Vec<String>,
    merge_categories: bool,
    refresh_covers: bool,
    api_key: Option<String>,
    user: i64,
}

/// Database URL: CLI flag wins, then the config file, then the default name
/// in the working directory.
fn database_url(cli_path: Option<&std::path::Path>, config: &Config) -> String {
    match cli_path {
        Some(p) => db::db_url(Some(p)),
        None => db::db_url(config.database.path.as_deref()),
    }
}

/// Register every provider client this binary ships. Scraper-backed sources
/// have no client here; the engine logs and skips them if configured.
fn build_registry(google_api_key: Option<String>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_with_limiter(
        Arc::new(GoogleBooksClient::new(google_api_key)),
        RateLimiter::new(Duration::from_millis(250)),
    );
    registry
}

/// Turn an ordered provider list (most trusted first) into refresh options
/// where every field uses the same chain.
fn options_from_providers(
    providers: &[String],
    args: &RefreshArgs,
) -> anyhow::Result<RefreshOptions> {
    let mut parsed = Vec::new();
    for raw in providers {
        let id: ProviderId = raw
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .with_context(|| format!("bad --provider value: {raw}"))?;
        parsed.push(id);
    }
    if parsed.len() > 4 {
        anyhow::bail!("at most 4 providers may be given");
    }

    let chain = ProviderChain {
        p1: parsed.first().copied(),
        p2: parsed.get(1).copied(),
        p3: parsed.get(2).copied(),
        p4: parsed.get(3).copied(),
    };
    Ok(RefreshOptions {
        review_before_apply: args.review,
        merge_categories: args.merge_categories,
        refresh_covers: args.refresh_covers,
        field_options: FieldOptions {
            title: chain,
            description: chain,
            authors: chain,
            categories: chain,
            cover: chain,
        },
        all_p1: chain.p1,
        all_p2: chain.p2,
        all_p3: chain.p3,
        all_p4: chain.p4,
    })
}

fn cmd_refresh(rt: &Runtime, args: RefreshArgs, db_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let selection = match (&args.library, args.books.is_empty()) {
        (Some(library_id), _) => RefreshSelection::Library {
            library_id: *library_id,
        },
        (None, false) => RefreshSelection::Books {
            book_ids: args.books.clone(),
        },
        (None, true) => anyhow::bail!("pass --library or at least one --book"),
    };

    let options = if args.quick {
        RefreshOptions {
            review_before_apply: args.review,
            ..Default::default()
        }
    } else {
        if args.providers.is_empty() {
            anyhow::bail!("pass --quick or at least one --provider");
        }
        options_from_providers(&args.providers, &args)?
    };

    let request = RefreshRequest {
        selection,
        quick: args.quick,
        options,
    };

    rt.block_on(async {
        let config = config::load();
        let pool = db::init_db(&database_url(db_path, &config)).await?;

        let api_key = args
            .api_key
            .clone()
            .or_else(|| config.credentials.google_books_api_key.clone());
        let registry = build_registry(api_key);
        let writer = MetadataWriter::new(
            pool.clone(),
            BackupStore::new(config.storage.backups()),
            CoverStore::new(reqwest::Client::new(), config.storage.covers()),
        );
        let events = EventBus::new();
        let quick_provider = config
            .refresh
            .quick_provider
            .parse()
            .unwrap_or(ProviderId::Google);
        let engine = ReconciliationEngine::new(
            pool,
            Arc::new(registry),
            writer,
            events.clone(),
            quick_provider,
        );

        let mut rx = events.subscribe();
        let printer = tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                match event {
                    Event::BatchProgress {
                        completed,
                        total,
                        message,
                        ..
                    } => println!("[{completed}/{total}] {message}"),
                    Event::MetadataUpdated { book_id, title } => {
                        println!("Updated book {book_id}: {}", title.as_deref().unwrap_or("(untitled)"));
                    }
                    Event::Log { message } => println!("{message}"),
                }
            }
        });

        let result = engine.refresh(&request, args.user).await;
        // Drop every sender so the printer drains remaining events and exits.
        drop(engine);
        drop(events);
        let _ = printer.await;

        match result? {
            Some(job_id) => println!("Review job {job_id} created. Run `book-minder job {job_id}` to review."),
            None => println!("Refresh applied."),
        }
        Ok(())
    })
}

fn cmd_add(
    rt: &Runtime,
    path: &std::path::Path,
    library: i64,
    title: Option<&str>,
    author: Option<&str>,
    db_path: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let config = config::load();
        let pool = db::init_db(&database_url(db_path, &config)).await?;
        let metadata = BookMetadata {
            title: title.map(String::from),
            authors: author.map(String::from).into_iter().collect(),
            ..Default::default()
        };
        let id = db::books::insert_book(&pool, library, &path.to_string_lossy(), &metadata).await?;
        println!("Added book {id}: {}", path.display());
        Ok(())
    })
}

fn cmd_list(rt: &Runtime, db_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    rt.block_on(async {
        let config = config::load();
        let pool = db::init_db(&database_url(db_path, &config)).await?;
        let books = db::books::get_all_books(&pool).await?;
        for book in &books {
            let score = book
                .metadata_score
                .map(|s| format!("{s:.0}%"))
                .unwrap_or_else(|| "-".to_string());
            println!("{:>5}  {:>4}  {}", book.id, score, book.display_title());
        }
        println!("{} books.", books.len());
        Ok(())
    })
}

fn cmd_jobs(rt: &Runtime, db_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    rt.block_on(async {
        let config = config::load();
        let pool = db::init_db(&database_url(db_path, &config)).await?;
        let tracker = TaskTracker::new(pool);
        let active = tracker.get_active_jobs().await?;
        if active.is_empty() {
            println!("No jobs need attention.");
            return Ok(());
        }
        for entry in active {
            println!("Job {:>4}  [{}]  {}", entry.job.id, entry.job.status, entry.message);
        }
        Ok(())
    })
}

fn cmd_job(rt: &Runtime, job_id: i64, db_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    rt.block_on(async {
        let config = config::load();
        let pool = db::init_db(&database_url(db_path, &config)).await?;
        let tracker = TaskTracker::new(pool.clone());
        let (job, proposals) = tracker.get_job_with_proposals(job_id).await?;

        println!(
            "Job {} [{}]: {}/{} books, started {}",
            job.id, job.status, job.completed_books, job.total_books, job.started_at
        );
        if let Some(error) = &job.error {
            println!("Error: {error}");
        }

        for proposal in proposals {
            let title = serde_json::from_str::<ConsolidatedMetadata>(&proposal.metadata)
                .ok()
                .and_then(|c| c.snapshot.title)
                .unwrap_or_else(|| "(no title)".to_string());
            println!(
                "  Proposal {:>4}  book {:>4}  {}",
                proposal.id, proposal.book_id, title
            );
        }
        Ok(())
    })
}

fn cmd_review(
    rt: &Runtime,
    job_id: i64,
    proposal_id: i64,
    status: &str,
    user: i64,
    db_path: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let config = config::load();
        let pool = db::init_db(&database_url(db_path, &config)).await?;
        let tracker = TaskTracker::new(pool);
        if tracker
            .update_proposal_status(job_id, proposal_id, status, user)
            .await?
        {
            println!("Proposal {proposal_id} marked {status}.");
        } else {
            anyhow::bail!("review was not applied; check the job id, proposal id, and status");
        }
        Ok(())
    })
}

fn cmd_delete_job(rt: &Runtime, job_id: i64, db_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    rt.block_on(async {
        let config = config::load();
        let pool = db::init_db(&database_url(db_path, &config)).await?;
        let tracker = TaskTracker::new(pool);
        if tracker.delete_job(job_id).await? {
            println!("Deleted job {job_id}.");
        } else {
            println!("Job {job_id} not found.");
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_provider_order_becomes_chain() {
        let args = RefreshArgs {
            library: None,
            books: vec![1],
            review: false,
            quick: false,
            providers: vec!["google".to_string(), "amazon".to_string()],
            merge_categories: true,
            refresh_covers: false,
            api_key: None,
            user: 1,
        };
        let options = options_from_providers(&args.providers, &args).unwrap();
        assert_eq!(options.field_options.title.p1, Some(ProviderId::Google));
        assert_eq!(options.field_options.title.p2, Some(ProviderId::Amazon));
        assert_eq!(options.all_p1, Some(ProviderId::Google));
        assert!(options.merge_categories);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let args = RefreshArgs {
            library: Some(1),
            books: vec![],
            review: false,
            quick: false,
            providers: vec!["librarything".to_string()],
            merge_categories: false,
            refresh_covers: false,
            api_key: None,
            user: 1,
        };
        assert!(options_from_providers(&args.providers, &args).is_err());
    }
}
