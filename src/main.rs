use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use inscription_review::db::{self, PgStore};
use inscription_review::draft::DraftGuard;
use inscription_review::models::{self, Classification, EvaluationStatus, NavigationContext};
use inscription_review::navigation::{self, NextUnevaluated, ReviewLocation};
use inscription_review::queue::QueueSession;
use inscription_review::store::ReviewStore;
use inscription_review::{config, report, scoring};

#[derive(Parser)]
#[command(name = "inscription-review")]
#[command(about = "Evaluation review workflow for teacher inscriptions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum NavAction {
    Next,
    Previous,
    NextUnevaluated,
    Back,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListingFormat {
    Markdown,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Print the review queue of a period
    Queue {
        #[arg(long)]
        period: String,
        /// inicial, primario, secundario or all
        #[arg(long, default_value = "all")]
        level: String,
        /// evaluated, unevaluated or all
        #[arg(long, default_value = "all")]
        status: String,
        /// Inscription whose queue position should be reported
        #[arg(long)]
        focus: Option<Uuid>,
        #[arg(long)]
        json: bool,
    },
    /// Resolve the next navigation target from a review page location
    Navigate {
        /// Review page location, e.g. /evaluations/<id>?period=2026-1&from=evaluations
        location: String,
        #[arg(value_enum)]
        action: NavAction,
    },
    /// Score an inscription and save the evaluation
    Evaluate {
        inscription: Uuid,
        /// criterion=value, repeatable
        #[arg(long = "score", value_parser = parse_score)]
        scores: Vec<(usize, f64)>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        classification: Option<Classification>,
        /// Mark the evaluation as completed
        #[arg(long)]
        complete: bool,
    },
    /// Write the merit listing of a period
    Listing {
        #[arg(long)]
        period: String,
        #[arg(long, default_value = "all")]
        level: String,
        #[arg(long, value_enum, default_value_t = ListingFormat::Markdown)]
        format: ListingFormat,
        #[arg(long, default_value = "merit-listing.md")]
        out: PathBuf,
    },
}

fn parse_score(value: &str) -> Result<(usize, f64), String> {
    let (name, score) = value
        .split_once('=')
        .ok_or_else(|| format!("expected criterion=value, got {value}"))?;
    let index = scoring::criterion_index(name).ok_or_else(|| {
        format!(
            "unknown criterion {name}; expected one of {}",
            models::CRITERIA.join(", ")
        )
    })?;
    let score = score
        .parse::<f64>()
        .map_err(|err| format!("invalid score {score}: {err}"))?;
    Ok((index, score))
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = config::Settings::from_env()?;
    init_tracing(settings.log_json);

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = Arc::new(PgStore::new(pool.clone()));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Queue {
            period,
            level,
            status,
            focus,
            json,
        } => {
            let context = NavigationContext::for_period(period)
                .with_level(navigation::parse_level_filter(&level)?)
                .with_status(navigation::parse_status_filter(&status)?);
            let session = QueueSession::new(store);
            session.rebuild(context, focus).await?;
            let snapshot = session.snapshot().context("review queue unavailable")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }

            if snapshot.entries.is_empty() {
                println!("No inscriptions to review for this period.");
                return Ok(());
            }

            println!(
                "{} inscriptions ({} pending), cursor {}:",
                snapshot.entries.len(),
                snapshot.pending_count(),
                snapshot.cursor_index()
            );
            for (index, entry) in snapshot.entries.iter().enumerate() {
                let marker = if snapshot.cursor == Some(index) { ">" } else { " " };
                println!(
                    "{marker} {index:>3} {} {} (DNI {}, {}) {}",
                    entry.id,
                    entry.display_name,
                    entry.dni,
                    entry.teaching_level,
                    entry.evaluation_state.as_str()
                );
            }
        }
        Commands::Navigate { location, action } => {
            let location = ReviewLocation::parse(&location)?;
            let session = QueueSession::new(store);
            session
                .rebuild(location.context.clone(), Some(location.inscription_id))
                .await?;
            let mut navigator = session.navigator().context("review queue unavailable")?;

            match navigator.current() {
                Some(entry) => info!(
                    inscription = %entry.id,
                    teacher = %entry.display_name,
                    position = navigator.cursor().unwrap_or_default(),
                    "navigating from queue entry"
                ),
                None if !navigator.is_empty() => warn!(
                    inscription = %location.inscription_id,
                    "inscription is not in the filtered queue"
                ),
                None => {}
            }

            match action {
                NavAction::Next => match navigator.go_to_next() {
                    Some(target) => println!("{target}"),
                    None => println!("Already at the last inscription."),
                },
                NavAction::Previous => match navigator.go_to_previous() {
                    Some(target) => println!("{target}"),
                    None => println!("Already at the first inscription."),
                },
                NavAction::NextUnevaluated => match navigator.go_to_next_unevaluated() {
                    NextUnevaluated::Found(target) => println!("{target}"),
                    NextUnevaluated::NoPending => println!("No pending inscriptions in this queue."),
                },
                NavAction::Back => println!("{}", navigator.back_to_evaluations()),
            }
        }
        Commands::Evaluate {
            inscription,
            scores,
            note,
            classification,
            complete,
        } => {
            let mut guard = DraftGuard::open(store.as_ref(), inscription).await?;
            for (criterion, value) in scores {
                guard.set_score(criterion, value)?;
            }
            if note.is_some() {
                guard.set_note(note);
            }
            if classification.is_some() {
                guard.set_classification(classification);
            }
            if complete {
                guard.set_status(EvaluationStatus::Completed);
            }

            if guard.draft() == guard.original() {
                println!("Nothing to save.");
                return Ok(());
            }

            let record = guard.save(store.as_ref()).await?;
            println!(
                "Saved {} evaluation for {} (version {}), total score {:.2}.",
                record.draft.status.as_str(),
                guard.inscription_id(),
                record.version,
                record.total_score
            );
        }
        Commands::Listing {
            period,
            level,
            format,
            out,
        } => {
            let context = NavigationContext::for_period(period)
                .with_level(navigation::parse_level_filter(&level)?);
            let session = QueueSession::new(store.clone());
            session.rebuild(context, None).await?;
            let snapshot = session.snapshot().context("review queue unavailable")?;

            let ids: Vec<Uuid> = snapshot.entries.iter().map(|entry| entry.id).collect();
            let records = store.load_evaluations(&ids).await?;

            match format {
                ListingFormat::Markdown => {
                    std::fs::write(&out, report::build_report(&snapshot, &records))?;
                }
                ListingFormat::Csv => {
                    let rows = scoring::rank_merit(&snapshot.entries, &records);
                    let file = std::fs::File::create(&out)
                        .with_context(|| format!("failed to create {}", out.display()))?;
                    report::write_listing_csv(file, &rows)?;
                }
            }
            println!("Merit listing written to {}.", out.display());
        }
    }

    Ok(())
}
