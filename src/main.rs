// MIT License
// Copyright (c) 2024 Graham King

use std::fs;
use std::path;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

mod article;
mod config;
mod embed;
mod existence;
mod normalize;
mod openai;
mod provenance;
mod report;
mod similarity;
mod slug;
mod store;
mod term;

use config::Backend;
use existence::{Candidate, Checker, OnReadError, Outcome};
use store::{ArticleStore, SqliteStore, SupabaseStore};

#[derive(Parser)]
#[command(about = "Find duplicate and near-duplicate articles")]
struct Cli {
    /// Sets a custom database path
    #[arg(long, value_name = "PATH")]
    db_path: Option<path::PathBuf>,

    /// Where the articles live
    #[arg(long, value_enum, default_value_t = Backend::Sqlite)]
    backend: Backend,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Would this URL or title duplicate an existing article?
    Check {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// JSON file of [{"url": ..., "title": ...}] to check instead
        #[arg(long, value_name = "FILE", conflicts_with_all = ["url", "title"])]
        candidates: Option<path::PathBuf>,
        /// When a lookup fails part way through --candidates
        #[arg(long, value_enum, default_value_t = OnReadError::Abort)]
        on_error: OnReadError,
    },

    /// Scan the whole collection and print duplicate URLs, slugs and similar content.
    /// With none of the --check-* flags, runs all three.
    Report(ReportArgs),

    /// Score two articles (by id or slug) against each other
    Compare { a: String, b: String },

    /// Generate OpenAI embeddings for published articles (sqlite backend only).
    /// Requires OPENAI_API_KEY.
    Embed {
        /// Articles per API request
        #[arg(long, default_value_t = embed::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Pause between requests
        #[arg(long, value_name = "MS", default_value_t = embed::DEFAULT_DELAY_MS)]
        delay_ms: u64,
        #[arg(long, default_value = openai::EMBED_MODEL)]
        model: String,
    },

    /// Load a JSON array of articles (e.g. a Supabase export) into the sqlite database
    Import { file: path::PathBuf },
}

#[derive(Args)]
struct ReportArgs {
    /// Articles sharing a normalized source URL
    #[arg(long)]
    check_urls: bool,
    /// Articles sharing a slug
    #[arg(long)]
    check_slugs: bool,
    /// Articles whose bodies are nearly the same
    #[arg(long)]
    check_content: bool,
    /// Content similarity threshold, 0 to 1
    #[arg(
        long,
        value_name = "FLOAT",
        default_value_t = report::DEFAULT_SIMILARITY,
        value_parser = parse_similarity
    )]
    similarity: f64,
    /// Compare only the oldest N articles for content, every pair is checked
    #[arg(long, value_name = "N", default_value_t = report::DEFAULT_SAMPLE)]
    sample: usize,
    /// Print SQL to delete the newer copies of exact duplicates. Nothing is deleted.
    #[arg(long)]
    auto_delete: bool,
}

fn parse_similarity(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("{v} is not between 0 and 1"));
    }
    Ok(v)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check {
            url,
            title,
            candidates,
            on_error,
        } => {
            let store = open_store(cli.backend, cli.db_path)?;
            match candidates {
                Some(file) => do_check_file(store.as_ref(), &file, on_error),
                None => do_check(store.as_ref(), url.as_deref(), title.as_deref()),
            }
        }
        Commands::Report(args) => {
            let store = open_store(cli.backend, cli.db_path)?;
            do_report(store.as_ref(), &args)
        }
        Commands::Compare { a, b } => {
            let store = open_store(cli.backend, cli.db_path)?;
            do_compare(store.as_ref(), &a, &b)
        }
        Commands::Embed {
            batch_size,
            delay_ms,
            model,
        } => {
            let store = open_sqlite(cli.backend, cli.db_path)?;
            let api_key = config::openai_api_key()?;
            let embedder = openai::OpenAi::new(api_key, &model);
            let opts = embed::Options {
                batch_size,
                delay: Duration::from_millis(delay_ms),
            };
            let count = embed::run(&store, &embedder, &opts)?;
            println!("Embedded {count} articles");
            Ok(())
        }
        Commands::Import { file } => {
            let mut store = open_sqlite(cli.backend, cli.db_path)?;
            let contents =
                fs::read_to_string(&file).with_context(|| format!("{}", file.display()))?;
            let articles: Vec<article::Article> =
                serde_json::from_str(&contents).with_context(|| format!("{}", file.display()))?;
            let count = store.import(&articles)?;
            println!("Imported {count} articles");
            Ok(())
        }
    }
}

fn open_store(
    backend: Backend,
    db_path: Option<path::PathBuf>,
) -> anyhow::Result<Box<dyn ArticleStore>> {
    let store: Box<dyn ArticleStore> = match backend {
        Backend::Sqlite => Box::new(open_sqlite(backend, db_path)?),
        Backend::Supabase => {
            let creds = config::SupabaseCredentials::from_env()?;
            info!("Reading articles from {}", creds.url);
            Box::new(SupabaseStore::new(creds))
        }
    };
    Ok(store)
}

fn open_sqlite(backend: Backend, db_path: Option<path::PathBuf>) -> anyhow::Result<SqliteStore> {
    if backend != Backend::Sqlite {
        anyhow::bail!("This command only works with the sqlite backend");
    }
    let db_path = match db_path {
        Some(p) => p,
        None => config::default_db_path()?,
    };
    info!("Using database {}", db_path.display());
    Ok(SqliteStore::open(&db_path)?)
}

fn do_check(
    store: &dyn ArticleStore,
    url: Option<&str>,
    title: Option<&str>,
) -> anyhow::Result<()> {
    let verdict = Checker::new(store).exists(url, title)?;
    println!("{verdict}");
    Ok(())
}

fn do_check_file(
    store: &dyn ArticleStore,
    file: &path::Path,
    on_error: OnReadError,
) -> anyhow::Result<()> {
    let contents = fs::read_to_string(file).with_context(|| format!("{}", file.display()))?;
    let candidates: Vec<Candidate> =
        serde_json::from_str(&contents).with_context(|| format!("{}", file.display()))?;
    println!("Checking {} candidates", candidates.len());

    let outcomes = Checker::new(store).check_all(&candidates, on_error)?;
    let (mut duplicates, mut skipped) = (0, 0);
    for (c, outcome) in candidates.iter().zip(&outcomes) {
        let label = c
            .url
            .as_deref()
            .or(c.title.as_deref())
            .unwrap_or("(empty candidate)");
        match outcome {
            Outcome::Checked(verdict) => {
                if verdict.is_duplicate() {
                    duplicates += 1;
                }
                println!("{label}: {verdict}");
            }
            Outcome::Skipped(err) => {
                skipped += 1;
                println!("{label}: skipped, {err}");
            }
        }
    }
    println!(
        "\n{} candidates, {duplicates} duplicates, {skipped} skipped",
        candidates.len()
    );
    Ok(())
}

fn do_compare(store: &dyn ArticleStore, a: &str, b: &str) -> anyhow::Result<()> {
    let articles = store.all()?;
    let find = |key: &str| {
        articles
            .iter()
            .find(|x| x.id == key || x.slug == key)
            .ok_or_else(|| anyhow::anyhow!("No article with id or slug {key}"))
    };
    let (a, b) = (find(a)?, find(b)?);
    println!("\"{}\" [{}] vs \"{}\" [{}]", a.title, a.id, b.title, b.id);
    println!(
        "  content: {:.1}%",
        similarity::jaccard(&a.body_md, &b.body_md) * 100.0
    );
    println!(
        "  titles:  {:.1}%",
        similarity::title_overlap(&a.title, &b.title) * 100.0
    );
    let url_a = a.source_url().map(normalize::normalize_url);
    let url_b = b.source_url().map(normalize::normalize_url);
    if url_a.is_some() && url_a == url_b {
        println!("  same source URL");
    }
    Ok(())
}

fn do_report(store: &dyn ArticleStore, args: &ReportArgs) -> anyhow::Result<()> {
    let all = !(args.check_urls || args.check_slugs || args.check_content);
    let opts = report::Options {
        check_urls: all || args.check_urls,
        check_slugs: all || args.check_slugs,
        check_content: all || args.check_content,
        threshold: args.similarity,
        sample: args.sample,
    };
    let report = report::Report::build(store, &opts)?;
    print!("{report}");

    if args.auto_delete {
        match report.deletion_sql() {
            Some(sql) => {
                println!("\nNothing has been deleted. Review, then run by hand:\n");
                println!("{sql}");
            }
            None => println!("\nNo exact duplicates to delete"),
        }
    }
    Ok(())
}
