//! Shelf Daemon - search strategy comparison over a book catalog

mod handler;
mod import;
mod resp;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::BytesMut;
use clap::{Parser, Subcommand};
use shelfdb::{BookStore, NewBook};
use shelfsearch::{IndexCache, SearchBench, SearchReport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::handler::CommandHandler;
use crate::resp::Frame;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./data", global = true)]
    data: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the RESP command protocol over TCP
    Serve {
        /// Bind address
        #[arg(short, long, default_value = "127.0.0.1:6380")]
        bind: String,

        /// Health check mode (for Docker)
        #[arg(long)]
        health: bool,
    },

    /// Run all three strategies for one term and print the comparison
    Search {
        /// Book id or title
        #[arg(required = true)]
        term: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Repeat the search to compare a cold index cache with a warm one
        #[arg(long, default_value_t = 1)]
        runs: usize,
    },

    /// List every book in the catalog
    List,

    /// Register a book
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Import Open Library search.json pages from a file or the live API
    Import {
        /// File with one or more concatenated search pages
        #[arg(required_unless_present = "fetch", conflicts_with = "fetch")]
        file: Option<PathBuf>,

        /// Page through the Open Library search API instead of a file
        #[arg(long)]
        fetch: bool,

        /// Search endpoint used with --fetch
        #[arg(long, default_value = import::SEARCH_URL)]
        url: String,

        /// Stop after this many books
        #[arg(short, long, default_value_t = 5000)]
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
        .init();

    let args = Args::parse();

    match args.command {
        Command::Serve { bind, health } => {
            if health {
                return health_check(&bind).await;
            }
            serve(&args.data, &bind).await
        }
        Command::Search { term, json, runs } => {
            let store = open_store(&args.data)?;
            let bench = SearchBench::new(store, Arc::new(IndexCache::new()));
            let term = term.join(" ");
            for run in 1..=runs.max(1) {
                let report = bench.search(&term);
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    if runs > 1 {
                        println!("Run {}:", run);
                    }
                    print_report(&report);
                }
            }
            Ok(())
        }
        Command::List => {
            let store = open_store(&args.data)?;
            for book in store.read_all()? {
                println!(
                    "{:>6}  {} - {}\n        {}",
                    book.id,
                    book.title,
                    book.author,
                    book.description_or_default()
                );
            }
            Ok(())
        }
        Command::Add {
            title,
            author,
            description,
        } => {
            let store = open_store(&args.data)?;
            let book = store.insert(NewBook::new(title, author, description))?;
            println!("Book \"{}\" registered with id {}", book.title, book.id);
            Ok(())
        }
        Command::Import {
            file,
            fetch,
            url,
            limit,
        } => {
            let store = open_store(&args.data)?;
            let summary = match file {
                Some(file) if !fetch => import::import_file(&store, &file, limit)?,
                _ => {
                    let source = import::OpenLibrary::new(url)?;
                    import::import_remote(&store, &source, limit, import::PAGE_PAUSE).await
                }
            };
            println!(
                "Collected {} books, inserted {}, skipped {}, failed {}. Catalog now holds {}.",
                summary.collected,
                summary.inserted,
                summary.skipped,
                summary.failed,
                store.len()
            );
            Ok(())
        }
    }
}

fn open_store(data: &Path) -> Result<Arc<BookStore>> {
    let store = BookStore::open(data)
        .with_context(|| format!("Failed to open book store at {}", data.display()))?;
    Ok(Arc::new(store))
}

fn print_report(report: &SearchReport) {
    if report.is_empty() {
        println!("Nothing to search for.");
        return;
    }

    println!("Results for \"{}\":", report.term());
    for outcome in report.iter() {
        let found = match (outcome.book(), outcome.error()) {
            (_, Some(e)) => format!("error: {}", e),
            (Some(book), None) => format!("#{} {} - {}", book.id, book.title, book.author),
            (None, None) => "not found".to_string(),
        };
        let elapsed = outcome
            .elapsed()
            .map(|d| format!("{:.4} ms", d.as_secs_f64() * 1000.0))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<18} {:>14}  {}", outcome.label, elapsed, found);
    }
}

async fn health_check(bind: &str) -> Result<()> {
    match TcpStream::connect(bind).await {
        Ok(_) => {
            println!("OK");
            std::process::exit(0);
        }
        Err(_) => {
            eprintln!("FAILED");
            std::process::exit(1);
        }
    }
}

async fn serve(data: &Path, bind: &str) -> Result<()> {
    info!("Starting Shelf Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", data.display());

    let store = open_store(data)?;
    let cache = Arc::new(IndexCache::new());
    let bench = Arc::new(SearchBench::new(Arc::clone(&store), cache));
    info!(books = store.len(), "Catalog opened");

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Server listening on {}", bind);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let handler = CommandHandler::new(Arc::clone(&store), Arc::clone(&bench));

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            error!("Error handling client {}: {}", addr, e);
                        }
                        info!("Connection closed: {}", addr);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_client(mut stream: TcpStream, handler: CommandHandler) -> Result<()> {
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }

        loop {
            match Frame::decode(&mut buffer) {
                Ok(Some(frame)) => {
                    let reply = handler.handle(frame);
                    stream.write_all(&reply.to_bytes()).await?;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Parse error: {}", e);
                    stream.write_all(&Frame::error(&e).to_bytes()).await?;
                    buffer.clear();
                    break;
                }
            }
        }
    }
}
