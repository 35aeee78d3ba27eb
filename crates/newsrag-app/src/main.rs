//! NewsRAG application binary - composition root.
//!
//! Ties together all NewsRAG crates into a single executable:
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Choose the embedder and model clients
//! 3. Load the persisted index snapshot, building it from the corpus if needed
//! 4. Run the requested command: build, query, terminal chat, or HTTP server

mod cli;
mod wiring;

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use newsrag_api::state::AppState;
use newsrag_chat::{AnswerGenerator, ChatSession, HistoryStore};
use newsrag_core::config::NewsRagConfig;
use newsrag_core::error::NewsRagError;
use newsrag_retrieval::{
    BuildReport, CorpusIndexer, IndexSnapshot, IndexerOptions, Provenance, QueryExpansionGenerator,
    RetrievalEngine, RetrievalParams, SnapshotPaths, SnapshotStore,
};
use newsrag_vector::DynEmbeddingService;

use cli::{Cli, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Config. Read before tracing starts so `general.log_level` applies;
    // the outcome is logged once the subscriber is up.
    let config_file = cli.resolve_config_path();
    let loaded = NewsRagConfig::load(&config_file);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => NewsRagConfig::default(),
    };
    if let Some(dir) = cli.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = cli.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting NewsRAG v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Using default configuration"
        ),
    }

    let data_dir = config.general.resolved_data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let embedder = wiring::embedder(&config.embedding);
    let store = SnapshotStore::new(SnapshotPaths::from_config(
        &config.index_dir(),
        &config.index,
    ));

    match cli.command {
        Command::Build { ref corpus, force } => {
            if force {
                let source = wiring::corpus_source(corpus.as_deref(), &config.news);
                let outcome = indexer(&config, &embedder)
                    .rebuild(&store, source.as_ref())
                    .await?;
                print_report(&outcome.report);
            } else {
                let (snapshot, provenance) =
                    load_snapshot(&config, &store, &embedder, corpus.as_deref()).await?;
                match provenance {
                    Provenance::Loaded => println!(
                        "Snapshot already present: {} articles, {} expansion rows (use --force to rebuild)",
                        snapshot.article_count(),
                        snapshot.expansion_rows()
                    ),
                    Provenance::Built(report) => print_report(&report),
                }
            }
        }
        Command::Query {
            ref text,
            top_k,
            breadth,
        } => {
            let engine = open_engine(&config, &store, &embedder, None).await?;
            let params = engine.params();
            let ranked = engine
                .retrieve_ranked(
                    text,
                    top_k.unwrap_or(params.top_k),
                    breadth.unwrap_or(params.search_breadth),
                )
                .await?;
            if ranked.is_empty() {
                println!("No matching articles.");
            }
            for (rank, article) in ranked.iter().enumerate() {
                println!("{}. [{:.4}] {}", rank + 1, article.distance, article.text);
            }
        }
        Command::Chat { ref corpus } => {
            let engine = open_engine(&config, &store, &embedder, corpus.as_deref()).await?;
            let session = chat_session(&config, engine);
            run_repl(&session).await?;
        }
        Command::Serve { ref corpus, port } => {
            let engine = open_engine(&config, &store, &embedder, corpus.as_deref()).await?;
            let session = chat_session(&config, engine);
            session.clear().await?;

            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{}:{}", config.server.host, port)
                .parse()
                .map_err(|e| NewsRagError::Config(format!("invalid server address: {}", e)))?;

            let state = AppState::new(Arc::new(session));
            if let Err(e) = newsrag_api::start_server(addr, state).await {
                tracing::error!(addr = %addr, error = %e, "API server stopped");
                return Err(e.into());
            }
        }
    }

    Ok(())
}

fn indexer(config: &NewsRagConfig, embedder: &Arc<dyn DynEmbeddingService>) -> CorpusIndexer {
    let expansion = QueryExpansionGenerator::from_config(
        wiring::expansion_client(&config.expansion, &config.retry),
        &config.expansion,
    );
    CorpusIndexer::new(
        Arc::clone(embedder),
        expansion,
        IndexerOptions::from(&config.index),
    )
}

/// Load the persisted snapshot, or build and persist one from the corpus.
async fn load_snapshot(
    config: &NewsRagConfig,
    store: &SnapshotStore,
    embedder: &Arc<dyn DynEmbeddingService>,
    corpus: Option<&std::path::Path>,
) -> AppResult<(IndexSnapshot, Provenance)> {
    let source = wiring::corpus_source(corpus, &config.news);
    indexer(config, embedder)
        .build_or_load(store, source.as_ref())
        .await
        .map_err(|e| {
            if e.is_invariant_violation() {
                tracing::error!(
                    error = %e,
                    "Persisted snapshot cannot be served; run `newsrag build --force` to rebuild it"
                );
            } else if e.is_collaborator_failure() {
                tracing::error!(error = %e, "Index build failed contacting a collaborator");
            }
            e.into()
        })
}

fn print_report(report: &BuildReport) {
    println!(
        "Indexed {} articles ({} empty dropped, {} skipped, {} padded expansions)",
        report.indexed, report.dropped_empty, report.skipped, report.padded
    );
}

async fn open_engine(
    config: &NewsRagConfig,
    store: &SnapshotStore,
    embedder: &Arc<dyn DynEmbeddingService>,
    corpus: Option<&std::path::Path>,
) -> AppResult<Arc<RetrievalEngine>> {
    let (snapshot, _) = load_snapshot(config, store, embedder, corpus).await?;
    let engine = RetrievalEngine::new(snapshot, Arc::clone(embedder))?
        .with_params(RetrievalParams::from(&config.retrieval));
    let snapshot = engine.snapshot();
    tracing::info!(
        articles = snapshot.article_count(),
        expansion_rows = snapshot.expansion_rows(),
        "Retrieval engine ready"
    );
    Ok(Arc::new(engine))
}

fn chat_session(config: &NewsRagConfig, engine: Arc<RetrievalEngine>) -> ChatSession {
    let answerer = AnswerGenerator::new(
        wiring::answer_client(&config.answer, &config.retry),
        config.answer.clone(),
    );
    ChatSession::new(
        engine,
        answerer,
        HistoryStore::new(config.history_path()),
        config.chat.max_history_turns,
    )
}

/// Terminal chat loop. History starts empty and is cleared again on exit.
async fn run_repl(session: &ChatSession) -> AppResult<()> {
    session.clear().await?;
    println!("NewsRAG chat. Type 'exit' or 'quit' to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let reply = session.ask(message).await?;
        println!("Bot: {}", reply.answer);
    }

    session.clear().await?;
    println!("Goodbye!");
    Ok(())
}
