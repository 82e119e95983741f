//! CLI subcommand handlers.

use anyhow::Context;
use clauseseek_core::chunker::Chunker;
use clauseseek_core::config::ClauseseekConfig;
use clauseseek_core::embeddings::create_embedder;
use clauseseek_core::extract::ExtractionChain;
use clauseseek_core::generator::create_generator;
use clauseseek_core::ingest::Ingestor;
use clauseseek_core::service::RetrievalService;
use clauseseek_core::types::AskResponse;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Commands, ConfigAction};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: ClauseseekConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Ingest {
            source_dir,
            index_dir,
            sidecar_dir,
        } => handle_ingest(&config, workspace, &source_dir, index_dir, sidecar_dir).await,
        Commands::Search { question, k, json } => {
            let svc = open_service(&config, workspace)?;
            let k = k.unwrap_or(config.retrieval.search_k);
            let results = svc.search(&question, k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for (rank, hit) in results.iter().enumerate() {
                    println!("{:>2}. [{:.3}] {}", rank + 1, hit.score, hit.owner);
                    println!("    {}", preview(&hit.text, 200));
                }
            }
            Ok(())
        }
        Commands::Ask {
            question,
            top_k,
            return_k,
            generate,
            json,
        } => {
            let svc = open_service(&config, workspace)?;
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            let return_k = return_k.unwrap_or(config.retrieval.return_k);
            let response = if generate {
                svc.ask_generative(&question, top_k, return_k).await?
            } else {
                svc.ask(&question, top_k, return_k).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_answer(&response);
            }
            Ok(())
        }
        Commands::Serve { host, port } => {
            let mut server = config.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            // Index is loaded before the listener is bound.
            let svc = Arc::new(open_service(&config, workspace)?);
            clauseseek_core::server::run(svc, &server).await?;
            Ok(())
        }
        Commands::Eval { gold, pred } => {
            let report = clauseseek_core::eval::evaluate(&gold, &pred)?;
            println!("[eval] {report}");
            Ok(())
        }
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

async fn handle_ingest(
    config: &ClauseseekConfig,
    workspace: &Path,
    source_dir: &Path,
    index_dir: Option<PathBuf>,
    sidecar_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let index_dir = index_dir.unwrap_or_else(|| config.index_dir(workspace));
    let extractors = match sidecar_dir.or_else(|| config.index.sidecar_dir.clone()) {
        Some(dir) => ExtractionChain::with_sidecar_dir(dir),
        None => ExtractionChain::standard(),
    };
    let embedder = create_embedder(&config.embedding)?;
    let ingestor = Ingestor::new(
        Chunker::new(config.chunking)?,
        config.clauses.ontology()?,
        embedder,
    )
    .with_extractors(extractors)
    .with_batch_size(config.embedding.batch_size);

    let report = ingestor
        .run(source_dir, &index_dir)
        .await
        .with_context(|| format!("ingesting {}", source_dir.display()))?;

    println!(
        "Indexed {} chunks from {} documents ({} owners) into {}",
        report.chunks,
        report.documents,
        report.owners,
        report.index_dir.display()
    );
    for skipped in &report.skipped {
        println!("  SKIP {}: {}", skipped.owner, skipped.reason);
    }
    Ok(())
}

fn open_service(config: &ClauseseekConfig, workspace: &Path) -> anyhow::Result<RetrievalService> {
    let index_dir = config.index_dir(workspace);
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generator)?;
    let svc = RetrievalService::open(&index_dir, embedder, config.retrieval.clone())
        .with_context(|| format!("loading index from {}", index_dir.display()))?
        .with_generator(generator, config.generator.max_context_chars);
    Ok(svc)
}

fn handle_config(
    action: ConfigAction,
    config: &ClauseseekConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = clauseseek_core::config::write_default_config(workspace)?;
            println!("Created default configuration at: {}", path.display());
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}

fn print_answer(response: &AskResponse) {
    println!("{}", response.answer);
    println!();
    println!("Risk: {}", response.risk);
    if let Some(generated) = &response.generated {
        println!();
        println!("Generated:");
        println!("{generated}");
    }
    if !response.citations.is_empty() {
        println!();
        println!("Sources:");
        for c in &response.citations {
            println!("  - {} [{:.3}] {}", c.owner, c.score, preview(&c.text, 120));
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
