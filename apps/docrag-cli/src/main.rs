use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docrag_core::config::{Config, Settings};
use docrag_core::data_processor::{ChunkingConfig, DataProcessor};
use docrag_core::progress::LogProgress;
use docrag_core::traits::ProgressSink;
use docrag_core::Passage;
use docrag_embed::{default_encoder, default_reranker};
use docrag_hybrid::{Answer, AnswerGenerator, AnswerOrchestrator, DocumentRegistry, ExtractiveGenerator, HybridRetriever, IndexPipeline};

mod generator;
mod progress;

use generator::ChatCompletionsGenerator;
use progress::BarProgress;

#[derive(Parser)]
#[command(name = "docrag", version, about = "Hybrid retrieval and question answering over local documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank passages of a document against a query
    Search {
        #[command(flatten)]
        source: SourceArgs,
        query: String,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer one question from a document, with citations
    Ask {
        #[command(flatten)]
        source: SourceArgs,
        question: String,
        #[arg(long)]
        json: bool,
    },
    /// Read questions from stdin and answer each one
    Chat {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// A .txt file, or a directory of them (one document per file)
    path: PathBuf,
    /// Which document to query when `path` is a directory
    #[arg(long)]
    document: Option<String>,
    /// Number of passages to retrieve (defaults to retrieval.top_k)
    #[arg(long)]
    top_k: Option<usize>,
    /// Skip the cross-encoder pass
    #[arg(long)]
    no_rerank: bool,
}

/// Indexed documents plus everything needed to query one of them.
struct Session {
    registry: DocumentRegistry,
    retriever: HybridRetriever,
    document_id: String,
    top_k: usize,
    use_reranker: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {e:#}"); e })?;
    let settings = config.settings()?;

    match cli.command {
        Command::Search { source, query, json } => {
            let session = open_session(&settings, &source, json)?;
            let hits = session.retriever.retrieve(&session.registry, &session.document_id, &query, session.top_k, session.use_reranker)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
                return Ok(());
            }
            if hits.is_empty() { println!("No passages found."); }
            for (rank, hit) in hits.iter().enumerate() {
                let page = hit.passage.page_number.map_or_else(|| "?".to_string(), |p| p.to_string());
                println!(
                    "{}. [{:.4}] {} p.{} (semantic {:.3}, lexical {:.3})",
                    rank + 1,
                    hit.relevance_score,
                    hit.passage.source_id,
                    page,
                    hit.scores.semantic_score,
                    hit.scores.lexical_score
                );
                println!("   {}", preview(&hit.passage.text, 240));
            }
        }
        Command::Ask { source, question, json } => {
            let session = open_session(&settings, &source, json)?;
            let (orchestrator, registry, document_id) = session.into_orchestrator(answer_generator(&settings)?);
            let answer = orchestrator.respond(&registry, &document_id, &question);
            print_answer(&answer, json)?;
        }
        Command::Chat { source } => {
            let session = open_session(&settings, &source, false)?;
            let (orchestrator, registry, document_id) = session.into_orchestrator(answer_generator(&settings)?);
            println!("Ask about {document_id} (empty line or Ctrl-D to quit)");
            let stdin = std::io::stdin();
            loop {
                print!("> ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 { break; }
                let question = line.trim();
                if question.is_empty() { break; }
                print_answer(&orchestrator.respond(&registry, &document_id, question), false)?;
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

/// Index every document under `source.path`. Progress goes to a bar on an
/// interactive terminal and to the log otherwise (or when output is JSON).
fn open_session(settings: &Settings, source: &SourceArgs, machine_output: bool) -> Result<Session> {
    let processor = DataProcessor::with_config(ChunkingConfig::from(&settings.ingest));
    let documents = load_documents(&processor, &source.path)?;
    let document_id = pick_document(&documents, source.document.as_deref())?;

    let encoder = default_encoder(&settings.models)?;
    let pipeline = IndexPipeline::from_settings(Arc::clone(&encoder), &settings.ingest);
    let registry = DocumentRegistry::new();
    let bars = !machine_output && std::io::stderr().is_terminal();
    for (id, passages) in documents {
        if passages.is_empty() {
            tracing::warn!(document = %id, "skipping document with no extractable text");
            continue;
        }
        let progress: Box<dyn ProgressSink> =
            if bars { Box::new(BarProgress::new(&id)) } else { Box::new(LogProgress::new(id.clone())) };
        let built = pipeline.build_entry(&registry, &id, passages, progress.as_ref());
        drop(progress);
        built.with_context(|| format!("indexing {id}"))?;
    }
    if !registry.exists(&document_id) {
        bail!("document {document_id} has no extractable text");
    }

    let use_reranker = settings.retrieval.use_reranker && !source.no_rerank;
    let mut retriever = HybridRetriever::new(encoder, settings.retrieval.clone())?;
    if use_reranker {
        retriever = retriever.with_reranker(default_reranker(&settings.models)?);
    }
    Ok(Session {
        registry,
        retriever,
        document_id,
        top_k: source.top_k.unwrap_or(settings.retrieval.top_k),
        use_reranker,
    })
}

impl Session {
    fn into_orchestrator(self, generator: Arc<dyn AnswerGenerator>) -> (AnswerOrchestrator, DocumentRegistry, String) {
        let orchestrator = AnswerOrchestrator::new(self.retriever, generator)
            .with_top_k(self.top_k)
            .with_reranking(self.use_reranker);
        (orchestrator, self.registry, self.document_id)
    }
}

fn load_documents(processor: &DataProcessor, path: &Path) -> Result<Vec<(String, Vec<Passage>)>> {
    if path.is_dir() {
        return processor.process_directory(path);
    }
    let passages = processor.process_file(path)?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(vec![(id, passages)])
}

fn pick_document(documents: &[(String, Vec<Passage>)], requested: Option<&str>) -> Result<String> {
    let ids: Vec<&str> = documents.iter().map(|(id, _)| id.as_str()).collect();
    match (requested, ids.as_slice()) {
        (_, []) => bail!("no documents found"),
        (Some(id), _) if ids.contains(&id) => Ok(id.to_string()),
        (Some(id), _) => bail!("document {id} not found; available: {}", ids.join(", ")),
        (None, [only]) => Ok((*only).to_string()),
        (None, _) => bail!("several documents found, choose one with --document: {}", ids.join(", ")),
    }
}

fn answer_generator(settings: &Settings) -> Result<Arc<dyn AnswerGenerator>> {
    match settings.generator.api_url.as_deref() {
        Some(url) => Ok(Arc::new(ChatCompletionsGenerator::new(url, &settings.generator)?)),
        None => {
            tracing::info!("generator.api_url not set, answering with extracted passages");
            Ok(Arc::new(ExtractiveGenerator::default()))
        }
    }
}

fn print_answer(answer: &Answer, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }
    println!("\n{}\n", answer.answer.trim());
    if !answer.sources.is_empty() {
        println!("Sources:");
        for (i, source) in answer.sources.iter().enumerate() {
            let page = source.page.map_or_else(|| "?".to_string(), |p| p.to_string());
            println!("  [#{}] {} p.{} ({:.3}) {}", i + 1, source.source, page, source.relevance_score, preview(&source.excerpt, 120));
        }
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
