use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use docrag_core::config::{Config, Settings};
use docrag_core::context::{format_context, GroundedPrompt, NO_RELEVANT_CONTENT};
use docrag_core::documents::load_documents;
use docrag_core::logging;
use docrag_core::types::ScoredChunk;
use docrag_embed::get_default_embedder;
use docrag_vector::RetrievalEngine;

#[derive(Parser)]
#[command(name = "docrag", version, about = "Offline retrieval over a folder of documents")]
struct Cli {
    /// Use the hashing embedder instead of loading model weights
    #[arg(long, global = true)]
    fake: bool,

    /// Directory holding the saved index (defaults to `rag.data_dir`)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index every document, then save the index
    Build {
        #[arg(long)]
        docs: Option<PathBuf>,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Print the context blocks retrieved for a question
    Query {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
    },
    /// Print grounded chat messages for a question as JSON
    Prompt {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show a summary of the saved index
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    logging::init_with_config(&config.logging()?);

    let mut settings = config.settings()?;
    settings.use_fake_embeddings |= cli.fake;
    let data_dir = cli.data.unwrap_or_else(|| settings.data_path());

    match cli.command {
        Command::Build { docs, chunk_size, overlap } => {
            if let Some(v) = chunk_size { settings.chunk_size = v; }
            if let Some(v) = overlap { settings.overlap = v; }
            settings.validate()?;
            let docs_dir = docs.unwrap_or_else(|| settings.docs_path());
            build(&settings, &docs_dir, &data_dir)
        }
        Command::Query { question, top_k, min_score } => {
            let hits = retrieve(&settings, &data_dir, &question, top_k, min_score)?;
            if hits.is_empty() {
                println!("{NO_RELEVANT_CONTENT}");
            } else {
                println!("{}", format_context(&hits));
            }
            Ok(())
        }
        Command::Prompt { question, top_k } => {
            let hits = retrieve(&settings, &data_dir, &question, top_k, None)?;
            match GroundedPrompt::new(&question, &hits) {
                Some(prompt) => println!("{}", serde_json::to_string_pretty(&prompt.messages())?),
                None => println!("{NO_RELEVANT_CONTENT}"),
            }
            Ok(())
        }
        Command::Stats => {
            let engine = open_engine(&settings, &data_dir)?;
            let stats = engine.stats()?;
            println!("chunks:  {}", stats.chunks);
            println!("sources: {}", stats.sources);
            println!("dim:     {}", stats.dim);
            Ok(())
        }
    }
}

fn build(settings: &Settings, docs_dir: &Path, data_dir: &Path) -> Result<()> {
    let corpus = load_documents(docs_dir).with_context(|| format!("reading documents from {}", docs_dir.display()))?;

    let mut engine = RetrievalEngine::new(get_default_embedder(settings)?);
    let stats = engine.build(&corpus, &settings.chunking())?;
    engine.save(data_dir).with_context(|| format!("saving index to {}", data_dir.display()))?;
    println!(
        "Indexed {} chunks from {} documents into {}",
        stats.chunks,
        stats.sources,
        data_dir.display()
    );
    Ok(())
}

fn open_engine(settings: &Settings, data_dir: &Path) -> Result<RetrievalEngine> {
    let mut engine = RetrievalEngine::new(get_default_embedder(settings)?);
    engine.load(data_dir).with_context(|| format!("loading index from {}; run `docrag build` first", data_dir.display()))?;
    Ok(engine)
}

fn retrieve(settings: &Settings, data_dir: &Path, question: &str, top_k: Option<usize>, min_score: Option<f32>) -> Result<Vec<ScoredChunk>> {
    let engine = open_engine(settings, data_dir)?;
    let top_k = top_k.unwrap_or(settings.top_k);
    let min_score = min_score.unwrap_or(settings.min_score);
    Ok(engine.retrieve_with_threshold(question, top_k, min_score)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_applies_to_every_command() {
        for args in [
            vec!["docrag", "build", "--data", "idx"],
            vec!["docrag", "query", "--data", "idx", "sky color"],
            vec!["docrag", "prompt", "sky color", "--data", "idx"],
            vec!["docrag", "--data", "idx", "stats"],
        ] {
            let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
            assert_eq!(cli.data.as_deref(), Some(Path::new("idx")), "{args:?}");
        }
    }

    #[test]
    fn data_dir_is_optional() {
        let cli = Cli::try_parse_from(["docrag", "--fake", "stats"]).unwrap();
        assert!(cli.fake);
        assert!(cli.data.is_none());
        assert!(matches!(cli.command, Command::Stats));
    }
}
