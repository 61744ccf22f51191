use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use skynet_core::config::Config;
use skynet_core::corpus::{check_corpus, load_corpus, merge_parts};
use skynet_core::TopicNode;
use skynet_engine::{KnowledgeEngine, SearchRequest, DEFAULT_TRENDING};

#[derive(Parser)]
#[command(name = "skynet", about = "Role-aware search and topic browsing over embedded article chunks")]
struct Cli {
    /// Directory holding config.toml; paths in it resolve relative to this directory.
    #[arg(long, global = true, env = "SKYNET_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank documents for a query and summarize them for a role.
    Search {
        query: String,
        #[arg(long, default_value = "Researcher")]
        role: String,
        #[arg(long)]
        top_docs: Option<usize>,
    },
    /// Nearest chunks for a query, without role weighting.
    Chunks {
        query: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
    /// Build (or reuse) the topic tree and print it.
    Tree {
        /// Stop printing below this depth.
        #[arg(long, default_value_t = 2)]
        max_print_depth: usize,
    },
    /// First distinct papers of the corpus.
    Trending {
        #[arg(long, default_value_t = DEFAULT_TRENDING)]
        limit: usize,
    },
    /// Corpus and collaborator status.
    Health,
    /// Future-work sentences of one paper.
    FutureWork { pmcid: String },
    /// Papers that pick up a research direction.
    Followups {
        intent: String,
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Stack `*part*.npy` files and their metadata into one corpus.
    Merge { dir: PathBuf, out_stem: PathBuf },
    /// Load a corpus pair and report its shape.
    Check { embeddings: PathBuf, metadata: Option<PathBuf> },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn spinner(msg: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(msg.to_string());
    Ok(pb)
}

fn load_engine(config_dir: Option<&PathBuf>) -> anyhow::Result<KnowledgeEngine> {
    let config = match config_dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    }
    .context("loading configuration")?;
    let pb = spinner("Loading corpus...")?;
    let engine = KnowledgeEngine::from_config(&config);
    pb.finish_and_clear();
    Ok(engine?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_tree(node: &TopicNode, depth: usize, max_depth: usize) {
    println!("{}{} [{}] ({})", "  ".repeat(depth), node.label, node.id, node.size);
    if depth < max_depth {
        for child in &node.children {
            print_tree(child, depth + 1, max_depth);
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Search { query, role, top_docs } => {
            let engine = load_engine(cli.config_dir.as_ref())?;
            let request = SearchRequest { top_docs, ..SearchRequest::new(query, role) };
            let pb = spinner("Searching...")?;
            let response = engine.search(&request);
            pb.finish_and_clear();
            let response = response?;
            if cli.json {
                return print_json(&response);
            }
            println!("{} result(s) for \"{}\" as {}\n", response.count, response.query, response.role);
            for (i, r) in response.results.iter().enumerate() {
                println!("{}. {} [{}] score={:.4}", i + 1, r.title, r.pmcid, r.score);
                println!("   {}", r.url);
                for p in &r.top_chunks {
                    println!("   - ({}, {:.3}) {}", p.section, p.similarity, p.text);
                }
            }
            println!("\n{}", response.summary);
        }
        Command::Chunks { query, k } => {
            let engine = load_engine(cli.config_dir.as_ref())?;
            let hits = engine.chunks(&query, k)?;
            if cli.json {
                return print_json(&hits);
            }
            for h in hits {
                println!("{:.4} {} [{}] ({})\n   {}", h.similarity, h.chunk_id, h.pmcid, h.section, h.preview);
            }
        }
        Command::Tree { max_print_depth } => {
            let engine = load_engine(cli.config_dir.as_ref())?;
            let pb = spinner("Building topic tree...")?;
            let tree = engine.topic_tree();
            pb.finish_and_clear();
            if cli.json {
                return print_json(&*tree);
            }
            print_tree(&tree.root, 0, max_print_depth);
        }
        Command::Trending { limit } => {
            let engine = load_engine(cli.config_dir.as_ref())?;
            let items = engine.trending(limit);
            if cli.json {
                return print_json(&items);
            }
            for item in items {
                println!("{} [{}] ({})\n   {}", item.title, item.pmcid, item.section, item.preview);
            }
        }
        Command::Health => {
            let engine = load_engine(cli.config_dir.as_ref())?;
            print_json(&engine.health())?;
        }
        Command::FutureWork { pmcid } => {
            let engine = load_engine(cli.config_dir.as_ref())?;
            let items = engine.future_work(&pmcid)?;
            if cli.json {
                return print_json(&items);
            }
            for item in items {
                println!("{} ({:.2}) {}", item.intent_id, item.score, item.label);
            }
        }
        Command::Followups { intent, source } => {
            let engine = load_engine(cli.config_dir.as_ref())?;
            let found = engine.followups(&intent, &source)?;
            if cli.json {
                return print_json(&found);
            }
            for f in found {
                println!("{} ({:.3}) {}\n   {}", f.paper_id, f.relevance, f.title, f.link);
            }
        }
        Command::Merge { dir, out_stem } => {
            let pb = spinner("Merging parts...")?;
            let report = merge_parts(&dir, &out_stem);
            pb.finish_and_clear();
            let report = report.with_context(|| format!("merging parts in {}", dir.display()))?;
            println!(
                "Merged {} part(s): {} rows x {} dims\n  {}\n  {}",
                report.parts.len(),
                report.rows,
                report.dim,
                report.embeddings_path.display(),
                report.metadata_path.display()
            );
        }
        Command::Check { embeddings, metadata } => {
            let metadata = metadata.unwrap_or_else(|| skynet_core::corpus::metadata_path_for(&embeddings));
            let corpus = load_corpus(&embeddings, &metadata).with_context(|| format!("loading {}", embeddings.display()))?;
            let report = check_corpus(&corpus);
            if cli.json {
                return print_json(&report);
            }
            println!("{} chunks, {} documents, dim {}", report.rows, report.documents, report.dim);
            for (section, count) in &report.sections {
                println!("  {section:<18} {count}");
            }
        }
    }
    Ok(())
}
