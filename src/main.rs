mod chunker;
mod embedder;
mod llm;
mod scraper;
mod session;
mod vector_store;

use std::env;
use std::io::Write;
use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::embedder::{HashEncoder, OllamaEncoder, TextEncoder};
use crate::llm::{AnswerGenerator, GeneratorConfig};
use crate::scraper::ScrapeError;
use crate::session::{Role, Session};
use crate::vector_store::{DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOP_K};

const NOT_FOUND_REPLY: &str =
    "I couldn't find anything about that in this content. Try rephrasing, or open a different page.";

/// Retrieval tuning knobs, overridable through `SITECHAT_*` environment
/// variables.
struct RagConfig {
    chunk_width: usize,
    min_chunk_length: usize,
    top_k: usize,
    relevance_threshold: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_width: chunker::DEFAULT_CHUNK_WIDTH,
            min_chunk_length: chunker::DEFAULT_MIN_CHUNK_LEN,
            top_k: DEFAULT_TOP_K,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }
}

impl RagConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_width: env_or("SITECHAT_CHUNK_WIDTH", defaults.chunk_width),
            min_chunk_length: env_or("SITECHAT_MIN_CHUNK_LEN", defaults.min_chunk_length),
            top_k: env_or("SITECHAT_TOP_K", defaults.top_k).max(1),
            relevance_threshold: env_or(
                "SITECHAT_RELEVANCE_THRESHOLD",
                defaults.relevance_threshold,
            ),
        }
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            default
        }),
        Err(_) => default,
    }
}

fn build_encoder() -> Box<dyn TextEncoder> {
    match env::var("SITECHAT_ENCODER").as_deref() {
        Ok("ollama") => {
            let endpoint = env::var("SITECHAT_OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string());
            let model =
                env::var("SITECHAT_EMBED_MODEL").unwrap_or_else(|_| "all-minilm".to_string());
            tracing::info!(%endpoint, %model, "using remote embedding encoder");
            Box::new(OllamaEncoder::new(endpoint, model))
        }
        _ => Box::new(HashEncoder::default()),
    }
}

fn load_source(source: &str) -> Result<String, ScrapeError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        scraper::fetch_page_text(source)
    } else {
        scraper::read_text_file(source)
    }
}

fn process_source(
    session: &mut Session,
    source: &str,
    config: &RagConfig,
    encoder: &dyn TextEncoder,
) {
    let text = match load_source(source) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Could not read '{source}': {e}");
            return;
        }
    };

    match session.process_text(&text, config.chunk_width, config.min_chunk_length, encoder) {
        Ok(count) => println!("Processed '{source}': {count} chunks indexed. Ask away."),
        Err(e) => eprintln!("Could not process '{source}': {e}"),
    }
}

fn answer_question(
    session: &mut Session,
    question: &str,
    config: &RagConfig,
    encoder: &dyn TextEncoder,
    generator: &AnswerGenerator,
) {
    session.push(Role::User, question);

    let result = match session.search(question, config.top_k, encoder) {
        None => {
            println!("No content loaded yet. Use `open <url>` first.");
            return;
        }
        Some(Ok(result)) => result,
        Some(Err(e)) => {
            eprintln!("Search failed: {e}");
            return;
        }
    };

    // Off-topic questions get a fixed refusal; handing unrelated context to
    // the generator tends to produce a confident hallucination instead of a
    // "don't know".
    if !result.is_relevant(config.relevance_threshold) {
        println!("{NOT_FOUND_REPLY}");
        session.push(Role::Assistant, NOT_FOUND_REPLY);
        return;
    }

    let Some(store) = session.store() else {
        return;
    };
    let context: Vec<&str> = result
        .matches
        .iter()
        .filter_map(|m| store.chunk_text(m.chunk_index))
        .collect();

    print!("Thinking...");
    let _ = std::io::stdout().flush();

    match generator.generate(question, &context) {
        Ok(answer) => {
            println!("\r{answer}");
            println!("\nSources:");
            for m in &result.matches {
                println!("  chunk {} (distance {:.3})", m.chunk_index, m.distance);
            }
            println!();

            let sources = result.matches.iter().map(|m| m.chunk_index).collect();
            let distances = result.matches.iter().map(|m| m.distance).collect();
            session.push_with_sources(Role::Assistant, answer, Some(sources), Some(distances));
        }
        Err(e) => eprintln!("\rError: {e:#}"),
    }
}

fn print_history(session: &Session) {
    let (messages, hidden) = session.visible_messages();
    if hidden > 0 {
        println!("({hidden} older messages hidden; `all` to show everything)");
    }
    for message in messages {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "bot",
        };
        println!(
            "[{}] {who}: {}",
            message.timestamp.format("%H:%M:%S"),
            message.content
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = RagConfig::from_env();
    let encoder = build_encoder();
    let defaults = GeneratorConfig::default();
    let generator = AnswerGenerator::new(GeneratorConfig {
        endpoint: env::var("SITECHAT_OLLAMA_URL").unwrap_or(defaults.endpoint),
        model: env::var("SITECHAT_LLM_MODEL").unwrap_or(defaults.model),
        ..GeneratorConfig::default()
    });
    let mut session = Session::new();

    println!("sitechat - ask questions about any web page");
    println!("Commands: open <url-or-file>, history, all, recent, quit");

    if let Some(source) = env::args().nth(1) {
        process_source(&mut session, &source, &config, encoder.as_ref());
    }

    loop {
        let mut line = String::new();
        print!("> ");
        std::io::stdout().flush()?;

        if std::io::stdin().read_line(&mut line)? == 0 {
            break; // EOF (Ctrl+D)
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(source) = line.strip_prefix("open ") {
            process_source(&mut session, source.trim(), &config, encoder.as_ref());
        } else if line == "history" {
            print_history(&session);
        } else if line == "all" {
            session.set_show_all(true);
            print_history(&session);
        } else if line == "recent" {
            session.set_show_all(false);
            print_history(&session);
        } else if line == "quit" || line == "exit" {
            break;
        } else {
            answer_question(&mut session, line, &config, encoder.as_ref(), &generator);
        }
    }

    Ok(())
}
