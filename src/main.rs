//! askpage CLI application
//!
//! Command-line interface for the askpage library.

use askpage::{Config, PageIndexer, QaSession};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "askpage")]
#[command(about = "Retrieval-augmented extractive question answering over a single web page")]
#[command(version)]
struct Cli {
    /// JSON configuration file (flags below override its values)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// URL of the page to index
    #[arg(long)]
    url: Option<String>,

    /// Directory holding the collection database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Collection name
    #[arg(long)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Build the effective configuration: file if given, then flag overrides
    fn resolve_config(&self) -> askpage::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(url) = &self.url {
            config.page.url = url.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.storage.data_dir = data_dir.clone();
        }
        if let Some(collection) = &self.collection {
            config.storage.collection = collection.clone();
        }

        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the page and populate the collection (no-op when already populated)
    Index,

    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,
    },

    /// Interactive question answering loop
    Chat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Commands::Index => {
            index_command(config).await?;
        }
        Commands::Ask { question } => {
            ask_command(config, question).await?;
        }
        Commands::Chat => {
            chat_command(config).await?;
        }
    }

    Ok(())
}

async fn index_command(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut indexer = PageIndexer::new(config).await?;
    let stats = indexer.ensure_indexed().await?;

    if stats.newly_indexed > 0 {
        println!(
            "Indexed {} chunks in {:.2}s",
            stats.newly_indexed, stats.processing_time
        );
    } else {
        println!(
            "Collection already populated with {} chunks",
            stats.chunk_count
        );
    }

    Ok(())
}

async fn ask_command(config: Config, question: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut indexer = PageIndexer::new(config.clone()).await?;
    indexer.ensure_indexed().await?;
    drop(indexer);

    let mut session = QaSession::new(&config).await?;
    let exchange = session.ask(&question)?;

    println!("Text: {}", exchange.context);
    println!("Answer: {}", exchange.answer);

    Ok(())
}

async fn chat_command(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut indexer = PageIndexer::new(config.clone()).await?;
    indexer.ensure_indexed().await?;
    drop(indexer);

    let mut session = QaSession::new(&config).await?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    session.run_interactive(stdin.lock(), stdout.lock())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["askpage", "chat"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["askpage", "ask", "What is Singapore?"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["askpage", "index"]).unwrap();
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.page.url, "https://en.wikipedia.org/wiki/Singapore");
        assert_eq!(config.storage.data_dir, PathBuf::from("chroma_data"));
        assert_eq!(config.storage.collection, "default");
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "askpage",
            "--url",
            "https://example.com",
            "--collection",
            "pages",
            "chat",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.page.url, "https://example.com");
        assert_eq!(config.storage.collection, "pages");
        assert_eq!(config.storage.data_dir, PathBuf::from("chroma_data"));
    }

    #[test]
    fn test_config_file_flag() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("askpage.json");
        std::fs::write(
            &path,
            r#"{"page": {"url": "https://example.org/page", "user_agent": "test-agent"},
                "storage": {"data_dir": "file_data", "collection": "file_collection"}}"#,
        )
        .unwrap();
        let path_arg = path.to_str().unwrap();

        let cli =
            Cli::try_parse_from(["askpage", "--config", path_arg, "index"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.page.url, "https://example.org/page");
        assert_eq!(config.storage.collection, "file_collection");

        // Flags win over file values
        let cli = Cli::try_parse_from([
            "askpage",
            "--config",
            path_arg,
            "--collection",
            "flag_collection",
            "index",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.page.url, "https://example.org/page");
        assert_eq!(config.storage.collection, "flag_collection");
    }
}
