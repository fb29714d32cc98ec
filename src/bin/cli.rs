//! Command-line front end for the chat threads and the page summarizer

use anyhow::Context;
use clap::{Parser, Subcommand};
use domesticated::browser::{BrowserSession, LaunchOptions};
use domesticated::bridge::Background;
use domesticated::chat::{ChatMessage, ChatMessageThread, ChatThreadStore, FileStorage, KeyValueStorage};
use domesticated::config::Config;
use domesticated::dom::Page;
use domesticated::scripts::inject_summary;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "domesticated")]
#[command(version)]
#[command(about = "Chat threads and page summaries backed by a chat completion API", long_about = None)]
struct Cli {
    /// Directory holding the key and chat thread files [overrides DOMESTICATED_STORAGE_DIR]
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Chat completion endpoint [overrides DOMESTICATED_API_URL]
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Model name sent with each request [overrides DOMESTICATED_MODEL]
    #[arg(long)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store the API key
    SetKey { key: String },

    /// Start a new chat thread and print its id
    NewThread {
        /// System prompt of the thread
        #[arg(long, short = 's')]
        system: Option<String>,
    },

    /// Send a message in a thread and print the conversation
    Send { thread_id: String, message: String },

    /// List stored thread ids
    Threads,

    /// Summarize text given as an argument
    SummarizeText { text: String },

    /// Open a wiki article and insert a summary after its first paragraph
    SummarizePage {
        url: String,

        /// Launch browser in headed mode (default: headless)
        #[arg(long, short = 'H')]
        headed: bool,

        /// Path to custom browser executable
        #[arg(long, value_name = "PATH")]
        executable_path: Option<PathBuf>,
    },
}

impl Cli {
    fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.storage_dir {
            config = config.storage_dir(dir.clone());
        }
        if let Some(url) = &self.api_url {
            config = config.api_url(url.clone());
        }
        if let Some(model) = &self.model {
            config = config.model(model.clone());
        }
        config
    }
}

fn print_thread(thread: &ChatMessageThread) {
    for message in thread {
        println!("{:>9}: {}", message.role.to_string(), message.content);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // Environment first, then flags on top
    let config = cli.apply_overrides(Config::from_env()?);

    let storage: Arc<dyn KeyValueStorage> = Arc::new(
        FileStorage::open(&config.storage_dir)
            .with_context(|| format!("Failed to open storage at {}", config.storage_dir.display()))?,
    );
    let background = Background::new(config, storage.clone());

    match cli.command {
        Command::SetKey { key } => {
            if !background.set_key(&key) {
                anyhow::bail!("API key could not be stored");
            }
            eprintln!("API key stored");
        }
        Command::NewThread { system } => {
            let messages = system.map(ChatMessage::system).into_iter().collect();
            println!("{}", background.create_chat_thread(messages)?);
        }
        Command::Send { thread_id, message } => {
            let thread = background.send_chat_message(&thread_id, &message).await?;
            print_thread(&thread);
        }
        Command::Threads => {
            for id in ChatThreadStore::new(storage)?.thread_ids()? {
                println!("{}", id);
            }
        }
        Command::SummarizeText { text } => {
            println!("{}", background.summarize(&text).await?);
        }
        Command::SummarizePage {
            url,
            headed,
            executable_path,
        } => {
            let mut options = LaunchOptions::new().headless(!headed);
            if let Some(path) = executable_path {
                options = options.chrome_path(path);
            }
            let session = BrowserSession::launch(options)?;
            let page = session.open(&url)?;
            let inserted = inject_summary(&page, &background).await?;
            println!("{}", page.inner_text(inserted)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::default().storage_dir("/tmp/base").model("base-model")
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "domesticated",
            "--model",
            "gpt-4o",
            "--storage-dir",
            "/tmp/flags",
            "threads",
        ])
        .unwrap();
        let config = cli.apply_overrides(base());
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/flags"));
    }

    #[test]
    fn test_missing_flags_keep_config() {
        let cli = Cli::try_parse_from(["domesticated", "threads"]).unwrap();
        assert!(cli.storage_dir.is_none() && cli.api_url.is_none() && cli.model.is_none());

        let config = cli.apply_overrides(base());
        assert_eq!(config.model, "base-model");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/base"));
    }
}
