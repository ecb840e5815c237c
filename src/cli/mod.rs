use clap::{ Parser, Subcommand };
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP relay in front of the Ollama daemon
    Serve(ServeArgs),
    /// Open the terminal chat client against a running relay
    Chat(ChatArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the relay to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Base URL of the Ollama daemon
    #[arg(long, env = "CHAT_BASE_URL", default_value = "http://localhost:11434")]
    pub chat_base_url: String,

    /// Model used when a chat request does not name one (e.g., llama3.2, deepseek-r1:7b)
    #[arg(long, env = "CHAT_MODEL")] // No default, requests must then carry a model
    pub chat_model: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Base URL of a running relay.
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:3000")]
    pub relay_url: String,

    /// Model to select on start; falls back to the first model the relay lists.
    #[arg(long, env = "CHAT_MODEL")]
    pub model: Option<String>,

    /// Where log records go while the terminal UI owns the screen.
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl ChatArgs {
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("relay-chat.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let args = Args::try_parse_from(["relay-chat", "serve"]).unwrap();
        match args.command {
            Command::Serve(serve) => {
                assert_eq!(serve.chat_base_url, "http://localhost:11434");
                assert!(!serve.server_addr.is_empty());
            }
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn chat_flags_and_global_debug() {
        let args = Args::try_parse_from([
            "relay-chat",
            "chat",
            "--relay-url",
            "http://relay:8080",
            "--model",
            "llama3.2",
            "--log-file",
            "/tmp/chat.log",
            "--debug",
        ]).unwrap();
        assert!(args.debug);
        match args.command {
            Command::Chat(chat) => {
                assert_eq!(chat.relay_url, "http://relay:8080");
                assert_eq!(chat.model.as_deref(), Some("llama3.2"));
                assert_eq!(chat.log_path(), PathBuf::from("/tmp/chat.log"));
            }
            other => panic!("expected chat, got {:?}", other),
        }
    }
}
