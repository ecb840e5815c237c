pub mod cli;
pub mod client;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod stream;
pub mod tui;

use cli::{ Args, ChatArgs, Command, ServeArgs };
use client::RelayClient;
use error::BoxError;
use llm::{ new_backend, LlmConfig };
use log::info;
use server::Server;

pub async fn run(args: Args) -> Result<(), BoxError> {
    match args.command {
        Command::Serve(serve) => run_server(serve).await,
        Command::Chat(chat) => run_chat(chat).await,
    }
}

async fn run_server(args: ServeArgs) -> Result<(), BoxError> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Default Chat Model: {}", args.chat_model.as_deref().unwrap_or("(none)"));
    info!("-------------------------");

    let backend = new_backend(
        &(LlmConfig {
            base_url: Some(args.chat_base_url.clone()),
            completion_model: args.chat_model.clone(),
        })
    );
    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(args.server_addr, backend);
    server.run().await
}

async fn run_chat(args: ChatArgs) -> Result<(), BoxError> {
    info!("Connecting to relay at {}", args.relay_url);
    let client = RelayClient::new(args.relay_url);
    tui::app::run(client, args.model).await
}
