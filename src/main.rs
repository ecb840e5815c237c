use clap::Parser;
use dotenv::dotenv;
use relay_chat::cli::{ Args, Command };
use relay_chat::error::BoxError;
use std::fs::OpenOptions;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    let args = Args::parse();
    init_logging(&args)?;

    relay_chat::run(args).await
}

fn init_logging(args: &Args) -> Result<(), BoxError> {
    let level = if args.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    // The chat UI owns the terminal, so its logs go to a file instead.
    if let Command::Chat(chat) = &args.command {
        let path = chat.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}
