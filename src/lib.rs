pub mod agent;
pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod memory;
pub mod models;
pub mod server;
pub mod websocket;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("History Store Type: {}", args.history_type);
    info!("History Key: {}", args.history_key);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Max Context Length: {}", args.max_context_length);
    info!("Context Budget: {}", args.context_max_chars);
    info!("Recent Messages: {}", args.max_recent_messages);
    info!("Similarity Threshold: {}", args.similarity_threshold);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::from_args(&args).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args.server_api_key.clone());
    server.run().await?;

    Ok(())
}
