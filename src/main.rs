use clap::Parser;
use dotenv::dotenv;
use std::error::Error;
use vector_chat::cli::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    vector_chat::run(args).await
}
