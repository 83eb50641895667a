use clap::Parser;

use portfolio_server::{config::Args, start_server};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    start_server(args).await
}
