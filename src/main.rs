use clap::Parser;
use mathmark::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Convert(args) => cli::convert::run(args).await,
    }
}
