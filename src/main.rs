use chain_mirror::cli::{Args, Runner};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    chain_mirror::logging::init(args.verbose);

    Runner::new(args).run().await?;
    Ok(())
}
