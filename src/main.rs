use anyhow::Result;
use clap::Parser;
use pdf_annotator::cli;
use tracing::error;

fn main() -> Result<()> {
    // .env must be loaded before clap reads the environment fallbacks.
    dotenvy::dotenv().ok();
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        if tracing::dispatcher::has_been_set() {
            error!("{:#}", err);
        } else {
            eprintln!("error: {err:#}");
        }
        std::process::exit(1);
    }
    Ok(())
}
