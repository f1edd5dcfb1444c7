//! Main function for the Tao CA server
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use clap::Parser;
use log::info;
use std::{path, process};
use tao_ca_server::{CaServerConfig, TaoCaServer};

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab")]
struct Args {
    /// Path to the JSON server configuration
    #[arg(long)]
    config: path::PathBuf,
}

fn run(args: &Args) -> anyhow::Result<()> {
    info!("Loading configuration {:?}", args.config);
    let config = CaServerConfig::from_file(&args.config)?;
    let mut server = TaoCaServer::from_config(&config)?;
    println!("Tao CA server running on {}", server.local_addr()?);
    server.listen()?;
    Ok(())
}

/// Entry point
fn main() {
    // parse args
    let args = Args::parse();

    // setup logger
    env_logger::init();

    if let Err(err) = run(&args) {
        eprintln!("{}", err);
        process::exit(1);
    }
}
