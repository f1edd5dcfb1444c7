//! Prints random bytes from the host as hex
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
use std::process;
use tao::TaoRpc;
use tao_apps::hosted;

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab")]
struct Args {
    /// Number of random bytes
    #[arg()]
    size: usize,
}

fn run(args: &Args) -> anyhow::Result<()> {
    // The host channel descriptors are inherited and used by nothing else.
    let mut tao = unsafe { TaoRpc::from_env()? };
    println!("{}", hosted::randhex(&mut tao, args.size)?);
    Ok(())
}

fn main() {
    let args = Args::parse();
    env_logger::init();

    if let Err(err) = run(&args) {
        eprintln!("randhex: {}", err);
        process::exit(1);
    }
}
