//! Seals standard input to the calling program and stores it
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
use std::{io, path, process};
use tao::TaoRpc;
use tao_apps::hosted::{self, DEFAULT_STORAGE_DIR};

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab")]
struct Args {
    /// Name to store the sealed data under
    #[arg()]
    name: String,
    /// Directory holding sealed files
    #[arg(long, default_value = DEFAULT_STORAGE_DIR)]
    storage_dir: path::PathBuf,
}

fn run(args: &Args) -> anyhow::Result<()> {
    // The host channel descriptors are inherited and used by nothing else.
    let mut tao = unsafe { TaoRpc::from_env()? };
    hosted::seal(&mut tao, &args.storage_dir, &args.name, io::stdin().lock())
}

fn main() {
    let args = Args::parse();
    env_logger::init();

    if let Err(err) = run(&args) {
        eprintln!("seal: {}", err);
        process::exit(1);
    }
}
