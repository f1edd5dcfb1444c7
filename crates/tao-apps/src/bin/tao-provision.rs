//! Program-key provisioning tool
//!
//! The policy side generates the policy root, certifies endorsement keys,
//! writes signing instructions and answers certificate requests.  The
//! platform side drives a software TPM, persisted in a state file, to request
//! and activate program certificates.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use log::info;
use quote_protocol::{
    messages::{read_message, write_message},
    PcrPolicy, SigningInstructions,
};
use std::{fs, path::PathBuf, process, time::Duration};
use tao::{storage::write_private_file, TrustContext};
use tao_apps::provision::{self, DEFAULT_KEY_BITS, DEFAULT_POLICY_COMMON_NAME};
use tao_utils::{keys::SigningKey, x509::X509Details, HashAlg};

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// The policy root, as paths to its key and certificate.
#[derive(clap::Args, Debug)]
#[clap(rename_all = "kebab")]
struct PolicyArgs {
    /// PKCS#8 DER policy key
    #[arg(long)]
    policy_key: PathBuf,
    /// DER policy certificate
    #[arg(long)]
    policy_cert: PathBuf,
    /// Common name of the policy root
    #[arg(long, default_value = DEFAULT_POLICY_COMMON_NAME)]
    policy_name: String,
}

impl PolicyArgs {
    fn load(&self) -> anyhow::Result<TrustContext> {
        Ok(TrustContext::load(
            &self.policy_key,
            &self.policy_cert,
            X509Details::new(self.policy_name.as_str()),
        )?)
    }
}

#[derive(Subcommand, Debug)]
#[clap(rename_all = "kebab")]
enum Command {
    /// Generate a policy key and self-signed certificate
    GeneratePolicyKey {
        #[arg(long, default_value = DEFAULT_POLICY_COMMON_NAME)]
        common_name: String,
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
        #[arg(long)]
        key_out: PathBuf,
        #[arg(long)]
        cert_out: PathBuf,
    },
    /// Certify the endorsement key of a software TPM
    SignEndorsementKey {
        #[command(flatten)]
        policy: PolicyArgs,
        #[arg(long)]
        tpm_state: PathBuf,
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
        #[arg(long, default_value = "endorsement")]
        common_name: String,
        #[arg(long)]
        serial: u64,
        /// Certificate lifetime in seconds
        #[arg(long, default_value_t = 31_536_000)]
        duration: u64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write signing instructions
    SigningInstructions {
        #[arg(long, default_value = DEFAULT_POLICY_COMMON_NAME)]
        issuer: String,
        /// Certificate lifetime in seconds
        #[arg(long, default_value_t = 31_536_000)]
        duration: u64,
        #[arg(long, default_value = "sha256")]
        hash_alg: HashAlg,
        #[arg(long)]
        is_ca: bool,
        #[arg(long)]
        cannot_sign: bool,
        #[arg(long)]
        out: PathBuf,
    },
    /// Allow the current PCR state of a software TPM
    PcrPolicy {
        #[arg(long)]
        tpm_state: PathBuf,
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
        #[arg(long, default_value = "sha256")]
        hash_alg: HashAlg,
        #[arg(long, value_delimiter = ',')]
        pcrs: Vec<usize>,
        /// Policy file, extended if it already exists
        #[arg(long)]
        out: PathBuf,
    },
    /// Create a program key and a quoted certificate request
    ClientRequest {
        #[arg(long)]
        tpm_state: PathBuf,
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
        #[arg(long)]
        endorsement_cert: PathBuf,
        #[arg(long)]
        program_name: String,
        #[arg(long, default_value = "sha256")]
        hash_alg: HashAlg,
        #[arg(long, value_delimiter = ',')]
        pcrs: Vec<usize>,
        #[arg(long)]
        key_out: PathBuf,
        #[arg(long)]
        request_out: PathBuf,
    },
    /// Answer a certificate request
    ServerSign {
        #[command(flatten)]
        policy: PolicyArgs,
        #[arg(long)]
        instructions: PathBuf,
        #[arg(long)]
        pcr_policy: PathBuf,
        #[arg(long)]
        serial: u64,
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        response_out: PathBuf,
    },
    /// Recover the program certificate from a response
    ClientActivate {
        #[arg(long)]
        tpm_state: PathBuf,
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        response: PathBuf,
        #[arg(long)]
        cert_out: PathBuf,
    },
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::GeneratePolicyKey {
            common_name,
            bits,
            key_out,
            cert_out,
        } => {
            let name = provision::generate_policy_key(&X509Details::new(common_name), bits, &key_out, &cert_out)?;
            println!("{}", name);
        }
        Command::SignEndorsementKey {
            policy,
            tpm_state,
            bits,
            common_name,
            serial,
            duration,
            out,
        } => {
            let context = policy.load()?;
            let mut tpm = provision::open_tpm(&tpm_state, bits)?;
            let certificate = provision::sign_endorsement_key(
                &context,
                &mut tpm,
                &X509Details::new(common_name),
                serial,
                Duration::from_secs(duration),
            )?;
            tpm.save(&tpm_state)?;
            fs::write(&out, certificate)?;
        }
        Command::SigningInstructions {
            issuer,
            duration,
            hash_alg,
            is_ca,
            cannot_sign,
            out,
        } => {
            let mut instructions = SigningInstructions::new(issuer);
            instructions.duration = duration;
            instructions.hash_alg = hash_alg;
            instructions.is_ca = is_ca;
            instructions.can_sign = !cannot_sign;
            instructions.save(&out)?;
        }
        Command::PcrPolicy {
            tpm_state,
            bits,
            hash_alg,
            pcrs,
            out,
        } => {
            let tpm = provision::open_tpm(&tpm_state, bits)?;
            let mut policy = if out.exists() {
                PcrPolicy::from_file(&out)?
            } else {
                PcrPolicy::default()
            };
            provision::record_pcr_state(&tpm, hash_alg, &pcrs, &mut policy)?;
            tpm.save(&tpm_state)?;
            policy.save(&out)?;
            info!("{} now allows {} PCR states.", out.display(), policy.entries().len());
        }
        Command::ClientRequest {
            tpm_state,
            bits,
            endorsement_cert,
            program_name,
            hash_alg,
            pcrs,
            key_out,
            request_out,
        } => {
            if pcrs.is_empty() {
                return Err(anyhow!("no PCRs selected"));
            }
            let endorsement_cert = fs::read(&endorsement_cert)?;
            let mut tpm = provision::open_tpm(&tpm_state, bits)?;
            let (program_key, request) =
                provision::client_request(&mut tpm, &endorsement_cert, &program_name, bits, hash_alg, &pcrs)?;
            tpm.save(&tpm_state)?;
            write_private_file(&key_out, &program_key.to_pkcs8_der()?)?;
            write_message(&request_out, &request)?;
        }
        Command::ServerSign {
            policy,
            instructions,
            pcr_policy,
            serial,
            request,
            response_out,
        } => {
            let context = policy.load()?;
            let response = provision::server_sign(
                &context,
                SigningInstructions::from_file(&instructions)?,
                PcrPolicy::from_file(&pcr_policy)?,
                serial,
                &read_message(&request)?,
            )?;
            write_message(&response_out, &response)?;
        }
        Command::ClientActivate {
            tpm_state,
            bits,
            key,
            response,
            cert_out,
        } => {
            let program_key = SigningKey::from_pkcs8_der(&zeroize::Zeroizing::new(fs::read(&key)?))?;
            let mut tpm = provision::open_tpm(&tpm_state, bits)?;
            let certificate = provision::client_activate(&mut tpm, &program_key, &read_message(&response)?)?;
            tpm.save(&tpm_state)?;
            fs::write(&cert_out, certificate)?;
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    env_logger::init();

    if let Err(err) = run(args.command) {
        eprintln!("tao-provision: {}", err);
        process::exit(1);
    }
}
