//! Sealed-file storage
//!
//! Hosted programs keep their long-lived secrets on disk sealed to their own
//! identity.  A sealed file that exists is loaded and unsealed; one that does
//! not is generated, sealed and written.  Either way the caller checks the
//! policy the host reports against the one it expects.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{error::TaoError, policy::SEAL_POLICY_SELF, tao::Tao};
use log::info;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    time::Duration,
};
use tao_utils::{
    keys::SigningKey,
    x509::{certificate_public_key_der, issue_certificate, CertificateKind, CertificateRequest, X509Details},
};
use zeroize::Zeroizing;

/// File holding a program's sealed signing key.
pub const PROGRAM_KEYS_FILE: &str = "protectedProgramKeys";
/// Appended to `PROGRAM_KEYS_FILE` for the file holding its certificate.
pub const CERTIFICATE_SUFFIX: &str = "_cert";

const SELF_SIGNED_VALIDITY: Duration = Duration::from_secs(31_536_000);

/// Writes `contents` to `path`, readable by the owner only.
pub fn write_private_file(path: &Path, contents: &[u8]) -> Result<(), TaoError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

/// Seals `data` under `policy` and writes the envelope to `path`.
pub fn seal_to_file<T: Tao + ?Sized>(tao: &mut T, path: &Path, data: &[u8], policy: &str) -> Result<(), TaoError> {
    let sealed = tao.seal(data, policy)?;
    write_private_file(path, &sealed)
}

/// Unseals the envelope at `path`, insisting the host reports
/// `expected_policy` for it.
pub fn unseal_file<T: Tao + ?Sized>(
    tao: &mut T,
    path: &Path,
    expected_policy: &str,
) -> Result<Zeroizing<Vec<u8>>, TaoError> {
    let sealed = fs::read(path)?;
    let (data, policy) = tao.unseal(&sealed)?;
    let data = Zeroizing::new(data);
    if policy != expected_policy {
        return Err(TaoError::PolicyError(format!(
            "{} was sealed under {:?}, expected {:?}",
            path.display(),
            policy,
            expected_policy
        )));
    }
    Ok(data)
}

/// Unseals `path` if it exists, otherwise seals and saves what `generate`
/// produces.
pub fn load_or_create_sealed<T, F>(tao: &mut T, path: &Path, policy: &str, generate: F) -> Result<Zeroizing<Vec<u8>>, TaoError>
where
    T: Tao + ?Sized,
    F: FnOnce() -> Result<Vec<u8>, TaoError>,
{
    if path.exists() {
        return unseal_file(tao, path, policy);
    }
    let data = Zeroizing::new(generate()?);
    seal_to_file(tao, path, &data, policy)?;
    info!("Sealed fresh data to {}.", path.display());
    Ok(data)
}

////////////////////////////////////////////////////////////////////////////////
// Program keys.
////////////////////////////////////////////////////////////////////////////////

/// A hosted program's signing key and the certificate for it, persisted in a
/// directory the program owns.
#[derive(Debug)]
pub struct ProgramKeyStore {
    key: SigningKey,
    certificate: Vec<u8>,
    directory: PathBuf,
}

impl ProgramKeyStore {
    /// Loads the program key from `directory`, or creates it.  A fresh key
    /// starts with a self-signed certificate for `name` until a CA issues a
    /// better one.
    pub fn init<T: Tao + ?Sized>(tao: &mut T, directory: &Path, name: &str, bits: usize) -> Result<Self, TaoError> {
        let key_path = directory.join(PROGRAM_KEYS_FILE);
        let certificate_path = Self::certificate_path_in(directory);

        if key_path.exists() {
            let der = unseal_file(tao, &key_path, SEAL_POLICY_SELF)?;
            let key = SigningKey::from_pkcs8_der(&der)?;
            let certificate = fs::read(&certificate_path)?;
            if certificate_public_key_der(&certificate)? != key.public_key_der()? {
                return Err(TaoError::VerificationError(format!(
                    "{} does not certify the sealed program key",
                    certificate_path.display()
                )));
            }
            info!("Loaded program key from {}.", directory.display());
            return Ok(ProgramKeyStore {
                key,
                certificate,
                directory: directory.to_path_buf(),
            });
        }

        let key = SigningKey::generate(bits)?;
        let details = X509Details::new(name);
        let certificate = issue_certificate(
            &key,
            &CertificateRequest {
                kind: CertificateKind::Leaf { key_encipherment: true },
                serial: 1,
                validity: SELF_SIGNED_VALIDITY,
                issuer: &details,
                subject: &details,
                subject_public_key_der: &key.public_key_der()?,
            },
        )?;
        seal_to_file(tao, &key_path, &key.to_pkcs8_der()?, SEAL_POLICY_SELF)?;
        fs::write(&certificate_path, &certificate)?;
        info!("Created program key in {}.", directory.display());
        Ok(ProgramKeyStore {
            key,
            certificate,
            directory: directory.to_path_buf(),
        })
    }

    #[inline]
    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    #[inline]
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Replaces the stored certificate, e.g. with one issued by a CA.  The
    /// new certificate must certify the same key.
    pub fn set_certificate(&mut self, certificate: Vec<u8>) -> Result<(), TaoError> {
        if certificate_public_key_der(&certificate)? != self.key.public_key_der()? {
            return Err(TaoError::VerificationError(
                "certificate does not certify the program key".to_string(),
            ));
        }
        fs::write(Self::certificate_path_in(&self.directory), &certificate)?;
        self.certificate = certificate;
        Ok(())
    }

    fn certificate_path_in(directory: &Path) -> PathBuf {
        directory.join(format!("{}{}", PROGRAM_KEYS_FILE, CERTIFICATE_SUFFIX))
    }
}
