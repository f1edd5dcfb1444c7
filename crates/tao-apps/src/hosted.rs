//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use anyhow::{anyhow, Result};
use log::info;
use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
};
use tao::{
    storage::{seal_to_file, unseal_file},
    Tao, SEAL_POLICY_SELF,
};

pub const DEFAULT_STORAGE_DIR: &str = "/storage";

/// The file `name` refers to inside `storage_dir`.  Names are single path
/// components.
pub fn storage_path(storage_dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(anyhow!("invalid storage name {:?}", name));
    }
    Ok(storage_dir.join(name))
}

/// Seals everything readable from `input` to the caller alone and stores it
/// as `name`.
pub fn seal<T: Tao + ?Sized, R: Read>(tao: &mut T, storage_dir: &Path, name: &str, mut input: R) -> Result<()> {
    let path = storage_path(storage_dir, name)?;
    let mut data = zeroize::Zeroizing::new(Vec::new());
    input.read_to_end(&mut data)?;
    seal_to_file(tao, &path, &data, SEAL_POLICY_SELF)?;
    info!("Sealed {} bytes to {}.", data.len(), path.display());
    Ok(())
}

/// Unseals `name` and writes the data to `output`.  Nothing is written
/// unless the envelope opens and was sealed to the caller alone.
pub fn unseal<T: Tao + ?Sized, W: Write>(tao: &mut T, storage_dir: &Path, name: &str, mut output: W) -> Result<()> {
    let path = storage_path(storage_dir, name)?;
    let data = unseal_file(tao, &path, SEAL_POLICY_SELF)?;
    output.write_all(&data)?;
    output.flush()?;
    Ok(())
}

/// `size` random bytes from the host, as lowercase hex.
pub fn randhex<T: Tao + ?Sized>(tao: &mut T, size: usize) -> Result<String> {
    Ok(hex::encode(tao.get_random_bytes(size)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_static::lazy_static;
    use tao::{HostKeys, SoftTao, SEAL_POLICY_ANY};

    lazy_static! {
        static ref HOST_KEYS: HostKeys = HostKeys::generate_with_bits(1024).unwrap();
    }

    fn hosted(program: &str) -> SoftTao {
        let mut tao = SoftTao::new(HOST_KEYS.clone()).unwrap();
        tao.extend_tao_name(program).unwrap();
        tao
    }

    #[test]
    fn seal_then_unseal() {
        let dir = tempfile::tempdir().unwrap();
        let mut tao = hosted("Program(apps)");
        seal(&mut tao, dir.path(), "secret", &b"attack at dawn"[..]).unwrap();
        let mut output = Vec::new();
        unseal(&mut tao, dir.path(), "secret", &mut output).unwrap();
        assert_eq!(output, b"attack at dawn");
    }

    #[test]
    fn other_program_cannot_unseal() {
        let dir = tempfile::tempdir().unwrap();
        seal(&mut hosted("Program(a)"), dir.path(), "secret", &b"data"[..]).unwrap();
        let mut output = Vec::new();
        assert!(unseal(&mut hosted("Program(b)"), dir.path(), "secret", &mut output).is_err());
        assert!(output.is_empty());
    }

    #[test]
    fn unseal_insists_on_self_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut tao = hosted("Program(apps)");
        seal_to_file(&mut tao, &dir.path().join("shared"), b"data", SEAL_POLICY_ANY).unwrap();
        let mut output = Vec::new();
        assert!(unseal(&mut tao, dir.path(), "shared", &mut output).is_err());
        assert!(output.is_empty());
    }

    #[test]
    fn randhex_has_two_characters_per_byte() {
        let mut tao = hosted("Program(apps)");
        let text = randhex(&mut tao, 16).unwrap();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(randhex(&mut tao, 0).is_err());
    }

    #[test]
    fn names_must_be_single_components() {
        let dir = Path::new("/storage");
        assert!(storage_path(dir, "../etc/passwd").is_err());
        assert!(storage_path(dir, "").is_err());
        assert_eq!(storage_path(dir, "key").unwrap(), dir.join("key"));
    }
}
