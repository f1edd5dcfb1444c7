//! The hosted-program tools against a real host channel.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use lazy_static::lazy_static;
use std::time::Duration;
use tao::{rpc::ChannelState, HostKeys, Tao, TaoError, SEAL_POLICY_ANY, SEAL_POLICY_FEW, SEAL_POLICY_SELF};
use tao_apps::hosted;
use tests::{spawn_hosted, stacked_host, timeout};

const TIMEOUT: Duration = Duration::from_secs(300);

lazy_static! {
    static ref ROOT_KEYS: HostKeys = HostKeys::generate_with_bits(1024).unwrap();
}

#[test]
fn seal_unseal_and_randhex_over_rpc() {
    timeout(TIMEOUT, || {
        let host = stacked_host(&ROOT_KEYS, "Host(linux)").unwrap();
        let (mut tao, _) = spawn_hosted(&host, "Program(seal)").unwrap();
        let storage = tempfile::tempdir().unwrap();

        hosted::seal(&mut tao, storage.path(), "greeting", &b"hello, world"[..]).unwrap();
        let mut output = Vec::new();
        hosted::unseal(&mut tao, storage.path(), "greeting", &mut output).unwrap();
        assert_eq!(output, b"hello, world");

        let text = hosted::randhex(&mut tao, 8).unwrap();
        assert_eq!(text.len(), 16);

        // A sibling under the same host sees the file but cannot open it.
        let (mut sibling, _) = spawn_hosted(&host, "Program(other)").unwrap();
        let mut output = Vec::new();
        assert!(hosted::unseal(&mut sibling, storage.path(), "greeting", &mut output).is_err());
        assert!(output.is_empty());
        assert_eq!(sibling.state(), ChannelState::Idle);
    });
}

#[test]
fn siblings_share_only_any_sealed_data() {
    timeout(TIMEOUT, || {
        let host = stacked_host(&ROOT_KEYS, "Host(linux)").unwrap();
        let (mut writer, _) = spawn_hosted(&host, "Program(writer)").unwrap();
        let (mut reader, _) = spawn_hosted(&host, "Program(reader)").unwrap();

        let sealed = writer.seal(b"shared", SEAL_POLICY_ANY).unwrap();
        assert_eq!(
            reader.unseal(&sealed).unwrap(),
            (b"shared".to_vec(), SEAL_POLICY_ANY.to_string())
        );
        let pinned = writer.seal(b"mine", SEAL_POLICY_FEW).unwrap();
        assert!(matches!(reader.unseal(&pinned), Err(TaoError::PolicyError(_))));

        assert_eq!(
            writer.get_shared_secret(32, SEAL_POLICY_ANY).unwrap(),
            reader.get_shared_secret(32, SEAL_POLICY_ANY).unwrap()
        );
        for policy in [SEAL_POLICY_SELF, SEAL_POLICY_FEW] {
            assert_ne!(
                writer.get_shared_secret(32, policy).unwrap(),
                reader.get_shared_secret(32, policy).unwrap()
            );
        }
    });
}

#[test]
fn stale_rollback_protected_data_is_refused() {
    timeout(TIMEOUT, || {
        let host = stacked_host(&ROOT_KEYS, "Host(linux)").unwrap();
        let (mut tao, _) = spawn_hosted(&host, "Program(counter)").unwrap();

        tao.init_counter("config", 0).unwrap();
        let old = tao.rollback_protected_seal("config", b"v1", SEAL_POLICY_SELF).unwrap();
        let new = tao.rollback_protected_seal("config", b"v2", SEAL_POLICY_SELF).unwrap();
        assert_eq!(tao.get_counter("config").unwrap(), 2);

        assert_eq!(tao.rollback_protected_unseal(&new).unwrap().0, b"v2".to_vec());
        assert!(matches!(
            tao.rollback_protected_unseal(&old),
            Err(TaoError::RollbackError(_))
        ));
        assert!(matches!(tao.unseal(&new), Err(TaoError::RollbackError(_))));
    });
}
