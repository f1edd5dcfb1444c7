//! CloudProxy command-line tools
//!
//! The binaries are thin: argument parsing and logging setup live in
//! `src/bin`, while the work they do is here so that it can be driven
//! against a software Tao in tests.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

/// Utilities run as hosted programs.
pub mod hosted;
/// Program-key provisioning steps.
pub mod provision;
