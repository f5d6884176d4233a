//! # Test Database Provisioner
//!
//! Test runs, isolated source connections and their lifecycle.

pub mod provisioner;
pub mod test_run;

pub use provisioner::{
    derive_source_config, provision, ConnectionState, ProvisionedConnection, SourceCredentials,
    SOURCE_FILE_SUFFIX, SOURCE_PREFIX_SUFFIX,
};
pub use test_run::TestRun;
