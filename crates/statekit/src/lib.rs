//! Statekit - the bbl state directory
//!
//! This crate owns everything bbl keeps on disk for an environment:
//! - The versioned `bbl-state.json` document ([`State`])
//! - Reading and version-gating it ([`bootstrap::load`])
//! - Writing it and laying out the directory ([`Store`])
//! - Forward-only migration of older layouts ([`Migrator`])
//! - The bbl-managed vs user-managed file table ([`ownership`])
//! - Cleanup and override detection built on that table
//!   ([`GarbageCollector`], [`PatchDetector`])
//!
//! # Example
//!
//! ```no_run
//! use statekit::{Migrator, Store, bootstrap};
//! use std::path::Path;
//!
//! let dir = Path::new("./my-env");
//! let store = Store::new(dir, "7.0.0");
//! let state = bootstrap::load(dir)?;
//! let state = Migrator::new(&store).migrate(state)?;
//! println!("env-id: {}", state.env_id);
//! # Ok::<(), statekit::Error>(())
//! ```

pub mod bootstrap;
pub mod error;
pub mod gc;
pub mod migrate;
pub mod ownership;
pub mod patch;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use gc::GarbageCollector;
pub use migrate::Migrator;
pub use ownership::Ownership;
pub use patch::PatchDetector;
pub use store::{STATE_FILE, Store};
pub use types::{
    AwsCredentials, AzureCredentials, Bosh, CloudstackCredentials, FALLBACK_BBL_VERSION,
    GcpCredentials, Iaas, IaasConfig, Jumpbox, Lb, LbType, MIN_STATE_SCHEMA,
    OpenstackCredentials, ParseIaasError, STATE_SCHEMA, Secret, State, VsphereCredentials,
};
