//! # tfkit
//!
//! Drives terraform on behalf of bbl. The crate never talks to a cloud API
//! itself; it renders inputs into the state directory and runs the terraform
//! binary against them.
//!
//! - [`BinaryPath`]: the embedded (or `PATH`) terraform binary
//! - [`templates`] and [`inputs`]: `terraform/bbl-template.tf`,
//!   `vars/bbl.tfvars` and `TF_VAR_*` credentials
//! - [`Manager`]: init / apply / destroy / outputs
//! - [`Executor`]: the process seam, with [`MockExecutor`] for tests
//!
//! ## Example
//!
//! ```no_run
//! use statekit::Store;
//! use tfkit::{BinaryPath, CliExecutor, Manager};
//!
//! let store = Store::new("./my-env", "7.0.0");
//! let executor = CliExecutor::new(BinaryPath::new(), false);
//! let manager = Manager::new(Box::new(executor), store, false);
//!
//! let mut state = statekit::bootstrap::load("./my-env".as_ref())?;
//! manager.apply(&mut state)?;
//! println!("{}", manager.outputs()?.get_string("director_address")?);
//! # Ok::<(), tfkit::Error>(())
//! ```

pub mod binary;
pub mod error;
pub mod executor;
pub mod inputs;
pub mod manager;
pub mod outputs;
pub mod templates;

pub use binary::BinaryPath;
pub use error::{Error, REDACTED_NOTICE, Result};
pub use executor::{
    CliExecutor, Executor, MockCall, MockExecutor, MockResponse, Output, TAIL_CAPACITY,
    TailBuffer,
};
pub use manager::Manager;
pub use outputs::Outputs;
