//! # boshkit
//!
//! Everything bbl does with `bosh`: the create-env wrapper scripts and their
//! vendored manifests, the jumpbox/director vars-files, and the
//! cloud-config pushed to a running director.
//!
//! - [`CreateEnv`]: writes and runs `create-*.sh` / `delete-*.sh`
//! - [`CloudConfigManager`]: `cloud-config/` and `runtime-config/`
//! - [`ScriptRunner`] and [`DirectorConnector`]: process seams, with
//!   [`MockScriptRunner`] and [`MockDirectorCli`] for tests
//!
//! ## Example
//!
//! ```no_run
//! use boshkit::{CreateEnv, ShellRunner};
//! use statekit::Store;
//!
//! let store = Store::new("./my-env", "7.0.0");
//! let create_env = CreateEnv::new(Box::new(ShellRunner::new(false)), store);
//!
//! let state = statekit::bootstrap::load("./my-env".as_ref())?;
//! create_env.initialize(&state)?;
//! # Ok::<(), boshkit::Error>(())
//! ```

pub mod cloudconfig;
pub mod createenv;
pub mod deployments;
pub mod director;
pub mod error;
pub mod scripts;
pub mod vars;

pub use cloudconfig::CloudConfigManager;
pub use createenv::{CreateEnv, MockScriptRunner, ScriptCall, ScriptRunner, ShellRunner};
pub use director::{
    BoshCli, BoshConnector, Connection, DirectorCall, DirectorCli, DirectorConnector,
    MockDirectorCli,
};
pub use error::{Error, Result};
pub use scripts::Script;
