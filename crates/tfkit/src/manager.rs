//! Terraform lifecycle for one state directory.

use crate::error::{Error, Result};
use crate::executor::{Executor, Output};
use crate::inputs;
use crate::outputs::Outputs;
use crate::templates;
use statekit::{Secret, State, Store};
use std::fs;
use std::path::{Path, PathBuf};

/// Oldest terraform that understands the rendered templates.
pub const MINIMUM_VERSION: (u32, u32, u32) = (0, 11, 0);

const TEMPLATE_FILE: &str = "bbl-template.tf";
const TFVARS_FILE: &str = "bbl.tfvars";
const TFSTATE_FILE: &str = "terraform.tfstate";

/// Renders inputs and runs terraform in `<state-dir>/terraform`.
pub struct Manager {
    executor: Box<dyn Executor>,
    store: Store,
    debug: bool,
}

impl Manager {
    /// `debug` controls whether failures point at `bbl latest-error`.
    pub fn new(executor: Box<dyn Executor>, store: Store, debug: bool) -> Self {
        Self {
            executor,
            store,
            debug,
        }
    }

    /// Refuse terraform older than [`MINIMUM_VERSION`]. Returns the version.
    pub fn validate_version(&self, state: &mut State) -> Result<String> {
        let dir = self.store.state_dir()?;
        let output = self.run_recorded(state, &dir, &["version".to_string()], &[])?;
        if !output.success() {
            return Err(self.failure("version", &output));
        }

        let found = parse_version(&output.stdout)
            .ok_or_else(|| Error::UnknownVersion(output.stdout.trim().to_string()))?;
        if found < MINIMUM_VERSION {
            let (a, b, c) = MINIMUM_VERSION;
            let (x, y, z) = found;
            return Err(Error::Version {
                found: format!("{x}.{y}.{z}"),
                minimum: format!("{a}.{b}.{c}"),
            });
        }
        let (x, y, z) = found;
        Ok(format!("{x}.{y}.{z}"))
    }

    /// Write the template and tfvars, then `terraform init`.
    pub fn init(&self, state: &mut State) -> Result<()> {
        let template = templates::render(state)?;
        let tfvars = inputs::tfvars(state)?;

        let terraform_dir = self.store.terraform_dir()?;
        let vars_dir = self.store.vars_dir()?;
        write(&terraform_dir.join(TEMPLATE_FILE), &template)?;
        write(&vars_dir.join(TFVARS_FILE), &tfvars)?;

        let output = self.run_recorded(state, &terraform_dir, &["init".to_string()], &[])?;
        if !output.success() {
            return Err(self.failure("init", &output));
        }
        Ok(())
    }

    /// Converge infrastructure. `state.latest_tf_output` is updated whether
    /// or not terraform succeeds.
    pub fn apply(&self, state: &mut State) -> Result<()> {
        self.init(state)?;

        let mut args = vec!["apply".to_string(), "-auto-approve".to_string()];
        args.extend(self.common_args()?);

        let terraform_dir = self.store.terraform_dir()?;
        let env = inputs::credential_env(state);
        let output = self.run_recorded(state, &terraform_dir, &args, &env)?;

        if !output.success() {
            return Err(Error::Apply {
                tf_state: self.read_tf_state()?,
                underlying: Box::new(self.failure("apply", &output)),
            });
        }
        Ok(())
    }

    /// Tear down infrastructure. A directory without terraform state has
    /// nothing to destroy.
    pub fn destroy(&self, state: &mut State) -> Result<()> {
        if !self.tf_state_path()?.exists() {
            log::info!("no terraform state, skipping terraform destroy");
            return Ok(());
        }

        self.init(state)?;

        let mut args = vec!["destroy".to_string(), "-auto-approve".to_string()];
        args.extend(self.common_args()?);

        let terraform_dir = self.store.terraform_dir()?;
        let env = inputs::credential_env(state);
        let output = self.run_recorded(state, &terraform_dir, &args, &env)?;

        if !output.success() {
            return Err(Error::Destroy {
                tf_state: self.read_tf_state()?,
                underlying: Box::new(self.failure("destroy", &output)),
            });
        }
        Ok(())
    }

    /// Current outputs. Empty when terraform has never been applied.
    ///
    /// Read-only callers have no state to record into, so a failure is
    /// logged in full and never points at `bbl latest-error`.
    pub fn outputs(&self) -> Result<Outputs> {
        if !self.tf_state_path()?.exists() {
            return Ok(Outputs::default());
        }

        let args = vec![
            "output".to_string(),
            "-json".to_string(),
            format!("-state=../vars/{TFSTATE_FILE}"),
        ];
        let terraform_dir = self.store.terraform_dir()?;
        let output = self.run(&terraform_dir, &args, &[])?;
        if !output.success() {
            log::error!("{}", output.combined.trim_end());
            return Err(Error::Failed {
                command: "output".to_string(),
                code: output.code,
                redacted: false,
            });
        }
        Outputs::from_json(&output.stdout)
    }

    /// `-state` and `-var-file` arguments, relative to the terraform dir.
    fn common_args(&self) -> Result<Vec<String>> {
        let mut args = vec![
            format!("-state=../vars/{TFSTATE_FILE}"),
            format!("-var-file=../vars/{TFVARS_FILE}"),
        ];
        for file in inputs::user_var_files(&self.store.vars_dir()?)? {
            if let Some(name) = file.file_name() {
                args.push(format!("-var-file=../vars/{}", name.to_string_lossy()));
            }
        }
        Ok(args)
    }

    fn run(&self, dir: &Path, args: &[String], env: &[(String, Secret)]) -> Result<Output> {
        self.executor.run(dir, args, env)
    }

    /// Run terraform and overwrite `state.latest_tf_output` with what it
    /// printed, before the caller looks at the exit status.
    fn run_recorded(
        &self,
        state: &mut State,
        dir: &Path,
        args: &[String],
        env: &[(String, Secret)],
    ) -> Result<Output> {
        let output = self.run(dir, args, env)?;
        state.latest_tf_output = output.combined.clone();
        Ok(output)
    }

    fn failure(&self, command: &str, output: &Output) -> Error {
        Error::Failed {
            command: command.to_string(),
            code: output.code,
            redacted: !self.debug,
        }
    }

    fn tf_state_path(&self) -> Result<PathBuf> {
        Ok(self.store.vars_dir()?.join(TFSTATE_FILE))
    }

    fn read_tf_state(&self) -> Result<String> {
        let path = self.tf_state_path()?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| Error::io(path, e))
}

/// Parse `Terraform v0.11.14` (or `1.5.7`) into a version triple.
fn parse_version(stdout: &str) -> Option<(u32, u32, u32)> {
    let word = stdout
        .split_whitespace()
        .find(|w| w.trim_start_matches('v').starts_with(|c: char| c.is_ascii_digit()))?;
    let mut parts = word
        .trim_start_matches('v')
        .split(['.', '-'])
        .map(|p| p.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some((major, minor, patch))
}
