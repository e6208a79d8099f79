use super::{StackManager, VpcChecker};
use crate::runner;
use anyhow::{Result, bail};
use statekit::{AwsCredentials, Secret};

/// The `aws` CLI with the credentials from the state.
pub struct AwsCli {
    access_key_id: String,
    secret_access_key: Secret,
    region: String,
}

impl AwsCli {
    pub fn new(credentials: &AwsCredentials) -> Self {
        Self {
            access_key_id: credentials.access_key_id.clone(),
            secret_access_key: credentials.secret_access_key.clone(),
            region: credentials.region.clone(),
        }
    }

    /// `None` when the CLI is not installed.
    fn run(&self, args: &[&str]) -> Result<Option<runner::Captured>> {
        if !runner::on_path("aws") {
            log::warn!("aws CLI not found on PATH, skipping `aws {}`", args.join(" "));
            return Ok(None);
        }
        let captured = runner::run_capture(
            "aws",
            args,
            &[
                ("AWS_ACCESS_KEY_ID", self.access_key_id.as_str()),
                ("AWS_SECRET_ACCESS_KEY", self.secret_access_key.expose()),
                ("AWS_DEFAULT_REGION", self.region.as_str()),
            ],
        )?;
        Ok(Some(captured))
    }
}

impl StackManager for AwsCli {
    fn stack_exists(&self, name: &str) -> Result<bool> {
        let Some(captured) = self.run(&[
            "cloudformation",
            "describe-stacks",
            "--stack-name",
            name,
            "--output",
            "text",
        ])?
        else {
            return Ok(false);
        };

        if captured.success {
            return Ok(true);
        }
        if captured.stderr.contains("does not exist") {
            return Ok(false);
        }
        bail!("Failed to describe stack {name}: {}", captured.stderr)
    }
}

impl VpcChecker for AwsCli {
    fn check_exists(&self, name: &str) -> Result<bool> {
        let filter = format!("Name=tag:Name,Values={name}");
        let Some(captured) = self.run(&[
            "ec2",
            "describe-vpcs",
            "--filters",
            &filter,
            "--query",
            "Vpcs[].VpcId",
            "--output",
            "text",
        ])?
        else {
            return Ok(false);
        };

        if !captured.success {
            bail!("Failed to describe VPCs: {}", captured.stderr);
        }
        Ok(!captured.stdout.trim().is_empty())
    }
}
