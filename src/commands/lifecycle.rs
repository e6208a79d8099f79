use anyhow::{Result, bail};
use colored::Colorize;
use dialoguer::Confirm;

use super::{reconciler, store};
use crate::Context;
use crate::cli::{DestroyArgs, UpArgs};
use crate::ui;

pub fn plan(ctx: &Context, args: &UpArgs) -> Result<()> {
    let reconciler = reconciler(ctx)?;
    let state = reconciler.plan(reconciler.load()?, args)?;

    if !ctx.quiet {
        ui::success(&format!("Planned environment {}", state.env_id.bold()));
        ui::dim(&format!("state directory: {}", ctx.state_dir.display()));
        ui::dim("run `bbl up` to create it");
    }
    Ok(())
}

pub fn up(ctx: &Context, args: &UpArgs) -> Result<()> {
    let reconciler = reconciler(ctx)?;
    let state = reconciler.up(reconciler.load()?, args)?;

    if !ctx.quiet {
        ui::success(&format!("Environment {} is up", state.env_id.bold()));
        if !state.jumpbox.url.is_empty() {
            ui::dim(&format!("jumpbox: {}", state.jumpbox.url));
        }
        if state.bosh.is_deployed() {
            ui::dim(&format!("director: {}", state.bosh.director_address));
            ui::dim("run `eval \"$(bbl print-env)\"` to target it");
        }
    }
    Ok(())
}

pub fn rotate(ctx: &Context) -> Result<()> {
    let reconciler = reconciler(ctx)?;
    reconciler.rotate(reconciler.load()?)?;

    if !ctx.quiet {
        ui::success("Rotated the jumpbox ssh key");
    }
    Ok(())
}

pub fn down(ctx: &Context) -> Result<()> {
    let reconciler = reconciler(ctx)?;
    let state = reconciler.down(reconciler.load()?)?;

    if !ctx.quiet {
        ui::success(&format!("Environment {} is down", state.env_id.bold()));
    }
    Ok(())
}

pub fn destroy(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    if !store(ctx).state_file().exists() && args.skip_if_missing {
        ui::info("state file not found, and --skip-if-missing flag provided, exiting");
        return Ok(());
    }

    let reconciler = reconciler(ctx)?;
    let state = reconciler.load()?;

    if !args.no_confirm {
        let prompt = format!(
            "Are you sure you want to delete infrastructure for {}? This operation cannot be undone!",
            state.env_id
        );
        if !Confirm::new().with_prompt(prompt).default(false).interact()? {
            bail!("Destroy cancelled");
        }
    }

    let env_id = state.env_id.clone();
    reconciler.destroy(state)?;

    if !ctx.quiet {
        ui::success(&format!("Destroyed environment {}", env_id.bold()));
    }
    Ok(())
}
