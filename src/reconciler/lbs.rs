use super::{Reconciler, require_environment};
use crate::cli::LbArgs;
use anyhow::{Context, Result, bail};
use statekit::{Iaas, Lb, LbType, State};
use std::fs;
use std::path::Path;

impl Reconciler {
    /// Attach load balancers and re-apply.
    pub fn create_lbs(&self, state: State, args: &LbArgs) -> Result<State> {
        require_environment(&state, &self.store)?;
        let iaas = lb_iaas(&state)?;

        let lb_type = match args.lb_type {
            Some(LbType::None) | None => bail!("--lb-type is required (cf or concourse)"),
            Some(lb_type) => lb_type,
        };
        if state.lb.is_present() && state.lb.lb_type != lb_type {
            bail!(
                "A {} load balancer already exists, run `bbl delete-lbs` before creating a {} one",
                state.lb.lb_type,
                lb_type
            );
        }

        let mut state = state;
        state.lb = build(iaas, lb_type, &Lb::default(), args)?;
        self.reapply(&mut state)?;
        Ok(state)
    }

    /// Replace the certificate, key or domain of the existing load balancers.
    pub fn update_lbs(&self, state: State, args: &LbArgs) -> Result<State> {
        require_environment(&state, &self.store)?;
        let iaas = lb_iaas(&state)?;

        if !state.lb.is_present() {
            bail!("no load balancer has been found for this bbl environment");
        }
        if let Some(lb_type) = args.lb_type
            && lb_type != state.lb.lb_type
        {
            bail!(
                "The load balancer type cannot be changed from {} to {}",
                state.lb.lb_type,
                lb_type
            );
        }

        let updated = build(iaas, state.lb.lb_type, &state.lb, args)?;
        if updated == state.lb {
            log::info!("load balancer configuration unchanged");
            return Ok(state);
        }

        let mut state = state;
        state.lb = updated;
        self.reapply(&mut state)?;
        Ok(state)
    }

    /// Remove the load balancers. Nothing happens when there are none.
    pub fn delete_lbs(&self, state: State) -> Result<State> {
        require_environment(&state, &self.store)?;
        if !state.lb.is_present() {
            log::info!("no load balancers to delete");
            return Ok(state);
        }

        let mut state = state;
        state.lb = Lb::default();
        self.reapply(&mut state)?;
        Ok(state)
    }
}

fn lb_iaas(state: &State) -> Result<Iaas> {
    let iaas = state
        .iaas_kind()
        .context("the environment has no iaas configured")?;
    if !iaas.supports_lbs() {
        bail!("{iaas} does not support load balancers managed by bbl");
    }
    Ok(iaas)
}

/// The new [`Lb`], with flags taking precedence over `current`.
fn build(iaas: Iaas, lb_type: LbType, current: &Lb, args: &LbArgs) -> Result<Lb> {
    let mut lb = Lb {
        lb_type,
        ..current.clone()
    };

    if let Some(path) = &args.cert {
        lb.cert = read(path)?;
    }
    if let Some(path) = &args.key {
        lb.key = read(path)?;
    }
    if let Some(path) = &args.chain {
        if iaas != Iaas::Aws {
            bail!("--lb-chain is only supported on aws");
        }
        lb.chain = read(path)?;
    }
    if let Some(domain) = &args.domain {
        lb.domain.clone_from(domain);
    }

    if lb_type == LbType::Cf && (lb.cert.is_empty() || lb.key.is_empty()) {
        bail!("--lb-cert and --lb-key are required for cf load balancers");
    }
    if lb_type == LbType::Concourse {
        lb.cert.clear();
        lb.key.clear();
        lb.chain.clear();
        lb.domain.clear();
    }
    Ok(lb)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
