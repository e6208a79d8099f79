use anyhow::{Result, bail};
use statekit::{Iaas, LbType, State};
use tfkit::Outputs;

use super::{load_state, reconciler};
use crate::Context;
use crate::cli::LbArgs;
use crate::ui;

pub fn create(ctx: &Context, args: &LbArgs) -> Result<()> {
    let reconciler = reconciler(ctx)?;
    let state = reconciler.create_lbs(reconciler.load()?, args)?;
    if !ctx.quiet {
        ui::success(&format!("Created {} load balancers", state.lb.lb_type));
    }
    Ok(())
}

pub fn update(ctx: &Context, args: &LbArgs) -> Result<()> {
    let reconciler = reconciler(ctx)?;
    reconciler.update_lbs(reconciler.load()?, args)?;
    if !ctx.quiet {
        ui::success("Updated load balancers");
    }
    Ok(())
}

pub fn delete(ctx: &Context) -> Result<()> {
    let reconciler = reconciler(ctx)?;
    reconciler.delete_lbs(reconciler.load()?)?;
    if !ctx.quiet {
        ui::success("Deleted load balancers");
    }
    Ok(())
}

/// `bbl lbs`
pub fn show(ctx: &Context) -> Result<()> {
    let state = load_state(ctx)?;
    if !state.lb.is_present() {
        bail!("no load balancer has been found for this bbl environment");
    }

    let outputs = reconciler(ctx)?.outputs()?;
    for line in describe(&state, &outputs)? {
        println!("{line}");
    }
    Ok(())
}

/// Label, name output and address output for each load balancer.
fn fields(iaas: Iaas, lb_type: LbType) -> &'static [(&'static str, &'static str, &'static str)] {
    match (iaas, lb_type) {
        (Iaas::Aws, LbType::Cf) => &[("CF Router LB", "cf_router_lb_name", "cf_router_lb_url")],
        (Iaas::Aws, LbType::Concourse) => &[("Concourse LB", "concourse_lb_name", "concourse_lb_url")],
        (Iaas::Azure, LbType::Cf) => &[("CF LB", "cf_lb_name", "cf_lb_ip")],
        (Iaas::Azure, LbType::Concourse) => &[("Concourse LB", "concourse_lb_name", "concourse_lb_ip")],
        (Iaas::Gcp, LbType::Cf) => &[("CF Router LB", "router_backend_service", "router_lb_ip")],
        (Iaas::Gcp, LbType::Concourse) => {
            &[("Concourse LB", "concourse_target_pool", "concourse_lb_ip")]
        }
        _ => &[],
    }
}

fn describe(state: &State, outputs: &Outputs) -> Result<Vec<String>> {
    let Some(iaas) = state.iaas_kind() else {
        bail!("the environment has no iaas configured");
    };

    let mut lines = Vec::new();
    for &(label, name, address) in fields(iaas, state.lb.lb_type) {
        lines.push(format!(
            "{label}: {} [{}]",
            outputs.get_string(name)?,
            outputs.get_string(address)?
        ));
    }
    if state.lb.lb_type == LbType::Cf && !state.lb.domain.is_empty() {
        lines.push(format!("CF System Domain: {}", state.lb.domain));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use statekit::{IaasConfig, Lb};
    use std::collections::BTreeMap;

    #[test]
    fn test_describe_gcp_cf() {
        let state = State {
            iaas: Some(IaasConfig::empty(Iaas::Gcp)),
            lb: Lb {
                lb_type: LbType::Cf,
                domain: "cf.example.com".to_string(),
                ..Lb::default()
            },
            ..State::default()
        };
        let mut map = BTreeMap::new();
        map.insert("router_backend_service".to_string(), json!("demo-router-lb"));
        map.insert("router_lb_ip".to_string(), json!("35.1.2.3"));

        assert_eq!(
            describe(&state, &Outputs::new(map)).unwrap(),
            vec![
                "CF Router LB: demo-router-lb [35.1.2.3]",
                "CF System Domain: cf.example.com"
            ]
        );
    }

    #[test]
    fn test_describe_missing_output() {
        let state = State {
            iaas: Some(IaasConfig::empty(Iaas::Aws)),
            lb: Lb {
                lb_type: LbType::Concourse,
                ..Lb::default()
            },
            ..State::default()
        };
        let err = describe(&state, &Outputs::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing terraform output: concourse_lb_name");
    }
}
