//! The bbl-owned terraform template for an environment.

use crate::error::{Error, Result};
use statekit::{Iaas, LbType, State};

const AWS: &str = include_str!("../templates/aws.tf");
const AZURE: &str = include_str!("../templates/azure.tf");
const GCP: &str = include_str!("../templates/gcp.tf");
const VSPHERE: &str = include_str!("../templates/vsphere.tf");
const OPENSTACK: &str = include_str!("../templates/openstack.tf");
const CLOUDSTACK: &str = include_str!("../templates/cloudstack.tf");

const AWS_CF: &str = include_str!("../templates/lb/aws-cf.tf");
const AWS_CONCOURSE: &str = include_str!("../templates/lb/aws-concourse.tf");
const AZURE_CF: &str = include_str!("../templates/lb/azure-cf.tf");
const AZURE_CONCOURSE: &str = include_str!("../templates/lb/azure-concourse.tf");
const GCP_CF: &str = include_str!("../templates/lb/gcp-cf.tf");
const GCP_CONCOURSE: &str = include_str!("../templates/lb/gcp-concourse.tf");

fn base(iaas: Iaas) -> &'static str {
    match iaas {
        Iaas::Aws => AWS,
        Iaas::Azure => AZURE,
        Iaas::Gcp => GCP,
        Iaas::Vsphere => VSPHERE,
        Iaas::Openstack => OPENSTACK,
        Iaas::Cloudstack => CLOUDSTACK,
    }
}

fn lb_fragment(iaas: Iaas, lb: LbType) -> Result<Option<&'static str>> {
    let fragment = match (iaas, lb) {
        (_, LbType::None) => None,
        (Iaas::Aws, LbType::Cf) => Some(AWS_CF),
        (Iaas::Aws, LbType::Concourse) => Some(AWS_CONCOURSE),
        (Iaas::Azure, LbType::Cf) => Some(AZURE_CF),
        (Iaas::Azure, LbType::Concourse) => Some(AZURE_CONCOURSE),
        (Iaas::Gcp, LbType::Cf) => Some(GCP_CF),
        (Iaas::Gcp, LbType::Concourse) => Some(GCP_CONCOURSE),
        (iaas, _) => return Err(Error::LbUnsupported { iaas }),
    };
    Ok(fragment)
}

/// Render the template for `state`: the IaaS base plus any LB fragment.
pub fn render(state: &State) -> Result<String> {
    let iaas = state.iaas_kind().ok_or(Error::NoIaas)?;

    let mut template = String::from(base(iaas));
    if let Some(fragment) = lb_fragment(iaas, state.lb.lb_type)? {
        template.push('\n');
        template.push_str(fragment);
    }
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statekit::{IaasConfig, Lb};

    fn state(iaas: Iaas, lb_type: LbType) -> State {
        State {
            iaas: Some(IaasConfig::empty(iaas)),
            env_id: "demo".to_string(),
            lb: Lb {
                lb_type,
                ..Lb::default()
            },
            ..State::default()
        }
    }

    #[test]
    fn test_every_iaas_has_a_template_with_required_outputs() {
        for iaas in Iaas::all() {
            let template = render(&state(*iaas, LbType::None)).unwrap();
            for output in [
                "jumpbox_url",
                "director_address",
                "internal_cidr",
                "internal_gw",
                "director__internal_ip",
                "jumpbox__internal_ip",
                "external_ip",
            ] {
                assert!(
                    template.contains(&format!("output \"{output}\"")),
                    "{iaas} template lacks {output}"
                );
            }
        }
    }

    #[test]
    fn test_lb_fragment_is_appended() {
        let template = render(&state(Iaas::Gcp, LbType::Concourse)).unwrap();
        assert!(template.contains("google_compute_network"));
        assert!(template.contains("concourse_target_pool"));

        let template = render(&state(Iaas::Aws, LbType::Cf)).unwrap();
        assert!(template.contains("cf_router_lb"));
    }

    #[test]
    fn test_lbs_rejected_where_unsupported() {
        let err = render(&state(Iaas::Vsphere, LbType::Cf)).unwrap_err();
        assert_eq!(err.to_string(), "load balancers are not supported on vsphere");
    }

    #[test]
    fn test_no_iaas() {
        assert!(matches!(render(&State::default()), Err(Error::NoIaas)));
    }
}
