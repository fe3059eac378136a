//! Managed CloudStack resources, one module per resource type.

mod account;
mod affinity_group;
mod attach_volume;
mod autoscale_vm_group;
mod cluster;
mod configuration;
mod disk;
mod disk_offering;
mod domain;
mod egress_firewall;
mod firewall;
mod host;
mod instance;
mod ipaddress;
mod kubernetes_cluster;
mod limits;
mod loadbalancer_rule;
mod network;
mod network_acl;
mod network_acl_rule;
mod network_offering;
mod nic;
mod physical_network;
mod pod;
mod port_forward;
mod private_gateway;
mod project;
mod role;
pub(crate) mod rules;
mod secondary_ipaddress;
mod security_group;
mod security_group_rule;
mod service_offering;
mod snapshot_policy;
mod ssh_keypair;
mod static_nat;
mod static_route;
mod storage_pool;
mod template;
mod traffic_type;
mod user;
mod vpc;
mod vpn_connection;
mod vpn_customer_gateway;
mod vpn_gateway;
mod zone;

use crate::cloudstack::CloudStackError;
use crate::resource::{Resource, ResourceData};

/// Every resource type the provider manages.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(account::AccountResource),
        Box::new(affinity_group::AffinityGroupResource),
        Box::new(attach_volume::AttachVolumeResource),
        Box::new(autoscale_vm_group::AutoscaleVmGroupResource),
        Box::new(cluster::ClusterResource),
        Box::new(configuration::ConfigurationResource),
        Box::new(disk::DiskResource),
        Box::new(disk_offering::DiskOfferingResource),
        Box::new(domain::DomainResource),
        Box::new(egress_firewall::EgressFirewallResource),
        Box::new(firewall::FirewallResource),
        Box::new(host::HostResource),
        Box::new(instance::InstanceResource),
        Box::new(ipaddress::IpAddressResource),
        Box::new(kubernetes_cluster::KubernetesClusterResource),
        Box::new(limits::LimitsResource),
        Box::new(loadbalancer_rule::LoadBalancerRuleResource),
        Box::new(network::NetworkResource),
        Box::new(network_acl::NetworkAclResource),
        Box::new(network_acl_rule::NetworkAclRuleResource),
        Box::new(network_offering::NetworkOfferingResource),
        Box::new(nic::NicResource),
        Box::new(physical_network::PhysicalNetworkResource),
        Box::new(pod::PodResource),
        Box::new(port_forward::PortForwardResource),
        Box::new(private_gateway::PrivateGatewayResource),
        Box::new(project::ProjectResource),
        Box::new(role::RoleResource),
        Box::new(secondary_ipaddress::SecondaryIpAddressResource),
        Box::new(security_group::SecurityGroupResource),
        Box::new(security_group_rule::SecurityGroupRuleResource),
        Box::new(service_offering::ServiceOfferingResource),
        Box::new(snapshot_policy::SnapshotPolicyResource),
        Box::new(ssh_keypair::SshKeyPairResource),
        Box::new(static_nat::StaticNatResource),
        Box::new(static_route::StaticRouteResource),
        Box::new(storage_pool::StoragePoolResource),
        Box::new(template::TemplateResource),
        Box::new(traffic_type::TrafficTypeResource),
        Box::new(user::UserResource),
        Box::new(vpc::VpcResource),
        Box::new(vpn_connection::VpnConnectionResource),
        Box::new(vpn_customer_gateway::VpnCustomerGatewayResource),
        Box::new(vpn_gateway::VpnGatewayResource),
        Box::new(zone::ZoneResource),
    ]
}

/// Treats "entity does not exist" as success, for deletes that may race
/// with an object already removed outside of the provider.
pub(crate) fn ignore_not_found<T>(
    result: Result<T, CloudStackError>,
) -> Result<(), CloudStackError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            tracing::debug!(error = %e, "object already gone");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Clears the id of an object a read could not find.
pub(crate) fn mark_gone(d: &mut ResourceData, kind: &str) {
    tracing::warn!(kind, id = d.id(), "object no longer exists, removing it from state");
    d.clear_id();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_type_names_are_unique_and_prefixed() {
        let resources = all();
        let names: BTreeSet<&str> = resources.iter().map(|r| r.type_name()).collect();
        assert_eq!(names.len(), resources.len());
        assert!(names.iter().all(|n| n.starts_with("cloudstack_")));
        assert!(names.contains("cloudstack_instance"));
        assert!(names.contains("cloudstack_zone"));
    }

    #[test]
    fn test_every_schema_is_non_empty() {
        for resource in all() {
            assert!(
                !resource.schema().attributes.is_empty(),
                "{} has an empty schema",
                resource.type_name()
            );
        }
    }

    #[test]
    fn test_ignore_not_found() {
        let gone: Result<(), CloudStackError> = Err(CloudStackError::Api {
            code: 431,
            message: "entity does not exist".to_string(),
        });
        assert!(ignore_not_found(gone).is_ok());

        let other: Result<(), CloudStackError> = Err(CloudStackError::Api {
            code: 530,
            message: "internal error".to_string(),
        });
        assert!(ignore_not_found(other).is_err());
    }

    #[test]
    fn test_mark_gone_clears_id() {
        let mut d = ResourceData::from_state("id-1", serde_json::Map::new());
        mark_gone(&mut d, "network");
        assert!(d.is_gone());
    }
}
