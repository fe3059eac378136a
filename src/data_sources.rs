//! Read-only data sources. Each one lists a CloudStack object type, narrows
//! the result with `filter` blocks and copies the selected object into its
//! computed attributes.

mod list;

pub use list::{Argument, Field, FieldType, ListDataSource};

use list::{boolean, int, string};

use crate::resource::DataSource;

const ACCOUNT: ListDataSource = ListDataSource {
    type_name: "cloudstack_account",
    kind: "account",
    command: "listAccounts",
    key: "account",
    list_all: true,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        int("account_type", "accounttype"),
        string("role_id", "roleid"),
        string("role_name", "rolename"),
        string("domain_id", "domainid"),
        string("domain", "domain"),
        string("state", "state"),
    ],
};

const CLUSTER: ListDataSource = ListDataSource {
    type_name: "cloudstack_cluster",
    kind: "cluster",
    command: "listClusters",
    key: "cluster",
    list_all: false,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("cluster_type", "clustertype"),
        string("hypervisor", "hypervisortype"),
        string("pod_id", "podid"),
        string("pod_name", "podname"),
        string("zone_id", "zoneid"),
        string("zone_name", "zonename"),
        string("allocation_state", "allocationstate"),
        string("managed_state", "managedstate"),
        string("arch", "arch"),
    ],
};

const DISK_OFFERING: ListDataSource = ListDataSource {
    type_name: "cloudstack_disk_offering",
    kind: "disk offering",
    command: "listDiskOfferings",
    key: "diskoffering",
    list_all: false,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("display_text", "displaytext"),
        int("disk_size", "disksize"),
        boolean("customized", "iscustomized"),
        string("storage_type", "storagetype"),
        string("provisioning_type", "provisioningtype"),
    ],
};

const DOMAIN: ListDataSource = ListDataSource {
    type_name: "cloudstack_domain",
    kind: "domain",
    command: "listDomains",
    key: "domain",
    list_all: true,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("domain_id", "id"),
        string("network_domain", "networkdomain"),
        string("parent_domain_id", "parentdomainid"),
        string("path", "path"),
        int("level", "level"),
    ],
};

const INSTANCE: ListDataSource = ListDataSource {
    type_name: "cloudstack_instance",
    kind: "instance",
    command: "listVirtualMachines",
    key: "virtualmachine",
    list_all: true,
    project: true,
    tags: true,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("display_name", "displayname"),
        string("state", "state"),
        string("host_id", "hostid"),
        string("zone_id", "zoneid"),
        string("template_id", "templateid"),
        string("service_offering", "serviceofferingname"),
        string("ip_address", "/nic/0/ipaddress"),
        string("network_id", "/nic/0/networkid"),
    ],
};

const IPADDRESS: ListDataSource = ListDataSource {
    type_name: "cloudstack_ipaddress",
    kind: "IP address",
    command: "listPublicIpAddresses",
    key: "publicipaddress",
    list_all: true,
    project: true,
    tags: true,
    arguments: &[],
    fields: &[
        string("ip_address", "ipaddress"),
        boolean("is_source_nat", "issourcenat"),
        boolean("is_portable", "isportable"),
        string("network_id", "associatednetworkid"),
        string("vpc_id", "vpcid"),
        string("zone_name", "zonename"),
        string("state", "state"),
    ],
};

const NETWORK_OFFERING: ListDataSource = ListDataSource {
    type_name: "cloudstack_network_offering",
    kind: "network offering",
    command: "listNetworkOfferings",
    key: "networkoffering",
    list_all: false,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("display_text", "displaytext"),
        string("guest_ip_type", "guestiptype"),
        string("traffic_type", "traffictype"),
        int("network_rate", "networkrate"),
        boolean("for_vpc", "forvpc"),
        string("state", "state"),
    ],
};

const POD: ListDataSource = ListDataSource {
    type_name: "cloudstack_pod",
    kind: "pod",
    command: "listPods",
    key: "pod",
    list_all: false,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("zone_id", "zoneid"),
        string("zone_name", "zonename"),
        string("gateway", "gateway"),
        string("netmask", "netmask"),
        string("allocation_state", "allocationstate"),
    ],
};

const PROJECT: ListDataSource = ListDataSource {
    type_name: "cloudstack_project",
    kind: "project",
    command: "listProjects",
    key: "project",
    list_all: true,
    project: false,
    tags: true,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("display_text", "displaytext"),
        string("domain", "domain"),
        string("account", "account"),
        string("state", "state"),
    ],
};

const ROLE: ListDataSource = ListDataSource {
    type_name: "cloudstack_role",
    kind: "role",
    command: "listRoles",
    key: "role",
    list_all: false,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("type", "type"),
        string("description", "description"),
        boolean("is_public", "ispublic"),
    ],
};

const SERVICE_OFFERING: ListDataSource = ListDataSource {
    type_name: "cloudstack_service_offering",
    kind: "service offering",
    command: "listServiceOfferings",
    key: "serviceoffering",
    list_all: false,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("display_text", "displaytext"),
        int("cpu_number", "cpunumber"),
        int("cpu_speed", "cpuspeed"),
        int("memory", "memory"),
        string("storage_type", "storagetype"),
        boolean("customized", "iscustomized"),
    ],
};

const SSH_KEYPAIR: ListDataSource = ListDataSource {
    type_name: "cloudstack_ssh_keypair",
    kind: "SSH key pair",
    command: "listSSHKeyPairs",
    key: "sshkeypair",
    list_all: true,
    project: true,
    tags: false,
    arguments: &[],
    fields: &[string("name", "name"), string("fingerprint", "fingerprint")],
};

const TEMPLATE: ListDataSource = ListDataSource {
    type_name: "cloudstack_template",
    kind: "template",
    command: "listTemplates",
    key: "template",
    list_all: false,
    project: true,
    tags: true,
    arguments: &[Argument {
        attr: "template_filter",
        param: "templatefilter",
        required: true,
    }],
    fields: &[
        string("name", "name"),
        string("display_text", "displaytext"),
        string("format", "format"),
        string("hypervisor", "hypervisor"),
        string("os_type_id", "ostypeid"),
        string("zone_id", "zoneid"),
        boolean("is_ready", "isready"),
        int("size", "size"),
        string("created", "created"),
    ],
};

const USER: ListDataSource = ListDataSource {
    type_name: "cloudstack_user",
    kind: "user",
    command: "listUsers",
    key: "user",
    list_all: true,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("username", "username"),
        string("account", "account"),
        string("email", "email"),
        string("first_name", "firstname"),
        string("last_name", "lastname"),
        string("role_type", "roletype"),
        string("state", "state"),
    ],
};

const VOLUME: ListDataSource = ListDataSource {
    type_name: "cloudstack_volume",
    kind: "volume",
    command: "listVolumes",
    key: "volume",
    list_all: true,
    project: true,
    tags: true,
    arguments: &[],
    fields: &[
        string("name", "name"),
        int("size", "size"),
        string("type", "type"),
        string("state", "state"),
        string("disk_offering_id", "diskofferingid"),
        string("zone_id", "zoneid"),
        string("virtual_machine_id", "virtualmachineid"),
    ],
};

const VPC: ListDataSource = ListDataSource {
    type_name: "cloudstack_vpc",
    kind: "VPC",
    command: "listVPCs",
    key: "vpc",
    list_all: true,
    project: true,
    tags: true,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("display_text", "displaytext"),
        string("cidr", "cidr"),
        string("vpc_offering_name", "vpcofferingname"),
        string("network_domain", "networkdomain"),
        string("zone_name", "zonename"),
        string("state", "state"),
    ],
};

const ZONE: ListDataSource = ListDataSource {
    type_name: "cloudstack_zone",
    kind: "zone",
    command: "listZones",
    key: "zone",
    list_all: false,
    project: false,
    tags: false,
    arguments: &[],
    fields: &[
        string("name", "name"),
        string("network_type", "networktype"),
        string("dns1", "dns1"),
        string("internal_dns1", "internaldns1"),
        string("allocation_state", "allocationstate"),
        boolean("local_storage_enabled", "localstorageenabled"),
    ],
};

const CATALOG: [ListDataSource; 17] = [
    ACCOUNT,
    CLUSTER,
    DISK_OFFERING,
    DOMAIN,
    INSTANCE,
    IPADDRESS,
    NETWORK_OFFERING,
    POD,
    PROJECT,
    ROLE,
    SERVICE_OFFERING,
    SSH_KEYPAIR,
    TEMPLATE,
    USER,
    VOLUME,
    VPC,
    ZONE,
];

/// Every data source the provider offers.
pub fn all() -> Vec<Box<dyn DataSource>> {
    CATALOG
        .into_iter()
        .map(|ds| Box::new(ds) as Box<dyn DataSource>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: BTreeSet<&str> = CATALOG.iter().map(|ds| ds.type_name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_every_data_source_requires_filters() {
        for ds in all() {
            let schema = ds.schema();
            let filter = schema.get("filter").expect("filter attribute");
            assert!(filter.required, "{} must require filter", ds.type_name());
        }
    }

    #[test]
    fn test_template_requires_template_filter() {
        let schema = TEMPLATE.schema();
        assert!(schema.get("template_filter").is_some_and(|a| a.required));
        assert!(ZONE.schema().get("template_filter").is_none());
    }

    #[test]
    fn test_field_names_do_not_shadow_arguments() {
        for ds in CATALOG {
            for field in ds.fields {
                assert_ne!(field.attr, "filter", "{}", ds.type_name);
                assert_ne!(field.attr, "project", "{}", ds.type_name);
            }
        }
    }
}
