//! `cloudstack_instance`: virtual machines.
//!
//! Changes to the service offering, keypair, name, user data, details or
//! affinity groups need a stopped machine: the instance is stopped, the
//! changes applied, and the instance started again when `start_vm` holds.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Nic, Params, Tag, extract_id, tags_to_map};
use crate::error::{Context, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::tags;
use crate::userdata;

/// Attributes whose change needs the instance stopped.
const STOPPED_CHANGES: [&str; 7] = [
    "name",
    "service_offering",
    "keypair",
    "user_data",
    "details",
    "affinity_group_ids",
    "affinity_group_names",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedRef {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VirtualMachine {
    name: String,
    displayname: String,
    serviceofferingid: String,
    serviceofferingname: String,
    templateid: String,
    templatename: String,
    zoneid: String,
    zonename: String,
    group: String,
    keypair: String,
    userdata: String,
    hostid: String,
    state: String,
    project: String,
    projectid: String,
    nic: Vec<Nic>,
    affinitygroup: Vec<NamedRef>,
    securitygroup: Vec<NamedRef>,
    tags: Vec<Tag>,
    details: BTreeMap<String, Value>,
}

/// Whether an update sends anything that needs the instance stopped. A
/// removed keypair cannot be reset, so it does not count.
fn needs_stop(d: &ResourceData) -> bool {
    STOPPED_CHANGES
        .iter()
        .filter(|k| **k != "keypair" || d.get_opt_str("keypair").is_some())
        .any(|k| d.has_change(k))
}

/// Writes affinity or security group memberships back in whichever form,
/// ids or names, the configuration uses.
fn set_group_refs(d: &mut ResourceData, prefix: &str, groups: &[NamedRef]) {
    let names_key = format!("{}_names", prefix);
    let ids_key = format!("{}_ids", prefix);
    if !d.get_string_list(&names_key).is_empty() {
        let names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
        d.set(&names_key, names);
    } else if !d.get_string_list(&ids_key).is_empty() {
        let ids: Vec<String> = groups.iter().map(|g| g.id.clone()).collect();
        d.set(&ids_key, ids);
    }
}

pub struct InstanceResource;

impl InstanceResource {
    async fn stop(&self, client: &CloudStackClient, id: &str) -> Result<()> {
        client
            .execute_async("stopVirtualMachine", &Params::from([("id", id)]))
            .await
            .context(|| format!("stopping instance {}", id))?;
        Ok(())
    }

    async fn start(&self, client: &CloudStackClient, id: &str) -> Result<()> {
        client
            .execute_async("startVirtualMachine", &Params::from([("id", id)]))
            .await
            .context(|| format!("starting instance {}", id))?;
        Ok(())
    }

    async fn apply_stopped_changes(&self, client: &CloudStackClient, d: &ResourceData) -> Result<()> {
        let id = d.id();

        if d.has_change("name") || d.has_change("user_data") || d.has_change("details") {
            let mut params = Params::from([("id", id)]);
            if d.has_change("name") {
                params.set("name", d.get_str("name"));
            }
            if d.has_change("user_data") {
                params.set(
                    "userdata",
                    userdata::encode(d.get_str("user_data"), client.http_get_only())?,
                );
            }
            if d.has_change("details") {
                params.set_details("details", &d.get_string_map("details"));
            }
            client
                .execute("updateVirtualMachine", &params)
                .await
                .context(|| format!("updating instance {}", id))?;
        }

        if d.has_change("service_offering") {
            let offering_id =
                resolve::retrieve_id(client, Kind::ServiceOffering, d.get_str("service_offering"))
                    .await?;
            let mut params = Params::from([("id", id)]);
            params.set("serviceofferingid", offering_id);
            client
                .execute("changeServiceForVirtualMachine", &params)
                .await
                .context(|| format!("changing the service offering of instance {}", id))?;
        }

        if d.has_change("keypair") {
            if let Some(keypair) = d.get_opt_str("keypair") {
                let mut params = Params::from([("id", id)]);
                params.set("keypair", keypair);
                resolve::set_project_id(client, d, &mut params).await?;
                client
                    .execute_async("resetSSHKeyForVirtualMachine", &params)
                    .await
                    .context(|| format!("resetting the SSH key of instance {}", id))?;
            }
        }

        if d.has_change("affinity_group_ids") || d.has_change("affinity_group_names") {
            let mut params = Params::from([("id", id)]);
            let ids = d.get_string_list("affinity_group_ids");
            let names = d.get_string_list("affinity_group_names");
            if !ids.is_empty() {
                params.set_list("affinitygroupids", &ids);
            } else if !names.is_empty() {
                params.set_list("affinitygroupnames", &names);
            } else {
                params.set("affinitygroupids", "");
            }
            client
                .execute_async("updateVMAffinityGroup", &params)
                .await
                .context(|| format!("updating the affinity groups of instance {}", id))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Resource for InstanceResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_instance"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::optional_string().computed())
            .attr("display_name", Attribute::optional_string().computed())
            .attr("service_offering", Attribute::required_string())
            .attr("network_id", Attribute::optional_string().computed().force_new())
            .attr("ip_address", Attribute::optional_string().computed().force_new())
            .attr("template", Attribute::required_string().force_new())
            .attr("root_disk_size", Attribute::optional_int().computed().force_new())
            .attr("group", Attribute::optional_string().computed())
            .attr(
                "affinity_group_ids",
                Attribute::optional_string_set().conflicts_with(&["affinity_group_names"]),
            )
            .attr(
                "affinity_group_names",
                Attribute::optional_string_set().conflicts_with(&["affinity_group_ids"]),
            )
            .attr(
                "security_group_ids",
                Attribute::optional_string_set()
                    .force_new()
                    .conflicts_with(&["security_group_names"]),
            )
            .attr(
                "security_group_names",
                Attribute::optional_string_set()
                    .force_new()
                    .conflicts_with(&["security_group_ids"]),
            )
            .attr("zone", Attribute::required_string().force_new())
            .attr("keypair", Attribute::optional_string())
            .attr("host_id", Attribute::optional_string().force_new())
            .attr("cluster_id", Attribute::optional_string().force_new())
            .attr("pod_id", Attribute::optional_string().force_new())
            .attr("user_data", Attribute::optional_string())
            .attr("details", Attribute::optional_map().computed())
            .attr("boot_mode", Attribute::optional_string().force_new())
            .attr("uefi", Attribute::optional_bool().default(false).force_new())
            .attr("start_vm", Attribute::optional_bool().default(true))
            .attr("expunge", Attribute::optional_bool().default(false))
            .attr("state", Attribute::computed_string())
            .with_project()
            .with_tags()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let zone_id = resolve::retrieve_id(client, Kind::Zone, d.get_str("zone")).await?;
        let offering_id =
            resolve::retrieve_id(client, Kind::ServiceOffering, d.get_str("service_offering"))
                .await?;
        let template_id = resolve::retrieve_template_id(client, &zone_id, d.get_str("template")).await?;

        let mut params = Params::new();
        params
            .set("zoneid", &zone_id)
            .set("serviceofferingid", offering_id)
            .set("templateid", template_id)
            .set("startvm", d.get_bool("start_vm"))
            .set_nonempty("name", d.get_str("name"))
            .set_nonempty("displayname", d.get_opt_str("display_name").unwrap_or(d.get_str("name")))
            .set_nonempty("networkids", d.get_str("network_id"))
            .set_nonempty("ipaddress", d.get_str("ip_address"))
            .set_opt("rootdisksize", d.get_opt_int("root_disk_size"))
            .set_nonempty("group", d.get_str("group"))
            .set_list("affinitygroupids", &d.get_string_list("affinity_group_ids"))
            .set_list("affinitygroupnames", &d.get_string_list("affinity_group_names"))
            .set_list("securitygroupids", &d.get_string_list("security_group_ids"))
            .set_list("securitygroupnames", &d.get_string_list("security_group_names"))
            .set_nonempty("keypair", d.get_str("keypair"))
            .set_nonempty("hostid", d.get_str("host_id"))
            .set_nonempty("clusterid", d.get_str("cluster_id"))
            .set_nonempty("podid", d.get_str("pod_id"))
            .set_details("details", &d.get_string_map("details"));

        if d.get_bool("uefi") {
            params
                .set("boottype", "UEFI")
                .set("bootmode", d.get_opt_str("boot_mode").unwrap_or("Legacy"));
        }
        if let Some(user_data) = d.get_opt_str("user_data") {
            params.set("userdata", userdata::encode(user_data, client.http_get_only())?);
        }
        resolve::set_project_id(client, d, &mut params).await?;

        let result = client
            .execute_async("deployVirtualMachine", &params)
            .await
            .context(|| format!("creating instance {}", d.get_str("name")))?;
        let id = extract_id("deployVirtualMachine", &result, "virtualmachine")
            .context(|| format!("creating instance {}", d.get_str("name")))?;
        d.set_id(id);

        tags::set_tags(client, d, "UserVm").await?;

        tracing::info!(id = d.id(), "instance created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        if d.get_opt_str("user_data").is_some() {
            params.set("userdata", true);
        }
        resolve::set_project_id(client, d, &mut params).await?;

        let vm: Option<VirtualMachine> = client
            .get_by_id("listVirtualMachines", "virtualmachine", d.id(), &params)
            .await
            .context(|| format!("retrieving instance {}", d.id()))?;

        let Some(vm) = vm else {
            mark_gone(d, "instance");
            return Ok(());
        };

        d.set("name", vm.name);
        d.set("display_name", vm.displayname);
        d.set("group", vm.group);
        d.set("state", vm.state);
        if !vm.keypair.is_empty() {
            d.set("keypair", vm.keypair);
        }
        if let Some(configured) = d.get_opt_str("user_data") {
            if !vm.userdata.is_empty() {
                let user_data = userdata::decode_for_state(configured, &vm.userdata);
                d.set("user_data", user_data);
            }
        }
        if !vm.hostid.is_empty() && d.get_opt_str("host_id").is_some() {
            d.set("host_id", vm.hostid);
        }

        if let Some(nic) = vm.nic.iter().find(|n| n.isdefault).or(vm.nic.first()) {
            d.set("network_id", nic.networkid.clone());
            d.set("ip_address", nic.ipaddress.clone());
        }

        set_group_refs(d, "affinity_group", &vm.affinitygroup);
        set_group_refs(d, "security_group", &vm.securitygroup);

        resolve::set_value_or_id(d, "service_offering", &vm.serviceofferingname, &vm.serviceofferingid);
        resolve::set_value_or_id(d, "template", &vm.templatename, &vm.templateid);
        resolve::set_value_or_id(d, "zone", &vm.zonename, &vm.zoneid);
        resolve::set_project(d, &vm.project, &vm.projectid);
        d.set_string_map("tags", &tags_to_map(&vm.tags));
        if !d.get_string_map("details").is_empty() {
            let details: BTreeMap<String, String> = vm
                .details
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => (k.clone(), s.clone()),
                    other => (k.clone(), other.to_string()),
                })
                .collect();
            d.set_string_map("details", &details);
        }
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();

        if d.has_change("display_name") || d.has_change("group") {
            let mut params = Params::from([("id", id.as_str())]);
            params
                .set_nonempty("displayname", d.get_str("display_name"))
                .set_nonempty("group", d.get_str("group"));
            client
                .execute("updateVirtualMachine", &params)
                .await
                .context(|| format!("updating instance {}", id))?;
        }

        if needs_stop(d) {
            tracing::info!(id = %id, "stopping instance to apply changes");
            self.stop(client, &id).await?;
            self.apply_stopped_changes(client, d).await?;
            if d.get_bool("start_vm") {
                self.start(client, &id).await?;
            }
        }

        tags::set_tags(client, d, "UserVm").await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("id", d.id())]);
        if d.get_bool("expunge") {
            params.set("expunge", true);
        }
        ignore_not_found(client.execute_async("destroyVirtualMachine", &params).await)
            .context(|| format!("destroying instance {}", d.id()))?;
        tracing::info!(id = d.id(), "instance destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_changes_are_schema_attributes() {
        let schema = InstanceResource.schema();
        for key in STOPPED_CHANGES {
            assert!(schema.get(key).is_some(), "{} missing from schema", key);
        }
    }

    #[test]
    fn test_removed_keypair_does_not_stop_instance() {
        let prior = serde_json::json!({"name": "web", "keypair": "deploy"});
        let removed = serde_json::json!({"name": "web"});
        let d = ResourceData::for_update(
            "vm-1",
            prior.as_object().cloned().unwrap(),
            removed.as_object().cloned().unwrap(),
        );
        assert!(d.has_change("keypair"));
        assert!(!needs_stop(&d));

        let changed = serde_json::json!({"name": "web", "keypair": "ops"});
        let d = ResourceData::for_update(
            "vm-1",
            prior.as_object().cloned().unwrap(),
            changed.as_object().cloned().unwrap(),
        );
        assert!(needs_stop(&d));
    }

    #[test]
    fn test_affinity_groups_conflict() {
        let schema = InstanceResource.schema();
        let config = serde_json::json!({
            "service_offering": "small",
            "template": "ubuntu",
            "zone": "zone-1",
            "affinity_group_ids": ["a"],
            "affinity_group_names": ["b"]
        });
        let errors = schema.validate(config.as_object().unwrap()).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
