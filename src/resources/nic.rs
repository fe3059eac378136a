use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, CloudStackError, Nic, Params, extract};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VirtualMachine {
    nic: Vec<Nic>,
}

/// Picks the nic a create call added: the one on `network_id`, narrowed to
/// `ip_address` when one was requested.
fn added_nic<'a>(nics: &'a [Nic], network_id: &str, ip_address: Option<&str>) -> Option<&'a Nic> {
    nics.iter().find(|n| {
        n.networkid == network_id && ip_address.is_none_or(|ip| n.ipaddress == ip)
    })
}

/// `cloudstack_nic`: an additional nic on an existing instance.
pub struct NicResource;

impl NicResource {
    async fn nics(&self, client: &CloudStackClient, vm_id: &str) -> Result<Option<Vec<Nic>>> {
        let vm: Option<VirtualMachine> = client
            .get_by_id("listVirtualMachines", "virtualmachine", vm_id, &Params::new())
            .await
            .context(|| format!("retrieving nics of instance {}", vm_id))?;
        Ok(vm.map(|vm| vm.nic))
    }
}

#[async_trait]
impl Resource for NicResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_nic"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("network_id", Attribute::required_string().force_new())
            .attr("ip_address", Attribute::optional_string().computed().force_new())
            .attr("virtual_machine_id", Attribute::required_string().force_new())
            .attr("mac_address", Attribute::computed_string())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let vm_id = d.get_str("virtual_machine_id").to_string();
        let network_id = d.get_str("network_id").to_string();
        let ip_address = d.get_opt_str("ip_address").map(str::to_string);

        let mut params = Params::from([("virtualmachineid", vm_id.as_str())]);
        params
            .set("networkid", &network_id)
            .set_opt("ipaddress", ip_address.as_deref());

        let result = client
            .execute_async("addNicToVirtualMachine", &params)
            .await
            .context(|| format!("adding a nic to instance {}", vm_id))?;
        let vm: VirtualMachine = extract("addNicToVirtualMachine", &result, "virtualmachine")
            .context(|| format!("adding a nic to instance {}", vm_id))?;

        let nic = added_nic(&vm.nic, &network_id, ip_address.as_deref()).ok_or_else(|| {
            CloudStackError::InvalidResponse {
                command: "addNicToVirtualMachine".to_string(),
                message: format!("no nic on network {} in response", network_id),
            }
        });
        let nic = nic.context(|| format!("adding a nic to instance {}", vm_id))?;

        tracing::info!(id = %nic.id, vm = %vm_id, "nic added");
        d.set_id(nic.id.clone());
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let vm_id = d.get_str("virtual_machine_id").to_string();
        let id = d.id().to_string();
        let nic = self
            .nics(client, &vm_id)
            .await?
            .unwrap_or_default()
            .into_iter()
            .find(|n| n.id == id);

        let Some(nic) = nic else {
            mark_gone(d, "nic");
            return Ok(());
        };

        d.set("network_id", nic.networkid);
        d.set("ip_address", nic.ipaddress);
        d.set("mac_address", nic.macaddress);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("nicid", d.id())]);
        params.set("virtualmachineid", d.get_str("virtual_machine_id"));
        ignore_not_found(
            client
                .execute_async("removeNicFromVirtualMachine", &params)
                .await,
        )
        .context(|| format!("removing nic {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nic(id: &str, network: &str, ip: &str) -> Nic {
        Nic {
            id: id.into(),
            networkid: network.into(),
            ipaddress: ip.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_added_nic_matches_network_and_ip() {
        let nics = vec![
            nic("a", "net-1", "10.0.0.5"),
            nic("b", "net-2", "10.1.0.5"),
            nic("c", "net-2", "10.1.0.9"),
        ];
        assert_eq!(added_nic(&nics, "net-2", None).unwrap().id, "b");
        assert_eq!(added_nic(&nics, "net-2", Some("10.1.0.9")).unwrap().id, "c");
        assert!(added_nic(&nics, "net-3", None).is_none());
    }
}
