use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Nic, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VirtualMachine {
    nic: Vec<Nic>,
}

/// `cloudstack_secondary_ipaddress`: an extra IP on an instance nic,
/// the default nic unless `nic_id` is given.
pub struct SecondaryIpAddressResource;

impl SecondaryIpAddressResource {
    async fn default_nic_id(&self, client: &CloudStackClient, vm_id: &str) -> Result<String> {
        let vm: Option<VirtualMachine> = client
            .get_by_id("listVirtualMachines", "virtualmachine", vm_id, &Params::new())
            .await
            .context(|| format!("retrieving instance {}", vm_id))?;
        let vm = vm.ok_or_else(|| ProviderError::not_found("instance", vm_id))?;
        vm.nic
            .iter()
            .find(|n| n.isdefault)
            .or(vm.nic.first())
            .map(|n| n.id.clone())
            .ok_or_else(|| ProviderError::not_found("nic of instance", vm_id))
    }
}

#[async_trait]
impl Resource for SecondaryIpAddressResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_secondary_ipaddress"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("ip_address", Attribute::optional_string().computed().force_new())
            .attr("nic_id", Attribute::optional_string().computed().force_new())
            .attr("virtual_machine_id", Attribute::required_string().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let vm_id = d.get_str("virtual_machine_id").to_string();
        let nic_id = match d.get_opt_str("nic_id") {
            Some(nic_id) => nic_id.to_string(),
            None => self.default_nic_id(client, &vm_id).await?,
        };

        let mut params = Params::from([("nicid", nic_id.as_str())]);
        params.set_nonempty("ipaddress", d.get_str("ip_address"));

        let result = client
            .execute_async("addIpToNic", &params)
            .await
            .context(|| format!("adding a secondary IP to nic {}", nic_id))?;
        let id = extract_id("addIpToNic", &result, "nicsecondaryip")
            .context(|| format!("adding a secondary IP to nic {}", nic_id))?;

        tracing::info!(id = %id, nic = %nic_id, "secondary IP added");
        d.set("nic_id", nic_id);
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("virtualmachineid", d.get_str("virtual_machine_id"))]);
        params.set_nonempty("nicid", d.get_str("nic_id"));

        let nics: Vec<Nic> = client
            .list("listNics", "nic", &params)
            .await
            .context(|| format!("retrieving nics for secondary IP {}", d.id()))?;

        let id = d.id().to_string();
        let found = nics.into_iter().find_map(|nic| {
            nic.secondaryip
                .into_iter()
                .find(|ip| ip.id == id)
                .map(|ip| (nic.id, ip.ipaddress))
        });

        let Some((nic_id, ip_address)) = found else {
            mark_gone(d, "secondary IP address");
            return Ok(());
        };

        d.set("nic_id", nic_id);
        d.set("ip_address", ip_address);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("removeIpFromNic", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("removing secondary IP {}", d.id()))
    }
}
