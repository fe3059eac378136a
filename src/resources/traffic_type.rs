use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

/// Schema key to API parameter for the per-hypervisor labels.
const LABELS: [(&str, &str); 4] = [
    ("kvm_network_label", "kvmnetworklabel"),
    ("vmware_network_label", "vmwarenetworklabel"),
    ("xen_network_label", "xennetworklabel"),
    ("hyperv_network_label", "hypervnetworklabel"),
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrafficType {
    id: String,
    traffictype: String,
    kvmnetworklabel: String,
    vmwarenetworklabel: String,
    xennetworklabel: String,
    hypervnetworklabel: String,
}

impl TrafficType {
    fn label(&self, param: &str) -> &str {
        match param {
            "kvmnetworklabel" => &self.kvmnetworklabel,
            "vmwarenetworklabel" => &self.vmwarenetworklabel,
            "xennetworklabel" => &self.xennetworklabel,
            "hypervnetworklabel" => &self.hypervnetworklabel,
            _ => "",
        }
    }
}

pub struct TrafficTypeResource;

#[async_trait]
impl Resource for TrafficTypeResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_traffic_type"
    }

    fn schema(&self) -> Schema {
        LABELS.into_iter().fold(
            Schema::new()
                .attr("physical_network_id", Attribute::required_string().force_new())
                .attr("type", Attribute::required_string().force_new()),
            |schema, (key, _)| schema.attr(key, Attribute::optional_string().computed().force_new()),
        )
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let traffic_type = d.get_str("type").to_string();

        let mut params = Params::from([("physicalnetworkid", d.get_str("physical_network_id"))]);
        params.set("traffictype", &traffic_type);
        for (key, param) in LABELS {
            params.set_nonempty(param, d.get_str(key));
        }

        let result = client
            .execute_async("addTrafficType", &params)
            .await
            .context(|| format!("adding {} traffic type", traffic_type))?;
        let id = extract_id("addTrafficType", &result, "traffictype")
            .context(|| format!("adding {} traffic type", traffic_type))?;

        tracing::info!(id = %id, traffic_type = %traffic_type, "traffic type added");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let params = Params::from([("physicalnetworkid", d.get_str("physical_network_id"))]);
        let types: Vec<TrafficType> = client
            .list("listTrafficTypes", "traffictype", &params)
            .await
            .context(|| format!("retrieving traffic type {}", d.id()))?;

        let id = d.id().to_string();
        let Some(found) = types.into_iter().find(|t| t.id == id) else {
            mark_gone(d, "traffic type");
            return Ok(());
        };

        d.set("type", found.traffictype.clone());
        for (key, param) in LABELS {
            d.set(key, found.label(param));
        }
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteTrafficType", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting traffic type {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_every_label() {
        let schema = TrafficTypeResource.schema();
        for (key, _) in LABELS {
            assert!(schema.get(key).is_some(), "missing {}", key);
        }
    }
}
