use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceOffering {
    name: String,
    displaytext: String,
    cpunumber: i64,
    cpuspeed: i64,
    memory: i64,
    hosttags: String,
    storagetype: String,
    limitcpuuse: bool,
    offerha: bool,
    iscustomized: bool,
}

/// Fixed offerings set cpu number, cpu speed and memory together; customized
/// offerings set none of them.
fn check_sizing(d: &ResourceData) -> Result<bool> {
    let set = ["cpu_number", "cpu_speed", "memory"]
        .iter()
        .filter(|k| d.get_opt_int(k).is_some())
        .count();
    match set {
        0 => Ok(true),
        3 => Ok(false),
        _ => Err(ProviderError::validation(
            "cloudstack_service_offering",
            "cpu_number, cpu_speed and memory must be set together",
        )),
    }
}

pub struct ServiceOfferingResource;

#[async_trait]
impl Resource for ServiceOfferingResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_service_offering"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("display_text", Attribute::required_string())
            .attr("cpu_number", Attribute::optional_int().computed().force_new())
            .attr("cpu_speed", Attribute::optional_int().computed().force_new())
            .attr("memory", Attribute::optional_int().computed().force_new())
            .attr("host_tags", Attribute::optional_string().computed())
            .attr("storage_type", Attribute::optional_string().default("shared").force_new())
            .attr("limit_cpu_use", Attribute::optional_bool().default(false).force_new())
            .attr("offer_ha", Attribute::optional_bool().default(false).force_new())
            .attr("customized", Attribute::computed_bool())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let customized = check_sizing(d)?;

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("displaytext", d.get_str("display_text"))
            .set("storagetype", d.get_str("storage_type"))
            .set("limitcpuuse", d.get_bool("limit_cpu_use"))
            .set("offerha", d.get_bool("offer_ha"))
            .set_nonempty("hosttags", d.get_str("host_tags"));
        if customized {
            params.set("customized", true);
        } else {
            params
                .set("cpunumber", d.get_int("cpu_number"))
                .set("cpuspeed", d.get_int("cpu_speed"))
                .set("memory", d.get_int("memory"));
        }

        let response = client
            .execute("createServiceOffering", &params)
            .await
            .context(|| format!("creating service offering {}", name))?;
        let id = extract_id("createServiceOffering", &response, "serviceoffering")
            .context(|| format!("creating service offering {}", name))?;

        tracing::info!(id = %id, name = %name, "service offering created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let offering: Option<ServiceOffering> = client
            .get_by_id("listServiceOfferings", "serviceoffering", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving service offering {}", d.id()))?;

        let Some(offering) = offering else {
            mark_gone(d, "service offering");
            return Ok(());
        };

        d.set("name", offering.name);
        d.set("display_text", offering.displaytext);
        d.set("cpu_number", offering.cpunumber);
        d.set("cpu_speed", offering.cpuspeed);
        d.set("memory", offering.memory);
        d.set("host_tags", offering.hosttags);
        d.set("storage_type", offering.storagetype);
        d.set("limit_cpu_use", offering.limitcpuuse);
        d.set("offer_ha", offering.offerha);
        d.set("customized", offering.iscustomized);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let changed = ["name", "display_text", "host_tags"];
        if changed.iter().any(|k| d.has_change(k)) {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set("displaytext", d.get_str("display_text"))
                .set_nonempty("hosttags", d.get_str("host_tags"));
            client
                .execute("updateServiceOffering", &params)
                .await
                .context(|| format!("updating service offering {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteServiceOffering", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting service offering {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: serde_json::Value) -> ResourceData {
        ResourceData::new(value.as_object().unwrap().clone())
    }

    #[test]
    fn test_check_sizing() {
        assert!(check_sizing(&data(json!({"name": "custom"}))).unwrap());
        assert!(
            !check_sizing(&data(json!({"cpu_number": 2, "cpu_speed": 1000, "memory": 2048})))
                .unwrap()
        );
        assert!(check_sizing(&data(json!({"cpu_number": 2}))).is_err());
    }
}
