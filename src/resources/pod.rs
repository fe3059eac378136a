use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pod {
    name: String,
    zoneid: String,
    gateway: String,
    netmask: String,
    startip: Vec<String>,
    endip: Vec<String>,
    allocationstate: String,
}

pub struct PodResource;

#[async_trait]
impl Resource for PodResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_pod"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("zone_id", Attribute::required_string().force_new())
            .attr("gateway", Attribute::required_string())
            .attr("netmask", Attribute::required_string())
            .attr("start_ip", Attribute::required_string())
            .attr("end_ip", Attribute::optional_string().computed())
            .attr("allocation_state", Attribute::optional_string().computed())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("zoneid", d.get_str("zone_id"))
            .set("gateway", d.get_str("gateway"))
            .set("netmask", d.get_str("netmask"))
            .set("startip", d.get_str("start_ip"))
            .set_nonempty("endip", d.get_str("end_ip"))
            .set_nonempty("allocationstate", d.get_str("allocation_state"));

        let response = client
            .execute("createPod", &params)
            .await
            .context(|| format!("creating pod {}", name))?;
        let id = extract_id("createPod", &response, "pod")
            .context(|| format!("creating pod {}", name))?;

        tracing::info!(id = %id, name = %name, "pod created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let pod: Option<Pod> = client
            .get_by_id("listPods", "pod", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving pod {}", d.id()))?;

        let Some(pod) = pod else {
            mark_gone(d, "pod");
            return Ok(());
        };

        d.set("name", pod.name);
        d.set("zone_id", pod.zoneid);
        d.set("gateway", pod.gateway);
        d.set("netmask", pod.netmask);
        if let Some(start) = pod.startip.into_iter().next() {
            d.set("start_ip", start);
        }
        if let Some(end) = pod.endip.into_iter().next() {
            d.set("end_ip", end);
        }
        d.set("allocation_state", pod.allocationstate);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let changed = ["name", "gateway", "netmask", "start_ip", "end_ip", "allocation_state"];
        if changed.iter().any(|k| d.has_change(k)) {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set("gateway", d.get_str("gateway"))
                .set("netmask", d.get_str("netmask"))
                .set("startip", d.get_str("start_ip"))
                .set_nonempty("endip", d.get_str("end_ip"))
                .set_nonempty("allocationstate", d.get_str("allocation_state"));
            client
                .execute("updatePod", &params)
                .await
                .context(|| format!("updating pod {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deletePod", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting pod {}", d.id()))
    }
}
