use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, CloudStackError, Params};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Cluster {
    name: String,
    clustertype: String,
    hypervisortype: String,
    podid: String,
    zoneid: String,
    allocationstate: String,
    arch: String,
}

/// `addCluster` answers with a one element `cluster` list.
fn added_cluster_id(response: &Value) -> std::result::Result<String, CloudStackError> {
    response
        .get("cluster")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CloudStackError::InvalidResponse {
            command: "addCluster".to_string(),
            message: "missing 'cluster[0].id' in response".to_string(),
        })
}

pub struct ClusterResource;

#[async_trait]
impl Resource for ClusterResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_cluster"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("cluster_type", Attribute::required_string().force_new())
            .attr("hypervisor", Attribute::required_string().force_new())
            .attr("pod_id", Attribute::required_string().force_new())
            .attr("zone_id", Attribute::required_string().force_new())
            .attr("allocation_state", Attribute::optional_string().computed())
            .attr("arch", Attribute::optional_string().computed().force_new())
            .attr("url", Attribute::optional_string().force_new())
            .attr("username", Attribute::optional_string().force_new())
            .attr("password", Attribute::optional_string().sensitive().force_new())
            .attr("guest_vswitch_name", Attribute::optional_string().force_new())
            .attr("guest_vswitch_type", Attribute::optional_string().force_new())
            .attr("public_vswitch_name", Attribute::optional_string().force_new())
            .attr("public_vswitch_type", Attribute::optional_string().force_new())
            .attr("ovm3_cluster", Attribute::optional_string().force_new())
            .attr("ovm3_pool", Attribute::optional_string().force_new())
            .attr("ovm3_vip", Attribute::optional_string().force_new())
            .attr("vsm_ip_address", Attribute::optional_string().force_new())
            .attr("vsm_username", Attribute::optional_string().force_new())
            .attr("vsm_password", Attribute::optional_string().sensitive().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("clustername", &name)
            .set("clustertype", d.get_str("cluster_type"))
            .set("hypervisor", d.get_str("hypervisor"))
            .set("podid", d.get_str("pod_id"))
            .set("zoneid", d.get_str("zone_id"))
            .set_nonempty("allocationstate", d.get_str("allocation_state"))
            .set_nonempty("arch", d.get_str("arch"))
            .set_nonempty("url", d.get_str("url"))
            .set_nonempty("username", d.get_str("username"))
            .set_nonempty("password", d.get_str("password"))
            .set_nonempty("guestvswitchname", d.get_str("guest_vswitch_name"))
            .set_nonempty("guestvswitchtype", d.get_str("guest_vswitch_type"))
            .set_nonempty("publicvswitchname", d.get_str("public_vswitch_name"))
            .set_nonempty("publicvswitchtype", d.get_str("public_vswitch_type"))
            .set_nonempty("ovm3cluster", d.get_str("ovm3_cluster"))
            .set_nonempty("ovm3pool", d.get_str("ovm3_pool"))
            .set_nonempty("ovm3vip", d.get_str("ovm3_vip"))
            .set_nonempty("vsmipaddress", d.get_str("vsm_ip_address"))
            .set_nonempty("vsmusername", d.get_str("vsm_username"))
            .set_nonempty("vsmpassword", d.get_str("vsm_password"));

        let response = client
            .execute("addCluster", &params)
            .await
            .context(|| format!("creating cluster {}", name))?;
        let id = added_cluster_id(&response).context(|| format!("creating cluster {}", name))?;

        tracing::info!(id = %id, name = %name, "cluster added");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let cluster: Option<Cluster> = client
            .get_by_id("listClusters", "cluster", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving cluster {}", d.id()))?;

        let Some(cluster) = cluster else {
            mark_gone(d, "cluster");
            return Ok(());
        };

        d.set("name", cluster.name);
        d.set("cluster_type", cluster.clustertype);
        d.set("hypervisor", cluster.hypervisortype);
        d.set("pod_id", cluster.podid);
        d.set("zone_id", cluster.zoneid);
        d.set("allocation_state", cluster.allocationstate);
        d.set("arch", cluster.arch);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") || d.has_change("allocation_state") {
            let mut params = Params::new();
            params
                .set("id", d.id())
                .set("clustername", d.get_str("name"))
                .set_nonempty("allocationstate", d.get_str("allocation_state"));
            client
                .execute("updateCluster", &params)
                .await
                .context(|| format!("updating cluster {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteCluster", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting cluster {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_added_cluster_id() {
        let response = json!({"count": 1, "cluster": [{"id": "c1", "name": "cl"}]});
        assert_eq!(added_cluster_id(&response).unwrap(), "c1");
        assert!(added_cluster_id(&json!({"cluster": []})).is_err());
    }
}
