use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, CloudStackError, Params};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::wait::{self, Poller};

const ADD_ATTEMPTS: u32 = 3;
const ADD_RETRY_DELAY: Duration = Duration::from_secs(10);
const MAINTENANCE_POLL_INTERVAL: Duration = Duration::from_secs(15);
const MAINTENANCE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Host {
    name: String,
    hypervisor: String,
    podid: String,
    zoneid: String,
    clusterid: String,
    clustername: String,
    hosttags: String,
    state: String,
    resourcestate: String,
}

fn added_host_id(response: &Value) -> std::result::Result<String, CloudStackError> {
    response
        .get("host")
        .and_then(|h| h.get(0))
        .and_then(|h| h.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CloudStackError::InvalidResponse {
            command: "addHost".to_string(),
            message: "missing 'host[0].id' in response".to_string(),
        })
}

/// `cloudstack_host`: a hypervisor host added to a cluster.
pub struct HostResource;

impl HostResource {
    async fn fetch(&self, client: &CloudStackClient, id: &str) -> Result<Option<Host>> {
        client
            .get_by_id("listHosts", "host", id, &Params::new())
            .await
            .context(|| format!("retrieving host {}", id))
    }
}

#[async_trait]
impl Resource for HostResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_host"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("hypervisor", Attribute::required_string().force_new())
            .attr("pod_id", Attribute::required_string().force_new())
            .attr("url", Attribute::required_string().force_new())
            .attr("zone_id", Attribute::required_string().force_new())
            .attr("username", Attribute::optional_string().force_new())
            .attr("password", Attribute::optional_string().sensitive().force_new())
            .attr("cluster_id", Attribute::optional_string().computed().force_new())
            .attr("cluster_name", Attribute::optional_string().computed().force_new())
            .attr("host_tags", Attribute::optional_string_set())
            .attr("allocation_state", Attribute::optional_string().computed())
            .attr("name", Attribute::computed_string())
            .attr("state", Attribute::computed_string())
            .attr("resource_state", Attribute::computed_string())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let url = d.get_str("url").to_string();

        let mut params = Params::new();
        params
            .set("hypervisor", d.get_str("hypervisor"))
            .set("podid", d.get_str("pod_id"))
            .set("url", &url)
            .set("zoneid", d.get_str("zone_id"))
            .set_nonempty("username", d.get_str("username"))
            .set_nonempty("password", d.get_str("password"))
            .set_nonempty("clusterid", d.get_str("cluster_id"))
            .set_nonempty("clustername", d.get_str("cluster_name"))
            .set_nonempty("allocationstate", d.get_str("allocation_state"))
            .set_list("hosttags", &d.get_string_list("host_tags"));

        // The management server often rejects a freshly installed host on
        // the first attempts.
        let what = format!("add host {}", url);
        let response = wait::retry(ADD_ATTEMPTS, ADD_RETRY_DELAY, &what, || async {
            client
                .execute("addHost", &params)
                .await
                .context(|| format!("adding host {}", url))
        })
        .await?;
        let id = added_host_id(&response).context(|| format!("adding host {}", url))?;

        tracing::info!(id = %id, url = %url, "host added");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let host = self.fetch(client, d.id()).await?;
        let Some(host) = host else {
            mark_gone(d, "host");
            return Ok(());
        };

        let tags: Vec<String> = host
            .hosttags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        d.set("name", host.name);
        d.set("hypervisor", host.hypervisor);
        d.set("pod_id", host.podid);
        d.set("zone_id", host.zoneid);
        d.set("cluster_id", host.clusterid);
        d.set("cluster_name", host.clustername);
        d.set("host_tags", tags);
        d.set("state", host.state);
        d.set("resource_state", host.resourcestate);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("host_tags") || d.has_change("allocation_state") {
            let mut params = Params::new();
            params
                .set("id", d.id())
                .set("hosttags", d.get_string_list("host_tags").join(","))
                .set_nonempty("allocationstate", d.get_str("allocation_state"));
            client
                .execute("updateHost", &params)
                .await
                .context(|| format!("updating host {}", d.id()))?;
        }
        self.read(client, d).await
    }

    /// Hosts must be in maintenance before CloudStack lets them go.
    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();

        let Some(host) = self.fetch(client, &id).await? else {
            return Ok(());
        };

        if host.resourcestate != "Maintenance" {
            ignore_not_found(
                client
                    .execute_async("prepareHostForMaintenance", &Params::from([("id", id.as_str())]))
                    .await,
            )
            .context(|| format!("preparing host {} for maintenance", id))?;

            let what = format!("host {} to enter maintenance", id);
            Poller::new(MAINTENANCE_POLL_INTERVAL, MAINTENANCE_TIMEOUT)
                .until(&what, || async {
                    let state = self
                        .fetch(client, &id)
                        .await?
                        .map(|h| h.resourcestate)
                        .unwrap_or_else(|| "Maintenance".to_string());
                    tracing::debug!(id = %id, resource_state = %state, "waiting for maintenance");
                    Ok(state == "Maintenance")
                })
                .await?;
        }

        ignore_not_found(
            client
                .execute("deleteHost", &Params::from([("id", id.as_str())]))
                .await,
        )
        .context(|| format!("deleting host {}", id))?;
        tracing::info!(id = %id, "host deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_added_host_id() {
        let response = json!({"count": 1, "host": [{"id": "h1"}]});
        assert_eq!(added_host_id(&response).unwrap(), "h1");
        assert!(added_host_id(&json!({})).is_err());
    }
}
