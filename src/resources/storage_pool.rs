use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoragePool {
    name: String,
    zoneid: String,
    podid: String,
    clusterid: String,
    scope: String,
    hypervisor: String,
    provider: String,
    tags: String,
    capacitybytes: i64,
    capacityiops: i64,
    state: String,
}

/// `cloudstack_storage_pool`: primary storage for a cluster or zone.
pub struct StoragePoolResource;

#[async_trait]
impl Resource for StoragePoolResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_storage_pool"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("url", Attribute::required_string().force_new())
            .attr("zone_id", Attribute::required_string().force_new())
            .attr("pod_id", Attribute::optional_string().force_new())
            .attr("cluster_id", Attribute::optional_string().force_new())
            .attr("scope", Attribute::optional_string().computed().force_new())
            .attr("hypervisor", Attribute::optional_string().computed().force_new())
            .attr("provider", Attribute::optional_string().computed().force_new())
            .attr("tags", Attribute::optional_string().computed())
            .attr("capacity_bytes", Attribute::optional_int().computed())
            .attr("capacity_iops", Attribute::optional_int().computed())
            .attr("state", Attribute::optional_string().computed())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("url", d.get_str("url"))
            .set("zoneid", d.get_str("zone_id"))
            .set_nonempty("podid", d.get_str("pod_id"))
            .set_nonempty("clusterid", d.get_str("cluster_id"))
            .set_nonempty("scope", d.get_str("scope"))
            .set_nonempty("hypervisor", d.get_str("hypervisor"))
            .set_nonempty("provider", d.get_str("provider"))
            .set_nonempty("tags", d.get_str("tags"))
            .set_opt("capacitybytes", d.get_opt_int("capacity_bytes"))
            .set_opt("capacityiops", d.get_opt_int("capacity_iops"));

        let response = client
            .execute("createStoragePool", &params)
            .await
            .context(|| format!("creating storage pool {}", name))?;
        let id = extract_id("createStoragePool", &response, "storagepool")
            .context(|| format!("creating storage pool {}", name))?;

        tracing::info!(id = %id, name = %name, "storage pool created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let pool: Option<StoragePool> = client
            .get_by_id("listStoragePools", "storagepool", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving storage pool {}", d.id()))?;

        let Some(pool) = pool else {
            mark_gone(d, "storage pool");
            return Ok(());
        };

        d.set("name", pool.name);
        d.set("zone_id", pool.zoneid);
        if !pool.podid.is_empty() {
            d.set("pod_id", pool.podid);
        }
        if !pool.clusterid.is_empty() {
            d.set("cluster_id", pool.clusterid);
        }
        d.set("scope", pool.scope);
        d.set("hypervisor", pool.hypervisor);
        d.set("provider", pool.provider);
        d.set("tags", pool.tags);
        d.set("capacity_bytes", pool.capacitybytes);
        d.set("capacity_iops", pool.capacityiops);
        d.set("state", pool.state);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let changed = ["name", "tags", "capacity_bytes", "capacity_iops", "state"];
        if changed.iter().any(|k| d.has_change(k)) {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set_nonempty("tags", d.get_str("tags"))
                .set_opt("capacitybytes", d.get_opt_int("capacity_bytes"))
                .set_opt("capacityiops", d.get_opt_int("capacity_iops"));
            if d.has_change("state") {
                params.set("enabled", d.get_str("state") == "Up");
            }
            client
                .execute("updateStoragePool", &params)
                .await
                .context(|| format!("updating storage pool {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteStoragePool", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting storage pool {}", d.id()))
    }
}
