use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, Tag, extract_id, tags_to_map};
use crate::error::{Context, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::tags;

const GIB: i64 = 1024 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Volume {
    name: String,
    diskofferingid: String,
    diskofferingname: String,
    size: i64,
    zoneid: String,
    zonename: String,
    virtualmachineid: String,
    deviceid: i64,
    project: String,
    projectid: String,
    tags: Vec<Tag>,
}

/// `cloudstack_disk`: a data volume, optionally attached to an instance.
pub struct DiskResource;

impl DiskResource {
    async fn attach(&self, client: &CloudStackClient, d: &ResourceData) -> Result<()> {
        let vm_id = d.get_str("virtual_machine_id");
        let mut params = Params::new();
        params
            .set("id", d.id())
            .set("virtualmachineid", vm_id)
            .set_opt("deviceid", d.get_opt_int("device_id"));
        client
            .execute_async("attachVolume", &params)
            .await
            .context(|| format!("attaching disk {} to {}", d.id(), vm_id))?;
        Ok(())
    }

    async fn lookup(&self, client: &CloudStackClient, id: &str) -> Result<Option<Volume>> {
        client
            .get_by_id("listVolumes", "volume", id, &Params::from([("listall", "true")]))
            .await
            .context(|| format!("retrieving disk {}", id))
    }

    /// Detaches the volume if CloudStack reports it attached to an instance.
    async fn detach_if_attached(&self, client: &CloudStackClient, id: &str) -> Result<()> {
        let attached = self
            .lookup(client, id)
            .await?
            .is_some_and(|v| !v.virtualmachineid.is_empty());
        if attached {
            self.detach(client, id).await?;
        }
        Ok(())
    }

    async fn detach(&self, client: &CloudStackClient, id: &str) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("detachVolume", &Params::from([("id", id)]))
                .await,
        )
        .context(|| format!("detaching disk {}", id))
    }
}

#[async_trait]
impl Resource for DiskResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_disk"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("attach", Attribute::optional_bool().default(false))
            .attr("device_id", Attribute::optional_int().computed())
            .attr("disk_offering", Attribute::required_string())
            .attr("size", Attribute::optional_int().computed())
            .attr("shrink_ok", Attribute::optional_bool().default(false))
            .attr("virtual_machine_id", Attribute::optional_string())
            .attr("zone", Attribute::required_string().force_new())
            .with_project()
            .with_tags()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let zone_id = resolve::retrieve_id(client, Kind::Zone, d.get_str("zone")).await?;
        let offering_id =
            resolve::retrieve_id(client, Kind::DiskOffering, d.get_str("disk_offering")).await?;

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("zoneid", zone_id)
            .set("diskofferingid", offering_id)
            .set_opt("size", d.get_opt_int("size"));
        resolve::set_project_id(client, d, &mut params).await?;

        let result = client
            .execute_async("createVolume", &params)
            .await
            .context(|| format!("creating disk {}", name))?;
        let id = extract_id("createVolume", &result, "volume")
            .context(|| format!("creating disk {}", name))?;
        d.set_id(id);

        tags::set_tags(client, d, "Volume").await?;

        if d.get_bool("attach") {
            self.attach(client, d).await?;
        }

        tracing::info!(id = d.id(), name = %name, "disk created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let Some(volume) = self.lookup(client, d.id()).await? else {
            mark_gone(d, "disk");
            return Ok(());
        };

        d.set("name", volume.name);
        d.set("size", volume.size / GIB);
        resolve::set_value_or_id(d, "disk_offering", &volume.diskofferingname, &volume.diskofferingid);
        resolve::set_value_or_id(d, "zone", &volume.zonename, &volume.zoneid);
        resolve::set_project(d, &volume.project, &volume.projectid);
        d.set_string_map("tags", &tags_to_map(&volume.tags));

        if !volume.virtualmachineid.is_empty() {
            d.set("virtual_machine_id", volume.virtualmachineid);
            d.set("device_id", volume.deviceid);
        } else if d.get_bool("attach") {
            d.set("virtual_machine_id", "");
        }
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();

        if d.has_change("disk_offering") || d.has_change("size") {
            let offering_id =
                resolve::retrieve_id(client, Kind::DiskOffering, d.get_str("disk_offering")).await?;
            let mut params = Params::new();
            params
                .set("id", &id)
                .set("diskofferingid", offering_id)
                .set_opt("size", d.get_opt_int("size"))
                .set("shrinkok", d.get_bool("shrink_ok"));
            client
                .execute_async("resizeVolume", &params)
                .await
                .context(|| format!("resizing disk {}", id))?;
        }

        if d.has_change("attach") || d.has_change("virtual_machine_id") || d.has_change("device_id") {
            self.detach_if_attached(client, &id).await?;
            if d.get_bool("attach") {
                self.attach(client, d).await?;
            }
        }

        tags::set_tags(client, d, "Volume").await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        self.detach_if_attached(client, d.id()).await?;
        ignore_not_found(
            client
                .execute("deleteVolume", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting disk {}", d.id()))
    }
}
