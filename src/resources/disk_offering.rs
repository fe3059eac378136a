use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiskOffering {
    name: String,
    displaytext: String,
    disksize: i64,
    iscustomized: bool,
    storagetype: String,
    provisioningtype: String,
    miniops: i64,
    maxiops: i64,
}

pub struct DiskOfferingResource;

#[async_trait]
impl Resource for DiskOfferingResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_disk_offering"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("display_text", Attribute::required_string())
            .attr("disk_size", Attribute::optional_int().computed().force_new())
            .attr("customized", Attribute::computed_bool())
            .attr("storage_type", Attribute::optional_string().computed().force_new())
            .attr("provisioning_type", Attribute::optional_string().computed().force_new())
            .attr("min_iops", Attribute::optional_int().computed().force_new())
            .attr("max_iops", Attribute::optional_int().computed().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("displaytext", d.get_str("display_text"))
            .set_nonempty("storagetype", d.get_str("storage_type"))
            .set_nonempty("provisioningtype", d.get_str("provisioning_type"))
            .set_opt("miniops", d.get_opt_int("min_iops"))
            .set_opt("maxiops", d.get_opt_int("max_iops"));
        match d.get_opt_int("disk_size") {
            Some(size) => params.set("disksize", size),
            None => params.set("customized", true),
        };

        let response = client
            .execute("createDiskOffering", &params)
            .await
            .context(|| format!("creating disk offering {}", name))?;
        let id = extract_id("createDiskOffering", &response, "diskoffering")
            .context(|| format!("creating disk offering {}", name))?;

        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let offering: Option<DiskOffering> = client
            .get_by_id("listDiskOfferings", "diskoffering", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving disk offering {}", d.id()))?;

        let Some(offering) = offering else {
            mark_gone(d, "disk offering");
            return Ok(());
        };

        d.set("name", offering.name);
        d.set("display_text", offering.displaytext);
        d.set("disk_size", offering.disksize);
        d.set("customized", offering.iscustomized);
        d.set("storage_type", offering.storagetype);
        d.set("provisioning_type", offering.provisioningtype);
        d.set("min_iops", offering.miniops);
        d.set("max_iops", offering.maxiops);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") || d.has_change("display_text") {
            let mut params = Params::new();
            params
                .set("id", d.id())
                .set("name", d.get_str("name"))
                .set("displaytext", d.get_str("display_text"));
            client
                .execute("updateDiskOffering", &params)
                .await
                .context(|| format!("updating disk offering {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteDiskOffering", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting disk offering {}", d.id()))
    }
}
