use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AttachedVolume {
    virtualmachineid: String,
    deviceid: i64,
    attached: String,
}

/// `cloudstack_attach_volume`: attachment of an existing volume to an
/// instance. The id is the volume id.
pub struct AttachVolumeResource;

#[async_trait]
impl Resource for AttachVolumeResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_attach_volume"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("volume_id", Attribute::required_string().force_new())
            .attr("virtual_machine_id", Attribute::required_string().force_new())
            .attr("device_id", Attribute::optional_int().computed().force_new())
            .attr("attached", Attribute::computed_string())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let volume_id = d.get_str("volume_id").to_string();
        let vm_id = d.get_str("virtual_machine_id").to_string();

        let mut params = Params::new();
        params
            .set("id", &volume_id)
            .set("virtualmachineid", &vm_id)
            .set_opt("deviceid", d.get_opt_int("device_id"));

        client
            .execute_async("attachVolume", &params)
            .await
            .context(|| format!("attaching volume {} to {}", volume_id, vm_id))?;

        tracing::info!(volume_id = %volume_id, vm_id = %vm_id, "volume attached");
        d.set_id(volume_id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let volume: Option<AttachedVolume> = client
            .get_by_id("listVolumes", "volume", d.id(), &Params::from([("listall", "true")]))
            .await
            .context(|| format!("retrieving volume {}", d.id()))?;

        let Some(volume) = volume.filter(|v| !v.virtualmachineid.is_empty()) else {
            mark_gone(d, "volume attachment");
            return Ok(());
        };

        d.set("volume_id", d.id().to_string());
        d.set("virtual_machine_id", volume.virtualmachineid);
        d.set("device_id", volume.deviceid);
        d.set("attached", volume.attached);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("detachVolume", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("detaching volume {}", d.id()))
    }
}
