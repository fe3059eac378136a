use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

/// Interval types indexed by the numeric code listSnapshotPolicies answers
/// with.
const INTERVAL_TYPES: [&str; 4] = ["HOURLY", "DAILY", "WEEKLY", "MONTHLY"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SnapshotPolicy {
    volumeid: String,
    intervaltype: usize,
    maxsnaps: i64,
    schedule: String,
    timezone: String,
    fordisplay: bool,
}

fn check_interval_type(value: &str) -> Result<()> {
    if INTERVAL_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(ProviderError::validation(
            "cloudstack_snapshot_policy",
            format!("interval_type must be one of {}, got '{}'", INTERVAL_TYPES.join(", "), value),
        ))
    }
}

/// `cloudstack_snapshot_policy`: recurring snapshots of a volume.
pub struct SnapshotPolicyResource;

#[async_trait]
impl Resource for SnapshotPolicyResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_snapshot_policy"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("volume_id", Attribute::required_string().force_new())
            .attr("interval_type", Attribute::required_string().force_new())
            .attr("max_snaps", Attribute::required_int().force_new())
            .attr("schedule", Attribute::required_string().force_new())
            .attr("timezone", Attribute::required_string().force_new())
            .attr("custom_id", Attribute::optional_string())
            .attr("for_display", Attribute::optional_bool().default(true))
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let volume_id = d.get_str("volume_id").to_string();
        check_interval_type(d.get_str("interval_type"))?;

        let mut params = Params::new();
        params
            .set("volumeid", &volume_id)
            .set("intervaltype", d.get_str("interval_type"))
            .set("maxsnaps", d.get_int("max_snaps"))
            .set("schedule", d.get_str("schedule"))
            .set("timezone", d.get_str("timezone"))
            .set("fordisplay", d.get_bool("for_display"))
            .set_nonempty("customid", d.get_str("custom_id"));

        let response = client
            .execute("createSnapshotPolicy", &params)
            .await
            .context(|| format!("creating snapshot policy for volume {}", volume_id))?;
        let id = extract_id("createSnapshotPolicy", &response, "snapshotpolicy")
            .context(|| format!("creating snapshot policy for volume {}", volume_id))?;

        tracing::info!(id = %id, volume = %volume_id, "snapshot policy created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let policy: Option<SnapshotPolicy> = client
            .get_by_id("listSnapshotPolicies", "snapshotpolicy", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving snapshot policy {}", d.id()))?;

        let Some(policy) = policy else {
            mark_gone(d, "snapshot policy");
            return Ok(());
        };

        d.set("volume_id", policy.volumeid);
        if let Some(interval) = INTERVAL_TYPES.get(policy.intervaltype) {
            d.set("interval_type", *interval);
        }
        d.set("max_snaps", policy.maxsnaps);
        d.set("schedule", policy.schedule);
        d.set("timezone", policy.timezone);
        d.set("for_display", policy.fordisplay);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("custom_id") || d.has_change("for_display") {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("fordisplay", d.get_bool("for_display"))
                .set_nonempty("customid", d.get_str("custom_id"));
            client
                .execute("updateSnapshotPolicy", &params)
                .await
                .context(|| format!("updating snapshot policy {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteSnapshotPolicies", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting snapshot policy {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_interval_type() {
        assert!(check_interval_type("DAILY").is_ok());
        assert!(check_interval_type("daily").is_err());
    }
}
