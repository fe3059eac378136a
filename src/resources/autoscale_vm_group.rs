use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::wait;

const STATE_POLL_ATTEMPTS: u32 = 30;
const STATE_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AutoScaleVmGroup {
    lbruleid: String,
    minmembers: i64,
    maxmembers: i64,
    interval: i64,
    scaleuppolicies: Vec<PolicyRef>,
    scaledownpolicies: Vec<PolicyRef>,
    vmprofileid: String,
    state: String,
    fordisplay: bool,
}

/// Maps the API states (`enabled`, `disabled`, ...) to the configured verbs.
fn configured_state(api_state: &str) -> &str {
    match api_state.to_lowercase().as_str() {
        "enabled" => "enable",
        "disabled" => "disable",
        _ => api_state,
    }
}

pub struct AutoscaleVmGroupResource;

impl AutoscaleVmGroupResource {
    async fn fetch(&self, client: &CloudStackClient, id: &str) -> Result<Option<AutoScaleVmGroup>> {
        client
            .get_by_id(
                "listAutoScaleVmGroups",
                "autoscalevmgroup",
                id,
                &Params::from([("listall", "true")]),
            )
            .await
            .context(|| format!("retrieving autoscale VM group {}", id))
    }

    async fn set_enabled(&self, client: &CloudStackClient, id: &str, enable: bool) -> Result<()> {
        let command = if enable {
            "enableAutoScaleVmGroup"
        } else {
            "disableAutoScaleVmGroup"
        };
        client
            .execute_async(command, &Params::from([("id", id)]))
            .await
            .context(|| format!("changing state of autoscale VM group {}", id))?;
        Ok(())
    }

    async fn wait_for_state(&self, client: &CloudStackClient, id: &str, state: &str) -> Result<()> {
        let what = format!("autoscale VM group {} to become {}", id, state);
        wait::poll_attempts(STATE_POLL_ATTEMPTS, STATE_POLL_INTERVAL, &what, move || async move {
            let group = self
                .fetch(client, id)
                .await?
                .ok_or_else(|| ProviderError::not_found("autoscale VM group", id))?;
            Ok(group.state.eq_ignore_ascii_case(state))
        })
        .await
    }
}

#[async_trait]
impl Resource for AutoscaleVmGroupResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_autoscale_vm_group"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("lbrule_id", Attribute::required_string().force_new())
            .attr("name", Attribute::optional_string().computed())
            .attr("min_members", Attribute::required_int())
            .attr("max_members", Attribute::required_int())
            .attr("interval", Attribute::optional_int().computed())
            .attr("scaleup_policy_ids", Attribute::required_string_set())
            .attr("scaledown_policy_ids", Attribute::required_string_set())
            .attr("vm_profile_id", Attribute::required_string().force_new())
            .attr("display", Attribute::optional_bool().computed())
            .attr("state", Attribute::optional_string().default("enable"))
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let lbrule_id = d.get_str("lbrule_id").to_string();

        let mut params = Params::new();
        params
            .set("lbruleid", &lbrule_id)
            .set("minmembers", d.get_int("min_members"))
            .set("maxmembers", d.get_int("max_members"))
            .set_list("scaleuppolicyids", &d.get_string_list("scaleup_policy_ids"))
            .set_list("scaledownpolicyids", &d.get_string_list("scaledown_policy_ids"))
            .set("vmprofileid", d.get_str("vm_profile_id"))
            .set_opt("interval", d.get_opt_int("interval"))
            .set_nonempty("name", d.get_str("name"))
            .set_opt("fordisplay", d.get_opt_bool("display"));

        let result = client
            .execute_async("createAutoScaleVmGroup", &params)
            .await
            .context(|| format!("creating autoscale VM group for rule {}", lbrule_id))?;
        let id = extract_id("createAutoScaleVmGroup", &result, "autoscalevmgroup")
            .context(|| format!("creating autoscale VM group for rule {}", lbrule_id))?;
        d.set_id(id.clone());

        if d.get_str("state") == "disable" {
            self.set_enabled(client, &id, false).await?;
        }

        tracing::info!(id = %id, "autoscale VM group created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let group = self.fetch(client, d.id()).await?;
        let Some(group) = group else {
            mark_gone(d, "autoscale VM group");
            return Ok(());
        };

        let ids = |policies: &[PolicyRef]| -> Vec<String> {
            policies.iter().map(|p| p.id.clone()).collect()
        };

        d.set("lbrule_id", group.lbruleid);
        d.set("min_members", group.minmembers);
        d.set("max_members", group.maxmembers);
        d.set("interval", group.interval);
        d.set("scaleup_policy_ids", ids(&group.scaleuppolicies));
        d.set("scaledown_policy_ids", ids(&group.scaledownpolicies));
        d.set("vm_profile_id", group.vmprofileid);
        d.set("display", group.fordisplay);
        d.set("state", configured_state(&group.state).to_string());
        Ok(())
    }

    /// Membership and policy changes are only accepted while the group is
    /// disabled.
    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let settings_changed = [
            "min_members",
            "max_members",
            "interval",
            "scaleup_policy_ids",
            "scaledown_policy_ids",
            "name",
            "display",
        ]
        .iter()
        .any(|k| d.has_change(k));

        if settings_changed {
            let current = self
                .fetch(client, &id)
                .await?
                .ok_or_else(|| ProviderError::not_found("autoscale VM group", id.as_str()))?;
            if !current.state.eq_ignore_ascii_case("disabled") {
                self.set_enabled(client, &id, false).await?;
                self.wait_for_state(client, &id, "disabled").await?;
            }

            let mut params = Params::new();
            params
                .set("id", &id)
                .set("minmembers", d.get_int("min_members"))
                .set("maxmembers", d.get_int("max_members"))
                .set_list("scaleuppolicyids", &d.get_string_list("scaleup_policy_ids"))
                .set_list("scaledownpolicyids", &d.get_string_list("scaledown_policy_ids"))
                .set_opt("interval", d.get_opt_int("interval"))
                .set_nonempty("name", d.get_str("name"))
                .set_opt("fordisplay", d.get_opt_bool("display"));
            client
                .execute_async("updateAutoScaleVmGroup", &params)
                .await
                .context(|| format!("updating autoscale VM group {}", id))?;

            if d.get_str("state") == "enable" {
                self.set_enabled(client, &id, true).await?;
            }
        } else if d.has_change("state") {
            self.set_enabled(client, &id, d.get_str("state") == "enable").await?;
        }

        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteAutoScaleVmGroup", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting autoscale VM group {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_state() {
        assert_eq!(configured_state("Enabled"), "enable");
        assert_eq!(configured_state("disabled"), "disable");
        assert_eq!(configured_state("scaling"), "scaling");
    }
}
