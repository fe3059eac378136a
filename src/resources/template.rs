use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, CloudStackError, Params, Tag, tags_to_map};
use crate::error::{Context, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::tags;
use crate::wait::Poller;

const READY_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_READY_TIMEOUT: i64 = 300;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Template {
    name: String,
    displaytext: String,
    format: String,
    hypervisor: String,
    ostypeid: String,
    ostypename: String,
    zoneid: String,
    zonename: String,
    isdynamicallyscalable: bool,
    isextractable: bool,
    isfeatured: bool,
    ispublic: bool,
    passwordenabled: bool,
    isready: bool,
    project: String,
    projectid: String,
    tags: Vec<Tag>,
}

/// `registerTemplate` answers with a one element `template` list.
fn registered_template_id(response: &Value) -> std::result::Result<String, CloudStackError> {
    response
        .get("template")
        .and_then(|t| t.get(0))
        .and_then(|t| t.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CloudStackError::InvalidResponse {
            command: "registerTemplate".to_string(),
            message: "missing 'template[0].id' in response".to_string(),
        })
}

/// `cloudstack_template`: a template registered from a URL. Creation waits
/// until CloudStack reports it ready.
pub struct TemplateResource;

impl TemplateResource {
    async fn fetch(
        &self,
        client: &CloudStackClient,
        id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<Template>> {
        let mut params = Params::from([("templatefilter", "executable")]);
        params.set_opt("projectid", project_id);
        client
            .get_by_id("listTemplates", "template", id, &params)
            .await
            .context(|| format!("retrieving template {}", id))
    }

    async fn project_id(&self, client: &CloudStackClient, d: &ResourceData) -> Result<Option<String>> {
        match d.get_opt_str("project") {
            Some(project) => Ok(Some(resolve::retrieve_id(client, Kind::Project, project).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Resource for TemplateResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_template"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("display_text", Attribute::optional_string().computed())
            .attr("format", Attribute::required_string().force_new())
            .attr("hypervisor", Attribute::required_string().force_new())
            .attr("os_type", Attribute::required_string())
            .attr("url", Attribute::required_string().force_new())
            .attr("zone", Attribute::required_string().force_new())
            .attr("is_dynamically_scalable", Attribute::optional_bool().computed())
            .attr("is_extractable", Attribute::optional_bool().computed().force_new())
            .attr("is_featured", Attribute::optional_bool().computed().force_new())
            .attr("is_public", Attribute::optional_bool().computed().force_new())
            .attr("password_enabled", Attribute::optional_bool().computed())
            .attr("is_ready", Attribute::computed_bool())
            .attr("is_ready_timeout", Attribute::optional_int().default(DEFAULT_READY_TIMEOUT))
            .with_project()
            .with_tags()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let zone_id = resolve::retrieve_id(client, Kind::Zone, d.get_str("zone")).await?;
        let os_type_id = resolve::retrieve_id(client, Kind::OsType, d.get_str("os_type")).await?;
        let project_id = self.project_id(client, d).await?;

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("displaytext", d.get_opt_str("display_text").unwrap_or(&name))
            .set("format", d.get_str("format"))
            .set("hypervisor", d.get_str("hypervisor"))
            .set("ostypeid", os_type_id)
            .set("url", d.get_str("url"))
            .set("zoneid", zone_id)
            .set_opt("isdynamicallyscalable", d.get_opt_bool("is_dynamically_scalable"))
            .set_opt("isextractable", d.get_opt_bool("is_extractable"))
            .set_opt("isfeatured", d.get_opt_bool("is_featured"))
            .set_opt("ispublic", d.get_opt_bool("is_public"))
            .set_opt("passwordenabled", d.get_opt_bool("password_enabled"))
            .set_opt("projectid", project_id.as_deref());

        let response = client
            .execute("registerTemplate", &params)
            .await
            .context(|| format!("registering template {}", name))?;
        let id = registered_template_id(&response)
            .context(|| format!("registering template {}", name))?;
        d.set_id(id.clone());

        tags::set_tags(client, d, "Template").await?;

        let timeout = Duration::from_secs(d.get_int("is_ready_timeout").max(0) as u64);
        let what = format!("template {} to become ready", id);
        Poller::new(READY_POLL_INTERVAL, timeout)
            .until(&what, || async {
                let ready = self
                    .fetch(client, &id, project_id.as_deref())
                    .await?
                    .is_some_and(|t| t.isready);
                tracing::debug!(id = %id, ready, "waiting for template");
                Ok(ready)
            })
            .await?;

        tracing::info!(id = %id, name = %name, "template registered");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let project_id = self.project_id(client, d).await?;
        let template = self.fetch(client, d.id(), project_id.as_deref()).await?;

        let Some(template) = template else {
            mark_gone(d, "template");
            return Ok(());
        };

        d.set("name", template.name);
        d.set("display_text", template.displaytext);
        d.set("format", template.format);
        d.set("hypervisor", template.hypervisor);
        d.set("is_dynamically_scalable", template.isdynamicallyscalable);
        d.set("is_extractable", template.isextractable);
        d.set("is_featured", template.isfeatured);
        d.set("is_public", template.ispublic);
        d.set("password_enabled", template.passwordenabled);
        d.set("is_ready", template.isready);
        resolve::set_value_or_id(d, "os_type", &template.ostypename, &template.ostypeid);
        resolve::set_value_or_id(d, "zone", &template.zonename, &template.zoneid);
        resolve::set_project(d, &template.project, &template.projectid);
        d.set_string_map("tags", &tags_to_map(&template.tags));
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let changed = [
            "name",
            "display_text",
            "os_type",
            "is_dynamically_scalable",
            "password_enabled",
        ];
        if changed.iter().any(|k| d.has_change(k)) {
            let os_type_id =
                resolve::retrieve_id(client, Kind::OsType, d.get_str("os_type")).await?;
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set_nonempty("displaytext", d.get_str("display_text"))
                .set("ostypeid", os_type_id)
                .set_opt("isdynamicallyscalable", d.get_opt_bool("is_dynamically_scalable"))
                .set_opt("passwordenabled", d.get_opt_bool("password_enabled"));
            client
                .execute("updateTemplate", &params)
                .await
                .context(|| format!("updating template {}", d.id()))?;
        }

        tags::set_tags(client, d, "Template").await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteTemplate", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting template {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registered_template_id() {
        let response = json!({"count": 1, "template": [{"id": "tpl-1", "name": "debian"}]});
        assert_eq!(registered_template_id(&response).unwrap(), "tpl-1");
        assert!(registered_template_id(&json!({"count": 0})).is_err());
    }
}
