use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Project {
    name: String,
    displaytext: String,
    account: String,
    domain: String,
    domainid: String,
    state: String,
}

pub struct ProjectResource;

#[async_trait]
impl Resource for ProjectResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_project"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("display_text", Attribute::optional_string().computed())
            .attr("account", Attribute::optional_string().computed().force_new())
            .attr("domain", Attribute::optional_string().computed().force_new())
            .attr("state", Attribute::computed_string())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("displaytext", d.get_opt_str("display_text").unwrap_or(&name))
            .set_nonempty("account", d.get_str("account"));
        if let Some(domain) = d.get_opt_str("domain") {
            params.set("domainid", resolve::retrieve_id(client, Kind::Domain, domain).await?);
        }

        let result = client
            .execute_async("createProject", &params)
            .await
            .context(|| format!("creating project {}", name))?;
        let id = extract_id("createProject", &result, "project")
            .context(|| format!("creating project {}", name))?;

        tracing::info!(id = %id, name = %name, "project created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let project: Option<Project> = client
            .get_by_id("listProjects", "project", d.id(), &Params::from([("listall", "true")]))
            .await
            .context(|| format!("retrieving project {}", d.id()))?;

        let Some(project) = project else {
            mark_gone(d, "project");
            return Ok(());
        };

        d.set("name", project.name);
        d.set("display_text", project.displaytext);
        d.set("account", project.account);
        resolve::set_value_or_id(d, "domain", &project.domain, &project.domainid);
        d.set("state", project.state);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") || d.has_change("display_text") {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set_nonempty("displaytext", d.get_str("display_text"));
            client
                .execute_async("updateProject", &params)
                .await
                .context(|| format!("updating project {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteProject", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting project {}", d.id()))
    }
}
