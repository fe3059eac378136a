use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resolve;
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AffinityGroup {
    name: String,
    description: String,
    #[serde(rename = "type")]
    group_type: String,
    project: String,
    projectid: String,
}

pub struct AffinityGroupResource;

#[async_trait]
impl Resource for AffinityGroupResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_affinity_group"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("description", Attribute::optional_string().computed().force_new())
            .attr("type", Attribute::required_string().force_new())
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("type", d.get_str("type"))
            .set("description", d.get_opt_str("description").unwrap_or(&name));
        resolve::set_project_id(client, d, &mut params).await?;

        let result = client
            .execute_async("createAffinityGroup", &params)
            .await
            .context(|| format!("creating affinity group {}", name))?;
        let id = extract_id("createAffinityGroup", &result, "affinitygroup")
            .context(|| format!("creating affinity group {}", name))?;

        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let group: Option<AffinityGroup> = client
            .get_by_id("listAffinityGroups", "affinitygroup", d.id(), &params)
            .await
            .context(|| format!("retrieving affinity group {}", d.id()))?;

        let Some(group) = group else {
            mark_gone(d, "affinity group");
            return Ok(());
        };

        d.set("name", group.name);
        d.set("description", group.description);
        d.set("type", group.group_type);
        resolve::set_project(d, &group.project, &group.projectid);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("id", d.id())]);
        resolve::set_project_id(client, d, &mut params).await?;
        ignore_not_found(client.execute_async("deleteAffinityGroup", &params).await)
            .context(|| format!("deleting affinity group {}", d.id()))
    }
}
