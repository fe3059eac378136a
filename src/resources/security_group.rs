use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, Tag, extract_id, tags_to_map};
use crate::error::{Context, Result};
use crate::resolve;
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::tags;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SecurityGroup {
    name: String,
    description: String,
    project: String,
    projectid: String,
    tags: Vec<Tag>,
}

/// `cloudstack_security_group`: an empty security group. Rules are managed
/// by `cloudstack_security_group_rule`.
pub struct SecurityGroupResource;

#[async_trait]
impl Resource for SecurityGroupResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_security_group"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("description", Attribute::optional_string().computed().force_new())
            .with_project()
            .with_tags()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("description", d.get_opt_str("description").unwrap_or(&name));
        resolve::set_project_id(client, d, &mut params).await?;

        let response = client
            .execute("createSecurityGroup", &params)
            .await
            .context(|| format!("creating security group {}", name))?;
        let id = extract_id("createSecurityGroup", &response, "securitygroup")
            .context(|| format!("creating security group {}", name))?;
        d.set_id(id.clone());

        tags::set_tags(client, d, "SecurityGroup").await?;

        tracing::info!(id = %id, name = %name, "security group created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let group: Option<SecurityGroup> = client
            .get_by_id("listSecurityGroups", "securitygroup", d.id(), &params)
            .await
            .context(|| format!("retrieving security group {}", d.id()))?;

        let Some(group) = group else {
            mark_gone(d, "security group");
            return Ok(());
        };

        d.set("name", group.name);
        d.set("description", group.description);
        resolve::set_project(d, &group.project, &group.projectid);
        d.set_string_map("tags", &tags_to_map(&group.tags));
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        tags::set_tags(client, d, "SecurityGroup").await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("id", d.id())]);
        resolve::set_project_id(client, d, &mut params).await?;
        ignore_not_found(client.execute("deleteSecurityGroup", &params).await)
            .context(|| format!("deleting security group {}", d.id()))
    }
}
