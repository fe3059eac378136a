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
struct NetworkAclList {
    name: String,
    description: String,
    vpcid: String,
}

/// `cloudstack_network_acl`: an empty ACL list inside a VPC. Rules are
/// managed by `cloudstack_network_acl_rule`.
pub struct NetworkAclResource;

#[async_trait]
impl Resource for NetworkAclResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_network_acl"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("description", Attribute::optional_string().computed().force_new())
            .attr("vpc_id", Attribute::required_string().force_new())
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("description", d.get_opt_str("description").unwrap_or(&name))
            .set("vpcid", d.get_str("vpc_id"));

        let result = client
            .execute_async("createNetworkACLList", &params)
            .await
            .context(|| format!("creating network ACL list {}", name))?;
        let id = extract_id("createNetworkACLList", &result, "networkacllist")
            .context(|| format!("creating network ACL list {}", name))?;

        tracing::info!(id = %id, name = %name, "network ACL list created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::new();
        resolve::set_project_id(client, d, &mut params).await?;

        let acl: Option<NetworkAclList> = client
            .get_by_id("listNetworkACLLists", "networkacllist", d.id(), &params)
            .await
            .context(|| format!("retrieving network ACL list {}", d.id()))?;

        let Some(acl) = acl else {
            mark_gone(d, "network ACL list");
            return Ok(());
        };

        d.set("name", acl.name);
        d.set("description", acl.description);
        d.set("vpc_id", acl.vpcid);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteNetworkACLList", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting network ACL list {}", d.id()))
    }
}
