use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

const ROLE_TYPES: [&str; 4] = ["Admin", "ResourceAdmin", "DomainAdmin", "User"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Role {
    name: String,
    #[serde(rename = "type")]
    role_type: String,
    description: String,
    ispublic: bool,
}

pub struct RoleResource;

#[async_trait]
impl Resource for RoleResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_role"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("type", Attribute::required_string().force_new())
            .attr("description", Attribute::optional_string().computed())
            .attr("is_public", Attribute::optional_bool().default(true))
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let role_type = d.get_str("type");
        if !ROLE_TYPES.contains(&role_type) {
            return Err(ProviderError::validation(
                self.type_name(),
                format!("type must be one of {}, got '{}'", ROLE_TYPES.join(", "), role_type),
            ));
        }

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("type", role_type)
            .set("ispublic", d.get_bool("is_public"))
            .set_nonempty("description", d.get_str("description"));

        let response = client
            .execute("createRole", &params)
            .await
            .context(|| format!("creating role {}", name))?;
        let id = extract_id("createRole", &response, "role")
            .context(|| format!("creating role {}", name))?;

        tracing::info!(id = %id, name = %name, "role created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let role: Option<Role> = client
            .get_by_id("listRoles", "role", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving role {}", d.id()))?;

        let Some(role) = role else {
            mark_gone(d, "role");
            return Ok(());
        };

        d.set("name", role.name);
        d.set("type", role.role_type);
        d.set("description", role.description);
        d.set("is_public", role.ispublic);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let changed = ["name", "description", "is_public"];
        if changed.iter().any(|k| d.has_change(k)) {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set("ispublic", d.get_bool("is_public"))
                .set_nonempty("description", d.get_str("description"));
            client
                .execute("updateRole", &params)
                .await
                .context(|| format!("updating role {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteRole", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting role {}", d.id()))
    }
}
