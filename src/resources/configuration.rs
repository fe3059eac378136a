use async_trait::async_trait;
use serde::Deserialize;

use super::mark_gone;
use crate::cloudstack::{CloudStackClient, Params};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

/// Scope arguments shared by updateConfiguration and listConfigurations.
const SCOPES: [(&str, &str); 6] = [
    ("account_id", "accountid"),
    ("cluster_id", "clusterid"),
    ("domain_id", "domainid"),
    ("image_store_uuid", "imagestoreuuid"),
    ("storage_id", "storageid"),
    ("zone_id", "zoneid"),
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Configuration {
    name: String,
    value: String,
    category: String,
    description: String,
    component: String,
    isdynamic: bool,
    scope: String,
}

/// `cloudstack_configuration`: a global or scoped setting. The id is the
/// setting name.
pub struct ConfigurationResource;

impl ConfigurationResource {
    fn scoped_params(d: &ResourceData) -> Params {
        let mut params = Params::new();
        for (attr, param) in SCOPES {
            params.set_nonempty(param, d.get_str(attr));
        }
        params
    }
}

#[async_trait]
impl Resource for ConfigurationResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_configuration"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("value", Attribute::optional_string().computed())
            .attr("category", Attribute::computed_string())
            .attr("description", Attribute::computed_string())
            .attr("component", Attribute::computed_string())
            .attr("is_dynamic", Attribute::computed_bool())
            .attr("scope", Attribute::computed_string());
        for (attr, _) in SCOPES {
            schema = schema.attr(attr, Attribute::optional_string().force_new());
        }
        schema
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        d.set_id(name);
        self.update(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Self::scoped_params(d);
        params.set("name", d.id());

        let configurations: Vec<Configuration> = client
            .list("listConfigurations", "configuration", &params)
            .await
            .context(|| format!("retrieving configuration {}", d.id()))?;

        let id = d.id().to_string();
        let Some(configuration) = configurations.into_iter().find(|c| c.name == id) else {
            mark_gone(d, "configuration");
            return Ok(());
        };

        d.set("name", configuration.name);
        d.set("value", configuration.value);
        d.set("category", configuration.category);
        d.set("description", configuration.description);
        d.set("component", configuration.component);
        d.set("is_dynamic", configuration.isdynamic);
        d.set("scope", configuration.scope);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if let Some(value) = d.get_opt_str("value") {
            let mut params = Self::scoped_params(d);
            params.set("name", d.id()).set("value", value);
            client
                .execute("updateConfiguration", &params)
                .await
                .context(|| format!("updating configuration {}", d.id()))?;
        }
        self.read(client, d).await
    }

    /// Settings cannot be removed; the value stays as last applied.
    async fn delete(&self, _client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        tracing::info!(name = d.id(), "configuration removed from state only");
        Ok(())
    }
}
