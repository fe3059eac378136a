use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::mark_gone;
use crate::cloudstack::{CloudStackClient, Params, is_id};
use crate::error::{Context, ProviderError, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

/// CloudStack's numeric resource types, indexed by their code.
const RESOURCE_TYPES: [&str; 12] = [
    "instance",
    "ip",
    "volume",
    "snapshot",
    "template",
    "project",
    "network",
    "vpc",
    "cpu",
    "memory",
    "primarystorage",
    "secondarystorage",
];

const UNLIMITED: i64 = -1;

fn resource_type_code(name: &str) -> Result<usize> {
    RESOURCE_TYPES
        .iter()
        .position(|t| *t == name)
        .ok_or_else(|| {
            ProviderError::validation(
                "cloudstack_limits",
                format!("type must be one of {}, got '{}'", RESOURCE_TYPES.join(", "), name),
            )
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceLimit {
    max: i64,
}

/// `cloudstack_limits`: the limit of one resource type for an account,
/// domain or project. The id is `<type>-<scope>`.
pub struct LimitsResource;

impl LimitsResource {
    async fn scope_params(&self, client: &CloudStackClient, d: &ResourceData) -> Result<Params> {
        let code = resource_type_code(d.get_str("type"))?;
        let mut params = Params::new();
        params
            .set("resourcetype", code)
            .set_nonempty("account", d.get_str("account"))
            .set_nonempty("domainid", d.get_str("domain_id"));
        if let Some(project) = d.get_opt_str("project") {
            params.set(
                "projectid",
                resolve::retrieve_id(client, Kind::Project, project).await?,
            );
        }
        Ok(params)
    }

    async fn set_limit(&self, client: &CloudStackClient, d: &ResourceData, max: i64) -> Result<()> {
        let mut params = self.scope_params(client, d).await?;
        params.set("max", max);
        client
            .execute("updateResourceLimit", &params)
            .await
            .context(|| format!("setting the {} limit", d.get_str("type")))?;
        Ok(())
    }
}

fn limit_id(d: &ResourceData) -> String {
    let scope = d
        .get_opt_str("project")
        .or(d.get_opt_str("account"))
        .or(d.get_opt_str("domain_id"))
        .unwrap_or("global");
    format!("{}-{}", d.get_str("type"), scope)
}

/// Rebuilds the scope arguments from an import id: `<type>`,
/// `<type>-global`, `<type>-<domain id>`, `<type>-<account>` or
/// `<project>/<type>`.
fn import_attributes(id: &str) -> Result<Map<String, Value>> {
    let (project, rest) = match id.split_once('/') {
        Some((project, rest)) => (Some(project), rest),
        None => (None, id),
    };
    let (resource_type, scope) = match rest.split_once('-') {
        Some((t, scope)) => (t, Some(scope)),
        None => (rest, None),
    };
    resource_type_code(resource_type)?;

    let mut attributes = Map::new();
    attributes.insert("type".to_string(), Value::String(resource_type.to_string()));
    match (project, scope) {
        (Some(project), Some(scope)) if scope != project => {
            return Err(ProviderError::validation(
                "cloudstack_limits",
                format!("import id '{}' names two scopes", id),
            ));
        }
        (Some(project), _) => {
            attributes.insert("project".to_string(), Value::String(project.to_string()));
        }
        (None, None) | (None, Some("global")) => {}
        (None, Some(scope)) if is_id(scope) => {
            attributes.insert("domain_id".to_string(), Value::String(scope.to_string()));
        }
        (None, Some(account)) => {
            attributes.insert("account".to_string(), Value::String(account.to_string()));
        }
    }
    Ok(attributes)
}

#[async_trait]
impl Resource for LimitsResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_limits"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("type", Attribute::required_string().force_new())
            .attr("max", Attribute::optional_int().default(UNLIMITED))
            .attr("account", Attribute::optional_string().force_new())
            .attr("domain_id", Attribute::optional_string().force_new())
            .attr("project", Attribute::optional_string().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        self.set_limit(client, d, d.get_int("max")).await?;
        d.set_id(limit_id(d));
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let params = self.scope_params(client, d).await?;
        let limits: Vec<ResourceLimit> = client
            .list("listResourceLimits", "resourcelimit", &params)
            .await
            .context(|| format!("retrieving the {} limit", d.get_str("type")))?;

        let Some(limit) = limits.into_iter().next() else {
            mark_gone(d, "resource limit");
            return Ok(());
        };

        d.set("max", limit.max);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("max") {
            self.set_limit(client, d, d.get_int("max")).await?;
        }
        self.read(client, d).await
    }

    async fn import(&self, client: &CloudStackClient, id: &str) -> Result<ResourceData> {
        let mut d = ResourceData::new(import_attributes(id)?);
        d.set_id(limit_id(&d));
        self.read(client, &mut d).await?;
        if d.is_gone() {
            return Err(ProviderError::not_found("resource limit", id));
        }
        Ok(d)
    }

    /// Limits cannot be removed, only reset to unlimited.
    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        self.set_limit(client, d, UNLIMITED).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_type_code() {
        assert_eq!(resource_type_code("instance").unwrap(), 0);
        assert_eq!(resource_type_code("secondarystorage").unwrap(), 11);
        assert!(resource_type_code("gpu").is_err());
    }

    #[test]
    fn test_limit_id_uses_scope() {
        let d = ResourceData::new(json!({"type": "cpu", "account": "ops"}).as_object().unwrap().clone());
        assert_eq!(limit_id(&d), "cpu-ops");

        let d = ResourceData::new(json!({"type": "vpc"}).as_object().unwrap().clone());
        assert_eq!(limit_id(&d), "vpc-global");
    }

    #[test]
    fn test_import_attributes() {
        let domain = "5d7e1b5c-6c3b-4d1e-8a4a-0c2b1d9e0f11";

        let attrs = import_attributes(&format!("cpu-{}", domain)).unwrap();
        assert_eq!(Value::Object(attrs), json!({"type": "cpu", "domain_id": domain}));

        let attrs = import_attributes("memory-ops").unwrap();
        assert_eq!(Value::Object(attrs), json!({"type": "memory", "account": "ops"}));

        let attrs = import_attributes("lab/volume").unwrap();
        assert_eq!(Value::Object(attrs), json!({"type": "volume", "project": "lab"}));

        let attrs = import_attributes("lab/volume-lab").unwrap();
        assert_eq!(Value::Object(attrs), json!({"type": "volume", "project": "lab"}));

        let attrs = import_attributes("vpc-global").unwrap();
        assert_eq!(Value::Object(attrs), json!({"type": "vpc"}));

        assert!(import_attributes("gpu-ops").is_err());
        assert!(import_attributes("lab/cpu-ops").is_err());
    }
}
