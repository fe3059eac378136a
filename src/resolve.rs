//! Name to id resolution for arguments that accept either.

use serde::Deserialize;

use crate::cloudstack::{CloudStackClient, Params, is_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, ResourceData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    ServiceOffering,
    DiskOffering,
    NetworkOffering,
    VpcOffering,
    Zone,
    Template,
    OsType,
    Project,
    Domain,
    KubernetesVersion,
}

impl Kind {
    fn command(self) -> &'static str {
        match self {
            Kind::ServiceOffering => "listServiceOfferings",
            Kind::DiskOffering => "listDiskOfferings",
            Kind::NetworkOffering => "listNetworkOfferings",
            Kind::VpcOffering => "listVPCOfferings",
            Kind::Zone => "listZones",
            Kind::Template => "listTemplates",
            Kind::OsType => "listOsTypes",
            Kind::Project => "listProjects",
            Kind::Domain => "listDomains",
            Kind::KubernetesVersion => "listKubernetesSupportedVersions",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Kind::ServiceOffering => "serviceoffering",
            Kind::DiskOffering => "diskoffering",
            Kind::NetworkOffering => "networkoffering",
            Kind::VpcOffering => "vpcoffering",
            Kind::Zone => "zone",
            Kind::Template => "template",
            Kind::OsType => "ostype",
            Kind::Project => "project",
            Kind::Domain => "domain",
            Kind::KubernetesVersion => "kubernetessupportedversion",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Kind::ServiceOffering => "service offering",
            Kind::DiskOffering => "disk offering",
            Kind::NetworkOffering => "network offering",
            Kind::VpcOffering => "VPC offering",
            Kind::Zone => "zone",
            Kind::Template => "template",
            Kind::OsType => "OS type",
            Kind::Project => "project",
            Kind::Domain => "domain",
            Kind::KubernetesVersion => "kubernetes version",
        }
    }

    fn base_params(self, value: &str) -> Params {
        let mut params = Params::new();
        match self {
            Kind::OsType => {
                params.set("description", value);
            }
            Kind::Template => {
                params.set("name", value).set("templatefilter", "executable");
            }
            Kind::KubernetesVersion => {
                params.set("keyword", value);
            }
            Kind::Project => {
                params.set("name", value).set("listall", true);
            }
            _ => {
                params.set("name", value);
            }
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct Named {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

impl Named {
    fn matches(&self, kind: Kind, value: &str) -> bool {
        match kind {
            Kind::OsType => self.description == value,
            _ => self.name == value,
        }
    }
}

/// Returns `value` unchanged when it already is an id, otherwise looks the
/// object up by name.
pub async fn retrieve_id(client: &CloudStackClient, kind: Kind, value: &str) -> Result<String> {
    retrieve_id_with(client, kind, value, &Params::new()).await
}

/// Like [`retrieve_id`] with extra list parameters, e.g. a zone or project
/// scope.
pub async fn retrieve_id_with(
    client: &CloudStackClient,
    kind: Kind,
    value: &str,
    extra: &Params,
) -> Result<String> {
    if is_id(value) {
        return Ok(value.to_string());
    }

    let mut params = kind.base_params(value);
    for (k, v) in extra.iter() {
        params.set(k, v);
    }

    let items: Vec<Named> = client
        .list(kind.command(), kind.key(), &params)
        .await
        .context(|| format!("retrieving ID of {} {}", kind.label(), value))?;

    let mut matches = items.into_iter().filter(|i| i.matches(kind, value));
    match (matches.next(), matches.next()) {
        (Some(found), None) => {
            tracing::debug!(kind = kind.label(), name = value, id = %found.id, "resolved id");
            Ok(found.id)
        }
        (None, _) => Err(ProviderError::not_found(kind.label(), value)),
        (Some(_), Some(_)) => Err(ProviderError::Config(format!(
            "more than one {} named '{}' found, use its id instead",
            kind.label(),
            value
        ))),
    }
}

/// Template lookups are scoped to the zone the template must live in.
pub async fn retrieve_template_id(
    client: &CloudStackClient,
    zone_id: &str,
    value: &str,
) -> Result<String> {
    retrieve_id_with(client, Kind::Template, value, &Params::from([("zoneid", zone_id)])).await
}

/// Adds `projectid` for resources created inside a project.
pub async fn set_project_id(
    client: &CloudStackClient,
    d: &ResourceData,
    params: &mut Params,
) -> Result<()> {
    if let Some(project) = d.get_opt_str("project") {
        let id = retrieve_id(client, Kind::Project, project).await?;
        params.set("projectid", id);
    }
    Ok(())
}

/// Stores `id` when the user configured an id for `key`, else `name`, so
/// refreshes never flip between the two forms.
pub fn set_value_or_id(d: &mut ResourceData, key: &str, name: &str, id: &str) {
    if is_id(d.get_str(key)) {
        d.set(key, id);
    } else {
        d.set(key, name);
    }
}

/// Like [`set_value_or_id`] for `project`, which stays unset outside
/// projects.
pub fn set_project(d: &mut ResourceData, project: &str, project_id: &str) {
    if project_id.is_empty() {
        return;
    }
    set_value_or_id(d, "project", project, project_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_params_per_kind() {
        let params = Kind::Template.base_params("ubuntu");
        assert_eq!(params.get("templatefilter"), Some("executable"));

        let params = Kind::OsType.base_params("Ubuntu 22.04 LTS");
        assert_eq!(params.get("description"), Some("Ubuntu 22.04 LTS"));
        assert!(!params.contains("name"));

        let params = Kind::Project.base_params("web");
        assert_eq!(params.get("listall"), Some("true"));
    }

    #[test]
    fn test_set_value_or_id_keeps_configured_form() {
        let id = "5d7e1b5c-6c3b-4d1e-8a4a-0c2b1d9e0f11";

        let mut by_name = ResourceData::new(
            json!({"service_offering": "Small"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        set_value_or_id(&mut by_name, "service_offering", "Medium", id);
        assert_eq!(by_name.get_str("service_offering"), "Medium");

        let mut by_id = ResourceData::new(json!({"service_offering": id}).as_object().cloned().unwrap());
        set_value_or_id(&mut by_id, "service_offering", "Medium", id);
        assert_eq!(by_id.get_str("service_offering"), id);
    }

    #[test]
    fn test_set_project_skips_empty() {
        let mut d = ResourceData::default();
        set_project(&mut d, "", "");
        assert!(d.get("project").is_none());

        set_project(&mut d, "ops", "p-1");
        assert_eq!(d.get_str("project"), "ops");
    }
}
