//! The provider registry: maps type names to resource and data source
//! implementations and owns the configured API client.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::cloudstack::CloudStackClient;
use crate::config::ProviderConfig;
use crate::data_sources;
use crate::error::{Context, ProviderError, Result};
use crate::resource::{DataSource, Resource};
use crate::resources;
use crate::schema::{Attribute, Schema};

pub const PROVIDER_NAME: &str = "cloudstack";

pub struct CloudStackProvider {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    client: Option<CloudStackClient>,
}

impl Default for CloudStackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudStackProvider {
    /// A provider without credentials: enough for schema, validate and plan.
    pub fn new() -> Self {
        Self {
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            client: None,
        }
    }

    /// Resolves the provider settings and builds the API client.
    pub fn configure(config: &ProviderConfig) -> Result<Self> {
        let client_config = config.resolve()?;
        tracing::debug!(config = ?client_config, "configuring provider");
        let client = CloudStackClient::new(client_config)
            .context(|| "configuring the CloudStack client".to_string())?;

        Ok(Self {
            client: Some(client),
            ..Self::new()
        })
    }

    pub fn client(&self) -> Result<&CloudStackClient> {
        self.client
            .as_ref()
            .ok_or_else(|| ProviderError::Config("provider is not configured".to_string()))
    }

    pub fn resource(&self, name: &str) -> Result<&dyn Resource> {
        self.resources
            .get(name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(name.to_string()))
    }

    pub fn data_source(&self, name: &str) -> Result<&dyn DataSource> {
        self.data_sources
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownDataSource(name.to_string()))
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    pub fn data_source_types(&self) -> Vec<&'static str> {
        self.data_sources.keys().copied().collect()
    }

    /// Every schema the provider exposes, as one JSON document.
    pub fn schema(&self) -> Result<Value> {
        let resource_schemas = self
            .resources
            .iter()
            .map(|(name, r)| Ok((name.to_string(), serde_json::to_value(r.schema())?)))
            .collect::<Result<serde_json::Map<_, _>>>()?;
        let data_source_schemas = self
            .data_sources
            .iter()
            .map(|(name, d)| Ok((name.to_string(), serde_json::to_value(d.schema())?)))
            .collect::<Result<serde_json::Map<_, _>>>()?;

        Ok(json!({
            "provider": serde_json::to_value(provider_schema())?,
            "resource_schemas": resource_schemas,
            "data_source_schemas": data_source_schemas,
        }))
    }
}

/// The provider block's own arguments.
pub fn provider_schema() -> Schema {
    let explicit = &["config"];
    Schema::new()
        .attr("api_url", Attribute::optional_string().conflicts_with(explicit))
        .attr("api_key", Attribute::optional_string().sensitive().conflicts_with(explicit))
        .attr("secret_key", Attribute::optional_string().sensitive().conflicts_with(explicit))
        .attr("config", Attribute::optional_string())
        .attr("profile", Attribute::optional_string())
        .attr("http_get_only", Attribute::optional_bool().default(false))
        .attr("timeout", Attribute::optional_int().default(900))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_lookup() {
        let provider = CloudStackProvider::new();
        let network = provider.resource("cloudstack_network").unwrap();
        assert_eq!(network.type_name(), "cloudstack_network");
    }

    #[test]
    fn test_unknown_resource() {
        let provider = CloudStackProvider::new();
        match provider.resource("cloudstack_unicorn") {
            Err(ProviderError::UnknownResource(name)) => assert_eq!(name, "cloudstack_unicorn"),
            _ => panic!("expected UnknownResource error"),
        }
    }

    #[test]
    fn test_unknown_data_source() {
        let provider = CloudStackProvider::new();
        assert!(matches!(
            provider.data_source("cloudstack_firewall"),
            Err(ProviderError::UnknownDataSource(_))
        ));
    }

    #[test]
    fn test_type_lists() {
        let provider = CloudStackProvider::new();
        let resources = provider.resource_types();
        assert_eq!(resources.len(), 45);
        assert!(resources.contains(&"cloudstack_instance"));
        assert!(resources.contains(&"cloudstack_vpn_connection"));

        let data_sources = provider.data_source_types();
        assert_eq!(data_sources.len(), 17);
        assert!(data_sources.contains(&"cloudstack_template"));
    }

    #[test]
    fn test_unconfigured_provider_has_no_client() {
        let provider = CloudStackProvider::new();
        assert!(matches!(provider.client(), Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_configure_builds_client() {
        let config = ProviderConfig {
            api_url: Some("http://localhost:8080/client/api".into()),
            api_key: Some("key".into()),
            secret_key: Some("secret".into()),
            ..Default::default()
        };
        let provider = CloudStackProvider::configure(&config).unwrap();
        assert_eq!(
            provider.client().unwrap().api_url(),
            "http://localhost:8080/client/api"
        );
    }

    #[test]
    fn test_schema_document() {
        let schema = CloudStackProvider::new().schema().unwrap();
        assert!(schema["provider"]["api_key"]["sensitive"].as_bool().unwrap());
        assert!(schema["resource_schemas"]["cloudstack_network"]["name"].is_object());
        assert!(schema["data_source_schemas"]["cloudstack_zone"]["filter"].is_object());
    }
}
