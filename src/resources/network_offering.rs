use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

const GUEST_IP_TYPES: [&str; 2] = ["Isolated", "Shared"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NetworkOffering {
    name: String,
    displaytext: String,
    guestiptype: String,
    traffictype: String,
    networkrate: i64,
    specifyvlan: bool,
    specifyipranges: bool,
    conservemode: bool,
    forvpc: bool,
    state: String,
    service: Vec<OfferingService>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OfferingService {
    name: String,
    provider: Vec<ServiceProvider>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceProvider {
    name: String,
}

/// Flattens the offering's service list into `service -> provider`.
fn service_providers(services: &[OfferingService]) -> BTreeMap<String, String> {
    services
        .iter()
        .filter_map(|s| {
            s.provider
                .first()
                .map(|p| (s.name.clone(), p.name.clone()))
        })
        .collect()
}

/// `serviceProviderList[0].service=Dhcp&serviceProviderList[0].provider=VirtualRouter`
fn set_service_providers(params: &mut Params, providers: &BTreeMap<String, String>) {
    for (i, (service, provider)) in providers.iter().enumerate() {
        params
            .set(&format!("serviceProviderList[{}].service", i), service)
            .set(&format!("serviceProviderList[{}].provider", i), provider);
    }
}

pub struct NetworkOfferingResource;

impl NetworkOfferingResource {
    async fn set_state(&self, client: &CloudStackClient, id: &str, enabled: bool) -> Result<()> {
        let mut params = Params::from([("id", id)]);
        params.set("state", if enabled { "Enabled" } else { "Disabled" });
        client
            .execute("updateNetworkOffering", &params)
            .await
            .context(|| format!("changing state of network offering {}", id))?;
        Ok(())
    }
}

#[async_trait]
impl Resource for NetworkOfferingResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_network_offering"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("display_text", Attribute::required_string())
            .attr("guest_ip_type", Attribute::required_string().force_new())
            .attr("traffic_type", Attribute::optional_string().default("Guest").force_new())
            .attr("network_rate", Attribute::optional_int().computed().force_new())
            .attr("specify_vlan", Attribute::optional_bool().default(false).force_new())
            .attr("specify_ip_ranges", Attribute::optional_bool().default(false).force_new())
            .attr("conserve_mode", Attribute::optional_bool().default(false).force_new())
            .attr("for_vpc", Attribute::optional_bool().default(false).force_new())
            .attr("supported_services", Attribute::optional_string_set().computed().force_new())
            .attr("service_provider_list", Attribute::optional_map().computed().force_new())
            .attr("enable", Attribute::optional_bool().default(true))
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let guest_ip_type = d.get_str("guest_ip_type");
        if !GUEST_IP_TYPES.contains(&guest_ip_type) {
            return Err(ProviderError::validation(
                self.type_name(),
                format!("guest_ip_type must be Isolated or Shared, got '{}'", guest_ip_type),
            ));
        }

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("displaytext", d.get_str("display_text"))
            .set("guestiptype", guest_ip_type)
            .set("traffictype", d.get_str("traffic_type"))
            .set("specifyvlan", d.get_bool("specify_vlan"))
            .set("specifyipranges", d.get_bool("specify_ip_ranges"))
            .set("conservemode", d.get_bool("conserve_mode"))
            .set("forvpc", d.get_bool("for_vpc"))
            .set_opt("networkrate", d.get_opt_int("network_rate"))
            .set_list("supportedservices", &d.get_string_list("supported_services"));
        set_service_providers(&mut params, &d.get_string_map("service_provider_list"));

        let response = client
            .execute("createNetworkOffering", &params)
            .await
            .context(|| format!("creating network offering {}", name))?;
        let id = extract_id("createNetworkOffering", &response, "networkoffering")
            .context(|| format!("creating network offering {}", name))?;
        d.set_id(id.clone());

        if d.get_bool("enable") {
            self.set_state(client, &id, true).await?;
        }

        tracing::info!(id = %id, name = %name, "network offering created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let offering: Option<NetworkOffering> = client
            .get_by_id("listNetworkOfferings", "networkoffering", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving network offering {}", d.id()))?;

        let Some(offering) = offering else {
            mark_gone(d, "network offering");
            return Ok(());
        };

        let providers = service_providers(&offering.service);
        d.set("name", offering.name);
        d.set("display_text", offering.displaytext);
        d.set("guest_ip_type", offering.guestiptype);
        d.set("traffic_type", offering.traffictype);
        d.set("network_rate", offering.networkrate);
        d.set("specify_vlan", offering.specifyvlan);
        d.set("specify_ip_ranges", offering.specifyipranges);
        d.set("conserve_mode", offering.conservemode);
        d.set("for_vpc", offering.forvpc);
        d.set("enable", offering.state == "Enabled");
        d.set(
            "supported_services",
            providers.keys().cloned().collect::<Vec<_>>(),
        );
        d.set_string_map("service_provider_list", &providers);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") || d.has_change("display_text") {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set("displaytext", d.get_str("display_text"));
            client
                .execute("updateNetworkOffering", &params)
                .await
                .context(|| format!("updating network offering {}", d.id()))?;
        }
        if d.has_change("enable") {
            self.set_state(client, d.id(), d.get_bool("enable")).await?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteNetworkOffering", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting network offering {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_providers_flatten() {
        let services = vec![
            OfferingService {
                name: "Dhcp".into(),
                provider: vec![ServiceProvider { name: "VirtualRouter".into() }],
            },
            OfferingService { name: "Lb".into(), provider: vec![] },
        ];
        let map = service_providers(&services);
        assert_eq!(map.len(), 1);
        assert_eq!(map["Dhcp"], "VirtualRouter");
    }

    #[test]
    fn test_set_service_providers_indexes() {
        let mut params = Params::new();
        let providers = BTreeMap::from([
            ("Dhcp".to_string(), "VirtualRouter".to_string()),
            ("Dns".to_string(), "VirtualRouter".to_string()),
        ]);
        set_service_providers(&mut params, &providers);
        assert_eq!(params.get("serviceProviderList[0].service"), Some("Dhcp"));
        assert_eq!(params.get("serviceProviderList[1].provider"), Some("VirtualRouter"));
    }
}
