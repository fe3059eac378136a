use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Domain {
    name: String,
    networkdomain: String,
    parentdomainid: String,
    path: String,
}

pub struct DomainResource;

#[async_trait]
impl Resource for DomainResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_domain"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("domain_id", Attribute::optional_string().computed().force_new())
            .attr("network_domain", Attribute::optional_string())
            .attr("parent_domain_id", Attribute::optional_string().computed().force_new())
            .attr("path", Attribute::computed_string())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set_nonempty("domainid", d.get_str("domain_id"))
            .set_nonempty("networkdomain", d.get_str("network_domain"))
            .set_nonempty("parentdomainid", d.get_str("parent_domain_id"));

        let response = client
            .execute("createDomain", &params)
            .await
            .context(|| format!("creating domain {}", name))?;
        let id = extract_id("createDomain", &response, "domain")
            .context(|| format!("creating domain {}", name))?;

        tracing::info!(id = %id, name = %name, "domain created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let domain: Option<Domain> = client
            .get_by_id("listDomains", "domain", d.id(), &Params::from([("listall", "true")]))
            .await
            .context(|| format!("retrieving domain {}", d.id()))?;

        let Some(domain) = domain else {
            mark_gone(d, "domain");
            return Ok(());
        };

        d.set("domain_id", d.id().to_string());
        d.set("name", domain.name);
        d.set("network_domain", domain.networkdomain);
        d.set("parent_domain_id", domain.parentdomainid);
        d.set("path", domain.path);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") || d.has_change("network_domain") {
            let mut params = Params::new();
            params
                .set("id", d.id())
                .set("name", d.get_str("name"))
                .set_nonempty("networkdomain", d.get_str("network_domain"));
            client
                .execute("updateDomain", &params)
                .await
                .context(|| format!("updating domain {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("id", d.id())]);
        params.set("cleanup", true);
        ignore_not_found(client.execute_async("deleteDomain", &params).await)
            .context(|| format!("deleting domain {}", d.id()))
    }
}
