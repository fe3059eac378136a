use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StaticRoute {
    cidr: String,
    gatewayid: String,
}

/// `cloudstack_static_route`: a VPC route through a private gateway.
pub struct StaticRouteResource;

#[async_trait]
impl Resource for StaticRouteResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_static_route"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("cidr", Attribute::required_string().force_new())
            .attr("gateway_id", Attribute::required_string().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let cidr = d.get_str("cidr").to_string();

        let mut params = Params::from([("cidr", cidr.as_str())]);
        params.set("gatewayid", d.get_str("gateway_id"));

        let result = client
            .execute_async("createStaticRoute", &params)
            .await
            .context(|| format!("creating static route {}", cidr))?;
        let id = extract_id("createStaticRoute", &result, "staticroute")
            .context(|| format!("creating static route {}", cidr))?;

        tracing::info!(id = %id, cidr = %cidr, "static route created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let route: Option<StaticRoute> = client
            .get_by_id("listStaticRoutes", "staticroute", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving static route {}", d.id()))?;

        let Some(route) = route else {
            mark_gone(d, "static route");
            return Ok(());
        };

        d.set("cidr", route.cidr);
        d.set("gateway_id", route.gatewayid);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteStaticRoute", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting static route {}", d.id()))
    }
}
