use std::collections::BTreeSet;

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
struct LoadBalancerRule {
    name: String,
    description: String,
    publicipid: String,
    networkid: String,
    algorithm: String,
    privateport: String,
    publicport: String,
    protocol: String,
    project: String,
    projectid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuleInstance {
    id: String,
}

/// `cloudstack_loadbalancer_rule`: a load balancer on a public IP and the
/// instances behind it.
pub struct LoadBalancerRuleResource;

impl LoadBalancerRuleResource {
    async fn change_members(
        &self,
        client: &CloudStackClient,
        id: &str,
        command: &str,
        members: &BTreeSet<String>,
    ) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let members: Vec<&str> = members.iter().map(String::as_str).collect();
        let mut params = Params::from([("id", id)]);
        params.set_list("virtualmachineids", &members);
        client
            .execute_async(command, &params)
            .await
            .context(|| format!("changing members of load balancer rule {}", id))?;
        Ok(())
    }
}

#[async_trait]
impl Resource for LoadBalancerRuleResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_loadbalancer_rule"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("description", Attribute::optional_string().computed())
            .attr("ip_address_id", Attribute::required_string().force_new())
            .attr("network_id", Attribute::optional_string().computed().force_new())
            .attr("algorithm", Attribute::required_string())
            .attr("private_port", Attribute::required_int().force_new())
            .attr("public_port", Attribute::required_int().force_new())
            .attr("protocol", Attribute::optional_string().computed().force_new())
            .attr("member_ids", Attribute::required_string_set())
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("description", d.get_opt_str("description").unwrap_or(&name))
            .set("publicipid", d.get_str("ip_address_id"))
            .set("algorithm", d.get_str("algorithm"))
            .set("privateport", d.get_int("private_port"))
            .set("publicport", d.get_int("public_port"))
            .set("openfirewall", false)
            .set_nonempty("networkid", d.get_str("network_id"))
            .set_nonempty("protocol", d.get_str("protocol"));

        let result = client
            .execute_async("createLoadBalancerRule", &params)
            .await
            .context(|| format!("creating load balancer rule {}", name))?;
        let id = extract_id("createLoadBalancerRule", &result, "loadbalancer")
            .context(|| format!("creating load balancer rule {}", name))?;
        d.set_id(id.clone());

        let members: BTreeSet<String> = d.get_string_list("member_ids").into_iter().collect();
        self.change_members(client, &id, "assignToLoadBalancerRule", &members)
            .await?;

        tracing::info!(id = %id, name = %name, "load balancer rule created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let rule: Option<LoadBalancerRule> = client
            .get_by_id("listLoadBalancerRules", "loadbalancerrule", d.id(), &params)
            .await
            .context(|| format!("retrieving load balancer rule {}", d.id()))?;

        let Some(rule) = rule else {
            mark_gone(d, "load balancer rule");
            return Ok(());
        };

        let mut member_params = Params::from([("id", d.id())]);
        member_params.set("listall", true);
        let members: Vec<RuleInstance> = client
            .list(
                "listLoadBalancerRuleInstances",
                "loadbalancerruleinstance",
                &member_params,
            )
            .await
            .context(|| format!("retrieving members of load balancer rule {}", d.id()))?;

        d.set("name", rule.name);
        d.set("description", rule.description);
        d.set("ip_address_id", rule.publicipid);
        d.set("network_id", rule.networkid);
        d.set("algorithm", rule.algorithm);
        d.set("private_port", rule.privateport.parse::<i64>().unwrap_or_default());
        d.set("public_port", rule.publicport.parse::<i64>().unwrap_or_default());
        d.set("protocol", rule.protocol);
        d.set(
            "member_ids",
            members.into_iter().map(|m| m.id).collect::<Vec<_>>(),
        );
        resolve::set_project(d, &rule.project, &rule.projectid);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();

        if d.has_change("name") || d.has_change("description") || d.has_change("algorithm") {
            let mut params = Params::from([("id", id.as_str())]);
            params
                .set("name", d.get_str("name"))
                .set_nonempty("description", d.get_str("description"))
                .set("algorithm", d.get_str("algorithm"));
            client
                .execute_async("updateLoadBalancerRule", &params)
                .await
                .context(|| format!("updating load balancer rule {}", id))?;
        }

        if d.has_change("member_ids") {
            let (old, new) = d.change("member_ids");
            let as_set = |v: &serde_json::Value| -> BTreeSet<String> {
                v.as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|i| i.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default()
            };
            let (old, new) = (as_set(&old), as_set(&new));
            let removed: BTreeSet<String> = old.difference(&new).cloned().collect();
            let added: BTreeSet<String> = new.difference(&old).cloned().collect();

            self.change_members(client, &id, "removeFromLoadBalancerRule", &removed)
                .await?;
            self.change_members(client, &id, "assignToLoadBalancerRule", &added)
                .await?;
        }

        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteLoadBalancerRule", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting load balancer rule {}", d.id()))
    }
}
