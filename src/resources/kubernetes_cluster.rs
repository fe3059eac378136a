use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

const RUNNING: &str = "Running";
const STOPPED: &str = "Stopped";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KubernetesCluster {
    name: String,
    description: String,
    zoneid: String,
    zonename: String,
    kubernetesversionid: String,
    kubernetesversionname: String,
    serviceofferingid: String,
    serviceofferingname: String,
    size: i64,
    controlnodes: i64,
    keypair: String,
    associatednetworkid: String,
    state: String,
    ipaddress: String,
    autoscalingenabled: bool,
    minsize: i64,
    maxsize: i64,
    project: String,
    projectid: String,
}

/// `cloudstack_kubernetes_cluster`: a CKS managed Kubernetes cluster.
pub struct KubernetesClusterResource;

impl KubernetesClusterResource {
    async fn set_running(&self, client: &CloudStackClient, id: &str, running: bool) -> Result<()> {
        let command = if running {
            "startKubernetesCluster"
        } else {
            "stopKubernetesCluster"
        };
        client
            .execute_async(command, &Params::from([("id", id)]))
            .await
            .context(|| format!("changing state of kubernetes cluster {}", id))?;
        Ok(())
    }
}

fn check_state(state: &str) -> Result<bool> {
    match state {
        RUNNING => Ok(true),
        STOPPED => Ok(false),
        other => Err(ProviderError::validation(
            "cloudstack_kubernetes_cluster",
            format!("state must be {} or {}, got '{}'", RUNNING, STOPPED, other),
        )),
    }
}

#[async_trait]
impl Resource for KubernetesClusterResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_kubernetes_cluster"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("description", Attribute::optional_string().computed())
            .attr("zone", Attribute::required_string().force_new())
            .attr("kubernetes_version", Attribute::required_string())
            .attr("service_offering", Attribute::required_string())
            .attr("size", Attribute::optional_int().default(1))
            .attr("control_nodes_size", Attribute::optional_int().default(1).force_new())
            .attr("autoscaling_enabled", Attribute::optional_bool().default(false))
            .attr("min_size", Attribute::optional_int().computed())
            .attr("max_size", Attribute::optional_int().computed())
            .attr("keypair", Attribute::optional_string().force_new())
            .attr("network_id", Attribute::optional_string().computed().force_new())
            .attr("noderootdisksize", Attribute::optional_int().default(20).force_new())
            .attr("state", Attribute::optional_string().default(RUNNING))
            .attr("ip_address", Attribute::computed_string())
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let running = check_state(d.get_str("state"))?;

        let zone_id = resolve::retrieve_id(client, Kind::Zone, d.get_str("zone")).await?;
        let version_id =
            resolve::retrieve_id(client, Kind::KubernetesVersion, d.get_str("kubernetes_version"))
                .await?;
        let offering_id =
            resolve::retrieve_id(client, Kind::ServiceOffering, d.get_str("service_offering"))
                .await?;

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("description", d.get_opt_str("description").unwrap_or(&name))
            .set("zoneid", zone_id)
            .set("kubernetesversionid", version_id)
            .set("serviceofferingid", offering_id)
            .set("size", d.get_int("size"))
            .set("controlnodes", d.get_int("control_nodes_size"))
            .set("noderootdisksize", d.get_int("noderootdisksize"))
            .set_nonempty("keypair", d.get_str("keypair"))
            .set_nonempty("networkid", d.get_str("network_id"));
        resolve::set_project_id(client, d, &mut params).await?;

        let result = client
            .execute_async("createKubernetesCluster", &params)
            .await
            .context(|| format!("creating kubernetes cluster {}", name))?;
        let id = extract_id("createKubernetesCluster", &result, "kubernetescluster")
            .context(|| format!("creating kubernetes cluster {}", name))?;
        d.set_id(id.clone());

        if d.get_bool("autoscaling_enabled") {
            let mut params = Params::from([("id", id.as_str())]);
            params
                .set("autoscalingenabled", true)
                .set_opt("minsize", d.get_opt_int("min_size"))
                .set_opt("maxsize", d.get_opt_int("max_size"));
            client
                .execute_async("scaleKubernetesCluster", &params)
                .await
                .context(|| format!("enabling autoscaling on kubernetes cluster {}", id))?;
        }

        if !running {
            self.set_running(client, &id, false).await?;
        }

        tracing::info!(id = %id, name = %name, "kubernetes cluster created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let cluster: Option<KubernetesCluster> = client
            .get_by_id("listKubernetesClusters", "kubernetescluster", d.id(), &params)
            .await
            .context(|| format!("retrieving kubernetes cluster {}", d.id()))?;

        let Some(cluster) = cluster else {
            mark_gone(d, "kubernetes cluster");
            return Ok(());
        };

        d.set("name", cluster.name);
        d.set("description", cluster.description);
        d.set("size", cluster.size);
        d.set("control_nodes_size", cluster.controlnodes);
        d.set("autoscaling_enabled", cluster.autoscalingenabled);
        d.set("min_size", cluster.minsize);
        d.set("max_size", cluster.maxsize);
        d.set("keypair", cluster.keypair);
        d.set("network_id", cluster.associatednetworkid);
        d.set("state", cluster.state);
        d.set("ip_address", cluster.ipaddress);
        resolve::set_value_or_id(d, "zone", &cluster.zonename, &cluster.zoneid);
        resolve::set_value_or_id(
            d,
            "kubernetes_version",
            &cluster.kubernetesversionname,
            &cluster.kubernetesversionid,
        );
        resolve::set_value_or_id(
            d,
            "service_offering",
            &cluster.serviceofferingname,
            &cluster.serviceofferingid,
        );
        resolve::set_project(d, &cluster.project, &cluster.projectid);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let running = check_state(d.get_str("state"))?;

        if d.has_change("state") && running {
            self.set_running(client, &id, true).await?;
        }

        let scaling = ["service_offering", "size", "autoscaling_enabled", "min_size", "max_size"];
        if scaling.iter().any(|k| d.has_change(k)) {
            let offering_id =
                resolve::retrieve_id(client, Kind::ServiceOffering, d.get_str("service_offering"))
                    .await?;
            let mut params = Params::from([("id", id.as_str())]);
            params
                .set("serviceofferingid", offering_id)
                .set("size", d.get_int("size"))
                .set("autoscalingenabled", d.get_bool("autoscaling_enabled"))
                .set_opt("minsize", d.get_opt_int("min_size"))
                .set_opt("maxsize", d.get_opt_int("max_size"));
            client
                .execute_async("scaleKubernetesCluster", &params)
                .await
                .context(|| format!("scaling kubernetes cluster {}", id))?;
        }

        if d.has_change("kubernetes_version") {
            let version_id =
                resolve::retrieve_id(client, Kind::KubernetesVersion, d.get_str("kubernetes_version"))
                    .await?;
            let mut params = Params::from([("id", id.as_str())]);
            params.set("kubernetesversionid", version_id);
            client
                .execute_async("upgradeKubernetesCluster", &params)
                .await
                .context(|| format!("upgrading kubernetes cluster {}", id))?;
        }

        if d.has_change("state") && !running {
            self.set_running(client, &id, false).await?;
        }

        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteKubernetesCluster", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting kubernetes cluster {}", d.id()))
    }
}
