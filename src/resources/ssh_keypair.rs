use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract};
use crate::error::{Context, Result};
use crate::resolve;
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyPair {
    name: String,
    fingerprint: String,
    privatekey: String,
}

/// `cloudstack_ssh_keypair`: registers `public_key`, or lets CloudStack
/// generate a pair and stores the private key. The id is the name.
pub struct SshKeyPairResource;

#[async_trait]
impl Resource for SshKeyPairResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_ssh_keypair"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("public_key", Attribute::optional_string().force_new())
            .attr("private_key", Attribute::computed_string().sensitive())
            .attr("fingerprint", Attribute::computed_string())
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = Params::from([("name", name.as_str())]);
        resolve::set_project_id(client, d, &mut params).await?;

        let key = match d.get_opt_str("public_key") {
            Some(public_key) => {
                params.set("publickey", public_key.trim());
                let response = client
                    .execute("registerSSHKeyPair", &params)
                    .await
                    .context(|| format!("registering SSH key pair {}", name))?;
                extract::<KeyPair>("registerSSHKeyPair", &response, "keypair")
                    .context(|| format!("registering SSH key pair {}", name))?
            }
            None => {
                let response = client
                    .execute("createSSHKeyPair", &params)
                    .await
                    .context(|| format!("creating SSH key pair {}", name))?;
                extract::<KeyPair>("createSSHKeyPair", &response, "keypair")
                    .context(|| format!("creating SSH key pair {}", name))?
            }
        };

        if !key.privatekey.is_empty() {
            d.set("private_key", key.privatekey);
        }

        tracing::info!(name = %name, "SSH key pair created");
        d.set_id(name);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("name", d.id())]);
        resolve::set_project_id(client, d, &mut params).await?;

        let keys: Vec<KeyPair> = client
            .list("listSSHKeyPairs", "sshkeypair", &params)
            .await
            .context(|| format!("retrieving SSH key pair {}", d.id()))?;

        let id = d.id().to_string();
        let Some(key) = keys.into_iter().find(|k| k.name == id) else {
            mark_gone(d, "SSH key pair");
            return Ok(());
        };

        d.set("name", key.name);
        d.set("fingerprint", key.fingerprint);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("name", d.id())]);
        resolve::set_project_id(client, d, &mut params).await?;
        ignore_not_found(client.execute("deleteSSHKeyPair", &params).await)
            .context(|| format!("deleting SSH key pair {}", d.id()))
    }
}
