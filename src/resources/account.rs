use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Account {
    name: String,
    accounttype: i64,
    roleid: String,
    domainid: String,
}

/// `cloudstack_account`: an account together with its first user.
pub struct AccountResource;

#[async_trait]
impl Resource for AccountResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_account"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("email", Attribute::required_string())
            .attr("first_name", Attribute::required_string())
            .attr("last_name", Attribute::required_string())
            .attr("password", Attribute::required_string().sensitive())
            .attr("username", Attribute::required_string().force_new())
            .attr("account_type", Attribute::required_int().force_new())
            .attr("role_id", Attribute::required_string())
            .attr("account", Attribute::optional_string().computed())
            .attr("domain_id", Attribute::optional_string().computed().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let username = d.get_str("username").to_string();

        let mut params = Params::new();
        params
            .set("email", d.get_str("email"))
            .set("firstname", d.get_str("first_name"))
            .set("lastname", d.get_str("last_name"))
            .set("password", d.get_str("password"))
            .set("username", &username)
            .set("accounttype", d.get_int("account_type"))
            .set("roleid", d.get_str("role_id"))
            .set_nonempty("account", d.get_str("account"))
            .set_nonempty("domainid", d.get_str("domain_id"));

        let response = client
            .execute("createAccount", &params)
            .await
            .context(|| format!("creating account for user {}", username))?;
        let id = extract_id("createAccount", &response, "account")
            .context(|| format!("creating account for user {}", username))?;

        tracing::info!(id = %id, username = %username, "account created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let account: Option<Account> = client
            .get_by_id("listAccounts", "account", d.id(), &Params::from([("listall", "true")]))
            .await
            .context(|| format!("retrieving account {}", d.id()))?;

        let Some(account) = account else {
            mark_gone(d, "account");
            return Ok(());
        };

        d.set("account", account.name);
        d.set("account_type", account.accounttype);
        d.set("role_id", account.roleid);
        d.set("domain_id", account.domainid);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("account") || d.has_change("role_id") {
            let mut params = Params::new();
            params
                .set("id", d.id())
                .set_nonempty("newname", d.get_str("account"))
                .set("roleid", d.get_str("role_id"));
            client
                .execute("updateAccount", &params)
                .await
                .context(|| format!("updating account {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteAccount", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting account {}", d.id()))
    }
}
