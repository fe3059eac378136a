use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct User {
    account: String,
    email: String,
    firstname: String,
    lastname: String,
    username: String,
    domainid: String,
}

/// `cloudstack_user`: a user inside an existing account.
pub struct UserResource;

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_user"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("account", Attribute::required_string().force_new())
            .attr("email", Attribute::required_string())
            .attr("first_name", Attribute::required_string())
            .attr("last_name", Attribute::required_string())
            .attr("password", Attribute::required_string().sensitive())
            .attr("username", Attribute::required_string())
            .attr("domain_id", Attribute::optional_string().computed().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let username = d.get_str("username").to_string();

        let mut params = Params::new();
        params
            .set("account", d.get_str("account"))
            .set("email", d.get_str("email"))
            .set("firstname", d.get_str("first_name"))
            .set("lastname", d.get_str("last_name"))
            .set("password", d.get_str("password"))
            .set("username", &username)
            .set_nonempty("domainid", d.get_str("domain_id"));

        let response = client
            .execute("createUser", &params)
            .await
            .context(|| format!("creating user {}", username))?;
        let id = extract_id("createUser", &response, "user")
            .context(|| format!("creating user {}", username))?;

        tracing::info!(id = %id, username = %username, "user created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let user: Option<User> = client
            .get_by_id("listUsers", "user", d.id(), &Params::from([("listall", "true")]))
            .await
            .context(|| format!("retrieving user {}", d.id()))?;

        let Some(user) = user else {
            mark_gone(d, "user");
            return Ok(());
        };

        d.set("account", user.account);
        d.set("email", user.email);
        d.set("first_name", user.firstname);
        d.set("last_name", user.lastname);
        d.set("username", user.username);
        d.set("domain_id", user.domainid);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let changed = ["email", "first_name", "last_name", "password", "username"];
        if changed.iter().any(|k| d.has_change(k)) {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("email", d.get_str("email"))
                .set("firstname", d.get_str("first_name"))
                .set("lastname", d.get_str("last_name"))
                .set("username", d.get_str("username"));
            if d.has_change("password") {
                params.set("password", d.get_str("password"));
            }
            client
                .execute("updateUser", &params)
                .await
                .context(|| format!("updating user {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteUser", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting user {}", d.id()))
    }
}
