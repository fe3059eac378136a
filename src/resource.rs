use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::cloudstack::CloudStackClient;
use crate::error::{ProviderError, Result};
use crate::schema::Schema;

pub use crate::terraform::state::{AttributeReader, ResourceData};

/// A managed CloudStack object with the full create/read/update/delete
/// lifecycle.
///
/// `read` clears the id when the object no longer exists; `delete` treats an
/// already-missing object as deleted.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `cloudstack_network`. Must match the registry key.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()>;

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()>;

    /// Resources whose arguments are all ForceNew never see an update; the
    /// default just refreshes.
    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()>;

    /// Imports an existing object by id. Resources with a `project`
    /// argument also accept `<project>/<id>`.
    async fn import(&self, client: &CloudStackClient, id: &str) -> Result<ResourceData> {
        let (project, object_id) = split_import_id(&self.schema(), id);

        let mut attributes = Map::new();
        if let Some(project) = project {
            attributes.insert("project".to_string(), Value::String(project.to_string()));
        }

        let mut d = ResourceData::from_state(object_id, attributes);
        self.read(client, &mut d).await?;

        if d.is_gone() {
            return Err(ProviderError::not_found(self.type_name(), id));
        }
        Ok(d)
    }
}

/// A read-only lookup whose result is written into its own attributes.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()>;
}

fn split_import_id<'a>(schema: &Schema, id: &'a str) -> (Option<&'a str>, &'a str) {
    if schema.get("project").is_some() {
        if let Some((project, rest)) = id.split_once('/') {
            return (Some(project), rest);
        }
    }
    (None, id)
}
