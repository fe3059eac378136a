//! The generic list-and-filter data source every catalog entry is built on.

use async_trait::async_trait;
use serde_json::Value;

use crate::cloudstack::{CloudStackClient, Params, Tag, tags_to_map};
use crate::error::{Context, ProviderError, Result};
use crate::filters;
use crate::resolve;
use crate::resource::{AttributeReader, DataSource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Bool,
}

/// A computed attribute copied from the selected API object. `api` is a
/// top-level field name, or a JSON pointer when it starts with `/`.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub attr: &'static str,
    pub api: &'static str,
    pub field_type: FieldType,
}

pub const fn string(attr: &'static str, api: &'static str) -> Field {
    Field { attr, api, field_type: FieldType::String }
}

pub const fn int(attr: &'static str, api: &'static str) -> Field {
    Field { attr, api, field_type: FieldType::Int }
}

pub const fn boolean(attr: &'static str, api: &'static str) -> Field {
    Field { attr, api, field_type: FieldType::Bool }
}

/// An extra argument passed through to the list command.
#[derive(Debug, Clone, Copy)]
pub struct Argument {
    pub attr: &'static str,
    pub param: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ListDataSource {
    pub type_name: &'static str,
    pub kind: &'static str,
    pub command: &'static str,
    pub key: &'static str,
    /// Send `listall=true` so objects of other accounts are visible.
    pub list_all: bool,
    pub project: bool,
    pub tags: bool,
    pub arguments: &'static [Argument],
    pub fields: &'static [Field],
}

impl Field {
    fn lookup<'a>(&self, item: &'a Value) -> Option<&'a Value> {
        if self.api.starts_with('/') {
            item.pointer(self.api)
        } else {
            item.get(self.api)
        }
    }

    /// Converts the API value, accepting numbers and booleans CloudStack
    /// sometimes sends as strings.
    fn value(&self, item: &Value) -> Value {
        let raw = self.lookup(item);
        match self.field_type {
            FieldType::String => match raw {
                Some(Value::String(s)) => Value::String(s.clone()),
                Some(Value::Null) | None => Value::String(String::new()),
                Some(other) => Value::String(other.to_string()),
            },
            FieldType::Int => {
                let n = match raw {
                    Some(Value::Number(n)) => n.as_i64(),
                    Some(Value::String(s)) => s.parse().ok(),
                    _ => None,
                };
                Value::from(n.unwrap_or_default())
            }
            FieldType::Bool => {
                let b = match raw {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::String(s)) => s == "true",
                    _ => false,
                };
                Value::Bool(b)
            }
        }
    }
}

impl ListDataSource {
    fn params(&self, d: &ResourceData) -> Params {
        let mut params = Params::new();
        if self.list_all {
            params.set("listall", true);
        }
        for arg in self.arguments {
            params.set_nonempty(arg.param, d.get_str(arg.attr));
        }
        params
    }
}

#[async_trait]
impl DataSource for ListDataSource {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::new().attr("filter", filters::filter_attribute());
        for arg in self.arguments {
            let attr = if arg.required {
                Attribute::required_string()
            } else {
                Attribute::optional_string()
            };
            schema = schema.attr(arg.attr, attr);
        }
        for field in self.fields {
            let attr = match field.field_type {
                FieldType::String => Attribute::computed_string(),
                FieldType::Int => Attribute::computed_int(),
                FieldType::Bool => Attribute::computed_bool(),
            };
            schema = schema.attr(field.attr, attr);
        }
        if self.project {
            schema = schema.attr("project", Attribute::optional_string());
        }
        if self.tags {
            schema = schema.attr("tags", Attribute::computed_map());
        }
        schema
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let filters = filters::parse(d)?;
        let mut params = self.params(d);
        if self.project {
            resolve::set_project_id(client, d, &mut params).await?;
        }

        let items: Vec<Value> = client
            .list(self.command, self.key, &params)
            .await
            .context(|| format!("listing {}s", self.kind))?;
        tracing::debug!(kind = self.kind, count = items.len(), "listed candidates");

        let item = filters::select(self.kind, items, &filters)?;

        let id = item
            .get("id")
            .or_else(|| item.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Config(format!("selected {} has no id", self.kind)))?;
        d.set_id(id);

        for field in self.fields {
            d.set(field.attr, field.value(&item));
        }
        if self.tags {
            let tags: Vec<Tag> = item
                .get("tags")
                .cloned()
                .and_then(|t| serde_json::from_value(t).ok())
                .unwrap_or_default();
            d.set_string_map("tags", &tags_to_map(&tags));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_conversions() {
        let item = json!({
            "name": "web",
            "cpunumber": "4",
            "memory": 2048,
            "isready": "true",
            "nic": [{"ipaddress": "10.0.0.7"}]
        });
        assert_eq!(string("name", "name").value(&item), json!("web"));
        assert_eq!(int("cpu_number", "cpunumber").value(&item), json!(4));
        assert_eq!(int("memory", "memory").value(&item), json!(2048));
        assert_eq!(boolean("is_ready", "isready").value(&item), json!(true));
        assert_eq!(string("ip_address", "/nic/0/ipaddress").value(&item), json!("10.0.0.7"));
        assert_eq!(string("missing", "nothing").value(&item), json!(""));
    }

    #[test]
    fn test_schema_includes_arguments_and_fields() {
        const ARGS: &[Argument] = &[Argument { attr: "template_filter", param: "templatefilter", required: true }];
        const FIELDS: &[Field] = &[string("name", "name")];
        let ds = ListDataSource {
            type_name: "cloudstack_template",
            kind: "template",
            command: "listTemplates",
            key: "template",
            list_all: false,
            project: true,
            tags: true,
            arguments: ARGS,
            fields: FIELDS,
        };
        let schema = ds.schema();
        assert!(schema.get("template_filter").is_some_and(|a| a.required));
        assert!(schema.get("filter").is_some());
        assert!(schema.get("name").is_some_and(|a| a.is_computed_only()));
        assert!(schema.get("project").is_some());
        assert!(schema.get("tags").is_some());
    }
}
