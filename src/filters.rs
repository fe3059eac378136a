//! `filter { name, value }` blocks shared by the data sources.

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::resource::{AttributeReader, ResourceData};
use crate::schema::{Attribute, Schema};

/// Timestamp layout of CloudStack's `created` fields.
const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

pub fn filter_attribute() -> Attribute {
    Attribute::required_block_set(
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("value", Attribute::required_string()),
    )
    .force_new()
}

#[derive(Debug)]
pub struct Filter {
    field: String,
    pattern: Regex,
}

impl Filter {
    pub fn new(name: &str, value: &str) -> Result<Self> {
        let pattern = Regex::new(value).map_err(|e| {
            ProviderError::Config(format!("invalid filter regex '{}': {}", value, e))
        })?;
        // API field names carry no underscores: `display_text` -> `displaytext`.
        Ok(Self {
            field: name.replace('_', ""),
            pattern,
        })
    }

    pub fn matches(&self, item: &Value) -> bool {
        match item.get(&self.field) {
            Some(Value::String(s)) => self.pattern.is_match(s),
            Some(Value::Null) | None => false,
            Some(other) => self.pattern.is_match(&other.to_string()),
        }
    }
}

pub fn parse(d: &ResourceData) -> Result<Vec<Filter>> {
    d.get_blocks("filter")
        .iter()
        .map(|block| Filter::new(block.get_str("name"), block.get_str("value")))
        .collect()
}

/// Keeps the items matching every filter.
pub fn apply(items: Vec<Value>, filters: &[Filter]) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| filters.iter().all(|f| f.matches(item)))
        .collect()
}

/// Picks the most recently created item. Items without a parseable
/// `created` timestamp lose against those with one; ties keep list order.
pub fn latest(items: Vec<Value>) -> Option<Value> {
    let created = |item: &Value| {
        item.get("created")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_str(s, CREATED_FORMAT).ok())
    };

    let mut best: Option<(Option<DateTime<chrono::FixedOffset>>, Value)> = None;
    for item in items {
        let ts = created(&item);
        let replace = match &best {
            None => true,
            Some((best_ts, _)) => ts > *best_ts,
        };
        if replace {
            best = Some((ts, item));
        }
    }
    best.map(|(_, item)| item)
}

/// Filters `items` and selects the single result of a data source.
pub fn select(kind: &str, items: Vec<Value>, filters: &[Filter]) -> Result<Value> {
    let matched = apply(items, filters);
    if matched.is_empty() {
        return Err(ProviderError::not_found(
            kind,
            "no object matches the specified filters",
        ));
    }
    latest(matched).ok_or_else(|| ProviderError::not_found(kind, "no object selected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_strips_underscores() {
        let filter = Filter::new("display_text", "^Ubuntu").unwrap();
        assert!(filter.matches(&json!({"displaytext": "Ubuntu 22.04"})));
        assert!(!filter.matches(&json!({"displaytext": "CentOS"})));
    }

    #[test]
    fn test_filter_matches_non_string_fields() {
        let filter = Filter::new("cpunumber", "^2$").unwrap();
        assert!(filter.matches(&json!({"cpunumber": 2})));

        let filter = Filter::new("isready", "true").unwrap();
        assert!(filter.matches(&json!({"isready": true})));
    }

    #[test]
    fn test_filter_missing_field_never_matches() {
        let filter = Filter::new("name", ".*").unwrap();
        assert!(!filter.matches(&json!({"id": "x"})));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let err = Filter::new("name", "(unclosed").unwrap_err();
        assert!(err.to_string().contains("invalid filter regex"));
    }

    #[test]
    fn test_apply_requires_all_filters() {
        let items = vec![
            json!({"name": "small", "cpunumber": 1}),
            json!({"name": "small-ha", "cpunumber": 2}),
        ];
        let filters = vec![
            Filter::new("name", "^small").unwrap(),
            Filter::new("cpunumber", "2").unwrap(),
        ];
        let matched = apply(items, &filters);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0]["name"], "small-ha");
    }

    #[test]
    fn test_latest_by_created() {
        let items = vec![
            json!({"id": "old", "created": "2023-01-01T10:00:00+0000"}),
            json!({"id": "new", "created": "2024-06-01T10:00:00+0000"}),
            json!({"id": "mid", "created": "2023-12-01T10:00:00+0000"}),
        ];
        assert_eq!(latest(items).unwrap()["id"], "new");
    }

    #[test]
    fn test_latest_without_created_keeps_first() {
        let items = vec![json!({"id": "a"}), json!({"id": "b"})];
        assert_eq!(latest(items).unwrap()["id"], "a");
    }

    #[test]
    fn test_select_errors_when_nothing_matches() {
        let filters = vec![Filter::new("name", "^nothing$").unwrap()];
        let err = select("zone", vec![json!({"name": "zone-1"})], &filters).unwrap_err();
        assert!(err.is_not_found());
    }
}
