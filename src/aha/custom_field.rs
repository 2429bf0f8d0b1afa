//! Reading and writing Aha! feature custom fields by name.
//!
//! A field is located through the product's `Feature` screen definitions,
//! by display name or key. The definition's type decides where the value
//! lives on the feature and what an update body looks like. Planning is
//! pure; [`crate::aha::AhaClient::custom_field`] sends the resulting update.

use crate::aha::model::{CustomFieldDefinition, Feature, Product};
use crate::utils::error::{HubError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const TYPE_PREFIX: &str = "CustomFieldDefinitions::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAction {
    Get,
    Set,
    Compare,
    Remove,
}

impl FromStr for FieldAction {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(FieldAction::Get),
            "SET" => Ok(FieldAction::Set),
            "COMPARE" => Ok(FieldAction::Compare),
            "REMOVE" => Ok(FieldAction::Remove),
            _ => Err(HubError::UnexpectedValue {
                field: "action".to_string(),
                message: format!("{:?} is not one of GET, SET, COMPARE, REMOVE", s),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Url,
    /// `TextField` and `NoteField`; both are plain strings on the wire.
    Text,
    SelectConstant,
    SelectMultipleConstant,
    LinkMany,
}

impl FieldKind {
    /// Maps a definition's Rails type name to a kind. Unknown types yield `None`.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let name = type_name.strip_prefix(TYPE_PREFIX)?;
        if name.starts_with("UrlField") {
            Some(FieldKind::Url)
        } else if name.starts_with("TextField") || name.starts_with("NoteField") {
            Some(FieldKind::Text)
        } else if name.starts_with("SelectMultipleConstant") {
            Some(FieldKind::SelectMultipleConstant)
        } else if name.starts_with("SelectConstant") {
            Some(FieldKind::SelectConstant)
        } else if name.starts_with("LinkMany") {
            Some(FieldKind::LinkMany)
        } else {
            None
        }
    }

    fn accepts_api_type(&self, api_type: &str) -> bool {
        match self {
            FieldKind::Url => api_type == "url",
            FieldKind::Text => api_type == "string" || api_type == "note",
            FieldKind::SelectConstant => api_type == "string",
            FieldKind::SelectMultipleConstant | FieldKind::LinkMany => api_type == "array",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Url => "url",
            FieldKind::Text => "text",
            FieldKind::SelectConstant => "select",
            FieldKind::SelectMultipleConstant => "multi-select",
            FieldKind::LinkMany => "record links",
        };
        f.write_str(name)
    }
}

/// What an action resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPlan {
    /// GET result.
    Value(String),
    /// COMPARE result.
    Matches(bool),
    /// SET/REMOVE with nothing to change.
    Unchanged,
    /// SET/REMOVE body for `PUT /api/v1/features/:id`.
    Update(Value),
}

/// What [`crate::aha::AhaClient::custom_field`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Value(String),
    Matches(bool),
    Unchanged,
    /// The update was sent and the feature replaced by the vendor's copy.
    Updated,
}

/// Resolves `action` on the custom field called `name` (display name or key).
pub fn plan(
    product: &Product,
    feature: &Feature,
    name: &str,
    action: FieldAction,
    value: &str,
) -> Result<FieldPlan> {
    let value = value.trim();

    let definitions = product
        .screen_definitions
        .iter()
        .filter(|sd| sd.screenable_type == "Feature")
        .flat_map(|sd| sd.custom_field_definitions.iter())
        .filter(|def| def.name == name || def.key == name);

    for def in definitions {
        let Some(kind) = FieldKind::from_type_name(&def.field_type) else {
            tracing::warn!(
                "Skipping custom field {:?}: unsupported type {} / {}",
                name,
                def.field_type,
                def.api_type
            );
            continue;
        };

        if !kind.accepts_api_type(&def.api_type) {
            return Err(HubError::UnsupportedField {
                name: name.to_string(),
                kind: format!("{} stored as {:?}", kind, def.api_type),
            });
        }

        tracing::debug!(
            "{}: {:?} {} field {:?} ({})",
            feature.reference_num,
            action,
            kind,
            def.key,
            value
        );

        return match kind {
            FieldKind::Url | FieldKind::Text => plan_text(feature, def, action, value),
            FieldKind::SelectConstant => plan_select(feature, def, action, value),
            FieldKind::SelectMultipleConstant => plan_multi_select(feature, def, action, value),
            FieldKind::LinkMany => plan_links(feature, def, action, value),
        };
    }

    Err(HubError::NotFound {
        what: "custom field",
        name: name.to_string(),
    })
}

fn plan_text(
    feature: &Feature,
    def: &CustomFieldDefinition,
    action: FieldAction,
    value: &str,
) -> Result<FieldPlan> {
    let current = current_text(feature, def)?;

    Ok(match action {
        FieldAction::Get => FieldPlan::Value(current),
        FieldAction::Compare => FieldPlan::Matches(current == value),
        FieldAction::Set if current == value => FieldPlan::Unchanged,
        FieldAction::Set => FieldPlan::Update(custom_fields_body(&def.key, Value::from(value))),
        FieldAction::Remove if is_absent(&current, value) => FieldPlan::Unchanged,
        FieldAction::Remove => FieldPlan::Update(custom_fields_body(&def.key, Value::from(""))),
    })
}

fn plan_select(
    feature: &Feature,
    def: &CustomFieldDefinition,
    action: FieldAction,
    value: &str,
) -> Result<FieldPlan> {
    let current = current_text(feature, def)?;

    Ok(match action {
        FieldAction::Get => FieldPlan::Value(current),
        FieldAction::Compare => FieldPlan::Matches(current == value),
        FieldAction::Set => {
            // Writes send the option id, reads return the label.
            let id = if value.is_empty() {
                String::new()
            } else {
                option_id(def, value)?.to_string()
            };
            if current == value {
                FieldPlan::Unchanged
            } else {
                FieldPlan::Update(custom_fields_body(&def.key, Value::from(id)))
            }
        }
        FieldAction::Remove if is_absent(&current, value) => FieldPlan::Unchanged,
        FieldAction::Remove => FieldPlan::Update(custom_fields_body(&def.key, Value::from(""))),
    })
}

fn plan_multi_select(
    feature: &Feature,
    def: &CustomFieldDefinition,
    action: FieldAction,
    value: &str,
) -> Result<FieldPlan> {
    let mut values = current_list(feature, def)?;
    let present = values.iter().any(|v| v == value);

    let updated = match action {
        FieldAction::Get => return Ok(FieldPlan::Value(values.join(","))),
        FieldAction::Compare if value.is_empty() => return Ok(FieldPlan::Matches(values.is_empty())),
        FieldAction::Compare => return Ok(FieldPlan::Matches(present)),
        FieldAction::Set | FieldAction::Remove if value.is_empty() => {
            if values.is_empty() {
                return Ok(FieldPlan::Unchanged);
            }
            Vec::new()
        }
        FieldAction::Set if present => return Ok(FieldPlan::Unchanged),
        FieldAction::Set => {
            values.push(value.to_string());
            values
        }
        FieldAction::Remove if !present => return Ok(FieldPlan::Unchanged),
        FieldAction::Remove => {
            values.retain(|v| v != value);
            values
        }
    };

    // An empty list is cleared with null.
    let body = if updated.is_empty() {
        Value::Null
    } else {
        Value::from(updated)
    };
    Ok(FieldPlan::Update(custom_fields_body(&def.key, body)))
}

fn plan_links(
    feature: &Feature,
    def: &CustomFieldDefinition,
    action: FieldAction,
    value: &str,
) -> Result<FieldPlan> {
    let labels: HashMap<&str, &str> = def
        .options
        .iter()
        .map(|opt| (opt.id.as_str(), opt.label.trim()))
        .collect();

    let target = if value.is_empty() {
        None
    } else {
        Some(option_id(def, value)?)
    };

    let mut record_ids: Vec<String> = feature
        .custom_object_links
        .iter()
        .find(|link| link.key == def.key)
        .map(|link| {
            link.record_ids
                .iter()
                .filter(|id| !id.is_empty())
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let label_of = |id: &str| -> String { labels.get(id).copied().unwrap_or(id).to_string() };
    let present = record_ids.iter().any(|id| label_of(id) == value);

    let updated = match (action, target) {
        (FieldAction::Get, _) => {
            let mut names: Vec<String> = record_ids.iter().map(|id| label_of(id)).collect();
            names.sort();
            return Ok(FieldPlan::Value(names.join(",")));
        }
        (FieldAction::Compare, None) => return Ok(FieldPlan::Matches(record_ids.is_empty())),
        (FieldAction::Compare, Some(_)) => return Ok(FieldPlan::Matches(present)),
        (FieldAction::Set | FieldAction::Remove, None) => {
            if record_ids.is_empty() {
                return Ok(FieldPlan::Unchanged);
            }
            Vec::new()
        }
        (FieldAction::Set, Some(_)) if present => return Ok(FieldPlan::Unchanged),
        (FieldAction::Set, Some(id)) => {
            record_ids.push(id.to_string());
            record_ids
        }
        (FieldAction::Remove, Some(_)) if !present => return Ok(FieldPlan::Unchanged),
        (FieldAction::Remove, Some(_)) => {
            record_ids.retain(|id| label_of(id) != value);
            record_ids
        }
    };

    // Aha! only erases every link when handed a single empty id.
    let ids = if updated.is_empty() {
        vec![String::new()]
    } else {
        updated
    };

    let mut links = Map::new();
    links.insert(def.key.clone(), Value::from(ids));
    Ok(FieldPlan::Update(feature_body("custom_object_links", links)))
}

/// REMOVE is a no-op when the field is already empty, or when a specific
/// value was named and the field holds something else.
fn is_absent(current: &str, value: &str) -> bool {
    current.is_empty() || (!value.is_empty() && current != value)
}

fn option_id<'a>(def: &'a CustomFieldDefinition, label: &str) -> Result<&'a str> {
    def.options
        .iter()
        .find(|opt| opt.label.trim() == label)
        .map(|opt| opt.id.as_str())
        .ok_or_else(|| HubError::InvalidOption {
            field: def.name.clone(),
            value: label.to_string(),
        })
}

fn current_text(feature: &Feature, def: &CustomFieldDefinition) -> Result<String> {
    let Some(field) = feature.custom_fields.iter().find(|cf| cf.key == def.key) else {
        return Ok(String::new());
    };

    field
        .text()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HubError::UnexpectedValue {
            field: def.key.clone(),
            message: format!("expected a string, got {}", field.value),
        })
}

fn current_list(feature: &Feature, def: &CustomFieldDefinition) -> Result<Vec<String>> {
    let Some(field) = feature
        .custom_fields
        .iter()
        .find(|cf| cf.key == def.key || cf.name == def.name)
    else {
        return Ok(Vec::new());
    };

    match &field.value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| HubError::UnexpectedValue {
                        field: def.key.clone(),
                        message: format!("expected a string entry, got {}", item),
                    })
            })
            .collect(),
        other => Err(HubError::UnexpectedValue {
            field: def.key.clone(),
            message: format!("expected a list, got {}", other),
        }),
    }
}

fn custom_fields_body(key: &str, value: Value) -> Value {
    let mut fields = Map::new();
    fields.insert(key.to_string(), value);
    feature_body("custom_fields", fields)
}

fn feature_body(section: &str, entries: Map<String, Value>) -> Value {
    let mut feature = Map::new();
    feature.insert(section.to_string(), Value::Object(entries));
    let mut body = Map::new();
    body.insert("feature".to_string(), Value::Object(feature));
    Value::Object(body)
}
