//! Aha! resources, as returned by `/api/v1`.
//!
//! Only the fields this crate reads are declared; everything else in the
//! vendor payload is ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Description {
    pub id: String,
    pub body: String,
    pub created_at: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub download_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub content_type: String,
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: String,
    pub reference_prefix: String,
    pub name: String,
    pub product_line: bool,
    pub created_at: String,
    pub updated_at: String,
    pub url: String,
    pub resource: String,
    pub screen_definitions: Vec<ScreenDefinition>,
}

/// A product screen, listing the custom fields shown for one record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenDefinition {
    pub id: String,
    pub screenable_type: String,
    pub name: String,
    pub custom_field_definitions: Vec<CustomFieldDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldDefinition {
    pub id: String,
    pub key: String,
    pub position: i64,
    pub name: String,
    /// Rails class name, e.g. `CustomFieldDefinitions::SelectConstant`.
    #[serde(rename = "type")]
    pub field_type: String,
    pub api_type: String,
    pub required: bool,
    pub options: Vec<FieldOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOption {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomField {
    pub key: String,
    pub name: String,
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl CustomField {
    /// String value, `""` for null.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            serde_json::Value::Null => Some(""),
            serde_json::Value::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomObjectLink {
    pub key: String,
    pub name: String,
    pub record_type: String,
    pub record_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowStatus {
    pub id: String,
    pub name: String,
    pub position: i64,
    pub complete: bool,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowKind {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationField {
    pub id: String,
    pub name: String,
    pub value: serde_json::Value,
    pub integration_id: String,
    pub service_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub reference_num: String,
    pub position: i64,
    pub score: i64,
    pub created_at: String,
    pub updated_at: String,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub product_id: String,
    pub progress: serde_json::Value,
    pub progress_source: String,
    pub workflow_kind: Option<WorkflowKind>,
    pub workflow_status: Option<WorkflowStatus>,
    pub description: Option<Description>,
    pub attachments: Vec<Attachment>,
    pub integration_fields: Vec<IntegrationField>,
    pub url: String,
    pub resource: String,
    pub release: Option<Release>,
    pub created_by_user: Option<User>,
    pub assigned_to_user: Option<User>,
    pub requirements: Vec<Requirement>,
    pub comment_count: i64,
    pub tags: Vec<String>,
    pub full_tags: Vec<Tag>,
    pub custom_fields: Vec<CustomField>,
    pub custom_object_links: Vec<CustomObjectLink>,
}

impl Feature {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// The `ghe_url` custom field, if the feature carries one.
    pub fn git_url(&self) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|c| c.key == "ghe_url" && c.field_type == "url")
            .and_then(CustomField::text)
    }

    /// Reads a custom field by display name. Only url, string and note
    /// fields are readable this way; notes come back trimmed.
    pub fn custom_field_value(&self, name: &str) -> Option<String> {
        let field = self.custom_fields.iter().find(|c| c.name == name)?;
        match field.field_type.as_str() {
            "url" | "string" => field.text().map(str::to_string),
            "note" => field.text().map(|s| s.trim().to_string()),
            other => {
                tracing::warn!("Unknown custom field type {} for {:?}", other, name);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirement {
    pub id: String,
    pub name: String,
    pub reference_num: String,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
    pub release_id: String,
    pub workflow_status: Option<WorkflowStatus>,
    pub url: String,
    pub resource: String,
    pub custom_fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Release {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reference_num: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub parking_lot: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub product_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomObjectRecord {
    pub id: String,
    pub product_id: String,
    pub key: String,
    pub created_at: String,
    pub updated_at: String,
    pub custom_fields: Vec<CustomField>,
    pub custom_object_links: Vec<CustomObjectLink>,
}
