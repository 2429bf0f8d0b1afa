pub mod client;
pub mod custom_field;
pub mod model;

pub use client::AhaClient;
pub use custom_field::{FieldAction, FieldKind, FieldOutcome, FieldPlan};
pub use model::{CustomField, CustomFieldDefinition, Feature, Product, Release};
