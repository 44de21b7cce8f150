pub mod alias;
pub mod schema;

use crate::board::FieldUpdate;
use crate::error::BoardError;
use crate::model::field::{FieldDataType, FieldSchema, FieldValue, ResolvedValue};

pub use alias::FieldAliasMap;
pub use schema::SchemaCache;

/// Read-only view of the board schema and configured aliases, passed to
/// everything that turns user input into board identifiers.
#[derive(Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub schema: &'a SchemaCache,
    pub aliases: &'a FieldAliasMap,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(schema: &'a SchemaCache, aliases: &'a FieldAliasMap) -> Self {
        Self { schema, aliases }
    }

    /// Board field name for a user-typed key: a schema field matching
    /// case-insensitively, else the field configured for that alias key.
    pub fn board_field_name(&self, key: &str) -> Option<String> {
        if let Some(field) = self.schema.field(key) {
            return Some(field.name.clone());
        }
        self.aliases.board_field_for_key(key).map(String::from)
    }

    pub fn field(&self, name: &str) -> Result<&'a FieldSchema, BoardError> {
        self.schema
            .field(name)
            .ok_or_else(|| BoardError::SchemaNotFound {
                field: name.to_string(),
            })
    }

    /// Turn a user-supplied value into what the board accepts for `field_name`.
    pub fn resolve_value(&self, field_name: &str, value: &str) -> Result<ResolvedValue, BoardError> {
        let field = self.field(field_name)?;
        match field.data_type {
            FieldDataType::SingleSelect => self.resolve_option(field, value),
            FieldDataType::Text => Ok(ResolvedValue::Text(value.to_string())),
            FieldDataType::Number => parse_number_prefix(value)
                .map(ResolvedValue::Number)
                .ok_or_else(|| BoardError::InvalidNumber {
                    field: field.name.clone(),
                    value: value.to_string(),
                }),
            FieldDataType::Other => Err(BoardError::UnsupportedFieldType {
                field: field.name.clone(),
                data_type: field.data_type,
            }),
        }
    }

    fn resolve_option(&self, field: &FieldSchema, value: &str) -> Result<ResolvedValue, BoardError> {
        let found = field
            .option_by_name(value)
            .or_else(|| {
                self.aliases
                    .option_for_alias(&field.name, value)
                    .and_then(|option_name| field.option_by_name(option_name))
            })
            .or_else(|| {
                field
                    .options
                    .iter()
                    .find(|o| o.name.eq_ignore_ascii_case(value))
            });

        match found {
            Some(option) => Ok(ResolvedValue::OptionId {
                id: option.id.clone(),
                name: option.name.clone(),
            }),
            None => Err(BoardError::OptionNotFound {
                field: field.name.clone(),
                value: value.to_string(),
            }),
        }
    }

    /// Current value rendered with its alias, e.g. `P1 (p1)`.
    pub fn describe_value(&self, field_name: &str, value: &FieldValue) -> String {
        match value {
            FieldValue::Absent => "(none)".to_string(),
            FieldValue::SingleSelect { name, .. } => {
                match self.aliases.alias_for_option(field_name, name) {
                    Some(alias) if alias != name => format!("{name} ({alias})"),
                    _ => name.clone(),
                }
            }
            other => other.display(),
        }
    }
}

impl From<ResolvedValue> for FieldUpdate {
    fn from(value: ResolvedValue) -> Self {
        match value {
            ResolvedValue::OptionId { id, .. } => FieldUpdate::SingleSelect(id),
            ResolvedValue::Text(text) => FieldUpdate::Text(text),
            ResolvedValue::Number(n) => FieldUpdate::Number(n),
        }
    }
}

/// Leading number in inputs like `3pts` or `2.5h`.
pub fn parse_number_prefix(value: &str) -> Option<f64> {
    let value = value.trim();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    value[..end].parse().ok()
}
