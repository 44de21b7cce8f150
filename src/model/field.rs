use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataType {
    SingleSelect,
    Text,
    Number,
    #[serde(other)]
    Other,
}

impl FieldDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldDataType::SingleSelect => "SINGLE_SELECT",
            FieldDataType::Text => "TEXT",
            FieldDataType::Number => "NUMBER",
            FieldDataType::Other => "OTHER",
        }
    }
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub name: String,
}

/// A custom field as defined on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: String,
    pub name: String,
    pub data_type: FieldDataType,
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

impl FieldSchema {
    pub fn option_by_name(&self, name: &str) -> Option<&FieldOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn option_name(&self, option_id: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.name.as_str())
    }
}

/// The value an item holds for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldValue {
    Text { text: String },
    Number { number: f64 },
    SingleSelect { option_id: String, name: String },
    Absent,
}

impl FieldValue {
    /// Absent, or a text value with nothing but whitespace in it.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Absent => true,
            FieldValue::Text { text } => text.trim().is_empty(),
            FieldValue::Number { .. } | FieldValue::SingleSelect { .. } => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            FieldValue::Text { text } => text.clone(),
            FieldValue::Number { number } => format_number(*number),
            FieldValue::SingleSelect { name, .. } => name.clone(),
            FieldValue::Absent => String::new(),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A value ready to be written to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    OptionId { id: String, name: String },
    Text(String),
    Number(f64),
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::OptionId { name, .. } => f.write_str(name),
            ResolvedValue::Text(text) => f.write_str(text),
            ResolvedValue::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}
