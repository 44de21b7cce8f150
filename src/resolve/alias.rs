use std::collections::BTreeMap;

use crate::config::FieldMapping;

/// Configured value aliases, keyed by lowercase logical field key.
///
/// Aliases are kept sorted, so when several aliases name the same option the
/// reverse lookup returns the lexicographically smallest one.
#[derive(Debug, Clone, Default)]
pub struct FieldAliasMap {
    entries: BTreeMap<String, FieldMapping>,
}

impl FieldAliasMap {
    pub fn new(mappings: &BTreeMap<String, FieldMapping>) -> Self {
        let entries = mappings
            .iter()
            .map(|(key, mapping)| (key.to_lowercase(), mapping.clone()))
            .collect();
        Self { entries }
    }

    /// Board field name configured for a logical key such as `priority`.
    pub fn board_field_for_key(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_lowercase())
            .map(|m| m.field.as_str())
            .filter(|f| !f.is_empty())
    }

    /// The mapping for a board field: by lowercased name as key, then by the
    /// configured board field name.
    pub fn entry_for_field(&self, field_name: &str) -> Option<&FieldMapping> {
        self.entries.get(&field_name.to_lowercase()).or_else(|| {
            self.entries
                .values()
                .find(|m| m.field.eq_ignore_ascii_case(field_name))
        })
    }

    /// Option name an alias maps to.
    pub fn option_for_alias(&self, field_name: &str, alias: &str) -> Option<&str> {
        let values = &self.entry_for_field(field_name)?.values;
        values
            .get(alias)
            .or_else(|| values.get(&alias.to_lowercase()))
            .map(String::as_str)
    }

    pub fn alias_for_option(&self, field_name: &str, option_name: &str) -> Option<&str> {
        self.entry_for_field(field_name)?
            .values
            .iter()
            .find(|(_, option)| option.as_str() == option_name)
            .map(|(alias, _)| alias.as_str())
    }

    pub fn aliases(&self, field_name: &str) -> Vec<(&str, &str)> {
        self.entry_for_field(field_name)
            .map(|m| {
                m.values
                    .iter()
                    .map(|(a, o)| (a.as_str(), o.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn board_fields(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|m| m.field.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(field: &str, values: &[(&str, &str)]) -> FieldMapping {
        FieldMapping {
            field: field.to_string(),
            values: values
                .iter()
                .map(|(a, o)| (a.to_string(), o.to_string()))
                .collect(),
        }
    }

    fn aliases() -> FieldAliasMap {
        let mut map = BTreeMap::new();
        map.insert(
            "Priority".to_string(),
            mapping("Priority", &[("urgent", "P0"), ("p0", "P0"), ("p1", "P1")]),
        );
        map.insert("size".to_string(), mapping("Story Points", &[]));
        FieldAliasMap::new(&map)
    }

    #[test]
    fn keys_are_case_insensitive() {
        let map = aliases();
        assert_eq!(map.board_field_for_key("PRIORITY"), Some("Priority"));
        assert_eq!(map.board_field_for_key("size"), Some("Story Points"));
        assert_eq!(map.board_field_for_key("status"), None);
    }

    #[test]
    fn entry_found_by_board_field_name() {
        let map = aliases();
        assert!(map.entry_for_field("story points").is_some());
        assert!(map.entry_for_field("Sprint").is_none());
    }

    #[test]
    fn alias_lookup() {
        let map = aliases();
        assert_eq!(map.option_for_alias("Priority", "p1"), Some("P1"));
        assert_eq!(map.option_for_alias("Priority", "URGENT"), Some("P0"));
        assert_eq!(map.option_for_alias("Priority", "p9"), None);
    }

    #[test]
    fn reverse_lookup_picks_smallest_alias() {
        let map = aliases();
        assert_eq!(map.alias_for_option("Priority", "P0"), Some("p0"));
        assert_eq!(map.alias_for_option("Priority", "P2"), None);
    }
}
