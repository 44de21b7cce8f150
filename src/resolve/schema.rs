use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::board::BoardApi;
use crate::config::{CachedField, CachedOption, SchemaCacheFile};
use crate::error::BoardError;
use crate::model::field::{FieldOption, FieldSchema};

/// Board field definitions for one run.
///
/// Lookups go to memory first. Memory is seeded from the persisted cache
/// unless a refresh was requested, and falls back to a single live query to
/// the board when a name is missing. A live query marks the cache dirty so the
/// caller can write it back.
#[derive(Debug, Default)]
pub struct SchemaCache {
    fields: Vec<FieldSchema>,
    fetched_at: Option<DateTime<Utc>>,
    live_loaded: bool,
    dirty: bool,
}

impl SchemaCache {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn from_cache_file(file: &SchemaCacheFile) -> Self {
        let fields = file
            .fields
            .iter()
            .map(|(name, cached)| FieldSchema {
                id: cached.id.clone(),
                name: name.clone(),
                data_type: cached.data_type,
                options: cached
                    .options
                    .iter()
                    .map(|o| FieldOption {
                        id: o.id.clone(),
                        name: o.name.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            fields,
            fetched_at: file.fetched_at,
            ..Default::default()
        }
    }

    pub fn to_cache_file(&self) -> SchemaCacheFile {
        let fields = self
            .fields
            .iter()
            .map(|f| {
                let cached = CachedField {
                    id: f.id.clone(),
                    data_type: f.data_type,
                    options: f
                        .options
                        .iter()
                        .map(|o| CachedOption {
                            name: o.name.clone(),
                            id: o.id.clone(),
                        })
                        .collect(),
                };
                (f.name.clone(), cached)
            })
            .collect();
        SchemaCacheFile {
            fetched_at: self.fetched_at,
            fields,
        }
    }

    /// Seed from `persisted` when allowed, otherwise query the board.
    pub async fn load(
        api: &dyn BoardApi,
        persisted: Option<&SchemaCacheFile>,
        refresh: bool,
    ) -> Result<Self> {
        match persisted {
            Some(file) if !refresh && !file.fields.is_empty() => {
                tracing::debug!(fields = file.fields.len(), "using persisted schema cache");
                Ok(Self::from_cache_file(file))
            }
            _ => {
                let mut cache = Self::default();
                cache.refresh_live(api).await?;
                Ok(cache)
            }
        }
    }

    pub async fn refresh_live(&mut self, api: &dyn BoardApi) -> Result<()> {
        let fields = api.list_fields().await?;
        tracing::info!(fields = fields.len(), "fetched board schema");
        self.fields = fields;
        self.fetched_at = Some(Utc::now());
        self.live_loaded = true;
        self.dirty = true;
        Ok(())
    }

    /// Make sure every name is known, querying the board at most once.
    pub async fn ensure<S: AsRef<str>>(&mut self, api: &dyn BoardApi, names: &[S]) -> Result<()> {
        let missing = names.iter().any(|n| self.field(n.as_ref()).is_none());
        if missing && !self.live_loaded {
            tracing::debug!("field missing from cached schema, refreshing from board");
            self.refresh_live(api).await?;
        }
        Ok(())
    }

    /// Fails with [`BoardError::SchemaNotFound`] when the board has no such field.
    pub async fn get_field(&mut self, api: &dyn BoardApi, name: &str) -> Result<&FieldSchema> {
        self.ensure(api, &[name]).await?;
        self.field(name).ok_or_else(|| {
            BoardError::SchemaNotFound {
                field: name.to_string(),
            }
            .into()
        })
    }

    /// Memory-only lookup: exact name, then ASCII case-insensitive.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::mock::{sample_fields, single_select, Call, MockBoard};

    fn persisted_with_status_only() -> SchemaCacheFile {
        SchemaCache::new(vec![single_select(
            "F_status_old",
            "Status",
            &[("s_backlog", "Backlog")],
        )])
        .to_cache_file()
    }

    #[tokio::test]
    async fn persisted_cache_avoids_live_query() {
        let board = MockBoard::new(sample_fields());
        let persisted = persisted_with_status_only();

        let mut cache = SchemaCache::load(&board, Some(&persisted), false).await.unwrap();
        let field = cache.get_field(&board, "status").await.unwrap();
        assert_eq!(field.id, "F_status_old");
        assert!(board.calls().is_empty());
        assert!(!cache.is_dirty());
    }

    #[tokio::test]
    async fn refresh_ignores_persisted_cache() {
        let board = MockBoard::new(sample_fields());
        let persisted = persisted_with_status_only();

        let cache = SchemaCache::load(&board, Some(&persisted), true).await.unwrap();
        assert_eq!(cache.field("Status").unwrap().id, "F_status");
        assert_eq!(board.calls(), vec![Call::ListFields]);
        assert!(cache.is_dirty());
    }

    #[tokio::test]
    async fn missing_field_triggers_one_live_query() {
        let board = MockBoard::new(sample_fields());
        let persisted = persisted_with_status_only();
        let mut cache = SchemaCache::load(&board, Some(&persisted), false).await.unwrap();

        let estimate = cache.get_field(&board, "Estimate").await.unwrap();
        assert_eq!(estimate.id, "F_estimate");

        let err = cache.get_field(&board, "Sprint").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::SchemaNotFound { field }) if field == "Sprint"
        ));
        assert_eq!(board.calls(), vec![Call::ListFields]);
    }

    #[test]
    fn cache_file_preserves_option_order() {
        let cache = SchemaCache::new(sample_fields());
        let restored = SchemaCache::from_cache_file(&cache.to_cache_file());
        let priority = restored.field("Priority").unwrap();
        let names: Vec<&str> = priority.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["P0", "P1", "P2"]);
    }

    #[test]
    fn lookup_prefers_exact_name() {
        let cache = SchemaCache::new(vec![
            single_select("F_lower", "status", &[]),
            single_select("F_upper", "Status", &[]),
        ]);
        assert_eq!(cache.field("Status").unwrap().id, "F_upper");
        assert_eq!(cache.field("status").unwrap().id, "F_lower");
        assert_eq!(cache.field("STATUS").unwrap().id, "F_lower");
    }
}
