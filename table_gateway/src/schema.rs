//! Table schema introspection and caching
//!
//! Field names, column types, and the primary-key shape are read from
//! the driver once per table per process and optionally persisted to
//! the external cache. Only an explicit refresh re-introspects.

use crate::driver::Driver;
use crate::errors::GatewayError;
use cache_system::CacheParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use type_mapping::FieldType;

/// One column as reported by the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    pub type_name: String,
    pub primary: bool,
    pub autoinc: bool,
}

impl FieldDescription {
    pub fn new(name: &str, type_name: &str, primary: bool, autoinc: bool) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            primary,
            autoinc,
        }
    }
}

/// Primary key shape of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimaryKey {
    None,
    Single { field: String, autoinc: bool },
    /// Ordered component list, order of first detection
    Composite(Vec<String>),
}

/// Field metadata for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub table: String,
    pub fields: Vec<String>,
    pub types: HashMap<String, FieldType>,
    pub primary_key: PrimaryKey,
}

impl Schema {
    /// Build a schema from driver column metadata.
    ///
    /// A second primary-flagged column upgrades a single key to a
    /// composite one; components keep their detection order. The
    /// autoincrement flag only survives on a single-field key.
    pub fn from_fields(table: &str, fields: Vec<FieldDescription>) -> Self {
        let mut names = Vec::with_capacity(fields.len());
        let mut types = HashMap::with_capacity(fields.len());
        let mut primary_key = PrimaryKey::None;

        for field in fields {
            names.push(field.name.clone());
            types.insert(field.name.clone(), FieldType::parse(&field.type_name));

            if field.primary {
                primary_key = match primary_key {
                    PrimaryKey::None => PrimaryKey::Single {
                        field: field.name,
                        autoinc: field.autoinc,
                    },
                    PrimaryKey::Single { field: first, .. } => {
                        PrimaryKey::Composite(vec![first, field.name])
                    }
                    PrimaryKey::Composite(mut components) => {
                        components.push(field.name);
                        PrimaryKey::Composite(components)
                    }
                };
            }
        }

        Self {
            table: table.to_string(),
            fields: names,
            types,
            primary_key,
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.types.get(field).copied()
    }
}

/// Per-process schema cache with optional external persistence.
///
/// The process map makes first-touch-per-table the only automatic
/// introspection; when `CacheParams` is supplied the serialized schema
/// is also stored externally under `schema:{db.table}`.
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<Schema>>>,
    persistence: Option<CacheParams>,
}

impl SchemaCache {
    pub fn new(persistence: Option<CacheParams>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            persistence,
        }
    }

    fn cache_slot(table: &str, db_name: Option<&str>) -> String {
        match db_name {
            Some(db) => format!("{}.{}", db, table).to_lowercase(),
            None => table.to_lowercase(),
        }
    }

    /// Describe a table, introspecting through the driver on first use
    pub async fn describe(
        &self,
        driver: &dyn Driver,
        table: &str,
        db_name: Option<&str>,
    ) -> Result<Arc<Schema>, GatewayError> {
        let slot = Self::cache_slot(table, db_name);

        if let Some(schema) = self.lookup(&slot) {
            return Ok(schema);
        }

        if let Some(params) = &self.persistence {
            let key = params.manager.build_schema_key(&params.prefix, &slot);
            if let Some(schema) = params.manager.get_json::<Schema>(&key).await? {
                let schema = Arc::new(schema);
                self.store(&slot, Arc::clone(&schema));
                return Ok(schema);
            }
        }

        self.introspect(driver, table, &slot).await
    }

    /// Drop any cached copy and re-introspect, the only invalidation path
    pub async fn refresh(
        &self,
        driver: &dyn Driver,
        table: &str,
        db_name: Option<&str>,
    ) -> Result<Arc<Schema>, GatewayError> {
        let slot = Self::cache_slot(table, db_name);
        self.tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&slot);
        self.introspect(driver, table, &slot).await
    }

    async fn introspect(
        &self,
        driver: &dyn Driver,
        table: &str,
        slot: &str,
    ) -> Result<Arc<Schema>, GatewayError> {
        let fields = driver.describe_fields(table).await?;
        if fields.is_empty() {
            return Err(GatewayError::SchemaUnavailable {
                table: table.to_string(),
            });
        }

        let schema = Arc::new(Schema::from_fields(table, fields));
        tracing::debug!(
            "[SCHEMA] table: {} fields: {} pk: {:?}",
            table,
            schema.fields.len(),
            schema.primary_key
        );

        if let Some(params) = &self.persistence {
            let key = params.manager.build_schema_key(&params.prefix, slot);
            params
                .manager
                .set_json(&key, schema.as_ref(), None, &[])
                .await?;
        }

        self.store(slot, Arc::clone(&schema));
        Ok(schema)
    }

    fn lookup(&self, slot: &str) -> Option<Arc<Schema>> {
        self.tables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(slot)
            .cloned()
    }

    fn store(&self, slot: &str, schema: Arc<Schema>) {
        self.tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(slot.to_string(), schema);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_autoinc_primary_key() {
        let schema = Schema::from_fields(
            "users",
            vec![
                FieldDescription::new("id", "integer", true, true),
                FieldDescription::new("name", "character varying(255)", false, false),
            ],
        );
        assert_eq!(
            schema.primary_key,
            PrimaryKey::Single {
                field: "id".to_string(),
                autoinc: true,
            }
        );
        assert_eq!(schema.fields, vec!["id", "name"]);
        assert_eq!(schema.field_type("id"), Some(FieldType::Int));
    }

    #[test]
    fn test_composite_key_keeps_detection_order() {
        let schema = Schema::from_fields(
            "memberships",
            vec![
                FieldDescription::new("user_id", "integer", true, false),
                FieldDescription::new("role", "character varying(32)", false, false),
                FieldDescription::new("group_id", "integer", true, false),
            ],
        );
        assert_eq!(
            schema.primary_key,
            PrimaryKey::Composite(vec!["user_id".to_string(), "group_id".to_string()])
        );
    }

    #[test]
    fn test_no_primary_key() {
        let schema = Schema::from_fields(
            "audit_log",
            vec![FieldDescription::new("message", "text", false, false)],
        );
        assert_eq!(schema.primary_key, PrimaryKey::None);
    }

    #[test]
    fn test_cache_slot_is_lowercased() {
        assert_eq!(SchemaCache::cache_slot("Users", Some("App")), "app.users");
        assert_eq!(SchemaCache::cache_slot("users", None), "users");
    }
}
