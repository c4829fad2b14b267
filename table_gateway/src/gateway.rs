//! Table gateway
//!
//! The command executor: one gateway per table, owning no cross-call
//! state beyond the shared schema cache and the lazy-write buffer.
//! Every command finalizes its options, runs the lifecycle hooks, and
//! delegates to the driver.

use crate::driver::Driver;
use crate::errors::GatewayError;
use crate::hooks::{HookDecision, HookStage, NoHooks, TableHooks};
use crate::lazy_write::{Absorb, LazyWriteCoalescer};
use crate::options::{
    finalize, table_from_model, FinalizeContext, IndexDirective, Query, QueryOptions, SqlArgs,
    SqlTemplate, WhereClause, WhereExpr,
};
use crate::results::{AddResult, CounterWrite, DeleteOutcome, FieldValues, ResultSet, Separator};
use crate::row::Row;
use crate::schema::{PrimaryKey, Schema, SchemaCache};
use crate::update::{ChangeSet, FieldUpdate};
use cache_system::{CacheError, CacheParams};
use config::GatewayConfig;
use indexmap::IndexMap;
use std::sync::{Arc, OnceLock};
use type_mapping::SqlValue;

/// Per-gateway settings, fixed at construction
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    model: String,
    table_name: Option<String>,
    prefix: String,
    db_name: Option<String>,
    strict: bool,
    /// Exposed name to stored column, applied on read and write
    field_map: IndexMap<String, String>,
    cache_ttl: u64,
    lazy_window: u64,
}

impl GatewaySettings {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            table_name: None,
            prefix: String::new(),
            db_name: None,
            strict: false,
            field_map: IndexMap::new(),
            cache_ttl: 60,
            lazy_window: 0,
        }
    }

    /// Settings seeded from the application config
    pub fn from_config(model: &str, config: &GatewayConfig) -> Self {
        Self::new(model)
            .prefix(&config.table_prefix)
            .strict(config.strict_fields)
            .cache_ttl(config.result_cache_ttl_seconds)
            .lazy_window(config.lazy_write_window_seconds)
    }

    /// Explicit table name, still subject to the prefix
    pub fn table_name(mut self, table_name: &str) -> Self {
        self.table_name = Some(table_name.to_string());
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Qualify the table as `db.table`
    pub fn db_name(mut self, db_name: &str) -> Self {
        self.db_name = Some(db_name.to_string());
        self
    }

    /// Whether unknown fields and where keys fail instead of dropping
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Expose a stored column under a different field name
    pub fn map_field(mut self, exposed: &str, stored: &str) -> Self {
        self.field_map
            .insert(exposed.to_string(), stored.to_string());
        self
    }

    pub fn cache_ttl(mut self, ttl: u64) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Default lazy-write window in seconds; zero writes through
    pub fn lazy_window(mut self, window_secs: u64) -> Self {
        self.lazy_window = window_secs;
        self
    }
}

/// Command executor for one table
pub struct TableGateway {
    driver: Arc<dyn Driver>,
    hooks: Arc<dyn TableHooks>,
    schema_cache: Arc<SchemaCache>,
    cache: Option<CacheParams>,
    settings: GatewaySettings,
    resolved: OnceLock<String>,
}

impl TableGateway {
    pub fn new(
        driver: Arc<dyn Driver>,
        schema_cache: Arc<SchemaCache>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            driver,
            hooks: Arc::new(NoHooks),
            schema_cache,
            cache: None,
            settings,
            resolved: OnceLock::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn TableHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Enable result caching and lazy-write buffering
    pub fn with_cache(mut self, params: CacheParams) -> Self {
        self.cache = Some(params);
        self
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Resolved table name: prefix plus the configured name or the
    /// snake-cased model name, lowercased. Computed once.
    pub fn table_name(&self) -> &str {
        self.resolved.get_or_init(|| {
            let name = self
                .settings
                .table_name
                .clone()
                .unwrap_or_else(|| table_from_model(&self.settings.model));
            format!("{}{}", self.settings.prefix, name).to_lowercase()
        })
    }

    /// Table name as it appears in SQL, db-qualified when configured
    fn sql_table(&self) -> String {
        match &self.settings.db_name {
            Some(db) => format!("{}.{}", db, self.table_name()),
            None => self.table_name().to_string(),
        }
    }

    async fn schema(&self) -> Result<Arc<Schema>, GatewayError> {
        self.schema_cache
            .describe(
                self.driver.as_ref(),
                self.table_name(),
                self.settings.db_name.as_deref(),
            )
            .await
    }

    /// Drop the cached schema and re-introspect
    pub async fn refresh_schema(&self) -> Result<Arc<Schema>, GatewayError> {
        self.schema_cache
            .refresh(
                self.driver.as_ref(),
                self.table_name(),
                self.settings.db_name.as_deref(),
            )
            .await
    }

    pub async fn last_insert_id(&self) -> Result<Option<i64>, GatewayError> {
        Ok(self.driver.last_insert_id().await?)
    }

    /// Finalize a query. Explicit-table queries skip the schema, so
    /// they also skip field validation and coercion.
    async fn finalize_query(
        &self,
        query: Query,
    ) -> Result<(QueryOptions, Option<Arc<Schema>>), GatewayError> {
        let strict = query.strict_override().unwrap_or(self.settings.strict);
        if let Some(table) = query.table.clone() {
            let ctx = FinalizeContext {
                model: &self.settings.model,
                table: &table,
                strict,
                schema: None,
            };
            return Ok((finalize(query, &ctx)?, None));
        }

        let schema = self.schema().await?;
        let table = self.sql_table();
        let ctx = FinalizeContext {
            model: &self.settings.model,
            table: &table,
            strict,
            schema: Some(&schema),
        };
        let options = finalize(query, &ctx)?;
        Ok((options, Some(schema)))
    }

    // ==================== write facade ====================

    /// Prepare an insert row: field-map renames, unknown-field
    /// filtering, and scalar coercion against the schema.
    fn facade_row(
        &self,
        row: &mut Row,
        schema: Option<&Schema>,
        strict: bool,
    ) -> Result<(), GatewayError> {
        for (exposed, stored) in &self.settings.field_map {
            if let Some(value) = row.take(exposed) {
                row.insert(stored, value);
            }
        }

        let Some(schema) = schema else {
            return Ok(());
        };

        let unknown: Vec<String> = row
            .fields()
            .filter(|field| !schema.has_field(field))
            .map(str::to_string)
            .collect();
        for field in unknown {
            if strict {
                return Err(GatewayError::InvalidField { field });
            }
            tracing::warn!(
                "[FACADE] model: {} dropping unknown field: {}",
                self.settings.model,
                field
            );
            row.take(&field);
        }

        let fields: Vec<String> = row.fields().map(str::to_string).collect();
        for field in fields {
            if let Some(field_type) = schema.field_type(&field) {
                row.map_value(&field, |value| field_type.coerce(value));
            }
        }
        Ok(())
    }

    /// Same facade over a save payload, preserving each operation
    fn facade_changes(
        &self,
        changes: &mut ChangeSet,
        schema: Option<&Schema>,
        strict: bool,
    ) -> Result<(), GatewayError> {
        for (exposed, stored) in &self.settings.field_map {
            if let Some(update) = changes.take(exposed) {
                changes.insert(stored, update);
            }
        }

        let Some(schema) = schema else {
            return Ok(());
        };

        let unknown: Vec<String> = changes
            .fields()
            .filter(|field| !schema.has_field(field))
            .map(str::to_string)
            .collect();
        for field in unknown {
            if strict {
                return Err(GatewayError::InvalidField { field });
            }
            tracing::warn!(
                "[FACADE] model: {} dropping unknown field: {}",
                self.settings.model,
                field
            );
            changes.take(&field);
        }

        let fields: Vec<String> = changes.fields().map(str::to_string).collect();
        for field in fields {
            if let Some(field_type) = schema.field_type(&field) {
                changes.map_value(&field, |value| field_type.coerce(value));
            }
        }
        Ok(())
    }

    async fn invalidate_result_cache(&self) {
        if let Some(params) = &self.cache {
            if let Err(error) = params
                .manager
                .invalidate_queries(&params.prefix, self.table_name())
                .await
            {
                tracing::warn!(
                    "[CACHE] model: {} invalidation failed: {}",
                    self.settings.model,
                    error
                );
            }
        }
    }

    // ==================== commands ====================

    /// Insert one row
    pub async fn add(&self, mut row: Row, query: Query) -> Result<AddResult, GatewayError> {
        if row.is_empty() {
            return Err(GatewayError::NoData("add"));
        }

        let strict = query.strict_override().unwrap_or(self.settings.strict);
        let (options, schema) = self.finalize_query(query).await?;
        self.facade_row(&mut row, schema.as_deref(), strict)?;
        if row.is_empty() {
            return Err(GatewayError::NoData("add"));
        }

        self.hooks.before_write(&mut row).await;
        if self.hooks.before_insert(&mut row, &options).await == HookDecision::Veto {
            return Err(GatewayError::Vetoed {
                stage: HookStage::Insert,
            });
        }

        let affected = self.driver.insert(&row, &options, false).await?;
        self.invalidate_result_cache().await;
        tracing::debug!(
            "[ADD] model: {} table: {} affected: {}",
            self.settings.model,
            options.table,
            affected
        );

        if let Some(schema) = &schema {
            match &schema.primary_key {
                // No generated id to attach for a composite key; the raw
                // result goes back without the post-insert hook
                PrimaryKey::Composite(_) => return Ok(AddResult::Affected(affected)),
                PrimaryKey::Single { field, autoinc } => {
                    if *autoinc && !row.contains(field) {
                        if let Some(id) = self.driver.last_insert_id().await? {
                            row.insert(field, id);
                            self.hooks.after_insert(&row, &options).await;
                            return Ok(AddResult::Inserted(id));
                        }
                    }
                }
                PrimaryKey::None => {}
            }
        }

        self.hooks.after_insert(&row, &options).await;
        Ok(AddResult::Affected(affected))
    }

    /// Bulk insert
    pub async fn add_all(
        &self,
        mut rows: Vec<Row>,
        query: Query,
        replace: bool,
    ) -> Result<AddResult, GatewayError> {
        if rows.is_empty() {
            return Err(GatewayError::NoData("add_all"));
        }

        let strict = query.strict_override().unwrap_or(self.settings.strict);
        let (options, schema) = self.finalize_query(query).await?;
        for row in &mut rows {
            self.facade_row(row, schema.as_deref(), strict)?;
            self.hooks.before_write(row).await;
        }

        let affected = self.driver.insert_all(&rows, &options, replace).await?;
        self.invalidate_result_cache().await;
        tracing::debug!(
            "[ADD_ALL] model: {} table: {} rows: {}",
            self.settings.model,
            options.table,
            rows.len()
        );

        match self.driver.last_insert_id().await? {
            Some(id) => Ok(AddResult::Inserted(id)),
            None => Ok(AddResult::Affected(affected)),
        }
    }

    /// Update rows. Without an explicit condition the primary key is
    /// pulled out of the payload; updating unconditionally is refused.
    pub async fn save(&self, mut changes: ChangeSet, query: Query) -> Result<u64, GatewayError> {
        if changes.is_empty() {
            return Err(GatewayError::NoData("save"));
        }

        let strict = query.strict_override().unwrap_or(self.settings.strict);
        let (mut options, schema) = self.finalize_query(query).await?;
        self.facade_changes(&mut changes, schema.as_deref(), strict)?;

        let mut derived: Vec<(String, SqlValue)> = Vec::new();
        if options.where_clause.is_empty() {
            let primary_key = schema
                .as_ref()
                .map(|s| s.primary_key.clone())
                .unwrap_or(PrimaryKey::None);
            match primary_key {
                PrimaryKey::Single { field, .. } => match changes.take(&field) {
                    Some(update) => derived.push((field, update.value().clone())),
                    None => return Err(GatewayError::NoUpdateCondition),
                },
                PrimaryKey::Composite(components) => {
                    for field in components {
                        match changes.take(&field) {
                            Some(update) => derived.push((field, update.value().clone())),
                            None => return Err(GatewayError::MissingPrimaryKey { field }),
                        }
                    }
                }
                PrimaryKey::None => return Err(GatewayError::NoUpdateCondition),
            }

            let mut condition = IndexMap::with_capacity(derived.len());
            for (field, value) in &derived {
                condition.insert(field.clone(), WhereExpr::Eq(value.clone()));
            }
            options.where_clause = WhereClause::Map(condition);
            tracing::debug!(
                "[UPDATE_WHERE] model: {} derived condition from primary key",
                self.settings.model
            );
        }

        if changes.is_empty() {
            return Err(GatewayError::NoData("save"));
        }

        if self.hooks.before_update(&mut changes, &options).await == HookDecision::Veto {
            return Err(GatewayError::Vetoed {
                stage: HookStage::Update,
            });
        }

        let affected = self.driver.update(&changes, &options).await?;
        self.invalidate_result_cache().await;
        tracing::debug!(
            "[SAVE] model: {} table: {} affected: {}",
            self.settings.model,
            options.table,
            affected
        );

        for (field, value) in derived {
            changes.insert(&field, FieldUpdate::Set(value));
        }
        self.hooks.after_update(&changes, &options).await;
        Ok(affected)
    }

    /// Delete rows. An empty condition is refused without touching
    /// the driver; the caller can tell refusal from zero matches.
    pub async fn delete(&self, query: Query) -> Result<DeleteOutcome, GatewayError> {
        let (options, schema) = self.finalize_query(query).await?;
        if options.where_clause.is_empty() {
            tracing::warn!(
                "[DELETE] model: {} refusing delete without condition",
                self.settings.model
            );
            return Ok(DeleteOutcome::Refused);
        }

        if self.hooks.before_delete(&options).await == HookDecision::Veto {
            return Err(GatewayError::Vetoed {
                stage: HookStage::Delete,
            });
        }

        let affected = self.driver.delete(&options).await?;
        self.invalidate_result_cache().await;
        tracing::debug!(
            "[DELETE] model: {} table: {} affected: {}",
            self.settings.model,
            options.table,
            affected
        );

        let mut removed = Row::new();
        if let Some(schema) = &schema {
            let components: Vec<&String> = match &schema.primary_key {
                PrimaryKey::Single { field, .. } => vec![field],
                PrimaryKey::Composite(components) => components.iter().collect(),
                PrimaryKey::None => Vec::new(),
            };
            for field in components {
                if let Some(WhereExpr::Eq(value)) = options.where_clause.get(field) {
                    removed.insert(field, value.clone());
                }
            }
        }
        self.hooks.after_delete(&removed, &options).await;
        Ok(DeleteOutcome::Deleted(affected))
    }

    /// Select rows, honoring the cache and index directives
    pub async fn select(&self, query: Query) -> Result<ResultSet, GatewayError> {
        let (options, _) = self.finalize_query(query).await?;

        let cache_slot = match (&options.cache, &self.cache) {
            (Some(directive), Some(params)) => {
                let component = match &directive.key {
                    Some(key) => key.clone(),
                    None => {
                        let serialized =
                            serde_json::to_string(&options).map_err(CacheError::from)?;
                        params.manager.hash_query(&serialized)
                    }
                };
                if let Some(hit) = params
                    .manager
                    .get_query::<ResultSet>(&params.prefix, self.table_name(), &component)
                    .await?
                {
                    tracing::debug!(
                        "[SELECT] model: {} cache hit: {}",
                        self.settings.model,
                        component
                    );
                    return Ok(hit);
                }
                Some((component, directive.ttl.unwrap_or(params.ttl)))
            }
            _ => None,
        };

        let mut rows = self.driver.select(&options).await?;
        if !self.settings.field_map.is_empty() {
            for row in &mut rows {
                row.remap(&self.settings.field_map);
            }
        }
        self.hooks.after_select(&mut rows, &options).await;
        tracing::debug!(
            "[SELECT] model: {} table: {} rows: {}",
            self.settings.model,
            options.table,
            rows.len()
        );

        let result = match &options.index {
            Some(directive) => Self::apply_index(rows, directive),
            None => ResultSet::Rows(rows),
        };

        if let Some((component, ttl)) = cache_slot {
            if let Some(params) = &self.cache {
                params
                    .manager
                    .set_query(&params.prefix, self.table_name(), &component, &result, ttl)
                    .await?;
            }
        }
        Ok(result)
    }

    fn apply_index(rows: Vec<Row>, directive: &IndexDirective) -> ResultSet {
        match &directive.value {
            Some(value_column) => {
                let mut map = IndexMap::with_capacity(rows.len());
                for row in rows {
                    if let Some(key) = row.get(&directive.key) {
                        let key = key.to_string();
                        let value = row.get(value_column).cloned().unwrap_or(SqlValue::Null);
                        map.insert(key, value);
                    }
                }
                ResultSet::ValueIndex(map)
            }
            None => {
                let mut map = IndexMap::with_capacity(rows.len());
                for row in rows {
                    let key = row.get(&directive.key).map(|value| value.to_string());
                    if let Some(key) = key {
                        map.insert(key, row);
                    }
                }
                ResultSet::RowIndex(map)
            }
        }
    }

    /// Select one row
    pub async fn find(&self, query: Query) -> Result<Option<Row>, GatewayError> {
        match self.select(query.limit(1)).await? {
            ResultSet::Rows(mut rows) => {
                if rows.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(rows.remove(0)))
                }
            }
            ResultSet::RowIndex(map) => Ok(map.into_iter().next().map(|(_, row)| row)),
            ResultSet::ValueIndex(_) => Ok(None),
        }
    }

    /// Column shortcut over select.
    ///
    /// Key and value columns follow the requested field list, not the
    /// driver's column order.
    pub async fn get_field(
        &self,
        mut query: Query,
        fields: &str,
        separator: Separator,
    ) -> Result<Option<FieldValues>, GatewayError> {
        let requested: Vec<String> = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        if requested.is_empty() {
            return Err(GatewayError::NoData("get_field"));
        }
        if matches!(separator, Separator::Glue(_)) && requested.len() < 2 {
            return Err(GatewayError::InvalidExpression {
                key: fields.to_string(),
            });
        }

        query = query.fields(fields);
        query = match &separator {
            Separator::None => query.limit(1),
            Separator::Limit(limit) => query.limit(*limit),
            _ => query,
        };

        // explicit cache keys are salted so result shapes never collide
        if let Some(directive) = query.cache.as_mut() {
            if let Some(key) = directive.key.as_mut() {
                let salt = match &separator {
                    Separator::None => "one".to_string(),
                    Separator::All => "all".to_string(),
                    Separator::Limit(limit) => format!("limit{}", limit),
                    Separator::Glue(glue) => format!("glue{}", glue),
                };
                key.push(':');
                key.push_str(&salt);
            }
        }

        let rows = match self.select(query).await? {
            ResultSet::Rows(rows) => rows,
            ResultSet::RowIndex(map) => map.into_values().collect(),
            ResultSet::ValueIndex(_) => Vec::new(),
        };
        if rows.is_empty() {
            return Ok(None);
        }

        match separator {
            Separator::None => Ok(rows[0].get(&requested[0]).cloned().map(FieldValues::Scalar)),
            Separator::All | Separator::Limit(_) => {
                let values = rows
                    .iter()
                    .map(|row| row.get(&requested[0]).cloned().unwrap_or(SqlValue::Null))
                    .collect();
                Ok(Some(FieldValues::List(values)))
            }
            Separator::Glue(glue) => {
                let mut map = IndexMap::with_capacity(rows.len());
                for row in rows {
                    let Some(key) = row.get(&requested[0]).map(|value| value.to_string()) else {
                        continue;
                    };
                    let value = if requested.len() == 2 {
                        row.get(&requested[1]).cloned().unwrap_or(SqlValue::Null)
                    } else {
                        let joined: Vec<String> = requested[1..]
                            .iter()
                            .map(|field| {
                                row.get(field)
                                    .map(|value| value.to_string())
                                    .unwrap_or_default()
                            })
                            .collect();
                        SqlValue::Text(joined.join(&glue))
                    };
                    map.insert(key, value);
                }
                Ok(Some(FieldValues::Map(map)))
            }
        }
    }

    /// Single-assignment save
    pub async fn set_field(
        &self,
        field: &str,
        value: impl Into<SqlValue> + Send,
        query: Query,
    ) -> Result<u64, GatewayError> {
        self.save(ChangeSet::new().set(field, value), query).await
    }

    /// Increment a counter, buffering through the lazy-write window
    /// when one is configured
    pub async fn set_inc(
        &self,
        query: Query,
        field: &str,
        step: i64,
        lazy: Option<u64>,
    ) -> Result<CounterWrite, GatewayError> {
        self.counter_write(query, field, step, lazy).await
    }

    /// Decrement counterpart of `set_inc`
    pub async fn set_dec(
        &self,
        query: Query,
        field: &str,
        step: i64,
        lazy: Option<u64>,
    ) -> Result<CounterWrite, GatewayError> {
        self.counter_write(query, field, -step, lazy).await
    }

    async fn counter_write(
        &self,
        query: Query,
        field: &str,
        delta: i64,
        lazy: Option<u64>,
    ) -> Result<CounterWrite, GatewayError> {
        let window = lazy.unwrap_or(self.settings.lazy_window);
        if window > 0 {
            if let Some(params) = &self.cache {
                let key =
                    LazyWriteCoalescer::entry_key(&self.settings.model, field, query.where_ref());
                let coalescer = LazyWriteCoalescer::new(params.manager.store());
                match coalescer.absorb(&key, delta, window).await? {
                    Absorb::Buffering => {
                        tracing::debug!(
                            "[COUNTER] model: {} field: {} buffered",
                            self.settings.model,
                            field
                        );
                        return Ok(CounterWrite::Buffered);
                    }
                    Absorb::Flush(net) => return self.apply_counter(query, field, net).await,
                }
            }
        }
        self.apply_counter(query, field, delta).await
    }

    async fn apply_counter(
        &self,
        query: Query,
        field: &str,
        delta: i64,
    ) -> Result<CounterWrite, GatewayError> {
        // a flush can net out to zero, which leaves nothing to write
        if delta == 0 {
            return Ok(CounterWrite::Applied(0));
        }
        let changes = if delta > 0 {
            ChangeSet::new().increment(field, delta)
        } else {
            ChangeSet::new().decrement(field, -delta)
        };
        Ok(CounterWrite::Applied(self.save(changes, query).await?))
    }

    // ==================== raw SQL ====================

    /// Raw select passthrough, templated per the argument mode
    pub async fn query(&self, sql: &str, args: SqlArgs) -> Result<Vec<Row>, GatewayError> {
        let sql = self.prepare_sql(sql, args).await?;
        Ok(self.driver.query(&sql).await?)
    }

    /// Raw statement passthrough, templated per the argument mode
    pub async fn execute(&self, sql: &str, args: SqlArgs) -> Result<u64, GatewayError> {
        let sql = self.prepare_sql(sql, args).await?;
        let affected = self.driver.execute(&sql).await?;
        self.invalidate_result_cache().await;
        Ok(affected)
    }

    async fn prepare_sql(&self, sql: &str, args: SqlArgs) -> Result<String, GatewayError> {
        let substituted =
            SqlTemplate::substitute(sql, &self.sql_table(), &self.settings.prefix);
        match args {
            SqlArgs::Tokens => Ok(substituted),
            SqlArgs::Values(values) => Ok(SqlTemplate::positional(&substituted, &values, &|v| {
                self.driver.escape(v)
            })),
            SqlArgs::Options(query) => {
                let (options, _) = self.finalize_query(query).await?;
                Ok(SqlTemplate::render(&substituted, &options, &|v| {
                    self.driver.escape(v)
                })?)
            }
        }
    }

    // ==================== transactions ====================

    /// Begin a transaction, implicitly committing any pending one
    pub async fn start_trans(&self) -> Result<(), GatewayError> {
        Ok(self.driver.begin().await?)
    }

    pub async fn commit(&self) -> Result<(), GatewayError> {
        Ok(self.driver.commit().await?)
    }

    pub async fn rollback(&self) -> Result<(), GatewayError> {
        Ok(self.driver.rollback().await?)
    }
}
