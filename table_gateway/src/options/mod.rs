//! Query options
//!
//! This module defines the per-call options value built by callers
//! and the canonical finalized form consumed by the driver.

pub mod finalize;
pub mod template;

pub use finalize::{finalize, table_from_model, FinalizeContext};
pub use template::{SqlArgs, SqlTemplate};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use type_mapping::SqlValue;

/// Comparison operators for where expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq, // =
    Ne, // !=
    Gt, // >
    Gte, // >=
    Lt, // <
    Lte, // <=
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// One where expression attached to a field key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereExpr {
    Eq(SqlValue),
    Cmp(CompareOp, SqlValue),
    In(Vec<SqlValue>),
    NotIn(Vec<SqlValue>),
    Between(SqlValue, SqlValue),
    Like(String),
    NotLike(String),
    IsNull,
    IsNotNull,
    /// Raw fragment rendered after the field name (or standalone for
    /// marker keys); never derived from user data
    Raw(String),
}

/// Where condition of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereClause {
    /// Field (or marker key) to expression, in insertion order
    Map(IndexMap<String, WhereExpr>),
    /// Raw SQL fragment, with `:name` bind substitution
    Raw(String),
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        match self {
            WhereClause::Map(map) => map.is_empty(),
            WhereClause::Raw(sql) => sql.trim().is_empty(),
        }
    }

    /// The expression for a plain field key, when the clause is a map
    pub fn get(&self, field: &str) -> Option<&WhereExpr> {
        match self {
            WhereClause::Map(map) => map.get(field),
            WhereClause::Raw(_) => None,
        }
    }
}

impl Default for WhereClause {
    fn default() -> Self {
        WhereClause::Map(IndexMap::new())
    }
}

/// Sort direction for an order entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Result-cache directive: explicit key and TTL override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheDirective {
    pub key: Option<String>,
    pub ttl: Option<u64>,
}

/// Result-index directive: re-key the result set by a named column,
/// optionally projecting a second named column as the value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDirective {
    pub key: String,
    pub value: Option<String>,
}

impl IndexDirective {
    /// Parse `"key"` or `"key,value"` column specs
    pub fn parse(spec: &str) -> Self {
        let mut parts = spec.splitn(2, ',').map(str::trim);
        let key = parts.next().unwrap_or_default().to_string();
        let value = parts.next().filter(|v| !v.is_empty()).map(str::to_string);
        Self { key, value }
    }
}

/// Per-call query options, consumed by value by every command.
///
/// Because commands take the value by move there is no pending state
/// to leak into a later call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    pub(crate) table: Option<String>,
    pub(crate) alias: Option<String>,
    pub(crate) where_clause: Option<WhereClause>,
    pub(crate) fields: Vec<String>,
    pub(crate) distinct: bool,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) order: Vec<(String, SortOrder)>,
    pub(crate) group: Option<String>,
    pub(crate) having: Option<String>,
    pub(crate) joins: Vec<String>,
    pub(crate) bind: IndexMap<String, SqlValue>,
    pub(crate) cache: Option<CacheDirective>,
    pub(crate) index: Option<IndexDirective>,
    pub(crate) strict: Option<bool>,
    pub(crate) lock: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target an explicit table instead of the gateway's own
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Replace the where condition with a full map
    pub fn where_map(mut self, map: IndexMap<String, WhereExpr>) -> Self {
        self.where_clause = Some(WhereClause::Map(map));
        self
    }

    /// Add one equality condition
    pub fn where_eq(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.where_expr(field, WhereExpr::Eq(value.into()))
    }

    /// Add one condition keyed by field (or marker key)
    pub fn where_expr(mut self, field: &str, expr: WhereExpr) -> Self {
        let clause = self.where_clause.take().unwrap_or_default();
        self.where_clause = Some(match clause {
            WhereClause::Map(mut map) => {
                map.insert(field.to_string(), expr);
                WhereClause::Map(map)
            }
            raw @ WhereClause::Raw(_) => raw,
        });
        self
    }

    /// Replace the where condition with a raw SQL fragment
    pub fn where_raw(mut self, sql: &str) -> Self {
        self.where_clause = Some(WhereClause::Raw(sql.to_string()));
        self
    }

    /// Select specific fields, comma separated
    pub fn fields(mut self, spec: &str) -> Self {
        self.fields = spec
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.order.push((field.to_string(), order));
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn having(mut self, having: &str) -> Self {
        self.having = Some(having.to_string());
        self
    }

    /// Append a raw join clause, passed through unchanged
    pub fn join(mut self, join: &str) -> Self {
        self.joins.push(join.to_string());
        self
    }

    /// Bind a named parameter referenced as `:name` in raw fragments.
    /// Bound fields are never type-coerced.
    pub fn bind(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.bind.insert(name.to_string(), value.into());
        self
    }

    /// Cache the result under an automatically derived key
    pub fn cached(mut self) -> Self {
        self.cache.get_or_insert_with(CacheDirective::default);
        self
    }

    /// Cache the result under an explicit key
    pub fn cache_key(mut self, key: &str) -> Self {
        let directive = self.cache.get_or_insert_with(CacheDirective::default);
        directive.key = Some(key.to_string());
        self
    }

    /// Override the cache TTL for this query
    pub fn cache_ttl(mut self, ttl: u64) -> Self {
        let directive = self.cache.get_or_insert_with(CacheDirective::default);
        directive.ttl = Some(ttl);
        self
    }

    /// Re-key the result set: `"key"` or `"key,value"` columns
    pub fn index(mut self, spec: &str) -> Self {
        self.index = Some(IndexDirective::parse(spec));
        self
    }

    /// Override the gateway's strict-mode setting for this call
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Lock selected rows for update
    pub fn lock(mut self) -> Self {
        self.lock = true;
        self
    }

    pub fn where_ref(&self) -> Option<&WhereClause> {
        self.where_clause.as_ref()
    }

    pub fn bind_ref(&self) -> &IndexMap<String, SqlValue> {
        &self.bind
    }

    pub fn strict_override(&self) -> Option<bool> {
        self.strict
    }

    /// Merge `overrides` on top of this query, field by field.
    ///
    /// Both values are consumed; every populated field of `overrides`
    /// wins, bind entries are unioned with override entries taking
    /// precedence.
    pub fn merge(mut self, overrides: Query) -> Query {
        if overrides.table.is_some() {
            self.table = overrides.table;
        }
        if overrides.alias.is_some() {
            self.alias = overrides.alias;
        }
        if overrides.where_clause.is_some() {
            self.where_clause = overrides.where_clause;
        }
        if !overrides.fields.is_empty() {
            self.fields = overrides.fields;
        }
        if overrides.distinct {
            self.distinct = true;
        }
        if overrides.limit.is_some() {
            self.limit = overrides.limit;
        }
        if overrides.offset.is_some() {
            self.offset = overrides.offset;
        }
        if !overrides.order.is_empty() {
            self.order = overrides.order;
        }
        if overrides.group.is_some() {
            self.group = overrides.group;
        }
        if overrides.having.is_some() {
            self.having = overrides.having;
        }
        if !overrides.joins.is_empty() {
            self.joins = overrides.joins;
        }
        for (name, value) in overrides.bind {
            self.bind.insert(name, value);
        }
        if overrides.cache.is_some() {
            self.cache = overrides.cache;
        }
        if overrides.index.is_some() {
            self.index = overrides.index;
        }
        if overrides.strict.is_some() {
            self.strict = overrides.strict;
        }
        if overrides.lock {
            self.lock = true;
        }
        self
    }
}

/// Canonical finalized options, produced once per command and handed
/// to the driver. The `model` discriminator only feeds logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOptions {
    pub model: String,
    pub table: String,
    pub where_clause: WhereClause,
    pub fields: Vec<String>,
    pub distinct: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order: Vec<(String, SortOrder)>,
    pub group: Option<String>,
    pub having: Option<String>,
    pub joins: Vec<String>,
    pub bind: IndexMap<String, SqlValue>,
    pub cache: Option<CacheDirective>,
    pub index: Option<IndexDirective>,
    pub lock: bool,
}
