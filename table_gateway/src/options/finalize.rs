//! Option finalization
//!
//! Turns a per-call `Query` into the canonical `QueryOptions`:
//! table resolution, alias handling, where-key validation, and
//! schema-driven scalar coercion.

use crate::errors::GatewayError;
use crate::options::{Query, QueryOptions, WhereClause, WhereExpr};
use crate::schema::Schema;
use indexmap::IndexMap;
use type_mapping::{FieldType, SqlValue};

/// Facts the finalizer needs from the owning gateway
pub struct FinalizeContext<'a> {
    /// Opaque model discriminator, used for logging only
    pub model: &'a str,
    /// Resolved table name, before any alias
    pub table: &'a str,
    /// Whether unknown where keys fail instead of being dropped
    pub strict: bool,
    /// Schema for validation/coercion; absent for explicit-table
    /// queries, which skip both
    pub schema: Option<&'a Schema>,
}

/// Derive a table name from a model name: snake-cased and lowercased
pub fn table_from_model(model: &str) -> String {
    let mut out = String::with_capacity(model.len() + 4);
    for (i, ch) in model.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// A key the where parser accepts without a schema match: a numeric
/// index, a leading underscore, or an embedded `.`, `(`, `|`, `&`
fn is_expression_key(key: &str) -> bool {
    key.parse::<usize>().is_ok()
        || key.starts_with('_')
        || key.contains('.')
        || key.contains('(')
        || key.contains('|')
        || key.contains('&')
}

fn coerce_scalar(field_type: FieldType, value: SqlValue) -> SqlValue {
    field_type.coerce(value)
}

fn coerce_expr(field_type: FieldType, expr: WhereExpr) -> WhereExpr {
    match expr {
        WhereExpr::Eq(v) => WhereExpr::Eq(coerce_scalar(field_type, v)),
        WhereExpr::Cmp(op, v) => WhereExpr::Cmp(op, coerce_scalar(field_type, v)),
        WhereExpr::In(values) => WhereExpr::In(
            values
                .into_iter()
                .map(|v| coerce_scalar(field_type, v))
                .collect(),
        ),
        WhereExpr::NotIn(values) => WhereExpr::NotIn(
            values
                .into_iter()
                .map(|v| coerce_scalar(field_type, v))
                .collect(),
        ),
        WhereExpr::Between(low, high) => WhereExpr::Between(
            coerce_scalar(field_type, low),
            coerce_scalar(field_type, high),
        ),
        other => other,
    }
}

/// Finalize a query into canonical options.
///
/// The query is consumed by value; where-map keys are checked against
/// the schema (values coerced to the column class) or accepted as
/// expression markers. Anything else fails in strict mode and is
/// dropped with a warning otherwise. Bound keys skip coercion.
pub fn finalize(query: Query, ctx: &FinalizeContext<'_>) -> Result<QueryOptions, GatewayError> {
    let mut table = ctx.table.to_string();
    if let Some(alias) = &query.alias {
        table.push(' ');
        table.push_str(alias);
    }

    let clause = query.where_clause.unwrap_or_default();
    let where_clause = match (clause, ctx.schema) {
        (WhereClause::Map(map), Some(schema)) if query.joins.is_empty() => {
            let mut validated = IndexMap::with_capacity(map.len());
            for (key, expr) in map {
                let key = key.trim().to_string();
                if schema.has_field(&key) {
                    let expr = match schema.field_type(&key) {
                        // bound parameters are the caller's responsibility
                        Some(field_type) if !query.bind.contains_key(&key) => {
                            coerce_expr(field_type, expr)
                        }
                        _ => expr,
                    };
                    validated.insert(key, expr);
                } else if is_expression_key(&key) {
                    validated.insert(key, expr);
                } else if ctx.strict {
                    return Err(GatewayError::InvalidExpression { key });
                } else {
                    tracing::warn!(
                        "[OPTIONS] model: {} dropping unknown where key: {}",
                        ctx.model,
                        key
                    );
                }
            }
            WhereClause::Map(validated)
        }
        (clause, _) => clause,
    };

    Ok(QueryOptions {
        model: ctx.model.to_string(),
        table,
        where_clause,
        fields: query.fields,
        distinct: query.distinct,
        limit: query.limit,
        offset: query.offset,
        order: query.order,
        group: query.group,
        having: query.having,
        joins: query.joins,
        bind: query.bind,
        cache: query.cache,
        index: query.index,
        lock: query.lock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescription;

    fn users_schema() -> Schema {
        Schema::from_fields(
            "app_user",
            vec![
                FieldDescription::new("id", "integer", true, true),
                FieldDescription::new("name", "character varying(255)", false, false),
                FieldDescription::new("score", "double precision", false, false),
            ],
        )
    }

    fn ctx<'a>(schema: &'a Schema, strict: bool) -> FinalizeContext<'a> {
        FinalizeContext {
            model: "User",
            table: "app_user",
            strict,
            schema: Some(schema),
        }
    }

    #[test]
    fn test_table_from_model() {
        assert_eq!(table_from_model("User"), "user");
        assert_eq!(table_from_model("OrderItem"), "order_item");
        assert_eq!(table_from_model("blog"), "blog");
    }

    #[test]
    fn test_alias_is_appended() {
        let schema = users_schema();
        let options = finalize(Query::new().alias("u"), &ctx(&schema, true)).unwrap();
        assert_eq!(options.table, "app_user u");
    }

    #[test]
    fn test_scalar_values_coerced_to_column_class() {
        let schema = users_schema();
        let query = Query::new()
            .where_eq("id", "42")
            .where_eq("score", "1.5")
            .where_eq("name", "alice");
        let options = finalize(query, &ctx(&schema, true)).unwrap();
        assert_eq!(
            options.where_clause.get("id"),
            Some(&WhereExpr::Eq(SqlValue::Int(42)))
        );
        assert_eq!(
            options.where_clause.get("score"),
            Some(&WhereExpr::Eq(SqlValue::Float(1.5)))
        );
        assert_eq!(
            options.where_clause.get("name"),
            Some(&WhereExpr::Eq(SqlValue::Text("alice".into())))
        );
    }

    #[test]
    fn test_bound_keys_skip_coercion() {
        let schema = users_schema();
        let query = Query::new().where_eq("id", "42").bind("id", "42");
        let options = finalize(query, &ctx(&schema, true)).unwrap();
        assert_eq!(
            options.where_clause.get("id"),
            Some(&WhereExpr::Eq(SqlValue::Text("42".into())))
        );
    }

    #[test]
    fn test_marker_keys_pass_through() {
        let schema = users_schema();
        let query = Query::new()
            .where_expr("0", WhereExpr::Raw("score > id".into()))
            .where_expr("_string", WhereExpr::Raw("name IS NOT NULL".into()))
            .where_expr("u.name", WhereExpr::Eq(SqlValue::Text("a".into())))
            .where_expr("id|score", WhereExpr::Eq(SqlValue::Int(1)))
            .where_expr("lower(name)", WhereExpr::Eq(SqlValue::Text("a".into())));
        let options = finalize(query, &ctx(&schema, true)).unwrap();
        match options.where_clause {
            WhereClause::Map(map) => assert_eq!(map.len(), 5),
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_strict_mode_rejects_unknown_key() {
        let schema = users_schema();
        let query = Query::new().where_eq("bogus", 1i64);
        let err = finalize(query, &ctx(&schema, true)).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::InvalidExpression { key } if key == "bogus"
        ));
    }

    #[test]
    fn test_lenient_mode_drops_unknown_key() {
        let schema = users_schema();
        let query = Query::new().where_eq("bogus", 1i64).where_eq("id", 5i64);
        let options = finalize(query, &ctx(&schema, false)).unwrap();
        match options.where_clause {
            WhereClause::Map(map) => {
                assert_eq!(map.len(), 1);
                assert!(map.contains_key("id"));
            }
            other => panic!("unexpected clause: {:?}", other),
        }
    }

    #[test]
    fn test_join_queries_skip_validation() {
        let schema = users_schema();
        let query = Query::new()
            .join("LEFT JOIN app_profile p ON p.user_id = id")
            .where_eq("bogus", 1i64);
        let options = finalize(query, &ctx(&schema, true)).unwrap();
        assert!(options.where_clause.get("bogus").is_some());
    }

    #[test]
    fn test_explicit_table_skips_validation() {
        let query = Query::new().where_eq("anything", 1i64);
        let options = finalize(
            query,
            &FinalizeContext {
                model: "User",
                table: "other_table",
                strict: true,
                schema: None,
            },
        )
        .unwrap();
        assert!(options.where_clause.get("anything").is_some());
    }
}
