//! SQL rendering
//!
//! Turns finalized options and change sets into `$N`-placeholder SQL
//! plus the argument list to bind, shared by every SQL driver.

use crate::driver::DriverError;
use crate::options::{QueryOptions, WhereClause, WhereExpr};
use crate::row::Row;
use crate::update::ChangeSet;
use indexmap::IndexMap;
use regex_lite::Regex;
use std::sync::OnceLock;
use type_mapping::SqlValue;

fn bind_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid bind pattern"))
}

/// Statement renderer; every public method returns the SQL text and
/// the ordered arguments for its `$N` placeholders.
pub struct SqlRenderer {
    args: Vec<SqlValue>,
}

impl SqlRenderer {
    fn new() -> Self {
        Self { args: Vec::new() }
    }

    fn push(&mut self, value: SqlValue) -> String {
        self.args.push(value);
        format!("${}", self.args.len())
    }

    pub fn select(options: &QueryOptions) -> Result<(String, Vec<SqlValue>), DriverError> {
        let mut renderer = Self::new();

        let fields = if options.fields.is_empty() {
            "*".to_string()
        } else {
            options.fields.join(", ")
        };

        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if options.distinct { "DISTINCT " } else { "" },
            fields,
            options.table
        );
        for join in &options.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        let where_sql = renderer.where_sql(&options.where_clause, &options.bind)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        if let Some(group) = &options.group {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }
        if let Some(having) = &options.having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }
        if !options.order.is_empty() {
            let entries: Vec<String> = options
                .order
                .iter()
                .map(|(field, order)| format!("{} {}", field, order.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&entries.join(", "));
        }
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = options.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        if options.lock {
            sql.push_str(" FOR UPDATE");
        }

        Ok((sql, renderer.args))
    }

    pub fn insert(
        row: &Row,
        options: &QueryOptions,
        replace: bool,
    ) -> Result<(String, Vec<SqlValue>), DriverError> {
        let mut renderer = Self::new();

        let columns: Vec<&str> = row.fields().collect();
        let placeholders: Vec<String> = row
            .iter()
            .map(|(_, value)| renderer.push(value.clone()))
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            options.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        if replace {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }

        Ok((sql, renderer.args))
    }

    /// Bulk insert; column order comes from the first row, later rows
    /// fill missing fields with NULL
    pub fn insert_all(
        rows: &[Row],
        options: &QueryOptions,
        replace: bool,
    ) -> Result<(String, Vec<SqlValue>), DriverError> {
        let first = rows
            .first()
            .ok_or_else(|| DriverError::Render("bulk insert of zero rows".to_string()))?;
        let columns: Vec<String> = first.fields().map(str::to_string).collect();

        let mut renderer = Self::new();
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let placeholders: Vec<String> = columns
                .iter()
                .map(|column| {
                    renderer.push(row.get(column).cloned().unwrap_or(SqlValue::Null))
                })
                .collect();
            tuples.push(format!("({})", placeholders.join(", ")));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            options.table,
            columns.join(", "),
            tuples.join(", ")
        );
        if replace {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }

        Ok((sql, renderer.args))
    }

    pub fn update(
        changes: &ChangeSet,
        options: &QueryOptions,
    ) -> Result<(String, Vec<SqlValue>), DriverError> {
        let mut renderer = Self::new();

        let assignments: Vec<String> = changes
            .iter()
            .map(|(field, update)| {
                renderer.args.push(update.value().clone());
                update.to_sql(field, renderer.args.len())
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", options.table, assignments.join(", "));
        let where_sql = renderer.where_sql(&options.where_clause, &options.bind)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        Ok((sql, renderer.args))
    }

    pub fn delete(options: &QueryOptions) -> Result<(String, Vec<SqlValue>), DriverError> {
        let mut renderer = Self::new();
        let mut sql = format!("DELETE FROM {}", options.table);
        let where_sql = renderer.where_sql(&options.where_clause, &options.bind)?;
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        Ok((sql, renderer.args))
    }

    /// Where fragment alone (no `WHERE` keyword), used by templating
    pub fn where_clause(options: &QueryOptions) -> Result<(String, Vec<SqlValue>), DriverError> {
        let mut renderer = Self::new();
        let sql = renderer.where_sql(&options.where_clause, &options.bind)?;
        Ok((sql, renderer.args))
    }

    fn where_sql(
        &mut self,
        clause: &WhereClause,
        bind: &IndexMap<String, SqlValue>,
    ) -> Result<String, DriverError> {
        match clause {
            WhereClause::Raw(sql) => {
                if sql.trim().is_empty() {
                    Ok(String::new())
                } else {
                    Ok(self.raw_binds(sql, bind))
                }
            }
            WhereClause::Map(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (key, expr) in map {
                    parts.push(self.entry_sql(key, expr, bind)?);
                }
                Ok(parts.join(" AND "))
            }
        }
    }

    /// Substitute `:name` references in a raw fragment from the bind
    /// map, turning each into a placeholder
    fn raw_binds(&mut self, sql: &str, bind: &IndexMap<String, SqlValue>) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut last = 0;
        for caps in bind_pattern().captures_iter(sql) {
            let whole = caps.get(0).expect("match has a range");
            let name = &caps[1];
            out.push_str(&sql[last..whole.start()]);
            match bind.get(name) {
                Some(value) => {
                    let placeholder = self.push(value.clone());
                    out.push_str(&placeholder);
                }
                None => out.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        out.push_str(&sql[last..]);
        out
    }

    fn entry_sql(
        &mut self,
        key: &str,
        expr: &WhereExpr,
        bind: &IndexMap<String, SqlValue>,
    ) -> Result<String, DriverError> {
        // numeric-index and underscore keys carry raw fragments
        if key.parse::<usize>().is_ok() || key.starts_with('_') {
            return match expr {
                WhereExpr::Raw(sql) => Ok(format!("({})", self.raw_binds(sql, bind))),
                other => Err(DriverError::Render(format!(
                    "raw marker key {} needs a raw expression, got {:?}",
                    key, other
                ))),
            };
        }
        // composite keys apply the expression to each field
        if key.contains('|') {
            let parts: Result<Vec<String>, DriverError> = key
                .split('|')
                .map(|field| self.expr_sql(field.trim(), expr))
                .collect();
            return Ok(format!("({})", parts?.join(" OR ")));
        }
        if key.contains('&') {
            let parts: Result<Vec<String>, DriverError> = key
                .split('&')
                .map(|field| self.expr_sql(field.trim(), expr))
                .collect();
            return Ok(format!("({})", parts?.join(" AND ")));
        }
        self.expr_sql(key, expr)
    }

    fn expr_sql(&mut self, field: &str, expr: &WhereExpr) -> Result<String, DriverError> {
        Ok(match expr {
            WhereExpr::Eq(SqlValue::Null) => format!("{} IS NULL", field),
            WhereExpr::Eq(value) => {
                let placeholder = self.push(value.clone());
                format!("{} = {}", field, placeholder)
            }
            WhereExpr::Cmp(op, value) => {
                let placeholder = self.push(value.clone());
                format!("{} {} {}", field, op.as_sql(), placeholder)
            }
            WhereExpr::In(values) => {
                if values.is_empty() {
                    // empty IN can never match
                    "1=0".to_string()
                } else {
                    let placeholders: Vec<String> =
                        values.iter().map(|v| self.push(v.clone())).collect();
                    format!("{} IN ({})", field, placeholders.join(", "))
                }
            }
            WhereExpr::NotIn(values) => {
                if values.is_empty() {
                    "1=1".to_string()
                } else {
                    let placeholders: Vec<String> =
                        values.iter().map(|v| self.push(v.clone())).collect();
                    format!("{} NOT IN ({})", field, placeholders.join(", "))
                }
            }
            WhereExpr::Between(low, high) => {
                let low = self.push(low.clone());
                let high = self.push(high.clone());
                format!("{} BETWEEN {} AND {}", field, low, high)
            }
            WhereExpr::Like(pattern) => {
                let placeholder = self.push(SqlValue::Text(pattern.clone()));
                format!("{} LIKE {}", field, placeholder)
            }
            WhereExpr::NotLike(pattern) => {
                let placeholder = self.push(SqlValue::Text(pattern.clone()));
                format!("{} NOT LIKE {}", field, placeholder)
            }
            WhereExpr::IsNull => format!("{} IS NULL", field),
            WhereExpr::IsNotNull => format!("{} IS NOT NULL", field),
            WhereExpr::Raw(fragment) => format!("{} {}", field, fragment),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{finalize, CompareOp, FinalizeContext, Query, SortOrder};

    fn options(query: Query) -> QueryOptions {
        finalize(
            query,
            &FinalizeContext {
                model: "User",
                table: "app_user",
                strict: false,
                schema: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_select_full_shape() {
        let opts = options(
            Query::new()
                .fields("id,name")
                .where_eq("status", 1i64)
                .order_by("id", SortOrder::Desc)
                .limit(10)
                .offset(20),
        );
        let (sql, args) = SqlRenderer::select(&opts).unwrap();
        assert_eq!(
            sql,
            "SELECT id, name FROM app_user WHERE status = $1 ORDER BY id DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(args, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_select_distinct_lock_and_join() {
        let opts = options(
            Query::new()
                .distinct()
                .join("LEFT JOIN app_profile p ON p.user_id = id")
                .lock(),
        );
        let (sql, args) = SqlRenderer::select(&opts).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT * FROM app_user LEFT JOIN app_profile p ON p.user_id = id FOR UPDATE"
        );
        assert!(args.is_empty());
    }

    #[test]
    fn test_where_operators() {
        let opts = options(
            Query::new()
                .where_expr("age", WhereExpr::Cmp(CompareOp::Gte, SqlValue::Int(18)))
                .where_expr("status", WhereExpr::In(vec![SqlValue::Int(1), SqlValue::Int(2)]))
                .where_expr("name", WhereExpr::Like("a%".to_string()))
                .where_expr("deleted_at", WhereExpr::IsNull),
        );
        let (sql, args) = SqlRenderer::where_clause(&opts).unwrap();
        assert_eq!(
            sql,
            "age >= $1 AND status IN ($2, $3) AND name LIKE $4 AND deleted_at IS NULL"
        );
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_empty_in_never_matches() {
        let opts = options(Query::new().where_expr("id", WhereExpr::In(vec![])));
        let (sql, args) = SqlRenderer::where_clause(&opts).unwrap();
        assert_eq!(sql, "1=0");
        assert!(args.is_empty());
    }

    #[test]
    fn test_composite_or_key() {
        let opts = options(Query::new().where_expr("name|email", WhereExpr::Eq(SqlValue::Text("x".into()))));
        let (sql, args) = SqlRenderer::where_clause(&opts).unwrap();
        assert_eq!(sql, "(name = $1 OR email = $2)");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_numeric_key_is_raw_fragment() {
        let opts = options(Query::new().where_expr("0", WhereExpr::Raw("score > best".into())));
        let (sql, _) = SqlRenderer::where_clause(&opts).unwrap();
        assert_eq!(sql, "(score > best)");
    }

    #[test]
    fn test_numeric_key_rejects_non_raw() {
        let opts = options(Query::new().where_expr("0", WhereExpr::Eq(SqlValue::Int(1))));
        assert!(SqlRenderer::where_clause(&opts).is_err());
    }

    #[test]
    fn test_raw_where_with_named_binds() {
        let opts = options(
            Query::new()
                .where_raw("id = :id AND name = :name")
                .bind("id", 5i64)
                .bind("name", "alice"),
        );
        let (sql, args) = SqlRenderer::where_clause(&opts).unwrap();
        assert_eq!(sql, "id = $1 AND name = $2");
        assert_eq!(args, vec![SqlValue::Int(5), SqlValue::Text("alice".into())]);
    }

    #[test]
    fn test_insert() {
        let row = Row::new().with("name", "alice").with("score", 10i64);
        let opts = options(Query::new());
        let (sql, args) = SqlRenderer::insert(&row, &opts, false).unwrap();
        assert_eq!(sql, "INSERT INTO app_user (name, score) VALUES ($1, $2)");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_insert_all_uses_first_row_columns() {
        let rows = vec![
            Row::new().with("a", 1i64).with("b", 2i64),
            Row::new().with("a", 3i64),
        ];
        let opts = options(Query::new());
        let (sql, args) = SqlRenderer::insert_all(&rows, &opts, false).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO app_user (a, b) VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(args[3], SqlValue::Null);
    }

    #[test]
    fn test_update_with_relative_ops() {
        let changes = ChangeSet::new().set("name", "bob").increment("views", 3i64);
        let opts = options(Query::new().where_eq("id", 5i64));
        let (sql, args) = SqlRenderer::update(&changes, &opts).unwrap();
        assert_eq!(
            sql,
            "UPDATE app_user SET name = $1, views = views + $2 WHERE id = $3"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_delete_scoped() {
        let opts = options(Query::new().where_eq("id", 5i64));
        let (sql, args) = SqlRenderer::delete(&opts).unwrap();
        assert_eq!(sql, "DELETE FROM app_user WHERE id = $1");
        assert_eq!(args, vec![SqlValue::Int(5)]);
    }
}
