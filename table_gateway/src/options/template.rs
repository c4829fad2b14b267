//! Raw-SQL templating
//!
//! Three substitution modes for pass-through SQL: reserved-token
//! replacement, escaped positional arguments, and expression-aware
//! rendering from finalized options.

use crate::driver::{DriverError, SqlRenderer};
use crate::options::{Query, QueryOptions};
use regex_lite::Regex;
use std::sync::OnceLock;
use type_mapping::SqlValue;

/// How a raw SQL string should be prepared before execution
#[derive(Debug, Clone)]
pub enum SqlArgs {
    /// Reserved-token substitution only: `__TABLE__`, `__PREFIX__`,
    /// and generic `__TOKEN__` to `prefix + lowercase(token)`
    Tokens,
    /// Ordinal `$N` placeholders replaced with escaped literals
    Values(Vec<SqlValue>),
    /// Slot template rendered from finalized query options
    Options(Query),
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"__([A-Z0-9_-]+?)__").expect("valid token pattern"))
}

pub struct SqlTemplate;

impl SqlTemplate {
    /// Reserved-token substitution. `__TABLE__` and `__PREFIX__` are
    /// replaced first so the generic rule never sees them.
    pub fn substitute(sql: &str, table: &str, prefix: &str) -> String {
        let sql = sql.replace("__TABLE__", table).replace("__PREFIX__", prefix);
        token_pattern()
            .replace_all(&sql, |caps: &regex_lite::Captures<'_>| {
                format!("{}{}", prefix, caps[1].to_lowercase())
            })
            .into_owned()
    }

    /// Replace `$1..$N` ordinals with driver-escaped literals.
    ///
    /// Replacement runs from the highest ordinal down so `$12` is
    /// never clipped by `$1`.
    pub fn positional(sql: &str, args: &[SqlValue], escape: &dyn Fn(&SqlValue) -> String) -> String {
        let mut out = sql.to_string();
        for (i, value) in args.iter().enumerate().rev() {
            out = out.replace(&format!("${}", i + 1), &escape(value));
        }
        out
    }

    /// Render a slot template (`%TABLE%`, `%FIELD%`, `%WHERE%`,
    /// `%ORDER%`, `%LIMIT%`) from finalized options. Where arguments
    /// are inlined through the driver's escape since the statement is
    /// executed without binds.
    pub fn render(
        template: &str,
        options: &QueryOptions,
        escape: &dyn Fn(&SqlValue) -> String,
    ) -> Result<String, DriverError> {
        let fields = if options.fields.is_empty() {
            "*".to_string()
        } else {
            options.fields.join(", ")
        };

        let (where_fragment, args) = SqlRenderer::where_clause(options)?;
        let where_piece = if where_fragment.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", Self::positional(&where_fragment, &args, escape))
        };

        let order_piece = if options.order.is_empty() {
            String::new()
        } else {
            let entries: Vec<String> = options
                .order
                .iter()
                .map(|(field, order)| format!("{} {}", field, order.as_sql()))
                .collect();
            format!("ORDER BY {}", entries.join(", "))
        };

        let mut limit_piece = String::new();
        if let Some(limit) = options.limit {
            limit_piece.push_str(&format!("LIMIT {}", limit));
        }
        if let Some(offset) = options.offset {
            if !limit_piece.is_empty() {
                limit_piece.push(' ');
            }
            limit_piece.push_str(&format!("OFFSET {}", offset));
        }

        Ok(template
            .replace("%TABLE%", &options.table)
            .replace("%FIELD%", &fields)
            .replace("%WHERE%", &where_piece)
            .replace("%ORDER%", &order_piece)
            .replace("%LIMIT%", &limit_piece))
    }
}
