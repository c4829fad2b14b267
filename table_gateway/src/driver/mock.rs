//! Scriptable mock driver
//!
//! Records every call and replays queued responses so gateway
//! behavior can be tested without a database.

use crate::driver::{escape_literal, Driver, DriverError};
use crate::options::QueryOptions;
use crate::row::Row;
use crate::schema::FieldDescription;
use crate::update::ChangeSet;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use type_mapping::SqlValue;

/// One recorded driver call
#[derive(Debug, Clone)]
pub enum MockCall {
    Insert {
        table: String,
        row: Row,
        replace: bool,
    },
    InsertAll {
        table: String,
        count: usize,
    },
    Update {
        changes: ChangeSet,
        options: QueryOptions,
    },
    Delete {
        options: QueryOptions,
    },
    Select {
        options: QueryOptions,
    },
    Query {
        sql: String,
    },
    Execute {
        sql: String,
    },
    Begin,
    Commit,
    Rollback,
}

/// In-memory driver for tests: queued select results, a configurable
/// insert id, a fixed affected count, and a full call log.
pub struct MockDriver {
    fields: Vec<FieldDescription>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    insert_id: Mutex<Option<i64>>,
    affected: u64,
    calls: Mutex<Vec<MockCall>>,
}

impl MockDriver {
    pub fn new(fields: Vec<FieldDescription>) -> Self {
        Self {
            fields,
            rows: Mutex::new(VecDeque::new()),
            insert_id: Mutex::new(None),
            affected: 1,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// Queue the result set returned by the next select or query
    pub fn queue_rows(&self, rows: Vec<Row>) {
        self.rows.lock().expect("mock lock").push_back(rows);
    }

    pub fn set_insert_id(&self, id: Option<i64>) {
        *self.insert_id.lock().expect("mock lock") = id;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("mock lock").clone()
    }

    /// Number of recorded select calls
    pub fn select_count(&self) -> usize {
        self.calls
            .lock()
            .expect("mock lock")
            .iter()
            .filter(|call| matches!(call, MockCall::Select { .. }))
            .count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().expect("mock lock").push(call);
    }

    fn next_rows(&self) -> Vec<Row> {
        self.rows
            .lock()
            .expect("mock lock")
            .pop_front()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn insert(
        &self,
        row: &Row,
        options: &QueryOptions,
        replace: bool,
    ) -> Result<u64, DriverError> {
        self.record(MockCall::Insert {
            table: options.table.clone(),
            row: row.clone(),
            replace,
        });
        Ok(self.affected)
    }

    async fn insert_all(
        &self,
        rows: &[Row],
        options: &QueryOptions,
        _replace: bool,
    ) -> Result<u64, DriverError> {
        self.record(MockCall::InsertAll {
            table: options.table.clone(),
            count: rows.len(),
        });
        Ok(rows.len() as u64)
    }

    async fn update(
        &self,
        changes: &ChangeSet,
        options: &QueryOptions,
    ) -> Result<u64, DriverError> {
        self.record(MockCall::Update {
            changes: changes.clone(),
            options: options.clone(),
        });
        Ok(self.affected)
    }

    async fn delete(&self, options: &QueryOptions) -> Result<u64, DriverError> {
        self.record(MockCall::Delete {
            options: options.clone(),
        });
        Ok(self.affected)
    }

    async fn select(&self, options: &QueryOptions) -> Result<Vec<Row>, DriverError> {
        self.record(MockCall::Select {
            options: options.clone(),
        });
        Ok(self.next_rows())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        self.record(MockCall::Query {
            sql: sql.to_string(),
        });
        Ok(self.next_rows())
    }

    async fn execute(&self, sql: &str) -> Result<u64, DriverError> {
        self.record(MockCall::Execute {
            sql: sql.to_string(),
        });
        Ok(self.affected)
    }

    async fn describe_fields(&self, _table: &str) -> Result<Vec<FieldDescription>, DriverError> {
        Ok(self.fields.clone())
    }

    async fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        Ok(*self.insert_id.lock().expect("mock lock"))
    }

    async fn begin(&self) -> Result<(), DriverError> {
        self.record(MockCall::Begin);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DriverError> {
        self.record(MockCall::Commit);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DriverError> {
        self.record(MockCall::Rollback);
        Ok(())
    }

    fn escape(&self, value: &SqlValue) -> String {
        escape_literal(value)
    }
}
