//! Live PostgreSQL round trip, ignored by default.
//!
//! Run with a reachable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use std::sync::Arc;

use tablewerk::table_gateway::{
    AddResult, ChangeSet, DeleteOutcome, Driver, GatewaySettings, PgDriver, Query, Row,
    SchemaCache, SqlArgs, TableGateway,
};

async fn live_gateway() -> (Arc<PgDriver>, TableGateway) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect");
    let driver = Arc::new(PgDriver::new(pool));
    let gateway = TableGateway::new(
        Arc::clone(&driver) as Arc<dyn Driver>,
        Arc::new(SchemaCache::new(None)),
        GatewaySettings::new("WerkProbe").strict(true),
    );
    (driver, gateway)
}

#[tokio::test]
#[ignore]
async fn test_live_round_trip() {
    let (_driver, gateway) = live_gateway().await;

    gateway
        .execute("DROP TABLE IF EXISTS __TABLE__", SqlArgs::Tokens)
        .await
        .unwrap();
    gateway
        .execute(
            "CREATE TABLE __TABLE__ (id serial PRIMARY KEY, name varchar(64), hits integer DEFAULT 0)",
            SqlArgs::Tokens,
        )
        .await
        .unwrap();

    let added = gateway
        .add(Row::new().with("name", "probe"), Query::new())
        .await
        .unwrap();
    let id = match added {
        AddResult::Inserted(id) => id,
        other => panic!("expected generated id, got {:?}", other),
    };

    let row = gateway
        .find(Query::new().where_eq("id", id))
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(row.get_text("name"), Some("probe"));

    let affected = gateway
        .save(
            ChangeSet::new().set("id", id).increment("hits", 5i64),
            Query::new(),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let row = gateway
        .find(Query::new().where_eq("id", id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get_int("hits"), Some(5));

    assert_eq!(
        gateway.delete(Query::new().where_eq("id", id)).await.unwrap(),
        DeleteOutcome::Deleted(1)
    );

    gateway
        .execute("DROP TABLE __TABLE__", SqlArgs::Tokens)
        .await
        .unwrap();
}
