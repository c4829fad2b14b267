//! End-to-end gateway flow over the mock driver and memory cache.
//!
//! Exercises the full command surface the way an application would:
//! insert with generated-id attach, cached reads, write invalidation,
//! counter buffering, and the delete guard.

use std::sync::Arc;

use tablewerk::cache_system::{CacheManager, CacheParams, CacheStore as _};
use tablewerk::table_gateway::driver::{MockCall, MockDriver};
use tablewerk::table_gateway::{
    AddResult, ChangeSet, CounterWrite, DeleteOutcome, Driver, FieldDescription, GatewaySettings,
    LazyWriteCoalescer, Query, ResultSet, Row, SchemaCache, Separator, SqlValue, TableGateway,
};

fn post_fields() -> Vec<FieldDescription> {
    vec![
        FieldDescription::new("id", "integer", true, true),
        FieldDescription::new("title", "character varying(255)", false, false),
        FieldDescription::new("views", "integer", false, false),
    ]
}

fn blog_gateway(driver: Arc<MockDriver>) -> (TableGateway, CacheParams) {
    let params = CacheParams::new(Arc::new(CacheManager::memory()), 120, "blog");
    let gateway = TableGateway::new(
        driver as Arc<dyn Driver>,
        Arc::new(SchemaCache::new(None)),
        GatewaySettings::new("Post").prefix("blog_").strict(true),
    )
    .with_cache(params.clone());
    (gateway, params)
}

#[tokio::test]
async fn test_insert_select_update_cycle() {
    let driver = Arc::new(MockDriver::new(post_fields()));
    driver.set_insert_id(Some(1));
    driver.queue_rows(vec![Row::new()
        .with("id", 1i64)
        .with("title", "hello")
        .with("views", 0i64)]);
    let (gateway, _) = blog_gateway(Arc::clone(&driver));

    // typed coercion happens on the way in: "0" becomes an integer
    let added = gateway
        .add(
            Row::new().with("title", "hello").with("views", "0"),
            Query::new(),
        )
        .await
        .unwrap();
    assert_eq!(added, AddResult::Inserted(1));
    match &driver.calls()[0] {
        MockCall::Insert { table, row, .. } => {
            assert_eq!(table, "blog_post");
            assert_eq!(row.get("views"), Some(&SqlValue::Int(0)));
        }
        other => panic!("unexpected call: {:?}", other),
    }

    let post = gateway
        .find(Query::new().where_eq("id", 1i64))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.get_text("title"), Some("hello"));

    // save with the pk in the payload derives the condition
    let affected = gateway
        .save(
            ChangeSet::new().set("id", 1i64).set("title", "hello again"),
            Query::new(),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn test_cached_read_survives_until_write() {
    let driver = Arc::new(MockDriver::new(post_fields()));
    driver.queue_rows(vec![Row::new().with("id", 1i64).with("title", "a")]);
    driver.queue_rows(vec![Row::new().with("id", 1i64).with("title", "b")]);
    let (gateway, _) = blog_gateway(Arc::clone(&driver));

    let query = || Query::new().where_eq("id", 1i64).cached();

    let first = gateway.select(query()).await.unwrap();
    let hit = gateway.select(query()).await.unwrap();
    assert_eq!(first, hit);
    assert_eq!(driver.select_count(), 1);

    gateway
        .save(
            ChangeSet::new().set("title", "b"),
            Query::new().where_eq("id", 1i64),
        )
        .await
        .unwrap();

    match gateway.select(query()).await.unwrap() {
        ResultSet::Rows(rows) => assert_eq!(rows[0].get_text("title"), Some("b")),
        other => panic!("unexpected shape: {:?}", other),
    }
    assert_eq!(driver.select_count(), 2);
}

#[tokio::test]
async fn test_counter_buffering_then_flush() {
    let driver = Arc::new(MockDriver::new(post_fields()));
    let (gateway, params) = blog_gateway(Arc::clone(&driver));

    let query = || Query::new().where_eq("id", 1i64);

    // two bumps inside the window: nothing reaches the driver
    assert_eq!(
        gateway.set_inc(query(), "views", 3, Some(60)).await.unwrap(),
        CounterWrite::Buffered
    );
    assert_eq!(
        gateway.set_inc(query(), "views", 4, Some(60)).await.unwrap(),
        CounterWrite::Buffered
    );
    assert!(driver.calls().is_empty());

    // age the buffer entry past the window, then bump once more
    let key = LazyWriteCoalescer::entry_key("Post", "views", query().where_ref());
    params
        .manager
        .store()
        .set(&key, r#"{"delta":7,"started_at":0}"#, None, &[])
        .await
        .unwrap();

    assert_eq!(
        gateway.set_inc(query(), "views", 1, Some(60)).await.unwrap(),
        CounterWrite::Applied(1)
    );
    match &driver.calls()[0] {
        MockCall::Update { changes, .. } => {
            let update = changes.get("views").unwrap();
            assert_eq!(update.value(), &SqlValue::Int(8));
        }
        other => panic!("unexpected call: {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_guard_and_scoped_delete() {
    let driver = Arc::new(MockDriver::new(post_fields()));
    let (gateway, _) = blog_gateway(Arc::clone(&driver));

    assert_eq!(
        gateway.delete(Query::new()).await.unwrap(),
        DeleteOutcome::Refused
    );
    assert!(driver.calls().is_empty());

    assert_eq!(
        gateway
            .delete(Query::new().where_eq("id", 1i64))
            .await
            .unwrap(),
        DeleteOutcome::Deleted(1)
    );
}

#[tokio::test]
async fn test_title_listing_via_get_field() {
    let driver = Arc::new(MockDriver::new(post_fields()));
    driver.queue_rows(vec![
        Row::new().with("id", 1i64).with("title", "first"),
        Row::new().with("id", 2i64).with("title", "second"),
    ]);
    let (gateway, _) = blog_gateway(Arc::clone(&driver));

    let titles = gateway
        .get_field(Query::new(), "id,title", Separator::Glue(",".into()))
        .await
        .unwrap();
    match titles {
        Some(tablewerk::table_gateway::FieldValues::Map(map)) => {
            assert_eq!(map.get("1"), Some(&SqlValue::Text("first".into())));
            assert_eq!(map.get("2"), Some(&SqlValue::Text("second".into())));
        }
        other => panic!("unexpected shape: {:?}", other),
    }
}
