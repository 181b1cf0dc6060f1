use bson::doc;
use docquery::memory::Op;
use docquery::{Catalog, Context, ErrorKind, MemoryBackend, Outcome};

#[tokio::test]
async fn lists_collections_without_namespace() {
    let db = MemoryBackend::new("shop");
    db.seed("users", vec![doc! { "name": "ada" }]);
    db.seed("orders", vec![doc! { "total": 3 }, doc! { "total": 4 }]);
    let catalog = Catalog::connect(Context::new(db)).await.unwrap();

    assert_eq!(catalog.names(), &["orders".to_string(), "users".to_string()]);
    assert!(catalog.contains("orders"));
    assert!(!catalog.contains("shop.orders"));
}

#[tokio::test]
async fn get_hands_out_targeted_queries() {
    let db = MemoryBackend::new("shop");
    db.seed("orders", vec![doc! { "total": 3 }, doc! { "total": 4 }]);
    let catalog = Catalog::connect(Context::new(db)).await.unwrap();

    let n = catalog.get("orders").unwrap().count().execute().await.unwrap();
    assert_eq!(n, Outcome::Count(2));

    let err = catalog.get("missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let q = catalog.query();
    assert!(q.state().collection.is_none());
    assert_eq!(q.collection("orders").state().collection.as_deref(), Some("orders"));
}

#[tokio::test]
async fn listing_failure_propagates() {
    let db = MemoryBackend::new("shop");
    db.fail_next(Op::Names, "listing refused");
    let err = Catalog::connect(Context::new(db)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
}
