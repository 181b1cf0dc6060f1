use bson::{Bson, doc};
use docquery::{Command, Context, ErrorKind, MemoryBackend, QueryConfig};

fn ctx() -> Context {
    Context::new(MemoryBackend::default())
}

#[test]
fn where_fragments_merge_last_write_wins() {
    let q = ctx().collection("users").filter(doc! { "a": 1, "b": 1 }).filter(doc! { "b": 2, "c": 3 });
    assert_eq!(q.state().filter, doc! { "a": 1, "b": 2, "c": 3 });
}

#[test]
fn not_tests_for_falsy_or_absent() {
    let q = ctx().collection("users").not("archived");
    let cond = q.state().filter.get_document("archived").unwrap();
    let set = cond.get_array("$in").unwrap();
    assert_eq!(set, &vec![Bson::Boolean(false), Bson::Null, Bson::Undefined, Bson::Int32(0)]);
}

#[test]
fn select_accepts_field_lists_and_documents() {
    let q = ctx().collection("users").select(["name", "info.age"]);
    assert_eq!(q.state().projection, Some(doc! { "name": true, "info.age": true }));
    let q = q.select(doc! { "secret": false });
    assert_eq!(q.state().projection, Some(doc! { "secret": false }));
}

#[test]
fn new_queries_start_with_safe_writes() {
    let q = ctx().collection("users");
    assert_eq!(q.state().options, doc! { "safe": true });
    assert_eq!(q.state().command, Command::Read);

    let cfg = QueryConfig { safe_writes: false, default_options: doc! { "w": 1 }, ..QueryConfig::default() };
    let q = ctx().with_config(cfg).collection("users").options(doc! { "j": true });
    assert_eq!(q.state().options, doc! { "safe": false, "w": 1, "j": true });
}

#[test]
fn paging_and_aliases() {
    let q = ctx().collection("users").order_by(doc! { "age": -1 }).take(5).skip(10);
    assert_eq!(q.state().sort, Some(doc! { "age": -1 }));
    assert_eq!(q.state().limit, Some(5));
    assert_eq!(q.state().skip, Some(10));
}

#[test]
fn clone_is_an_independent_template() {
    let original = ctx()
        .collection("users")
        .filter(doc! { "a": 1 })
        .select(["a"])
        .options(doc! { "x": 1 })
        .expect(2)
        .update(doc! { "$set": { "a": 2 } });
    let copy = original.clone().filter(doc! { "b": 2 }).options(doc! { "y": 2 });

    assert_eq!(original.state().filter, doc! { "a": 1 });
    assert_eq!(original.state().options, doc! { "safe": true, "x": 1 });
    assert_eq!(copy.state().filter, doc! { "a": 1, "b": 2 });
    assert_eq!(copy.state().projection, original.state().projection);
    assert_eq!(copy.state().collection.as_deref(), Some("users"));
    // command and expectation belong to the original only
    assert_eq!(copy.state().command, Command::Read);
    assert_eq!(copy.state().expected, None);
}

#[test]
fn collection_starts_a_fresh_query() {
    let base = ctx().collection("users").filter(doc! { "a": 1 });
    let other = base.collection("orders");
    assert_eq!(other.state().collection.as_deref(), Some("orders"));
    assert!(other.state().filter.is_empty());
    assert_eq!(base.state().collection.as_deref(), Some("users"));
    assert_eq!(base.from("items").state().collection.as_deref(), Some("items"));
}

#[test]
fn by_id_normalizes_and_selects_one() {
    let q = ctx().collection("users").by_id("a1");
    assert_eq!(q.state().filter, doc! { "_id": { "$oid": "a1" } });
    assert_eq!(q.state().limit, Some(1));
    assert!(q.state().first);

    let canonical = doc! { "$oid": "b2" };
    let q = ctx().collection("users").by_id(canonical.clone());
    assert_eq!(q.state().filter.get_document("_id").unwrap(), &canonical);

    let q = ctx().collection("users").by_id(42);
    assert_eq!(q.state().filter, doc! { "_id": { "$oid": "42" } });
}

#[test]
fn blank_id_is_recorded_not_thrown() {
    for blank in [Bson::String(String::new()), Bson::Null, Bson::Boolean(false), Bson::Int32(0)] {
        let q = ctx().collection("users").by_id(blank);
        let err = q.state().error.clone().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("blank"));
    }
}

#[test]
fn by_ids_builds_in_clause_and_caps_limit() {
    let q = ctx().collection("users").by_ids(vec!["a1", "b2", "c3"]);
    assert_eq!(
        q.state().filter,
        doc! { "_id": { "$in": [{ "$oid": "a1" }, { "$oid": "b2" }, { "$oid": "c3" }] } }
    );
    assert_eq!(q.state().limit, Some(3));
}

#[test]
fn by_ids_rejects_non_arrays() {
    let q = ctx().collection("users").by_ids("a1");
    let err = q.state().error.clone().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("Array"));
}

#[test]
fn first_error_wins() {
    let q = ctx().collection("users").by_ids(7).by_id("");
    assert!(q.state().error.clone().unwrap().to_string().contains("Array"));
}

#[test]
fn expect_rejects_non_numbers() {
    let q = ctx().collection("users").expect(2);
    assert_eq!(q.state().expected, Some(2));
    assert!(q.state().error.is_none());

    for bad in [Bson::String("1".into()), Bson::Double(f64::NAN), Bson::Double(1.5), Bson::Int32(-1)] {
        let q = ctx().collection("users").expect(bad);
        assert_eq!(q.state().error.clone().unwrap().kind(), ErrorKind::InvalidArgument);
        assert!(q.state().error.clone().unwrap().to_string().contains("number"));
    }
}

#[test]
fn first_and_default() {
    let q = ctx().collection("users").first_or_default(doc! { "name": "nobody" });
    assert!(q.state().first);
    assert_eq!(q.state().limit, Some(1));
    assert_eq!(q.state().default, Some(doc! { "name": "nobody" }));
}

#[test]
fn command_setters_replace_the_pending_command() {
    let q = ctx().collection("users").count();
    assert_eq!(q.state().command, Command::Count);
    let q = q.insert(doc! { "a": 1 });
    assert_eq!(q.state().command, Command::Insert(vec![doc! { "a": 1 }]));
    let q = q.remove_all();
    assert_eq!(q.state().command, Command::RemoveAll);
}

#[test]
fn drop_with_name_retargets() {
    let q = ctx().collection("users").drop_collection(Some("archive"));
    assert_eq!(q.state().collection.as_deref(), Some("archive"));
    assert_eq!(q.state().command, Command::Drop(Some("archive".into())));
}

#[test]
fn command_by_name() {
    let q = ctx().collection("users").command_named("modify_and_find", Some(Bson::Document(doc! { "$set": { "a": 1 } })));
    assert_eq!(q.state().command, Command::ModifyAndFind(doc! { "$set": { "a": 1 } }));

    let q = ctx().collection("users").command_named("removeAll", None);
    assert_eq!(q.state().command, Command::RemoveAll);

    let q = ctx().collection("users").command_named("explode", None);
    assert_eq!(q.state().command, Command::Read);
    assert_eq!(q.state().error.clone().unwrap().kind(), ErrorKind::UnknownCommand);

    let q = ctx().collection("users").command_named("update", None);
    assert_eq!(q.state().error.clone().unwrap().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn json_fragments_merge_like_documents() {
    let q = ctx()
        .collection("users")
        .filter(doc! { "a": 1 })
        .filter_json(r#"{"b": {"$gt": 2}, "_id": {"$oid": "a1"}}"#);
    assert_eq!(q.state().filter, doc! { "a": 1, "b": { "$gt": 2_i64 }, "_id": { "$oid": "a1" } });
    assert!(q.state().error.is_none());
}

#[test]
fn malformed_json_fragment_is_recorded() {
    let q = ctx().collection("users").filter_json("not json").filter_json("[1]");
    let err = q.state().error.clone().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("JSON"));
}
