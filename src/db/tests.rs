use super::*;
use crate::error::GraphError;
use crate::model::PropertyValue;
use crate::query::rows::ResultCell;
use tempfile::NamedTempFile;

fn open_temp() -> (NamedTempFile, KiteDB) {
    let tmp = NamedTempFile::new().expect("temp file");
    let db = KiteDB::open(tmp.path()).expect("open db");
    (tmp, db)
}

fn node_cell<'a>(row: &'a crate::query::rows::Row, var: &str) -> &'a ResultCell {
    row.get(var).expect("row has the identifier")
}

#[test]
fn create_then_match_with_where() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Person {name: \"Alice\", age: 30})")
        .expect("create");

    let rows = db
        .execute_query("MATCH (n:Person) WHERE n.name = \"Alice\" RETURN n")
        .expect("match");
    assert_eq!(rows.len(), 1);

    let ResultCell::Node {
        id,
        labels,
        properties,
    } = node_cell(&rows[0], "n")
    else {
        panic!("expected a node cell");
    };
    assert!(*id >= 1);
    assert_eq!(labels, &vec!["Person".to_string()]);
    assert_eq!(
        properties.get("name"),
        Some(&PropertyValue::String("Alice".into()))
    );
    assert_eq!(properties.get("age"), Some(&PropertyValue::Int(30)));
}

#[test]
fn set_overwrites_one_key_and_preserves_the_rest() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Person {name: \"Alice\", age: 30})")
        .expect("create");
    db.execute_query("MATCH (n:Person) WHERE n.name = \"Alice\" SET n.age = 31")
        .expect("set");

    let rows = db.execute_query("MATCH (n:Person) RETURN n").expect("match");
    assert_eq!(rows.len(), 1);
    let ResultCell::Node { properties, .. } = node_cell(&rows[0], "n") else {
        panic!("expected a node cell");
    };
    assert_eq!(
        properties.get("name"),
        Some(&PropertyValue::String("Alice".into()))
    );
    assert_eq!(properties.get("age"), Some(&PropertyValue::Int(31)));
}

#[test]
fn relationship_create_and_match() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Person {name:\"A\"})-[r:KNOWS {since:2020}]->(b:Person {name:\"B\"})")
        .expect("create");

    let rows = db
        .execute_query("MATCH ()-[r:KNOWS]->() RETURN r")
        .expect("match");
    assert_eq!(rows.len(), 1);
    let ResultCell::Edge {
        edge_type,
        source,
        target,
        properties,
        ..
    } = node_cell(&rows[0], "r")
    else {
        panic!("expected an edge cell");
    };
    assert_eq!(edge_type, "KNOWS");
    assert_eq!(properties.get("since"), Some(&PropertyValue::Int(2020)));
    assert_eq!((*source, *target), (1, 2));
}

#[test]
fn deleted_nodes_stop_matching() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Person {name:\"A\"})")
        .expect("create");
    db.execute_query("MATCH (n:Person) DELETE n").expect("delete");

    let rows = db.execute_query("MATCH (n:Person) RETURN n").expect("match");
    assert!(rows.is_empty());
}

#[test]
fn boolean_where_filters() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:User {name:\"A\", active:true})")
        .expect("create a");
    db.execute_query("CREATE (a:User {name:\"B\", active:false})")
        .expect("create b");

    let rows = db
        .execute_query("MATCH (n:User) WHERE n.active = true RETURN n")
        .expect("match");
    assert_eq!(rows.len(), 1);
    let ResultCell::Node { properties, .. } = node_cell(&rows[0], "n") else {
        panic!("expected a node cell");
    };
    assert_eq!(
        properties.get("name"),
        Some(&PropertyValue::String("A".into()))
    );
}

#[test]
fn empty_query_is_a_parse_error() {
    let (_tmp, mut db) = open_temp();
    assert!(matches!(
        db.execute_query(""),
        Err(GraphError::Parse(_))
    ));
}

#[test]
fn delete_of_unbound_variable_fails() {
    let (_tmp, mut db) = open_temp();
    assert!(matches!(
        db.execute_query("DELETE n"),
        Err(GraphError::InvalidArgument(_))
    ));
}

#[test]
fn delete_of_empty_binding_is_a_no_op() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Ghost {x: 1})").expect("create");
    db.execute_query("MATCH (n:Ghost) DELETE n").expect("delete");
    // The label bucket is gone, so this MATCH binds an empty list.
    db.execute_query("CREATE (a:Other {x: 1})").expect("create other");
    db.execute_query("MATCH (n:Other) WHERE n.x = 2 DELETE n")
        .expect("empty delete");
    let rows = db.execute_query("MATCH (n:Other) RETURN n").expect("match");
    assert_eq!(rows.len(), 1);
}

#[test]
fn single_slot_buffer_pool_stays_correct() {
    let tmp = NamedTempFile::new().expect("temp file");
    let mut db = KiteDB::open_with_config(
        tmp.path(),
        Config {
            page_size: 256,
            buffer_capacity: 1,
        },
    )
    .expect("open db");

    for i in 0..10 {
        db.execute_query(&format!("CREATE (a:Item {{seq: {i}}})"))
            .expect("create");
    }
    let rows = db.execute_query("MATCH (n:Item) RETURN n").expect("match");
    assert_eq!(rows.len(), 10);
}

#[test]
fn multiple_create_patterns_in_one_clause() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Tag {v: 1}), (b:Tag {v: 2})")
        .expect("create");
    let rows = db.execute_query("MATCH (n:Tag) RETURN n").expect("match");
    assert_eq!(rows.len(), 2);
}

#[test]
fn return_deduplicates_by_entity() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Dup {v: 1})").expect("create");
    // `a` and `n` both resolve to the same node.
    let rows = db
        .execute_query("MATCH (n:Dup) MATCH (a:Dup) RETURN n, a")
        .expect("match");
    assert_eq!(rows.len(), 1);
}

#[test]
fn endpoint_reuse_binds_existing_node() {
    let (_tmp, mut db) = open_temp();
    let rows = db
        .execute_query(
            "CREATE (a:Person {name:\"A\"}) \
             CREATE (a)-[r:LIKES]->(b:Person {name:\"B\"}) \
             RETURN a, b",
        )
        .expect("create");
    assert_eq!(rows.len(), 2);
    assert_eq!(db.node_count(), 2);
    assert_eq!(db.edge_count(), 1);

    let edges = db.all_edges().expect("edges");
    assert_eq!((edges[0].source, edges[0].target), (1, 2));
}

#[test]
fn failed_clause_keeps_earlier_mutations() {
    let (_tmp, mut db) = open_temp();
    // The CREATE lands before DELETE fails on the unbound variable.
    let err = db
        .execute_query("CREATE (a:Kept {v: 1}) DELETE ghost")
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument(_)));

    let rows = db.execute_query("MATCH (n:Kept) RETURN n").expect("match");
    assert_eq!(rows.len(), 1);
}

#[test]
fn set_refreshes_bindings_for_later_clauses() {
    let (_tmp, mut db) = open_temp();
    db.execute_query("CREATE (a:Person {score: 1})").expect("create");
    let rows = db
        .execute_query("MATCH (n:Person) SET n.score = 2 RETURN n")
        .expect("set and return");
    let ResultCell::Node { properties, .. } = node_cell(&rows[0], "n") else {
        panic!("expected a node cell");
    };
    assert_eq!(properties.get("score"), Some(&PropertyValue::Int(2)));
}
