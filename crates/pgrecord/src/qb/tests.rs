//! Integration tests for the qb module.

use crate::error::OrmError;
use crate::model::ModelDef;
use crate::qb::{Clause, Connector, QueryBuilder, StatementKind, table};
use crate::testing::{Reply, ScriptedClient, attrs};
use crate::value::Value;
use std::collections::HashSet;

fn placeholders(sql: &str) -> Vec<String> {
    let mut names = Vec::new();
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                end += 1;
            }
            if end > start {
                names.push(sql[start..end].to_string());
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }
    names
}

// ==================== SELECT rendering ====================

#[test]
fn test_select_basic() {
    assert_eq!(table("users").to_sql(), "select * from users where 1 = 1");
}

#[test]
fn test_select_fields() {
    let qb = table("users").select(["a", "b"]);
    assert_eq!(qb.to_sql(), "select a, b from users where 1 = 1");
}

#[test]
fn test_order_by_accumulates() {
    let qb = table("users").order_by("a").order_by_desc("b");
    assert_eq!(qb.to_sql(), "select * from users where 1 = 1 order by a asc, b desc");
}

#[test]
fn test_tail_order_is_fixed() {
    let qb = table("users").skip(5).limit(10).order_by("id").where_eq("active", true);
    assert_eq!(
        qb.to_sql(),
        "select * from users where 1 = 1 and ( active = :active_0) order by id asc limit 10 offset 5"
    );
}

#[test]
fn test_paginate() {
    let qb = table("users").paginate(3, 10);
    assert_eq!(qb.to_sql(), "select * from users where 1 = 1 limit 10 offset 20");

    let clamped = table("users").paginate(0, 0);
    assert_eq!(clamped.to_sql(), "select * from users where 1 = 1 limit 1 offset 0");
}

// ==================== Conditions ====================

#[test]
fn test_where_and_or_groups() {
    let qb = table("users")
        .where_eq("status", "active")
        .r#where("age", ">", 18)
        .or_where("role", "=", "admin");

    let stmt = qb.build_select();
    assert_eq!(
        stmt.sql(),
        "select * from users where 1 = 1 and ( status = :status_0) and ( age > :age_1) or ( role = :role_2)"
    );
    assert_eq!(stmt.bindings().get("status_0"), Some(&Value::from("active")));
    assert_eq!(stmt.bindings().get("age_1"), Some(&Value::Int(18)));
    assert_eq!(stmt.bindings().get("role_2"), Some(&Value::from("admin")));
}

#[test]
fn test_shorthand_equivalence() {
    let short = table("users").where_eq("name", "bob").render_where();
    let long = table("users").r#where("name", "=", "bob").render_where();
    assert_eq!(short, long);

    let tuple = table("users").where_all([("name", "bob")]).render_where();
    assert_eq!(short, tuple);
}

#[test]
fn test_where_all_is_one_group() {
    let qb = table("users").where_all([
        Clause::eq("a", 1),
        Clause::from(("b", "<", 2)),
        Clause::from(("c", 3)),
    ]);
    assert_eq!(
        qb.render_where().0,
        " where 1 = 1 and ( a = :a_0 and b < :b_1 and c = :c_2)"
    );
}

#[test]
fn test_or_where_all() {
    let qb = table("t")
        .where_eq("a", 1)
        .or_where_all([("b", 2), ("c", 3)]);
    assert_eq!(
        qb.render_where().0,
        " where 1 = 1 and ( a = :a_0) or ( b = :b_1 and c = :c_2)"
    );
}

#[test]
fn test_placeholders_are_unique() {
    let qb = table("users")
        .where_eq("id", 1)
        .where_eq("id", 2)
        .or_where_eq("id", 3)
        .where_all([("id", 4), ("id", 5)])
        .where_group(|q| q.where_eq("id", 6).or_where_eq("id", 7))
        .where_in("id", [8, 9])
        .where_in("id", [10]);

    let (sql, bindings) = qb.render_where();
    let names = placeholders(&sql);
    let distinct: HashSet<&String> = names.iter().collect();

    assert_eq!(names.len(), 10);
    assert_eq!(distinct.len(), names.len());
    for name in &names {
        assert!(bindings.contains(name), "{name} is not bound");
    }
    assert_eq!(bindings.len(), names.len());
}

#[test]
fn test_placeholders_stay_distinct_with_digit_suffixed_columns() {
    let mut qb = table("t").where_eq("a1", "first").where_eq("a_1", "second");
    for i in 0..9 {
        qb = qb.where_eq("filler", i);
    }
    let qb = qb
        .where_eq("a", "third")
        .or_where_eq("a_1_0", "fourth")
        .where_group(|q| q.where_eq("a1", "fifth").where_eq("a", "sixth"));

    let (sql, bindings) = qb.render_where();
    let names = placeholders(&sql);
    let distinct: HashSet<&String> = names.iter().collect();

    assert_eq!(names.len(), 15);
    assert_eq!(distinct.len(), names.len());
    assert_eq!(bindings.len(), names.len());
    assert!(sql.contains("( a1 = :a1_0)"), "{sql}");
    assert!(sql.contains("( a = :a_11)"), "{sql}");
    assert_eq!(bindings.get("a1_0"), Some(&Value::from("first")));
    assert_eq!(bindings.get("a_1_1"), Some(&Value::from("second")));
    assert_eq!(bindings.get("a_11"), Some(&Value::from("third")));
    assert_eq!(bindings.get("a_1_0_12"), Some(&Value::from("fourth")));
}

#[test]
fn test_rendering_is_idempotent() {
    let qb = table("users")
        .where_eq("a", 1)
        .where_group(|q| q.where_eq("b", 2))
        .where_in("c", [3, 4])
        .order_by("a")
        .limit(3);

    assert_eq!(qb.build_select(), qb.build_select());
    assert_eq!(qb.render_where(), qb.render_where());
}

#[test]
fn test_nested_group() {
    let qb = table("users")
        .where_eq("a", 1)
        .where_group(|q| q.where_eq("b", 2).or_where_eq("c", 3));
    assert_eq!(
        qb.to_sql(),
        "select * from users where 1 = 1 and ( a = :a_0) and ( 1 = 1 and ( b = :b_1) or ( c = :c_2) )"
    );
}

#[test]
fn test_nested_group_recurses_with_in_lists() {
    let qb = table("users")
        .or_where_group(|q| {
            q.where_eq("a", 1)
                .where_group(|q| q.where_eq("b", 2))
                .where_in("c", Vec::<i64>::new())
        });
    assert_eq!(
        qb.render_where().0,
        " where 1 = 1 or ( 1 = 1 and ( a = :a_0) and ( 1 = 1 and ( b = :b_1) ) and ( 1 = 0 ) )"
    );
}

#[test]
fn test_where_in() {
    let qb = table("users").where_in("id", [1, 2, 3]);
    let (sql, bindings) = qb.render_where();

    let names = placeholders(&sql);
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|n| n.starts_with("inValue")));
    assert!(sql.starts_with(" where 1 = 1 and ( id in ( :inValue"));
    assert!(sql.ends_with("3 ) )"));
    assert_eq!(bindings.get(&names[2]), Some(&Value::Int(3)));
}

#[test]
fn test_where_in_same_column_twice() {
    let qb = table("users").where_in("id", [1]).where_not_in("id", [1]);
    let (sql, _) = qb.render_where();
    let names = placeholders(&sql);
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert!(sql.contains(" and ( id not in ( :inValue"));
}

#[test]
fn test_empty_in_lists() {
    let qb = table("users").where_in("id", Vec::<i64>::new());
    assert_eq!(qb.to_sql(), "select * from users where 1 = 1 and ( 1 = 0 )");

    let qb = table("users").or_where_not_in("id", Vec::<i64>::new());
    assert_eq!(qb.to_sql(), "select * from users where 1 = 1 or ( 1 = 1 )");
}

#[test]
fn test_subexpressions_render_last() {
    let qb = table("t")
        .where_in("x", [1])
        .where_group(|q| q.where_eq("y", 2))
        .where_eq("z", 3);
    let (sql, _) = qb.render_where();
    let z = sql.find("z = ").unwrap();
    let y = sql.find("y = ").unwrap();
    let x = sql.find("x in").unwrap();
    assert!(z < y && y < x, "{sql}");
}

#[test]
fn test_null_checks() {
    let qb = table("users")
        .where_null("deleted_at")
        .where_not_null("email")
        .r#where("banned_at", "IS", Value::Null);
    let (sql, bindings) = qb.render_where();
    assert_eq!(
        sql,
        " where 1 = 1 and ( deleted_at is null) and ( email is not null) and ( banned_at is null)"
    );
    assert!(bindings.is_empty());
}

#[test]
fn test_operator_passes_through() {
    let qb = table("users")
        .r#where("name", "  LIKE ", "a%")
        .r#where("email", "ILike", "%@x")
        .r#where("deleted_at", "Is  Not", Value::Null);
    assert_eq!(
        qb.render_where().0,
        " where 1 = 1 and ( name LIKE :name_0) and ( email ILike :email_1) and ( deleted_at is not null)"
    );
}

#[test]
fn test_qualified_column_placeholder() {
    let qb = table("users").where_eq("users.id", 1);
    let (sql, bindings) = qb.render_where();
    assert_eq!(sql, " where 1 = 1 and ( users.id = :users_id_0)");
    assert!(bindings.contains("users_id_0"));
}

#[test]
fn test_explicit_connector() {
    let qb = table("t")
        .where_with(Connector::Or, vec![Clause::eq("a", 1)])
        .where_with(Connector::And, vec![]);
    assert_eq!(qb.render_where().0, " where 1 = 1 or ( a = :a_0)");
}

#[test]
fn test_new_query_is_empty() {
    let model = ModelDef::new("accounts").identifier("account_no");
    let qb = QueryBuilder::new(model).where_eq("a", 1).limit(3);
    let fresh = qb.new_query();
    assert_eq!(fresh.to_sql(), "select * from accounts where 1 = 1");
    assert_eq!(fresh.model().identifier_name(), "account_no");
}

// ==================== INSERT / UPDATE / DELETE rendering ====================

#[test]
fn test_insert() {
    let stmt = table("users")
        .build_insert(&attrs([("name", Value::from("x")), ("age", Value::Int(3))]))
        .unwrap();
    assert_eq!(stmt.kind(), StatementKind::Insert);
    assert_eq!(stmt.sql(), "insert into users (name, age) values (:name_0, :age_1)");
    assert_eq!(stmt.bindings().get("age_1"), Some(&Value::Int(3)));
}

#[test]
fn test_insert_columns_with_same_stem_bind_separately() {
    let stmt = table("t")
        .build_insert(&attrs([
            ("a.b", Value::Int(1)),
            ("a_b", Value::Int(2)),
            ("first name", Value::from("x")),
            ("first_name", Value::from("y")),
        ]))
        .unwrap();
    assert_eq!(
        stmt.sql(),
        "insert into t (a.b, a_b, first name, first_name) values (:a_b_0, :a_b_1, :first_name_2, :first_name_3)"
    );
    assert_eq!(stmt.bindings().len(), 4);
    assert_eq!(stmt.bindings().get("a_b_0"), Some(&Value::Int(1)));
    assert_eq!(stmt.bindings().get("a_b_1"), Some(&Value::Int(2)));
    assert_eq!(stmt.bindings().get("first_name_3"), Some(&Value::from("y")));
}

#[test]
fn test_insert_requires_attributes() {
    let err = table("users").build_insert(&attrs([])).unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn test_update_ignores_tail() {
    let qb = table("users").where_eq("id", 5).order_by("id").limit(1);
    let stmt = qb
        .build_update_tagged(&attrs([("name", Value::from("bob")), ("id", Value::Int(9))]), "T")
        .unwrap();
    assert_eq!(
        stmt.sql(),
        "update users set name = :name_T_0, id = :id_T_1 where 1 = 1 and ( id = :id_0)"
    );
    assert_eq!(stmt.bindings().get("id_0"), Some(&Value::Int(5)));
    assert_eq!(stmt.bindings().get("id_T_1"), Some(&Value::Int(9)));
}

#[test]
fn test_update_placeholders_are_tagged() {
    let qb = table("users").where_eq("name", "old");
    let stmt = qb.build_update(&attrs([("name", Value::from("new"))])).unwrap();
    let names = placeholders(stmt.sql());
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert_eq!(stmt.bindings().len(), 2);
}

#[test]
fn test_update_requires_attributes() {
    let err = table("users").build_update(&attrs([])).unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn test_delete() {
    let stmt = table("users").where_eq("id", 1).limit(5).build_delete();
    assert_eq!(stmt.kind(), StatementKind::Delete);
    assert_eq!(stmt.sql(), "delete from users where 1 = 1 and ( id = :id_0)");
}

#[test]
fn test_count() {
    let stmt = table("users").where_eq("a", 1).order_by("a").limit(2).build_count();
    assert_eq!(
        stmt.sql(),
        "select count(*) as count from users where 1 = 1 and ( a = :a_0)"
    );
}

// ==================== Execution ====================

#[tokio::test]
async fn test_get_decodes_existing_records() {
    let client = ScriptedClient::new().rows(vec![
        attrs([("id", Value::Int(1)), ("name", Value::from("a"))]),
        attrs([("id", Value::Int(2)), ("name", Value::from("b"))]),
    ]);
    let records = table("users").get(&client).await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.exists()));
    assert_eq!(records[1].get("name"), Some(Value::from("b")));
}

#[tokio::test]
async fn test_first_without_rows_is_none() {
    let client = ScriptedClient::new().rows(vec![]);
    let found = table("users").where_eq("id", 42).first(&client).await.unwrap();

    assert!(found.is_none());
    assert_eq!(
        client.sql(),
        vec!["select * from users where 1 = 1 and ( id = :id_0) limit 1"]
    );
}

#[tokio::test]
async fn test_first_as_typed() {
    let client = ScriptedClient::new().rows(vec![attrs([("id", Value::Int(4))])]);
    let row = table("users")
        .first_as::<crate::value::Attributes>(&client)
        .await
        .unwrap();
    assert_eq!(row.and_then(|r| r.get("id").cloned()), Some(Value::Int(4)));
}

#[tokio::test]
async fn test_count_executes() {
    let client = ScriptedClient::new().rows(vec![attrs([("count", Value::Int(12))])]);
    assert_eq!(table("users").count(&client).await.unwrap(), 12);
}

#[tokio::test]
async fn test_create_reloads_by_identifier() {
    let client = ScriptedClient::new()
        .inserted(1, Some(Value::Int(7)))
        .rows(vec![attrs([("id", Value::Int(7)), ("name", Value::from("x"))])]);

    let created = table("users")
        .where_eq("ignored", 1)
        .create(&client, &attrs([("name", Value::from("x"))]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(created.id(), Some(&Value::Int(7)));
    assert!(created.exists());
    let statements = client.statements();
    assert_eq!(statements[0].sql(), "insert into users (name) values (:name_0)");
    assert_eq!(
        statements[1].sql(),
        "select * from users where 1 = 1 and ( id = :id_0) limit 1"
    );
    assert_eq!(statements[1].bindings().get("id_0"), Some(&Value::Int(7)));
}

#[tokio::test]
async fn test_create_without_rows_is_none() {
    let client = ScriptedClient::new().inserted(0, None);
    let created = table("users")
        .create(&client, &attrs([("name", Value::from("x"))]))
        .await
        .unwrap();
    assert!(created.is_none());
    assert_eq!(client.statements().len(), 1);
}

#[tokio::test]
async fn test_create_propagates_driver_errors() {
    let client = ScriptedClient::new().reply(Reply::Fail(OrmError::UniqueViolation(
        "users_email_key: duplicate key".into(),
    )));
    let err = table("users")
        .create(&client, &attrs([("email", Value::from("a@b.c"))]))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn test_update_where_merges_condition() {
    let client = ScriptedClient::new().affected(1);
    let affected = table("users")
        .update_where(&client, &attrs([("name", Value::from("bob"))]), [("id", 5)])
        .await
        .unwrap();

    assert_eq!(affected, 1);
    let stmt = &client.statements()[0];
    assert!(stmt.sql().starts_with("update users set name = :name"));
    assert!(stmt.sql().ends_with(" where 1 = 1 and ( id = :id_0)"));
    assert_eq!(stmt.bindings().get("id_0"), Some(&Value::Int(5)));
    assert!(stmt.bindings().iter().any(|(_, v)| v == &Value::from("bob")));
}

#[tokio::test]
async fn test_delete_returns_affected() {
    let client = ScriptedClient::new().affected(3);
    let n = table("users").where_in("id", [1, 2, 3]).delete(&client).await.unwrap();
    assert_eq!(n, 3);
    assert_eq!(client.statements()[0].kind(), StatementKind::Delete);
}
