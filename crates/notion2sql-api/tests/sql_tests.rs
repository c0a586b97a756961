use std::sync::Arc;

use notion2sql::{Error, Method, NotionSqlInterface, PlanError, Value};
use notion2sql_client::mock::MockNotion;
use serde_json::{json, Map};

struct Fixture {
    mock: Arc<MockNotion>,
    database_id: String,
    sql: NotionSqlInterface,
}

fn fixture() -> Fixture {
    let mock = MockNotion::new();
    let page_id = mock.add_page("Project Hub");
    let database_id = mock.add_database(
        &page_id,
        "Tasks",
        json!({
            "Name": { "type": "title" },
            "Status": { "type": "select" },
            "Score": { "type": "number" },
            "Done": { "type": "checkbox" },
            "Tags": { "type": "multi_select" },
            "Created": { "type": "created_time" }
        }),
    );
    let rows = [
        json!({ "Name": "Write docs", "Status": "Todo", "Score": 3, "Done": false, "Tags": ["docs"] }),
        json!({ "Name": "Fix login", "Status": "Doing", "Score": 8, "Done": false, "Tags": ["bug", "auth"] }),
        json!({ "Name": "Ship v1", "Status": "Done", "Score": 5, "Done": true }),
        json!({ "Name": "Plan v2", "Status": "Todo", "Done": false }),
    ];
    for row in rows {
        mock.add_row(&database_id, row).unwrap();
    }

    let database = mock.client().get_database(&database_id).unwrap();
    let sql = NotionSqlInterface::new(database).unwrap();
    mock.clear_requests();

    Fixture {
        mock,
        database_id,
        sql,
    }
}

fn names(rows: &[notion2sql::Row]) -> Vec<String> {
    rows.iter()
        .map(|row| match row.get("Name") {
            Some(Value::String(s)) => s.clone(),
            other => panic!("unexpected Name value: {other:?}"),
        })
        .collect()
}

fn data(value: serde_json::Value) -> Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_cache_is_loaded() {
    let fx = fixture();
    assert_eq!(fx.sql.table_name(), "notion_data");
    assert_eq!(fx.sql.rows().len(), 4);
    assert_eq!(fx.sql.columns()[0], "id");
    assert_eq!(fx.sql.columns().len(), 7);

    let first = &fx.sql.rows()[0];
    assert_eq!(first.get("Name"), Some(&Value::String("Write docs".to_string())));
    assert_eq!(
        first.get("Tags"),
        Some(&Value::List(vec![Value::String("docs".to_string())]))
    );
    // missing values are NULL
    assert_eq!(fx.sql.rows()[3].get("Score"), Some(&Value::Null));
}

#[test]
fn test_select_filters_sorts_and_limits() {
    let mut fx = fixture();
    let rows = fx
        .sql
        .execute_sql(
            "SELECT Name, Score FROM notion_data WHERE Done = false AND Score IS NOT NULL ORDER BY Score DESC LIMIT 1",
        )
        .unwrap();
    assert_eq!(names(&rows), vec!["Fix login"]);
    assert_eq!(rows[0].len(), 2);

    // reads never reach the API
    assert!(fx.mock.requests().is_empty());
}

#[test]
fn test_select_like_and_list_membership() {
    let mut fx = fixture();

    let rows = fx
        .sql
        .execute_sql("SELECT * FROM notion_data WHERE Name LIKE '%V_'")
        .unwrap();
    assert_eq!(names(&rows), vec!["Ship v1", "Plan v2"]);

    let rows = fx
        .sql
        .execute_sql("SELECT Name FROM notion_data WHERE Tags = 'bug'")
        .unwrap();
    assert_eq!(names(&rows), vec!["Fix login"]);

    let rows = fx
        .sql
        .execute_sql("SELECT Name FROM notion_data WHERE Status IN ('Doing', 'Done') ORDER BY Name")
        .unwrap();
    assert_eq!(names(&rows), vec!["Fix login", "Ship v1"]);
}

#[test]
fn test_select_group_by() {
    let mut fx = fixture();
    let rows = fx
        .sql
        .execute_sql(
            "SELECT Status, COUNT(*) AS n, SUM(Score) AS total FROM notion_data GROUP BY Status ORDER BY Status",
        )
        .unwrap();

    let summary: Vec<(Value, Value, Value)> = rows
        .iter()
        .map(|r| {
            (
                r.get("Status").cloned().unwrap(),
                r.get("n").cloned().unwrap(),
                r.get("total").cloned().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (Value::String("Doing".into()), Value::Integer(1), Value::Integer(8)),
            (Value::String("Done".into()), Value::Integer(1), Value::Integer(5)),
            (Value::String("Todo".into()), Value::Integer(2), Value::Integer(3)),
        ]
    );
}

#[test]
fn test_table_name_is_checked() {
    let mut fx = fixture();
    assert!(fx.sql.execute_sql("select * from NOTION_DATA").is_ok());

    let err = fx.sql.execute_sql("SELECT * FROM users").unwrap_err();
    assert!(matches!(err, Error::Plan(PlanError::UnknownTable(ref t)) if t == "users"));

    let err = fx.sql.execute_sql("DELETE FROM users").unwrap_err();
    assert!(matches!(err, Error::Plan(PlanError::UnknownTable(_))));
    assert!(fx.mock.requests().is_empty());
}

#[test]
fn test_invalid_sql() {
    let mut fx = fixture();
    assert!(matches!(fx.sql.execute_sql(""), Err(Error::InvalidInput(_))));
    assert!(matches!(
        fx.sql.execute_sql("SELECT FROM notion_data"),
        Err(Error::Parse(_))
    ));
    assert!(matches!(
        fx.sql.execute_sql("SELECT Nope FROM notion_data"),
        Err(Error::Query(_))
    ));
}

#[test]
fn test_insert_creates_page_and_caches_row() {
    let mut fx = fixture();
    let rows = fx
        .sql
        .execute_sql("INSERT INTO notion_data (Name, Score, Status) VALUES ('Review PR', 4, 'Todo');")
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Score"), Some(&Value::Integer(4)));
    assert!(matches!(rows[0].get("id"), Some(Value::String(id)) if !id.is_empty()));

    assert_eq!(fx.mock.count_requests(Method::Post, "/pages"), 1);
    assert_eq!(fx.mock.rows(&fx.database_id).len(), 5);
    assert_eq!(fx.sql.rows().len(), 5);

    let found = fx
        .sql
        .execute_sql("SELECT Name FROM notion_data WHERE Name = 'Review PR'")
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn test_update_patches_matching_rows() {
    let mut fx = fixture();
    let rows = fx
        .sql
        .execute_sql("UPDATE notion_data SET Done = true, Score = 1 WHERE Status = 'Todo'")
        .unwrap();

    assert_eq!(names(&rows), vec!["Write docs", "Plan v2"]);
    assert!(rows.iter().all(|r| r.get("Done") == Some(&Value::Boolean(true))));
    assert_eq!(fx.mock.count_requests(Method::Patch, "/pages/"), 2);

    let done = fx
        .sql
        .execute_sql("SELECT COUNT(*) AS n FROM notion_data WHERE Done = true")
        .unwrap();
    assert_eq!(done[0].get("n"), Some(&Value::Integer(3)));
    // cache order is unchanged
    assert_eq!(names(fx.sql.rows())[0], "Write docs");
}

#[test]
fn test_update_resolves_column_case() {
    let mut fx = fixture();
    let rows = fx
        .sql
        .execute_sql("UPDATE notion_data SET score = 10 WHERE name = 'Ship v1'")
        .unwrap();
    assert_eq!(rows[0].get("Score"), Some(&Value::Integer(10)));
}

#[test]
fn test_update_rejects_bad_columns_before_writing() {
    let mut fx = fixture();

    let err = fx
        .sql
        .execute_sql("UPDATE notion_data SET Nope = 1")
        .unwrap_err();
    assert!(matches!(err, Error::UnknownProperty(ref p) if p == "Nope"));

    let err = fx
        .sql
        .execute_sql("UPDATE notion_data SET id = 'x' WHERE Name = 'Ship v1'")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = fx
        .sql
        .execute_sql("UPDATE notion_data SET Created = '2024-01-01'")
        .unwrap_err();
    assert!(matches!(err, Error::ReadOnlyProperty { .. }));

    assert!(fx.mock.requests().is_empty());
}

#[test]
fn test_update_without_matches_is_a_no_op() {
    let mut fx = fixture();
    let rows = fx
        .sql
        .execute_sql("UPDATE notion_data SET Done = true WHERE Score > 100")
        .unwrap();
    assert!(rows.is_empty());
    assert!(fx.mock.requests().is_empty());
}

#[test]
fn test_delete_archives_and_returns_old_rows() {
    let mut fx = fixture();
    let rows = fx
        .sql
        .execute_sql("DELETE FROM notion_data WHERE Score >= 5")
        .unwrap();

    assert_eq!(names(&rows), vec!["Fix login", "Ship v1"]);
    assert_eq!(fx.mock.count_requests(Method::Patch, "/pages/"), 2);
    assert_eq!(fx.mock.rows(&fx.database_id).len(), 2);
    assert_eq!(names(fx.sql.rows()), vec!["Write docs", "Plan v2"]);

    let archived = fx.mock.requests()[0].body.clone().unwrap();
    assert_eq!(archived, json!({ "archived": true }));
}

#[test]
fn test_programmatic_writes() {
    let mut fx = fixture();

    let row = fx
        .sql
        .insert(&data(json!({ "Name": "Triage", "Tags": ["bug"] })))
        .unwrap();
    let id = match row.get("id") {
        Some(Value::String(id)) => id.clone(),
        other => panic!("missing id: {other:?}"),
    };

    // undashed ids are accepted
    let updated = fx
        .sql
        .update(&id.replace('-', ""), &data(json!({ "Score": 2.5 })))
        .unwrap();
    assert_eq!(updated.get("Score"), Some(&Value::Float(2.5)));
    assert_eq!(
        fx.sql.rows().last().unwrap().get("Score"),
        Some(&Value::Float(2.5))
    );

    let removed = fx.sql.delete(&id).unwrap();
    assert_eq!(removed.get("Name"), Some(&Value::String("Triage".to_string())));
    assert_eq!(fx.sql.rows().len(), 4);

    assert!(matches!(
        fx.sql.insert(&data(json!({ "id": "x" }))),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_api_failure_leaves_cache_untouched() {
    let mut fx = fixture();
    fx.mock.fail_next(500, "internal_server_error");

    let err = fx
        .sql
        .execute_sql("INSERT INTO notion_data (Name) VALUES ('Lost')")
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert_eq!(fx.sql.rows().len(), 4);
}

#[test]
fn test_refresh_picks_up_remote_changes() {
    let mut fx = fixture();
    fx.mock
        .add_row(&fx.database_id, json!({ "Name": "Added elsewhere" }))
        .unwrap();
    assert_eq!(fx.sql.rows().len(), 4);

    assert_eq!(fx.sql.refresh().unwrap(), 5);
    assert_eq!(fx.sql.rows().len(), 5);
}

#[test]
fn test_prepare_and_execute_plan() {
    let fx = fixture();
    let plan = fx
        .sql
        .prepare("SELECT Name FROM notion_data WHERE Score > 4 ORDER BY Score")
        .unwrap();
    let rows = fx.sql.execute_plan(&plan).unwrap();
    assert_eq!(names(&rows), vec!["Ship v1", "Fix login"]);

    assert!(matches!(
        fx.sql.prepare("DELETE FROM notion_data"),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_custom_table_name_and_empty_database() {
    let mock = MockNotion::new();
    let page_id = mock.add_page("Empty");
    let database_id = mock.add_database(&page_id, "Inbox", json!({ "Title": { "type": "title" } }));
    let database = mock.client().get_database(&database_id).unwrap();

    let mut sql = NotionSqlInterface::with_table_name(database, "inbox").unwrap();
    assert_eq!(sql.table_name(), "inbox");
    assert!(sql.rows().is_empty());

    // unknown columns are not an error without rows to resolve them against
    assert!(sql.execute_sql("SELECT Whatever FROM inbox").unwrap().is_empty());
    assert!(sql.execute_sql("SELECT * FROM notion_data").is_err());
}

#[test]
fn test_nested_databases_through_page() {
    let mock = MockNotion::new();
    let page_id = mock.add_page("Hub");
    let columns = mock.add_block(&page_id, "column_list");
    let column = mock.add_block(&columns, "column");
    let database_id = mock.add_database(&column, "Nested", json!({ "Name": { "type": "title" } }));
    mock.add_row(&database_id, json!({ "Name": "inside" })).unwrap();

    let page = mock.client().connect_page(&page_id).unwrap();
    let database = page.get_databases().unwrap().remove(0);
    let mut sql = NotionSqlInterface::new(database).unwrap();
    let rows = sql.execute_sql("SELECT Name FROM notion_data").unwrap();
    assert_eq!(names(&rows), vec!["inside"]);
}

#[test]
fn test_property_named_id_keeps_page_id_column() {
    let mock = MockNotion::new();
    let page_id = mock.add_page("Imports");
    let database_id = mock.add_database(
        &page_id,
        "Legacy",
        json!({
            "Name": { "type": "title" },
            "id": { "type": "rich_text" }
        }),
    );
    let row_id = mock
        .add_row(&database_id, json!({ "Name": "Old row", "id": "legacy-7" }))
        .unwrap();
    let database = mock.client().get_database(&database_id).unwrap();
    let mut sql = NotionSqlInterface::new(database).unwrap();

    assert_eq!(sql.columns().to_vec(), vec!["id", "Name", "id (property)"]);
    let row = sql.rows()[0].to_json();
    assert_eq!(row["id"], json!(row_id));
    assert_eq!(row["id (property)"], json!("legacy-7"));

    let rows = sql
        .execute_sql(r#"SELECT Name FROM notion_data WHERE "id (property)" = 'legacy-7'"#)
        .unwrap();
    assert_eq!(names(&rows), vec!["Old row"]);

    // the renamed column writes back to the `id` property
    let updated = sql
        .execute_sql(r#"UPDATE notion_data SET "id (property)" = 'legacy-8' WHERE Name = 'Old row'"#)
        .unwrap();
    assert_eq!(updated[0].get("id"), Some(&Value::String(row_id.clone())));
    assert_eq!(
        updated[0].get("id (property)"),
        Some(&Value::String("legacy-8".to_string()))
    );

    // the page id itself stays read-only
    assert!(matches!(
        sql.execute_sql("UPDATE notion_data SET id = 'x'"),
        Err(Error::InvalidInput(_))
    ));
}
