#![allow(dead_code)]

use std::sync::Arc;

use notion2sql_client::mock::MockNotion;
use serde_json::json;

/// A workspace page holding one top-level database and one nested in a column.
pub struct Workspace {
    pub mock: Arc<MockNotion>,
    pub page_id: String,
    pub tasks_id: String,
    pub notes_id: String,
}

pub fn tasks_schema() -> serde_json::Value {
    json!({
        "Name": { "type": "title" },
        "Status": { "type": "select", "select": { "options": [
            { "name": "Todo" }, { "name": "Doing" }, { "name": "Done" }
        ] } },
        "Score": { "type": "number", "number": { "format": "number" } },
        "Done": { "type": "checkbox" },
        "Tags": { "type": "multi_select" },
        "Due": { "type": "date" },
        "Created": { "type": "created_time" }
    })
}

pub fn workspace() -> Workspace {
    let mock = MockNotion::new();
    let page_id = mock.add_page("Project Hub");
    mock.add_block(&page_id, "paragraph");

    let tasks_id = mock.add_database(&page_id, "Tasks", tasks_schema());
    let rows = [
        json!({ "Name": "Write docs", "Status": "Todo", "Score": 3, "Done": false, "Tags": ["docs"] }),
        json!({ "Name": "Fix login", "Status": "Doing", "Score": 8, "Done": false, "Tags": ["bug", "auth"], "Due": "2024-03-01" }),
        json!({ "Name": "Ship v1", "Status": "Done", "Score": 5, "Done": true, "Tags": [] }),
        json!({ "Name": "Plan v2", "Status": "Todo", "Done": false }),
    ];
    for row in rows {
        mock.add_row(&tasks_id, row).unwrap();
    }

    let columns = mock.add_block(&page_id, "column_list");
    let column = mock.add_block(&columns, "column");
    let notes_id = mock.add_database(
        &column,
        "Notes",
        json!({ "Title": { "type": "title" }, "Body": { "type": "rich_text" } }),
    );
    mock.add_row(&notes_id, json!({ "Title": "Kickoff", "Body": "agenda" }))
        .unwrap();

    Workspace {
        mock,
        page_id,
        tasks_id,
        notes_id,
    }
}
