#![no_main]

use libfuzzer_sys::fuzz_target;
use notion2sql_core::query::{parse, Column, ExecutionContext, Executor, Planner, Row, Statement, Value};

fn table() -> Vec<Row> {
    let columns = || {
        ["id", "Name", "Score", "Done", "Tags"]
            .into_iter()
            .map(Column::new)
            .collect::<Vec<_>>()
    };
    vec![
        Row::new(
            columns(),
            vec![
                Value::String("a".into()),
                Value::String("Write docs".into()),
                Value::Integer(3),
                Value::Boolean(false),
                Value::List(vec![Value::String("docs".into())]),
            ],
        ),
        Row::new(
            columns(),
            vec![
                Value::String("b".into()),
                Value::String("Fix login".into()),
                Value::Float(8.5),
                Value::Boolean(true),
                Value::List(vec![]),
            ],
        ),
        Row::new(
            columns(),
            vec![
                Value::String("c".into()),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ],
        ),
    ]
}

fuzz_target!(|data: &[u8]| {
    let Ok(sql) = std::str::from_utf8(data) else {
        return;
    };
    if sql.len() > 4_096 {
        return;
    }

    // Planning and execution return errors, never panic
    if let Ok(Statement::Select(query)) = parse(sql) {
        let mut context = ExecutionContext::new();
        context.insert_table("notion_data", table());
        if let Ok(plan) = Planner::for_table("notion_data").plan(&query) {
            let _ = Executor::new(&context).execute(&plan);
        }
    }
});
