//! SQL over a single Notion database.
//!
//! [`NotionSqlInterface`] keeps every row of one database in an in-memory
//! table (`notion_data` unless renamed). `SELECT` runs against that cache;
//! `INSERT`, `UPDATE` and `DELETE` turn into page create, update and
//! archive calls, and the cache is patched with what Notion returns.

use notion2sql_client::{normalize_id, Item, NotionDatabase, QueryOptions};
use notion2sql_core::query::{
    parse, Column, ExecutionContext, Executor, Expression, PhysicalPlan, Planner, Row, Statement,
    Value,
};
use notion2sql_core::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use crate::security::{validate_property_name, validate_query};

/// Table name used when none is given
pub const DEFAULT_TABLE_NAME: &str = "notion_data";

/// Name of the column holding each row's page id
pub const ID_COLUMN: &str = "id";

/// Suffix given to a property whose name collides with [`ID_COLUMN`]
pub const PROPERTY_SUFFIX: &str = " (property)";

/// Column exposing the property `name`. A property called `id` (in any
/// case) becomes `id (property)` so the page id keeps its column.
pub fn column_name(name: &str) -> String {
    if name.eq_ignore_ascii_case(ID_COLUMN) {
        format!("{name}{PROPERTY_SUFFIX}")
    } else {
        name.to_string()
    }
}

/// SQL interface to one Notion database
///
/// # Examples
///
/// ```rust,no_run
/// use notion2sql::{NotionClient, NotionSqlInterface};
///
/// # fn main() -> notion2sql::Result<()> {
/// let client = NotionClient::from_env()?;
/// let database = client.get_database("1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d")?;
/// let mut sql = NotionSqlInterface::new(database)?;
///
/// for row in sql.execute_sql("SELECT Name, Status FROM notion_data WHERE Done = false")? {
///     println!("{:?}", row.to_json());
/// }
/// sql.execute_sql("UPDATE notion_data SET Done = true WHERE Status = 'Shipped'")?;
/// # Ok(())
/// # }
/// ```
pub struct NotionSqlInterface {
    database: NotionDatabase,
    table_name: String,
    /// `id` followed by one column per schema property
    columns: Vec<String>,
    context: ExecutionContext,
}

impl NotionSqlInterface {
    /// Load every row of `database` into the `notion_data` table.
    pub fn new(database: NotionDatabase) -> Result<Self> {
        Self::with_table_name(database, DEFAULT_TABLE_NAME)
    }

    /// Like [`new`](Self::new), exposing the rows under `table_name`.
    pub fn with_table_name(database: NotionDatabase, table_name: impl Into<String>) -> Result<Self> {
        let table_name = table_name.into();
        validate_property_name(&table_name)?;

        let mut interface = Self {
            database,
            table_name,
            columns: Vec::new(),
            context: ExecutionContext::new(),
        };
        interface.refresh()?;
        Ok(interface)
    }

    pub fn database(&self) -> &NotionDatabase {
        &self.database
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Column names of the cached table, `id` first.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cached rows in the order Notion returned them.
    pub fn rows(&self) -> &[Row] {
        self.context
            .table(&self.table_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Reload the schema and every row from Notion. Returns the row count.
    pub fn refresh(&mut self) -> Result<usize> {
        self.database.refresh_schema()?;
        self.columns = std::iter::once(ID_COLUMN.to_string())
            .chain(self.database.schema().names().map(column_name))
            .collect();

        let items = self.database.query_all(QueryOptions::new(), None)?;
        let rows: Vec<Row> = items.iter().map(|item| self.row_from_item(item)).collect();
        let count = rows.len();
        self.context.insert_table(self.table_name.clone(), rows);

        info!(
            table = %self.table_name,
            database_id = %self.database.database_id(),
            rows = count,
            "loaded table cache"
        );
        Ok(count)
    }

    /// Parse and plan a SELECT without running it.
    pub fn prepare(&self, sql: &str) -> Result<PhysicalPlan> {
        validate_query(sql)?;
        match parse(sql)? {
            Statement::Select(query) => Ok(self.planner().plan(&query)?),
            other => Err(Error::InvalidInput(format!(
                "only SELECT statements can be prepared, got: {other}"
            ))),
        }
    }

    /// Run a prepared plan against the cache.
    pub fn execute_plan(&self, plan: &PhysicalPlan) -> Result<Vec<Row>> {
        Executor::new(&self.context).execute(plan)
    }

    /// Run one SQL statement.
    ///
    /// SELECT returns the result rows; INSERT the inserted row; UPDATE the
    /// rows after the update; DELETE the rows as they were before archiving.
    pub fn execute_sql(&mut self, sql: &str) -> Result<Vec<Row>> {
        validate_query(sql)?;
        let statement = parse(sql)?;
        let planner = self.planner();
        planner.check_table(statement.table())?;
        info!(table = %self.table_name, statement = %statement, "executing SQL");

        match statement {
            Statement::Select(query) => {
                let plan = planner.plan(&query)?;
                debug!(plan = %plan, "query plan");
                let rows = self.execute_plan(&plan)?;
                debug!(rows = rows.len(), "query finished");
                Ok(rows)
            }
            Statement::Insert(insert) => {
                let data: Map<String, JsonValue> = insert
                    .columns
                    .iter()
                    .zip(&insert.values)
                    .map(|(column, value)| (column.clone(), value.to_json()))
                    .collect();
                Ok(vec![self.insert(&data)?])
            }
            Statement::Update(update) => {
                let data: Map<String, JsonValue> = update
                    .assignments
                    .iter()
                    .map(|a| (a.column.clone(), a.value.to_json()))
                    .collect();
                // resolve before any write so a bad column fails the whole statement
                self.resolve_columns(&data)?;

                let targets =
                    self.matching(update.where_clause.as_ref().map(|w| &w.condition))?;
                let mut updated = Vec::with_capacity(targets.len());
                for row in &targets {
                    updated.push(self.update(&row_id(row)?, &data)?);
                }
                info!(table = %self.table_name, rows = updated.len(), "updated rows");
                Ok(updated)
            }
            Statement::Delete(delete) => {
                let targets =
                    self.matching(delete.where_clause.as_ref().map(|w| &w.condition))?;
                for row in &targets {
                    self.delete(&row_id(row)?)?;
                }
                info!(table = %self.table_name, rows = targets.len(), "deleted rows");
                Ok(targets)
            }
        }
    }

    /// Create a row from `{column: value}` and add it to the cache.
    pub fn insert(&mut self, data: &Map<String, JsonValue>) -> Result<Row> {
        let properties = self.resolve_columns(data)?;
        let item = self.database.add_item(&properties)?;
        let row = self.row_from_item(&item);
        if let Some(rows) = self.context.table_mut(&self.table_name) {
            rows.push(row.clone());
        }
        Ok(row)
    }

    /// Overwrite columns of the row with page id `id` and refresh its cached copy.
    pub fn update(&mut self, id: &str, data: &Map<String, JsonValue>) -> Result<Row> {
        let properties = self.resolve_columns(data)?;
        let item = self.database.update_item(id, &properties)?;
        let row = self.row_from_item(&item);

        let position = self.cached_position(&item.id);
        if let (Some(rows), Some(idx)) = (self.context.table_mut(&self.table_name), position) {
            rows[idx] = row.clone();
        }
        Ok(row)
    }

    /// Archive the row with page id `id` and drop it from the cache.
    ///
    /// Returns the row as it was cached before deletion.
    pub fn delete(&mut self, id: &str) -> Result<Row> {
        let item = self.database.delete_item(id)?;
        let position = self.cached_position(&item.id);
        let removed = match (self.context.table_mut(&self.table_name), position) {
            (Some(rows), Some(idx)) => Some(rows.remove(idx)),
            _ => None,
        };
        Ok(removed.unwrap_or_else(|| self.row_from_item(&item)))
    }

    fn planner(&self) -> Planner {
        Planner::for_table(self.table_name.clone())
    }

    fn matching(&self, condition: Option<&Expression>) -> Result<Vec<Row>> {
        Executor::new(&self.context).matching_rows(&self.table_name, condition)
    }

    fn cached_position(&self, id: &str) -> Option<usize> {
        let wanted = normalize_id(id).ok()?;
        self.rows().iter().position(|row| {
            matches!(row.values.first(), Some(Value::String(s)) if normalize_id(s).ok().as_deref() == Some(wanted.as_str()))
        })
    }

    /// Map SQL column names onto schema property names; exact match first,
    /// then case-insensitive.
    fn resolve_columns(&self, data: &Map<String, JsonValue>) -> Result<Map<String, JsonValue>> {
        let schema = self.database.schema();
        let mut resolved = Map::new();
        for (column, value) in data {
            validate_property_name(column)?;
            if column.eq_ignore_ascii_case(ID_COLUMN) {
                return Err(Error::InvalidInput(format!(
                    "column '{column}' is the page id and cannot be written"
                )));
            }
            let name = schema
                .names()
                .find(|name| column_name(name) == *column)
                .or_else(|| {
                    schema
                        .names()
                        .find(|name| column_name(name).eq_ignore_ascii_case(column))
                })
                .map(|name| name.to_string())
                .ok_or_else(|| Error::UnknownProperty(column.clone()))?;
            resolved.insert(name, value.clone());
        }
        Ok(resolved)
    }

    fn row_from_item(&self, item: &Item) -> Row {
        let mut columns = Vec::with_capacity(self.columns.len());
        let mut values = Vec::with_capacity(self.columns.len());
        columns.push(Column::new(ID_COLUMN));
        values.push(Value::String(item.id.clone()));
        for name in self.database.schema().names() {
            columns.push(Column::new(column_name(name)));
            values.push(
                item.get(name)
                    .map(Value::from_json)
                    .unwrap_or(Value::Null),
            );
        }
        Row::new(columns, values)
    }
}

fn row_id(row: &Row) -> Result<String> {
    match row.values.first() {
        Some(Value::String(id)) => Ok(id.clone()),
        _ => Err(Error::Query("row without a page id".to_string())),
    }
}

impl std::fmt::Debug for NotionSqlInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionSqlInterface")
            .field("database", &self.database)
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .field("rows", &self.rows().len())
            .finish()
    }
}
