//! Builds INSERT / UPDATE / SELECT statements from a [`Fields`] map.
//!
//! Table names only come from [`Table`]; every column name is checked against the
//! live table definition before it is spliced into SQL text.

use crate::db::Table;
use crate::domain::model::{Fields, RowMap};
use crate::utils::error::{Result, UniverseError};
use crate::utils::validation::validate_identifier;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Params, Row};
use serde_json::Value;

pub fn table_columns(conn: &Connection, table: Table) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table.name()))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

pub fn check_columns<'a>(
    conn: &Connection,
    table: Table,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let known = table_columns(conn, table)?;
    for column in columns {
        validate_identifier("column", column)?;
        if !known.iter().any(|k| k == column) {
            return Err(UniverseError::UnknownColumn {
                table: table.name().to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

pub fn insert_sql(table: Table, fields: &Fields) -> String {
    let columns: Vec<&str> = fields.columns().collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name(),
        columns.join(", "),
        placeholders
    )
}

/// `UPDATE table SET a = ?, b = ? WHERE key_column = ?`; the key value binds last.
pub fn update_sql(table: Table, fields: &Fields, key_column: &str) -> String {
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table.name(),
        set_clause(fields),
        key_column
    )
}

fn set_clause(fields: &Fields) -> String {
    fields
        .columns()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Equality filters joined with AND; empty when there are no filters.
pub fn where_clause(filters: &Fields) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = filters.columns().map(|c| format!("{} = ?", c)).collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

/// SQLite binding for a JSON value. Arrays and objects are stored as JSON text.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn bind_values<'a>(fields: impl IntoIterator<Item = &'a Value>) -> Vec<SqlValue> {
    fields.into_iter().map(to_sql_value).collect()
}

/// Inserts one row and returns its rowid.
pub fn insert(conn: &Connection, table: Table, fields: &Fields) -> Result<i64> {
    if fields.is_empty() {
        return Err(UniverseError::ValidationError {
            message: format!("No fields given for insert into {}", table),
        });
    }
    check_columns(conn, table, fields.columns())?;

    conn.execute(
        &insert_sql(table, fields),
        params_from_iter(bind_values(fields.values())),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Updates the row whose `key_column` equals `key`. Returns the number of rows changed.
pub fn update(
    conn: &Connection,
    table: Table,
    fields: &Fields,
    key_column: &str,
    key: impl Into<Value>,
) -> Result<usize> {
    if fields.is_empty() {
        return Ok(0);
    }
    check_columns(conn, table, fields.columns().chain([key_column]))?;

    let mut values = bind_values(fields.values());
    values.push(to_sql_value(&key.into()));
    let changed = conn.execute(&update_sql(table, fields, key_column), params_from_iter(values))?;
    Ok(changed)
}

pub fn select_where(
    conn: &Connection,
    table: Table,
    filters: &Fields,
    order_by: Option<&str>,
) -> Result<Vec<RowMap>> {
    check_columns(conn, table, filters.columns().chain(order_by))?;

    let mut sql = format!("SELECT * FROM {}{}", table.name(), where_clause(filters));
    if let Some(column) = order_by {
        sql.push_str(&format!(" ORDER BY {}", column));
    }
    query_maps(conn, &sql, params_from_iter(bind_values(filters.values())))
}

/// Runs `sql` and returns each row as a column-name keyed map.
pub fn query_maps<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<RowMap>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query_map(params, |row| row_to_map(row, &names))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn row_to_map(row: &Row<'_>, names: &[String]) -> rusqlite::Result<RowMap> {
    let mut map = RowMap::new();
    for (i, name) in names.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::from(v),
            ValueRef::Real(v) => serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
        };
        map.insert(name.clone(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{schema, Database};

    fn db() -> Database {
        let db = Database::in_memory().unwrap();
        schema::initialize(&db).unwrap();
        db
    }

    #[test]
    fn test_insert_sql() {
        let fields = Fields::new()
            .with("location_name", "Tokyo")
            .with("location_type", "City");
        assert_eq!(
            insert_sql(Table::Locations, &fields),
            "INSERT INTO locations (location_name, location_type) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_update_sql_and_where_clause() {
        let fields = Fields::new().with("status", "Deceased").with("faction", "Shadow Core");
        assert_eq!(
            update_sql(Table::Characters, &fields, "character_name"),
            "UPDATE characters SET status = ?, faction = ? WHERE character_name = ?"
        );
        assert_eq!(where_clause(&Fields::new()), "");
        assert_eq!(where_clause(&fields), " WHERE status = ? AND faction = ?");
    }

    #[test]
    fn test_to_sql_value() {
        assert_eq!(to_sql_value(&Value::Null), SqlValue::Null);
        assert_eq!(to_sql_value(&Value::Bool(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&serde_json::json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(
            to_sql_value(&serde_json::json!({"klevel": "04"})),
            SqlValue::Text("{\"klevel\":\"04\"}".to_string())
        );
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let db = db();
        let fields = Fields::new()
            .with("location_name", "Tokyo")
            .with("population", 14_000_000);

        let err = insert(db.conn(), Table::Locations, &fields).err().unwrap();
        assert!(matches!(err, UniverseError::UnknownColumn { ref column, .. } if column == "population"));
    }

    #[test]
    fn test_injection_in_column_name_is_rejected() {
        let db = db();
        let fields = Fields::new().with("location_name) VALUES ('x'); DROP TABLE locations; --", 1);
        assert!(insert(db.conn(), Table::Locations, &fields).is_err());
        assert!(schema::table_exists(db.conn(), Table::Locations).unwrap());
    }

    #[test]
    fn test_insert_update_select() {
        let db = db();
        let id = insert(
            db.conn(),
            Table::Locations,
            &Fields::new().with("location_name", "Chicago").with("country", "USA"),
        )
        .unwrap();

        let changed = update(
            db.conn(),
            Table::Locations,
            &Fields::new().with("location_type", "City"),
            "location_id",
            id,
        )
        .unwrap();
        assert_eq!(changed, 1);

        let rows = select_where(
            db.conn(),
            Table::Locations,
            &Fields::new().with("country", "USA"),
            Some("location_id"),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["location_type"], Value::from("City"));
        assert_eq!(rows[0]["status"], Value::from("Active"));
    }
}
