use std::borrow::Cow;
use std::fmt;

pub use rusqlite::types::Value;

/// Called once per result row with the row's column values.
pub type RowCallback = Box<dyn FnMut(&[Value]) + Send + 'static>;

/// Called with `last_insert_rowid()` after the statement's batch committed.
pub type InsertIdCallback = Box<dyn FnOnce(i64) + Send + 'static>;

/// A single SQL statement with bound parameters and optional callbacks.
///
/// Queries are executed by an [`Executor`](crate::Executor) in submission order.
/// A batch of more than one query runs inside one transaction.
pub struct Query {
    pub(crate) sql: Cow<'static, str>,
    pub(crate) params: Vec<Value>,
    pub(crate) on_row: Option<RowCallback>,
    pub(crate) on_insert: Option<InsertIdCallback>,
}

impl Query {
    pub fn new(sql: impl Into<Cow<'static, str>>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            on_row: None,
            on_insert: None,
        }
    }

    pub fn with_params(sql: impl Into<Cow<'static, str>>, params: Vec<Value>) -> Self {
        Self {
            params,
            ..Self::new(sql)
        }
    }

    pub fn on_row(mut self, callback: impl FnMut(&[Value]) + Send + 'static) -> Self {
        self.on_row = Some(Box::new(callback));
        self
    }

    pub fn on_insert(mut self, callback: impl FnOnce(i64) + Send + 'static) -> Self {
        self.on_insert = Some(Box::new(callback));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.sql)
            .field("params", &self.params.len())
            .field("on_row", &self.on_row.is_some())
            .field("on_insert", &self.on_insert.is_some())
            .finish()
    }
}

impl From<&'static str> for Query {
    fn from(sql: &'static str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

pub fn int(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        _ => None,
    }
}

/// Text or blob column as raw bytes.
pub fn bytes(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Text(s) => Some(s.as_bytes()),
        Value::Blob(b) => Some(b),
        _ => None,
    }
}

/// Text or blob column decoded as UTF-8, replacing invalid sequences.
pub fn text(value: &Value) -> Option<String> {
    bytes(value).map(|b| String::from_utf8_lossy(b).into_owned())
}

pub fn blob(data: impl Into<Vec<u8>>) -> Value {
    Value::Blob(data.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_accessors() {
        assert_eq!(int(&Value::Integer(4)), Some(4));
        assert_eq!(int(&Value::Null), None);
        assert_eq!(text(&Value::Blob(b"hi".to_vec())).as_deref(), Some("hi"));
        assert_eq!(bytes(&Value::Text("x".into())), Some(&b"x"[..]));
        assert_eq!(text(&Value::Integer(1)), None);
    }

    #[test]
    fn debug_hides_callbacks() {
        let query = Query::with_params("SELECT ?1", vec![Value::Integer(1)]).on_row(|_| {});
        let rendered = format!("{query:?}");
        assert!(rendered.contains("on_row: true"));
        assert!(rendered.contains("params: 1"));
    }
}
