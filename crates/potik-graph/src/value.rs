// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of `GRAPH.QUERY` replies into plain JSON rows.
//!
//! FalkorDB replies arrive as nested RESP arrays: `[headers, rows, stats]`.
//! Headers may be plain strings or `[column_type, name]` pairs depending on
//! the server's compact mode; both are handled. Cell values are converted to
//! `serde_json::Value` so downstream code never touches RESP types.

use potik_core::PotikError;
use redis::Value;

/// A parsed `GRAPH.QUERY` reply.
#[derive(Debug, Clone, Default)]
pub struct GraphReply {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl GraphReply {
    /// First cell of the first row, when present.
    pub fn scalar(&self) -> Option<&serde_json::Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Rows re-keyed by header name, for researcher output.
    pub fn objects(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (i, cell) in row.iter().enumerate() {
                    let key = self
                        .headers
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("col{i}"));
                    object.insert(key, cell.clone());
                }
                serde_json::Value::Object(object)
            })
            .collect()
    }
}

/// Parse the three-part `GRAPH.QUERY` reply. Statement-only queries (pure
/// writes) reply with a single stats array and parse to an empty reply.
pub fn parse_reply(value: Value) -> Result<GraphReply, PotikError> {
    let Value::Array(parts) = value else {
        return Err(PotikError::graph(format!(
            "unexpected GRAPH.QUERY reply shape: {value:?}"
        )));
    };

    if parts.len() < 2 {
        // [stats] only -- a write with no RETURN clause.
        return Ok(GraphReply::default());
    }

    let headers = match &parts[0] {
        Value::Array(items) => items.iter().map(header_name).collect(),
        _ => Vec::new(),
    };

    let rows = match &parts[1] {
        Value::Array(items) => items
            .iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(to_json).collect(),
                other => vec![to_json(other)],
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(GraphReply { headers, rows })
}

/// Extract a column name from either `name` or `[type, name]` header forms.
fn header_name(header: &Value) -> String {
    match header {
        Value::Array(pair) if pair.len() == 2 => value_to_string(&pair[1]),
        other => value_to_string(other),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::SimpleString(s) => s.clone(),
        Value::VerbatimString { text, .. } => text.clone(),
        Value::Int(n) => n.to_string(),
        other => format!("{other:?}"),
    }
}

/// Convert one RESP cell into JSON. Bulk strings that look numeric stay
/// strings; FalkorDB returns typed Int/Double cells for numbers.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Double(d) => serde_json::json!(d),
        Value::Boolean(b) => serde_json::Value::from(*b),
        Value::BulkString(bytes) => {
            serde_json::Value::from(String::from_utf8_lossy(bytes).into_owned())
        }
        Value::SimpleString(s) => serde_json::Value::from(s.clone()),
        Value::VerbatimString { text, .. } => serde_json::Value::from(text.clone()),
        Value::Okay => serde_json::Value::from("OK"),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => {
            let mut object = serde_json::Map::new();
            for (k, v) in entries {
                object.insert(value_to_string(k), to_json(v));
            }
            serde_json::Value::Object(object)
        }
        Value::Set(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        _ => serde_json::Value::Null,
    }
}

/// Escape special characters for Cypher single-quoted string literals.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
}

/// Read a cell as f64 whether the server sent Int, Double, or a numeric string.
pub fn as_f64(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Read a cell as i64 with the same tolerance as [`as_f64`].
pub fn as_i64(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or_else(|| as_f64(value) as i64),
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Read a cell as an owned string, empty for null.
pub fn as_str(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
