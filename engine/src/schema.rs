//! Row schemas and decoding at the gateway boundary.
//!
//! Rows arrive from the gateway as JSON. Before a row becomes a typed record
//! it is checked against its table's schema, so a malformed server response
//! fails here with a [`Error::MalformedRow`] instead of leaking missing
//! fields into the UI.

use crate::{error::Result, Error, LiveRecord, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
    /// Milliseconds since the Unix epoch
    Timestamp,
    /// Arbitrary nested JSON (joined display fields)
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name as it appears on the wire
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&serde_json::Value>) -> Result<()> {
        match value {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(serde_json::Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(serde_json::Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &serde_json::Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Timestamp => value.is_i64(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        serde_json::Value::Number(_) => "Float",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Schema for the rows of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table: Table,
    pub fields: Vec<FieldDef>,
}

impl TableSchema {
    pub fn new(table: Table, fields: Vec<FieldDef>) -> Self {
        Self { table, fields }
    }

    /// The built-in schema for `table`.
    pub fn for_table(table: Table) -> Self {
        let fields = match table {
            Table::ChatMessages => vec![
                FieldDef::required("id", FieldType::String),
                FieldDef::required("roomId", FieldType::String),
                FieldDef::required("senderId", FieldType::String),
                FieldDef::required("content", FieldType::String),
                FieldDef::required("createdAt", FieldType::Timestamp),
                FieldDef::optional("sender", FieldType::Json),
            ],
            Table::Events => vec![
                FieldDef::required("id", FieldType::String),
                FieldDef::required("title", FieldType::String),
                FieldDef::optional("description", FieldType::String),
                FieldDef::optional("location", FieldType::String),
                FieldDef::required("startsAt", FieldType::Timestamp),
                FieldDef::optional("endsAt", FieldType::Timestamp),
                FieldDef::optional("capacity", FieldType::Int),
                FieldDef::required("createdAt", FieldType::Timestamp),
                FieldDef::optional("organizer", FieldType::Json),
            ],
            Table::Registrations => vec![
                FieldDef::required("id", FieldType::String),
                FieldDef::required("eventId", FieldType::String),
                FieldDef::required("profileId", FieldType::String),
                FieldDef::required("status", FieldType::String),
                FieldDef::required("createdAt", FieldType::Timestamp),
                FieldDef::optional("attendee", FieldType::Json),
            ],
        };

        Self::new(table, fields)
    }

    /// Validate a row against this schema.
    pub fn validate_row(&self, row: &serde_json::Value) -> Result<()> {
        let obj = row
            .as_object()
            .ok_or_else(|| self.malformed(Error::InvalidPayload("row must be an object".into())))?;

        for field in &self.fields {
            field
                .validate(obj.get(&field.name))
                .map_err(|e| self.malformed(e))?;
        }

        Ok(())
    }

    fn malformed(&self, err: Error) -> Error {
        Error::MalformedRow {
            table: self.table,
            reason: err.to_string(),
        }
    }
}

/// The set of table schemas the client understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    tables: HashMap<Table, TableSchema>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Schema {
    /// Schemas for every live table.
    pub fn builtin() -> Self {
        let tables = Table::ALL
            .into_iter()
            .map(|table| (table, TableSchema::for_table(table)))
            .collect();
        Self { tables }
    }

    pub fn table(&self, table: Table) -> Option<&TableSchema> {
        self.tables.get(&table)
    }

    /// Validate a row of `table`.
    pub fn validate_row(&self, table: Table, row: &serde_json::Value) -> Result<()> {
        self.table(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?
            .validate_row(row)
    }
}

/// Validate a raw row and turn it into a typed record.
pub fn decode_row<R: LiveRecord>(row: serde_json::Value) -> Result<R> {
    TableSchema::for_table(R::TABLE).validate_row(&row)?;

    serde_json::from_value(row).map_err(|e| Error::MalformedRow {
        table: R::TABLE,
        reason: e.to_string(),
    })
}

/// Decode a batch of rows, failing on the first malformed one.
pub fn decode_rows<R: LiveRecord>(rows: Vec<serde_json::Value>) -> Result<Vec<R>> {
    rows.into_iter().map(decode_row).collect()
}
