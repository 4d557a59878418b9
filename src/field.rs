use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::value::{Input, Value};

/// The semantic type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int,
    Float,
    Str,
    Bool,
    DateTime,
    Set,
    ForeignKey(ForeignKeyTarget),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Str => "str",
            FieldKind::Bool => "bool",
            FieldKind::DateTime => "datetime",
            FieldKind::Set => "set",
            FieldKind::ForeignKey(_) => "foreign key",
        }
    }
}

/// The model a foreign-key field points at.
///
/// The primary-key metadata is filled in when the declaring schema is
/// registered, at which point the target must already be registered and
/// must have a single-field primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyTarget {
    pub model: String,
    pub(crate) pk: Option<(String, Box<FieldKind>)>,
}

/// A type descriptor for one named attribute — not a value holder.
///
/// One `Field` is shared by every instance of a model for a given attribute
/// name, and is immutable once its schema is registered. Construction is a
/// typed builder, so unknown configuration keys are unrepresentable;
/// semantically invalid combinations (auto-increment on a non-integer
/// field) are rejected at registration.
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    primary_key: bool,
    indexed: bool,
    auto_increment: bool,
}

impl Field {
    fn new(kind: FieldKind) -> Self {
        Field {
            kind,
            primary_key: false,
            indexed: false,
            auto_increment: false,
        }
    }

    pub fn int() -> Self {
        Field::new(FieldKind::Int)
    }

    pub fn float() -> Self {
        Field::new(FieldKind::Float)
    }

    pub fn string() -> Self {
        Field::new(FieldKind::Str)
    }

    pub fn boolean() -> Self {
        Field::new(FieldKind::Bool)
    }

    pub fn datetime() -> Self {
        Field::new(FieldKind::DateTime)
    }

    pub fn set() -> Self {
        Field::new(FieldKind::Set)
    }

    pub fn foreign_key(model: impl Into<String>) -> Self {
        Field::new(FieldKind::ForeignKey(ForeignKeyTarget {
            model: model.into(),
            pk: None,
        }))
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn foreign_target(&self) -> Option<&ForeignKeyTarget> {
        match &self.kind {
            FieldKind::ForeignKey(target) => Some(target),
            _ => None,
        }
    }

    pub(crate) fn foreign_target_mut(&mut self) -> Option<&mut ForeignKeyTarget> {
        match &mut self.kind {
            FieldKind::ForeignKey(target) => Some(target),
            _ => None,
        }
    }

    /// Convert `input` to this field's kind.
    ///
    /// None maps to none; a value already of the right kind passes through;
    /// convertible values convert. Impossible conversions fail with
    /// [`Error::Cast`]. Foreign keys accept a raw pk value (cast through
    /// the target's pk kind) or an instance reference.
    pub fn cast(&self, name: &str, input: impl Into<Input>) -> Result<Value> {
        let value = match input.into() {
            Input::Reference(key) => {
                if !matches!(self.kind, FieldKind::ForeignKey(_)) {
                    return Err(cast_err(name, self.kind.name(), format!("reference {key}")));
                }
                match key.as_single() {
                    Some(value) => value.clone(),
                    // fk targets always have single-field pks, so a
                    // composite reference can only be a caller mistake
                    None => {
                        return Err(cast_err(name, self.kind.name(), format!("reference {key}")))
                    }
                }
            }
            Input::Value(value) => value,
        };

        cast_kind(&self.kind, name, value)
    }

    /// Serialize `value` for the storage boundary.
    ///
    /// Identity for scalars (none becomes JSON null), RFC-3339 string for
    /// datetimes (the literal `"null"` for a none datetime), ordered array
    /// for sets, the referenced pk value for foreign keys.
    pub fn dumps(&self, value: &Value) -> Result<Json> {
        if value.is_none() && matches!(self.kind, FieldKind::DateTime) {
            return Ok(Json::String("null".to_string()));
        }
        Ok(serde_json::to_value(value)?)
    }

    /// Inverse of [`Field::dumps`]; tolerant of JSON null and the `"null"`
    /// marker, both of which collapse to none.
    pub fn loads(&self, name: &str, json: &Json) -> Result<Value> {
        loads_kind(&self.kind, name, json)
    }
}

fn cast_kind(kind: &FieldKind, name: &str, value: Value) -> Result<Value> {
    if value.is_none() {
        return Ok(Value::None);
    }

    match kind {
        FieldKind::Int => cast_int(name, value),
        FieldKind::Float => cast_float(name, value),
        FieldKind::Str => cast_str(name, value),
        FieldKind::Bool => Ok(cast_bool(value)),
        FieldKind::DateTime => cast_datetime(name, value),
        FieldKind::Set => match value {
            Value::Set(_) => Ok(value),
            other => Err(cast_err(name, "set", other.to_string())),
        },
        FieldKind::ForeignKey(target) => match &target.pk {
            Some((_, pk_kind)) => cast_kind(pk_kind, name, value),
            // schema not registered yet; nothing to cast against
            None => Ok(value),
        },
    }
}

fn cast_int(name: &str, value: Value) -> Result<Value> {
    match value {
        Value::Int(_) => Ok(value),
        Value::Float(f) => Ok(Value::Int(f as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| cast_err(name, "int", format!("\"{s}\""))),
        other => Err(cast_err(name, "int", other.to_string())),
    }
}

fn cast_float(name: &str, value: Value) -> Result<Value> {
    match value {
        Value::Float(_) => Ok(value),
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| cast_err(name, "float", format!("\"{s}\""))),
        other => Err(cast_err(name, "float", other.to_string())),
    }
}

fn cast_str(name: &str, value: Value) -> Result<Value> {
    match value {
        Value::Str(_) => Ok(value),
        Value::Int(i) => Ok(Value::Str(i.to_string())),
        Value::Float(f) => Ok(Value::Str(f.to_string())),
        Value::Bool(b) => Ok(Value::Str(b.to_string())),
        Value::DateTime(dt) => Ok(Value::Str(dt.to_rfc3339())),
        other => Err(cast_err(name, "str", other.to_string())),
    }
}

// Truth table: the empty string is none, the usual spellings of "no" are
// false, anything else truthy.
fn cast_bool(value: Value) -> Value {
    match value {
        Value::Bool(_) => value,
        Value::Int(i) => Value::Bool(i != 0),
        Value::Float(f) => Value::Bool(f != 0.0),
        Value::Str(s) if s.is_empty() => Value::None,
        Value::Str(s) => Value::Bool(!matches!(
            s.to_lowercase().as_str(),
            "false" | "no" | "n" | "0"
        )),
        Value::DateTime(_) => Value::Bool(true),
        Value::Set(items) => Value::Bool(!items.is_empty()),
        Value::None => Value::None,
    }
}

fn cast_datetime(name: &str, value: Value) -> Result<Value> {
    match value {
        Value::DateTime(_) => Ok(value),
        Value::Str(s) => parse_datetime(name, &s).map(Value::DateTime),
        other => Err(cast_err(name, "datetime", other.to_string())),
    }
}

// RFC-3339 first (preserves the offset), then the common naive formats.
// Naive input is assigned UTC so stored datetimes are always tz-aware.
fn parse_datetime(name: &str, s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    Err(cast_err(name, "datetime", format!("\"{s}\"")))
}

fn loads_kind(kind: &FieldKind, name: &str, json: &Json) -> Result<Value> {
    if json.is_null() {
        return Ok(Value::None);
    }

    match kind {
        FieldKind::Int => json
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| cast_err(name, "int", json.to_string())),
        FieldKind::Float => json
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| cast_err(name, "float", json.to_string())),
        FieldKind::Str => json
            .as_str()
            .map(|s| Value::Str(s.to_string()))
            .ok_or_else(|| cast_err(name, "str", json.to_string())),
        FieldKind::Bool => json
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| cast_err(name, "bool", json.to_string())),
        FieldKind::DateTime => match json.as_str() {
            Some("null") => Ok(Value::None),
            Some(s) => parse_datetime(name, s).map(Value::DateTime),
            None => Err(cast_err(name, "datetime", json.to_string())),
        },
        FieldKind::Set => match json.as_array() {
            Some(items) => items
                .iter()
                .map(|item| scalar_from_json(name, item))
                .collect::<Result<_>>()
                .map(Value::Set),
            None => Err(cast_err(name, "set", json.to_string())),
        },
        FieldKind::ForeignKey(target) => match &target.pk {
            Some((_, pk_kind)) => loads_kind(pk_kind, name, json),
            None => scalar_from_json(name, json),
        },
    }
}

pub(crate) fn scalar_from_json(name: &str, json: &Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::None),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| cast_err(name, "number", json.to_string())),
        },
        Json::String(s) => Ok(Value::Str(s.clone())),
        other => Err(cast_err(name, "scalar", other.to_string())),
    }
}

fn cast_err(name: &str, expected: &'static str, given: String) -> Error {
    Error::Cast {
        field: name.to_string(),
        expected,
        given,
    }
}

// Auto-increment counters are process-wide, scoped per (model, field), and
// survive load/store. The mutex makes increments atomic with respect to
// concurrent instance construction for the same model.
static COUNTERS: LazyLock<Mutex<HashMap<(String, String), i64>>> =
    LazyLock::new(Mutex::default);

/// Ensure a counter exists for `(model, field)` without disturbing one that
/// is already running. Called when a schema is registered.
pub(crate) fn init_counter(model: &str, field: &str) {
    let mut counters = COUNTERS.lock().expect("counter lock poisoned");
    counters
        .entry((model.to_string(), field.to_string()))
        .or_insert(0);
}

pub(crate) fn next_counter(model: &str, field: &str) -> i64 {
    let mut counters = COUNTERS.lock().expect("counter lock poisoned");
    let counter = counters
        .entry((model.to_string(), field.to_string()))
        .or_insert(0);
    *counter += 1;
    *counter
}

/// Drop every counter belonging to `model`. Test-harness hook; production
/// code never resets counters.
#[doc(hidden)]
pub fn reset_counters(model: &str) {
    let mut counters = COUNTERS.lock().expect("counter lock poisoned");
    counters.retain(|(m, _), _| m != model);
}
