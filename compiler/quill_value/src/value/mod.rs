//! Runtime values.
//!
//! `Value` is the data model templates are executed against. Rendering
//! follows the conventional `%v` forms of text templates: lists print as
//! `[a b]`, maps as `map[k:v]` with sorted keys, structs as `{a b}`, a
//! missing value as `<no value>` and nil as `<nil>`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::EvalError;

/// Coarse classification of a value, used by error-manager kind filters.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Kind {
    Invalid,
    Nil,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
    Struct,
    Error,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Invalid => "invalid",
            Kind::Nil => "nil",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float64",
            Kind::String => "string",
            Kind::List => "slice",
            Kind::Map => "map",
            Kind::Struct => "struct",
            Kind::Error => "error",
        }
    }

    /// The zero value of this kind, used by the zero-value missing-key mode.
    pub fn zero_value(self) -> Value {
        match self {
            Kind::Bool => Value::Bool(false),
            Kind::Int => Value::Int(0),
            Kind::Float => Value::Float(0.0),
            Kind::String => Value::Str(String::new()),
            Kind::List => Value::List(Vec::new()),
            Kind::Map => Value::Map(MapValue::new()),
            Kind::Nil | Kind::Error | Kind::Struct => Value::Nil,
            Kind::Invalid => Value::Invalid,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// String-keyed map with an optional declared element kind.
///
/// Keys are kept sorted; iteration and rendering are deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    entries: BTreeMap<String, Value>,
    elem: Option<Kind>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map whose missing entries read as the zero value of `elem`.
    pub fn typed(elem: Kind) -> Self {
        MapValue {
            entries: BTreeMap::new(),
            elem: Some(elem),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn elem_kind(&self) -> Option<Kind> {
        self.elem
    }

    /// Zero value for a missing entry.
    pub fn zero_entry(&self) -> Value {
        self.elem.map_or(Value::Invalid, Kind::zero_value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn type_name(&self) -> String {
        let elem = match self.elem {
            Some(Kind::Int) => "int",
            Some(Kind::Float) => "float64",
            Some(Kind::String) => "string",
            Some(Kind::Bool) => "bool",
            _ => "interface {}",
        };
        format!("map[string]{elem}")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MapValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MapValue {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            elem: None,
        }
    }
}

/// A record with named fields.
///
/// Field names starting with a lower-case letter are unexported: templates
/// can see that they exist but not read them.
#[derive(Clone, Debug, PartialEq)]
pub struct StructValue {
    type_name: Arc<str>,
    fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new(type_name: &str) -> Self {
        StructValue {
            type_name: Arc::from(type_name),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Whether a field or method name is visible to templates.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// A template runtime value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// No value at all (a missing key, an unset result). Renders `<no value>`.
    #[default]
    Invalid,
    /// The untyped nil. Renders `<nil>`.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(MapValue),
    Struct(StructValue),
    /// A failure captured as data, e.g. by `trap`.
    Error(Arc<EvalError>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn error(err: EvalError) -> Self {
        Value::Error(Arc::new(err))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Invalid => Kind::Invalid,
            Value::Nil => Kind::Nil,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::String,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Struct(_) => Kind::Struct,
            Value::Error(_) => Kind::Error,
        }
    }

    /// Type name as it appears in diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Invalid => "<invalid>".to_string(),
            Value::Nil => "<nil>".to_string(),
            Value::List(_) => "[]interface {}".to_string(),
            Value::Map(m) => m.type_name(),
            Value::Struct(s) => s.type_name().to_string(),
            Value::Error(_) => "*errors.errorString".to_string(),
            other => other.kind().name().to_string(),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Value::Invalid)
    }

    /// Template truthiness: false, 0, empty strings/collections, nil and
    /// missing values are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Invalid | Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Struct(_) | Value::Error(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&EvalError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Collapse a list of results: none becomes `""`, one stays as is, more
    /// become a list.
    pub fn collapse(mut values: Vec<Value>) -> Value {
        match values.len() {
            0 => Value::Str(String::new()),
            1 => values.pop().unwrap_or_default(),
            _ => Value::List(values),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => f.write_str("<no value>"),
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => fmt_float(*x, f),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
            Value::Struct(s) => {
                f.write_str("{")?;
                for (i, (_, v)) in s.fields().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
            Value::Error(e) => f.write_str(&e.message),
        }
    }
}

/// Shortest float rendering, switching to exponent form (`1e+21`,
/// `1.5e-05`) outside `[1e-4, 1e21)`.
fn fmt_float(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("NaN");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "+Inf" } else { "-Inf" });
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e21).contains(&abs) {
        let repr = format!("{x:e}");
        let (mantissa, exp) = repr.split_once('e').unwrap_or((repr.as_str(), "0"));
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(d) => ('-', d),
            None => ('+', exp),
        };
        return write!(f, "{mantissa}e{sign}{digits:0>2}");
    }
    write!(f, "{x}")
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<MapValue> for Value {
    fn from(m: MapValue) -> Self {
        Value::Map(m)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl From<EvalError> for Value {
    fn from(e: EvalError) -> Self {
        Value::error(e)
    }
}
