//! Declared parameter types and argument coercion.

use crate::errors::{cannot_assign_nil, invalid_value, wrong_type};
use crate::{EvalError, Kind, MapValue, Value};

/// The declared type of a callable parameter.
///
/// Argument expressions are evaluated against these; receivers are
/// converted to them losslessly.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParamType {
    /// Accepts any value.
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    /// The evaluation context handle. Only meaningful as the first parameter.
    Context,
}

impl ParamType {
    /// Type name as it appears in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Any => "interface {}",
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float64",
            ParamType::Str => "string",
            ParamType::List => "[]interface {}",
            ParamType::Map => "map[string]interface {}",
            ParamType::Context => "*quill.Context",
        }
    }

    /// Word used when a literal of the wrong form is supplied.
    pub fn literal_name(self) -> &'static str {
        match self {
            ParamType::Int => "integer",
            ParamType::Float => "float",
            ParamType::Str => "string",
            ParamType::Bool => "bool",
            other => other.name(),
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::Bool => matches!(value, Value::Bool(_)),
            ParamType::Int => matches!(value, Value::Int(_)),
            ParamType::Float => matches!(value, Value::Float(_)),
            ParamType::Str => matches!(value, Value::Str(_)),
            ParamType::List => matches!(value, Value::List(_)),
            ParamType::Map => matches!(value, Value::Map(_)),
            ParamType::Context => false,
        }
    }

    /// Whether nil/missing values are assignable (they become the zero value).
    fn nillable(self) -> bool {
        matches!(self, ParamType::Any | ParamType::List | ParamType::Map)
    }

    pub fn zero(self) -> Value {
        match self {
            ParamType::Bool => Kind::Bool.zero_value(),
            ParamType::Int => Kind::Int.zero_value(),
            ParamType::Float => Kind::Float.zero_value(),
            ParamType::Str => Kind::String.zero_value(),
            ParamType::List => Value::List(Vec::new()),
            ParamType::Map => Value::Map(MapValue::new()),
            ParamType::Any | ParamType::Context => Value::Nil,
        }
    }

    /// Validate an evaluated (non-literal) argument against this type.
    pub fn check(self, value: Value) -> Result<Value, EvalError> {
        match value {
            Value::Invalid if self.nillable() => Ok(self.zero()),
            Value::Invalid => Err(invalid_value(self.name())),
            Value::Nil if self.nillable() => Ok(self.zero()),
            Value::Nil => Err(cannot_assign_nil(self.name())),
            v if self.accepts(&v) => Ok(v),
            v => Err(wrong_type(self.name(), &v.type_name())),
        }
    }

    /// Convert a value to this type if nothing is lost.
    ///
    /// Lossless means the converted value renders exactly like the original.
    pub fn convert_lossless(self, value: &Value) -> Option<Value> {
        if self.accepts(value) {
            return Some(value.clone());
        }
        let converted = match (self, value) {
            (_, Value::Invalid) | (ParamType::Context, _) => return None,
            (ParamType::Str, v) => Value::Str(v.to_string()),
            (ParamType::Int, Value::Str(s)) => Value::Int(s.trim().parse().ok()?),
            #[allow(clippy::cast_possible_truncation, reason = "checked by the rendering comparison")]
            (ParamType::Int, Value::Float(x)) if x.fract() == 0.0 => Value::Int(*x as i64),
            #[allow(clippy::cast_precision_loss, reason = "checked by the rendering comparison")]
            (ParamType::Float, Value::Int(n)) => Value::Float(*n as f64),
            (ParamType::Float, Value::Str(s)) => Value::Float(s.trim().parse().ok()?),
            (ParamType::Bool, Value::Str(s)) => Value::Bool(s.parse().ok()?),
            _ => return None,
        };
        (converted.to_string() == value.to_string()).then_some(converted)
    }
}
