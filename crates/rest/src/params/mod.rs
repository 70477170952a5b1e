//! Typed request parameters.
//!
//! A parameter is identified by its [`Placement`] and its name. Raw values are collected lazily
//! the first time a parameter is asked for, converted with a [`Conversion`], and cached in the
//! request's [`ParameterStore`]: asking again for the same parameter with the same conversion
//! returns the cached [`Value`] without parsing it again.
//!
//! Routes declare the parameters they need with the middlewares of this module; a declared
//! parameter is mandatory, and the handler is never reached if it is missing or malformed:
//!
//! ```
//! use micro_rest::params::{self, Placement};
//! use micro_rest::router::get;
//! use micro_rest::{handler_fn, HandlerResult, Reply, RequestContext};
//!
//! async fn find(ctx: &mut RequestContext) -> HandlerResult {
//!     let id: i64 = ctx.declared(Placement::Query, "id")?;
//!     Ok(Reply::ok(&id))
//! }
//!
//! let route = get(handler_fn(find)).with(params::integer(Placement::Query, "id"));
//! ```

mod convert;
mod declare;

pub use declare::{Declared, DeclaredBody, Validate, body, boolean, float, integer, string, time, validate};

use crate::error::ParamError;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Path,
    Query,
    Header,
    Body,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Placement::Path => "path",
            Placement::Query => "query",
            Placement::Header => "header",
            Placement::Body => "body",
        };
        f.write_str(name)
    }
}

/// The target type of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conversion {
    Bool,
    Integer,
    Float,
    String,
    /// A date-time parsed with a `chrono` strftime layout, e.g. `%Y-%m-%d %H:%M`.
    Time(String),
}

impl Conversion {
    pub fn time(layout: impl Into<String>) -> Self {
        Conversion::Time(layout.into())
    }

    /// Converts a raw value, `None` if it is not of the target type.
    pub fn convert(&self, raw: &str) -> Option<Value> {
        match self {
            Conversion::Bool => convert::parse_bool(raw).map(Value::Bool),
            Conversion::Integer => raw.parse().ok().map(Value::Integer),
            Conversion::Float => raw.parse().ok().map(Value::Float),
            Conversion::String => Some(Value::String(raw.to_owned())),
            Conversion::Time(layout) => convert::parse_time(raw, layout).map(Value::Time),
        }
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Bool => f.write_str("bool"),
            Conversion::Integer => f.write_str("int"),
            Conversion::Float => f.write_str("float"),
            Conversion::String => f.write_str("string"),
            Conversion::Time(layout) => write!(f, "time with layout '{layout}'"),
        }
    }
}

/// A converted parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Time(NaiveDateTime),
}

/// Rust types a [`Value`] can be read as.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// A parameter of the current request, with its raw values and its cached conversion.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    placement: Placement,
    raw: Vec<String>,
    parsed: Option<(Conversion, Value)>,
    mandatory: bool,
    requested: bool,
}

impl Parameter {
    fn new(name: String, placement: Placement, raw: Vec<String>) -> Self {
        Self { name, placement, raw, parsed: None, mandatory: false, requested: false }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// All raw values, in the order they appeared in the request.
    #[inline]
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn value(&self) -> Option<&Value> {
        self.parsed.as_ref().map(|(_, value)| value)
    }

    pub fn conversion(&self) -> Option<&Conversion> {
        self.parsed.as_ref().map(|(conversion, _)| conversion)
    }

    /// True once a route declared the parameter as mandatory.
    #[inline]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// True once the parameter was successfully converted.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub(crate) fn set_parsed(&mut self, conversion: Conversion, value: Value) {
        self.parsed = Some((conversion, value));
        self.requested = true;
    }

    pub(crate) fn mark_mandatory(&mut self) {
        self.mandatory = true;
    }
}

/// Per-request cache of parameters, keyed by placement and name.
#[derive(Debug, Default)]
pub struct ParameterStore {
    parameters: HashMap<Placement, HashMap<String, Parameter>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, placement: Placement, name: &str) -> Option<&Parameter> {
        self.parameters.get(&placement).and_then(|by_name| by_name.get(name))
    }

    pub(crate) fn get_mut(&mut self, placement: Placement, name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(&placement).and_then(|by_name| by_name.get_mut(name))
    }

    /// True if the parameter is cached with a value converted by `conversion`.
    pub fn holds(&self, placement: Placement, name: &str, conversion: &Conversion) -> bool {
        self.get(placement, name).and_then(Parameter::conversion).is_some_and(|cached| cached == conversion)
    }

    /// Records the raw values of a parameter seen for the first time.
    pub(crate) fn record(&mut self, placement: Placement, name: &str, raw: Vec<String>) -> &mut Parameter {
        self.parameters
            .entry(placement)
            .or_default()
            .entry(name.to_owned())
            .or_insert_with(|| Parameter::new(name.to_owned(), placement, raw))
    }

    pub fn len(&self) -> usize {
        self.parameters.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values().flat_map(HashMap::values)
    }
}

/// Turns a missing parameter into `None`, keeping every other failure.
///
/// ```
/// use micro_rest::error::ParamError;
/// use micro_rest::params::{OptionalParam, Placement};
///
/// let missing: Result<i64, ParamError> = Err(ParamError::missing("limit", Placement::Query));
/// assert_eq!(missing.optional().unwrap().unwrap_or(20), 20);
/// ```
pub trait OptionalParam<T> {
    fn optional(self) -> Result<Option<T>, ParamError>;
}

impl<T> OptionalParam<T> for Result<T, ParamError> {
    fn optional(self) -> Result<Option<T>, ParamError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
