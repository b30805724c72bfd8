//! Turning a call's parameter string into handler arguments.

use std::fmt;
use thiserror::Error;

/// How a service hands `params` to its handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Split on whitespace, coerce each token, pass positionally.
    #[default]
    AutoSplit,
    /// Pass the whole params string untouched; the handler tokenises it.
    RawPassthrough,
}

impl DispatchStrategy {
    pub fn args(&self, params: &str) -> CallArgs {
        match self {
            DispatchStrategy::AutoSplit => CallArgs::split(params),
            DispatchStrategy::RawPassthrough => CallArgs::Raw(params.to_string()),
        }
    }
}

/// One auto-split token after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Integer if it parses as one, else float, else the token itself.
    pub fn coerce(token: &str) -> Self {
        if let Ok(i) = token.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = token.parse::<f64>() {
            ParamValue::Float(f)
        } else {
            ParamValue::Str(token.to_string())
        }
    }

    /// Numeric view, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Like [`as_f64`](Self::as_f64) but failing with an argument error.
    pub fn number(&self) -> Result<f64, ArgumentError> {
        self.as_f64()
            .ok_or_else(|| ArgumentError::NotANumber(self.to_string()))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{}", i),
            // Debug keeps the fractional part: 5.0 rather than 5
            ParamValue::Float(x) => write!(f, "{:?}", x),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

/// Arguments for one handler invocation, shaped by token count.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    None,
    One(ParamValue),
    Two(ParamValue, ParamValue),
    Many(Vec<ParamValue>),
    Raw(String),
}

impl CallArgs {
    /// Auto-split `params`. An empty or all-whitespace string yields no arguments.
    pub fn split(params: &str) -> Self {
        let mut values: Vec<ParamValue> = params.split_whitespace().map(ParamValue::coerce).collect();
        match values.len() {
            0 => CallArgs::None,
            1 => CallArgs::One(values.remove(0)),
            2 => {
                let second = values.remove(1);
                CallArgs::Two(values.remove(0), second)
            }
            _ => CallArgs::Many(values),
        }
    }

    /// Number of positional arguments. Raw params count as one.
    pub fn len(&self) -> usize {
        match self {
            CallArgs::None => 0,
            CallArgs::One(_) | CallArgs::Raw(_) => 1,
            CallArgs::Two(..) => 2,
            CallArgs::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn none(self) -> Result<(), ArgumentError> {
        match self {
            CallArgs::None => Ok(()),
            other => Err(ArgumentError::arity(0, other.len())),
        }
    }

    pub fn one(self) -> Result<ParamValue, ArgumentError> {
        match self {
            CallArgs::One(value) => Ok(value),
            CallArgs::Raw(raw) => Ok(ParamValue::Str(raw)),
            other => Err(ArgumentError::arity(1, other.len())),
        }
    }

    pub fn two(self) -> Result<(ParamValue, ParamValue), ArgumentError> {
        match self {
            CallArgs::Two(a, b) => Ok((a, b)),
            other => Err(ArgumentError::arity(2, other.len())),
        }
    }

    /// Every argument as a list, whatever the arity.
    pub fn into_values(self) -> Vec<ParamValue> {
        match self {
            CallArgs::None => Vec::new(),
            CallArgs::One(value) => vec![value],
            CallArgs::Two(a, b) => vec![a, b],
            CallArgs::Many(values) => values,
            CallArgs::Raw(raw) => vec![ParamValue::Str(raw)],
        }
    }

    /// The unsplit params string of a raw-passthrough call.
    pub fn raw(&self) -> Option<&str> {
        match self {
            CallArgs::Raw(raw) => Some(raw),
            _ => None,
        }
    }
}

/// A handler was called with arguments it cannot accept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: usize, got: usize },

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("{0}")]
    Invalid(String),
}

impl ArgumentError {
    fn arity(expected: usize, got: usize) -> Self {
        ArgumentError::Arity { expected, got }
    }
}
