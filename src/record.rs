//! Records: the key=value fields extracted from one marker line, and the
//! tagged values they hold before and after aggregation.

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// A single field value.
///
/// Parsing only ever produces `Scalar`. Grouping turns repeated fields into
/// `List`, and the reducer collapses lists into `Int` or `Float` (or back to
/// a `Scalar` when the list is not numeric).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
    Int(BigInt),
    Float(f64),
}

impl Value {
    /// Fold another occurrence of this field into the value.
    ///
    /// A list grows by the incoming items; anything else becomes a list of
    /// `[old, new]`. Lists never nest: an incoming list is flattened.
    pub fn append(&mut self, incoming: Value) {
        let items = incoming.into_items();
        match self {
            Value::List(existing) => existing.extend(items),
            other => {
                let mut list = std::mem::replace(other, Value::List(Vec::new())).into_items();
                list.extend(items);
                *other = Value::List(list);
            }
        }
    }

    fn into_items(self) -> Vec<String> {
        match self {
            Value::Scalar(s) => vec![s],
            Value::List(items) => items,
            other => vec![other.to_string()],
        }
    }
}

/// Scalars print verbatim, lists print as `['a', 'b']` with each item in
/// quoted-literal form, floats follow [`format_float`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&quote_literal(item))?;
                }
                f.write_str("]")
            }
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Int(n) => match n.to_i64() {
                Some(small) => serializer.serialize_i64(small),
                None => serializer.serialize_str(&n.to_string()),
            },
            Value::Float(x) => serializer.serialize_f64(*x),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

/// Quote a string as a single-quoted literal (`'a'`), switching to double
/// quotes when the text holds a `'` but no `"`. Backslashes, the active
/// quote and control characters are escaped.
pub fn quote_literal(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let n = c as u32;
                if n < 0x100 {
                    out.push_str(&format!("\\x{n:02x}"));
                } else {
                    out.push_str(&format!("\\u{n:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Format a float the way the benchmark tooling prints them: integral values
/// keep a trailing `.0`, very large or very small magnitudes switch to
/// exponent notation with a signed two-digit exponent (`1e+16`, `1.5e-05`).
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let sci = format!("{x:e}");
        return match sci.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => sci,
        };
    }

    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Field name to value, in first-seen field order.
///
/// Inserting a name that already exists overwrites the value but keeps the
/// field's original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.fields
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Merge a later record of the same group into this one.
    ///
    /// Fields already present grow into lists; new fields are set as-is.
    /// Fields that only exist here are left untouched.
    pub fn merge(&mut self, later: Record) {
        for (name, value) in later.fields {
            match self.get_mut(&name) {
                Some(existing) => existing.append(value),
                None => self.fields.push((name, value)),
            }
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value.into());
        }
        record
    }
}
