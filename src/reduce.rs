//! Collapse multi-valued fields into a single statistic.

use crate::dataset::Dataset;
use crate::record::Value;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tracing::debug;

/// Statistic applied to fields that collected several values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AggregateOp {
    /// Arithmetic mean, always a float.
    #[value(alias = "avg")]
    Average,
    /// Middle element of the sorted values.
    Median,
}

/// Replace every list field in the dataset by its statistic.
///
/// Scalar fields are left alone, and `None` leaves the dataset untouched.
/// A list with any non-integer element falls back to its first element.
pub fn reduce(dataset: &mut Dataset, op: Option<AggregateOp>) {
    let Some(op) = op else {
        return;
    };

    let mut reduced = 0usize;
    for record in dataset.records_mut() {
        for (name, value) in record.values_mut() {
            if let Value::List(items) = value {
                let collapsed = reduce_list(name, items, op);
                *value = collapsed;
                reduced += 1;
            }
        }
    }
    debug!(?op, fields = reduced, "reduced multi-valued fields");
}

/// Statistic of one list of raw values.
///
/// Integers have no width limit. A float result that does not fit in an
/// `f64` counts as a failure, like a non-numeric element.
pub fn reduce_list(field: &str, items: &[String], op: AggregateOp) -> Value {
    let Some(first) = items.first() else {
        return Value::Scalar(String::new());
    };

    let reduced = items
        .iter()
        .map(|s| parse_integer(s))
        .collect::<Option<Vec<BigInt>>>()
        .and_then(|values| match op {
            AggregateOp::Average => average(&values),
            AggregateOp::Median => median(values),
        });

    reduced.unwrap_or_else(|| {
        debug!(field, fallback = %first, "non-numeric values, keeping first");
        Value::Scalar(first.clone())
    })
}

/// Parse a decimal integer of any size.
///
/// Accepts surrounding whitespace, one leading sign, and single underscores
/// between digits (`1_000`). Anything else is not an integer.
pub fn parse_integer(s: &str) -> Option<BigInt> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first().copied()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
        || !digits.bytes().all(|b| b.is_ascii_digit() || b == b'_')
    {
        return None;
    }

    let magnitude: BigInt = digits.replace('_', "").parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn finite(x: f64) -> Option<Value> {
    x.is_finite().then_some(Value::Float(x))
}

fn average(values: &[BigInt]) -> Option<Value> {
    let sum: BigInt = values.iter().sum();
    finite(sum.to_f64()? / values.len() as f64)
}

/// Odd counts give the middle element. Even counts give the lower-middle
/// element averaged with itself, not the mean of the two central elements.
fn median(mut values: Vec<BigInt>) -> Option<Value> {
    values.sort_unstable();
    let n = values.len();
    if n % 2 == 1 {
        Some(Value::Int(values.swap_remove(n / 2)))
    } else {
        let mid = &values[n / 2 - 1];
        finite((mid + mid).to_f64()? / 2.0)
    }
}
