//! Custom filters for the minijinja templating engine.

use minijinja::{
    Error, ErrorKind,
    value::{Value, ValueKind},
};

use crate::models::event::to_pretty_json;

/// Pretty-prints any value as JSON with a one-space indent.
pub fn json_format(value: Value) -> Result<String, Error> {
    to_pretty_json(&value).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, format!("json_format failed: {e}"))
    })
}

/// Sums a sequence of numbers. Integers stay integers.
pub fn sum(values: Value) -> Result<Value, Error> {
    if values.kind() != ValueKind::Seq {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "sum filter can only be applied to a sequence.",
        ));
    }

    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;
    for value in values.try_iter()? {
        if let Ok(n) = i64::try_from(value.clone()) {
            int_total += n;
        } else if let Ok(f) = f64::try_from(value.clone()) {
            float_total += f;
            saw_float = true;
        } else {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("sum filter got a non-numeric value: {value}"),
            ));
        }
    }

    if saw_float { Ok(Value::from(int_total as f64 + float_total)) } else { Ok(Value::from(int_total)) }
}

/// Cuts a string to at most `max` characters, appending an ellipsis when cut.
pub fn truncate_chars(value: String, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &value[..idx]),
        None => value,
    }
}
