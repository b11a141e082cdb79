use model::core::value::{Value, parse_timestamp};

/// Casts one CSV cell to the most specific value it spells.
///
/// Cells are trimmed; an empty cell is null. Integers, then floats, then
/// timestamps are tried before falling back to text.
pub fn cast_cell(raw: &str) -> Value {
    let cell = raw.trim();
    if cell.is_empty() {
        return Value::Null;
    }

    if looks_numeric(cell) {
        if let Ok(v) = cell.parse::<i64>() {
            return Value::Int(v);
        }
        if let Ok(v) = cell.parse::<f64>() {
            return Value::Float(v);
        }
    }

    match parse_timestamp(cell) {
        Some(ts) => Value::Timestamp(ts),
        None => Value::String(cell.to_string()),
    }
}

// Keeps `inf`, `NaN` and friends as text.
fn looks_numeric(cell: &str) -> bool {
    cell.bytes().any(|b| b.is_ascii_digit())
        && cell
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_cast_cells() {
        assert_eq!(cast_cell(" 42 "), Value::Int(42));
        assert_eq!(cast_cell("-7"), Value::Int(-7));
        assert_eq!(cast_cell("10.01"), Value::Float(10.01));
        assert_eq!(cast_cell(""), Value::Null);
        assert_eq!(cast_cell("   "), Value::Null);
        assert_eq!(cast_cell("inf"), Value::String("inf".into()));
        assert_eq!(cast_cell("mr. fish"), Value::String("mr. fish".into()));
        assert_eq!(cast_cell("true"), Value::String("true".into()));
        assert_eq!(
            cast_cell("2019-05-06 12:30:00"),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2019, 5, 6)
                    .unwrap()
                    .and_hms_opt(12, 30, 0)
                    .unwrap()
            )
        );
    }
}
