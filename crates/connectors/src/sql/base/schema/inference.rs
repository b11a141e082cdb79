use model::core::{data_type::ColumnType, value::Value};

/// Infers a column type from every sample a batch holds for one key.
///
/// Blank samples (null, absent, empty string) carry no information and are
/// skipped; `None` means no sample had any. Samples are folded in order: a
/// later non-numeric sample replaces the current guess, a number only sets
/// the guess when there is none yet, and any fractional number forces FLOAT.
pub fn infer_column_type<'a, I>(samples: I) -> Option<ColumnType>
where
    I: IntoIterator<Item = &'a Value>,
{
    samples
        .into_iter()
        .filter(|v| !v.is_blank())
        .fold(None, |inferred, sample| match sample {
            Value::Int(_) => inferred.or(Some(ColumnType::Integer)),
            Value::Float(_) if sample.has_fraction() => Some(ColumnType::Float),
            Value::Float(_) => inferred.or(Some(ColumnType::Integer)),
            other => other.column_type().or(inferred),
        })
}

/// True when an INTEGER column must become FLOAT to hold `samples`.
pub fn needs_float<'a, I>(samples: I) -> bool
where
    I: IntoIterator<Item = &'a Value>,
{
    samples.into_iter().any(Value::has_fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::core::value::Range;

    fn infer(samples: &[Value]) -> Option<ColumnType> {
        infer_column_type(samples.iter())
    }

    #[test]
    fn test_scalar_inference() {
        assert_eq!(infer(&[Value::Boolean(true)]), Some(ColumnType::Boolean));
        assert_eq!(infer(&[Value::Int(4)]), Some(ColumnType::Integer));
        assert_eq!(infer(&[Value::Float(10.01)]), Some(ColumnType::Float));
        assert_eq!(infer(&[Value::String("mr. fish".into())]), Some(ColumnType::Text));
        assert_eq!(
            infer(&[Value::Json(serde_json::json!({ "fins": 2 }))]),
            Some(ColumnType::Json)
        );

        let ts = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(infer(&[Value::Timestamp(ts)]), Some(ColumnType::Timestamp));
        assert_eq!(
            infer(&[Value::Range(Range::new(ts, ts))]),
            Some(ColumnType::Range)
        );
    }

    #[test]
    fn test_any_fractional_sample_means_float() {
        let samples = [Value::Int(10), Value::Float(10.5), Value::Int(11)];
        assert_eq!(infer(&samples), Some(ColumnType::Float));
        assert!(needs_float(samples.iter()));
    }

    #[test]
    fn test_whole_floats_stay_integer() {
        assert_eq!(infer(&[Value::Float(10.0)]), Some(ColumnType::Integer));
        assert!(!needs_float([Value::Float(10.0)].iter()));
    }

    #[test]
    fn test_blank_samples_are_skipped() {
        assert_eq!(infer(&[Value::Null, Value::String(String::new())]), None);
        assert_eq!(
            infer(&[Value::Null, Value::Int(3), Value::String(String::new())]),
            Some(ColumnType::Integer)
        );
        assert_eq!(infer(&[]), None);
    }
}
