//! Ordering of values within one group type.

use std::cmp::Ordering;

use crate::bson::{BsonType, Value};
use crate::error::{ProfileError, ProfileResult};

/// Compares two values of a group whose type is `ty`.
///
/// Numbers use IEEE total ordering for doubles, strings compare bytewise,
/// `false < true`, dates by instant and decimals by numeric value. Any value
/// that does not match `ty`, or a type with no ordering, is an error.
pub fn compare_values(ty: BsonType, a: &Value, b: &Value) -> ProfileResult<Ordering> {
    let ordering = match (ty, a, b) {
        (BsonType::Double, Value::Double(a), Value::Double(b)) => a.total_cmp(b),
        (BsonType::String, Value::String(a), Value::String(b)) => a.cmp(b),
        (BsonType::ObjectId, Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
        (BsonType::Bool, Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (BsonType::Date, Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (BsonType::Int, Value::Int32(a), Value::Int32(b)) => a.cmp(b),
        (
            BsonType::Timestamp,
            Value::Timestamp {
                time: ta,
                increment: ia,
            },
            Value::Timestamp {
                time: tb,
                increment: ib,
            },
        ) => (ta, ia).cmp(&(tb, ib)),
        (BsonType::Long, Value::Int64(a), Value::Int64(b)) => a.cmp(b),
        (BsonType::Decimal, Value::Decimal128(a), Value::Decimal128(b)) => a.total_cmp(b),
        _ => {
            return Err(ProfileError::unknown_type(format!(
                "cannot compare {} with {} as {ty}",
                a.bson_type(),
                b.bson_type()
            )))
        }
    };
    Ok(ordering)
}

/// Returns the smaller of `current` and `candidate`.
pub fn min_value(ty: BsonType, current: Option<Value>, candidate: &Value) -> ProfileResult<Value> {
    match current {
        Some(current) if compare_values(ty, &current, candidate)?.is_le() => Ok(current),
        _ => Ok(candidate.clone()),
    }
}

/// Returns the larger of `current` and `candidate`.
pub fn max_value(ty: BsonType, current: Option<Value>, candidate: &Value) -> ProfileResult<Value> {
    match current {
        Some(current) if compare_values(ty, &current, candidate)?.is_ge() => Ok(current),
        _ => Ok(candidate.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::{Decimal128, ObjectId};

    #[test]
    fn test_numeric_and_lexical_orderings() {
        assert_eq!(
            compare_values(BsonType::Int, &Value::Int32(2), &Value::Int32(10)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_values(
                BsonType::String,
                &Value::String("b".into()),
                &Value::String("ab".into())
            )
            .unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(BsonType::Bool, &Value::Boolean(false), &Value::Boolean(true))
                .unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_values(BsonType::Date, &Value::DateTime(-5), &Value::DateTime(3)).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_decimal_and_object_id() {
        let small = Decimal128::from_parts(false, 0, 9).unwrap();
        let big = Decimal128::from_parts(false, -1, 100).unwrap();
        assert_eq!(
            compare_values(
                BsonType::Decimal,
                &Value::Decimal128(small),
                &Value::Decimal128(big)
            )
            .unwrap(),
            Ordering::Less
        );

        let a = Value::ObjectId(ObjectId::from_bytes([0; 12]));
        let b = Value::ObjectId(ObjectId::from_bytes([1; 12]));
        assert_eq!(
            compare_values(BsonType::ObjectId, &a, &b).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_mismatch_is_unknown_type() {
        let err = compare_values(BsonType::Int, &Value::Int32(1), &Value::Int64(1)).unwrap_err();
        assert!(matches!(err, ProfileError::UnknownType(_)));
        assert!(compare_values(BsonType::Null, &Value::Null, &Value::Null).is_err());
    }

    #[test]
    fn test_min_max_helpers() {
        let ty = BsonType::Double;
        let min = min_value(ty, None, &Value::Double(3.0)).unwrap();
        let min = min_value(ty, Some(min), &Value::Double(-1.0)).unwrap();
        assert_eq!(min, Value::Double(-1.0));
        let max = max_value(ty, Some(Value::Double(3.0)), &Value::Double(1.0)).unwrap();
        assert_eq!(max, Value::Double(3.0));
    }
}
