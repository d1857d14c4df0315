//! Typed value sanitizer (C4) — coerce and bounds-check a raw JSON value
//! against a leaf's declared datatype before it's allowed into a runtime
//! slot.
//!
//! Grounded on `VSSTypeSanitizer.cpp`'s per-datatype dispatch
//! (`checkNumTypes`/`checkBoolType`/`checkEnumType`/`checkArrayType`),
//! reimplemented as typed Rust range checks instead of C++ template
//! instantiation over the numeric width.

use serde_json::Value as Json;
use vss_types::{Datatype, LeafMeta, Scalar, VssError};

/// Inclusive numeric bounds for a scalar integer/float datatype, used when
/// the leaf doesn't declare its own narrower `min`/`max`.
fn native_bounds(scalar: Scalar) -> Option<(f64, f64)> {
    match scalar {
        Scalar::Uint8 => Some((0.0, u8::MAX as f64)),
        Scalar::Int8 => Some((i8::MIN as f64, i8::MAX as f64)),
        Scalar::Uint16 => Some((0.0, u16::MAX as f64)),
        Scalar::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
        Scalar::Uint32 => Some((0.0, u32::MAX as f64)),
        Scalar::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
        Scalar::Uint64 => Some((0.0, u64::MAX as f64)),
        Scalar::Int64 => Some((i64::MIN as f64, i64::MAX as f64)),
        Scalar::Float | Scalar::Double | Scalar::Boolean | Scalar::String => None,
    }
}

fn is_numeric(scalar: Scalar) -> bool {
    !matches!(scalar, Scalar::Boolean | Scalar::String)
}

/// Sanitize `raw` against `datatype`, honoring the leaf's declared
/// `min`/`max`/`enum` constraints. Returns the value unchanged (but
/// type-validated) on success.
pub fn sanitize_value(datatype: Datatype, meta: &LeafMeta, raw: &Json, path: &str) -> Result<Json, VssError> {
    if datatype.is_array {
        let items = raw.as_array().ok_or_else(|| VssError::OutOfBounds {
            path: path.to_owned(),
            reason: format!("expected an array for {}", datatype.to_wire_string()),
        })?;
        let sanitized: Result<Vec<Json>, VssError> = items
            .iter()
            .map(|item| sanitize_scalar(datatype.scalar, meta, item, path))
            .collect();
        Ok(Json::Array(sanitized?))
    } else {
        sanitize_scalar(datatype.scalar, meta, raw, path)
    }
}

/// Coerce `raw` to a bool, accepting the JSON literal or the strings
/// `"true"`/`"false"`.
fn coerce_bool(raw: &Json, path: &str) -> Result<bool, VssError> {
    match raw {
        Json::Bool(b) => Ok(*b),
        Json::String(s) if s == "true" => Ok(true),
        Json::String(s) if s == "false" => Ok(false),
        _ => Err(VssError::OutOfBounds {
            path: path.to_owned(),
            reason: "expected a boolean".into(),
        }),
    }
}

/// Coerce `raw` to an `f64`, accepting a JSON number or an integer/
/// float-valued string. Rejects non-finite results: JSON
/// itself can't encode NaN/±∞ as a number literal, but a string like
/// `"NaN"` or `"inf"` would otherwise parse straight through.
fn coerce_number(raw: &Json, path: &str) -> Result<f64, VssError> {
    let n = match raw {
        Json::Number(_) => raw.as_f64().ok_or_else(|| VssError::OutOfBounds {
            path: path.to_owned(),
            reason: "expected a number".into(),
        })?,
        Json::String(s) => s.parse::<f64>().map_err(|_| VssError::OutOfBounds {
            path: path.to_owned(),
            reason: format!("{s:?} is not a number"),
        })?,
        _ => {
            return Err(VssError::OutOfBounds {
                path: path.to_owned(),
                reason: "expected a number".into(),
            })
        }
    };
    if !n.is_finite() {
        return Err(VssError::OutOfBounds {
            path: path.to_owned(),
            reason: format!("{n} is not finite"),
        });
    }
    Ok(n)
}

fn sanitize_scalar(scalar: Scalar, meta: &LeafMeta, raw: &Json, path: &str) -> Result<Json, VssError> {
    match scalar {
        Scalar::Boolean => coerce_bool(raw, path).map(Json::Bool),

        Scalar::String => {
            let s = raw.as_str().ok_or_else(|| VssError::OutOfBounds {
                path: path.to_owned(),
                reason: "expected a string".into(),
            })?;
            if let Some(allowed) = &meta.enum_values {
                if !allowed.iter().any(|v| v == s) {
                    return Err(VssError::OutOfBounds {
                        path: path.to_owned(),
                        reason: format!("{s:?} is not one of {allowed:?}"),
                    });
                }
            }
            Ok(Json::String(s.to_owned()))
        }

        _ if is_numeric(scalar) => {
            let n = coerce_number(raw, path)?;

            let (native_min, native_max) = native_bounds(scalar).unwrap_or((f64::MIN, f64::MAX));
            let min = meta.min.unwrap_or(native_min).max(native_min);
            let max = meta.max.unwrap_or(native_max).min(native_max);
            if n < min || n > max {
                return Err(VssError::OutOfBounds {
                    path: path.to_owned(),
                    reason: format!("{n} is outside [{min}, {max}]"),
                });
            }

            match scalar {
                Scalar::Float | Scalar::Double => Ok(serde_json::json!(n)),
                _ => {
                    if n.fract() != 0.0 {
                        return Err(VssError::OutOfBounds {
                            path: path.to_owned(),
                            reason: format!("{n} is not an integer"),
                        });
                    }
                    Ok(serde_json::json!(n as i64))
                }
            }
        }

        _ => unreachable!("all Scalar variants handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> LeafMeta {
        LeafMeta::default()
    }

    #[test]
    fn accepts_in_range_uint8() {
        let dt = Datatype::parse("uint8").unwrap();
        assert_eq!(sanitize_value(dt, &meta(), &json!(200), "p").unwrap(), json!(200));
    }

    #[test]
    fn rejects_out_of_range_uint8() {
        let dt = Datatype::parse("uint8").unwrap();
        assert!(sanitize_value(dt, &meta(), &json!(300), "p").is_err());
    }

    #[test]
    fn respects_declared_min_max() {
        let dt = Datatype::parse("float").unwrap();
        let mut m = meta();
        m.min = Some(0.0);
        m.max = Some(10.0);
        assert!(sanitize_value(dt, &m, &json!(15.0), "p").is_err());
        assert!(sanitize_value(dt, &m, &json!(5.0), "p").is_ok());
    }

    #[test]
    fn rejects_enum_violation() {
        let dt = Datatype::parse("string").unwrap();
        let mut m = meta();
        m.enum_values = Some(vec!["OPEN".into(), "CLOSED".into()]);
        assert!(sanitize_value(dt, &m, &json!("AJAR"), "p").is_err());
        assert!(sanitize_value(dt, &m, &json!("OPEN"), "p").is_ok());
    }

    #[test]
    fn sanitizes_array_elementwise() {
        let dt = Datatype::parse("uint8[]").unwrap();
        assert!(sanitize_value(dt, &meta(), &json!([1, 2, 300]), "p").is_err());
        assert!(sanitize_value(dt, &meta(), &json!([1, 2, 3]), "p").is_ok());
    }

    #[test]
    fn coerces_string_encoded_boolean() {
        let dt = Datatype::parse("boolean").unwrap();
        assert_eq!(sanitize_value(dt, &meta(), &json!("true"), "p").unwrap(), json!(true));
        assert_eq!(sanitize_value(dt, &meta(), &json!("false"), "p").unwrap(), json!(false));
        assert!(sanitize_value(dt, &meta(), &json!("nope"), "p").is_err());
    }

    #[test]
    fn coerces_string_encoded_integer() {
        let dt = Datatype::parse("uint8").unwrap();
        assert_eq!(sanitize_value(dt, &meta(), &json!("42"), "p").unwrap(), json!(42));
        assert!(sanitize_value(dt, &meta(), &json!("bogus"), "p").is_err());
    }

    #[test]
    fn rejects_non_finite_float_string() {
        let dt = Datatype::parse("float").unwrap();
        assert!(sanitize_value(dt, &meta(), &json!("NaN"), "p").is_err());
        assert!(sanitize_value(dt, &meta(), &json!("inf"), "p").is_err());
    }
}
