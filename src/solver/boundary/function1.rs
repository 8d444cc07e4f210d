use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::field::FieldValue;
use serde_json::{json, Value};

/// Value as a function of one variable, normally time.
#[derive(Clone, Debug, PartialEq)]
pub enum Function1<T> {
    Constant(T),
    /// Piecewise linear through `(x, value)` pairs sorted by `x`; clamped at
    /// both ends.
    Table(Vec<(f64, T)>),
    /// `value * clamp((x - start) / duration, 0, 1)`.
    LinearRamp { start: f64, duration: f64, value: T },
}

const VALID_TYPES: [&str; 3] = ["constant", "table", "linearRamp"];

impl<T: FieldValue> Function1<T> {
    pub fn value(&self, x: f64) -> T {
        match self {
            Function1::Constant(v) => *v,
            Function1::Table(points) => table_value(points, x),
            Function1::LinearRamp {
                start,
                duration,
                value,
            } => {
                let s = if *duration > 0.0 {
                    ((x - start) / duration).clamp(0.0, 1.0)
                } else if x >= *start {
                    1.0
                } else {
                    0.0
                };
                *value * s
            }
        }
    }

    /// Reads `key` from `dict`: a bare value is a constant, otherwise
    /// `{"type": ..., ...}`.
    pub fn from_dict(dict: &Dictionary, key: &str) -> Result<Self, ConfigError> {
        let entry = dict.entry(key)?;
        let invalid = |reason: String| ConfigError::InvalidEntry {
            scope: dict.scope().to_string(),
            key: key.to_string(),
            reason,
        };

        if let Some(v) = T::from_json(entry) {
            return Ok(Function1::Constant(v));
        }

        let sub = Dictionary::from_value(&format!("{}.{}", dict.scope(), key), entry.clone())?;
        let kind: String = sub.lookup("type")?;
        match kind.as_str() {
            "constant" => {
                let v = T::from_json(sub.entry("value")?)
                    .ok_or_else(|| invalid(format!("bad constant value for {}", T::TYPE_NAME)))?;
                Ok(Function1::Constant(v))
            }
            "table" => {
                let rows: Vec<(f64, Value)> = sub.lookup("values")?;
                if rows.is_empty() {
                    return Err(invalid("table has no rows".to_string()));
                }
                let mut points = Vec::with_capacity(rows.len());
                for (x, v) in rows {
                    let v = T::from_json(&v)
                        .ok_or_else(|| invalid(format!("bad table value {}", v)))?;
                    points.push((x, v));
                }
                if points.windows(2).any(|w| w[1].0 < w[0].0) {
                    return Err(invalid("table abscissae must be increasing".to_string()));
                }
                Ok(Function1::Table(points))
            }
            "linearRamp" => {
                let value = T::from_json(sub.entry("value")?)
                    .ok_or_else(|| invalid(format!("bad ramp value for {}", T::TYPE_NAME)))?;
                Ok(Function1::LinearRamp {
                    start: sub.lookup_or("start", 0.0)?,
                    duration: sub.lookup("duration")?,
                    value,
                })
            }
            other => Err(ConfigError::UnknownType {
                what: "Function1",
                name: other.to_string(),
                valid: VALID_TYPES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    pub fn write(&self) -> Value {
        match self {
            Function1::Constant(v) => v.to_json(),
            Function1::Table(points) => json!({
                "type": "table",
                "values": points.iter().map(|(x, v)| json!([x, v.to_json()])).collect::<Vec<_>>(),
            }),
            Function1::LinearRamp {
                start,
                duration,
                value,
            } => json!({
                "type": "linearRamp",
                "start": start,
                "duration": duration,
                "value": value.to_json(),
            }),
        }
    }
}

fn table_value<T: FieldValue>(points: &[(f64, T)], x: f64) -> T {
    let Some(&(x0, v0)) = points.first() else {
        return T::zero();
    };
    if x <= x0 {
        return v0;
    }
    for w in points.windows(2) {
        let (xa, va) = w[0];
        let (xb, vb) = w[1];
        if x <= xb {
            if xb - xa <= 0.0 {
                return vb;
            }
            let s = (x - xa) / (xb - xa);
            return va * (1.0 - s) + vb * s;
        }
    }
    points[points.len() - 1].1
}
