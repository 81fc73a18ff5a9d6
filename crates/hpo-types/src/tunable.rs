//! Tunable search-space definitions.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;
use std::str::FromStr;

use crate::errors::{HpoError, HpoResult};
use crate::validation_error;

/// Declared type of a tunable (and of an objective function value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Double,
    Integer,
    Categorical,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Integer => "integer",
            Self::Categorical => "categorical",
        }
    }
}

impl FromStr for ValueType {
    type Err = HpoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "double" => Ok(Self::Double),
            "integer" => Ok(Self::Integer),
            "categorical" => Ok(Self::Categorical),
            _ => Err(HpoError::UnknownValueType {
                value_type: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ValueType {
    type Error = HpoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The domain a tunable is sampled from.
#[derive(Debug, Clone, PartialEq)]
pub enum TunableDomain {
    /// Real values `lower_bound + k * step` within the bounds.
    Double {
        lower_bound: f64,
        upper_bound: f64,
        step: f64,
    },
    /// Integer values `lower_bound + k * step` within the bounds.
    Integer {
        lower_bound: i64,
        upper_bound: i64,
        step: i64,
    },
    /// One of an ordered set of choices.
    Categorical { choices: Vec<serde_json::Value> },
}

impl TunableDomain {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Double { .. } => ValueType::Double,
            Self::Integer { .. } => ValueType::Integer,
            Self::Categorical { .. } => ValueType::Categorical,
        }
    }

    fn validate(&self, name: &str) -> HpoResult<()> {
        match self {
            Self::Double {
                lower_bound,
                upper_bound,
                step,
            } => {
                if !lower_bound.is_finite() || !upper_bound.is_finite() || !step.is_finite() {
                    return Err(validation_error!("tunable '{name}': bounds and step must be finite"));
                }
                if lower_bound > upper_bound {
                    return Err(validation_error!(
                        "tunable '{name}': lower_bound {lower_bound} exceeds upper_bound {upper_bound}"
                    ));
                }
                if *step <= 0.0 {
                    return Err(validation_error!("tunable '{name}': step must be positive, got {step}"));
                }
            }
            Self::Integer {
                lower_bound,
                upper_bound,
                step,
            } => {
                if lower_bound > upper_bound {
                    return Err(validation_error!(
                        "tunable '{name}': lower_bound {lower_bound} exceeds upper_bound {upper_bound}"
                    ));
                }
                if *step <= 0 {
                    return Err(validation_error!("tunable '{name}': step must be positive, got {step}"));
                }
                if upper_bound.checked_sub(*lower_bound).is_none() {
                    return Err(validation_error!(
                        "tunable '{name}': range {lower_bound}..={upper_bound} is wider than an i64"
                    ));
                }
            }
            Self::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(validation_error!("tunable '{name}': choices cannot be empty"));
                }
            }
        }
        Ok(())
    }
}

/// A named dimension of the search space.
///
/// Decoded from the flat wire form used by the experiment manager:
///
/// ```json
/// {"name": "cpu", "value_type": "double", "lower_bound": 0.5, "upper_bound": 2.0, "step": 0.1}
/// ```
///
/// Decoding rejects unknown value types, missing or superfluous fields, and
/// inverted bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTunable", into = "RawTunable")]
pub struct Tunable {
    pub name: String,
    pub domain: TunableDomain,
}

impl Tunable {
    pub fn new(name: impl Into<String>, domain: TunableDomain) -> HpoResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(validation_error!("tunable name cannot be empty"));
        }
        domain.validate(&name)?;
        Ok(Self { name, domain })
    }

    pub fn double(
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
        step: f64,
    ) -> HpoResult<Self> {
        Self::new(
            name,
            TunableDomain::Double {
                lower_bound,
                upper_bound,
                step,
            },
        )
    }

    pub fn integer(
        name: impl Into<String>,
        lower_bound: i64,
        upper_bound: i64,
        step: i64,
    ) -> HpoResult<Self> {
        Self::new(
            name,
            TunableDomain::Integer {
                lower_bound,
                upper_bound,
                step,
            },
        )
    }

    pub fn categorical<I, V>(name: impl Into<String>, choices: I) -> HpoResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self::new(
            name,
            TunableDomain::Categorical {
                choices: choices.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn value_type(&self) -> ValueType {
        self.domain.value_type()
    }
}

/// Flat wire representation of a [`Tunable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTunable {
    name: String,
    value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lower_bound: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upper_bound: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<serde_json::Value>>,
}

impl RawTunable {
    fn required(&self, field: &str, value: &Option<Number>) -> HpoResult<Number> {
        value.clone().ok_or_else(|| {
            validation_error!(
                "tunable '{}' of type {} requires '{field}'",
                self.name,
                self.value_type
            )
        })
    }

    fn float(&self, field: &str, value: &Option<Number>) -> HpoResult<f64> {
        let number = self.required(field, value)?;
        number
            .as_f64()
            .ok_or_else(|| validation_error!("tunable '{}': '{field}' is not a number", self.name))
    }

    fn int(&self, field: &str, value: &Option<Number>) -> HpoResult<i64> {
        let number = self.required(field, value)?;
        if let Some(v) = number.as_i64() {
            return Ok(v);
        }
        match number.as_f64() {
            Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
            _ => Err(validation_error!(
                "tunable '{}': '{field}' must be an integer, got {number}",
                self.name
            )),
        }
    }

    fn reject_present(&self, fields: &[(&str, bool)]) -> HpoResult<()> {
        for (field, present) in fields {
            if *present {
                return Err(validation_error!(
                    "tunable '{}' of type {} does not accept '{field}'",
                    self.name,
                    self.value_type
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<RawTunable> for Tunable {
    type Error = HpoError;

    fn try_from(raw: RawTunable) -> Result<Self, Self::Error> {
        let domain = match raw.value_type.parse::<ValueType>()? {
            ValueType::Double => {
                raw.reject_present(&[("choices", raw.choices.is_some())])?;
                TunableDomain::Double {
                    lower_bound: raw.float("lower_bound", &raw.lower_bound)?,
                    upper_bound: raw.float("upper_bound", &raw.upper_bound)?,
                    step: raw.float("step", &raw.step)?,
                }
            }
            ValueType::Integer => {
                raw.reject_present(&[("choices", raw.choices.is_some())])?;
                TunableDomain::Integer {
                    lower_bound: raw.int("lower_bound", &raw.lower_bound)?,
                    upper_bound: raw.int("upper_bound", &raw.upper_bound)?,
                    step: raw.int("step", &raw.step)?,
                }
            }
            ValueType::Categorical => {
                raw.reject_present(&[
                    ("lower_bound", raw.lower_bound.is_some()),
                    ("upper_bound", raw.upper_bound.is_some()),
                    ("step", raw.step.is_some()),
                ])?;
                TunableDomain::Categorical {
                    choices: raw.choices.clone().ok_or_else(|| {
                        validation_error!("tunable '{}' of type categorical requires 'choices'", raw.name)
                    })?,
                }
            }
        };
        Tunable::new(raw.name, domain)
    }
}

impl From<Tunable> for RawTunable {
    fn from(tunable: Tunable) -> Self {
        let value_type = tunable.value_type().to_string();
        let mut raw = RawTunable {
            name: tunable.name,
            value_type,
            lower_bound: None,
            upper_bound: None,
            step: None,
            choices: None,
        };
        match tunable.domain {
            TunableDomain::Double {
                lower_bound,
                upper_bound,
                step,
            } => {
                raw.lower_bound = Number::from_f64(lower_bound);
                raw.upper_bound = Number::from_f64(upper_bound);
                raw.step = Number::from_f64(step);
            }
            TunableDomain::Integer {
                lower_bound,
                upper_bound,
                step,
            } => {
                raw.lower_bound = Some(lower_bound.into());
                raw.upper_bound = Some(upper_bound.into());
                raw.step = Some(step.into());
            }
            TunableDomain::Categorical { choices } => raw.choices = Some(choices),
        }
        raw
    }
}

/// A concrete tunable value produced for a trial.
///
/// Encoded as the bare JSON value. Decoding cannot see the declared type, so
/// any JSON number comes back as `Integer` or `Double`, even when it was a
/// numeric categorical choice; only non-numeric values decode as
/// `Categorical`. Compare decoded numbers through [`TunableValue::as_f64`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TunableValue {
    Integer(i64),
    Double(f64),
    Categorical(serde_json::Value),
}

impl TunableValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Categorical(v) => v.as_f64(),
        }
    }
}

impl fmt::Display for TunableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Categorical(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_all_value_types() {
        let tunables: Vec<Tunable> = serde_json::from_value(json!([
            {"name": "cpu", "value_type": "double", "lower_bound": 0.5, "upper_bound": 2.0, "step": 0.1},
            {"name": "replicas", "value_type": "Integer", "lower_bound": 1, "upper_bound": 5, "step": 1},
            {"name": "mode", "value_type": "CATEGORICAL", "choices": ["fast", "safe"]}
        ]))
        .unwrap();

        assert_eq!(tunables.len(), 3);
        assert_eq!(
            tunables[0].domain,
            TunableDomain::Double {
                lower_bound: 0.5,
                upper_bound: 2.0,
                step: 0.1
            }
        );
        assert_eq!(tunables[1].value_type(), ValueType::Integer);
        assert_eq!(
            tunables[2].domain,
            TunableDomain::Categorical {
                choices: vec![json!("fast"), json!("safe")]
            }
        );
    }

    #[test]
    fn integer_bounds_accept_integral_floats() {
        let tunable: Tunable = serde_json::from_value(json!(
            {"name": "threads", "value_type": "integer", "lower_bound": 2.0, "upper_bound": 8, "step": 2}
        ))
        .unwrap();
        assert_eq!(
            tunable.domain,
            TunableDomain::Integer {
                lower_bound: 2,
                upper_bound: 8,
                step: 2
            }
        );

        let err = serde_json::from_value::<Tunable>(json!(
            {"name": "threads", "value_type": "integer", "lower_bound": 2.5, "upper_bound": 8, "step": 1}
        ))
        .unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[test]
    fn rejects_unknown_value_type() {
        let err = serde_json::from_value::<Tunable>(json!(
            {"name": "x", "value_type": "boolean", "choices": [true, false]}
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Unknown tunable value type: boolean"));
    }

    #[test]
    fn rejects_missing_and_superfluous_fields() {
        let missing = serde_json::from_value::<Tunable>(json!(
            {"name": "cpu", "value_type": "double", "lower_bound": 0.5, "upper_bound": 2.0}
        ))
        .unwrap_err();
        assert!(missing.to_string().contains("requires 'step'"));

        let superfluous = serde_json::from_value::<Tunable>(json!(
            {"name": "mode", "value_type": "categorical", "choices": ["a"], "step": 1}
        ))
        .unwrap_err();
        assert!(superfluous.to_string().contains("does not accept 'step'"));

        let no_choices = serde_json::from_value::<Tunable>(json!(
            {"name": "mode", "value_type": "categorical"}
        ))
        .unwrap_err();
        assert!(no_choices.to_string().contains("requires 'choices'"));
    }

    #[test]
    fn rejects_invalid_domains() {
        assert!(Tunable::double("cpu", 2.0, 0.5, 0.1).is_err());
        assert!(Tunable::double("cpu", 0.5, 2.0, 0.0).is_err());
        assert!(Tunable::integer("replicas", 1, 5, -1).is_err());
        assert!(Tunable::categorical("mode", Vec::<String>::new()).is_err());
        assert!(Tunable::integer("", 1, 5, 1).is_err());
        assert!(Tunable::integer("pinned", 3, 3, 1).is_ok());
    }

    #[test]
    fn rejects_integer_range_wider_than_i64() {
        let err = Tunable::integer("x", i64::MIN, i64::MAX, 1).unwrap_err();
        assert!(matches!(err, HpoError::Validation(ref m) if m.contains("wider than an i64")));

        let decoded = serde_json::from_value::<Tunable>(json!(
            {"name": "x", "value_type": "integer", "lower_bound": i64::MIN, "upper_bound": i64::MAX, "step": 1}
        ));
        assert!(decoded.is_err());

        assert!(Tunable::integer("x", i64::MIN / 2, i64::MAX / 2, 1).is_ok());
    }

    #[test]
    fn wire_form_is_flat() {
        let tunable = Tunable::integer("replicas", 1, 5, 1).unwrap();
        let value = serde_json::to_value(&tunable).unwrap();
        assert_eq!(
            value,
            json!({"name": "replicas", "value_type": "integer", "lower_bound": 1, "upper_bound": 5, "step": 1})
        );

        let tunable = Tunable::categorical("mode", ["fast", "safe"]).unwrap();
        let value = serde_json::to_value(&tunable).unwrap();
        assert_eq!(
            value,
            json!({"name": "mode", "value_type": "categorical", "choices": ["fast", "safe"]})
        );
    }

    #[test]
    fn tunable_value_untagged_encoding() {
        assert_eq!(serde_json::to_value(TunableValue::Integer(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(TunableValue::Double(0.7)).unwrap(), json!(0.7));
        assert_eq!(
            serde_json::to_value(TunableValue::Categorical(json!("fast"))).unwrap(),
            json!("fast")
        );
        assert_eq!(
            serde_json::from_value::<TunableValue>(json!(4)).unwrap(),
            TunableValue::Integer(4)
        );
        assert_eq!(TunableValue::Double(1.5).to_string(), "1.5");
    }

    #[test]
    fn numeric_categorical_choices_decode_as_numbers() {
        let encoded = serde_json::to_value(TunableValue::Categorical(json!(3))).unwrap();
        assert_eq!(encoded, json!(3));
        assert_eq!(
            serde_json::from_value::<TunableValue>(encoded).unwrap(),
            TunableValue::Integer(3)
        );
        assert_eq!(
            serde_json::from_value::<TunableValue>(json!(true)).unwrap(),
            TunableValue::Categorical(json!(true))
        );
    }
}
