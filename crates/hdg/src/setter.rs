use serde::{Deserialize, Serialize};

use crate::error::{HdgError, HdgResult};

const STEP_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SetterType {
    Int,
    Float1,
    Float2,
}

/// Constraints and wire format for a writable node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetterSpec {
    #[serde(rename = "type")]
    pub setter_type: SetterType,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl SetterType {
    /// Render a value the way the controller expects it on the wire.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Int => format!("{}", value.round() as i64),
            Self::Float1 => format!("{value:.1}"),
            Self::Float2 => format!("{value:.2}"),
        }
    }
}

impl SetterSpec {
    pub fn validate(&self, node: &str, value: f64) -> HdgResult<()> {
        if value < self.min || value > self.max {
            return Err(HdgError::OutOfRange {
                node: node.to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }

        let aligned = if self.step == 0.0 {
            (value - self.min).abs() < STEP_EPSILON
        } else {
            let remainder = (value - self.min).rem_euclid(self.step);
            remainder < STEP_EPSILON || (self.step - remainder) < STEP_EPSILON
        };

        if aligned {
            Ok(())
        } else {
            Err(HdgError::InvalidStep {
                node: node.to_string(),
                value,
                min: self.min,
                step: self.step,
            })
        }
    }

    /// Validate `raw` and turn it into the string sent to the controller.
    pub fn prepare(&self, node: &str, raw: &str) -> HdgResult<String> {
        let value: f64 = raw
            .trim()
            .replace(',', ".")
            .parse()
            .map_err(|_| HdgError::NotNumeric(raw.to_string()))?;

        self.validate(node, value)?;
        Ok(self.setter_type.format(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::HdgError;
    use crate::setter::{SetterSpec, SetterType};

    const SPEC: SetterSpec = SetterSpec {
        setter_type: SetterType::Float1,
        min: 10.0,
        max: 30.0,
        step: 0.5,
    };

    #[test]
    fn format_types() {
        assert_eq!(SetterType::Int.format(21.6), "22");
        assert_eq!(SetterType::Float1.format(21.0), "21.0");
        assert_eq!(SetterType::Float2.format(0.126), "0.13");
    }

    #[test]
    fn prepare_valid() {
        assert_eq!(SPEC.prepare("1234", "21.5").unwrap(), "21.5");
        assert_eq!(SPEC.prepare("1234", "21,0").unwrap(), "21.0");
        assert_eq!(SPEC.prepare("1234", "10").unwrap(), "10.0");
    }

    #[test]
    fn prepare_rejects() {
        assert!(matches!(
            SPEC.prepare("1234", "31"),
            Err(HdgError::OutOfRange { .. })
        ));
        assert!(matches!(
            SPEC.prepare("1234", "21.3"),
            Err(HdgError::InvalidStep { .. })
        ));
        assert!(matches!(
            SPEC.prepare("1234", "warm"),
            Err(HdgError::NotNumeric(_))
        ));
    }

    #[test]
    fn zero_step_only_allows_min() {
        let spec = SetterSpec {
            step: 0.0,
            ..SPEC
        };
        assert!(spec.validate("1", 10.0).is_ok());
        assert!(spec.validate("1", 10.5).is_err());
    }
}
