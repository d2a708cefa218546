use std::fmt::{self, Display};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

/// Texts the controller uses for "no reading available".
pub const UNAVAILABLE_MARKERS: &[&str] = &["---", "unavailable", "none", "n/a"];

/// Text shown instead of a date when an event is too far in the past.
pub const DATETIME_SPECIAL_TEXT: &str = "größer 7 tage";

pub const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

const NUMERIC_EPSILON: f64 = 1e-9;

static NUMERIC_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?\d*\.?\d+").expect("numeric pattern should always be valid")
});

static PERCENT_STEPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*%?[\s-]*Schritte").expect("percent pattern should always be valid")
});

/// A parsed node reading.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Enum(String),
    Timestamp(NaiveDateTime),
    Unavailable,
}

impl NodeValue {
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(num) => Some(*num as f64),
            Self::Number(num) => Some(*num),
            Self::Text(_) | Self::Enum(_) | Self::Timestamp(_) | Self::Unavailable => None,
        }
    }

    /// Check whether this value is what the device would report after
    /// writing `raw` to it.
    ///
    /// Numbers compare numerically, so a cached `55` matches a write of
    /// `"55.0"`.
    #[must_use]
    pub fn matches_raw(&self, raw: &str) -> bool {
        let raw = raw.trim();
        match self {
            Self::Integer(_) | Self::Number(_) => {
                let Some(cached) = self.as_f64() else {
                    return false;
                };
                parse_f64(raw).is_some_and(|num| (num - cached).abs() < NUMERIC_EPSILON)
            }
            Self::Text(text) | Self::Enum(text) => text == raw,
            Self::Timestamp(ts) => ts.format(DATETIME_FORMAT).to_string() == raw,
            Self::Unavailable => false,
        }
    }
}

impl Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(num) => write!(f, "{num}"),
            Self::Number(num) => write!(f, "{num}"),
            Self::Text(text) | Self::Enum(text) => f.write_str(text),
            Self::Timestamp(ts) => write!(f, "{}", ts.format(DATETIME_FORMAT)),
            Self::Unavailable => f.write_str("---"),
        }
    }
}

impl Serialize for NodeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(num) => serializer.serialize_i64(*num),
            Self::Number(num) => serializer.serialize_f64(*num),
            Self::Text(text) | Self::Enum(text) => serializer.serialize_str(text),
            Self::Timestamp(ts) => serializer.collect_str(&ts.format("%Y-%m-%dT%H:%M:%S")),
            Self::Unavailable => serializer.serialize_none(),
        }
    }
}

/// How the raw text of a node is interpreted.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// "30 %-Schritte" style readings
    Percent,
    Int,
    Float,
    EnumText,
    Text,
    AllowEmpty,
    DateTimeOrText,
    #[default]
    Auto,
}

/// Display formatter reported by the controller for a node.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum Formatter {
    #[serde(rename = "iFLOAT2")]
    Float2,
    #[serde(rename = "iKWH")]
    KiloWattHours,
    #[serde(rename = "iMWH")]
    MegaWattHours,
    #[serde(rename = "iSTD")]
    Hours,
    #[serde(rename = "iMIN")]
    Minutes,
    #[serde(rename = "iSEK")]
    Seconds,
    #[serde(rename = "iLITER")]
    Liters,
    #[serde(other)]
    Other,
}

impl Formatter {
    /// Counters and durations that are reported as integers when whole.
    #[must_use]
    pub const fn prefers_integer(self) -> bool {
        matches!(
            self,
            Self::KiloWattHours
                | Self::MegaWattHours
                | Self::Hours
                | Self::Minutes
                | Self::Seconds
                | Self::Liters
        )
    }
}

/// Normalize decimal and thousands separators.
///
/// When both `.` and `,` appear, whichever comes last is the decimal
/// separator. A lone `,` is a decimal comma.
fn normalize_separators(text: &str) -> String {
    let text: String = text
        .chars()
        .filter(|ch| *ch != ' ' && *ch != '\u{a0}')
        .collect();

    match (text.rfind('.'), text.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (None, Some(_)) => text.replace(',', "."),
        _ => text,
    }
}

fn extract_numeric(text: &str) -> Option<f64> {
    let normalized = normalize_separators(text);
    NUMERIC_PART
        .find(&normalized)
        .and_then(|m| m.as_str().parse().ok())
}

/// Strict numeric parse: the whole text must be a number.
fn parse_f64(text: &str) -> Option<f64> {
    normalize_separators(text).parse().ok()
}

#[allow(clippy::cast_possible_truncation)]
fn parse_float(text: &str, formatter: Option<Formatter>) -> Option<NodeValue> {
    let num = extract_numeric(text)?;
    match formatter {
        Some(Formatter::Float2) => Some(NodeValue::Number((num * 100.0).round() / 100.0)),
        Some(fmt) if fmt.prefers_integer() && num.fract() == 0.0 => {
            Some(NodeValue::Integer(num as i64))
        }
        _ => Some(NodeValue::Number(num)),
    }
}

fn parse_datetime(text: &str) -> Option<NodeValue> {
    let text = text.replace("&nbsp;", " ");
    let text = text.trim();
    if text.to_lowercase().contains(DATETIME_SPECIAL_TEXT) {
        return Some(NodeValue::Text(text.to_string()));
    }
    match NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
        Ok(ts) => Some(NodeValue::Timestamp(ts)),
        Err(_) => {
            log::warn!("Could not parse {text:?} as a date/time");
            None
        }
    }
}

impl ValueKind {
    /// Parse the raw text reported by the controller.
    ///
    /// Returns `None` when the text cannot be interpreted as this kind.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn parse(
        self,
        raw: &str,
        formatter: Option<Formatter>,
        collapse_whitespace: bool,
    ) -> Option<NodeValue> {
        let cleaned = if collapse_whitespace {
            raw.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            raw.trim().to_string()
        };

        if cleaned.is_empty() {
            return (self == Self::AllowEmpty).then(|| NodeValue::Text(String::new()));
        }

        if UNAVAILABLE_MARKERS
            .iter()
            .any(|marker| cleaned.eq_ignore_ascii_case(marker))
        {
            return Some(NodeValue::Unavailable);
        }

        match self {
            Self::Percent => PERCENT_STEPS
                .captures(&cleaned)
                .and_then(|caps| caps[1].parse().ok())
                .map(NodeValue::Integer),
            Self::Int => extract_numeric(&cleaned).map(|num| NodeValue::Integer(num.trunc() as i64)),
            Self::Float => parse_float(&cleaned, formatter),
            Self::EnumText => Some(NodeValue::Enum(cleaned)),
            Self::Text | Self::AllowEmpty => Some(NodeValue::Text(cleaned)),
            Self::DateTimeOrText => parse_datetime(&cleaned),
            Self::Auto => Some(
                parse_f64(&cleaned)
                    .filter(|num| num.is_finite())
                    .map_or(NodeValue::Text(cleaned), NodeValue::Number),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::value::{Formatter, NodeValue, ValueKind};

    #[test]
    fn unavailable_markers() {
        for raw in ["---", " --- ", "N/A", "unavailable", "None"] {
            assert_eq!(
                ValueKind::Float.parse(raw, None, false),
                Some(NodeValue::Unavailable),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn auto_kind() {
        assert_eq!(
            ValueKind::Auto.parse("23.5", None, false),
            Some(NodeValue::Number(23.5))
        );
        assert_eq!(
            ValueKind::Auto.parse("Heizen", None, false),
            Some(NodeValue::Text("Heizen".into()))
        );
        assert_eq!(ValueKind::Auto.parse("  ", None, false), None);
    }

    #[test]
    fn float_formatters() {
        assert_eq!(
            ValueKind::Float.parse("1,234.567 kWh", Some(Formatter::Float2), false),
            Some(NodeValue::Number(1234.57))
        );
        assert_eq!(
            ValueKind::Float.parse("12.0", Some(Formatter::Hours), false),
            Some(NodeValue::Integer(12))
        );
        assert_eq!(
            ValueKind::Float.parse("12.5", Some(Formatter::Hours), false),
            Some(NodeValue::Number(12.5))
        );
        assert_eq!(
            ValueKind::Float.parse("21,5 °C", None, false),
            Some(NodeValue::Number(21.5))
        );
        assert_eq!(
            ValueKind::Float.parse("1.234,5", None, false),
            Some(NodeValue::Number(1234.5))
        );
    }

    #[test]
    fn int_truncates() {
        assert_eq!(
            ValueKind::Int.parse("-7.9 K", None, false),
            Some(NodeValue::Integer(-7))
        );
        assert_eq!(ValueKind::Int.parse("aus", None, false), None);
    }

    #[test]
    fn percent_steps() {
        assert_eq!(
            ValueKind::Percent.parse("30 %-Schritte", None, false),
            Some(NodeValue::Integer(30))
        );
        assert_eq!(
            ValueKind::Percent.parse("10 schritte", None, false),
            Some(NodeValue::Integer(10))
        );
        assert_eq!(ValueKind::Percent.parse("30 %", None, false), None);
    }

    #[test]
    fn empty_strings() {
        assert_eq!(
            ValueKind::AllowEmpty.parse("", None, false),
            Some(NodeValue::Text(String::new()))
        );
        assert_eq!(ValueKind::Text.parse("", None, false), None);
    }

    #[test]
    fn whitespace_collapse() {
        assert_eq!(
            ValueKind::Text.parse(" Puffer   laden ", None, true),
            Some(NodeValue::Text("Puffer laden".into()))
        );
        assert_eq!(
            ValueKind::Text.parse(" Puffer   laden ", None, false),
            Some(NodeValue::Text("Puffer   laden".into()))
        );
    }

    #[test]
    fn datetime_or_text() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(6, 30, 0))
            .unwrap();
        assert_eq!(
            ValueKind::DateTimeOrText.parse("01.03.2024&nbsp;06:30", None, false),
            Some(NodeValue::Timestamp(expected))
        );
        assert_eq!(
            ValueKind::DateTimeOrText.parse("Größer 7 Tage", None, false),
            Some(NodeValue::Text("Größer 7 Tage".into()))
        );
        assert_eq!(ValueKind::DateTimeOrText.parse("gestern", None, false), None);
    }

    #[test]
    fn matches_raw_values() {
        assert!(NodeValue::Integer(55).matches_raw("55.0"));
        assert!(NodeValue::Number(21.5).matches_raw("21.5"));
        assert!(!NodeValue::Number(21.5).matches_raw("22"));
        assert!(NodeValue::Enum("Aus".into()).matches_raw("Aus"));
        assert!(!NodeValue::Unavailable.matches_raw("---"));
    }

    #[test]
    fn serialize_values() {
        let json = serde_json::to_string(&[
            NodeValue::Number(23.5),
            NodeValue::Integer(4),
            NodeValue::Unavailable,
            NodeValue::Enum("Aus".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[23.5,4,null,"Aus"]"#);
    }
}
