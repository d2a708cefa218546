use serde::{Deserialize, Serialize};

use crate::node::strip_node_suffix;
use crate::setter::SetterSpec;
use crate::value::{Formatter, NodeValue, ValueKind};

/// Catalog entry describing one node on the controller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataPoint {
    pub key: String,
    /// Node id as reported by the controller, including its suffix (`22003T`)
    pub node_id: String,
    pub polling_group: String,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<Formatter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub collapse_whitespace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter: Option<SetterSpec>,
}

impl DataPoint {
    pub fn new(key: &str, node_id: &str, polling_group: &str, kind: ValueKind) -> Self {
        Self {
            key: key.to_string(),
            node_id: node_id.to_string(),
            polling_group: polling_group.to_string(),
            kind,
            formatter: None,
            unit: None,
            collapse_whitespace: false,
            setter: None,
        }
    }

    #[must_use]
    pub const fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    #[must_use]
    pub const fn with_collapsed_whitespace(mut self) -> Self {
        self.collapse_whitespace = true;
        self
    }

    #[must_use]
    pub const fn with_setter(mut self, setter: SetterSpec) -> Self {
        self.setter = Some(setter);
        self
    }

    #[must_use]
    pub fn base_id(&self) -> &str {
        strip_node_suffix(&self.node_id)
    }

    #[must_use]
    pub const fn writable(&self) -> bool {
        self.setter.is_some()
    }

    #[must_use]
    pub fn parse(&self, raw: &str) -> Option<NodeValue> {
        self.kind
            .parse(raw, self.formatter, self.collapse_whitespace)
    }
}
