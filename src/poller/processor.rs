use std::collections::{HashMap, HashSet};

use serde_json::Value;

use hdg::{NodeValue, Registry, ValueKind, strip_node_suffix};

/// Pull the node id out of a record. Integer ids are accepted as well, blank
/// ids are not.
fn record_id(record: &serde_json::Map<String, Value>) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.trim()).filter(|id| !id.is_empty()).map(str::to_string),
        Value::Number(num) if num.is_i64() || num.is_u64() => Some(num.to_string()),
        _ => None,
    }
}

fn record_text(record: &serde_json::Map<String, Value>) -> Option<String> {
    match record.get("text")? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Turn the records of one `dataRefresh` response into parsed values, keyed
/// by base node id, in response order.
///
/// Malformed records are skipped. When two records map to the same base id,
/// the first one wins.
#[must_use]
pub fn process_items(group: &str, items: &[Value], registry: &Registry) -> Vec<(String, NodeValue)> {
    let mut seen_raw: HashSet<String> = HashSet::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut values: Vec<(String, NodeValue)> = vec![];

    for item in items {
        let Some(record) = item.as_object() else {
            log::warn!("[{group}] Skipping non-object record: {item}");
            continue;
        };

        let (Some(raw_id), Some(text)) = (record_id(record), record_text(record)) else {
            log::warn!("[{group}] Skipping record without id or text: {item}");
            continue;
        };

        if !seen_raw.insert(raw_id.clone()) {
            log::error!("[{group}] Duplicate node id {raw_id:?} in response, skipping");
            continue;
        }

        let base = strip_node_suffix(&raw_id);

        let parsed = registry.definition(base).map_or_else(
            || ValueKind::Auto.parse(&text, None, false),
            |point| point.parse(&text),
        );

        let Some(value) = parsed else {
            log::debug!("[{group}] Could not parse {text:?} for node {raw_id}");
            continue;
        };

        if let Some(&first) = index.get(base) {
            let kept = &values[first].1;
            if *kept == value {
                log::debug!("[{group}] Node {base} reported twice with the same value");
            } else {
                log::error!(
                    "[{group}] Conflicting values for node {base}: keeping {kept}, dropping {value} (from {raw_id})"
                );
            }
            continue;
        }

        index.insert(base.to_string(), values.len());
        values.push((base.to_string(), value));
    }

    values
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use hdg::registry::GroupDef;
    use hdg::{DataPoint, NodeValue, Registry, ValueKind};

    use crate::poller::processor::process_items;

    fn registry() -> Registry {
        Registry::new(
            vec![GroupDef {
                key: "A".into(),
                default_interval_secs: 15,
            }],
            vec![
                DataPoint::new("flow", "1T", "A", ValueKind::Float),
                DataPoint::new("state", "2T", "A", ValueKind::EnumText),
            ],
        )
        .unwrap()
    }

    #[test]
    fn parses_by_definition() {
        let items = vec![
            json!({"id": "1T", "text": "23.5"}),
            json!({"id": "2T", "text": " Heizen "}),
            json!({"id": "9T", "text": "12"}),
        ];
        let values = process_items("A", &items, &registry());
        assert_eq!(
            values,
            [
                ("1".to_string(), NodeValue::Number(23.5)),
                ("2".to_string(), NodeValue::Enum("Heizen".into())),
                ("9".to_string(), NodeValue::Number(12.0)),
            ]
        );
    }

    #[test]
    fn skips_malformed_records() {
        let items = vec![
            json!("1T"),
            json!({"id": "1T"}),
            json!({"text": "23.5"}),
            json!({"id": "1T", "text": null}),
            json!({"id": 2, "text": 7}),
        ];
        let values = process_items("A", &items, &registry());
        assert_eq!(values, [("2".to_string(), NodeValue::Enum("7".into()))]);
    }

    #[test]
    fn ids_are_trimmed() {
        let items = vec![
            json!({"id": "", "text": "1"}),
            json!({"id": "   ", "text": "2"}),
            json!({"id": " 1T ", "text": "23.5"}),
        ];
        let values = process_items("A", &items, &registry());
        assert_eq!(values, [("1".to_string(), NodeValue::Number(23.5))]);
    }

    #[test]
    fn conflicting_duplicate_keeps_first() {
        let items = vec![
            json!({"id": "1T", "text": "23.5"}),
            json!({"id": "1U", "text": "24.0"}),
        ];
        let values = process_items("A", &items, &registry());
        assert_eq!(values, [("1".to_string(), NodeValue::Number(23.5))]);
    }

    #[test]
    fn repeated_raw_id_is_dropped() {
        let items = vec![
            json!({"id": "1T", "text": "23.5"}),
            json!({"id": "1T", "text": "23.5"}),
            json!({"id": "1V", "text": "23.5"}),
        ];
        let values = process_items("A", &items, &registry());
        assert_eq!(values.len(), 1);
    }
}
