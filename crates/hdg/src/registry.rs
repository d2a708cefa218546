use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::definition::DataPoint;
use crate::error::{HdgError, HdgResult};
use crate::node::build_payload;

/// Statically configured polling group.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct GroupDef {
    pub key: String,
    pub default_interval_secs: u64,
}

/// A set of nodes fetched together in one batched request.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct PollingGroup {
    pub key: String,
    pub nodes: Vec<String>,
    pub payload: String,
    pub default_interval: Duration,
}

/// On-disk catalog format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    pub groups: Vec<GroupDef>,
    pub points: Vec<DataPoint>,
}

#[derive(Clone, Debug)]
pub struct Registry {
    groups: Vec<PollingGroup>,
    points: Vec<DataPoint>,
    by_base_id: HashMap<String, usize>,
    setters: HashMap<String, usize>,
}

impl Registry {
    pub fn new(group_defs: Vec<GroupDef>, points: Vec<DataPoint>) -> HdgResult<Self> {
        let mut seen_groups = HashSet::new();
        for def in &group_defs {
            if !seen_groups.insert(def.key.as_str()) {
                return Err(HdgError::DuplicateGroup(def.key.clone()));
            }
        }

        let mut owner: HashMap<&str, &str> = HashMap::new();
        let mut members: HashMap<&str, BTreeSet<&str>> = HashMap::new();

        for point in &points {
            if !seen_groups.contains(point.polling_group.as_str()) {
                return Err(HdgError::UnknownPollingGroup(
                    point.node_id.clone(),
                    point.polling_group.clone(),
                ));
            }

            let base = point.base_id();
            match owner.get(base) {
                Some(group) if *group != point.polling_group => {
                    return Err(HdgError::NodeInMultipleGroups {
                        node: base.to_string(),
                        first: (*group).to_string(),
                        second: point.polling_group.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    owner.insert(base, &point.polling_group);
                }
            }

            members
                .entry(point.polling_group.as_str())
                .or_default()
                .insert(point.node_id.as_str());
        }

        let groups: Vec<PollingGroup> = group_defs
            .iter()
            .filter_map(|def| {
                let nodes = members.get(def.key.as_str())?;
                let nodes: Vec<String> = nodes.iter().map(ToString::to_string).collect();
                Some(PollingGroup {
                    key: def.key.clone(),
                    payload: build_payload(nodes.iter().map(String::as_str)),
                    nodes,
                    default_interval: Duration::from_secs(def.default_interval_secs),
                })
            })
            .collect();

        let mut by_base_id = HashMap::new();
        let mut setters = HashMap::new();
        for (index, point) in points.iter().enumerate() {
            by_base_id
                .entry(point.base_id().to_string())
                .or_insert(index);
            if point.writable() {
                setters.entry(point.base_id().to_string()).or_insert(index);
            }
        }

        log::info!(
            "Registry built with {} polling groups and {} data points",
            groups.len(),
            points.len()
        );

        Ok(Self {
            groups,
            points,
            by_base_id,
            setters,
        })
    }

    pub fn from_catalog(catalog: Catalog) -> HdgResult<Self> {
        Self::new(catalog.groups, catalog.points)
    }

    pub fn load(path: impl AsRef<Path>) -> HdgResult<Self> {
        let fd = File::open(path)?;
        let catalog: Catalog = serde_yml::from_reader(fd)?;
        Self::from_catalog(catalog)
    }

    /// Polling groups in configured order. Groups without nodes are omitted.
    #[must_use]
    pub fn groups(&self) -> &[PollingGroup] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, key: &str) -> Option<&PollingGroup> {
        self.groups.iter().find(|group| group.key == key)
    }

    #[must_use]
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    /// Look up the definition used to parse a base node id.
    #[must_use]
    pub fn definition(&self, base_id: &str) -> Option<&DataPoint> {
        self.by_base_id.get(base_id).map(|idx| &self.points[*idx])
    }

    /// Look up the writable definition for a base node id.
    #[must_use]
    pub fn setter(&self, base_id: &str) -> Option<&DataPoint> {
        self.setters.get(base_id).map(|idx| &self.points[*idx])
    }
}
