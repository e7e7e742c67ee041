use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const METHOD_MARKER: &str = "()";
pub const METHODS_GROUP: &str = "methods";
pub const PROPERTIES_GROUP: &str = "properties";

/// One exported property of a captured view, e.g. `layout:mLeft=12`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewProperty {
    pub full_name: String,
    pub name: String,
    pub category: Option<String>,
    pub value: String,
    pub is_method: bool,
}

impl ViewProperty {
    /// Splits `category:name` keys at the first colon. Keys without one have no category.
    pub fn new(full_name: &str, value: &str) -> Self {
        let (category, name) = match full_name.split_once(':') {
            Some((category, name)) if !category.is_empty() => {
                (Some(category.to_string()), name.to_string())
            }
            _ => (None, full_name.to_string()),
        };
        Self {
            full_name: full_name.to_string(),
            name,
            category,
            value: value.to_string(),
            is_method: full_name.ends_with(METHOD_MARKER),
        }
    }

    pub fn group_key(&self) -> &str {
        match self.category.as_deref() {
            Some(category) => category,
            None if self.is_method => METHODS_GROUP,
            None => PROPERTIES_GROUP,
        }
    }
}

pub type GroupedProperties = BTreeMap<String, Vec<ViewProperty>>;
pub type NamedProperties = HashMap<String, ViewProperty>;

/// Classifies a flat property list in a single pass.
pub fn index_properties(properties: &[ViewProperty]) -> (GroupedProperties, NamedProperties) {
    let mut grouped = GroupedProperties::new();
    let mut named = NamedProperties::with_capacity(properties.len());
    for property in properties {
        grouped
            .entry(property.group_key().to_string())
            .or_default()
            .push(property.clone());
        named.insert(property.full_name.clone(), property.clone());
    }
    (grouped, named)
}

/// Read-only two-column row model for the property panel of one node.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyTable {
    rows: Vec<(String, String)>,
    groups: GroupedProperties,
}

impl PropertyTable {
    pub const COLUMNS: [&'static str; 2] = ["Property", "Value"];

    pub fn new(properties: &[ViewProperty], groups: &GroupedProperties) -> Self {
        Self {
            rows: properties
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect(),
            groups: groups.clone(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_name(column: usize) -> &'static str {
        if column == 0 {
            Self::COLUMNS[0]
        } else {
            Self::COLUMNS[1]
        }
    }

    pub fn value_at(&self, row: usize, column: usize) -> Option<&str> {
        let (name, value) = self.rows.get(row)?;
        Some(if column == 0 {
            name.as_str()
        } else {
            value.as_str()
        })
    }

    pub fn groups(&self) -> &GroupedProperties {
        &self.groups
    }
}
