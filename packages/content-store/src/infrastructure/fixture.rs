//! Fixture loading (YAML/JSON)
//!
//! ```yaml
//! nodes:
//!   - name: content
//!     type: hippostd:folder
//!     properties:
//!       - { name: title, value: Home }
//!     children:
//!       - name: about
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::memory_store::{InMemoryRepository, DEFAULT_NODE_TYPE};
use super::tree::ContentTree;
use crate::domain::PropertyValue;
use crate::{Result, StorageError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub nodes: Vec<NodeFixture>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeFixture {
    pub name: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub primary_type: String,
    #[serde(default)]
    pub mixins: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyFixture>,
    #[serde(default)]
    pub children: Vec<NodeFixture>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyFixture {
    pub name: String,
    pub value: PropertyValue,
}

fn default_node_type() -> String {
    DEFAULT_NODE_TYPE.to_string()
}

impl Fixture {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// `.json` files are parsed as JSON, anything else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::fixture(format!("Cannot read fixture {}", path.display())).with_source(e)
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    fn build_tree(&self) -> Result<ContentTree> {
        let mut tree = ContentTree::new();
        let mut stack: Vec<(usize, &NodeFixture)> = self
            .nodes
            .iter()
            .rev()
            .map(|node| (tree.root(), node))
            .collect();

        while let Some((parent, node)) = stack.pop() {
            let idx = tree
                .add_node(parent, &node.name, &node.primary_type, node.mixins.clone())
                .map_err(|e| {
                    StorageError::fixture(format!("Invalid node '{}': {}", node.name, e.message))
                })?;
            for property in &node.properties {
                let existed = tree.set_property(idx, &property.name, property.value.clone())?;
                if existed {
                    return Err(StorageError::fixture(format!(
                        "Duplicate property '{}' on node '{}'",
                        property.name, node.name
                    )));
                }
            }
            stack.extend(node.children.iter().rev().map(|child| (idx, child)));
        }
        Ok(tree)
    }
}

impl InMemoryRepository {
    pub fn from_fixture(fixture: &Fixture) -> Result<Self> {
        Ok(Self::with_tree(fixture.build_tree()?))
    }

    pub fn from_fixture_str(yaml: &str) -> Result<Self> {
        Self::from_fixture(&Fixture::from_yaml_str(yaml)?)
    }

    pub fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_fixture(&Fixture::from_file(path)?)
    }
}
