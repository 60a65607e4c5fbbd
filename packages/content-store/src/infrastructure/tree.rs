//! Arena-backed content tree
//!
//! Removed nodes leave a tombstone (`None`) so that stale `NodeId`s fail
//! cleanly instead of pointing at a reused slot.

use crate::domain::{Node, NodeId, Property, PropertyValue};
use crate::{Result, StorageError};

pub(crate) const ROOT_TYPE: &str = "rep:root";
pub(crate) const PRIMARY_TYPE_PROPERTY: &str = "jcr:primaryType";
pub(crate) const MIXIN_TYPES_PROPERTY: &str = "jcr:mixinTypes";

#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    name: String,
    parent: Option<usize>,
    primary_type: String,
    mixins: Vec<String>,
    children: Vec<usize>,
    properties: Vec<(String, PropertyValue)>,
}

#[derive(Debug, Clone)]
pub(crate) struct ContentTree {
    nodes: Vec<Option<NodeRecord>>,
}

impl ContentTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(NodeRecord {
                name: String::new(),
                parent: None,
                primary_type: ROOT_TYPE.to_string(),
                mixins: Vec::new(),
                children: Vec::new(),
                properties: Vec::new(),
            })],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    fn record(&self, idx: usize) -> Result<&NodeRecord> {
        self.nodes
            .get(idx)
            .and_then(Option::as_ref)
            .ok_or_else(|| StorageError::access(format!("Stale node handle: {}", idx)))
    }

    fn record_mut(&mut self, idx: usize) -> Result<&mut NodeRecord> {
        self.nodes
            .get_mut(idx)
            .and_then(Option::as_mut)
            .ok_or_else(|| StorageError::access(format!("Stale node handle: {}", idx)))
    }

    pub fn index_of(&self, node: &Node) -> Result<usize> {
        let idx = node.id.0 as usize;
        self.record(idx)?;
        Ok(idx)
    }

    pub fn path_of(&self, idx: usize) -> Result<String> {
        let mut names = Vec::new();
        let mut current = self.record(idx)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.record(parent)?;
        }
        if names.is_empty() {
            return Ok("/".to_string());
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    pub fn depth_of(&self, idx: usize) -> Result<usize> {
        let mut depth = 0;
        let mut current = self.record(idx)?;
        while let Some(parent) = current.parent {
            depth += 1;
            current = self.record(parent)?;
        }
        Ok(depth)
    }

    pub fn view(&self, idx: usize) -> Result<Node> {
        let record = self.record(idx)?;
        Ok(Node {
            id: NodeId(idx as u64),
            name: record.name.clone(),
            path: self.path_of(idx)?,
            depth: self.depth_of(idx)?,
            primary_type: record.primary_type.clone(),
            mixins: record.mixins.clone(),
        })
    }

    /// Resolve an absolute path; same-name siblings resolve to the first match
    pub fn resolve(&self, path: &str) -> Option<usize> {
        if !path.starts_with('/') {
            return None;
        }
        let mut current = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let record = self.record(current).ok()?;
            current = *record.children.iter().find(|child| {
                self.record(**child)
                    .map(|c| c.name == segment)
                    .unwrap_or(false)
            })?;
        }
        Some(current)
    }

    pub fn resolve_or_err(&self, path: &str) -> Result<usize> {
        self.resolve(path)
            .ok_or_else(|| StorageError::path_not_found(path))
    }

    pub fn child_views(&self, idx: usize) -> Result<Vec<Node>> {
        self.record(idx)?
            .children
            .iter()
            .map(|child| self.view(*child))
            .collect()
    }

    /// `jcr:primaryType` first, then `jcr:mixinTypes` when present, then stored properties
    pub fn property_views(&self, idx: usize) -> Result<Vec<Property>> {
        let record = self.record(idx)?;
        let owner_path = self.path_of(idx)?;
        let depth = self.depth_of(idx)? + 1;

        let mut values = vec![(
            PRIMARY_TYPE_PROPERTY.to_string(),
            PropertyValue::String(record.primary_type.clone()),
        )];
        if !record.mixins.is_empty() {
            values.push((
                MIXIN_TYPES_PROPERTY.to_string(),
                PropertyValue::Strings(record.mixins.clone()),
            ));
        }
        values.extend(record.properties.iter().cloned());

        Ok(values
            .into_iter()
            .map(|(name, value)| Property {
                path: child_path(&owner_path, &name),
                name,
                depth,
                value,
            })
            .collect())
    }

    pub fn is_node_type(&self, idx: usize, node_type: &str) -> Result<bool> {
        let record = self.record(idx)?;
        Ok(record.primary_type == node_type || record.mixins.iter().any(|m| m == node_type))
    }

    pub fn add_node(
        &mut self,
        parent: usize,
        name: &str,
        primary_type: &str,
        mixins: Vec<String>,
    ) -> Result<usize> {
        validate_name(name)?;
        self.record(parent)?;
        let idx = self.nodes.len();
        self.nodes.push(Some(NodeRecord {
            name: name.to_string(),
            parent: Some(parent),
            primary_type: primary_type.to_string(),
            mixins,
            children: Vec::new(),
            properties: Vec::new(),
        }));
        self.record_mut(parent)?.children.push(idx);
        Ok(idx)
    }

    /// Returns true when the property already existed
    pub fn set_property(&mut self, idx: usize, name: &str, value: PropertyValue) -> Result<bool> {
        validate_name(name)?;
        if name == PRIMARY_TYPE_PROPERTY || name == MIXIN_TYPES_PROPERTY {
            return Err(StorageError::access(format!(
                "Protected property cannot be set: {}",
                name
            )));
        }
        let record = self.record_mut(idx)?;
        match record.properties.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => {
                existing.1 = value;
                Ok(true)
            }
            None => {
                record.properties.push((name.to_string(), value));
                Ok(false)
            }
        }
    }

    pub fn remove_property(&mut self, idx: usize, name: &str) -> Result<()> {
        let owner_path = self.path_of(idx)?;
        let record = self.record_mut(idx)?;
        let before = record.properties.len();
        record.properties.retain(|(n, _)| n != name);
        if record.properties.len() == before {
            return Err(StorageError::path_not_found(child_path(&owner_path, name)));
        }
        Ok(())
    }

    pub fn remove_node(&mut self, idx: usize) -> Result<()> {
        let parent = self
            .record(idx)?
            .parent
            .ok_or_else(|| StorageError::access("Root node cannot be removed"))?;
        self.record_mut(parent)?.children.retain(|c| *c != idx);

        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            if let Some(record) = self.nodes.get_mut(current).and_then(Option::take) {
                stack.extend(record.children);
            }
        }
        Ok(())
    }

    pub fn move_node(&mut self, idx: usize, new_parent: usize, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let old_parent = self
            .record(idx)?
            .parent
            .ok_or_else(|| StorageError::access("Root node cannot be moved"))?;
        if self.is_ancestor_or_self(idx, new_parent)? {
            return Err(StorageError::access(
                "Node cannot be moved below its own subtree",
            ));
        }
        self.record_mut(old_parent)?.children.retain(|c| *c != idx);
        self.record_mut(new_parent)?.children.push(idx);
        let record = self.record_mut(idx)?;
        record.parent = Some(new_parent);
        record.name = new_name.to_string();
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: usize, idx: usize) -> Result<bool> {
        let mut current = Some(idx);
        while let Some(c) = current {
            if c == ancestor {
                return Ok(true);
            }
            current = self.record(c)?.parent;
        }
        Ok(false)
    }

    /// Live nodes in document (pre-order) order, starting at the root
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(idx) = stack.pop() {
            if let Ok(record) = self.record(idx) {
                order.push(idx);
                stack.extend(record.children.iter().rev());
            }
        }
        order
    }

    /// Nodes having a stored property value that contains `term`, case-insensitively
    ///
    /// `jcr:primaryType` and `jcr:mixinTypes` are not indexed.
    pub fn full_text_matches(&self, term: &str) -> Result<Vec<usize>> {
        let needle = term.to_lowercase();
        let mut matches = Vec::new();
        for idx in self.preorder() {
            let hit = self.property_views(idx)?.iter().any(|property| {
                property.name != PRIMARY_TYPE_PROPERTY
                    && property.name != MIXIN_TYPES_PROPERTY
                    && property
                        .value
                        .text_values()
                        .iter()
                        .any(|text| text.to_lowercase().contains(&needle))
            });
            if hit {
                matches.push(idx);
            }
        }
        Ok(matches)
    }
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent_path, name)
    }
}

/// Parent of an absolute path (`/` for top-level items and the root)
pub(crate) fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(StorageError::access(format!("Invalid item name: '{}'", name)));
    }
    Ok(())
}
