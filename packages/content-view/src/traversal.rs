//! Tree traversal over a repository session
//!
//! Depth-first, pre-order enumeration in the repository's native order. Nodes
//! of the synthetic aggregation type expose computed (possibly cyclic or
//! unbounded) children, so they are listed but never expanded.

use content_store::{Item, Node, Session};
use tracing::debug;

use crate::error::{Result, ViewError};

/// Virtual node type whose children are derived rather than stored
pub const SYNTHETIC_AGGREGATION_TYPE: &str = "hippofacnav:facetnavigation";

#[derive(Debug, Clone)]
pub struct TreeTraversal {
    synthetic_type: String,
    include_properties: bool,
}

impl Default for TreeTraversal {
    fn default() -> Self {
        Self::new(SYNTHETIC_AGGREGATION_TYPE)
    }
}

impl TreeTraversal {
    pub fn new(synthetic_type: impl Into<String>) -> Self {
        Self {
            synthetic_type: synthetic_type.into(),
            include_properties: false,
        }
    }

    /// List each node's own properties right after it in `describe_named_subtree`
    pub fn with_properties(mut self, include_properties: bool) -> Self {
        self.include_properties = include_properties;
        self
    }

    /// Expansion guard: children of such nodes are never enumerated
    pub fn is_synthetic_aggregation(&self, session: &dyn Session, node: &Node) -> Result<bool> {
        session
            .is_node_type(node, &self.synthetic_type)
            .map_err(ViewError::Traversal)
    }

    /// All nodes below `node`, each followed immediately by its own subtree
    pub fn descendants(&self, session: &dyn Session, node: &Node) -> Result<Vec<Item>> {
        let mut nodes = Vec::new();
        self.collect_descendants(session, node, &mut nodes)?;
        Ok(nodes.into_iter().map(Item::Node).collect())
    }

    fn collect_descendants(
        &self,
        session: &dyn Session,
        node: &Node,
        out: &mut Vec<Node>,
    ) -> Result<()> {
        if self.is_synthetic_aggregation(session, node)? {
            debug!(path = %node.path, "Not expanding synthetic aggregation node");
            return Ok(());
        }
        for child in session.child_nodes(node).map_err(ViewError::Traversal)? {
            out.push(child.clone());
            self.collect_descendants(session, &child, out)?;
        }
        Ok(())
    }

    /// Properties owned by `node`, no recursion
    pub fn properties(&self, session: &dyn Session, node: &Node) -> Result<Vec<Item>> {
        Ok(session
            .properties(node)
            .map_err(ViewError::Traversal)?
            .into_iter()
            .map(Item::Property)
            .collect())
    }

    /// First direct child of the root with exactly this name
    pub fn find_root_child_by_name(&self, session: &dyn Session, name: &str) -> Result<Option<Node>> {
        let root = session.root_node().map_err(ViewError::Traversal)?;
        Ok(session
            .child_nodes(&root)
            .map_err(ViewError::Traversal)?
            .into_iter()
            .find(|child| child.name == name))
    }

    /// The named root child followed by its subtree; empty when there is no such child
    pub fn describe_named_subtree(&self, session: &dyn Session, name: &str) -> Result<Vec<Item>> {
        let Some(node) = self.find_root_child_by_name(session, name)? else {
            debug!(name, "No root child with this name");
            return Ok(Vec::new());
        };

        let mut nodes = vec![node.clone()];
        self.collect_descendants(session, &node, &mut nodes)?;

        let mut items = Vec::with_capacity(nodes.len());
        for node in nodes {
            let properties = if self.include_properties {
                self.properties(session, &node)?
            } else {
                Vec::new()
            };
            items.push(Item::Node(node));
            items.extend(properties);
        }
        debug!(name, items = items.len(), "Described subtree");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_store::{Credentials, Fault, InMemoryRepository, InMemorySession};

    fn login(repo: &InMemoryRepository) -> InMemorySession {
        repo.open_session(&Credentials::new("admin", "admin"))
            .unwrap()
    }

    fn paths(items: &[Item]) -> Vec<&str> {
        items.iter().map(|item| item.path()).collect()
    }

    fn node_at(session: &InMemorySession, name: &str) -> Node {
        let traversal = TreeTraversal::default();
        traversal
            .find_root_child_by_name(session, name)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_descendants_pre_order() {
        let repo = InMemoryRepository::from_fixture_str(
            r#"
nodes:
  - name: a
    children:
      - name: b
      - name: c
        children:
          - name: d
"#,
        )
        .unwrap();
        let session = login(&repo);
        let a = node_at(&session, "a");

        let items = TreeTraversal::default().descendants(&session, &a).unwrap();
        assert_eq!(paths(&items), vec!["/a/b", "/a/c", "/a/c/d"]);
        assert!(items.iter().all(Item::is_node));
    }

    #[test]
    fn test_synthetic_aggregation_is_a_leaf() {
        let repo = InMemoryRepository::from_fixture_str(
            r#"
nodes:
  - name: content
    children:
      - name: facets
        type: hippofacnav:facetnavigation
        children:
          - name: year
            children:
              - name: "2024"
      - name: news
"#,
        )
        .unwrap();
        let session = login(&repo);
        let content = node_at(&session, "content");

        let items = TreeTraversal::default()
            .descendants(&session, &content)
            .unwrap();
        assert_eq!(paths(&items), vec!["/content/facets", "/content/news"]);
    }

    #[test]
    fn test_synthetic_guard_honours_mixins() {
        let repo = InMemoryRepository::from_fixture_str(
            r#"
nodes:
  - name: content
    mixins: [hippofacnav:facetnavigation]
    children:
      - name: hidden
"#,
        )
        .unwrap();
        let session = login(&repo);
        let content = node_at(&session, "content");
        let traversal = TreeTraversal::default();

        assert!(traversal.is_synthetic_aggregation(&session, &content).unwrap());
        assert!(traversal.descendants(&session, &content).unwrap().is_empty());
    }

    #[test]
    fn test_custom_synthetic_type() {
        let repo = InMemoryRepository::from_fixture_str(
            "nodes:\n  - name: content\n    children:\n      - name: virtual\n        type: my:virtual\n        children:\n          - name: x\n",
        )
        .unwrap();
        let session = login(&repo);
        let content = node_at(&session, "content");

        let items = TreeTraversal::new("my:virtual")
            .descendants(&session, &content)
            .unwrap();
        assert_eq!(paths(&items), vec!["/content/virtual"]);
    }

    #[test]
    fn test_find_root_child_is_exact_and_shallow() {
        let repo = InMemoryRepository::from_fixture_str(
            r#"
nodes:
  - name: site
    children:
      - name: content
  - name: Content
"#,
        )
        .unwrap();
        let session = login(&repo);
        let traversal = TreeTraversal::default();

        assert!(traversal
            .find_root_child_by_name(&session, "content")
            .unwrap()
            .is_none());
        assert!(traversal
            .find_root_child_by_name(&session, "Cont")
            .unwrap()
            .is_none());
        let found = traversal
            .find_root_child_by_name(&session, "Content")
            .unwrap()
            .unwrap();
        assert_eq!(found.path, "/Content");
    }

    #[test]
    fn test_describe_missing_subtree_is_empty() {
        let repo = InMemoryRepository::new();
        let session = login(&repo);
        let items = TreeTraversal::default()
            .describe_named_subtree(&session, "content")
            .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_describe_without_properties() {
        let repo = InMemoryRepository::from_fixture_str(
            "nodes:\n  - name: content\n    properties:\n      - { name: title, value: Home }\n    children:\n      - name: about\n",
        )
        .unwrap();
        let session = login(&repo);
        let items = TreeTraversal::default()
            .describe_named_subtree(&session, "content")
            .unwrap();
        assert_eq!(paths(&items), vec!["/content", "/content/about"]);
    }

    #[test]
    fn test_describe_with_properties_interleaves() {
        let repo = InMemoryRepository::from_fixture_str(
            "nodes:\n  - name: content\n    properties:\n      - { name: title, value: Home }\n    children:\n      - name: about\n",
        )
        .unwrap();
        let session = login(&repo);
        let items = TreeTraversal::default()
            .with_properties(true)
            .describe_named_subtree(&session, "content")
            .unwrap();
        assert_eq!(
            paths(&items),
            vec![
                "/content",
                "/content/jcr:primaryType",
                "/content/title",
                "/content/about",
                "/content/about/jcr:primaryType",
            ]
        );
    }

    #[test]
    fn test_properties_are_not_recursive() {
        let repo = InMemoryRepository::from_fixture_str(
            "nodes:\n  - name: content\n    properties:\n      - { name: title, value: Home }\n    children:\n      - name: about\n        properties:\n          - { name: body, value: text }\n",
        )
        .unwrap();
        let session = login(&repo);
        let content = node_at(&session, "content");
        let items = TreeTraversal::default()
            .properties(&session, &content)
            .unwrap();
        assert_eq!(paths(&items), vec!["/content/jcr:primaryType", "/content/title"]);
        assert!(items.iter().all(|item| !item.is_node()));
    }

    #[test]
    fn test_read_failure_propagates() {
        let repo = InMemoryRepository::from_fixture_str(
            "nodes:\n  - name: content\n    children:\n      - name: about\n        children:\n          - name: team\n",
        )
        .unwrap();
        repo.inject_fault(Fault::ChildNodes("/content/about".to_string()));
        let session = login(&repo);

        let err = TreeTraversal::default()
            .describe_named_subtree(&session, "content")
            .unwrap_err();
        assert!(matches!(err, ViewError::Traversal(_)));
    }
}
