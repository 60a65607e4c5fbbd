//! Keyword search through the repository's query engine

use content_store::{Item, QueryLanguage, Session};
use tracing::debug;

use crate::error::{Result, ViewError};
use crate::traversal::TreeTraversal;

#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    traversal: TreeTraversal,
}

impl QueryExecutor {
    pub fn new(traversal: TreeTraversal) -> Self {
        Self { traversal }
    }

    /// XPath statement matching any node with a property containing `keyword`
    ///
    /// Single quotes are doubled so the keyword stays inside the string literal.
    pub fn build_statement(keyword: &str) -> String {
        format!(
            "//*[jcr:contains(., '*{}*')]",
            keyword.replace('\'', "''")
        )
    }

    /// Each matching node in result order, followed by its own properties
    pub fn search(&self, session: &dyn Session, keyword: &str) -> Result<Vec<Item>> {
        let statement = Self::build_statement(keyword);
        let nodes = session
            .execute_query(&statement, QueryLanguage::XPath)
            .map_err(ViewError::Query)?;
        debug!(keyword, hits = nodes.len(), "Keyword search executed");

        let mut items = Vec::new();
        for node in nodes {
            let properties = self.traversal.properties(session, &node)?;
            items.push(Item::Node(node));
            items.extend(properties);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_store::{Credentials, ErrorKind, Fault, InMemoryRepository, InMemorySession};

    const SITE: &str = r#"
nodes:
  - name: content
    properties:
      - { name: title, value: Welcome to MyHippo }
    children:
      - name: about
        properties:
          - { name: body, value: "Nothing here" }
      - name: news
        properties:
          - { name: summary, value: "myhippo release notes" }
          - { name: author, value: "O'Brien" }
"#;

    fn session() -> (InMemoryRepository, InMemorySession) {
        let repo = InMemoryRepository::from_fixture_str(SITE).unwrap();
        let session = repo
            .open_session(&Credentials::new("admin", "admin"))
            .unwrap();
        (repo, session)
    }

    #[test]
    fn test_build_statement() {
        assert_eq!(
            QueryExecutor::build_statement("myhippo"),
            "//*[jcr:contains(., '*myhippo*')]"
        );
        assert_eq!(
            QueryExecutor::build_statement("O'Brien"),
            "//*[jcr:contains(., '*O''Brien*')]"
        );
    }

    #[test]
    fn test_search_lists_node_then_its_properties() {
        let (_repo, session) = session();
        let items = QueryExecutor::default().search(&session, "myhippo").unwrap();
        let paths: Vec<&str> = items.iter().map(|item| item.path()).collect();
        assert_eq!(
            paths,
            vec![
                "/content",
                "/content/jcr:primaryType",
                "/content/title",
                "/content/news",
                "/content/news/jcr:primaryType",
                "/content/news/summary",
                "/content/news/author",
            ]
        );
        assert!(items[0].is_node());
        assert!(!items[1].is_node());
    }

    #[test]
    fn test_repeated_search_is_stable() {
        let (_repo, session) = session();
        let executor = QueryExecutor::default();
        let first = executor.search(&session, "myhippo").unwrap();
        let second = executor.search(&session, "myhippo").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.iter().filter(|item| item.is_node()).count(),
            second.iter().filter(|item| item.is_node()).count()
        );
    }

    #[test]
    fn test_search_with_quote_in_keyword() {
        let (_repo, session) = session();
        let items = QueryExecutor::default().search(&session, "O'Brien").unwrap();
        assert_eq!(items[0].path(), "/content/news");
    }

    #[test]
    fn test_search_without_matches_is_empty() {
        let (_repo, session) = session();
        let items = QueryExecutor::default().search(&session, "zebra").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_query_failure_is_query_error() {
        let (repo, session) = session();
        repo.inject_fault(Fault::Query);
        let err = QueryExecutor::default()
            .search(&session, "myhippo")
            .unwrap_err();
        assert!(matches!(err, ViewError::Query(_)));
        assert_eq!(err.storage_error().unwrap().kind, ErrorKind::Query);
    }

    #[test]
    fn test_property_failure_is_traversal_error() {
        let (repo, session) = session();
        repo.inject_fault(Fault::Properties("/content/news".to_string()));
        let err = QueryExecutor::default()
            .search(&session, "myhippo")
            .unwrap_err();
        assert!(matches!(err, ViewError::Traversal(_)));
    }
}
