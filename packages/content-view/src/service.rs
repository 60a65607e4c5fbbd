//! Report request handling
//!
//! Builds the markup payload for one request: the named subtree report, then
//! the keyword search report when a keyword is given. Any repository failure
//! discards the partial output.

use std::sync::Arc;

use content_store::{ContentRepository, Credentials};
use tracing::{error, info};

use crate::config::ViewConfig;
use crate::error::{Result, ViewError};
use crate::query::QueryExecutor;
use crate::report::ReportFormatter;
use crate::session::ScopedSession;
use crate::traversal::TreeTraversal;

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const STATUS_OK: u16 = 200;
pub const STATUS_SERVER_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl ReportResponse {
    fn ok(body: String) -> Self {
        Self {
            status: STATUS_OK,
            content_type: Some(CONTENT_TYPE_HTML.to_string()),
            body,
        }
    }

    fn server_error() -> Self {
        Self {
            status: STATUS_SERVER_ERROR,
            content_type: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

pub struct ReportService {
    repository: Arc<dyn ContentRepository>,
    credentials: Credentials,
    root_name: String,
    traversal: TreeTraversal,
    query: QueryExecutor,
    formatter: ReportFormatter,
}

impl ReportService {
    pub fn new(repository: Arc<dyn ContentRepository>, config: &ViewConfig) -> Self {
        let report = &config.report;
        let traversal = TreeTraversal::new(report.synthetic_type.clone())
            .with_properties(report.include_properties);
        Self {
            repository,
            credentials: config.credentials.credentials(),
            root_name: report.root_name.clone(),
            query: QueryExecutor::new(traversal.clone()),
            traversal,
            formatter: ReportFormatter::new(
                report.indent_unit.clone(),
                report.line_terminator.clone(),
            ),
        }
    }

    /// Full payload for one request, using one session released on return
    ///
    /// An empty keyword counts as absent.
    pub fn render(&self, keyword: Option<&str>) -> Result<String> {
        let keyword = keyword.filter(|k| !k.is_empty());
        let session = ScopedSession::login(self.repository.as_ref(), &self.credentials)?;

        let subtree = self
            .traversal
            .describe_named_subtree(&*session, &self.root_name)?;
        let mut out = String::from("<b>Content Node and SubNodes:</b><br/>");
        out.push_str(&self.formatter.render(&subtree, true));

        if let Some(keyword) = keyword {
            let matches = self.query.search(&*session, keyword)?;
            out.push_str(&format!(
                "<br/><b>{} Items Found for keyword=\"{}\":</b><br/>",
                matches.len(),
                handlebars::html_escape(keyword)
            ));
            out.push_str(&self.formatter.render(&matches, false));
        }

        session.close();
        Ok(out)
    }

    /// Request boundary: any failure becomes an empty 500 response
    pub fn handle(&self, keyword: Option<&str>) -> ReportResponse {
        match self.render(keyword) {
            Ok(body) => {
                info!(keyword, bytes = body.len(), "Report rendered");
                ReportResponse::ok(body)
            }
            Err(e) => {
                log_failure(&e, keyword);
                ReportResponse::server_error()
            }
        }
    }

    /// `handle` on the blocking pool, for async hosts
    pub async fn handle_async(self: &Arc<Self>, keyword: Option<String>) -> ReportResponse {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.handle(keyword.as_deref()))
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Report task failed");
                ReportResponse::server_error()
            })
    }
}

fn log_failure(e: &ViewError, keyword: Option<&str>) {
    match e.storage_error() {
        Some(storage) => error!(
            error = %e,
            kind = %storage.kind,
            keyword,
            "Report request failed"
        ),
        None => error!(error = %e, keyword, "Report request failed"),
    }
}
