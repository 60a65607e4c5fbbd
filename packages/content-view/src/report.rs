//! Line-per-item report rendering

use std::fmt::Write;

use content_store::Item;

pub const DEFAULT_INDENT_UNIT: &str = "&emsp;";
pub const DEFAULT_LINE_TERMINATOR: &str = "<br/>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFormatter {
    indent_unit: String,
    line_terminator: String,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_INDENT_UNIT, DEFAULT_LINE_TERMINATOR)
    }
}

impl ReportFormatter {
    pub fn new(indent_unit: impl Into<String>, line_terminator: impl Into<String>) -> Self {
        Self {
            indent_unit: indent_unit.into(),
            line_terminator: line_terminator.into(),
        }
    }

    /// One line per item: `[indent*depth] - name (Node|Property) - Path="path"`
    pub fn render(&self, items: &[Item], indent_by_depth: bool) -> String {
        let mut out = String::new();
        for item in items {
            if indent_by_depth {
                out.push_str(&self.indent_unit.repeat(item.depth()));
            }
            let kind = if item.is_node() { "Node" } else { "Property" };
            // Writing to a String cannot fail
            let _ = write!(
                out,
                " - {} ({}) - Path=\"{}\"{}",
                item.name(),
                kind,
                item.path(),
                self.line_terminator
            );
        }
        out
    }
}
