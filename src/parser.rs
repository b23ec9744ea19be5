//! Parse configuration markup into a [`Node`] tree using PEST.

use crate::error::ModelError;
use crate::tree::Node;
use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::path::Path;

#[derive(PestParser)]
#[grammar = "markup.pest"]
struct MarkupParser;

/// Parse markup source into its root element.
pub fn parse(source: &str) -> Result<Node, ModelError> {
    let pairs = MarkupParser::parse(Rule::document, source).map_err(markup_error)?;
    let document = pairs.into_iter().next().ok_or_else(|| ModelError::Markup {
        line: 1,
        column: 1,
        message: "empty document".to_string(),
    })?;
    let root = document
        .into_inner()
        .find(|p| p.as_rule() == Rule::element)
        .ok_or_else(|| ModelError::Markup {
            line: 1,
            column: 1,
            message: "no root element".to_string(),
        })?;
    build_element(root)
}

/// Read a file and parse it.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Node, ModelError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&source)
}

fn markup_error(e: pest::error::Error<Rule>) -> ModelError {
    let (line, column) = match e.line_col {
        LineColLocation::Pos(lc) => lc,
        LineColLocation::Span(start, _) => start,
    };
    ModelError::Markup {
        line,
        column,
        message: e.variant.message().to_string(),
    }
}

fn build_element(pair: pest::iterators::Pair<Rule>) -> Result<Node, ModelError> {
    let (line, column) = pair.as_span().start_pos().line_col();
    let mut node = Node::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => node.name = inner.as_str().to_string(),
            Rule::attribute => {
                let mut it = inner.into_inner();
                let key = it.next().map(|p| p.as_str().to_string()).unwrap_or_default();
                let value = it.next().map(|p| unescape(p.as_str())).unwrap_or_default();
                node.attributes.push((key, value));
            }
            Rule::element => node.children.push(build_element(inner)?),
            Rule::close_name => {
                if inner.as_str() != node.name {
                    return Err(ModelError::Markup {
                        line,
                        column,
                        message: format!(
                            "element <{}> closed by </{}>",
                            node.name,
                            inner.as_str()
                        ),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(node)
}

fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
