//! Tree-sitter parsing utilities for the scanner.

use tree_sitter::{Language, Node, Parser as TSParser, Tree};

use super::{Location, ScanError};

/// Source dialects the scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `.ts`, `.mts`, `.cts`: type annotations and decorators.
    TypeScript,
    /// `.tsx`: TypeScript plus JSX.
    Tsx,
    /// `.js`, `.jsx`, `.mjs`, `.cjs`.
    JavaScript,
}

impl Dialect {
    /// Pick a dialect from a file name, defaulting to TypeScript.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tsx") {
            Dialect::Tsx
        } else if [".js", ".jsx", ".mjs", ".cjs"].iter().any(|ext| lower.ends_with(ext)) {
            Dialect::JavaScript
        } else {
            Dialect::TypeScript
        }
    }

    fn language(self) -> Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeScript => write!(f, "TypeScript"),
            Self::Tsx => write!(f, "TSX"),
            Self::JavaScript => write!(f, "JavaScript"),
        }
    }
}

/// Parse source text, refusing trees that contain syntax errors.
pub fn parse_tree(dialect: Dialect, content: &str) -> Result<Tree, ScanError> {
    let mut parser = TSParser::new();
    parser
        .set_language(&dialect.language())
        .map_err(|e| ScanError::Language(format!("Failed to set {} language: {}", dialect, e)))?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| ScanError::Language("Parser returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let location = first_error(root).unwrap_or_else(|| node_location(&root));
        return Err(ScanError::Syntax {
            line: location.line,
            column: location.column,
        });
    }

    Ok(tree)
}

/// Get text for a node from source content.
pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    &content[node.byte_range()]
}

/// Start of a node: 1-based line, 0-based column.
pub fn node_location(node: &Node) -> Location {
    let start = node.start_position();
    Location {
        line: start.row as u32 + 1,
        column: start.column as u32,
    }
}

/// First named child that is not a comment.
pub fn first_argument<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    found
}

/// Locate the first ERROR or MISSING node, depth first.
fn first_error(node: Node) -> Option<Location> {
    if node.is_error() || node.is_missing() {
        return Some(node_location(&node));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(location) = first_error(child) {
                return Some(location);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_file_name() {
        assert_eq!(Dialect::from_file_name("a.test.ts"), Dialect::TypeScript);
        assert_eq!(Dialect::from_file_name("a.test.tsx"), Dialect::Tsx);
        assert_eq!(Dialect::from_file_name("a.spec.js"), Dialect::JavaScript);
        assert_eq!(Dialect::from_file_name("a.spec.MJS"), Dialect::JavaScript);
        assert_eq!(Dialect::from_file_name("README"), Dialect::TypeScript);
    }

    #[test]
    fn test_parse_tree_reports_syntax_error_location() {
        let err = parse_tree(Dialect::TypeScript, "describe('x', () => {\n  it(\n").unwrap_err();
        assert!(matches!(err, ScanError::Syntax { .. }));
    }

    #[test]
    fn test_parse_tree_accepts_decorators_and_types() {
        let source = r#"
@suite
class MathTests {
    private value: number = 1;
    @test adds(): void {}
}
"#;
        assert!(parse_tree(Dialect::TypeScript, source).is_ok());
    }
}
