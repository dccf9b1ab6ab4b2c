//! Static discovery of test declarations in TypeScript/JavaScript sources.
//!
//! The scanner parses a file with tree-sitter, lowers every call expression
//! into the closed AST in [`ast`], and reports the calls that declare tests:
//!
//! - **Direct**: `describe("name", ...)`, `it("name", ...)`
//! - **Nested**: `each(table).it("name %s", ...)`, ``each`table`.it(...)``,
//!   `each(table)("name %s", ...)`. Interpolation placeholders in the name
//!   are replaced with [`WILDCARD`].
//!
//! A declaration is located at its callee, the identifier a reader points at.

pub mod ast;
mod treesitter;

use regex::Regex;
use std::path::Path;
use thiserror::Error;
use tree_sitter::Node;

use ast::{Argument, CallExpr, Callee, Invocation};
pub use treesitter::Dialect;

/// Callee names that declare a test or a group of tests.
pub const TEST_TOKENS: &[&str] = &["describe", "it", "context", "specify", "suite", "test"];

/// Helpers producing parameterized test declarations.
pub const PARAMETERIZED_TOKENS: &[&str] = &["each"];

/// Token replacing interpolation placeholders in parameterized names.
pub const WILDCARD: &str = ".*";

/// `${expr}`, `$name` and printf-style placeholders.
const PLACEHOLDER_PATTERN: &str = r"\$\{[^}]*\}|\$\S*|%[sdifjoOp#]";

/// Source position: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// A named test construct found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDeclaration {
    pub location: Location,
    pub name: String,
}

/// Errors raised while scanning a file.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Syntax error at {line}:{column}")]
    Syntax { line: u32, column: u32 },

    #[error("Parser unavailable: {0}")]
    Language(String),
}

/// Finds test declarations in one source file.
#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    dialect: Dialect,
}

impl Scanner {
    /// Create a scanner for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Create a scanner whose dialect matches the file's extension.
    pub fn for_path(path: &Path) -> Self {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        Self::new(Dialect::from_file_name(name))
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Scan source text and collect every declaration in source order.
    pub fn scan(&self, source: &str) -> Result<Vec<TestDeclaration>, ScanError> {
        self.scan_with(source, |_| {})
    }

    /// Scan source text, calling `on_declaration` as each declaration is found.
    ///
    /// On a syntax error nothing is reported through the callback.
    pub fn scan_with<F>(&self, source: &str, mut on_declaration: F) -> Result<Vec<TestDeclaration>, ScanError>
    where
        F: FnMut(&TestDeclaration),
    {
        let tree = treesitter::parse_tree(self.dialect, source)?;
        let mut result = Vec::new();
        visit(tree.root_node(), source, &mut |declaration| {
            on_declaration(&declaration);
            result.push(declaration);
        });
        Ok(result)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(Dialect::TypeScript)
    }
}

fn visit(node: Node, source: &str, emit: &mut dyn FnMut(TestDeclaration)) {
    if let Some(call) = CallExpr::lower(&node, source) {
        if let Some(declaration) = detect(&call) {
            tracing::debug!(
                line = declaration.location.line,
                name = %declaration.name,
                "found test declaration"
            );
            emit(declaration);
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, emit);
    }
}

/// Decide whether a lowered call declares a test.
fn detect(call: &CallExpr) -> Option<TestDeclaration> {
    let name = match &call.first_argument {
        Some(Argument::StringLiteral(name)) => name,
        _ => return None,
    };

    match &call.callee {
        Callee::Identifier(ident) if TEST_TOKENS.contains(&ident.name.as_str()) => {
            Some(TestDeclaration {
                location: ident.location?,
                name: name.clone(),
            })
        }
        Callee::Member {
            object: Some(object),
            property,
        } if TEST_TOKENS.contains(&property.as_str()) => parameterized(object, name),
        Callee::Invocation(invocation) => parameterized(invocation, name),
        _ => None,
    }
}

fn parameterized(invocation: &Invocation, name: &str) -> Option<TestDeclaration> {
    let helper = invocation.helper()?;
    if !PARAMETERIZED_TOKENS.contains(&helper.name.as_str()) {
        return None;
    }
    Some(TestDeclaration {
        location: helper.location?,
        name: normalize_placeholders(name),
    })
}

/// Replace interpolation placeholders with [`WILDCARD`].
///
/// Idempotent: a normalized name contains no placeholders.
pub fn normalize_placeholders(name: &str) -> String {
    match Regex::new(PLACEHOLDER_PATTERN) {
        Ok(re) => re.replace_all(name, WILDCARD).into_owned(),
        Err(_) => name.to_string(),
    }
}

/// Regex source matching `name` literally, with its [`WILDCARD`]s left active.
pub fn name_pattern(name: &str) -> String {
    name.split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(WILDCARD)
}
