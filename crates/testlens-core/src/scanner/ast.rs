//! Closed AST for call expressions.
//!
//! Only the shapes the scanner inspects are modelled. Everything else lowers
//! to an `Other` variant.

use tree_sitter::Node;

use super::treesitter::{first_argument, node_location, node_text};
use super::Location;

/// A bare identifier with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub location: Option<Location>,
}

/// A call or tagged template used as a callee or member object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `helper(args)`
    Call { callee: Option<Ident> },
    /// ``helper`template` ``
    TaggedTemplate { tag: Option<Ident> },
}

impl Invocation {
    /// The identifier being invoked, if it is a bare identifier.
    pub fn helper(&self) -> Option<&Ident> {
        match self {
            Invocation::Call { callee } => callee.as_ref(),
            Invocation::TaggedTemplate { tag } => tag.as_ref(),
        }
    }
}

/// What a call expression calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// `name(...)`
    Identifier(Ident),
    /// `object.property(...)`
    Member {
        object: Option<Invocation>,
        property: String,
    },
    /// `helper(...)(...)` or ``helper`...`(...)``
    Invocation(Invocation),
    Other,
}

/// First argument of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A quoted string literal, escapes decoded.
    StringLiteral(String),
    Other,
}

/// A lowered `call_expression`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub callee: Callee,
    pub first_argument: Option<Argument>,
}

impl CallExpr {
    /// Lower a tree-sitter `call_expression`. Returns `None` for other kinds.
    pub fn lower(node: &Node, content: &str) -> Option<Self> {
        if node.kind() != "call_expression" {
            return None;
        }

        let callee = node
            .child_by_field_name("function")
            .map(|f| lower_callee(&f, content))
            .unwrap_or(Callee::Other);

        let first_argument = node
            .child_by_field_name("arguments")
            .filter(|args| args.kind() == "arguments")
            .and_then(|args| first_argument(&args))
            .map(|arg| lower_argument(&arg, content));

        Some(Self {
            callee,
            first_argument,
        })
    }
}

fn lower_callee(node: &Node, content: &str) -> Callee {
    match node.kind() {
        "identifier" => Callee::Identifier(lower_ident(node, content)),
        "member_expression" => {
            let property = node
                .child_by_field_name("property")
                .map(|p| node_text(&p, content).to_string());
            match property {
                Some(property) => Callee::Member {
                    object: node
                        .child_by_field_name("object")
                        .and_then(|o| lower_invocation(&o, content)),
                    property,
                },
                None => Callee::Other,
            }
        }
        "call_expression" => lower_invocation(node, content)
            .map(Callee::Invocation)
            .unwrap_or(Callee::Other),
        "parenthesized_expression" => first_argument(node)
            .map(|inner| lower_callee(&inner, content))
            .unwrap_or(Callee::Other),
        _ => Callee::Other,
    }
}

fn lower_invocation(node: &Node, content: &str) -> Option<Invocation> {
    if node.kind() != "call_expression" {
        return None;
    }
    let helper = node
        .child_by_field_name("function")
        .filter(|f| f.kind() == "identifier")
        .map(|f| lower_ident(&f, content));
    let is_template = node
        .child_by_field_name("arguments")
        .map(|a| a.kind() == "template_string")
        .unwrap_or(false);

    Some(if is_template {
        Invocation::TaggedTemplate { tag: helper }
    } else {
        Invocation::Call { callee: helper }
    })
}

fn lower_ident(node: &Node, content: &str) -> Ident {
    Ident {
        name: node_text(node, content).to_string(),
        location: (!node.is_missing()).then(|| node_location(node)),
    }
}

fn lower_argument(node: &Node, content: &str) -> Argument {
    if node.kind() != "string" {
        return Argument::Other;
    }

    let mut value = String::new();
    let mut cursor = node.walk();
    for part in node.named_children(&mut cursor) {
        let text = node_text(&part, content);
        match part.kind() {
            "string_fragment" => value.push_str(text),
            "escape_sequence" => value.push_str(&decode_escape(text)),
            _ => {}
        }
    }
    Argument::StringLiteral(value)
}

/// Decode a single JavaScript escape sequence, backslash included.
fn decode_escape(sequence: &str) -> String {
    let body = sequence.strip_prefix('\\').unwrap_or(sequence);
    match body {
        "n" => "\n".to_string(),
        "t" => "\t".to_string(),
        "r" => "\r".to_string(),
        "b" => "\u{8}".to_string(),
        "f" => "\u{c}".to_string(),
        "v" => "\u{b}".to_string(),
        "0" => "\0".to_string(),
        _ if body.starts_with('u') || body.starts_with('x') => {
            let hex = body[1..].trim_start_matches('{').trim_end_matches('}');
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| sequence.to_string())
        }
        // Line continuations produce nothing
        _ if body.starts_with('\n') || body.starts_with('\r') => String::new(),
        _ => body.to_string(),
    }
}
