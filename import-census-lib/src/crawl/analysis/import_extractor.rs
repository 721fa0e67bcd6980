//! Top-level import extraction from Python source.
//!
//! Source is parsed with tree-sitter first. Only when the resulting tree contains
//! error or missing nodes does extraction fall back to a line-oriented pattern scan,
//! which handles the common `import x` and `from x import y` forms.
//!
//! Relative imports name modules of the repository itself, so every form of them
//! is skipped on both paths: `from . import x` and `from .pkg import x` contribute
//! nothing, not even `pkg`.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tree_sitter::{Node, Parser};

static IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:import\s+([\w.]+)|from\s+([\w.]+)\s+import\b)").expect("invalid regex"));

/// Which path produced an extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The source parsed cleanly and names came from the syntax tree
    Structured(BTreeSet<String>),

    /// The source did not parse and names came from the pattern scan
    Pattern(BTreeSet<String>),
}

impl Extraction {
    #[must_use]
    pub const fn libraries(&self) -> &BTreeSet<String> {
        match self {
            Self::Structured(libs) | Self::Pattern(libs) => libs,
        }
    }

    #[must_use]
    pub fn into_libraries(self) -> BTreeSet<String> {
        match self {
            Self::Structured(libs) | Self::Pattern(libs) => libs,
        }
    }

    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }
}

/// Top-level module names imported by `source`. Never fails.
#[must_use]
pub fn extract(source: &str) -> BTreeSet<String> {
    extract_tagged(source).into_libraries()
}

/// Like [`extract`], but reports which path was taken.
#[must_use]
pub fn extract_tagged(source: &str) -> Extraction {
    structured_imports(source).map_or_else(|| Extraction::Pattern(pattern_imports(source)), Extraction::Structured)
}

/// Imports from a clean syntax tree, or `None` when the source does not parse.
fn structured_imports(source: &str) -> Option<BTreeSet<String>> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into()).ok()?;

    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let bytes = source.as_bytes();
    let mut libraries = BTreeSet::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    let dotted = if name.kind() == "aliased_import" {
                        name.child_by_field_name("name")
                    } else {
                        Some(name)
                    };
                    if let Some(lib) = dotted.and_then(|n| top_level(n, bytes)) {
                        let _ = libraries.insert(lib);
                    }
                }
            }
            "import_from_statement" => {
                // relative_import module names refer to the project itself
                if let Some(module) = node.child_by_field_name("module_name")
                    && module.kind() == "dotted_name"
                    && let Some(lib) = top_level(module, bytes)
                {
                    let _ = libraries.insert(lib);
                }
            }
            "future_import_statement" => {
                let _ = libraries.insert("__future__".to_string());
            }
            _ => {
                let mut cursor = node.walk();
                stack.extend(node.named_children(&mut cursor));
            }
        }
    }

    Some(libraries)
}

fn top_level(node: Node<'_>, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    first_segment(text)
}

/// Imports found by the line pattern, used for source that does not parse.
fn pattern_imports(source: &str) -> BTreeSet<String> {
    IMPORT_LINE
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| first_segment(m.as_str()))
        .collect()
}

/// `a.b.c` → `a`; empty for relative names such as `.pkg`.
fn first_segment(name: &str) -> Option<String> {
    let first = name.split('.').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}
