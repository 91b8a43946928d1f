// ABOUTME: The uniform form tree every pipeline stage operates on

use std::fmt;
use std::sync::OnceLock;

use crate::arena::Arena;
use crate::types::Type;

/// One parsed form. Position and the checker's cached type live on the outer
/// record; the payload lives in [`NodeKind`].
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
    pub col: u32,
    ty: OnceLock<Type>,
}

pub enum NodeKind {
    /// The substrate for all syntax: definitions, calls and type expressions
    /// are all lists.
    List(Vec<&'static Node>),
    Symbol(&'static str),
    Int(i64),
    Float(f64),
    Str(&'static str),
    Bool(bool),
}

impl Node {
    fn new(arena: &'static Arena, kind: NodeKind, line: u32, col: u32) -> &'static Node {
        arena.alloc(Node { kind, line, col, ty: OnceLock::new() })
    }

    pub fn list(arena: &'static Arena, items: Vec<&'static Node>, line: u32, col: u32) -> &'static Node {
        Self::new(arena, NodeKind::List(items), line, col)
    }

    pub fn symbol(arena: &'static Arena, name: &str, line: u32, col: u32) -> &'static Node {
        let interned = arena.alloc_str(name);
        Self::new(arena, NodeKind::Symbol(interned), line, col)
    }

    pub fn int(arena: &'static Arena, v: i64, line: u32, col: u32) -> &'static Node {
        Self::new(arena, NodeKind::Int(v), line, col)
    }

    pub fn float(arena: &'static Arena, v: f64, line: u32, col: u32) -> &'static Node {
        Self::new(arena, NodeKind::Float(v), line, col)
    }

    pub fn string(arena: &'static Arena, text: &str, line: u32, col: u32) -> &'static Node {
        let interned = arena.alloc_str(text);
        Self::new(arena, NodeKind::Str(interned), line, col)
    }

    pub fn bool_(arena: &'static Arena, v: bool, line: u32, col: u32) -> &'static Node {
        Self::new(arena, NodeKind::Bool(v), line, col)
    }

    /// Record the checked type. First write wins; the checker visits each
    /// node once, so later writes only occur on re-checked REPL input and
    /// are ignored.
    pub fn set_ty(&self, ty: Type) {
        let _ = self.ty.set(ty);
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.get()
    }

    pub fn as_list(&self) -> Option<&[&'static Node]> {
        match &self.kind {
            NodeKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&'static str> {
        match self.kind {
            NodeKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// True when this node is the symbol `name`.
    pub fn is_sym(&self, name: &str) -> bool {
        matches!(self.kind, NodeKind::Symbol(s) if s == name)
    }

    /// Structural equality, ignoring positions and cached types.
    pub fn structural_eq(&self, other: &Node) -> bool {
        match (&self.kind, &other.kind) {
            (NodeKind::List(a), NodeKind::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (NodeKind::Symbol(a), NodeKind::Symbol(b)) => a == b,
            (NodeKind::Int(a), NodeKind::Int(b)) => a == b,
            (NodeKind::Float(a), NodeKind::Float(b)) => a == b,
            (NodeKind::Str(a), NodeKind::Str(b)) => a == b,
            (NodeKind::Bool(a), NodeKind::Bool(b)) => a == b,
            _ => false,
        }
    }
}

/// Canonical printed representation: parsing the output of `Display` yields
/// a structurally equal tree.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            NodeKind::Symbol(s) => write!(f, "{}", s),
            NodeKind::Int(v) => write!(f, "{}", v),
            // {:?} keeps a trailing ".0" on whole floats so the printed form
            // re-lexes as a float, not an int.
            NodeKind::Float(v) => write!(f, "{:?}", v),
            NodeKind::Str(s) => write!(f, "\"{}\"", s),
            NodeKind::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> &'static Arena {
        Arena::new().leak()
    }

    #[test]
    fn test_display_canonical_form() {
        let a = arena();
        let n = Node::list(
            a,
            vec![
                Node::symbol(a, "def", 1, 1),
                Node::symbol(a, "x", 1, 6),
                Node::symbol(a, ":", 1, 8),
                Node::symbol(a, "Int", 1, 10),
                Node::int(a, 41, 1, 14),
            ],
            1,
            1,
        );
        assert_eq!(n.to_string(), "[def x : Int 41]");
    }

    #[test]
    fn test_float_display_survives_relex() {
        let a = arena();
        let n = Node::float(a, 2.0, 1, 1);
        assert_eq!(n.to_string(), "2.0");
    }

    #[test]
    fn test_structural_eq_ignores_positions() {
        let a = arena();
        let x = Node::list(a, vec![Node::int(a, 1, 1, 2), Node::symbol(a, "y", 1, 4)], 1, 1);
        let y = Node::list(a, vec![Node::int(a, 1, 9, 9), Node::symbol(a, "y", 9, 9)], 5, 5);
        assert!(x.structural_eq(y));
    }

    #[test]
    fn test_set_ty_is_write_once() {
        let a = arena();
        let n = Node::int(a, 1, 1, 1);
        n.set_ty(Type::Int);
        n.set_ty(Type::Float);
        assert_eq!(n.ty(), Some(&Type::Int));
    }
}
