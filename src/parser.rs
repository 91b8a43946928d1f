// ABOUTME: Recursive-descent parser turning tokens into the uniform form tree

use crate::arena::Arena;
use crate::ast::Node;
use crate::lexer::{Lexer, Token, TokenKind};

/// One-token-lookahead recursive descent. Malformed input is recovered from
/// silently: stray tokens are skipped and end-of-input closes any open
/// lists.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    cur: Token<'src>,
    peeked: Token<'src>,
    arena: &'static Arena,
}

impl<'src> Parser<'src> {
    pub fn new(arena: &'static Arena, src: &'src str) -> Self {
        let mut lexer = Lexer::new(src);
        let cur = lexer.next_token();
        let peeked = lexer.next_token();
        Parser { lexer, cur, peeked, arena }
    }

    fn advance(&mut self) {
        self.cur = self.peeked;
        self.peeked = self.lexer.next_token();
    }

    /// Parse the whole input into one synthetic list node wrapping all
    /// top-level forms.
    pub fn parse_toplevel(&mut self) -> &'static Node {
        let mut forms = Vec::new();
        while self.cur.kind != TokenKind::Eof {
            if let Some(form) = self.parse_form() {
                forms.push(form);
            }
        }
        Node::list(self.arena, forms, 1, 1)
    }

    fn parse_form(&mut self) -> Option<&'static Node> {
        let t = self.cur;
        match t.kind {
            TokenKind::LBrack => Some(self.parse_list()),
            TokenKind::Colon => {
                self.advance();
                Some(Node::symbol(self.arena, ":", t.line, t.col))
            }
            TokenKind::Arrow => {
                self.advance();
                Some(Node::symbol(self.arena, "->", t.line, t.col))
            }
            TokenKind::Int => {
                self.advance();
                let v = parse_i64(t.text);
                Some(Node::int(self.arena, v, t.line, t.col))
            }
            TokenKind::Float => {
                self.advance();
                let v = t.text.parse::<f64>().unwrap_or(0.0);
                Some(Node::float(self.arena, v, t.line, t.col))
            }
            TokenKind::Str => {
                self.advance();
                Some(Node::string(self.arena, t.text, t.line, t.col))
            }
            TokenKind::Symbol => {
                self.advance();
                match t.text {
                    "true" => Some(Node::bool_(self.arena, true, t.line, t.col)),
                    "false" => Some(Node::bool_(self.arena, false, t.line, t.col)),
                    name => Some(Node::symbol(self.arena, name, t.line, t.col)),
                }
            }
            // Stray `]`, error tokens: consume and let the caller continue.
            TokenKind::RBrack | TokenKind::Error | TokenKind::Eof => {
                self.advance();
                None
            }
        }
    }

    fn parse_list(&mut self) -> &'static Node {
        let (line, col) = (self.cur.line, self.cur.col);
        self.advance(); // consume [
        let mut items = Vec::new();
        while self.cur.kind != TokenKind::RBrack && self.cur.kind != TokenKind::Eof {
            match self.parse_form() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        if self.cur.kind == TokenKind::RBrack {
            self.advance();
        }
        Node::list(self.arena, items, line, col)
    }
}

fn parse_i64(text: &str) -> i64 {
    text.parse::<i64>().unwrap_or(if text.starts_with('-') { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn parse(src: &str) -> &'static Node {
        let arena = Arena::new().leak();
        Parser::new(arena, src).parse_toplevel()
    }

    fn forms(src: &str) -> &'static [&'static Node] {
        parse(src).as_list().expect("toplevel is a list")
    }

    #[test]
    fn test_toplevel_wraps_all_forms() {
        let fs = forms("1 2 [a b]");
        assert_eq!(fs.len(), 3);
        assert!(matches!(fs[0].kind, NodeKind::Int(1)));
        assert!(matches!(fs[1].kind, NodeKind::Int(2)));
        assert_eq!(fs[2].as_list().map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_colon_and_arrow_become_symbols() {
        let fs = forms("[def x : Int 41]");
        let items = fs[0].as_list().expect("def list");
        assert!(items[2].is_sym(":"));
        let fs = forms("[Int -> Int]");
        let items = fs[0].as_list().expect("type list");
        assert!(items[1].is_sym("->"));
    }

    #[test]
    fn test_true_false_promoted_to_bool() {
        let fs = forms("true false truey");
        assert!(matches!(fs[0].kind, NodeKind::Bool(true)));
        assert!(matches!(fs[1].kind, NodeKind::Bool(false)));
        assert!(fs[2].is_sym("truey"));
    }

    #[test]
    fn test_nested_lists() {
        let fs = forms("[a [b [c]] d]");
        let outer = fs[0].as_list().expect("outer");
        assert_eq!(outer.len(), 3);
        let inner = outer[1].as_list().expect("inner");
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_unterminated_list_closed_by_eof() {
        let fs = forms("[a [b c");
        let outer = fs[0].as_list().expect("outer");
        assert_eq!(outer.len(), 2);
        let inner = outer[1].as_list().expect("inner");
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_stray_close_bracket_is_skipped() {
        let fs = forms("] 7");
        assert_eq!(fs.len(), 1);
        assert!(matches!(fs[0].kind, NodeKind::Int(7)));
    }

    #[test]
    fn test_string_literal_keeps_raw_text() {
        let fs = forms(r#""a\tb""#);
        assert!(matches!(fs[0].kind, NodeKind::Str(s) if s == r"a\tb"));
    }

    #[test]
    fn test_positions_recorded() {
        let fs = forms("\n  [x]");
        assert_eq!((fs[0].line, fs[0].col), (2, 3));
    }

    #[test]
    fn test_print_parse_round_trip() {
        let srcs = [
            "[def x : Int 41]",
            "[fn [[n : Int]] : Int [if [= n 0] 1 [* n [fact [- n 1]]]]]",
            "[let [[a 1] [b : Str \"hi\"]] [do a b]]",
            "[quasiquote [+ [unquote x] 2.5 true]]",
        ];
        for src in srcs {
            let first = forms(src)[0];
            let reparsed = forms(&first.to_string())[0];
            assert!(first.structural_eq(reparsed), "round trip failed for {}", src);
        }
    }
}
