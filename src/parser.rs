//! Recursive-descent parser for the JD surface syntax.
//!
//! The parser only checks shape; it produces a parse tree of [`Item`]s
//! whose leaves are raw tokens.  Lowering the tree into model values
//! (decoding string literals, mapping keywords to enums, validating
//! `implements` placement) is the transformer's job.

use crate::diag::RunnerError;
use crate::lexer::{Lexer, Token, TokenKind};

/// One top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `load STRING ;` — the token is the raw string literal.
    Load { path: Token },
    Class(ClassItem),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassItem {
    pub keyword: Token,
    pub name: Token,
    pub implements: Option<Token>,
    pub body: BodyItem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyItem {
    Justification(Vec<Entry>),
    /// Composition bodies are opaque to the core: a list of identifiers.
    Composition(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Variable {
        keyword: Token,
        name: Token,
        instruction: Option<Token>,
    },
    Support {
        left: Token,
        right: Token,
    },
}

/// Parse a whole JD source buffer into a parse tree.
pub fn parse(source: &str) -> Result<Vec<Item>, RunnerError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser { tokens, pos: 0 }.model()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        // The Eof sentinel is never consumed.
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, RunnerError> {
        if self.peek().kind == kind {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> RunnerError {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_owned()
        } else {
            format!("`{}`", token.text)
        };
        RunnerError::syntax_at(format!("expected {}, found {}", what, found), token.span)
    }

    fn model(&mut self) -> Result<Vec<Item>, RunnerError> {
        let mut items = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            match self.peek().kind {
                TokenKind::Load => items.push(self.load_stmt()?),
                TokenKind::Justification | TokenKind::Pattern | TokenKind::Composition => {
                    items.push(self.class_def()?)
                }
                _ => return Err(self.unexpected("`load` or a class definition")),
            }
        }
        Ok(items)
    }

    fn load_stmt(&mut self) -> Result<Item, RunnerError> {
        self.bump(); // `load`
        let path = self.expect(TokenKind::Str, "a quoted path")?;
        self.expect(TokenKind::Semicolon, "`;`")?;
        Ok(Item::Load { path })
    }

    fn class_def(&mut self) -> Result<Item, RunnerError> {
        let keyword = self.bump();
        let name = self.expect(TokenKind::Ident, "a class name")?;
        let implements = if self.eat(TokenKind::Implements) {
            Some(self.expect(TokenKind::Ident, "a pattern name")?)
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "`{`")?;
        let body = if keyword.kind == TokenKind::Composition {
            self.composition_body()?
        } else {
            self.justification_body()?
        };
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Item::Class(ClassItem {
            keyword,
            name,
            implements,
            body,
        }))
    }

    fn justification_body(&mut self) -> Result<BodyItem, RunnerError> {
        let mut entries = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Evidence
                | TokenKind::Strategy
                | TokenKind::SubConclusion
                | TokenKind::Conclusion
                | TokenKind::AtSupport => {
                    let keyword = self.bump();
                    let name = self.expect(TokenKind::Ident, "a variable name")?;
                    let instruction = if self.eat(TokenKind::Colon) {
                        Some(self.expect(TokenKind::Str, "a quoted description")?)
                    } else {
                        None
                    };
                    self.eat(TokenKind::Semicolon);
                    entries.push(Entry::Variable {
                        keyword,
                        name,
                        instruction,
                    });
                }
                TokenKind::Ident => {
                    let left = self.bump();
                    self.expect(TokenKind::Supports, "`supports`")?;
                    let right = self.expect(TokenKind::Ident, "a variable name")?;
                    self.eat(TokenKind::Semicolon);
                    entries.push(Entry::Support { left, right });
                }
                TokenKind::RBrace => break,
                _ => return Err(self.unexpected("a variable or support declaration")),
            }
        }
        Ok(BodyItem::Justification(entries))
    }

    fn composition_body(&mut self) -> Result<BodyItem, RunnerError> {
        let mut refs = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Ident => {
                    let id = self.bump();
                    if self.eat(TokenKind::Colon) {
                        self.expect(TokenKind::Str, "a quoted instruction")?;
                    }
                    self.eat(TokenKind::Semicolon);
                    refs.push(id);
                }
                TokenKind::RBrace => break,
                _ => return Err(self.unexpected("an identifier")),
            }
        }
        Ok(BodyItem::Composition(refs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_load_and_class() {
        let items = parse("load \"other.jd\";\njustification J { evidence e : \"E\" }")
            .unwrap();
        assert_eq!(items.len(), 2);
        match &items[0] {
            Item::Load { path } => assert_eq!(path.text, "\"other.jd\""),
            other => panic!("expected a load statement, got {:?}", other),
        }
        match &items[1] {
            Item::Class(class) => {
                assert_eq!(class.name.text, "J");
                assert!(class.implements.is_none());
                match &class.body {
                    BodyItem::Justification(entries) => assert_eq!(entries.len(), 1),
                    other => panic!("expected a justification body, got {:?}", other),
                }
            }
            other => panic!("expected a class, got {:?}", other),
        }
    }

    #[test]
    fn parses_implements_and_supports() {
        let items = parse(
            "justification J implements P {\n\
             evidence e : \"E\"\n\
             e supports s\n\
             }",
        )
        .unwrap();
        let class = match &items[0] {
            Item::Class(class) => class,
            other => panic!("expected a class, got {:?}", other),
        };
        assert_eq!(class.implements.as_ref().map(|t| t.text.as_str()), Some("P"));
        let entries = match &class.body {
            BodyItem::Justification(entries) => entries,
            other => panic!("expected a justification body, got {:?}", other),
        };
        assert!(matches!(&entries[1], Entry::Support { left, right }
            if left.text == "e" && right.text == "s"));
    }

    #[test]
    fn separators_are_optional_in_bodies() {
        let items = parse("pattern P { @support sup; strategy s : \"S\"; sup supports s; }");
        assert!(items.is_ok());
    }

    #[test]
    fn composition_bodies_are_opaque() {
        let items = parse("composition C { J1; J2 : \"weave\" }").unwrap();
        match &items[0] {
            Item::Class(class) => match &class.body {
                BodyItem::Composition(refs) => {
                    let names: Vec<&str> = refs.iter().map(|t| t.text.as_str()).collect();
                    assert_eq!(names, vec!["J1", "J2"]);
                }
                other => panic!("expected a composition body, got {:?}", other),
            },
            other => panic!("expected a class, got {:?}", other),
        }
    }

    #[test]
    fn load_requires_a_semicolon() {
        let err = parse("load \"a.jd\"").unwrap_err();
        assert!(err.to_string().contains("expected `;`"));
    }

    #[test]
    fn variables_may_omit_the_instruction() {
        assert!(parse("justification J { conclusion c }").is_ok());
    }

    #[test]
    fn errors_carry_the_offending_span() {
        let err = parse("justification J { evidence : \"E\" }").unwrap_err();
        assert!(err.span().is_some());
    }
}
