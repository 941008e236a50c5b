//! Scanner for the JD surface syntax.
//!
//! Produces a flat token stream with byte spans.  Keywords are carved out
//! of the identifier space here so the parser only ever compares token
//! kinds; `sub-conclusion` and `@support` need one token of lookahead
//! because `-` and `@` are not identifier characters.

use crate::diag::{RunnerError, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // class keywords
    Load,
    Justification,
    Pattern,
    Composition,
    // variable keywords
    Evidence,
    Strategy,
    SubConclusion,
    Conclusion,
    AtSupport,
    // other keywords
    Implements,
    Supports,
    // values
    Ident,
    Str,
    // punctuation
    LBrace,
    RBrace,
    Colon,
    Semicolon,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text; for `Str` this still includes the quotes.
    pub text: String,
    pub span: Span,
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Scan the whole buffer.  The returned stream always ends with an
    /// `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, RunnerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) -> Result<(), RunnerError> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.pos + 1 >= self.bytes.len() {
                            return Err(RunnerError::syntax_at(
                                "unterminated block comment",
                                Span::new(start, self.bytes.len()),
                            ));
                        }
                        if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            text: self.source[start..self.pos].to_owned(),
            span: Span::new(start, self.pos),
        }
    }

    fn next_token(&mut self) -> Result<Token, RunnerError> {
        self.skip_trivia()?;
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    span: Span::new(start, start),
                })
            }
        };

        match c {
            b'{' => {
                self.pos += 1;
                Ok(self.token(TokenKind::LBrace, start))
            }
            b'}' => {
                self.pos += 1;
                Ok(self.token(TokenKind::RBrace, start))
            }
            b':' => {
                self.pos += 1;
                Ok(self.token(TokenKind::Colon, start))
            }
            b';' => {
                self.pos += 1;
                Ok(self.token(TokenKind::Semicolon, start))
            }
            b'"' => self.scan_string(start),
            b'@' => {
                self.pos += 1;
                let word = self.scan_word();
                if word == "support" {
                    Ok(self.token(TokenKind::AtSupport, start))
                } else {
                    Err(RunnerError::syntax_at(
                        format!("unexpected token `@{}`", word),
                        Span::new(start, self.pos),
                    ))
                }
            }
            c if is_ident_start(c) => {
                let word = self.scan_word();
                // `sub-conclusion` is the one keyword with a hyphen; plain
                // identifiers never contain one.
                if word == "sub" && self.peek() == Some(b'-') {
                    self.pos += 1;
                    let tail = self.scan_word();
                    if tail == "conclusion" {
                        return Ok(self.token(TokenKind::SubConclusion, start));
                    }
                    return Err(RunnerError::syntax_at(
                        format!("unexpected token `sub-{}`", tail),
                        Span::new(start, self.pos),
                    ));
                }
                let kind = match word {
                    "load" => TokenKind::Load,
                    "justification" => TokenKind::Justification,
                    "pattern" => TokenKind::Pattern,
                    "composition" => TokenKind::Composition,
                    "evidence" => TokenKind::Evidence,
                    "strategy" => TokenKind::Strategy,
                    "conclusion" => TokenKind::Conclusion,
                    "implements" => TokenKind::Implements,
                    "supports" => TokenKind::Supports,
                    _ => TokenKind::Ident,
                };
                Ok(self.token(kind, start))
            }
            _ => {
                let ch = self.source[start..].chars().next().unwrap_or('?');
                Err(RunnerError::syntax_at(
                    format!("unexpected character `{}`", ch),
                    Span::new(start, start + ch.len_utf8()),
                ))
            }
        }
    }

    fn scan_word(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    fn scan_string(&mut self, start: usize) -> Result<Token, RunnerError> {
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(RunnerError::syntax_at(
                        "unterminated string literal",
                        Span::new(start, self.pos),
                    ))
                }
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(self.token(TokenKind::Str, start));
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_keywords_and_punctuation() {
        assert_eq!(
            kinds("load \"a.jd\"; justification J { }"),
            vec![
                TokenKind::Load,
                TokenKind::Str,
                TokenKind::Semicolon,
                TokenKind::Justification,
                TokenKind::Ident,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn sub_conclusion_is_one_token() {
        assert_eq!(
            kinds("sub-conclusion c1 : \"x\""),
            vec![
                TokenKind::SubConclusion,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Str,
                TokenKind::Eof,
            ]
        );
        // `sub` alone stays an ordinary identifier.
        assert_eq!(
            kinds("sub supports c"),
            vec![
                TokenKind::Ident,
                TokenKind::Supports,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn at_support_requires_the_keyword() {
        assert_eq!(kinds("@support p"), vec![
            TokenKind::AtSupport,
            TokenKind::Ident,
            TokenKind::Eof,
        ]);
        assert!(Lexer::new("@anchor p").tokenize().is_err());
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("// header\njustification /* inline */ J {}"),
            vec![
                TokenKind::Justification,
                TokenKind::Ident,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_keeps_raw_text_and_span() {
        let tokens = Lexer::new(r#"load "a\"b";"#).tokenize().unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Str);
        assert_eq!(tokens[1].text, r#""a\"b""#);
        assert_eq!(tokens[1].span, Span::new(5, 11));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        assert!(Lexer::new("load \"abc").tokenize().is_err());
        assert!(Lexer::new("load \"abc\n\"").tokenize().is_err());
    }

    #[test]
    fn stray_characters_carry_their_location() {
        let err = Lexer::new("justification J # {}").tokenize().unwrap_err();
        assert_eq!(err.span(), Some(Span::new(16, 17)));
    }
}
