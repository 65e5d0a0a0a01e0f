//! Tokenizer for the expression language.

use kstring::KString;

use crate::error::EvaluationError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(KString),
    Punct(&'static str),
}

/// Longest first, so that prefixes don't shadow longer operators.
const PUNCTUATION: &[&str] = &[
    "===", "!==",
    "==", "!=", "<=", ">=", "&&", "||", "??",
    "<", ">", "+", "-", "*", "/", "%", "!", "?", ":", ".", ",",
    "(", ")", "[", "]", "{", "}",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

pub struct Lexer<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Lexer { source, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, position: usize, message: impl Into<String>) -> EvaluationError {
        EvaluationError::Syntax {
            source_text: self.source.into(),
            position,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'s str {
        let rest = self.rest();
        let len = rest.find(|c| ! pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn number(&mut self, start: usize) -> Result<Token, EvaluationError> {
        self.take_while(|c| c.is_ascii_digit());
        if self.rest().starts_with('.') {
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        if let Some('e' | 'E') = self.peek_char() {
            self.pos += 1;
            if let Some('+' | '-') = self.peek_char() {
                self.pos += 1;
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                return Err(self.error(start, "missing exponent digits"))
            }
        }
        let s = &self.source[start..self.pos];
        s.parse().map(Token::Number)
            .map_err(|_| self.error(start, format!("invalid number {s:?}")))
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token, EvaluationError> {
        self.pos += 1;
        let mut s = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                c if c == quote => {
                    self.pos += i + 1;
                    return Ok(Token::Str(s))
                }
                '\\' => {
                    let (_, e) = chars.next().ok_or_else(
                        || self.error(start, "unterminated string"))?;
                    match e {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        '0' => s.push('\0'),
                        'u' => {
                            let mut code = 0;
                            for _ in 0..4 {
                                let d = chars.next()
                                    .and_then(|(_, d)| d.to_digit(16))
                                    .ok_or_else(|| self.error(start, "invalid \\u escape"))?;
                                code = code * 16 + d;
                            }
                            s.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                        }
                        other => s.push(other),
                    }
                }
                c => s.push(c),
            }
        }
        Err(self.error(start, "unterminated string"))
    }

    /// The next token with its byte offset, `None` at the end.
    pub fn next_token(&mut self) -> Result<Option<(usize, Token)>, EvaluationError> {
        self.skip_whitespace();
        let start = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(None)
        };
        let token =
            if c.is_ascii_digit()
            || (c == '.' && self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            self.number(start)?
        } else if c == '\'' || c == '"' {
            self.string(start, c)?
        } else if is_ident_start(c) {
            Token::Ident(KString::from_ref(self.take_while(is_ident_continue)))
        } else if let Some(p) = PUNCTUATION.iter().copied().find(|p| self.rest().starts_with(*p)) {
            self.pos += p.len();
            Token::Punct(p)
        } else {
            return Err(self.error(start, format!("unexpected character {c:?}")))
        };
        Ok(Some((start, token)))
    }

    pub fn tokenize(mut self) -> Result<Vec<(usize, Token)>, EvaluationError> {
        let mut tokens = Vec::new();
        while let Some(t) = self.next_token()? {
            tokens.push(t);
        }
        Ok(tokens)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<Token> {
        Lexer::new(s).tokenize().unwrap().into_iter().map(|(_, t)| t).collect()
    }

    #[test]
    fn t_tokens() {
        use Token::*;
        assert_eq!(tokens(" it.name "),
                   vec![Ident("it".into()), Punct("."), Ident("name".into())]);
        assert_eq!(tokens("set('a/b', 1.5e1)"),
                   vec![Ident("set".into()), Punct("("), Str("a/b".into()), Punct(","),
                        Number(15.), Punct(")")]);
        assert_eq!(tokens("a!==b&&!c"),
                   vec![Ident("a".into()), Punct("!=="), Ident("b".into()), Punct("&&"),
                        Punct("!"), Ident("c".into())]);
        assert_eq!(tokens("$item ?? .5"),
                   vec![Ident("$item".into()), Punct("??"), Number(0.5)]);
        assert_eq!(tokens(r#""it's \"x\"\nA""#),
                   vec![Str("it's \"x\"\nA".into())]);
    }

    #[test]
    fn t_errors() {
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("1e").tokenize().is_err());
        match Lexer::new("a # b").tokenize() {
            Err(EvaluationError::Syntax { position, .. }) => assert_eq!(position, 2),
            other => panic!("{other:?}"),
        }
    }
}
