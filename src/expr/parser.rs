//! Recursive descent parser producing the expression AST.

use kstring::KString;
use serde_json::Value as JsonValue;

use crate::error::EvaluationError;
use super::lexer::{Lexer, Token};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add, Sub, Mul, Div, Rem,
    Lt, Le, Gt, Ge,
    LooseEq, LooseNe, StrictEq, StrictNe,
}

/// Short-circuiting operators, they return one of their operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Undefined,
    Literal(JsonValue),
    Identifier(KString),
    Array(Vec<Expr>),
    Object(Vec<(KString, Expr)>),
    Member(Box<Expr>, KString),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// A JSON number for `f`, integral where possible so that it prints
/// without a fraction.
pub fn json_number(f: f64) -> Option<JsonValue> {
    const MAX_SAFE: f64 = 9007199254740991.;
    if f.fract() == 0. && f.abs() <= MAX_SAFE {
        if f == 0. {
            // also turns -0 into 0
            Some(JsonValue::from(0))
        } else {
            Some(JsonValue::from(f as i64))
        }
    } else {
        serde_json::Number::from_f64(f).map(JsonValue::Number)
    }
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

type PResult<T> = Result<T, EvaluationError>;

impl<'s> Parser<'s> {
    fn error(&self, message: impl Into<String>) -> EvaluationError {
        let position = self.tokens.get(self.pos).map_or(self.source.len(), |(p, _)| *p);
        EvaluationError::Syntax {
            source_text: self.source.into(),
            position,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(q)) if *q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected {p:?}")))
        }
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let test = self.nullish()?;
        if self.eat_punct("?") {
            let then = self.conditional()?;
            self.expect_punct(":")?;
            let otherwise = self.conditional()?;
            Ok(Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise)))
        } else {
            Ok(test)
        }
    }

    fn logical(
        &mut self,
        op: &str,
        logical_op: LogicalOp,
        next: fn(&mut Self) -> PResult<Expr>
    ) -> PResult<Expr> {
        let mut left = next(self)?;
        while self.eat_punct(op) {
            let right = next(self)?;
            left = Expr::Logical(logical_op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn nullish(&mut self) -> PResult<Expr> {
        self.logical("??", LogicalOp::Nullish, Self::or)
    }

    fn or(&mut self) -> PResult<Expr> {
        self.logical("||", LogicalOp::Or, Self::and)
    }

    fn and(&mut self) -> PResult<Expr> {
        self.logical("&&", LogicalOp::And, Self::equality)
    }

    /// Left associative binary operator level.
    fn binary(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> PResult<Expr>
    ) -> PResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (p, op) in ops {
                if self.eat_punct(p) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left)
        }
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary(&[("===", BinaryOp::StrictEq), ("!==", BinaryOp::StrictNe),
                      ("==", BinaryOp::LooseEq), ("!=", BinaryOp::LooseNe)],
                    Self::relational)
    }

    fn relational(&mut self) -> PResult<Expr> {
        self.binary(&[("<=", BinaryOp::Le), (">=", BinaryOp::Ge),
                      ("<", BinaryOp::Lt), (">", BinaryOp::Gt)],
                    Self::additive)
    }

    fn additive(&mut self) -> PResult<Expr> {
        self.binary(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
                    Self::multiplicative)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        self.binary(&[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
                    Self::unary)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op =
            if self.eat_punct("!") { UnaryOp::Not }
            else if self.eat_punct("-") { UnaryOp::Negate }
            else if self.eat_punct("+") { UnaryOp::Plus }
            else { return self.postfix() };
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn arguments(&mut self, close: &str) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        while ! self.eat_punct(close) {
            args.push(self.conditional()?);
            if ! self.eat_punct(",") {
                self.expect_punct(close)?;
                break
            }
        }
        Ok(args)
    }

    fn property_name(&mut self) -> PResult<KString> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected a property name"))
        }
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut e = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.property_name()?;
                e = Expr::Member(Box::new(e), name);
            } else if self.eat_punct("[") {
                let index = self.conditional()?;
                self.expect_punct("]")?;
                e = Expr::Index(Box::new(e), Box::new(index));
            } else if self.eat_punct("(") {
                let args = self.arguments(")")?;
                e = Expr::Call(Box::new(e), args);
            } else {
                return Ok(e)
            }
        }
    }

    fn object(&mut self) -> PResult<Expr> {
        let mut entries = Vec::new();
        while ! self.eat_punct("}") {
            let key = match self.peek() {
                Some(Token::Ident(k)) => k.clone(),
                Some(Token::Str(k)) => KString::from_ref(k),
                _ => return Err(self.error("expected an object key"))
            };
            self.pos += 1;
            let value = if self.eat_punct(":") {
                self.conditional()?
            } else {
                // shorthand `{ a }`
                Expr::Identifier(key.clone())
            };
            entries.push((key, value));
            if ! self.eat_punct(",") {
                self.expect_punct("}")?;
                break
            }
        }
        Ok(Expr::Object(entries))
    }

    fn primary(&mut self) -> PResult<Expr> {
        match self.advance() {
            Some(Token::Number(n)) =>
                json_number(n).map(Expr::Literal)
                .ok_or_else(|| self.error("number out of range")),
            Some(Token::Str(s)) => Ok(Expr::Literal(JsonValue::String(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(JsonValue::Bool(true)),
                "false" => Expr::Literal(JsonValue::Bool(false)),
                "null" => Expr::Literal(JsonValue::Null),
                "undefined" => Expr::Undefined,
                _ => Expr::Identifier(name)
            }),
            Some(Token::Punct("(")) => {
                let e = self.conditional()?;
                self.expect_punct(")")?;
                Ok(e)
            }
            Some(Token::Punct("[")) => Ok(Expr::Array(self.arguments("]")?)),
            Some(Token::Punct("{")) => self.object(),
            Some(_) => {
                self.pos -= 1;
                Err(self.error("unexpected token"))
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

pub fn parse(source: &str) -> Result<Expr, EvaluationError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { source, tokens, pos: 0 };
    let e = parser.conditional()?;
    if parser.peek().is_some() {
        return Err(parser.error("unexpected token after expression"))
    }
    Ok(e)
}
