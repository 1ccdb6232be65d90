//! Boolean row filters written as expressions.
//!
//! ```text
//! Observation > 0.5 and time >= '2019-01-02'
//! (m1 - Observation) < 0.1 | ~(x > 3)
//! ```
//!
//! Names refer to the observation (`Observation`), model and auxiliary
//! variables, `time`, `x` and `y`. Names containing spaces are quoted with
//! backticks. String literals compared against `time` are parsed as
//! timestamps.

use chrono::NaiveDateTime;
use skill_common::time::parse_datetime;
use skill_common::{SkillError, SkillResult};

/// A value seen by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Time(NaiveDateTime),
    Str(String),
    Bool(bool),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Time(_) => "time",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Name(String),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let v = text.parse::<f64>().map_err(|_| format!("bad number '{text}'"))?;
            tokens.push(Token::Num(v));
            continue;
        }
        if c == '\'' || c == '"' || c == '`' {
            let end = chars[i + 1..]
                .iter()
                .position(|&d| d == c)
                .ok_or_else(|| format!("unterminated {c} quote"))?;
            let text: String = chars[i + 1..i + 1 + end].iter().collect();
            tokens.push(if c == '`' { Token::Ident(text) } else { Token::Str(text) });
            i += end + 2;
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "and" => Token::Op("and"),
                "or" => Token::Op("or"),
                "not" => Token::Op("not"),
                "True" | "true" => Token::Num(1.0),
                "False" | "false" => Token::Num(0.0),
                _ => Token::Ident(word),
            });
            continue;
        }
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let op = match two.as_str() {
            "<=" => Some("<="),
            ">=" => Some(">="),
            "==" => Some("=="),
            "!=" => Some("!="),
            _ => None,
        };
        if let Some(op) = op {
            tokens.push(Token::Op(op));
            i += 2;
            continue;
        }
        tokens.push(match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '<' => Token::Op("<"),
            '>' => Token::Op(">"),
            '+' => Token::Op("+"),
            '-' => Token::Op("-"),
            '*' => Token::Op("*"),
            '/' => Token::Op("/"),
            '&' => Token::Op("and"),
            '|' => Token::Op("or"),
            '~' => Token::Op("not"),
            other => return Err(format!("unexpected character '{other}'")),
        });
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(op),
            _ => None,
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        let op = self.peek_op().filter(|op| ops.contains(op))?;
        self.pos += 1;
        Some(op)
    }

    fn or(&mut self) -> Result<Node, String> {
        let mut lhs = self.and()?;
        while self.eat_op(&["or"]).is_some() {
            lhs = Node::Binary(BinOp::Or, Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node, String> {
        let mut lhs = self.not()?;
        while self.eat_op(&["and"]).is_some() {
            lhs = Node::Binary(BinOp::And, Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Node, String> {
        if self.eat_op(&["not"]).is_some() {
            return Ok(Node::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node, String> {
        let lhs = self.sum()?;
        let Some(op) = self.eat_op(&["<", "<=", ">", ">=", "==", "!="]) else {
            return Ok(lhs);
        };
        let op = match op {
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            _ => BinOp::Ne,
        };
        Ok(Node::Binary(op, Box::new(lhs), Box::new(self.sum()?)))
    }

    fn sum(&mut self) -> Result<Node, String> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(self.term()?));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let op = if op == "*" { BinOp::Mul } else { BinOp::Div };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, String> {
        if self.eat_op(&["-"]).is_some() {
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node, String> {
        let token = self.tokens.get(self.pos).cloned().ok_or("unexpected end of expression")?;
        self.pos += 1;
        match token {
            Token::Num(v) => Ok(Node::Literal(Value::Num(v))),
            Token::Str(s) => Ok(Node::Literal(Value::Str(s))),
            Token::Ident(name) => Ok(Node::Name(name)),
            Token::LParen => {
                let inner = self.or()?;
                match self.tokens.get(self.pos) {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Token::RParen => Err("unexpected ')'".to_string()),
            Token::Op(op) => Err(format!("unexpected operator '{op}'")),
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    root: Node,
}

impl Query {
    pub fn parse(expr: &str) -> SkillResult<Self> {
        let tokens = tokenize(expr).map_err(|msg| SkillError::query(expr, msg))?;
        if tokens.is_empty() {
            return Err(SkillError::query(expr, "empty expression"));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.or().map_err(|msg| SkillError::query(expr, msg))?;
        if parser.pos != parser.tokens.len() {
            return Err(SkillError::query(expr, "unexpected trailing input"));
        }
        Ok(Self {
            source: expr.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names referenced by the expression.
    pub fn names(&self) -> Vec<&str> {
        fn walk<'a>(node: &'a Node, out: &mut Vec<&'a str>) {
            match node {
                Node::Name(n) => {
                    if !out.contains(&n.as_str()) {
                        out.push(n);
                    }
                }
                Node::Neg(inner) | Node::Not(inner) => walk(inner, out),
                Node::Binary(_, l, r) => {
                    walk(l, out);
                    walk(r, out);
                }
                Node::Literal(_) => {}
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    /// Evaluate on `n` rows. `lookup(name, row)` supplies variable values.
    pub fn mask<F>(&self, n: usize, lookup: F) -> SkillResult<Vec<bool>>
    where
        F: Fn(&str, usize) -> Option<Value>,
    {
        (0..n)
            .map(|row| match self.eval(&self.root, row, &lookup)? {
                Value::Bool(b) => Ok(b),
                other => Err(SkillError::query(
                    &self.source,
                    format!("expression must be boolean, got {}", other.type_name()),
                )),
            })
            .collect()
    }

    fn eval<F>(&self, node: &Node, row: usize, lookup: &F) -> SkillResult<Value>
    where
        F: Fn(&str, usize) -> Option<Value>,
    {
        let err = |msg: String| SkillError::query(&self.source, msg);
        match node {
            Node::Literal(v) => Ok(v.clone()),
            Node::Name(name) => lookup(name, row).ok_or_else(|| err(format!("unknown name '{name}'"))),
            Node::Neg(inner) => match self.eval(inner, row, lookup)? {
                Value::Num(v) => Ok(Value::Num(-v)),
                other => Err(err(format!("cannot negate a {}", other.type_name()))),
            },
            Node::Not(inner) => match self.eval(inner, row, lookup)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(err(format!("'not' needs a boolean, got {}", other.type_name()))),
            },
            Node::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs, row, lookup)?;
                let r = self.eval(rhs, row, lookup)?;
                binary(*op, l, r).map_err(err)
            }
        }
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value, String> {
    use std::cmp::Ordering;

    let mismatch = |l: &Value, r: &Value| format!("cannot apply {op:?} to {} and {}", l.type_name(), r.type_name());
    match op {
        BinOp::And | BinOp::Or => match (&l, &r) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinOp::And { *a && *b } else { *a || *b })),
            _ => Err(mismatch(&l, &r)),
        },
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => match (&l, &r) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                _ => a / b,
            })),
            _ => Err(mismatch(&l, &r)),
        },
        _ => {
            let ordering: Option<Ordering> = match (&l, &r) {
                (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
                (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
                (Value::Time(a), Value::Str(s)) => {
                    let b = parse_datetime(s).map_err(|e| e.to_string())?;
                    Some(a.cmp(&b))
                }
                (Value::Str(s), Value::Time(b)) => {
                    let a = parse_datetime(s).map_err(|e| e.to_string())?;
                    Some(a.cmp(b))
                }
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                (Value::Bool(a), Value::Bool(b)) if matches!(op, BinOp::Eq | BinOp::Ne) => Some(a.cmp(b)),
                _ => return Err(mismatch(&l, &r)),
            };
            Ok(Value::Bool(match (op, ordering) {
                (BinOp::Ne, None) => true,
                (_, None) => false,
                (BinOp::Lt, Some(o)) => o == Ordering::Less,
                (BinOp::Le, Some(o)) => o != Ordering::Greater,
                (BinOp::Gt, Some(o)) => o == Ordering::Greater,
                (BinOp::Ge, Some(o)) => o != Ordering::Less,
                (BinOp::Eq, Some(o)) => o == Ordering::Equal,
                (_, Some(o)) => o != Ordering::Equal,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::ts;

    fn lookup(name: &str, row: usize) -> Option<Value> {
        let obs = [1.0, 2.0, f64::NAN, 4.0];
        let m1 = [1.5, 2.0, 3.0, 3.0];
        let time = ["2019-01-01", "2019-01-02", "2019-01-03", "2019-01-04"];
        match name {
            "Observation" => Some(Value::Num(obs[row])),
            "m1" => Some(Value::Num(m1[row])),
            "wind speed" => Some(Value::Num(row as f64)),
            "time" => Some(Value::Time(ts(time[row]))),
            _ => None,
        }
    }

    fn mask(expr: &str) -> Vec<bool> {
        Query::parse(expr).unwrap().mask(4, lookup).unwrap()
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(mask("Observation > 1.5"), vec![false, true, false, true]);
        assert_eq!(mask("Observation > 1.5 and m1 < 3"), vec![false, true, false, false]);
        assert_eq!(mask("Observation < 1.5 | m1 == 3"), vec![true, false, true, true]);
        assert_eq!(mask("~(m1 >= 3)"), vec![true, true, false, false]);
        assert_eq!(mask("not m1 - Observation > 0"), vec![false, true, true, true]);
    }

    #[test]
    fn test_nan_comparisons() {
        assert_eq!(mask("Observation != 99"), vec![true, true, true, true]);
        assert_eq!(mask("Observation == Observation"), vec![true, true, false, true]);
    }

    #[test]
    fn test_time_and_quoted_names() {
        assert_eq!(mask("time >= '2019-01-03'"), vec![false, false, true, true]);
        assert_eq!(mask("`wind speed` * 2 > 3"), vec![false, false, true, true]);
        assert_eq!(mask("-m1 < -2.5e0"), vec![false, false, true, true]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(Query::parse("Observation >"), Err(SkillError::Query { .. })));
        assert!(Query::parse("(m1 > 1").is_err());
        assert!(Query::parse("m1 > 1 )").is_err());
        assert!(Query::parse("m1 # 2").is_err());
        assert!(Query::parse("").is_err());

        let q = Query::parse("unknown > 1").unwrap();
        assert!(q.mask(4, lookup).is_err());
        let q = Query::parse("m1 + 1").unwrap();
        assert!(q.mask(4, lookup).is_err());
        assert_eq!(Query::parse("m1 > Observation").unwrap().names(), vec!["m1", "Observation"]);
    }
}
