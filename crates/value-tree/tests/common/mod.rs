//! Shared helpers for the value-tree integration tests.
//!
//! [`Arith`] is a small arithmetic expression language used to drive the
//! formula engine:
//!
//! - numbers, `+ - * /`, unary minus and parentheses
//! - references: `price`, `item.price`, `rows[0].qty`, `rows[*].qty`,
//!   `/config.rate` (from the root), `../rate` (one object level up)
//! - `sum(ref)`, `count(ref)`, `fail()`
//! - `@index`, `@length`, `@prev.field`, `@next.field` from the innermost
//!   enclosing array

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use tracing_subscriber::EnvFilter;
use value_tree::{
    EvaluationError, ExpressionEvaluator, FormulaContext, FormulaEngine, FormulaValue, IdGenerator,
    NodeFactory, ParsedExpression, Path, PathSegment, SchemaDefinition, ValueTree,
};

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("value_tree=info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

pub fn factory() -> Arc<NodeFactory> {
    Arc::new(NodeFactory::new().with_id_generator(IdGenerator::isolated()))
}

pub fn schema(json: Value) -> Arc<SchemaDefinition> {
    Arc::new(SchemaDefinition::from_value(json).expect("valid schema"))
}

/// Tree without a formula engine.
pub fn plain_tree(schema_json: Value, data: Value) -> ValueTree {
    ValueTree::from_factory(&factory(), &schema(schema_json), &data).expect("tree builds")
}

/// Tree with an [`Arith`]-backed formula engine attached.
pub fn formula_tree(schema_json: Value, data: Value) -> ValueTree {
    plain_tree(schema_json, data)
        .with_formula_engine(FormulaEngine::new(Arc::new(Arith)))
        .expect("engine attaches")
}

// ── Expression language ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Ref(String),
    Neg(Box<Expr>),
    Bin(char, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Index,
    Length,
    Prev(String),
    Next(String),
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse(src: &'a str) -> Result<Expr, EvaluationError> {
        let mut parser = Parser { src: src.as_bytes(), pos: 0 };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos != parser.src.len() {
            return Err(parser.unexpected());
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> EvaluationError {
        match self.peek() {
            Some(c) => EvaluationError::syntax(format!("unexpected `{}` at {}", c as char, self.pos)),
            None => EvaluationError::syntax("unexpected end of expression"),
        }
    }

    fn eat(&mut self, c: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, EvaluationError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(b'+') {
                '+'
            } else if self.eat(b'-') {
                '-'
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, EvaluationError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(b'*') {
                '*'
            } else if self.eat(b'/') {
                '/'
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, EvaluationError> {
        if self.eat(b'-') {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvaluationError> {
        self.skip_ws();
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(b')') {
                    return Err(self.unexpected());
                }
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() => self.number(),
            Some(b'@') => self.special(),
            Some(c) if c == b'/' || c == b'.' || c == b'_' || c.is_ascii_alphabetic() => self.reference(),
            _ => Err(self.unexpected()),
        }
    }

    fn number(&mut self) -> Result<Expr, EvaluationError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'.') {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        text.parse()
            .map(Expr::Num)
            .map_err(|_| EvaluationError::syntax(format!("bad number `{text}`")))
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'.')
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn special(&mut self) -> Result<Expr, EvaluationError> {
        self.pos += 1;
        let name = self.ident();
        match name.split_once('.') {
            None if name == "index" => Ok(Expr::Index),
            None if name == "length" => Ok(Expr::Length),
            Some(("prev", field)) => Ok(Expr::Prev(field.to_string())),
            Some(("next", field)) => Ok(Expr::Next(field.to_string())),
            _ => Err(EvaluationError::syntax(format!("unknown `@{name}`"))),
        }
    }

    fn reference(&mut self) -> Result<Expr, EvaluationError> {
        let start = self.pos;
        while self.src[self.pos..].starts_with(b"../") {
            self.pos += 3;
        }
        if self.pos == start && self.peek() == Some(b'/') {
            self.pos += 1;
        }
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' => self.pos += 1,
                Some(b'[') => {
                    while self.peek().is_some_and(|c| c != b']') {
                        self.pos += 1;
                    }
                    if !self.eat(b']') {
                        return Err(self.unexpected());
                    }
                }
                _ => break,
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        if self.eat(b'(') {
            let mut args = Vec::new();
            if !self.eat(b')') {
                args.push(self.expr()?);
                if !self.eat(b')') {
                    return Err(self.unexpected());
                }
            }
            return Ok(Expr::Call(text, args));
        }
        Ok(Expr::Ref(text))
    }
}

fn collect_refs(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Ref(name) => out.push(name.clone()),
        Expr::Neg(inner) => collect_refs(inner, out),
        Expr::Bin(_, lhs, rhs) => {
            collect_refs(lhs, out);
            collect_refs(rhs, out);
        }
        Expr::Call(_, args) => args.iter().for_each(|arg| collect_refs(arg, out)),
        _ => {}
    }
}

/// Values a simple-form path selects under `value`, fanning out on `[*]`.
fn select<'v>(value: &'v Value, segments: &[PathSegment], out: &mut Vec<&'v Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match (segment, value) {
        (PathSegment::Property(name), Value::Object(map)) => {
            if let Some(child) = map.get(name) {
                select(child, rest, out);
            }
        }
        (PathSegment::Index(i), Value::Array(items)) => {
            if let Some(item) = items.get(*i) {
                select(item, rest, out);
            }
        }
        (PathSegment::Wildcard, Value::Array(items)) => {
            items.iter().for_each(|item| select(item, rest, out));
        }
        _ => {}
    }
}

/// Pop segments up to and including the nearest property segment.
fn pop_to_object(segments: &mut Vec<PathSegment>) {
    while let Some(segment) = segments.pop() {
        if segment.is_property() {
            return;
        }
    }
}

fn lookup<'c>(reference: &str, context: &'c FormulaContext) -> Vec<&'c Value> {
    let (base, segments): (&Value, Vec<PathSegment>) = if let Some(rest) = reference.strip_prefix('/') {
        (&context.root_data, parse(rest))
    } else if reference.starts_with("../") {
        let mut anchor = context.current_path.segments().to_vec();
        pop_to_object(&mut anchor);
        let mut rest = reference;
        while let Some(stripped) = rest.strip_prefix("../") {
            pop_to_object(&mut anchor);
            rest = stripped;
        }
        anchor.extend(parse(rest));
        (&context.root_data, anchor)
    } else {
        (context.item_data.as_ref().unwrap_or(&context.root_data), parse(reference))
    };
    let mut out = Vec::new();
    select(base, &segments, &mut out);
    out
}

fn parse(reference: &str) -> Vec<PathSegment> {
    reference
        .parse::<Path>()
        .map(|p| p.segments().to_vec())
        .unwrap_or_default()
}

fn flatten_numbers(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Number(n) => out.extend(n.as_f64()),
        Value::Array(items) => items.iter().for_each(|item| flatten_numbers(item, out)),
        Value::Object(map) => map.values().for_each(|v| flatten_numbers(v, out)),
        _ => {}
    }
}

fn as_number(value: &Value, what: &str) -> Result<f64, EvaluationError> {
    match value {
        Value::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Err(EvaluationError::null_reference(format!("`{what}` is null"))),
        other => Err(EvaluationError::runtime(format!("`{what}` is not a number: {other}"))),
    }
}

fn eval(expr: &Expr, context: &FormulaContext) -> Result<f64, EvaluationError> {
    let level = || {
        context
            .array_context
            .as_ref()
            .and_then(|c| c.levels.first())
            .ok_or_else(|| EvaluationError::runtime("not inside an array"))
    };
    match expr {
        Expr::Num(n) => Ok(*n),
        Expr::Neg(inner) => Ok(-eval(inner, context)?),
        Expr::Bin(op, lhs, rhs) => {
            let (a, b) = (eval(lhs, context)?, eval(rhs, context)?);
            Ok(match op {
                '+' => a + b,
                '-' => a - b,
                '*' => a * b,
                _ => a / b,
            })
        }
        Expr::Ref(name) => match lookup(name, context).as_slice() {
            [single] => as_number(single, name),
            [] => Err(EvaluationError::runtime(format!("unknown reference `{name}`"))),
            _ => Err(EvaluationError::runtime(format!("`{name}` selects several values"))),
        },
        Expr::Call(name, args) => {
            let selected = match args.first() {
                Some(Expr::Ref(reference)) => lookup(reference, context),
                _ => Vec::new(),
            };
            match name.as_str() {
                "sum" => {
                    let mut numbers = Vec::new();
                    selected.iter().for_each(|v| flatten_numbers(v, &mut numbers));
                    Ok(numbers.iter().sum())
                }
                "count" => Ok(match selected.as_slice() {
                    [Value::Array(items)] => items.len() as f64,
                    other => other.len() as f64,
                }),
                "fail" => Err(EvaluationError::runtime("fail() called")),
                _ => Err(EvaluationError::runtime(format!("unknown function `{name}`"))),
            }
        }
        Expr::Index => Ok(level()?.index as f64),
        Expr::Length => Ok(level()?.length as f64),
        Expr::Prev(field) => neighbour(&level()?.prev, field),
        Expr::Next(field) => neighbour(&level()?.next, field),
    }
}

fn neighbour(item: &Value, field: &str) -> Result<f64, EvaluationError> {
    match item.get(field) {
        Some(value) => as_number(value, field),
        None => Ok(0.0),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Arith;

impl ExpressionEvaluator for Arith {
    fn parse_expression(&self, expression: &str) -> Result<ParsedExpression, EvaluationError> {
        let expr = Parser::parse(expression)?;
        let mut dependencies = Vec::new();
        collect_refs(&expr, &mut dependencies);
        Ok(ParsedExpression { dependencies })
    }

    fn evaluate_with_context(
        &self,
        expression: &str,
        context: &FormulaContext,
    ) -> Result<FormulaValue, EvaluationError> {
        let expr = Parser::parse(expression)?;
        eval(&expr, context).map(FormulaValue::Number)
    }
}
