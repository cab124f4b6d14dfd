//! lisplet - an interpreter for a small Lisp-like expression language.
//!
//! The pipeline is lexer → parser/resolver → evaluator. Parsing builds a
//! flat, index-addressed node pool with names already resolved; evaluation
//! walks that pool, folding constant subtrees and inlining user calls in
//! place as it goes.

pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;

use std::io::{BufRead, Write};

use thiserror::Error;

use ast::Tree;
use interpreter::{Interpreter, RuntimeError, Value};

/// Any failure across the three phases.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Lex and parse a source buffer into a node pool.
pub fn parse_source(source: &str) -> Result<Tree, Error> {
    let tokens = lexer::lex(source)?;
    Ok(parser::parse(&tokens)?)
}

/// Run a whole program against the given I/O streams, returning its final
/// value.
pub fn eval_source<R: BufRead, W: Write>(
    source: &str,
    input: R,
    output: W,
) -> Result<Value, Error> {
    let tree = parse_source(source)?;
    let mut interpreter = Interpreter::new(tree, input, output);
    Ok(interpreter.run()?)
}
