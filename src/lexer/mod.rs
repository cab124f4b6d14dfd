//! Tokenization of the source character stream.
//!
//! Keywords, literals and identifiers disambiguate by maximal match: a
//! keyword or literal is accepted only when no identifier match is longer,
//! so `ifzerox` and `123abc` are identifiers while `ifzero` and `123` are
//! not. Signs are part of numeric literals, never prefix operators.

use logos::Logos;
use thiserror::Error;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("defun")]
    Defun,
    #[token("let")]
    Let,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("ifzero")]
    IfZero,
    #[token("ifneg")]
    IfNeg,
    #[token("print")]
    Print,
    #[token("readi32")]
    ReadI32,
    #[token("readf32")]
    ReadF32,
    #[regex(r"[+-]?[0-9]+", dec_i32, priority = 10)]
    #[regex(r"[+-]?0[xX][0-9a-fA-F]+", hex_i32, priority = 10)]
    Int(i32),
    #[regex(r"[+-]?[0-9]+\.[0-9]*([eE][0-9]+)?", dec_f32, priority = 8)]
    #[regex(r"[+-]?\.[0-9]+([eE][0-9]+)?", dec_f32, priority = 8)]
    #[regex(r"[+-]?[0-9]+[eE][0-9]+", dec_f32, priority = 8)]
    #[regex(r"[+-]?0[xX][0-9a-fA-F]+\.[0-9a-fA-F]*", hex_f32, priority = 10)]
    #[regex(r"[+-]?0[xX]\.[0-9a-fA-F]+", hex_f32, priority = 10)]
    Float(f32),
    #[regex(r"[0-9A-Za-z_]+", |lex| lex.slice().to_owned(), priority = 3)]
    Ident(String),
}

fn dec_i32(lex: &mut logos::Lexer<TokenKind>) -> Option<i32> {
    lex.slice().parse().ok()
}

fn hex_i32(lex: &mut logos::Lexer<TokenKind>) -> Option<i32> {
    let (negative, digits) = split_sign(lex.slice());
    let magnitude = u32::from_str_radix(&digits[2..], 16).ok()?;
    let value = magnitude as i32;
    Some(if negative { value.wrapping_neg() } else { value })
}

fn dec_f32(lex: &mut logos::Lexer<TokenKind>) -> Option<f32> {
    lex.slice().parse().ok()
}

/// Hex floats are `0x` digits with an optional hex fraction and no binary
/// exponent: the value of `0x1.8` is 1.5.
fn hex_f32(lex: &mut logos::Lexer<TokenKind>) -> f32 {
    let (negative, digits) = split_sign(lex.slice());
    let (int_part, frac_part) = match digits[2..].split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (&digits[2..], ""),
    };
    let mut value = 0f64;
    for d in int_part.chars() {
        value = value * 16.0 + d.to_digit(16).unwrap() as f64;
    }
    let mut scale = 1.0 / 16.0;
    for d in frac_part.chars() {
        value += d.to_digit(16).unwrap() as f64 * scale;
        scale /= 16.0;
    }
    if negative {
        value = -value;
    }
    value as f32
}

fn split_sign(slice: &str) -> (bool, &str) {
    match slice.as_bytes()[0] {
        b'+' => (false, &slice[1..]),
        b'-' => (true, &slice[1..]),
        _ => (false, slice),
    }
}

/// A token with its position in the source stream. Rows are 1-indexed,
/// columns are 0-indexed byte offsets within the row.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("syntax error at line {row}, column {col}")]
pub struct LexError {
    pub row: u32,
    pub col: u32,
}

/// Tokenize a whole source buffer, attaching row and column to each token.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut line_starts = vec![0usize];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            line_starts.push(i + 1);
        }
    }
    let position = |offset: usize| {
        let line = line_starts.partition_point(|&start| start <= offset) - 1;
        ((line + 1) as u32, (offset - line_starts[line]) as u32)
    };

    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    while let Some(item) = lexer.next() {
        let (row, col) = position(lexer.span().start);
        match item {
            Ok(kind) => tokens.push(Token { kind, row, col }),
            Err(()) => return Err(LexError { row, col }),
        }
    }
    Ok(tokens)
}
