//! Single-pass parser and name resolver.
//!
//! The parser consumes the token sequence left to right, emitting nodes into
//! the pool as it goes. Name resolution, arity checking and return-type
//! propagation happen inline: by the time a form's closing parenthesis is
//! reached, its node is fully resolved. The first error aborts the parse.

mod resolve;

use thiserror::Error;

use resolve::Arity;

use crate::ast::{Callee, Intrinsic, Node, NodeId, NodeKind, ReturnType, Scalar, Tree};
use crate::lexer::{Token, TokenKind};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("stray right parenthesis at line {row}, column {col}")]
    StrayRightParen { row: u32, col: u32 },
    #[error("stray left parenthesis at line {row}, column {col}")]
    StrayLeftParen { row: u32, col: u32 },
    #[error("empty parentheses at line {row}, column {col}")]
    EmptyParens { row: u32, col: u32 },
    #[error("misplaced defun at line {row}, column {col}")]
    MisplacedDefun { row: u32, col: u32 },
    #[error("invalid defun at line {row}, column {col}")]
    InvalidDefun { row: u32, col: u32 },
    #[error("invalid defun-arg at line {row}, column {col}")]
    InvalidDefunArg { row: u32, col: u32 },
    #[error("invalid let at line {row}, column {col}")]
    InvalidLet { row: u32, col: u32 },
    #[error("invalid var-init at line {row}, column {col}")]
    InvalidVarInit { row: u32, col: u32 },
    #[error("invalid let/defun at line {row}, column {col}")]
    EmptyBody { row: u32, col: u32 },
    #[error("invalid function call at line {row}, column {col}")]
    InvalidCall { row: u32, col: u32 },
    #[error("unknown function call at line {row}, column {col}")]
    UnknownFunction { row: u32, col: u32 },
    #[error("unknown var at line {row}, column {col}")]
    UnknownVar { row: u32, col: u32 },
    #[error("unexpected token at line {row}, column {col}")]
    UnexpectedToken { row: u32, col: u32 },
    #[error("root expression does not return")]
    NoReturn,
}

/// Parse a token sequence into a node pool. Node 0 of the result is a
/// synthetic anonymous `Let` whose body children are the program's top-level
/// expressions.
pub fn parse(tokens: &[Token]) -> Result<Tree, ParseError> {
    let mut parser = Parser {
        tokens,
        tree: Tree::new(),
    };
    let mut start = 0;
    let mut rest = tokens.len();
    while rest > 0 {
        let consumed = parser.node(start, rest, Tree::ROOT)?;
        start += consumed;
        rest -= consumed;
    }
    if parser.tree.body_count(Tree::ROOT) == 0 {
        return Err(ParseError::NoReturn);
    }
    Ok(parser.tree)
}

struct Parser<'t> {
    tokens: &'t [Token],
    tree: Tree,
}

impl Parser<'_> {
    fn pos(&self, at: usize) -> (u32, u32) {
        let token = &self.tokens[at];
        (token.row, token.col)
    }

    fn attach(&mut self, node: Node, parent: NodeId) -> NodeId {
        let id = self.tree.push(node);
        self.tree[parent].children.push(id);
        id
    }

    /// Parse the leading expression of a token span as a new child of
    /// `parent`; returns the number of tokens consumed.
    fn node(&mut self, start: usize, len: usize, parent: NodeId) -> Result<usize, ParseError> {
        debug_assert!(len > 0 && start + len <= self.tokens.len());
        let (row, col) = self.pos(start);
        match &self.tokens[start].kind {
            TokenKind::RParen => Err(ParseError::StrayRightParen { row, col }),
            TokenKind::LParen => self.form(start, len, parent),
            TokenKind::Int(value) => {
                let scalar = Scalar::I32(*value);
                self.attach(
                    Node {
                        kind: NodeKind::Literal(scalar),
                        rtype: ReturnType::I32,
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                    parent,
                );
                Ok(1)
            }
            TokenKind::Float(value) => {
                let scalar = Scalar::F32(*value);
                self.attach(
                    Node {
                        kind: NodeKind::Literal(scalar),
                        rtype: ReturnType::F32,
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                    parent,
                );
                Ok(1)
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                let init = self
                    .resolve_var(&name, Some(parent))
                    .ok_or(ParseError::UnknownVar { row, col })?;
                let rtype = self.tree[init].rtype;
                self.attach(
                    Node {
                        kind: NodeKind::EvalVar { name, init },
                        rtype,
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                    parent,
                );
                Ok(1)
            }
            _ => Err(ParseError::UnexpectedToken { row, col }),
        }
    }

    /// Parse a parenthesized form: `defun`, `let`, or a call.
    fn form(&mut self, start: usize, len: usize, parent: NodeId) -> Result<usize, ParseError> {
        let (row, col) = self.pos(start);
        let span = self
            .matching_parens(start, len)
            .ok_or(ParseError::StrayLeftParen { row, col })?;
        if span == 2 {
            return Err(ParseError::EmptyParens { row, col });
        }

        let mut pos = start + 1;
        let mut rest = span - 2;
        let id = match self.tokens[pos].kind {
            TokenKind::Defun => {
                if !self.tree[parent].is_let() {
                    return Err(ParseError::MisplacedDefun { row, col });
                }
                if rest < 5 || !matches!(self.tokens[pos + 1].kind, TokenKind::Ident(_)) {
                    return Err(ParseError::InvalidDefun { row, col });
                }
                pos += 1;
                rest -= 1;
                let TokenKind::Ident(name) = &self.tokens[pos].kind else {
                    unreachable!()
                };
                let name = Some(name.clone());
                let id = self.attach(
                    Node {
                        kind: NodeKind::Let { name },
                        rtype: ReturnType::Unknown,
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                    parent,
                );
                let consumed = self.defun_args(pos, rest, id)?;
                pos += consumed;
                rest -= consumed;
                id
            }
            TokenKind::Let => {
                if rest < 4 || !matches!(self.tokens[pos + 1].kind, TokenKind::LParen) {
                    return Err(ParseError::InvalidLet { row, col });
                }
                let id = self.attach(
                    Node {
                        kind: NodeKind::Let { name: None },
                        rtype: ReturnType::None,
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                    parent,
                );
                pos += 1;
                rest -= 1;
                let consumed = self.let_bindings(pos, rest, id)?;
                pos += consumed;
                rest -= consumed;
                id
            }
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::IfZero
            | TokenKind::IfNeg
            | TokenKind::Print
            | TokenKind::ReadI32
            | TokenKind::ReadF32
            | TokenKind::Ident(_) => {
                let head = &self.tokens[pos].kind;
                let name = call_name(head);
                let target = intrinsic_for(head).map(Callee::Intrinsic);
                let id = self.attach(
                    Node {
                        kind: NodeKind::EvalFun { name, target },
                        rtype: ReturnType::None,
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                    parent,
                );
                pos += 1;
                rest -= 1;
                id
            }
            _ => return Err(ParseError::UnexpectedToken { row, col }),
        };

        while rest > 0 {
            let consumed = self.node(pos, rest, id)?;
            pos += consumed;
            rest -= consumed;
        }

        match self.tree[id].kind {
            NodeKind::Let { .. } => {
                // A let or defun needs at least one expression to return.
                if self.tree.body_count(id) == 0 {
                    return Err(ParseError::EmptyBody { row, col });
                }
                let last = self.tree[id]
                    .children
                    .iter()
                    .rev()
                    .find(|&&c| !self.tree[c].is_defun())
                    .copied()
                    .expect("a let with a body has a non-defun child");
                self.tree[id].rtype = self.tree[last].rtype;
            }
            NodeKind::EvalFun { .. } => {
                let argc = self.tree.body_count(id);
                let arity = self
                    .callee_arity(id)
                    .ok_or(ParseError::UnknownFunction { row, col })?;
                let ok = match arity {
                    Arity::Exact(n) => argc == n,
                    Arity::AtLeast(n) => argc >= n,
                };
                if !ok {
                    return Err(ParseError::InvalidCall { row, col });
                }
            }
            _ => unreachable!(),
        }

        Ok(span)
    }

    /// Parse a `let` binding list `((name expr) ...)`; `start` sits on its
    /// opening parenthesis. Each binding becomes an `Init` child of `parent`
    /// with exactly one initializer child.
    fn let_bindings(&mut self, start: usize, len: usize, parent: NodeId) -> Result<usize, ParseError> {
        let (row, col) = self.pos(start);
        let span = self
            .matching_parens(start, len)
            .ok_or(ParseError::InvalidLet { row, col })?;
        let mut pos = start + 1;
        let mut rest = span - 2;
        while rest > 0 {
            let (row, col) = self.pos(pos);
            if rest < 4
                || !matches!(self.tokens[pos].kind, TokenKind::LParen)
                || !matches!(self.tokens[pos + 1].kind, TokenKind::Ident(_))
            {
                return Err(ParseError::InvalidVarInit { row, col });
            }
            let sub = self
                .matching_parens(pos, rest)
                .ok_or(ParseError::InvalidVarInit { row, col })?;
            pos += 1;
            rest -= sub;
            let mut inner = sub - 2;
            let TokenKind::Ident(name) = &self.tokens[pos].kind else {
                unreachable!()
            };
            let name = name.clone();
            let decl = self.tree.next_id();
            let id = self.attach(
                Node {
                    kind: NodeKind::Init { name, decl },
                    rtype: ReturnType::None,
                    parent: Some(parent),
                    children: Vec::new(),
                },
                parent,
            );
            pos += 1;
            inner -= 1;
            let (row, col) = self.pos(pos);
            if inner == 0 {
                return Err(ParseError::InvalidVarInit { row, col });
            }
            let consumed = self.node(pos, inner, id)?;
            if consumed != inner {
                return Err(ParseError::InvalidVarInit { row, col });
            }
            let first = self.tree[id].children[0];
            self.tree[id].rtype = self.tree[first].rtype;
            pos += consumed + 1;
        }
        Ok(span)
    }

    /// Parse a `defun` header `name (arg ...)`; `start` sits on the name.
    /// Each argument becomes an `Init` child of `parent` with no initializer
    /// and a call-site dependent return type.
    fn defun_args(&mut self, start: usize, len: usize, parent: NodeId) -> Result<usize, ParseError> {
        let (row, col) = self.pos(start);
        if len < 2 || !matches!(self.tokens[start + 1].kind, TokenKind::LParen) {
            return Err(ParseError::InvalidDefun { row, col });
        }
        let (row, col) = self.pos(start + 1);
        let span = self
            .matching_parens(start + 1, len - 1)
            .ok_or(ParseError::InvalidDefun { row, col })?;
        let mut pos = start + 2;
        let mut rest = span - 2;
        while rest > 0 {
            let TokenKind::Ident(name) = &self.tokens[pos].kind else {
                let (row, col) = self.pos(pos);
                return Err(ParseError::InvalidDefunArg { row, col });
            };
            let name = name.clone();
            let decl = self.tree.next_id();
            self.attach(
                Node {
                    kind: NodeKind::Init { name, decl },
                    rtype: ReturnType::Unknown,
                    parent: Some(parent),
                    children: Vec::new(),
                },
                parent,
            );
            pos += 1;
            rest -= 1;
        }
        Ok(span + 1)
    }

    /// Length of the leading balanced-parenthesis span, both parentheses
    /// included. `start` must sit on a left parenthesis.
    fn matching_parens(&self, start: usize, len: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens[start + 1..start + len].iter().enumerate() {
            match token.kind {
                TokenKind::RParen => {
                    if depth == 0 {
                        return Some(i + 2);
                    }
                    depth -= 1;
                }
                TokenKind::LParen => depth += 1,
                _ => {}
            }
        }
        None
    }
}

fn call_name(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::IfZero => "ifzero",
        TokenKind::IfNeg => "ifneg",
        TokenKind::Print => "print",
        TokenKind::ReadI32 => "readi32",
        TokenKind::ReadF32 => "readf32",
        TokenKind::Ident(name) => return name.clone(),
        _ => unreachable!("not a callable token"),
    }
    .to_owned()
}

fn intrinsic_for(kind: &TokenKind) -> Option<Intrinsic> {
    match kind {
        TokenKind::Plus => Some(Intrinsic::Plus),
        TokenKind::Minus => Some(Intrinsic::Minus),
        TokenKind::Star => Some(Intrinsic::Mul),
        TokenKind::Slash => Some(Intrinsic::Div),
        TokenKind::IfZero => Some(Intrinsic::IfZero),
        TokenKind::IfNeg => Some(Intrinsic::IfNeg),
        TokenKind::Print => Some(Intrinsic::Print),
        TokenKind::ReadI32 => Some(Intrinsic::ReadI32),
        TokenKind::ReadF32 => Some(Intrinsic::ReadF32),
        _ => None,
    }
}
