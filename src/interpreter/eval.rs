//! The evaluator proper.
//!
//! Evaluation is a direct recursive walk over the node pool, with an
//! explicit value stack for variable bindings. Three rewrites happen along
//! the way, driven by the flags on [`Value`]:
//!
//! - a node whose value is constant and effect free collapses into a
//!   `Literal` in place;
//! - a conditional with a constant predicate loses its dispatch, either by
//!   splicing the taken branch into the parent or, when the predicate has
//!   observable effects, by becoming a two-expression scope;
//! - a user call is replaced by a fresh anonymous `Let` holding a deep copy
//!   of the callee, parameters bound to the call-site arguments.
//!
//! Rewriting never frees nodes; detached nodes simply become unreachable.

use std::io::{BufRead, Write};

use crate::ast::{Callee, Intrinsic, Node, NodeId, NodeKind, ReturnType, Scalar, Tree};

use super::value::Value;
use super::RuntimeError;

/// One bound variable on the value stack. Slots are pushed anonymous and
/// labeled by the enclosing scope once all of its bindings have run.
struct Slot {
    init: Option<NodeId>,
    value: Value,
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn apply_i32(self, a: i32, b: i32) -> Result<i32, RuntimeError> {
        Ok(match self {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
        })
    }

    fn apply_f32(self, a: f32, b: f32) -> f32 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
        }
    }
}

/// Dispatch data copied out of a node so evaluation can borrow the pool
/// mutably.
enum Dispatch {
    Let,
    Init,
    Var(NodeId),
    Fun(Callee),
}

pub struct Interpreter<R, W> {
    tree: Tree,
    stack: Vec<Slot>,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Interpreter<R, W> {
    pub fn new(tree: Tree, input: R, output: W) -> Self {
        Interpreter {
            tree,
            stack: Vec::new(),
            input,
            output,
        }
    }

    /// Evaluate the whole program. The result is the value of the root's
    /// last body child.
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        let value = self.eval(Tree::ROOT)?;
        debug_assert!(self.stack.is_empty());
        Ok(value)
    }

    /// The tree in its current, possibly rewritten state.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn eval(&mut self, index: NodeId) -> Result<Value, RuntimeError> {
        let dispatch = match &self.tree[index].kind {
            // Nothing to update in a literal node.
            NodeKind::Literal(scalar) => return Ok(Value::from_literal(*scalar)),
            NodeKind::Let { .. } => Dispatch::Let,
            NodeKind::Init { .. } => Dispatch::Init,
            NodeKind::EvalVar { init, .. } => Dispatch::Var(*init),
            NodeKind::EvalFun { target, .. } => {
                Dispatch::Fun(target.expect("calls are resolved at parse time"))
            }
        };

        let (ret, obsolete) = match dispatch {
            Dispatch::Let => (self.eval_let(index)?, false),
            Dispatch::Init => (self.eval_init(index)?, false),
            Dispatch::Var(init) => (self.lookup(init), false),
            Dispatch::Fun(Callee::Intrinsic(intrinsic)) => match intrinsic {
                Intrinsic::Plus => (self.eval_arith(index, ArithOp::Add)?, false),
                Intrinsic::Minus => (self.eval_arith(index, ArithOp::Sub)?, false),
                Intrinsic::Mul => (self.eval_arith(index, ArithOp::Mul)?, false),
                Intrinsic::Div => (self.eval_arith(index, ArithOp::Div)?, false),
                Intrinsic::IfZero => self.eval_if(index, |i| i == 0, |f| f == 0.0)?,
                Intrinsic::IfNeg => self.eval_if(index, |i| i < 0, |f| f < 0.0)?,
                Intrinsic::Print => (self.eval_print(index)?, false),
                // Read nodes are never rewritten: they must read again on
                // every re-entry.
                Intrinsic::ReadI32 => return Ok(Value::from_read(self.read_i32()?)),
                Intrinsic::ReadF32 => return Ok(Value::from_read(self.read_f32()?)),
            },
            Dispatch::Fun(Callee::Defun(target)) => return self.eval_call(index, target),
        };

        if !obsolete {
            // Collapse into a literal when the value is constant and effect
            // free; never for the root or for bindings.
            if index != Tree::ROOT && !self.tree[index].is_init() && ret.literal && !ret.sidefx {
                let parent = self.tree[index].parent;
                self.tree[index] = Node {
                    kind: NodeKind::Literal(ret.scalar),
                    rtype: ret.return_type(),
                    parent,
                    children: Vec::new(),
                };
            } else {
                self.tree[index].rtype = if ret.incoh {
                    ReturnType::Unknown
                } else {
                    ret.return_type()
                };
            }
        }

        Ok(ret)
    }

    fn eval_let(&mut self, index: NodeId) -> Result<Value, RuntimeError> {
        let restore = self.stack.len();
        let mut sidefx = false;
        let mut ret = None;

        // Bindings, when present, come first.
        let count = self.tree[index].children.len();
        let mut at = 0;
        while at < count {
            let child = self.tree[index].children[at];
            if !self.tree[child].is_init() {
                break;
            }
            let value = self.eval(child)?;
            sidefx |= value.sidefx;
            ret = Some(value);
            at += 1;
        }

        // De-anonymize the freshly pushed values: label each slot with its
        // binding's parse-time identity, which is what variable uses inside
        // this scope (and inside any inlined copy of it) refer to.
        debug_assert_eq!(self.stack.len(), restore + at);
        for i in 0..at {
            let child = self.tree[index].children[i];
            let decl = match &self.tree[child].kind {
                NodeKind::Init { decl, .. } => *decl,
                _ => unreachable!("leading children of a let are bindings"),
            };
            self.stack[restore + i].init = Some(decl);
        }

        // Body expressions; named lets are inert here.
        while at < count {
            let child = self.tree[index].children[at];
            if !self.tree[child].is_defun() {
                let value = self.eval(child)?;
                sidefx |= value.sidefx;
                ret = Some(value);
            }
            at += 1;
        }

        let mut value = ret.expect("a let body is never empty");
        value.sidefx = sidefx;
        self.stack.truncate(restore);
        Ok(value)
    }

    fn eval_init(&mut self, index: NodeId) -> Result<Value, RuntimeError> {
        let child = *self
            .tree[index]
            .children
            .first()
            .expect("an init has an initializer");
        let value = self.eval(child)?;
        // The stack is a side-effect boundary: stored copies shed their
        // sidefx and incoherence bits.
        self.stack.push(Slot {
            init: None,
            value: Value {
                sidefx: false,
                incoh: false,
                ..value
            },
        });
        Ok(value)
    }

    fn lookup(&self, init: NodeId) -> Value {
        self.stack
            .iter()
            .rev()
            .find(|slot| slot.init == Some(init))
            .map(|slot| slot.value)
            .expect("a variable is bound before it is used")
    }

    fn eval_arith(&mut self, index: NodeId, op: ArithOp) -> Result<Value, RuntimeError> {
        // At least two arguments, checked at parse time.
        let first_child = self.tree[index].children[0];
        let first = self.eval(first_child)?;
        let mut literal = first.literal;
        let mut sidefx = first.sidefx;
        let mut incoh = first.incoh;
        let mut acc = first.scalar;

        let mut at = 1;
        while at < self.tree[index].children.len() {
            let child = self.tree[index].children[at];
            let arg = self.eval(child)?;
            literal &= arg.literal;
            sidefx |= arg.sidefx;
            incoh |= arg.incoh;
            // The accumulator promotes to f32 at the first f32 argument and
            // stays there; later i32 arguments widen.
            acc = match (acc, arg.scalar) {
                (Scalar::I32(a), Scalar::I32(b)) => Scalar::I32(op.apply_i32(a, b)?),
                (Scalar::I32(a), Scalar::F32(b)) => Scalar::F32(op.apply_f32(a as f32, b)),
                (Scalar::F32(a), Scalar::I32(b)) => Scalar::F32(op.apply_f32(a, b as f32)),
                (Scalar::F32(a), Scalar::F32(b)) => Scalar::F32(op.apply_f32(a, b)),
            };
            at += 1;
        }

        Ok(Value {
            scalar: acc,
            literal,
            sidefx,
            incoh,
        })
    }

    fn eval_if(
        &mut self,
        index: NodeId,
        test_i32: fn(i32) -> bool,
        test_f32: fn(f32) -> bool,
    ) -> Result<(Value, bool), RuntimeError> {
        let predicate_node = self.tree[index].children[0];
        let predicate = self.eval(predicate_node)?;
        let literal = predicate.literal;
        let sidefx = predicate.sidefx;
        let branch = match predicate.scalar {
            Scalar::I32(i) => {
                if test_i32(i) {
                    1
                } else {
                    2
                }
            }
            Scalar::F32(f) => {
                if test_f32(f) {
                    1
                } else {
                    2
                }
            }
        };

        // Evaluating the branch may rewrite it in place, so the child list
        // is re-read after every eval.
        let chosen = self.tree[index].children[branch];
        let mut ret = self.eval(chosen)?;
        ret.literal &= literal;
        ret.sidefx |= sidefx;
        let first = self.tree[self.tree[index].children[1]].rtype;
        let second = self.tree[self.tree[index].children[2]].rtype;
        ret.incoh |= !literal && first != second;

        let mut obsolete = false;
        if literal {
            if sidefx {
                // The predicate's effects must stay: the conditional becomes
                // a two-expression scope [predicate, taken branch].
                let predicate_node = self.tree[index].children[0];
                let branch_node = self.tree[index].children[branch];
                let parent = self.tree[index].parent;
                self.tree[index] = Node {
                    kind: NodeKind::Let { name: None },
                    rtype: ReturnType::None,
                    parent,
                    children: vec![predicate_node, branch_node],
                };
            } else {
                let branch_node = self.tree[index].children[branch];
                let parent = self.tree[index]
                    .parent
                    .expect("a conditional is never the root");
                self.tree.replace_child(index, branch_node, parent);
                obsolete = true;
            }
        }
        Ok((ret, obsolete))
    }

    fn eval_print(&mut self, index: NodeId) -> Result<Value, RuntimeError> {
        let child = self.tree[index].children[0];
        let mut value = self.eval(child)?;
        writeln!(self.output, "{}", value.scalar)?;
        value.sidefx = true;
        Ok(value)
    }

    /// Inline expansion: replace the call with a fresh anonymous `Let`
    /// holding a copy of the callee, each parameter initialized from the
    /// corresponding call-site argument. The callee's original subtree is
    /// untouched; every call gets its own copy.
    fn eval_call(&mut self, index: NodeId, target: NodeId) -> Result<Value, RuntimeError> {
        let parent = self.tree[index].parent.expect("a call is never the root");
        let inlined = self.tree.push(Node {
            kind: NodeKind::Let { name: None },
            rtype: ReturnType::None,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.tree.copy_subtree(target, inlined);
        self.tree.replace_child(index, inlined, parent);

        // Each copied parameter binding is childless; adopt the call-site
        // argument as its initializer.
        let argc = self.tree[index].children.len();
        for i in 0..argc {
            let argument = self.tree[index].children[i];
            let param = self.tree[inlined].children[i];
            debug_assert!(self.tree[param].is_init() && self.tree[param].children.is_empty());
            self.tree[param].children.push(argument);
        }

        self.eval(inlined)
    }

    fn read_i32(&mut self) -> Result<Scalar, RuntimeError> {
        write!(self.output, "i: ")?;
        self.output.flush()?;
        let word = self.read_word()?;
        word.parse::<i32>()
            .map(Scalar::I32)
            .map_err(|_| RuntimeError::InvalidInput)
    }

    fn read_f32(&mut self) -> Result<Scalar, RuntimeError> {
        write!(self.output, "f: ")?;
        self.output.flush()?;
        let word = self.read_word()?;
        word.parse::<f32>()
            .map(Scalar::F32)
            .map_err(|_| RuntimeError::InvalidInput)
    }

    /// Skip leading whitespace, then take bytes up to the next whitespace
    /// or end of input.
    fn read_word(&mut self) -> Result<String, RuntimeError> {
        let mut word = String::new();
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte)? {
                0 => return Ok(word),
                _ if byte[0].is_ascii_whitespace() => {
                    if !word.is_empty() {
                        return Ok(word);
                    }
                }
                _ => word.push(byte[0] as char),
            }
        }
    }
}
