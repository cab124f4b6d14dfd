//! Scope walks and call checking, shared by the span walk in the parent
//! module. Both lookups climb the `parent` chain and are purely lexical;
//! their results are burned into the pool as node indices.

use crate::ast::{Callee, Intrinsic, NodeId, NodeKind, ReturnType};

use super::Parser;

/// Number of arguments a callee accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Parser<'_> {
    /// Find the `Init` a variable name refers to. A lookup starting at an
    /// `Init` first steps out of the enclosing `Let`, so a binding's
    /// initializer never sees the other bindings of the same list.
    pub(super) fn resolve_var(&self, name: &str, from: Option<NodeId>) -> Option<NodeId> {
        let mut at = from?;
        if self.tree[at].is_init() {
            let scope = self.tree[at].parent.expect("an init sits inside a let");
            at = self.tree[scope].parent.expect("a binding list is never at the root");
        }
        if self.tree[at].is_let() {
            for &child in &self.tree[at].children {
                let NodeKind::Init { name: bound, .. } = &self.tree[child].kind else {
                    break;
                };
                if bound == name {
                    return Some(child);
                }
            }
        }
        self.resolve_var(name, self.tree[at].parent)
    }

    /// Find the named `Let` a call refers to: at every `Let` ancestor, match
    /// the ancestor itself first, then its function-definition children.
    pub(super) fn resolve_defun(&self, name: &str, from: Option<NodeId>) -> Option<NodeId> {
        let at = from?;
        if let NodeKind::Let { name: let_name } = &self.tree[at].kind {
            if let_name.as_deref() == Some(name) {
                return Some(at);
            }
            for &child in &self.tree[at].children {
                if let NodeKind::Let { name: Some(bound) } = &self.tree[child].kind {
                    if bound == name {
                        return Some(child);
                    }
                }
            }
        }
        self.resolve_defun(name, self.tree[at].parent)
    }

    /// Promoted type of a call's arguments.
    fn args_return_type(&self, call: NodeId) -> ReturnType {
        self.tree[call]
            .children
            .iter()
            .map(|&c| self.tree[c].rtype)
            .max()
            .unwrap_or(ReturnType::None)
    }

    /// Common type of a conditional's two branches, `Unknown` when they
    /// disagree.
    fn if_return_type(&self, call: NodeId) -> ReturnType {
        let children = &self.tree[call].children;
        if children.len() != 3 {
            return ReturnType::None;
        }
        let first = self.tree[children[1]].rtype;
        if self.tree[children[2]].rtype == first {
            first
        } else {
            ReturnType::Unknown
        }
    }

    /// Resolve a call's target, patch the call's return type (and, for user
    /// calls, its target index), and report the arity it requires. `None`
    /// means no function of that name is visible.
    pub(super) fn callee_arity(&mut self, call: NodeId) -> Option<Arity> {
        let NodeKind::EvalFun { name, target } = &self.tree[call].kind else {
            unreachable!("arity is only checked on call nodes");
        };
        let (name, target) = (name.clone(), *target);

        if let Some(Callee::Intrinsic(intrinsic)) = target {
            let (rtype, arity) = match intrinsic {
                Intrinsic::Plus | Intrinsic::Minus | Intrinsic::Mul | Intrinsic::Div => {
                    (self.args_return_type(call), Arity::AtLeast(2))
                }
                Intrinsic::IfZero | Intrinsic::IfNeg => {
                    (self.if_return_type(call), Arity::Exact(3))
                }
                Intrinsic::Print => {
                    let rtype = self.tree[call]
                        .children
                        .first()
                        .map(|&c| self.tree[c].rtype)
                        .unwrap_or(ReturnType::None);
                    (rtype, Arity::Exact(1))
                }
                Intrinsic::ReadI32 => (ReturnType::I32, Arity::Exact(0)),
                Intrinsic::ReadF32 => (ReturnType::F32, Arity::Exact(0)),
            };
            self.tree[call].rtype = rtype;
            return Some(arity);
        }

        let defun = self.resolve_defun(&name, self.tree[call].parent)?;
        self.tree[call].rtype = self.tree[defun].rtype;
        let NodeKind::EvalFun { target, .. } = &mut self.tree[call].kind else {
            unreachable!()
        };
        *target = Some(Callee::Defun(defun));
        Some(Arity::Exact(self.tree.init_count(defun)))
    }
}
