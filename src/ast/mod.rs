//! The expression tree: a flat, index-addressed node pool.
//!
//! Nodes reference each other through plain indices instead of owned
//! pointers, which keeps parent back-edges and cross-edges (variable uses
//! pointing at their bindings, calls pointing at their definitions) free of
//! ownership cycles and makes in-place rewriting during evaluation trivial.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Index of a node within the pool.
pub type NodeId = usize;

/// The built-in functions a call can target instead of a user definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Plus,
    Minus,
    Mul,
    Div,
    IfZero,
    IfNeg,
    Print,
    ReadI32,
    ReadF32,
}

/// Evaluation target of a call node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Intrinsic(Intrinsic),
    /// Pool index of the named `Let` this call enters.
    Defun(NodeId),
}

/// Inferred return type of a node.
///
/// The variant order is the numeric promotion order: combining arguments
/// promotes to the greatest variant among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReturnType {
    /// Not yet established.
    None,
    I32,
    F32,
    /// Call-site dependent or conflicting.
    Unknown,
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ReturnType::None => "none",
            ReturnType::I32 => "i32",
            ReturnType::F32 => "f32",
            ReturnType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A scalar value of one of the two numeric types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I32(i32),
    F32(f32),
}

impl Scalar {
    pub fn return_type(self) -> ReturnType {
        match self {
            Scalar::I32(_) => ReturnType::I32,
            Scalar::F32(_) => ReturnType::F32,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::I32(i) => write!(f, "{i}"),
            Scalar::F32(x) => write!(f, "{x:.6}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A lexical scope. Anonymous (`name: None`) for a `let` expression,
    /// named for a function definition. A named `Let` is inert under linear
    /// traversal and only entered through a call.
    Let { name: Option<String> },
    /// A single binding. `decl` is the node's own index at parse time and is
    /// preserved by subtree copies, so every inlined copy of a body resolves
    /// its variables against the same parse-time identity.
    Init { name: String, decl: NodeId },
    /// A variable use; `init` is the binding it resolved to at parse time.
    EvalVar { name: String, init: NodeId },
    /// A function call. `target` is patched during parsing once the callee
    /// is known; user calls start out unresolved.
    EvalFun { name: String, target: Option<Callee> },
    Literal(Scalar),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub rtype: ReturnType,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn is_defun(&self) -> bool {
        matches!(self.kind, NodeKind::Let { name: Some(_) })
    }

    pub fn is_init(&self) -> bool {
        matches!(self.kind, NodeKind::Init { .. })
    }

    pub fn is_let(&self) -> bool {
        matches!(self.kind, NodeKind::Let { .. })
    }
}

/// The node pool. Append-only during parsing; evaluation may overwrite
/// nodes in place and edit child lists, but indices stay stable. Nodes are
/// never freed; rewriting leaves unreachable nodes behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Index of the synthetic root `Let` wrapping the top-level expressions.
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Tree {
            nodes: vec![Node {
                kind: NodeKind::Let { name: None },
                rtype: ReturnType::None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Index the next `push` will return.
    pub fn next_id(&self) -> NodeId {
        self.nodes.len()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Number of leading `Init` children of a `Let`.
    pub fn init_count(&self, id: NodeId) -> usize {
        self[id]
            .children
            .iter()
            .take_while(|&&c| self[c].is_init())
            .count()
    }

    /// Number of body children: everything past the leading `Init`s that is
    /// not a function definition.
    pub fn body_count(&self, id: NodeId) -> usize {
        self[id]
            .children
            .iter()
            .skip(self.init_count(id))
            .filter(|&&c| !self[c].is_defun())
            .count()
    }

    /// Swap `old` for `new` in `parent`'s child list.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId, parent: NodeId) {
        let slot = self[parent]
            .children
            .iter_mut()
            .find(|c| **c == old)
            .expect("replaced node is a child of its parent");
        *slot = new;
    }

    /// Deep-copy `src`'s children as children of `dst`, which must be
    /// childless. Node payloads are copied verbatim, so copied variable uses
    /// and copied bindings keep referencing the parse-time identities.
    pub fn copy_subtree(&mut self, src: NodeId, dst: NodeId) {
        debug_assert!(self[dst].children.is_empty());
        let count = self[src].children.len();
        for i in 0..count {
            let child = self[src].children[i];
            let mut node = self[child].clone();
            node.parent = Some(dst);
            node.children.clear();
            let copy = self.push(node);
            self[dst].children.push(copy);
            self.copy_subtree(child, copy);
        }
    }

    fn dump(&self, f: &mut fmt::Formatter, id: NodeId, depth: usize) -> fmt::Result {
        let node = &self[id];
        for _ in 0..depth {
            f.write_str("  ")?;
        }
        match &node.kind {
            NodeKind::Let { name: Some(name) } => writeln!(f, "Let: {} {name}", node.rtype)?,
            NodeKind::Let { name: None } => writeln!(f, "Let: {}", node.rtype)?,
            NodeKind::Init { name, decl } => writeln!(f, "Init: {} {name} ({decl})", node.rtype)?,
            NodeKind::EvalVar { name, init } => {
                writeln!(f, "EvalVar: {} {name} ({init})", node.rtype)?
            }
            NodeKind::EvalFun { name, .. } => writeln!(f, "EvalFun: {} {name}", node.rtype)?,
            NodeKind::Literal(value) => writeln!(f, "Literal: {} {value}", node.rtype)?,
        }
        for i in 0..node.children.len() {
            self.dump(f, self[id].children[i], depth + 1)?;
        }
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }
}

/// Dumps the root's children, one node per line, indented by depth. The
/// synthetic root itself is not printed.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self[Tree::ROOT].children.len() {
            self.dump(f, self[Tree::ROOT].children[i], 0)?;
        }
        Ok(())
    }
}
