use pretty_assertions::assert_eq;

use lisplet::ast::{Callee, NodeId, NodeKind, ReturnType, Scalar, Tree};
use lisplet::lexer::lex;
use lisplet::parser::{parse, ParseError};

fn parse_str(source: &str) -> Tree {
    parse(&lex(source).expect("source should lex")).expect("source should parse")
}

fn parse_err(source: &str) -> ParseError {
    parse(&lex(source).expect("source should lex")).expect_err("source should not parse")
}

/// Every reachable node's children point back at it.
fn assert_parent_links(tree: &Tree, id: NodeId) {
    for &child in &tree[id].children {
        assert_eq!(tree[child].parent, Some(id));
        assert_parent_links(tree, child);
    }
}

#[test]
fn root_wraps_top_level_expressions() {
    let tree = parse_str("1 2");
    let root = &tree[Tree::ROOT];
    assert!(matches!(root.kind, NodeKind::Let { name: None }));
    assert_eq!(root.rtype, ReturnType::None);
    assert_eq!(root.children.len(), 2);
    for &child in &root.children {
        assert!(matches!(tree[child].kind, NodeKind::Literal(Scalar::I32(_))));
    }
}

#[test]
fn call_nodes_carry_promoted_types() {
    let tree = parse_str("(+ 1 2.5)");
    let call = tree[Tree::ROOT].children[0];
    assert!(matches!(
        tree[call].kind,
        NodeKind::EvalFun { target: Some(Callee::Intrinsic(_)), .. }
    ));
    assert_eq!(tree[call].rtype, ReturnType::F32);
    assert_eq!(tree[call].children.len(), 2);
}

#[test]
fn parent_links_are_consistent() {
    let tree = parse_str("(defun f (a b) (+ a b)) (let ((x 1) (y (f 2 3))) (ifzero x y 0))");
    assert_parent_links(&tree, Tree::ROOT);
}

#[test]
fn parse_is_deterministic() {
    let source = "(defun sq (n) (* n n)) (let ((x 3)) (sq x))";
    assert_eq!(parse_str(source), parse_str(source));
}

#[test]
fn variable_resolves_to_its_binding() {
    let tree = parse_str("(let ((x 1)) x)");
    let scope = tree[Tree::ROOT].children[0];
    let init = tree[scope].children[0];
    let body = tree[scope].children[1];
    let NodeKind::Init { name, decl } = &tree[init].kind else {
        panic!("expected init");
    };
    assert_eq!(name, "x");
    assert_eq!(*decl, init);
    assert_eq!(tree[init].rtype, ReturnType::I32);
    assert_eq!(
        tree[body].kind,
        NodeKind::EvalVar { name: "x".into(), init }
    );
    assert_eq!(tree[body].rtype, ReturnType::I32);
    assert_eq!(tree[scope].rtype, ReturnType::I32);
}

#[test]
fn shadowing_resolves_to_the_nearest_binding() {
    let tree = parse_str("(let ((x 1)) (let ((x 2)) x))");
    let outer = tree[Tree::ROOT].children[0];
    let inner = tree[outer].children[1];
    let inner_init = tree[inner].children[0];
    let body = tree[inner].children[1];
    assert_eq!(
        tree[body].kind,
        NodeKind::EvalVar { name: "x".into(), init: inner_init }
    );
}

#[test]
fn binding_initializer_cannot_see_its_siblings() {
    assert!(matches!(
        parse_err("(let ((x 1) (y x)) y)"),
        ParseError::UnknownVar { row: 1, col: 15 }
    ));
}

#[test]
fn nested_let_sees_enclosing_bindings() {
    parse_str("(let ((x 1)) (let ((y x)) (+ x y)))");
}

#[test]
fn defun_call_is_patched_to_its_target() {
    let tree = parse_str("(defun sq (n) (* n n)) (sq 7)");
    let defun = tree[Tree::ROOT].children[0];
    let call = tree[Tree::ROOT].children[1];
    assert!(tree[defun].is_defun());
    let NodeKind::EvalFun { name, target } = &tree[call].kind else {
        panic!("expected call");
    };
    assert_eq!(name, "sq");
    assert_eq!(*target, Some(Callee::Defun(defun)));
    // The argument type is call-site dependent, so the body and the call
    // stay polymorphic.
    assert_eq!(tree[defun].rtype, ReturnType::Unknown);
    assert_eq!(tree[call].rtype, ReturnType::Unknown);
}

#[test]
fn defun_with_literal_body_propagates_its_type() {
    let tree = parse_str("(defun one () 1) (one)");
    let call = tree[Tree::ROOT].children[1];
    assert_eq!(tree[call].rtype, ReturnType::I32);
}

#[test]
fn recursive_call_resolves_to_the_enclosing_defun() {
    let tree = parse_str("(defun f (n) (f n)) (f 1)");
    let defun = tree[Tree::ROOT].children[0];
    let body = *tree[defun].children.last().expect("defun has a body");
    let NodeKind::EvalFun { target, .. } = &tree[body].kind else {
        panic!("expected call");
    };
    assert_eq!(*target, Some(Callee::Defun(defun)));
}

#[test]
fn defun_inside_defun_is_legal() {
    parse_str("(defun f (x) (defun g (y) y) (g x)) (f 3)");
}

#[test]
fn conditional_branch_types() {
    let same = parse_str("(ifzero 0 1 2)");
    let call = same[Tree::ROOT].children[0];
    assert_eq!(same[call].rtype, ReturnType::I32);
    let mixed = parse_str("(ifzero 0 1 2.0)");
    let call = mixed[Tree::ROOT].children[0];
    assert_eq!(mixed[call].rtype, ReturnType::Unknown);
}

#[test]
fn let_with_zero_bindings_is_legal() {
    let tree = parse_str("(let () 1)");
    let scope = tree[Tree::ROOT].children[0];
    assert!(tree[scope].is_let());
    assert_eq!(tree[scope].rtype, ReturnType::I32);
}

#[test]
fn stray_parentheses() {
    assert!(matches!(
        parse_err(")"),
        ParseError::StrayRightParen { row: 1, col: 0 }
    ));
    assert!(matches!(
        parse_err("("),
        ParseError::StrayLeftParen { row: 1, col: 0 }
    ));
    assert!(matches!(
        parse_err("(+ 1 2"),
        ParseError::StrayLeftParen { row: 1, col: 0 }
    ));
}

#[test]
fn empty_parentheses() {
    assert!(matches!(parse_err("()"), ParseError::EmptyParens { .. }));
}

#[test]
fn invalid_let_forms() {
    assert!(matches!(parse_err("(let x 1)"), ParseError::InvalidLet { .. }));
    assert!(matches!(parse_err("(let)"), ParseError::InvalidLet { .. }));
    assert!(matches!(
        parse_err("(let (x) 1)"),
        ParseError::InvalidVarInit { .. }
    ));
    assert!(matches!(
        parse_err("(let ((x)) 1)"),
        ParseError::InvalidVarInit { .. }
    ));
    assert!(matches!(
        parse_err("(let ((x 1 2)) x)"),
        ParseError::InvalidVarInit { .. }
    ));
}

#[test]
fn empty_body_is_an_error() {
    assert!(matches!(
        parse_err("(let ((x 1)))"),
        ParseError::EmptyBody { .. }
    ));
    assert!(matches!(
        parse_err("(defun f (x))"),
        ParseError::EmptyBody { .. }
    ));
}

#[test]
fn invalid_defun_forms() {
    assert!(matches!(parse_err("(defun f ())"), ParseError::InvalidDefun { .. }));
    assert!(matches!(parse_err("(defun 1 () 2)"), ParseError::InvalidDefun { .. }));
    assert!(matches!(
        parse_err("(defun f (1) 2)"),
        ParseError::InvalidDefunArg { .. }
    ));
}

#[test]
fn defun_outside_a_let_is_misplaced() {
    assert!(matches!(
        parse_err("(+ (defun f (x) x) 1)"),
        ParseError::MisplacedDefun { .. }
    ));
}

#[test]
fn unknown_names() {
    assert!(matches!(parse_err("x"), ParseError::UnknownVar { .. }));
    assert!(matches!(
        parse_err("(f 1)"),
        ParseError::UnknownFunction { .. }
    ));
}

#[test]
fn arity_is_checked() {
    assert!(matches!(parse_err("(+ 1)"), ParseError::InvalidCall { .. }));
    assert!(matches!(parse_err("(ifzero 1 2)"), ParseError::InvalidCall { .. }));
    assert!(matches!(
        parse_err("(ifzero 1 2 3 4)"),
        ParseError::InvalidCall { .. }
    ));
    assert!(matches!(parse_err("(print)"), ParseError::InvalidCall { .. }));
    assert!(matches!(parse_err("(readi32 1)"), ParseError::InvalidCall { .. }));
    assert!(matches!(
        parse_err("(defun sq (n) (* n n)) (sq 1 2)"),
        ParseError::InvalidCall { .. }
    ));
}

#[test]
fn variadic_arithmetic_accepts_more_than_two_arguments() {
    parse_str("(+ 1 2 3 4 5)");
}

#[test]
fn literal_cannot_head_a_form() {
    assert!(matches!(parse_err("(1 2)"), ParseError::UnexpectedToken { .. }));
}

#[test]
fn bare_keyword_is_unexpected() {
    assert!(matches!(parse_err("defun"), ParseError::UnexpectedToken { .. }));
}

#[test]
fn empty_program_does_not_return() {
    let tokens = lex("").expect("empty source lexes");
    assert!(matches!(parse(&tokens), Err(ParseError::NoReturn)));
}
