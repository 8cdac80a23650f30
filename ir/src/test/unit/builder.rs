use reductor_dtype::{INDEX_DTYPE, ScalarDType};

use crate::{BinaryOp, ConstValue, Error, ExpressionTree, Node, UnaryOp};

#[test]
fn test_build_sum() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[8]);
    let y = b.array("y", ScalarDType::Float32, &[1]);
    let s = b.sum(x);
    b.assign(y, s);
    let tree = b.build().unwrap();

    assert_eq!(tree.statements().len(), 1);
    assert_eq!(tree.node_dtype(s).unwrap(), ScalarDType::Float32);
    assert!(matches!(tree.node(x).unwrap(), Node::Array { .. }));
}

#[test]
fn test_argmax_produces_index_dtype() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[8]);
    let idx = b.array("idx", INDEX_DTYPE, &[1]);
    let am = b.argmax(x);
    b.assign(idx, am);
    let tree = b.build().unwrap();
    assert_eq!(tree.node_dtype(am).unwrap(), INDEX_DTYPE);
}

#[test]
fn test_constant_is_cast_on_insert() {
    let mut b = ExpressionTree::builder();
    let c = b.constant(ConstValue::Float(2.5), ScalarDType::Int32);
    let x = b.array("x", ScalarDType::Int32, &[4]);
    let y = b.array("y", ScalarDType::Int32, &[1]);
    let scaled = b.binary(BinaryOp::Mul, x, c);
    let s = b.sum(scaled);
    b.assign(y, s);
    let tree = b.build().unwrap();
    assert_eq!(tree.node(c).unwrap(), &Node::Const { value: ConstValue::Int(2), dtype: ScalarDType::Int32 });
}

#[test]
fn test_empty_tree_rejected() {
    let mut b = ExpressionTree::builder();
    b.array("x", ScalarDType::Float32, &[4]);
    assert_eq!(b.build(), Err(Error::EmptyTree));
}

#[test]
fn test_no_reduction_rejected() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[4]);
    let y = b.array("y", ScalarDType::Float32, &[4]);
    b.assign(y, x);
    assert_eq!(b.build(), Err(Error::NoReduction));
}

#[test]
fn test_nested_reduction_rejected() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[4]);
    let y = b.array("y", ScalarDType::Float32, &[1]);
    let inner = b.sum(x);
    let outer = b.max(inner);
    b.assign(y, outer);
    assert_eq!(b.build(), Err(Error::NestedReduction { outer, inner }));
}

#[test]
fn test_scalar_target_rejected() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[4]);
    let alpha = b.scalar("alpha", ScalarDType::Float32);
    let s = b.sum(x);
    b.assign(alpha, s);
    assert_eq!(b.build(), Err(Error::InvalidAssignTarget { node: alpha }));
}

#[test]
fn test_binary_dtype_mismatch_rejected() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[4]);
    let z = b.array("z", ScalarDType::Int32, &[4]);
    let y = b.array("y", ScalarDType::Float32, &[1]);
    let prod = b.binary(BinaryOp::Mul, x, z);
    let s = b.sum(prod);
    b.assign(y, s);
    assert!(matches!(b.build(), Err(Error::DTypeMismatch { node, .. }) if node == prod));
}

#[test]
fn test_target_dtype_mismatch_rejected() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[4]);
    let y = b.array("y", ScalarDType::Float32, &[1]);
    let am = b.argmax(x);
    b.assign(y, am);
    assert!(matches!(b.build(), Err(Error::DTypeMismatch { lhs: ScalarDType::Float32, rhs: INDEX_DTYPE, .. })));
}

#[test]
fn test_sqrt_of_int_rejected() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Int32, &[4]);
    let y = b.array("y", ScalarDType::Int32, &[1]);
    let r = b.unary(UnaryOp::Sqrt, x);
    let s = b.sum(r);
    b.assign(y, s);
    assert_eq!(b.build(), Err(Error::InvalidUnaryDType { op: UnaryOp::Sqrt, dtype: ScalarDType::Int32 }));
}

#[test]
fn test_assign_as_operand_rejected() {
    let mut b = ExpressionTree::builder();
    let x = b.array("x", ScalarDType::Float32, &[4]);
    let y = b.array("y", ScalarDType::Float32, &[1]);
    let s = b.sum(x);
    let stmt = b.assign(y, s);
    let z = b.array("z", ScalarDType::Float32, &[1]);
    b.assign(z, stmt);
    assert_eq!(b.build(), Err(Error::MisplacedAssign { node: stmt }));
}

#[test]
fn test_foreign_node_id_rejected() {
    let mut other = ExpressionTree::builder();
    for i in 0..10 {
        other.array(format!("pad{i}"), ScalarDType::Float32, &[1]);
    }
    let foreign = other.array("far", ScalarDType::Float32, &[4]);

    let mut b = ExpressionTree::builder();
    let y = b.array("y", ScalarDType::Float32, &[1]);
    let s = b.sum(foreign);
    b.assign(y, s);
    assert_eq!(b.build(), Err(Error::UnknownNode { node: foreign }));
}
