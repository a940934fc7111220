//! End-to-end lowering of small vector programs.
//!
//! Every program runs in the interpreter as built and again after lowering;
//! both runs must produce the expected result.

mod common;

use common::{assert_agrees, call, lower};
use scalarize_ir::{
    FuncIndex, FunctionBuilder, GlobalAccess, Interpreter, Module, Shape, SimdBinOp, SimdCmpOp,
    SimdUnOp, Signature, Value, ValueType,
};

use ValueType::{Float32 as F32, Int32 as I32, Simd128 as S128};

fn single(function: scalarize_ir::Function) -> (Module, FuncIndex) {
    let mut module = Module::new();
    let index = module.add_function(function);
    (module, index)
}

fn expect(module: &Module, function: FuncIndex, args: &[Value], expected: Value) {
    let lowered = assert_agrees(module, function, args);
    assert!(lowered.functions().iter().all(|f| f.signature.is_scalar()));
    assert!(lowered.functions().iter().all(|f| !f.graph.contains_vectors()));
    let result = call(&lowered, function, args);
    assert_eq!(result.len(), 1);
    assert!(result[0].bit_eq(&expected), "got {:?}", result[0]);
}

#[test]
fn test_i8x16_splat_to_f32x4_sqrt_global() {
    let mut module = Module::new();
    let global = module.add_global(S128);

    let mut b = FunctionBuilder::new(Signature::new(&[I32], &[I32]));
    let p = b.param(0);
    let bytes = b.splat(Shape::I8X16, p);
    let root = b.simd_unary(Shape::F32X4, SimdUnOp::Sqrt, bytes);
    b.global_set(GlobalAccess::new(global, 0), root);
    let one = b.i32_const(1);
    let main = module.add_function(b.finish_function("main", &[one]));

    let expected = f32::from_bits(0x5b5b_5b5b).sqrt();
    let mut reference = Interpreter::new(&module);
    reference.call(main, &[Value::I32(0x5b)]).unwrap();
    assert_eq!(
        reference.read_global(global, 0, F32).and_then(|v| v.as_f32()),
        Some(expected)
    );
    let reference_bytes = reference.global_bytes(global).map(<[u8]>::to_vec);

    lower(&mut module);
    let mut interp = Interpreter::new(&module);
    assert_eq!(
        interp.call(main, &[Value::I32(0x5b)]).unwrap(),
        vec![Value::I32(1)]
    );
    assert_eq!(
        interp.read_global(global, 0, F32).and_then(|v| v.as_f32()),
        Some(expected)
    );
    assert_eq!(reference_bytes.as_deref(), interp.global_bytes(global));
}

#[test]
fn test_f32x4_call_return() {
    let vec_sig = Signature::new(&[S128], &[S128]);
    let mut module = Module::new();

    let mut neg = FunctionBuilder::new(vec_sig.clone());
    let x = neg.param(0);
    let negated = neg.simd_unary(Shape::F32X4, SimdUnOp::Neg, x);
    let callee = module.add_function(neg.finish_function("neg", &[negated]));

    let mut b = FunctionBuilder::new(Signature::new(&[F32], &[F32]));
    let p = b.param(0);
    let v = b.splat(Shape::F32X4, p);
    let ret = b.call(callee, &vec_sig, &[v]);
    let lane = b.extract_lane(Shape::F32X4, 0, ret[0]);
    let main = module.add_function(b.finish_function("main", &[lane]));

    expect(&module, main, &[Value::F32(1.0)], Value::F32(-1.0));
}

fn add_through_call(shape: Shape) -> (Module, FuncIndex) {
    let add_sig = Signature::new(&[S128, S128], &[S128]);
    let mut module = Module::new();

    let mut add = FunctionBuilder::new(add_sig.clone());
    let (x, y) = (add.param(0), add.param(1));
    let sum = add.simd_binary(shape, SimdBinOp::Add, x, y);
    let callee = module.add_function(add.finish_function("add", &[sum]));

    let mut b = FunctionBuilder::new(Signature::new(&[I32], &[I32]));
    let p = b.param(0);
    let a = b.splat(shape, p);
    let c = b.splat(shape, p);
    let ret = b.call(callee, &add_sig, &[a, c]);
    let lane = b.extract_lane(shape, 0, ret[0]);
    let main = module.add_function(b.finish_function("main", &[lane]));
    (module, main)
}

#[test]
fn test_i8x16_call_return() {
    let (module, main) = add_through_call(Shape::I8X16);
    expect(&module, main, &[Value::I32(1)], Value::I32(2));
}

#[test]
fn test_i16x8_call_return() {
    let (module, main) = add_through_call(Shape::I16X8);
    expect(&module, main, &[Value::I32(1)], Value::I32(2));
}

#[test]
fn test_i8x16_eq_of_constants() {
    let c1 = [
        0x00, 0x00, 0x80, 0xbf, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00,
        0x40,
    ];
    let c2 = [
        0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x02,
        0x02,
    ];
    let c3 = [
        0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00,
    ];

    let mut b = FunctionBuilder::new(Signature::new(&[], &[I32]));
    let (k1, k2) = (b.v128_const(c1), b.v128_const(c2));
    let first = b.simd_compare(Shape::I8X16, SimdCmpOp::Eq, k1, k2);
    let k3 = b.v128_const(c3);
    let second = b.simd_compare(Shape::I8X16, SimdCmpOp::Eq, first, k3);
    let lane = b.extract_lane(Shape::I8X16, 4, second);
    let (module, main) = single(b.finish_function("main", &[lane]));

    expect(&module, main, &[], Value::I32(0xffff_ffffu32 as i32));
}

#[test]
fn test_f32x4_min_of_constants() {
    // (1.0, 2.0, 3.0, 4.0) and (5.0, 6.0, 7.0, 8.0)
    let c1 = [
        0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x40, 0x40, 0x00, 0x00, 0x80,
        0x40,
    ];
    let c2 = [
        0x00, 0x00, 0xa0, 0x40, 0x00, 0x00, 0xc0, 0x40, 0x00, 0x00, 0xe0, 0x40, 0x00, 0x00, 0x00,
        0x41,
    ];

    let mut b = FunctionBuilder::new(Signature::new(&[], &[F32]));
    let (k1, k2) = (b.v128_const(c1), b.v128_const(c2));
    let min = b.simd_binary(Shape::F32X4, SimdBinOp::Min, k1, k2);
    let lane = b.extract_lane(Shape::F32X4, 0, min);
    let (module, main) = single(b.finish_function("main", &[lane]));

    expect(&module, main, &[], Value::F32(1.0));
}

fn reduce_splat(reduce_shape: Shape, all: bool) -> (Module, FuncIndex) {
    let mut b = FunctionBuilder::new(Signature::new(&[I32], &[I32]));
    let p = b.param(0);
    let v = b.splat(Shape::I32X4, p);
    let r = if all {
        b.all_true(reduce_shape, v)
    } else {
        b.any_true(reduce_shape, v)
    };
    single(b.finish_function("main", &[r]))
}

#[test]
fn test_all_true_across_shapes() {
    let (module, main) = reduce_splat(Shape::I8X16, true);
    expect(&module, main, &[Value::I32(0x00ff_00ff)], Value::I32(0));

    let (module, main) = reduce_splat(Shape::I16X8, true);
    expect(&module, main, &[Value::I32(0x0000_00ff)], Value::I32(0));

    let (module, main) = reduce_splat(Shape::I16X8, true);
    expect(&module, main, &[Value::I32(0x0001_00ff)], Value::I32(1));
}

#[test]
fn test_any_true_across_shapes() {
    let (module, main) = reduce_splat(Shape::I8X16, false);
    expect(&module, main, &[Value::I32(0)], Value::I32(0));

    let (module, main) = reduce_splat(Shape::I16X8, false);
    expect(&module, main, &[Value::I32(0x0000_00ff)], Value::I32(1));
}
