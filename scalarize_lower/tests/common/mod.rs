//! Shared helpers: run a module before and after lowering and compare.

#![allow(dead_code)]

use scalarize_ir::{Extension, FuncIndex, Interpreter, Module, Shape, Signature, V128, Value};
use scalarize_lower::{LoweringConfig, ModuleLoweringStats, ScalarLowering};

/// Lower with the default configuration.
pub fn lower(module: &mut Module) -> ModuleLoweringStats {
    lower_with(module, LoweringConfig::default())
}

pub fn lower_with(module: &mut Module, config: LoweringConfig) -> ModuleLoweringStats {
    ScalarLowering::new(config)
        .expect("valid config")
        .lower_module(module)
        .expect("lowering succeeds")
}

pub fn call(module: &Module, function: FuncIndex, args: &[Value]) -> Vec<Value> {
    Interpreter::new(module)
        .call(function, args)
        .expect("interpreter runs")
}

/// Vector arguments as ABI slots.
pub fn split_args(args: &[Value], abi: Shape) -> Vec<Value> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::V128(bytes) => out.extend(abi.decode(bytes, Extension::Signed)),
            scalar => out.push(*scalar),
        }
    }
    out
}

/// Lowered results regrouped by the original signature.
pub fn join_results(original: &Signature, values: &[Value], abi: Shape) -> Vec<Value> {
    let mut rest = values;
    let mut out = Vec::new();
    for ty in &original.returns {
        if ty.is_vector() {
            let (lanes, tail) = rest.split_at(abi.lanes());
            out.push(Value::V128(abi.encode(lanes)));
            rest = tail;
        } else {
            out.push(rest[0]);
            rest = &rest[1..];
        }
    }
    out
}

/// Run `function` on the module as built and on a lowered copy; both runs
/// must return bit-identical results. Returns the lowered module.
pub fn assert_agrees(module: &Module, function: FuncIndex, args: &[Value]) -> Module {
    assert_agrees_with(module, function, args, LoweringConfig::default())
}

pub fn assert_agrees_with(
    module: &Module,
    function: FuncIndex,
    args: &[Value],
    config: LoweringConfig,
) -> Module {
    let abi = config.abi_shape;
    let expected = call(module, function, args);

    let mut lowered = module.clone();
    lower_with(&mut lowered, config);
    let original = &module.function(function).expect("function exists").signature;
    let raw = call(&lowered, function, &split_args(args, abi));
    let actual = join_results(original, &raw, abi);

    assert_eq!(expected.len(), actual.len());
    for (e, a) in expected.iter().zip(&actual) {
        assert!(e.bit_eq(a), "expected {e:?}, lowered gave {a:?}");
    }
    lowered
}

pub fn v128_i32(lanes: [i32; 4]) -> Value {
    Value::V128(Shape::I32X4.encode(&lanes.map(Value::I32)))
}

pub fn v128_bytes(bytes: V128) -> Value {
    Value::V128(bytes)
}
