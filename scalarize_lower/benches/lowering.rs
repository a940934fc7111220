//! Scalar Lowering Benchmarks
//!
//! # Benchmark Categories
//!
//! 1. **Per Shape**: one binary operation chain per lane shape
//! 2. **Repartitioning**: values crossing shapes at every step
//! 3. **Module Size**: sequential vs parallel over many functions

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use scalarize_ir::{
    FuncIndex, FunctionBuilder, Module, Shape, SimdBinOp, SimdCmpOp, Signature, ValueType,
};
use scalarize_lower::{LoweringConfig, ScalarLowering};

// =============================================================================
// Benchmark Helpers
// =============================================================================

/// `depth` chained binary operations in one shape.
fn chain(shape: Shape, depth: usize) -> Module {
    let sig = Signature::new(&[ValueType::Simd128, ValueType::Simd128], &[ValueType::Simd128]);
    let mut b = FunctionBuilder::new(sig);
    let (x, y) = (b.param(0), b.param(1));
    let op = if shape.is_float() {
        SimdBinOp::Mul
    } else {
        SimdBinOp::Add
    };
    let mut acc = x;
    for _ in 0..depth {
        acc = b.simd_binary(shape, op, acc, y);
    }
    let mut module = Module::new();
    module.add_function(b.finish_function("chain", &[acc]));
    module
}

/// Alternates shapes so every step needs a fresh view.
fn zigzag(depth: usize) -> Module {
    let sig = Signature::new(&[ValueType::Simd128, ValueType::Simd128], &[ValueType::Simd128]);
    let mut b = FunctionBuilder::new(sig);
    let (x, y) = (b.param(0), b.param(1));
    let mut acc = x;
    for step in 0..depth {
        acc = match step % 3 {
            0 => b.simd_binary(Shape::I8X16, SimdBinOp::Add, acc, y),
            1 => b.simd_compare(Shape::I16X8, SimdCmpOp::GtS, acc, y),
            _ => b.simd_binary(Shape::F32X4, SimdBinOp::Max, acc, y),
        };
    }
    let mut module = Module::new();
    module.add_function(b.finish_function("zigzag", &[acc]));
    module
}

/// Many functions, each calling the previous one.
fn call_tree(functions: usize) -> Module {
    let sig = Signature::new(&[ValueType::Simd128], &[ValueType::Simd128]);
    let mut module = Module::new();
    for index in 0..functions {
        let mut b = FunctionBuilder::new(sig.clone());
        let x = b.param(0);
        let mut acc = b.simd_binary(Shape::I16X8, SimdBinOp::Sub, x, x);
        if index > 0 {
            acc = b.call(FuncIndex(index as u32 - 1), &sig, &[acc])[0];
        }
        let out = b.simd_binary(Shape::I8X16, SimdBinOp::MaxU, acc, x);
        module.add_function(b.finish_function(format!("f{index}"), &[out]));
    }
    module
}

fn run(pass: &ScalarLowering, module: Module) -> Module {
    let mut module = module;
    pass.lower_module(&mut module).expect("lowering succeeds");
    module
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_per_shape(c: &mut Criterion) {
    let mut group = c.benchmark_group("per_shape");
    let pass = ScalarLowering::new(LoweringConfig::default()).unwrap();

    for shape in Shape::ALL {
        let module = chain(shape, 64);
        group.throughput(Throughput::Elements(64));
        group.bench_with_input(BenchmarkId::from_parameter(shape), &module, |b, module| {
            b.iter_batched(
                || module.clone(),
                |m| black_box(run(&pass, m)),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_repartition(c: &mut Criterion) {
    let mut group = c.benchmark_group("repartition");
    let checked = ScalarLowering::new(LoweringConfig::checked()).unwrap();
    let fast = ScalarLowering::new(LoweringConfig {
        parallel: false,
        ..LoweringConfig::fast()
    })
    .unwrap();

    let module = zigzag(60);
    group.bench_function("checked", |b| {
        b.iter_batched(
            || module.clone(),
            |m| black_box(run(&checked, m)),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("unverified", |b| {
        b.iter_batched(
            || module.clone(),
            |m| black_box(run(&fast, m)),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_module_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("module_size");
    let sequential = ScalarLowering::new(LoweringConfig::default()).unwrap();
    let parallel = ScalarLowering::new(LoweringConfig {
        parallel: true,
        ..Default::default()
    })
    .unwrap();

    for functions in [8, 64, 256] {
        let module = call_tree(functions);
        group.throughput(Throughput::Elements(functions as u64));
        group.bench_with_input(BenchmarkId::new("sequential", functions), &module, |b, m| {
            b.iter_batched(
                || m.clone(),
                |m| black_box(run(&sequential, m)),
                BatchSize::LargeInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("parallel", functions), &module, |b, m| {
            b.iter_batched(
                || m.clone(),
                |m| black_box(run(&parallel, m)),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_per_shape, bench_repartition, bench_module_size);
criterion_main!(benches);
