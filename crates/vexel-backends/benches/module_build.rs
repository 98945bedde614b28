use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vexel_backends::{ensure_module_ready_with, HostContext};
use vexel_codegen::database::{DeviceKind, DeviceProfile, Vendor};
use vexel_codegen::{build_module, ModuleFamily, NumericType, TuningDatabase};

fn device() -> DeviceProfile {
    DeviceProfile::new(Vendor::Amd, DeviceKind::Gpu, "gfx1030", "rx6800").with_double_extension("cl_khr_fp64")
}

fn benchmark_module_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("module_generation");
    let device = device();
    let db = TuningDatabase::builtin();

    for family in ModuleFamily::ALL {
        for numeric in [NumericType::Float, NumericType::Double] {
            let id = BenchmarkId::new(family.to_string(), numeric);
            group.bench_with_input(id, &(family, numeric), |b, &(family, numeric)| {
                b.iter(|| {
                    let module = build_module(family, numeric, &device, &db).unwrap();
                    black_box(module.source.len());
                });
            });
        }
    }

    group.finish();
}

fn benchmark_first_and_cached_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensure_module_ready");
    let db = TuningDatabase::builtin();

    group.bench_function("first_use", |b| {
        b.iter(|| {
            let ctx = HostContext::new(device());
            black_box(ensure_module_ready_with(&ctx, ModuleFamily::Vector, NumericType::Float, &db).unwrap());
        });
    });

    let ctx = HostContext::new(device());
    ensure_module_ready_with(&ctx, ModuleFamily::Vector, NumericType::Float, &db).unwrap();
    group.bench_function("cached", |b| {
        b.iter(|| {
            black_box(ensure_module_ready_with(&ctx, ModuleFamily::Vector, NumericType::Float, &db).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_module_generation, benchmark_first_and_cached_init);
criterion_main!(benches);
