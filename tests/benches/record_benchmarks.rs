//! # Task Record Benchmarks
//!
//! | Operation | Target |
//! |-----------|--------|
//! | Record decode | < 10µs |
//! | Locking script build | < 10µs |
//! | Create + complete round trip (in-process) | < 5ms |

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use task_tokens::algorithms::build_locking_script;
use task_tokens::{
    decode_record, encode_fields, LocalSigningService, SigningService, TaskListApi,
    TaskTokenConfig, TaskTokenService,
};

fn bench_record_codec(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let wallet = LocalSigningService::for_testing();
    let context = TaskTokenConfig::default().derivation_context();
    let owner = rt
        .block_on(wallet.get_public_key(&context))
        .expect("owner key");

    let mut group = c.benchmark_group("record-codec");
    for size in [16usize, 256, 4096] {
        let ciphertext = vec![0xAB; size];
        let script = build_locking_script(&owner, &encode_fields(&ciphertext));

        group.bench_with_input(BenchmarkId::new("build", size), &ciphertext, |b, ct| {
            b.iter(|| build_locking_script(&owner, black_box(&encode_fields(ct))))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &script, |b, s| {
            b.iter(|| decode_record(black_box(s)))
        });
    }
    group.finish();
}

fn bench_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let wallet = Arc::new(LocalSigningService::for_testing());
    wallet.fund(1_000_000_000).expect("funding");
    let mut service =
        TaskTokenService::new(TaskTokenConfig::default(), Arc::clone(&wallet)).expect("service");

    c.bench_function("create_and_complete", |b| {
        b.iter(|| {
            rt.block_on(async {
                let created = service.create_task("bench", 1).await.expect("create");
                service
                    .complete_task(&created.record.identity)
                    .await
                    .expect("complete")
            })
        })
    });
}

criterion_group!(benches, bench_record_codec, bench_lifecycle);
criterion_main!(benches);
