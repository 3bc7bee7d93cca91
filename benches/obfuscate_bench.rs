//! Benchmarks for identifier obfuscation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pbs_snapshot::obfuscate::{extract_identifiers, IdKind, ObfuscationMap, Obfuscator};

/// `qstat -f` style text with `jobs` jobs spread over `users` owners
fn sample_qstat(jobs: usize, users: usize) -> String {
    let mut text = String::new();
    for j in 0..jobs {
        let u = j % users;
        text.push_str(&format!(
            "Job Id: {j}.head01\n    Job_Name = run_{j}\n    Job_Owner = user{u}@head01\n    \
             euser = user{u}\n    egroup = group{g}\n    queue = workq\n    \
             Resource_List.ncpus = 4\n    comment = Job run at Mon Jan 01 by user{u}\n\n",
            j = j,
            u = u,
            g = u % 7
        ));
    }
    text
}

/// Benchmark scanning attribute lines for identifiers
fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_identifiers");
    for jobs in [100usize, 1_000, 10_000] {
        let text = sample_qstat(jobs, 50);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(jobs), &text, |b, text| {
            b.iter(|| extract_identifiers(black_box(text)));
        });
    }
    group.finish();
}

/// Benchmark the single-pass rewrite with growing maps
fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite_text");
    let text = sample_qstat(5_000, 500);
    group.throughput(Throughput::Bytes(text.len() as u64));

    for users in [10usize, 100, 500] {
        let ids = (0..users)
            .map(|u| (IdKind::User, format!("user{}", u)))
            .chain((0..7).map(|g| (IdKind::Group, format!("group{}", g))));
        let obfuscator = Obfuscator::new(ObfuscationMap::build(ids)).unwrap();

        group.bench_with_input(BenchmarkId::new("map_size", users), &text, |b, text| {
            b.iter(|| obfuscator.rewrite_text(black_box(text)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract, bench_rewrite);
criterion_main!(benches);
