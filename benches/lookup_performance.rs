// benches/lookup_performance.rs
//! Benchmarks for descriptor scoring, best-match lookup and document loading.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use facility_overrides::{
    AssemblyDescriptor, AssemblyIdentity, CodedError, DebugModeStore, FacilityId,
    FacilityOverrideStore, HResult, LoadOverrides, OverrideEntry, PublicKeyToken, SourceFormat, Version,
};
use std::sync::Arc;

fn signed_identity(name: &str) -> AssemblyIdentity {
    AssemblyIdentity::new(name, Version::new(4, 2, 1, 0))
        .with_culture("en-US")
        .with_public_key_token(PublicKeyToken::new([0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89]))
}

fn populated_store(size: usize) -> FacilityOverrideStore {
    let store = FacilityOverrideStore::new();
    let entries = (0..size).map(|i| {
        OverrideEntry::new(
            AssemblyDescriptor::named(format!("Acme.Component{i}")),
            FacilityId::new((i % 2048) as u16),
        )
    });
    store.add_range(entries).unwrap();
    store.add(AssemblyDescriptor::any(), FacilityId::new(1)).unwrap();
    store
}

// ============================================================================
// SCORING BENCHMARKS
// ============================================================================

fn bench_match_score(c: &mut Criterion) {
    let identity = signed_identity("Acme.Widgets");
    let mut group = c.benchmark_group("match_score");

    let cases = [
        ("wildcard", AssemblyDescriptor::any()),
        ("name_only", AssemblyDescriptor::named("acme.widgets")),
        (
            "fully_specified",
            AssemblyDescriptor::parse(
                "Acme.Widgets, Version=4.2.1.0, Culture=en-US, PublicKeyToken=b77a5c561934e089",
            )
            .unwrap(),
        ),
        ("name_mismatch", AssemblyDescriptor::named("Other.Lib")),
    ];

    for (label, descriptor) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(label), descriptor, |b, d| {
            b.iter(|| black_box(d.match_score(black_box(&identity))))
        });
    }

    group.finish();
}

fn bench_non_ascii_names(c: &mut Criterion) {
    let identity = AssemblyIdentity::new("Ärger.Straße", Version::new(1, 0, 0, 0));
    let descriptor = AssemblyDescriptor::named("ÄRGER.STRASSE");

    c.bench_function("match_score_non_ascii", |b| {
        b.iter(|| black_box(descriptor.match_score(black_box(&identity))))
    });
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("descriptor_parse", |b| {
        b.iter(|| {
            AssemblyDescriptor::parse(black_box(
                "Acme.Widgets, Version=4.2.1.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            ))
        })
    });
}

// ============================================================================
// LOOKUP BENCHMARKS
// ============================================================================

fn bench_best_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("try_get_best_match");

    for size in [10, 100, 1000] {
        let store = populated_store(size);
        let hit = signed_identity(&format!("Acme.Component{}", size / 2));
        let miss = signed_identity("Unlisted.Assembly");

        group.bench_with_input(BenchmarkId::new("hit", size), &hit, |b, identity| {
            b.iter(|| black_box(store.try_get_best_match(identity).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("wildcard_fallback", size), &miss, |b, identity| {
            b.iter(|| black_box(store.try_get_best_match(identity).unwrap()))
        });
    }

    group.finish();
}

fn bench_contended_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_lookup");

    for thread_count in [2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(thread_count),
            &thread_count,
            |b, &threads| {
                let store = Arc::new(populated_store(100));
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|i| {
                            let store = Arc::clone(&store);
                            std::thread::spawn(move || {
                                let identity = signed_identity(&format!("Acme.Component{i}"));
                                for _ in 0..250 {
                                    black_box(store.try_get_best_match(&identity).unwrap());
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_upsert(c: &mut Criterion) {
    c.bench_function("add_existing_descriptor", |b| {
        let store = DebugModeStore::new();
        for i in 0..100 {
            store.add(AssemblyDescriptor::named(format!("Acme.Component{i}")), false).unwrap();
        }
        let descriptor = AssemblyDescriptor::named("acme.component99");
        b.iter(|| store.add(black_box(descriptor.clone()), true).unwrap())
    });
}

// ============================================================================
// LOADER & RENDERING BENCHMARKS
// ============================================================================

fn bench_load_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_document");

    let xml = {
        let mut doc = String::from("<debugModes>");
        for i in 0..100 {
            doc.push_str(&format!(r#"<assembly assemblyName="Acme.Component{i}, Version=1.0" isEnabled="{}" />"#, i % 2 == 0));
        }
        doc.push_str("</debugModes>");
        doc
    };
    let json = {
        let items: Vec<String> = (0..100)
            .map(|i| format!(r#"{{"assemblyName":"Acme.Component{i}, Version=1.0","isEnabled":{}}}"#, i % 2 == 0))
            .collect();
        format!("[{}]", items.join(","))
    };

    group.bench_function("xml_100", |b| {
        b.iter(|| {
            let store = DebugModeStore::new();
            store.load_str(black_box(&xml), SourceFormat::Xml).unwrap()
        })
    });
    group.bench_function("json_100", |b| {
        b.iter(|| {
            let store = DebugModeStore::new();
            store.load_str(black_box(&json), SourceFormat::Json).unwrap()
        })
    });

    group.finish();
}

fn bench_coded_error(c: &mut Criterion) {
    let facilities = populated_store(100);
    let debug = DebugModeStore::new();
    let identity = signed_identity("Acme.Component42");

    c.bench_function("coded_error_resolve", |b| {
        b.iter(|| {
            CodedError::resolve_with(&facilities, &debug, black_box(&identity), 7, "lookup failed", FacilityId::new(0))
        })
    });

    let err = CodedError::new(HResult::compose(FacilityId::new(42), 7), "lookup failed")
        .with_detail("x".repeat(4096));
    c.bench_function("diagnostic_log_write", |b| {
        b.iter(|| {
            let mut buffer = String::with_capacity(2048);
            err.diagnostic_log().write_to(&mut buffer).unwrap();
            black_box(buffer)
        })
    });
}

// ============================================================================
// BENCHMARK GROUPS
// ============================================================================

criterion_group!(
    scoring_benches,
    bench_match_score,
    bench_non_ascii_names,
    bench_parse,
);

criterion_group!(
    lookup_benches,
    bench_best_match,
    bench_contended_lookup,
    bench_upsert,
);

criterion_group!(
    loader_benches,
    bench_load_documents,
    bench_coded_error,
);

criterion_main!(scoring_benches, lookup_benches, loader_benches);
