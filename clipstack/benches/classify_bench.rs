use criterion::{criterion_group, criterion_main, Criterion};

use clipstack::content_detection::classify;

fn bench_classify(c: &mut Criterion) {
    let long_prose = "The quick brown fox jumps over the lazy dog. ".repeat(100);
    let inputs = vec![
        ("url", "https://github.com/rust-lang/rust/pull/12345"),
        ("bare_domain", "crates.io.example.com"),
        ("file_path", "/Users/dev/Projects/clipstack/src/lib.rs"),
        ("json", r#"{"name": "clipstack", "version": "0.1.0"}"#),
        ("markdown", "# Release notes\n\n**Breaking** changes below"),
        ("code", "const handler = function () { return 42; }"),
        ("color", "#FF5733"),
        ("prose", "Meeting moved to Thursday at 3pm, same room as last time."),
        ("long_prose", long_prose.as_str()),
    ];

    let mut group = c.benchmark_group("classify");
    for (name, input) in inputs {
        group.bench_function(name, |b| {
            b.iter(|| classify(input));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
