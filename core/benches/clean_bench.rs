use criterion::{criterion_group, criterion_main, Criterion};
use dreamcore::clean::clean_text;

fn bench_clean(c: &mut Criterion) {
    let text = "I was standing on the roof and suddenly realised I could lift off \u{2014} \u{201C}this is a dream\u{201D}, I thought, and flew over the caf\u{00E9}s. ".repeat(40);
    c.bench_function("clean_report", |b| b.iter(|| clean_text(&text)));
}

criterion_group!(benches, bench_clean);
criterion_main!(benches);
