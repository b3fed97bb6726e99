use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

// The store lives in the binary crate, so this rebuilds its write and
// recovery paths from the public library APIs.
use aolog::{LogWriter, Record};
use index::Index;

const N: usize = 1_000;
const VAL_SIZE: usize = 100;

fn store_set(c: &mut Criterion) {
    c.bench_function("store_set_durable_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let w = LogWriter::open(dir.path().join("data.db")).unwrap();
                (dir, w, Index::new())
            },
            |(_dir, mut w, mut idx)| {
                for i in 0..N {
                    let record = Record::new(format!("k{}", i % 100), "x".repeat(VAL_SIZE));
                    w.append(&record).unwrap();
                    idx.set(record.key, record.value);
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn store_recover(c: &mut Criterion) {
    c.bench_function("store_recover_10k_records", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("data.db");
                let mut body = String::new();
                for i in 0..10 * N {
                    body.push_str(&Record::new(format!("k{}", i % 500), format!("v{}", i)).encode());
                }
                std::fs::write(&path, body).unwrap();
                (dir, path)
            },
            |(_dir, path)| {
                let mut w = LogWriter::open(&path).unwrap();
                let mut idx = Index::new();
                w.replay_reader()
                    .unwrap()
                    .replay(|r| {
                        idx.set(r.key, r.value);
                    })
                    .unwrap();
                w.ensure_line_boundary().unwrap();
                assert_eq!(idx.len(), 500);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, store_set, store_recover);
criterion_main!(benches);
