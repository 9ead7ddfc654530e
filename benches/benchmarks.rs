use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bwamem_rust::align::{self, KswBuffer, MemOpt, SmemIterator};
use bwamem_rust::index::{sa, MemIndex};
use bwamem_rust::io::SeqRecord;
use bwamem_rust::util::dna;

fn make_reference(len: usize) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = 42;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(bases[(x >> 16) as usize % 4]);
    }
    seq
}

fn build_index(seq: &[u8]) -> MemIndex {
    let rec = SeqRecord {
        name: "bench".to_string(),
        comment: None,
        seq: seq.to_vec(),
        qual: None,
    };
    MemIndex::from_records(&[rec], 128).unwrap()
}

fn bench_backward_search(c: &mut Criterion) {
    let reference = make_reference(10_000);
    let idx = build_index(&reference);
    let pattern = dna::encode_seq(&reference[100..120]);

    c.bench_function("backward_search_20bp", |b| {
        b.iter(|| {
            black_box(idx.fm.backward_search(black_box(&pattern)));
        })
    });
}

fn bench_smem_iteration(c: &mut Criterion) {
    let reference = make_reference(10_000);
    let idx = build_index(&reference);
    let query = dna::encode_seq(&reference[500..600]);
    let mut itr = SmemIterator::new(&idx.fm);

    c.bench_function("smem_iteration_100bp", |b| {
        b.iter(|| {
            itr.set_query(black_box(&query));
            let mut n = 0usize;
            while let Some(batch) = itr.next_batch(32, 1) {
                n += batch.len();
            }
            black_box(n);
        })
    });
}

fn bench_banded_extend(c: &mut Criterion) {
    let opt = MemOpt::default();
    let mat = opt.scmat();
    let query = dna::encode_seq(&make_reference(100));
    let mut target = query.clone();
    target[50] = dna::comp_code(target[50]); // 制造一个错配
    let mut buf = KswBuffer::new();

    c.bench_function("banded_extend_100bp", |b| {
        b.iter(|| {
            black_box(align::ksw::extend(
                black_box(&query),
                black_box(&target),
                &mat,
                opt.q,
                opt.r,
                opt.w,
                10,
                &mut buf,
            ));
        })
    });
}

fn bench_align_read(c: &mut Criterion) {
    let reference = make_reference(10_000);
    let idx = build_index(&reference);
    let opt = MemOpt {
        min_intv: 1,
        ..MemOpt::default()
    };
    let mat = opt.scmat();
    let query = dna::encode_seq(&reference[2000..2100]);
    let mut itr = SmemIterator::new(&idx.fm);
    let mut buf = KswBuffer::new();

    c.bench_function("align_read_100bp", |b| {
        b.iter(|| {
            black_box(align::align_read_regions(
                &opt,
                &mat,
                &idx,
                &mut itr,
                black_box(&query),
                &mut buf,
            ));
        })
    });
}

fn bench_build_sa(c: &mut Criterion) {
    let reference = make_reference(10_000);
    let text: Vec<u8> = reference
        .iter()
        .map(|&b| dna::encode_base(b) + 1)
        .chain(std::iter::once(0u8))
        .collect();

    c.bench_function("build_sa_10k", |b| {
        b.iter(|| {
            black_box(sa::build_sa(black_box(&text)));
        })
    });
}

criterion_group!(
    benches,
    bench_backward_search,
    bench_smem_iteration,
    bench_banded_extend,
    bench_align_read,
    bench_build_sa
);
criterion_main!(benches);
