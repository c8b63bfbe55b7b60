use std::hint::black_box;
use bencher::{multipart_body, TestCase, BOUNDARY};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use micro_body::codec::{MultipartDecoder, PartItem};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("fields_only", multipart_body(32, 0)),
        TestCase::normal("small_file", multipart_body(4, 16 * 1024)),
        TestCase::large("large_file", multipart_body(4, 4 * 1024 * 1024)),
    ]
}

fn decode_all(decoder: &mut MultipartDecoder, bytes: &mut BytesMut) -> usize {
    let mut items = 0;
    while let Some(item) = decoder.decode(bytes).expect("input should be a valid multipart body") {
        items += 1;
        if let PartItem::Chunk(chunk) = item {
            black_box(chunk);
        }
    }
    items
}

fn benchmark_multipart_decoder(criterion: &mut Criterion) {
    let test_cases = create_test_cases();
    let mut group = criterion.benchmark_group("multipart_decoder");

    for case in &test_cases {
        group.throughput(Throughput::Bytes(case.content().len() as u64));
        group.bench_with_input(BenchmarkId::new("whole", case.name()), case, |b, case| {
            b.iter_batched_ref(
                || (MultipartDecoder::new(BOUNDARY), BytesMut::from(case.content())),
                |(decoder, bytes)| black_box(decode_all(decoder, bytes)),
                BatchSize::SmallInput,
            );
        });

        // the way a socket delivers a body
        group.bench_with_input(BenchmarkId::new("8k_slices", case.name()), case, |b, case| {
            b.iter(|| {
                let mut decoder = MultipartDecoder::new(BOUNDARY);
                let mut bytes = BytesMut::new();
                let mut items = 0;
                for slice in case.content().as_bytes().chunks(8 * 1024) {
                    bytes.extend_from_slice(slice);
                    items += decode_all(&mut decoder, &mut bytes);
                }
                black_box(items)
            });
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_multipart_decoder);
criterion_main!(decoder);
