use bytes::{Bytes, BytesMut};
use courier_protocol::{codec, Frame};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [64usize, 1024, 16 * 1024] {
        let frame = Frame::message(7, 1_700_000_000_000, Bytes::from(vec![0xAB; size]));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("message_{size}b"), |b| {
            b.iter(|| codec::encode(black_box(&frame)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [64usize, 1024, 16 * 1024] {
        let frame = Frame::message(7, 1_700_000_000_000, Bytes::from(vec![0xAB; size]));
        let encoded = codec::encode(&frame).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("message_{size}b"), |b| {
            b.iter(|| {
                let mut buf = BytesMut::from(&encoded[..]);
                codec::decode_from(black_box(&mut buf)).unwrap().unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
