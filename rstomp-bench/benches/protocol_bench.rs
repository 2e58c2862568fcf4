//! Protocol encoding/decoding benchmarks.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rstomp_protocol::{Decoder, Frame, Message, SendFrame, Serializer, StompCodec};

fn create_send(payload_size: usize) -> Message {
    SendFrame::new("/queue/bench", "x".repeat(payload_size), Some("42".to_string()))
        .unwrap()
        .into()
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let frame = create_send(size).marshal();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let encoded = create_send(size).marshal().encode();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| black_box(Frame::decode(encoded).unwrap()));
        });
    }

    group.finish();
}

fn bench_message_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_serialize");
    let codec = StompCodec::new();

    for size in [100, 1000, 10000] {
        let message = create_send(size);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("uncached", size), &message, |b, message| {
            b.iter(|| black_box(codec.encode(message).unwrap()));
        });

        message.serialize(&codec).unwrap();
        group.bench_with_input(BenchmarkId::new("cached", size), &message, |b, message| {
            b.iter(|| black_box(message.serialize(&codec).unwrap()));
        });
    }

    group.finish();
}

fn bench_stream_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_decode");
    let codec = StompCodec::new();

    for count in [1, 10, 100] {
        let mut stream = BytesMut::new();
        for i in 0..count {
            let receipt: Message = rstomp_protocol::ReceiptFrame::new(i.to_string())
                .unwrap()
                .into();
            stream.extend_from_slice(&codec.encode(&receipt).unwrap());
            stream.extend_from_slice(b"\n");
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &stream, |b, stream| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(stream);
                while let Some(message) = decoder.decode_message().unwrap() {
                    black_box(message);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_message_serialize,
    bench_stream_decode,
);

criterion_main!(benches);
