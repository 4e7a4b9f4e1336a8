use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use chatstream::stream::{decode_frame, Frame, FrameAssembler, FramingPolicy};

fn openai_delta_body(tokens: usize) -> String {
    let mut body = String::from("event: start\ndata: {\"model\":\"m\"}\n\n");
    for idx in 0..tokens {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"tok{idx} \"}}}}]}}\n\n"
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn tool_bundle_frame() -> Frame {
    Frame::token(
        r#"{"content":"checking","tool_calls":[{"id":"t1","type":"function","function":{"name":"get_weather","arguments":"{\"city\":\"SF\"}"}}],"tool_execution_results":[{"tool_call_id":"t1","result":{"temp":18}}]}"#,
    )
}

fn bench_assemble(c: &mut Criterion) {
    let body = openai_delta_body(512);
    let mut group = c.benchmark_group("assemble");
    group.throughput(Throughput::Bytes(body.len() as u64));
    for chunk_size in [16usize, 256, 4096] {
        let chunks: Vec<&str> = body
            .as_bytes()
            .chunks(chunk_size)
            .map(|chunk| std::str::from_utf8(chunk).expect("ascii body"))
            .collect();
        for policy in [FramingPolicy::Eager, FramingPolicy::Strict] {
            group.bench_with_input(
                BenchmarkId::new(format!("{policy:?}"), chunk_size),
                &chunks,
                |b, chunks| {
                    let mut frames = Vec::with_capacity(600);
                    b.iter(|| {
                        let mut assembler = FrameAssembler::with_policy(policy);
                        frames.clear();
                        for chunk in chunks {
                            assembler.feed_into(black_box(chunk), &mut frames);
                        }
                        frames.extend(assembler.flush());
                        black_box(frames.len());
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let delta = Frame::token(r#"{"choices":[{"index":0,"delta":{"content":"hello"}}]}"#);
    c.bench_function("decode_openai_delta", |b| {
        b.iter(|| black_box(decode_frame(black_box(&delta))));
    });

    let escaped = Frame::token(r#""{\"content\":\"caf\\u00e9\"}""#);
    c.bench_function("decode_double_encoded", |b| {
        b.iter(|| black_box(decode_frame(black_box(&escaped))));
    });

    let bundle = tool_bundle_frame();
    c.bench_function("decode_tool_bundle", |b| {
        b.iter(|| black_box(decode_frame(black_box(&bundle))));
    });

    let bare = Frame::token("plain text that is not json");
    c.bench_function("decode_bare_text", |b| {
        b.iter(|| black_box(decode_frame(black_box(&bare))));
    });
}

criterion_group!(benches, bench_assemble, bench_decode);
criterion_main!(benches);
