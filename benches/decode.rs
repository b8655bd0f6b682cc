use criterion::{black_box, criterion_group, criterion_main, Criterion};

use codestream_rs::fenced::{split_message, FencedDecoder};
use codestream_rs::fields::FieldStreamDecoder;

fn make_fields_payload(files: usize, code_len: usize) -> String {
    let code = "let x = 1;\\n".repeat(code_len / 12 + 1);
    let mut out = String::from(r#"{"Text":"Here are the changes.","Files":["#);
    for i in 0..files {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!(
            r#"{{"FileName":"src/f{i}.rs","FileVersion":{i},"FileCode":"{code}","FileText":"done"}}"#
        ));
    }
    out.push_str(r#"],"tool_before_conclusion":{"tool_name":"search","query":"x"},"Conclusion":"ok"}"#);
    out
}

fn make_markdown(blocks: usize) -> String {
    let mut out = String::new();
    for i in 0..blocks {
        out.push_str(&format!("Step {i} uses `value_{i}` here.\n\n```rust\n"));
        out.push_str(&"fn main() { println!(\"hi\"); }\n".repeat(16));
        out.push_str("```\n\n");
    }
    out
}

fn split_chunks(input: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < input.len() {
        let mut end = (start + size).min(input.len());
        while !input.is_char_boundary(end) {
            end += 1;
        }
        chunks.push(&input[start..end]);
        start = end;
    }
    chunks
}

fn bench_field_decoder(c: &mut Criterion) {
    let payload = make_fields_payload(4, 4096);
    let chunks = split_chunks(&payload, 16);

    c.bench_function("fields_single_chunk_16k", |b| {
        b.iter(|| {
            let mut decoder = FieldStreamDecoder::new();
            black_box(decoder.process_chunk(black_box(&payload)));
        });
    });

    c.bench_function("fields_16b_chunks_16k", |b| {
        b.iter(|| {
            let mut decoder = FieldStreamDecoder::new();
            for chunk in &chunks {
                black_box(decoder.process_chunk(black_box(chunk)));
            }
        });
    });
}

fn bench_fenced_decoder(c: &mut Criterion) {
    let markdown = make_markdown(32);
    let boundaries: Vec<usize> = split_chunks(&markdown, 32)
        .iter()
        .scan(0, |end, chunk| {
            *end += chunk.len();
            Some(*end)
        })
        .collect();

    c.bench_function("fenced_cumulative_32b_steps", |b| {
        b.iter(|| {
            let mut decoder = FencedDecoder::new();
            for &end in &boundaries {
                black_box(decoder.parse(black_box(&markdown[..end])));
            }
            black_box(decoder.finish().len());
        });
    });

    c.bench_function("fenced_split_message", |b| {
        b.iter(|| black_box(split_message(black_box(&markdown))));
    });
}

criterion_group!(benches, bench_field_decoder, bench_fenced_decoder);
criterion_main!(benches);
