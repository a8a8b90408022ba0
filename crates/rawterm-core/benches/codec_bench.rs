//! Criterion benchmarks for the raw-mode packet codec and frame layer.
//!
//! The hot path is the kind-0 repaint: every 50 ms a full grid is
//! run-length encoded, base64 wrapped, and checksummed.  Input packets are
//! tiny but frequent.  These benchmarks keep an eye on both shapes.
//!
//! Run with:
//! ```bash
//! cargo bench --package rawterm-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rawterm_core::protocol::capabilities::Capabilities;
use rawterm_core::protocol::codec::{decode_packet, encode_packet};
use rawterm_core::protocol::crc::crc32;
use rawterm_core::protocol::frame::{decode_frame, encode_frame};
use rawterm_core::protocol::messages::{
    KeyFlags, KeyInput, Packet, PacketBody, RenderMode, Rgb8, ScreenContents, ScreenUpdate,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_key_input() -> Packet {
    Packet {
        window: 0,
        body: PacketBody::KeyInput(KeyInput {
            code: 30,
            flags: KeyFlags(0),
        }),
    }
}

/// A realistic 51×19 text screen: mostly spaces with a few text runs, the
/// shape RLE is designed for.
fn make_screen_update(width: u16, height: u16) -> Packet {
    let cells = width as usize * height as usize;
    let mut chars = vec![b' '; cells];
    for (i, byte) in chars.iter_mut().enumerate().take(cells) {
        if i % 17 == 0 {
            *byte = b'a' + (i % 26) as u8;
        }
    }
    Packet {
        window: 0,
        body: PacketBody::ScreenUpdate(ScreenUpdate {
            mode: RenderMode::Text,
            blink: true,
            width,
            height,
            cursor_x: 1,
            cursor_y: 1,
            grayscale: false,
            contents: ScreenContents::Text {
                chars,
                colors: vec![0xF0; cells],
            },
            palette: (0..16).map(|i| Rgb8::new(i * 16, i * 8, i)).collect(),
        }),
    }
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_packet_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_codec");

    let key = make_key_input();
    group.bench_function("encode_key_input", |b| {
        b.iter(|| encode_packet(black_box(&key)).unwrap());
    });
    let key_bytes = encode_packet(&key).unwrap();
    group.bench_function("decode_key_input", |b| {
        b.iter(|| decode_packet(black_box(&key_bytes)).unwrap());
    });

    for (width, height) in [(51u16, 19u16), (100, 50)] {
        let screen = make_screen_update(width, height);
        let bytes = encode_packet(&screen).unwrap();
        group.bench_with_input(
            BenchmarkId::new("encode_screen", format!("{width}x{height}")),
            &screen,
            |b, packet| b.iter(|| encode_packet(black_box(packet)).unwrap()),
        );
        group.bench_with_input(
            BenchmarkId::new("decode_screen", format!("{width}x{height}")),
            &bytes,
            |b, bytes| b.iter(|| decode_packet(black_box(bytes)).unwrap()),
        );
    }

    group.finish();
}

fn bench_frame_layer(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_layer");
    let caps = Capabilities::new();
    let payload = encode_packet(&make_screen_update(51, 19)).unwrap();

    group.bench_function("crc32_screen_payload", |b| {
        b.iter(|| crc32(black_box(&payload)));
    });
    group.bench_function("encode_frame_screen", |b| {
        b.iter(|| encode_frame(black_box(&payload), &caps).unwrap());
    });
    let frame = encode_frame(&payload, &caps).unwrap();
    group.bench_function("decode_frame_screen", |b| {
        b.iter(|| decode_frame(black_box(&frame), &caps).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_packet_codec, bench_frame_layer);
criterion_main!(benches);
