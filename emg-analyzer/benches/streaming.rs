// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

use std::io::Write;

use criterion::{criterion_group, criterion_main, Criterion};
use emg_analyzer::{probe_file, stream_max_mean, CancellationToken, StreamConfig};

fn fixture() -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "time,ch1,ch2,ch3,ch4").unwrap();
    for i in 0..50_000usize {
        let t = i as f64 * 0.001;
        let v = (i.wrapping_mul(2_654_435_761) % 10_000) as f64;
        writeln!(f, "{t},{v},{v},{v},{v}").unwrap();
    }
    f.flush().unwrap();
    f
}

fn bench_stream_max_mean(c: &mut Criterion) {
    let f = fixture();
    let config = StreamConfig::default();
    let info = probe_file(f.path(), ',', &config).unwrap();

    c.bench_function("stream_max_mean", |b| {
        b.iter(|| stream_max_mean(&info, ',', 1000, 0, &config, None, &CancellationToken::new()).unwrap())
    });
}

criterion_group!(benches, bench_stream_max_mean);
criterion_main!(benches);
