//! Benchmarks for the Whisper retrieval engine.
//!
//! Run with: cargo bench --package wsp
//!
//! Covers the two shapes of a ring read: a contiguous window and a window
//! that wraps past the physical end of the buffer.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tempfile::TempDir;
use wsp::format::{AggregationMethod, ArchiveInfo, Header, Point, POINT_SIZE};
use wsp::WspReader;

/// One week of one-minute points.
const STEP: u32 = 60;
const POINTS: u32 = 10_080;
const BASE: u32 = 1_000_000_020;

fn build_file(path: &Path) -> ArchiveInfo {
    let archive = ArchiveInfo::new(28, STEP, POINTS);
    let header = Header {
        aggregation: AggregationMethod::Average,
        max_retention: STEP * POINTS,
        x_files_factor: 0.5,
        archives: vec![archive],
    };

    let mut file = File::create(path).unwrap();
    header.write_to(&mut file).unwrap();
    file.set_len(archive.end_offset()).unwrap();
    drop(file);

    // Fill every slot with its first-epoch interval.
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(u64::from(archive.offset)))
        .unwrap();
    for slot in 0..POINTS {
        Point::new(BASE + slot * STEP, f64::from(slot))
            .write_to(&mut file)
            .unwrap();
    }
    archive
}

fn bench_fetch(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bench.wsp");
    build_file(&path);

    let reader = WspReader::open(&path).unwrap();
    let now = BASE + POINTS * STEP;

    let mut group = c.benchmark_group("fetch");
    group.throughput(Throughput::Bytes(60 * POINT_SIZE as u64));

    // Window well inside the ring: single contiguous read.
    group.bench_function("contiguous_hour", |b| {
        b.iter(|| {
            let result = reader
                .fetch_at(black_box(Some(BASE + 1000)), black_box(Some(BASE + 4600)), now)
                .unwrap();
            black_box(result)
        })
    });

    // Window straddling the physical end of the ring: two-part read.
    group.bench_function("wrapping_hour", |b| {
        b.iter(|| {
            let result = reader
                .fetch_at(black_box(Some(now - 3600)), black_box(Some(now)), now)
                .unwrap();
            black_box(result)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_fetch);
criterion_main!(benches);
