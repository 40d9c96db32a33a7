use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::AtomicU32;
use std::thread;
use voxa_core::math::LinearRgba;
use voxa_lanes::{
    pack_color, pack_voxel, walk, AtomicListAppend, FragmentRecord, HostFragmentList,
    RECORD_WORDS,
};

const GRID: usize = 64;
const FRAGMENTS: u32 = 16_384;

struct Storage {
    heads: Vec<AtomicU32>,
    nodes: Vec<AtomicU32>,
    counter: AtomicU32,
}

impl Storage {
    fn new(capacity: u32) -> Self {
        Self {
            heads: (0..GRID * GRID).map(|_| AtomicU32::new(0)).collect(),
            nodes: (0..capacity as usize * RECORD_WORDS)
                .map(|_| AtomicU32::new(0))
                .collect(),
            counter: AtomicU32::new(1),
        }
    }

    fn list(&self) -> HostFragmentList<'_> {
        HostFragmentList {
            heads: &self.heads,
            nodes: &self.nodes,
            counter: &self.counter,
        }
    }
}

fn fragment(i: u32) -> (usize, FragmentRecord) {
    let pixel = (i as usize * 7) % (GRID * GRID);
    let (xy, z_axis) = pack_voxel([pixel as u32 % 64, pixel as u32 / 64, i % 64], 2);
    let record = FragmentRecord {
        next: 0,
        color: pack_color(LinearRgba::new(1.0, 0.5, 0.25, 1.0)),
        xy,
        z_axis,
    };
    (pixel, record)
}

fn bench_append(c: &mut Criterion) {
    let capacity = FRAGMENTS + 1;
    let append = AtomicListAppend::new(capacity);
    let storage = Storage::new(capacity);

    let mut group = c.benchmark_group("Atomic List Append");
    group.throughput(Throughput::Elements(FRAGMENTS as u64));

    group.bench_function("Single thread", |b| {
        b.iter(|| {
            let mut list = storage.list();
            list.clear();
            for i in 0..FRAGMENTS {
                let (pixel, record) = fragment(i);
                black_box(append.append(&mut list, pixel, record).ok());
            }
        });
    });

    group.bench_function("Four threads", |b| {
        b.iter(|| {
            storage.list().clear();
            thread::scope(|s| {
                for t in 0..4 {
                    let mut list = storage.list();
                    s.spawn(move || {
                        for i in (t..FRAGMENTS).step_by(4) {
                            let (pixel, record) = fragment(i);
                            black_box(append.append(&mut list, pixel, record).ok());
                        }
                    });
                }
            });
        });
    });

    group.finish();

    let list = storage.list();
    list.clear();
    let mut writer = list;
    for i in 0..FRAGMENTS {
        let (pixel, record) = fragment(i);
        let _ = append.append(&mut writer, pixel, record);
    }
    let pool = list.snapshot_nodes();

    c.bench_function("Walk every list", |b| {
        b.iter(|| {
            let mut visited = 0;
            for pixel in 0..GRID * GRID {
                visited += walk(&pool, list.head(pixel), capacity).len();
            }
            black_box(visited)
        });
    });
}

criterion_group!(benches, bench_append);
criterion_main!(benches);
