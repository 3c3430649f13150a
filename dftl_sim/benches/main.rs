use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use dftl_sim::{Ssd, SsdConf};

fn bench_write(c: &mut Criterion) {
  let mut ssd = Ssd::new(SsdConf::with_geometry(4, 4, 64, 16));
  let mut lpn = 0u64;
  let mut t = 1u64;
  c.bench_function("write_4k", |b| {
    b.iter(|| {
      let lat = ssd.write(black_box(lpn * 8), 8, t);
      lpn = (lpn + 1) % 2048;
      t += 1_000;
      black_box(lat)
    })
  });
}

fn bench_read_cached(c: &mut Criterion) {
  let mut ssd = Ssd::new(SsdConf::with_geometry(4, 4, 64, 16));
  // the working set fits the mapping cache exactly
  for lpn in 0..512u64 {
    ssd.write(lpn * 8, 8, 1_000);
  }
  let mut lpn = 0u64;
  let mut t = 1_000_000u64;
  c.bench_function("read_4k_cached", |b| {
    b.iter(|| {
      let lat = ssd.read(black_box(lpn * 8), 8, t);
      lpn = (lpn + 1) % 512;
      t += 1_000;
      black_box(lat)
    })
  });
}

criterion_group!(benches, bench_write, bench_read_cached);
criterion_main!(benches);
