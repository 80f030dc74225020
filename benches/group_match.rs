use core::hint::black_box;

use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use swiss_group::Ctrl;
use swiss_group::CtrlGroup;
use swiss_group::GROUP_SLOTS;
use swiss_group::GroupArray;
use swiss_group::SlotLayout;
use swiss_group::ctrl::h2;

/// Per-lane reference scan: what the word-wise match replaces.
#[inline(always)]
fn scalar_match_h2(g: CtrlGroup, tag: Ctrl) -> u32 {
    let mut hits = 0u32;
    for i in 0..GROUP_SLOTS {
        let c = g.get(i);
        if c.is_full() && c.tag() == tag.tag() {
            hits |= 1 << i;
        }
    }
    hits
}

fn random_group(rng: &mut SmallRng) -> CtrlGroup {
    let mut g = CtrlGroup::EMPTY;
    for i in 0..GROUP_SLOTS {
        let c = match rng.random_range(0..4u8) {
            0 => Ctrl::EMPTY,
            1 => Ctrl::DELETED,
            _ => Ctrl::full(rng.random()),
        };
        g.set(i, c);
    }
    g
}

fn bench_ctrl_match(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(0xd00d_f00d);
    let words: Vec<(CtrlGroup, Ctrl)> = (0..4096)
        .map(|_| (random_group(&mut rng), Ctrl::full(rng.random())))
        .collect();

    let mut group = c.benchmark_group("ctrl_match");
    group.throughput(Throughput::Elements(words.len() as u64));

    group.bench_function("match_h2_wordwise", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for &(g, tag) in &words {
                acc += black_box(g).match_h2(tag).first();
            }
            acc
        })
    });

    group.bench_function("match_h2_scalar", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for &(g, tag) in &words {
                acc += scalar_match_h2(black_box(g), tag).trailing_zeros();
            }
            acc
        })
    });

    group.bench_function("match_empty", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for &(g, _) in &words {
                acc += black_box(g).match_empty().count();
            }
            acc
        })
    });

    group.finish();
}

fn bench_group_probe(c: &mut Criterion) {
    let length = 1024u64;
    let population = length * 7;
    let mut groups = GroupArray::new(SlotLayout::new(8, 8), length);

    let mut rng = SmallRng::seed_from_u64(0xbeef_cafe);
    let hashes: Vec<(u64, u64)> = (0..population)
        .map(|k| (k, rng.random::<u64>()))
        .collect();

    for &(k, hash) in &hashes {
        let mask = groups.length_mask();
        let mut gi = (hash >> 7) & mask;
        loop {
            let mut g = groups.group_mut(gi);
            let empties = g.ctrls().match_empty();
            if !empties.is_empty() {
                let slot = empties.first();
                g.key_bytes_mut(slot).copy_from_slice(&k.to_le_bytes());
                g.ctrls_mut().set(slot, h2(hash));
                break;
            }
            gi = (gi + 1) & mask;
        }
    }

    let mut group = c.benchmark_group("group_probe");
    group.throughput(Throughput::Elements(hashes.len() as u64));

    group.bench_function("find_present", |b| {
        b.iter(|| {
            let mut found = 0usize;
            for &(k, hash) in &hashes {
                let key = k.to_le_bytes();
                let mask = groups.length_mask();
                let mut gi = (hash >> 7) & mask;
                'probe: loop {
                    let g = groups.group(gi);
                    let ctrls = g.ctrls();
                    for slot in ctrls.match_h2(h2(hash)) {
                        if g.key_bytes(slot) == key.as_slice() {
                            found += 1;
                            break 'probe;
                        }
                    }
                    if !ctrls.match_empty().is_empty() {
                        break;
                    }
                    gi = (gi + 1) & mask;
                }
            }
            black_box(found)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_ctrl_match, bench_group_probe);
criterion_main!(benches);
