use criterion::{criterion_group, criterion_main, Criterion};
use fv_math::ntt::{inverse_ntt_negacyclic_harvey, ntt_negacyclic_harvey, NttTables};
use fv_math::zq::Modulus;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn bench_ntt(c: &mut Criterion) {
    let q = Modulus::new(&[(1u64 << 60) - (1 << 14) + 1]).unwrap();
    let mut rng = ChaCha8Rng::from_seed([0u8; 32]);

    for power in [10usize, 11, 12] {
        let n = 1usize << power;
        let tables = NttTables::new(power, &q, &mut rng).unwrap();
        let values: Vec<u64> = (0..n).map(|_| rng.gen::<u64>() % q.as_slice()[0]).collect();

        c.bench_function(&format!("ntt_forward/{n}"), |b| {
            b.iter(|| {
                let mut v = values.clone();
                ntt_negacyclic_harvey(&mut v, &tables);
                v
            })
        });
        c.bench_function(&format!("ntt_inverse/{n}"), |b| {
            b.iter(|| {
                let mut v = values.clone();
                inverse_ntt_negacyclic_harvey(&mut v, &tables);
                v
            })
        });
    }
}

criterion_group!(benches, bench_ntt);
criterion_main!(benches);
