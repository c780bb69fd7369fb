// ========================================================================================
//
//                 LDSC2 VARIANT ANNOTATION PERFORMANCE BENCHMARK
//
// ========================================================================================
//
// Measures how the overlap pass scales with the number of annotations laid over a
// chromosome-sized set of variants.
//
// ========================================================================================

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ldsc2::genome::{Genome, Interval, Variant};
use ldsc2::types::Chromosome;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// --- Benchmark Tuning Parameters ---

/// Roughly the number of HapMap3-filtered 1000G variants on a mid-sized autosome.
const NUM_VARIANTS: usize = 200_000;
/// Chromosome length the variants and intervals are scattered over.
const CHROMOSOME_LENGTH: u64 = 100_000_000;
const INTERVALS_PER_ANNOTATION: usize = 5_000;
const ANNOTATION_COUNTS: [usize; 4] = [1, 8, 32, 96];

fn build_genome(rng: &mut StdRng, annotations: usize) -> Genome {
    let chromosome = Chromosome(1);
    let mut genome = Genome::new();

    let mut positions: Vec<u64> = (0..NUM_VARIANTS)
        .map(|_| rng.gen_range(1..=CHROMOSOME_LENGTH))
        .collect();
    positions.sort_unstable();
    for (i, bp) in positions.into_iter().enumerate() {
        genome.insert_variant(Variant::new(
            chromosome,
            bp,
            format!("1\t{bp}\trs{i}\t0"),
        ));
    }

    for a in 0..annotations {
        let name = format!("annotation_{a}");
        for _ in 0..INTERVALS_PER_ANNOTATION {
            let start = rng.gen_range(0..CHROMOSOME_LENGTH);
            let length = rng.gen_range(50..5_000);
            genome.insert_interval(
                chromosome,
                &name,
                Interval {
                    start,
                    end: start + length,
                },
            );
        }
    }
    genome.sort_annotations();
    genome
}

fn bench_annotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotate_variants");
    group.throughput(Throughput::Elements(NUM_VARIANTS as u64));
    group.sample_size(10);

    for &annotations in &ANNOTATION_COUNTS {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_genome(&mut rng, annotations);
        group.bench_with_input(
            BenchmarkId::from_parameter(annotations),
            &annotations,
            |b, _| b.iter(|| genome.annotate_variants(1).expect("annotate")),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_annotate);
criterion_main!(benches);
