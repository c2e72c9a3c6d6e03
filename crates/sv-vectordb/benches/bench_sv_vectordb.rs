use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;
use sv_core::config::SearchConfig;
use sv_core::types::{CollectionConfig, CollectionName, ProjectId, VectorRecord};
use sv_vectordb::distance::DistanceMetric;
use sv_vectordb::index::{FlatIndex, VectorIndex};
use sv_vectordb::{HashSharding, ShardedVectorStore, ShardingStrategy};
use tempfile::TempDir;

fn random_vector(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| rng.gen::<f32>()).collect()
}

fn bench_hash_sharding(c: &mut Criterion) {
    let ids: Vec<String> = (0..1000).map(|i| format!("doc-{i}")).collect();
    c.bench_function("hash_sharding_1k_ids", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(HashSharding.compute_shard(id, 8));
            }
        })
    });
}

fn bench_flat_search(c: &mut Criterion) {
    let dim = 128;
    let mut idx = FlatIndex::with_capacity(dim, DistanceMetric::Cosine, 10_000);
    for i in 0..10_000 {
        idx.insert(&format!("id_{i}"), &random_vector(dim)).unwrap();
    }

    c.bench_function("flat_search_top10_from_10k", |b| {
        let query = random_vector(dim);
        b.iter(|| {
            black_box(idx.search(&query, 10).unwrap());
        })
    });
}

fn bench_fanout_search(c: &mut Criterion) {
    let dim = 128;
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let project = ProjectId::new("bench").unwrap();
    let name = CollectionName::new("vectors").unwrap();

    let store = runtime.block_on(async {
        let store = ShardedVectorStore::open(dir.path(), &SearchConfig::default()).await.unwrap();
        let config = CollectionConfig::new(name.clone(), dim, DistanceMetric::Cosine, 8).unwrap();
        store.create_collection(&project, config).await.unwrap();
        let records: Vec<VectorRecord> = (0..10_000)
            .map(|i| VectorRecord::new(format!("id_{i}"), random_vector(dim)).unwrap())
            .collect();
        store.add_vectors(&project, &name, records).await.unwrap();
        store
    });

    c.bench_function("fanout_search_top10_10k_8_shards", |b| {
        let query = random_vector(dim);
        b.iter(|| {
            let outcome = runtime
                .block_on(store.search_vectors(&project, &name, &query, 10))
                .unwrap();
            black_box(outcome);
        })
    });
}

criterion_group!(benches, bench_hash_sharding, bench_flat_search, bench_fanout_search);
criterion_main!(benches);
