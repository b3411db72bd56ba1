mod common;

use common::{dataset, engine_on, memory_store, setup, sqlite_store, writer, DIM};
use std::sync::Arc;
use writer_vss::domain::error::DomainError;
use writer_vss::domain::ports::vector_store::{VectorStore, WriterFilter};
use writer_vss::domain::values::metric::DistanceMetric;
use writer_vss::infrastructure::embeddings::hashing::HashingProvider;
use writer_vss::WriterSearch;

/// Four writers on the unit circle in two dimensions plus one far out.
async fn planar(store: Arc<dyn VectorStore>) -> WriterSearch {
    let rows = [
        (1, "East", vec![1.0, 0.0]),
        (2, "North", vec![0.0, 1.0]),
        (3, "West", vec![-1.0, 0.0]),
        (4, "AlsoNorth", vec![0.0, 1.0]),
        (5, "FarEast", vec![10.0, 0.0]),
    ];
    for (id, name, v) in rows {
        store.put(&writer(id, name, v)).await.unwrap();
    }
    engine_on(store)
}

fn ids(hits: &[writer_vss::domain::entities::writer::SearchHit]) -> Vec<i64> {
    hits.iter().map(|h| h.writer.id).collect()
}

#[tokio::test]
async fn test_cosine_ranking_and_id_ties() {
    for store in [sqlite_store(2), memory_store(2)] {
        let backend = store.backend();
        let engine = planar(store).await;
        let hits = engine
            .search(vec![0.0, 2.0], 3, DistanceMetric::Cosine, WriterFilter::default())
            .await
            .unwrap();
        // 2 and 4 tie at distance 0; lower id first. East and FarEast tie at 1.0.
        assert_eq!(ids(&hits), vec![2, 4, 1], "{backend}");
        assert!(hits[0].distance.abs() < 1e-9);
        assert!((hits[2].distance - 1.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_l2_ranking() {
    for store in [sqlite_store(2), memory_store(2)] {
        let backend = store.backend();
        let engine = planar(store).await;
        let hits = engine
            .search(vec![9.0, 0.0], 5, DistanceMetric::L2, WriterFilter::default())
            .await
            .unwrap();
        assert_eq!(ids(&hits), vec![5, 1, 2, 4, 3], "{backend}");
        assert!((hits[0].distance - 1.0).abs() < 1e-9);
        assert!((hits[1].distance - 8.0).abs() < 1e-9);
        assert!((hits[4].distance - 10.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_results_sorted_and_bounded_by_k() {
    let engine = planar(sqlite_store(2)).await;
    for k in 1..=7 {
        let hits = engine
            .search(vec![0.3, -0.7], k, DistanceMetric::Cosine, WriterFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), k.min(5));
        assert!(hits.windows(2).all(|w| {
            w[0].distance < w[1].distance
                || (w[0].distance == w[1].distance && w[0].writer.id < w[1].writer.id)
        }));
    }
}

#[tokio::test]
async fn test_zero_norm_query_is_distance_one() {
    for store in [sqlite_store(2), memory_store(2)] {
        let engine = planar(store).await;
        let hits = engine
            .search(vec![0.0, 0.0], 3, DistanceMetric::Cosine, WriterFilter::default())
            .await
            .unwrap();
        assert_eq!(ids(&hits), vec![1, 2, 3]);
        assert!(hits.iter().all(|h| h.distance == 1.0));
    }
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let engine = planar(sqlite_store(2)).await;

    let err = engine
        .search(vec![1.0, 0.0, 0.0], 3, DistanceMetric::Cosine, WriterFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = engine
        .search(vec![1.0, 0.0], 0, DistanceMetric::Cosine, WriterFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = engine
        .search(vec![f32::NAN, 0.0], 1, DistanceMetric::L2, WriterFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = engine
        .search_text("   ", 3, DistanceMetric::Cosine, WriterFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn test_empty_store_returns_nothing() {
    let engine = setup();
    let hits = engine
        .search_text("anything at all", 3, DistanceMetric::Cosine, WriterFilter::default())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_description_finds_its_own_writer_first() {
    let engine = setup();
    let records = dataset();
    engine.seed(records.clone()).await.unwrap();

    for record in &records {
        let hits = engine
            .search_text(&record.description, 1, DistanceMetric::Cosine, WriterFilter::default())
            .await
            .unwrap();
        assert_eq!(hits[0].writer.full_name, record.full_name);
        assert!(hits[0].distance < 1e-4);
    }
}

#[tokio::test]
async fn test_prefilter_on_notable_works() {
    for store in [sqlite_store(DIM), memory_store(DIM)] {
        let engine = engine_on(store);
        engine.seed(dataset()).await.unwrap();

        let hits = engine
            .search_text(
                "a novel about society",
                5,
                DistanceMetric::Cosine,
                WriterFilter::by_work("1984"),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].writer.full_name, "George Orwell");
    }
}

#[tokio::test]
async fn test_sqlite_and_memory_agree() {
    let sqlite = engine_on(sqlite_store(DIM));
    let memory = engine_on(memory_store(DIM));
    sqlite.seed(dataset()).await.unwrap();
    memory.seed(dataset()).await.unwrap();

    for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
        let a = sqlite
            .search_text("gothic horror and mystery", 4, metric, WriterFilter::default())
            .await
            .unwrap();
        let b = memory
            .search_text("gothic horror and mystery", 4, metric, WriterFilter::default())
            .await
            .unwrap();
        assert_eq!(ids(&a), ids(&b));
        for (x, y) in a.iter().zip(&b) {
            assert!((x.distance - y.distance).abs() < 1e-9);
        }
    }
}

#[tokio::test]
async fn test_filter_limit_must_be_positive() {
    let engine = setup();
    let err = engine
        .filter(WriterFilter {
            limit: Some(0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn test_provider_dimension_must_match_store() {
    let result = WriterSearch::with_components(
        sqlite_store(DIM),
        Arc::new(HashingProvider::new(DIM / 2)),
        common::options(),
    );
    assert!(matches!(result.err(), Some(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_stalled_provider_times_out() {
    let mut options = common::options();
    options.timeout = std::time::Duration::from_millis(50);
    let engine = WriterSearch::with_components(
        memory_store(8),
        Arc::new(common::StalledProvider { dim: 8 }),
        options,
    )
    .unwrap();
    let err = engine
        .search_text("hello", 1, DistanceMetric::Cosine, WriterFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Timeout(_)));
    assert!(err.is_retryable());
}
