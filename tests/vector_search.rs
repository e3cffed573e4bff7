mod common;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera::{ErrorKind, GraphStore, NodeId, NodeSpec, Result, StoreOptions, VectorMetric};

const DIMS: usize = 32;

fn random_vector(rng: &mut ChaCha8Rng) -> Vec<f32> {
    (0..DIMS).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn brute_force(points: &[(NodeId, Vec<f32>)], query: &[f32], k: usize) -> Vec<NodeId> {
    let mut scored: Vec<(f32, NodeId)> = points
        .iter()
        .map(|(id, v)| (tessera::vector::euclidean_distance(query, v), *id))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().take(k).map(|(_, id)| id).collect()
}

#[test]
fn cosine_identical_and_orthogonal() -> Result<()> {
    let graph = common::memory_store();
    graph.create_vector_index("embedding", 3, 0, 0, VectorMetric::Cosine)?;
    let x = graph
        .create_node(NodeSpec::new(["Doc"]).property("embedding", vec![1.0f32, 0.0, 0.0]))?
        .id;
    let y = graph
        .create_node(NodeSpec::new(["Doc"]).property("embedding", vec![0.0f32, 1.0, 0.0]))?
        .id;
    let hits = graph.vector_search("embedding", &[1.0, 0.0, 0.0], 2, None)?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].node_id, x);
    assert!(hits[0].score >= 0.99);
    assert_eq!(hits[1].node_id, y);
    assert!(hits[1].score <= 0.01);
    Ok(())
}

#[test]
fn euclidean_scores() -> Result<()> {
    let graph = common::memory_store();
    graph.create_vector_index("pos", 2, 0, 0, VectorMetric::Euclidean)?;
    let origin = graph.create_node(NodeSpec::default().property("pos", vec![0.0f32, 0.0]))?.id;
    let unit = graph.create_node(NodeSpec::default().property("pos", vec![1.0f32, 0.0]))?.id;
    let hits = graph.vector_search("pos", &[0.0, 0.0], 2, None)?;
    assert_eq!(hits[0].node_id, origin);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[1].node_id, unit);
    assert!((hits[1].score - 0.5).abs() < 1e-6);
    Ok(())
}

#[test]
fn recall_against_brute_force() -> Result<()> {
    let graph = common::memory_store();
    graph.create_vector_index("v", DIMS, 16, 200, VectorMetric::Euclidean)?;
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut points = Vec::new();
    for _ in 0..500 {
        let v = random_vector(&mut rng);
        let id = graph.create_node(NodeSpec::new(["P"]).property("v", v.clone()))?.id;
        points.push((id, v));
    }
    let k = 10;
    let mut found = 0;
    for _ in 0..20 {
        let query = random_vector(&mut rng);
        let truth = brute_force(&points, &query, k);
        let hits = graph.vector_search("v", &query, k, Some(100))?;
        assert_eq!(hits.len(), k);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        found += hits.iter().filter(|h| truth.contains(&h.node_id)).count();
    }
    let recall = found as f64 / (20 * k) as f64;
    assert!(recall >= 0.9, "recall {recall}");
    Ok(())
}

#[test]
fn callers_filter_hits_by_label() -> Result<()> {
    let graph = common::memory_store();
    graph.create_vector_index("v", 2, 0, 0, VectorMetric::Euclidean)?;
    for i in 0..20 {
        let label = if i % 2 == 0 { "Even" } else { "Odd" };
        graph.create_node(NodeSpec::new([label]).property("v", vec![i as f32, 0.0]))?;
    }
    let hits = graph.vector_search("v", &[0.0, 0.0], 20, None)?;
    let evens: Vec<_> = hits
        .iter()
        .filter_map(|h| graph.get_node(h.node_id).ok())
        .filter(|n| n.has_label("Even"))
        .take(3)
        .collect();
    let xs: Vec<_> = evens
        .iter()
        .filter_map(|n| n.property("v").and_then(|v| v.as_vector()).map(|v| v[0]))
        .collect();
    assert_eq!(xs, vec![0.0, 2.0, 4.0]);
    Ok(())
}

#[test]
fn updates_and_deletes_reach_the_index() -> Result<()> {
    let graph = common::memory_store();
    graph.create_vector_index("v", 2, 0, 0, VectorMetric::Euclidean)?;
    let a = graph.create_node(NodeSpec::default().property("v", vec![0.0f32, 0.0]))?.id;
    let b = graph.create_node(NodeSpec::default().property("v", vec![10.0f32, 10.0]))?.id;
    let mut moved = tessera::Properties::new();
    moved.insert("v".into(), vec![0.1f32, 0.1].into());
    graph.update_node(b, moved)?;
    graph.delete_node(a)?;
    let hits = graph.vector_search("v", &[0.0, 0.0], 5, None)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node_id, b);
    Ok(())
}

#[test]
fn bad_queries_are_rejected() -> Result<()> {
    let graph = common::memory_store();
    graph.create_vector_index("v", 2, 0, 0, VectorMetric::Cosine)?;
    let missing = graph.vector_search("nope", &[0.0, 1.0], 1, None).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
    let err = graph.vector_search("v", &[0.0, 1.0], 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = graph.vector_search("v", &[0.0, 1.0], 1001, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = graph
        .create_node(NodeSpec::default().property("v", vec![1.0f32, 2.0, 3.0]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = graph
        .create_vector_index("v", 2, 0, 0, VectorMetric::Cosine)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    Ok(())
}

#[test]
fn overflowing_vectors_are_rejected_and_large_ones_score_finitely() -> Result<()> {
    let graph = common::memory_store();
    graph.create_vector_index("c", 2, 0, 0, VectorMetric::Cosine)?;
    graph.create_vector_index("e", 2, 0, 0, VectorMetric::Euclidean)?;
    for (property, v) in [("c", [1.0e20f32, 1.0e20]), ("e", [3.0e38f32, 3.0e38])] {
        let err = graph
            .create_node(NodeSpec::default().property(property, v.to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = graph.vector_search(property, &v, 1, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert_eq!(graph.statistics().node_count, 0);

    let big = vec![1.0e18f32, 1.0e18];
    let id = graph
        .create_node(
            NodeSpec::default()
                .property("c", big.clone())
                .property("e", big.clone()),
        )?
        .id;
    let hits = graph.vector_search("c", &big, 1, None)?;
    assert_eq!(hits[0].node_id, id);
    assert!(hits[0].distance.is_finite() && hits[0].score.is_finite());
    assert!(hits[0].score >= 0.99);
    let hits = graph.vector_search("e", &[-1.0e18, -1.0e18], 1, None)?;
    assert!(hits[0].distance.is_finite() && hits[0].score.is_finite());
    Ok(())
}

#[test]
fn indexes_survive_reopen() -> Result<()> {
    common::init_tracing();
    let dir = tempfile::tempdir()?;
    let near;
    {
        let graph = GraphStore::open(StoreOptions::new(dir.path()))?;
        graph.create_vector_index("v", 2, 0, 0, VectorMetric::Euclidean)?;
        near = graph.create_node(NodeSpec::default().property("v", vec![1.0f32, 1.0]))?.id;
        graph.create_node(NodeSpec::default().property("v", vec![9.0f32, 9.0]))?;
        graph.checkpoint()?;
        graph.create_node(NodeSpec::default().property("v", vec![5.0f32, 5.0]))?;
        graph.close()?;
    }
    let graph = GraphStore::open(StoreOptions::new(dir.path()))?;
    assert!(graph.has_vector_index("v")?);
    assert_eq!(graph.vector_index_info("v")?.len, 3);
    let hits = graph.vector_search("v", &[0.0, 0.0], 1, None)?;
    assert_eq!(hits[0].node_id, near);
    Ok(())
}
