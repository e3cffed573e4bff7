#![allow(missing_docs)]

#[path = "../common/mod.rs"]
mod common;

use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;
use tessera::primitives::io::StdFileIo;
use tessera::storage::{OpenReport, SNAPSHOT_FILE_NAME, WAL_FILE_NAME};
use tessera::{
    EdgeSpec, ErrorKind, GraphStore, Lsn, NodeId, NodeSpec, Result, StoreOptions, VectorMetric,
};

fn reopen(dir: &Path) -> Result<(GraphStore, OpenReport)> {
    let io = Arc::new(StdFileIo::open(dir.join(WAL_FILE_NAME))?);
    GraphStore::open_reporting(StoreOptions::new(dir), io)
}

#[test]
fn checkpoint_then_tail_replay() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    {
        let graph = GraphStore::open(StoreOptions::new(dir.path()))?;
        graph.create_vector_index("v", 2, 0, 0, VectorMetric::Euclidean)?;
        let a = graph.create_node(NodeSpec::new(["A"]).property("v", vec![0.0f32, 1.0]))?.id;
        let b = graph.create_node(NodeSpec::new(["B"]))?.id;
        graph.create_edge(EdgeSpec::new(a, b, "LINK").weight(2.5))?;
        assert_eq!(graph.checkpoint()?, Lsn(4));
        assert_eq!(std::fs::metadata(dir.path().join(WAL_FILE_NAME))?.len(), 0);

        graph.delete_node(b)?;
        graph.create_node(NodeSpec::new(["C"]))?;
        graph.close()?;
    }

    let (graph, report) = reopen(dir.path())?;
    assert_eq!(report.snapshot_lsn, Some(Lsn(4)));
    assert_eq!(report.replayed, 2);
    assert_eq!(report.skipped_covered, 0);
    assert_eq!(graph.current_lsn(), Lsn(6));
    assert!(graph.get_node(NodeId(2)).unwrap_err().is_not_found());
    assert_eq!(graph.find_nodes_by_label("C")?.len(), 1);
    let edge = graph.get_outgoing_edges(NodeId(1))?;
    assert_eq!(edge.len(), 1);
    assert_eq!(edge[0].weight, 2.5);
    assert_eq!(graph.vector_index_info("v")?.len, 1);
    assert_eq!(graph.create_node(NodeSpec::default())?.id, NodeId(4));
    Ok(())
}

#[test]
fn crash_between_snapshot_and_log_reset() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    let wal_path = dir.path().join(WAL_FILE_NAME);
    {
        let graph = GraphStore::open(StoreOptions::new(dir.path()))?;
        for i in 0..5i64 {
            graph.create_node(NodeSpec::new(["N"]).property("i", i))?;
        }
        graph.sync()?;
        let before = std::fs::read(&wal_path)?;
        graph.checkpoint()?;
        graph.close()?;
        // Put back the log the checkpoint emptied.
        std::fs::write(&wal_path, before)?;
    }

    let (graph, report) = reopen(dir.path())?;
    assert_eq!(report.snapshot_lsn, Some(Lsn(5)));
    assert_eq!(report.skipped_covered, 5);
    assert_eq!(report.replayed, 0);
    assert_eq!(graph.statistics().node_count, 5);
    let next = graph.create_node(NodeSpec::default())?;
    assert_eq!(next.id, NodeId(6));
    assert_eq!(graph.current_lsn(), Lsn(6));
    Ok(())
}

#[test]
fn repeated_checkpoints_keep_lsns_increasing() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    let graph = GraphStore::open(StoreOptions::new(dir.path()))?;
    let mut last = Lsn(0);
    for round in 0..3 {
        graph.create_node(NodeSpec::default().property("round", round as i64))?;
        let lsn = graph.checkpoint()?;
        assert!(lsn > last);
        last = lsn;
    }
    assert!(!dir.path().join(format!("{SNAPSHOT_FILE_NAME}.tmp")).exists());
    graph.close()?;
    let (graph, report) = reopen(dir.path())?;
    assert_eq!(report.snapshot_lsn, Some(last));
    assert_eq!(graph.statistics().node_count, 3);
    Ok(())
}

#[test]
fn unreadable_snapshot_fails_open() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), b"{not json")?;
    let err = GraphStore::open(StoreOptions::new(dir.path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    Ok(())
}
