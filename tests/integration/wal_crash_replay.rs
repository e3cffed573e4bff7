#![allow(missing_docs)]

#[path = "../common/mod.rs"]
mod common;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;
use tessera::primitives::io::StdFileIo;
use tessera::storage::{OpenReport, WAL_FILE_NAME};
use tessera::{EdgeSpec, GraphStore, NodeId, NodeSpec, Result, StoreOptions};

fn reopen(dir: &Path) -> Result<(GraphStore, OpenReport)> {
    let io = Arc::new(StdFileIo::open(dir.join(WAL_FILE_NAME))?);
    GraphStore::open_reporting(StoreOptions::new(dir), io)
}

/// Writes `n` chained nodes and drops the store without closing it.
fn write_then_crash(dir: &Path, n: u64) -> Result<()> {
    let graph = GraphStore::open(StoreOptions::new(dir))?;
    let mut prev = None;
    for i in 0..n {
        let id = graph.create_node(NodeSpec::new(["Step"]).property("i", i as i64))?.id;
        if let Some(prev) = prev {
            graph.create_edge(EdgeSpec::new(prev, id, "NEXT"))?;
        }
        prev = Some(id);
    }
    drop(graph);
    Ok(())
}

#[test]
fn committed_writes_replay_after_crash() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    write_then_crash(dir.path(), 10)?;

    let (graph, report) = reopen(dir.path())?;
    assert_eq!(report.snapshot_lsn, None);
    assert_eq!(report.replayed, 19);
    assert_eq!(report.wal.truncated_bytes, 0);
    assert_eq!(graph.statistics().node_count, 10);
    assert_eq!(graph.statistics().edge_count, 9);
    assert_eq!(graph.get_outgoing_edges(NodeId(1))?.len(), 1);
    Ok(())
}

#[test]
fn garbage_tail_is_cut_off() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    write_then_crash(dir.path(), 5)?;
    let wal_path = dir.path().join(WAL_FILE_NAME);
    let clean_len = std::fs::metadata(&wal_path)?.len();
    {
        let mut file = OpenOptions::new().append(true).open(&wal_path)?;
        file.write_all(&[0xAB; 37])?;
        file.sync_all()?;
    }

    let (graph, report) = reopen(dir.path())?;
    assert_eq!(report.wal.truncated_bytes, 37);
    assert_eq!(report.replayed, 9);
    assert_eq!(std::fs::metadata(&wal_path)?.len(), clean_len);
    let next = graph.create_node(NodeSpec::default())?;
    assert_eq!(next.id, NodeId(6));
    assert_eq!(graph.current_lsn().0, 10);
    Ok(())
}

#[test]
fn torn_last_entry_is_dropped() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    write_then_crash(dir.path(), 3)?;
    let wal_path = dir.path().join(WAL_FILE_NAME);
    let len = std::fs::metadata(&wal_path)?.len();
    {
        let file = OpenOptions::new().write(true).open(&wal_path)?;
        file.set_len(len - 5)?;
    }

    // The last entry is the edge 2 -> 3; both nodes survive.
    let (graph, report) = reopen(dir.path())?;
    assert_eq!(report.wal.entries, 4);
    assert!(report.wal.truncated_bytes > 0);
    assert_eq!(graph.statistics().node_count, 3);
    assert_eq!(graph.statistics().edge_count, 1);
    assert!(graph.get_outgoing_edges(NodeId(2))?.is_empty());
    Ok(())
}

#[test]
fn checksum_damage_stops_replay_at_the_damaged_entry() -> Result<()> {
    common::init_tracing();
    let dir = tempdir()?;
    write_then_crash(dir.path(), 4)?;
    let wal_path = dir.path().join(WAL_FILE_NAME);
    let mut bytes = std::fs::read(&wal_path)?;
    // First payload byte of the first entry.
    bytes[13] ^= 0xFF;
    std::fs::write(&wal_path, &bytes)?;

    let (graph, report) = reopen(dir.path())?;
    assert_eq!(report.wal.entries, 0);
    assert_eq!(report.wal.truncated_bytes, bytes.len() as u64);
    assert_eq!(graph.statistics().node_count, 0);
    assert_eq!(graph.create_node(NodeSpec::default())?.id, NodeId(1));
    Ok(())
}
