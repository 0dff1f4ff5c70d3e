// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Full persistence cycle: commit a graph, resolve the directory again, and
//! get the same topology, properties, and derived views back.

use arrow_array::{ArrayRef, Int64Array};
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;
use rdg_common::RdgConfig;
use rdg_store::{
    CsrTopology, EdgeSortKind, LocalComm, PropertyColumn, Rdg, RdgLoadOptions, RdgManifest,
    RdgVersioningPolicy, TransposeKind,
};
use std::sync::Arc;
use tempfile::tempdir;

fn diamond() -> CsrTopology {
    CsrTopology::from_raw(vec![0, 2, 3, 4, 4], vec![1, 2, 2, 3], vec![], vec![]).unwrap()
}

fn column(name: &str, values: &[i64]) -> PropertyColumn {
    PropertyColumn::new(name, vec![Arc::new(Int64Array::from(values.to_vec())) as ArrayRef])
        .unwrap()
}

fn local_store(dir: &std::path::Path) -> Arc<dyn ObjectStore> {
    Arc::new(LocalFileSystem::new_with_prefix(dir).unwrap())
}

#[tokio::test]
async fn test_property_round_trip_across_versions() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = local_store(dir.path());

    let mut rdg = Rdg::create(
        store.clone(),
        Path::default(),
        diamond(),
        vec![0; 4],
        vec![0; 4],
        Arc::new(LocalComm),
        RdgConfig::default(),
    )?;
    rdg.add_node_property(column("w", &[1, 2, 3, 4]))?;
    assert_eq!(rdg.current_version(), 0);

    rdg.store("ingest --input graph.csv", RdgVersioningPolicy::NextVersion)
        .await?;
    assert_eq!(rdg.current_version(), 1);
    // the commit cleared the dirty bit
    assert!(rdg.node_property_info("w").unwrap().is_clean());

    let reopened = Rdg::open(
        store.clone(),
        Path::default(),
        RdgLoadOptions::default(),
        Arc::new(LocalComm),
        RdgConfig::default(),
    )
    .await?;
    assert_eq!(reopened.current_version(), 1);
    assert_eq!(reopened.num_nodes(), 4);
    assert_eq!(reopened.num_edges(), 4);
    assert_eq!(
        reopened.default_topology().adj_indices(),
        rdg.default_topology().adj_indices()
    );
    assert_eq!(reopened.lineage(), &["ingest --input graph.csv".to_string()]);

    // eagerly loaded, clean, and value-equal
    let info = reopened.node_property_info("w").unwrap();
    assert!(info.is_clean());
    assert!(reopened
        .node_property("w")
        .unwrap()
        .logical_eq(&column("w", &[1, 2, 3, 4])));
    Ok(())
}

#[tokio::test]
async fn test_lazy_load_after_reopen() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = local_store(dir.path());

    let mut rdg = Rdg::create(
        store.clone(),
        Path::default(),
        diamond(),
        vec![0; 4],
        vec![0; 4],
        Arc::new(LocalComm),
        RdgConfig::default(),
    )?;
    rdg.add_node_property(column("w", &[5, 6, 7, 8]))?;
    rdg.store("build", RdgVersioningPolicy::NextVersion).await?;

    let opts = RdgLoadOptions {
        node_properties: Some(vec![]),
        ..Default::default()
    };
    let mut reopened = Rdg::open(
        store,
        Path::default(),
        opts,
        Arc::new(LocalComm),
        RdgConfig::default(),
    )
    .await?;
    assert!(reopened.node_property("w").is_none());
    assert!(reopened.node_property_info("w").unwrap().is_absent());

    reopened.load_node_property("w", None).await?;
    assert!(reopened.node_property_info("w").unwrap().is_clean());
    assert!(reopened
        .node_property("w")
        .unwrap()
        .logical_eq(&column("w", &[5, 6, 7, 8])));
    Ok(())
}

#[tokio::test]
async fn test_commit_monotonicity() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = local_store(dir.path());

    let mut rdg = Rdg::create(
        store,
        Path::default(),
        diamond(),
        vec![0; 4],
        vec![0; 4],
        Arc::new(LocalComm),
        RdgConfig::default(),
    )?;

    rdg.store("first", RdgVersioningPolicy::NextVersion).await?;
    let after_first = rdg.current_version();
    rdg.store("retain", RdgVersioningPolicy::RetainVersion).await?;
    assert_eq!(rdg.current_version(), after_first);
    rdg.store("second", RdgVersioningPolicy::NextVersion).await?;
    assert_eq!(rdg.current_version(), after_first + 1);
    assert_eq!(rdg.lineage().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_derived_views_survive_storage() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = local_store(dir.path());

    let mut rdg = Rdg::create(
        store.clone(),
        Path::default(),
        diamond(),
        vec![0; 4],
        vec![1, 2, 1, 2],
        Arc::new(LocalComm),
        RdgConfig::default(),
    )?;
    let built = rdg.edge_shuffle_view(TransposeKind::Yes, EdgeSortKind::SortedByDestId)?;
    let type_aware = rdg.edge_type_aware_view(TransposeKind::No)?;
    rdg.store("derive views", RdgVersioningPolicy::NextVersion)
        .await?;

    let mut reopened = Rdg::open(
        store,
        Path::default(),
        RdgLoadOptions::default(),
        Arc::new(LocalComm),
        RdgConfig::default(),
    )
    .await?;
    assert_eq!(reopened.edge_type_ids(), &[1, 2, 1, 2]);

    // Served from the stored record set, structurally identical to what was
    // built before the commit.
    let loaded = reopened.edge_shuffle_view(TransposeKind::Yes, EdgeSortKind::SortedByDestId)?;
    assert_eq!(*loaded, *built);

    let loaded_type_aware = reopened.edge_type_aware_view(TransposeKind::No)?;
    assert_eq!(
        loaded_type_aware.per_type_adj(),
        type_aware.per_type_adj()
    );
    assert_eq!(loaded_type_aware.base(), type_aware.base());
    Ok(())
}

#[tokio::test]
async fn test_manifest_references_form_live_set() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = local_store(dir.path());
    let config = RdgConfig::default();

    let mut rdg = Rdg::create(
        store.clone(),
        Path::default(),
        diamond(),
        vec![0; 4],
        vec![0; 4],
        Arc::new(LocalComm),
        config.clone(),
    )?;
    rdg.add_node_property(column("w", &[1, 2, 3, 4]))?;
    rdg.store("init", RdgVersioningPolicy::NextVersion).await?;

    let live = rdg.manifest().file_names(&store, &config.store).await?;

    // After one successful commit everything in the directory is live.
    let mut stream = store.list(None);
    use futures::StreamExt;
    while let Some(meta) = stream.next().await {
        let meta = meta?;
        let name = meta.location.filename().unwrap().to_string();
        assert!(live.contains(&name), "orphan after clean commit: {name}");
    }
    assert!(live
        .contains(RdgManifest::file_name(&Path::default(), "default", 1).filename().unwrap()));
    Ok(())
}

#[tokio::test]
async fn test_partition_sidecars_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = local_store(dir.path());

    let mut rdg = Rdg::create(
        store.clone(),
        Path::default(),
        diamond(),
        vec![0; 4],
        vec![0; 4],
        Arc::new(LocalComm),
        RdgConfig::default(),
    )?;
    rdg.set_mirror_nodes(vec![column("m", &[2, 3]), column("m", &[1])])?;
    rdg.set_local_to_user_id(column("ids", &[10, 11, 12, 13]))?;
    rdg.store("partition", RdgVersioningPolicy::NextVersion)
        .await?;

    let reopened = Rdg::open(
        store,
        Path::default(),
        RdgLoadOptions::default(),
        Arc::new(LocalComm),
        RdgConfig::default(),
    )
    .await?;
    let mirrors = reopened.mirror_nodes();
    assert_eq!(mirrors.len(), 2);
    assert!(mirrors[0].logical_eq(&column("m", &[2, 3])));
    assert!(mirrors[1].logical_eq(&column("m", &[1])));
    assert!(reopened
        .local_to_user_id()
        .unwrap()
        .logical_eq(&column("ids", &[10, 11, 12, 13])));
    assert!(reopened.host_to_owned_global_node_ids().is_none());
    Ok(())
}

#[tokio::test]
async fn test_open_empty_directory_fails() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = local_store(dir.path());
    let result = Rdg::open(
        store,
        Path::default(),
        RdgLoadOptions::default(),
        Arc::new(LocalComm),
        RdgConfig::default(),
    )
    .await;
    assert!(result.is_err());
    Ok(())
}
