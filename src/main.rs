use anyhow::Context;
use graphmap::graph::{GraphEdge, GraphNode};
use graphmap::persistence::{BlobStore, CachedBlobStore, GraphMapStore, MemoryBlobStore};
use graphmap::GraphStoreConfig;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Samyama Graph Map v{}", graphmap::version());
    println!("==========================================");
    println!();

    let config = match std::env::args().nth(1) {
        Some(path) => GraphStoreConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => GraphStoreConfig {
            share_mode: true,
            ..GraphStoreConfig::default()
        },
    };
    info!(
        "Snapshot at {} (share_mode={}, read_only={})",
        config.snapshot_path, config.share_mode, config.read_only
    );

    let backing: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let blobs = Arc::new(CachedBlobStore::new(backing, &config.cache));
    let store = Arc::new(GraphMapStore::new(blobs.clone(), &config));

    demo_build_graph(&store).await?;
    demo_update_and_search(&store).await?;

    store.release_exclusive().await?;
    let stats = store.metrics().snapshot();
    println!("\n=== Lease metrics ===");
    println!(
        "scoped acquired/released: {}/{}, exclusive acquired/released: {}/{}",
        stats.scoped_acquired, stats.scoped_released, stats.exclusive_acquired, stats.exclusive_released
    );
    let cache = blobs.stats();
    println!(
        "cache hits/misses/invalidations: {}/{}/{}",
        cache.hits, cache.misses, cache.invalidations
    );

    Ok(())
}

async fn demo_build_graph(store: &Arc<GraphMapStore>) -> anyhow::Result<()> {
    println!("=== Demo 1: Build and checkpoint ===");
    let lease = store.acquire_lease().await?;

    lease.with_map_mut(|map| -> graphmap::GraphResult<()> {
        map.add_node(GraphNode::parse("node1", "name=marko,age=29,person", "name")?)?;
        map.add_node(GraphNode::parse("node2", "name=vadas,age=27,person", "name")?)?;
        map.add_node(GraphNode::parse("node3", "name=lop,lang=java,software", "name")?)?;
        map.add_node(GraphNode::parse("node4", "name=josh,age=32,person", "name")?)?;
        map.add_node(GraphNode::parse("node5", "name=ripple,lang=java,software", "lang,name")?)?;

        map.add_edge(GraphEdge::parse("node1", "node2", "knows", "knows,weight=0.5")?)?;
        map.add_edge(GraphEdge::parse("node1", "node4", "knows", "knows,weight=1.0")?)?;
        map.add_edge(GraphEdge::parse("node1", "node3", "created", "created,weight=0.4")?)?;
        map.add_edge(GraphEdge::parse("node4", "node5", "created", "created,weight=1.0")?)?;
        Ok(())
    })??;

    let etag = lease.checkpoint().await?;
    let stats = lease.with_map(|map| map.statistics())?;
    println!(
        "✓ Checkpointed {} nodes, {} edges at {}",
        stats.node_count, stats.edge_count, etag
    );
    lease.release().await?;
    Ok(())
}

async fn demo_update_and_search(store: &Arc<GraphMapStore>) -> anyhow::Result<()> {
    println!("\n=== Demo 2: Update and search ===");
    let lease = store.acquire_lease().await?;

    lease.with_map_mut(|map| -> graphmap::GraphResult<()> {
        map.set_node(GraphNode::new("node5").with_tags("-lang")?)?;
        Ok(())
    })??;
    lease.with_map(|map| {
        println!(
            "✓ name=ripple -> {:?}",
            map.nodes().lookup_index("name", "ripple").ok()
        );
        println!(
            "✓ lang=java   -> {:?}",
            map.nodes().lookup_index("lang", "java").ok()
        );

        let result = map
            .search()
            .all_nodes()
            .has_edge(|e| e.tags().has("knows"));
        println!("✓ Nodes that know someone: {:?}", result.node_keys());
        for edge in result.edges() {
            println!("    {}", edge.key());
        }

        let creators = map
            .search()
            .edges(|e| e.tags().has("created"))
            .has_node(|n| n.tags().has("software"));
        println!("✓ Software with a creator: {:?}", creators.node_keys());
    })?;

    lease.checkpoint().await?;
    lease.release().await?;
    Ok(())
}
