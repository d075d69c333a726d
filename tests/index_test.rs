//! Integration tests for the index maintainer
//!
//! Exercises key uniqueness, tag/unique index consistency, atomic updates
//! and search over the public `GraphMap` API.

use graphmap::graph::{EdgeKey, GraphEdge, GraphMap, GraphNode, GraphSerialization};
use graphmap::ErrorKind;

fn modern_graph() -> GraphMap {
    GraphMap::from_parts(
        vec![
            GraphNode::parse("node1", "name=marko,age=29", "name").unwrap(),
            GraphNode::parse("node2", "name=vadas,age=27", "name").unwrap(),
            GraphNode::parse("node3", "name=lop,lang=java", "name").unwrap(),
            GraphNode::parse("node4", "name=josh,age=32", "name").unwrap(),
            GraphNode::parse("node5", "name=ripple,lang=java", "lang,name").unwrap(),
        ],
        vec![
            GraphEdge::parse("node1", "node2", "knows", "knows,weight=0.5").unwrap(),
            GraphEdge::parse("node1", "node3", "knows", "knows,weight=1.0").unwrap(),
            GraphEdge::parse("node4", "node5", "created", "created,weight=1.0").unwrap(),
        ],
    )
    .unwrap()
}

/// Every unique entry points at a node declaring that index with that value,
/// and every declared, valued index appears exactly once
fn assert_index_consistency(map: &GraphMap) {
    let unique = map.nodes().unique_index();
    for (entry, owner) in unique.iter() {
        let node = map.get_node(owner.as_str()).expect("owner exists");
        assert!(node.indexes().contains(entry.name()));
        let value = node.tags().value(entry.name()).expect("indexed tag has a value");
        assert!(value.eq_ignore_ascii_case(entry.value()));
    }

    let mut expected = 0;
    for node in map.nodes().iter() {
        for entry in node.index_entries() {
            assert_eq!(unique.owner(&entry), Some(node.key()));
            expected += 1;
        }
        for (tag, _) in node.tags().iter() {
            assert!(map.nodes().lookup_tag(tag.as_str()).contains(&node.key().as_str()));
        }
    }
    assert_eq!(unique.len(), expected);
}

#[test]
fn test_duplicate_node_key() {
    let mut map = GraphMap::new();
    map.add_node(GraphNode::new("node1")).unwrap();

    let err = map.add_node(GraphNode::new("node1")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let err = map.add_node(GraphNode::new("NODE1")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(map.node_count(), 1);
}

#[test]
fn test_set_without_delta_carries_tags_forward() {
    let mut map = GraphMap::new();
    map.add_node(GraphNode::parse("node1", "name=marko,age=29", "name").unwrap())
        .unwrap();
    assert_eq!(map.nodes().lookup_index("name", "marko").unwrap(), "node1");

    let err = map.add_node(GraphNode::new("node1")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    map.set_node(GraphNode::new("node1")).unwrap();
    assert_eq!(map.nodes().lookup_index("name", "marko").unwrap(), "node1");
    assert_eq!(map.get_node("node1").unwrap().tags().value("age"), Some("29"));
    assert_index_consistency(&map);
}

#[test]
fn test_removal_directive_retracts_index() {
    let mut map = modern_graph();
    map.set_node(GraphNode::new("node5").with_tags("-lang").unwrap())
        .unwrap();

    let err = map.nodes().lookup_index("lang", "java").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(map.nodes().lookup_index("name", "ripple").unwrap(), "node5");

    let node5 = map.get_node("node5").unwrap();
    assert!(!node5.tags().has("lang"));
    // The index declaration survives the tag removal
    assert!(node5.indexes().contains("lang"));
    assert_eq!(map.nodes().lookup_tag("lang"), vec!["node3"]);
    assert_index_consistency(&map);
}

#[test]
fn test_index_declaration_removal_keeps_tag() {
    let mut map = modern_graph();
    map.set_node(GraphNode::new("node5").with_indexes("-name").unwrap())
        .unwrap();

    assert!(map.nodes().lookup_index("name", "ripple").is_err());
    assert_eq!(map.get_node("node5").unwrap().tags().value("name"), Some("ripple"));
    assert_eq!(map.nodes().lookup_index("lang", "java").unwrap(), "node5");
    assert_index_consistency(&map);
}

#[test]
fn test_colliding_set_is_atomic() {
    let mut map = modern_graph();
    let before = map.to_serialization();
    let stats = map.statistics();

    // node2 tries to claim name=marko while also changing other tags
    let err = map
        .set_node(
            GraphNode::new("node2")
                .with_tags("name=marko,age=99,-lang")
                .unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("name=marko"));

    assert_eq!(map.to_serialization(), before);
    assert_eq!(map.statistics(), stats);
    assert_eq!(map.nodes().lookup_index("name", "vadas").unwrap(), "node2");
    assert_eq!(map.nodes().lookup_index("name", "marko").unwrap(), "node1");
    assert_index_consistency(&map);
}

#[test]
fn test_colliding_add_is_rejected() {
    let mut map = modern_graph();
    let err = map
        .add_node(GraphNode::parse("node6", "name=josh", "name").unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(map.get_node("node6").is_none());
}

#[test]
fn test_lookup_by_node_key() {
    let map = modern_graph();
    let mut entries: Vec<String> = map
        .nodes()
        .lookup_by_node_key("node5")
        .into_iter()
        .map(|entry| entry.to_string())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["lang=java", "name=ripple"]);
    assert!(map.nodes().lookup_by_node_key("missing").is_empty());
}

#[test]
fn test_remove_missing_key_is_not_found() {
    let mut map = modern_graph();
    let before = map.to_serialization();

    assert_eq!(map.remove_node("node42").unwrap_err().kind(), ErrorKind::NotFound);
    let missing = EdgeKey::new("node2", "node1", "knows");
    assert_eq!(map.remove_edge(&missing).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(map.to_serialization(), before);
}

#[test]
fn test_remove_node_retracts_everything() {
    let mut map = modern_graph();
    map.remove_node("node1").unwrap();

    assert!(map.nodes().lookup_index("name", "marko").is_err());
    assert!(!map.nodes().lookup_tag("age").contains(&"node1"));
    assert!(map.edges().lookup_tag("knows").is_empty());
    assert!(map.edges().edges_to("node2").is_empty());
    assert_eq!(map.edge_count(), 1);
    assert_index_consistency(&map);
}

#[test]
fn test_edge_tags_and_adjacency() {
    let mut map = modern_graph();
    let key = EdgeKey::new("node1", "node2", "knows");

    map.set_edge(GraphEdge::parse("node1", "node2", "knows", "-weight,since=2010").unwrap())
        .unwrap();
    let edge = map.get_edge(&key).unwrap();
    assert!(!edge.tags().has("weight"));
    assert_eq!(edge.tags().value("since"), Some("2010"));
    assert!(edge.tags().has("knows"));

    assert_eq!(map.edges().edges_from("node1").len(), 2);
    assert_eq!(map.edges().edges_for("node5").len(), 1);
    assert_eq!(
        map.edges().lookup_tag("since"),
        vec![&EdgeKey::new("node1", "node2", "knows")]
    );

    // Same endpoints, different type: a distinct edge
    map.add_edge(GraphEdge::new("node1", "node2")).unwrap();
    assert_eq!(map.edges().edges_from("node1").len(), 3);
    assert!(map
        .get_edge(&EdgeKey::new("node1", "node2", "default"))
        .is_some());
}

#[test]
fn test_search_has_edge() {
    let map = modern_graph();
    let result = map
        .search()
        .all_nodes()
        .has_edge(|e| e.tags().has("knows"));

    assert_eq!(result.node_keys(), vec!["node1"]);
    assert_eq!(
        result.edge_keys(),
        vec![
            EdgeKey::new("node1", "node2", "knows"),
            EdgeKey::new("node1", "node3", "knows"),
        ]
    );
}

#[test]
fn test_search_has_node() {
    let map = modern_graph();
    let result = map
        .search()
        .edges(|e| e.tags().has("created"))
        .has_node(|n| n.tags().has_value("lang", "java"));

    assert_eq!(result.node_keys(), vec!["node5"]);
    assert_eq!(result.edge_keys(), vec![EdgeKey::new("node4", "node5", "created")]);
}

#[test]
fn test_serialization_round_trip() {
    let mut map = modern_graph();
    map.set_node(GraphNode::new("node5").with_tags("-lang").unwrap())
        .unwrap();
    map.set_node(GraphNode::new("node2").with_indexes("-name").unwrap())
        .unwrap();

    let bytes = map.to_serialization().to_bytes().unwrap();
    let reloaded =
        GraphMap::from_serialization(GraphSerialization::from_bytes(&bytes).unwrap()).unwrap();

    let mut keys: Vec<&str> = reloaded.nodes().iter().map(|n| n.key().as_str()).collect();
    keys.sort();
    assert_eq!(keys, vec!["node1", "node2", "node3", "node4", "node5"]);
    for edge in map.edges().iter() {
        assert_eq!(reloaded.get_edge(&edge.key()), Some(edge));
    }
    for tag in ["name", "age", "lang"] {
        let mut original = map.nodes().lookup_tag(tag);
        let mut rebuilt = reloaded.nodes().lookup_tag(tag);
        original.sort();
        rebuilt.sort();
        assert_eq!(original, rebuilt);
    }
    assert!(reloaded.nodes().lookup_index("name", "vadas").is_err());
    assert!(reloaded.nodes().lookup_index("lang", "java").is_err());
    assert_eq!(reloaded.nodes().lookup_index("name", "ripple").unwrap(), "node5");
    assert_index_consistency(&reloaded);
}
