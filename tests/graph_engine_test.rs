//! Integration tests for the conversation graph engine
//!
//! Walks the branching scenarios end to end through the public API and
//! checks the tree invariants after every step.

use chatloom::graph::{ChatGraph, ChatMessage, SiblingPosition, SiblingTarget};

fn texts(messages: &[ChatMessage]) -> Vec<String> {
    messages.iter().map(|m| m.text()).collect()
}

#[test]
fn test_first_vertex_becomes_active_and_flattens() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph
        .create_vertex("r", vec![ChatMessage::user("m1")])
        .expect("create A");

    assert_eq!(graph.active_vertex(), a);
    assert_eq!(texts(&graph.flatten()), vec!["m1"]);
    graph.check_integrity().expect("integrity");
}

#[test]
fn test_second_branch_from_root_and_sibling_target() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph.create_vertex("r", vec![ChatMessage::user("m1")]).unwrap();
    let b = graph.create_vertex("r", vec![ChatMessage::user("m2")]).unwrap();

    assert_eq!(graph.get_vertex("r").unwrap().children, vec![a.clone(), b.clone()]);
    assert_eq!(graph.active_vertex(), b);
    assert_eq!(texts(&graph.flatten()), vec!["m2"]);

    assert_eq!(
        graph.get_target_sibling(&b, -1),
        Some(SiblingTarget {
            sibling_id: a.clone(),
            leaf_id: a.clone(),
        })
    );
    assert_eq!(
        graph.sibling_position(&b),
        Some(SiblingPosition {
            current: 2,
            total: 2
        })
    );
}

#[test]
fn test_single_child_has_no_sibling_to_cycle_to() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph.create_vertex("r", vec![ChatMessage::user("m1")]).unwrap();
    graph.create_vertex("r", vec![ChatMessage::user("m2")]).unwrap();

    assert!(graph.set_active_vertex(&a));
    let c = graph
        .create_vertex(&a, vec![ChatMessage::assistant("m3")])
        .unwrap();

    assert_eq!(graph.get_target_sibling(&c, 1), None);
    assert_eq!(graph.get_target_sibling(&c, -1), None);
    assert_eq!(texts(&graph.flatten()), vec!["m1", "m3"]);
}

#[test]
fn test_delete_active_subtree_moves_to_surviving_sibling() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph.create_vertex("r", vec![ChatMessage::user("m1")]).unwrap();
    let b = graph.create_vertex("r", vec![ChatMessage::user("m2")]).unwrap();
    graph.set_active_vertex(&a);
    let c = graph
        .create_vertex(&a, vec![ChatMessage::assistant("m3")])
        .unwrap();
    assert_eq!(graph.active_vertex(), c);

    let removed = graph.delete_vertex(&a);

    assert_eq!(removed, vec![a.clone(), c.clone()]);
    assert!(!graph.contains(&a));
    assert!(!graph.contains(&c));
    assert!(graph.contains(&b));
    assert_eq!(graph.vertex_count(), 2);
    assert_eq!(graph.get_vertex("r").unwrap().children, vec![b.clone()]);
    assert_eq!(graph.active_vertex(), b);
    graph.check_integrity().expect("integrity after delete");
}

#[test]
fn test_sibling_cycling_wraps_after_n_steps() {
    let mut graph = ChatGraph::with_id("r");
    let start = graph.create_vertex("r", vec![ChatMessage::user("one")]).unwrap();
    for text in ["two", "three", "four"] {
        graph.create_vertex("r", vec![ChatMessage::user(text)]).unwrap();
    }

    let mut current = start.clone();
    for _ in 0..4 {
        current = graph.get_target_sibling(&current, 1).unwrap().sibling_id;
    }
    assert_eq!(current, start);

    // A negative offset larger than the sibling count still wraps
    let back = graph.get_target_sibling(&start, -5).unwrap();
    assert_eq!(graph.get_vertex(&back.sibling_id).unwrap().messages[0].text(), "four");
}

#[test]
fn test_terminal_memory_restores_depth_when_reentering_branch() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph.create_vertex("r", vec![ChatMessage::user("left")]).unwrap();
    let a1 = graph.create_vertex(&a, vec![ChatMessage::assistant("l1")]).unwrap();
    let a2 = graph.create_vertex(&a1, vec![ChatMessage::user("l2")]).unwrap();
    // Deeper alternative inside A that was never visited last
    let a1b = graph.branch_from(&a, vec![ChatMessage::assistant("l1b")]).unwrap();
    let a1b_deep = graph.create_vertex(&a1b, vec![ChatMessage::user("x")]).unwrap();
    graph
        .create_vertex(&a1b_deep, vec![ChatMessage::assistant("y")])
        .unwrap();

    let b = graph.create_vertex("r", vec![ChatMessage::user("right")]).unwrap();
    assert_eq!(graph.get_deepest_child(&a), graph.get_children(&a1b_deep)[0]);

    // Visit a2 last inside branch A, then move over to B
    assert!(graph.set_active_vertex(&a2));
    assert!(graph.set_active_vertex(&b));
    assert_eq!(graph.terminal_for(&a), Some(a2.as_str()));

    let target = graph.get_target_sibling(&b, 1).unwrap();
    assert_eq!(target.sibling_id, a);
    assert_eq!(target.leaf_id, a2);
}

#[test]
fn test_deepest_child_prefers_earliest_branch_on_ties() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph.create_vertex("r", vec![ChatMessage::user("a")]).unwrap();
    let first = graph.create_vertex(&a, vec![ChatMessage::assistant("first")]).unwrap();
    graph
        .branch_from(&a, vec![ChatMessage::assistant("second")])
        .unwrap();

    assert_eq!(graph.get_deepest_child(&a), first);
    assert_eq!(graph.get_deepest_child("missing"), "missing");
}

#[test]
fn test_unknown_parent_is_rejected() {
    let mut graph = ChatGraph::with_id("r");
    let err = graph
        .create_vertex("nope", vec![ChatMessage::user("lost")])
        .unwrap_err();

    assert!(err.to_string().contains("nope"));
    assert_eq!(graph.vertex_count(), 1);
    assert_eq!(graph.active_vertex(), "r");
}

#[test]
fn test_unknown_active_vertex_is_ignored() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph.create_vertex("r", vec![ChatMessage::user("a")]).unwrap();

    assert!(!graph.set_active_vertex("ghost"));
    assert_eq!(graph.active_vertex(), a);
}

#[test]
fn test_root_cannot_be_deleted() {
    let mut graph = ChatGraph::with_id("r");
    graph.create_vertex("r", vec![ChatMessage::user("a")]).unwrap();

    assert!(graph.delete_vertex("r").is_empty());
    assert_eq!(graph.vertex_count(), 2);
}

#[test]
fn test_snapshot_roundtrip_preserves_graph() {
    let mut graph = ChatGraph::with_root_messages("r", vec![ChatMessage::assistant("greeting")]);
    let a = graph.create_vertex("r", vec![ChatMessage::user("a")]).unwrap();
    let a1 = graph.create_vertex(&a, vec![ChatMessage::assistant("a1")]).unwrap();
    let b = graph.create_vertex("r", vec![ChatMessage::user("b")]).unwrap();
    graph.set_active_vertex(&a1);
    graph.set_active_vertex(&b);

    let snapshot = graph.save();
    let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
    let restored = ChatGraph::load(serde_json::from_str(&json).expect("parse snapshot"));

    assert_eq!(restored.save(), snapshot);
    assert_eq!(restored.active_vertex(), b);
    assert_eq!(texts(&restored.flatten()), vec!["greeting", "b"]);
    assert_eq!(restored.get_target_sibling(&b, 1).unwrap().leaf_id, a1);
    restored.check_integrity().expect("integrity after load");
}

#[test]
fn test_divergence_counts_shared_messages() {
    let mut graph = ChatGraph::with_root_messages("r", vec![ChatMessage::assistant("hello")]);
    let a = graph.create_vertex("r", vec![ChatMessage::user("a")]).unwrap();
    let a1 = graph.create_vertex(&a, vec![ChatMessage::assistant("a1")]).unwrap();
    let a2 = graph.branch_from(&a, vec![ChatMessage::assistant("a2")]).unwrap();

    let divergence = graph.divergence(&a1, &a2);
    assert_eq!(divergence.shared_vertices, 2);
    assert_eq!(divergence.message_index, 2);
}

#[test]
fn test_load_snapshot_without_root_inserts_empty_root() {
    let mut graph = ChatGraph::with_id("r");
    let a = graph.create_vertex("r", vec![ChatMessage::user("a")]).unwrap();
    let mut snapshot = graph.save();
    snapshot.vertices.retain(|vertex| vertex.id != "r");

    let restored = ChatGraph::load(snapshot);

    let root = restored.get_vertex("r").expect("root inserted");
    assert!(root.is_root());
    assert!(root.messages.is_empty());
    assert_eq!(restored.active_vertex(), a);
}

#[test]
fn test_tree_invariant_holds_across_mixed_operations() {
    let mut graph = ChatGraph::with_root_messages("r", vec![ChatMessage::assistant("hi")]);
    let a = graph.create_vertex("r", vec![ChatMessage::user("a")]).unwrap();
    graph.check_integrity().expect("after create a");
    let a1 = graph.create_vertex(&a, vec![ChatMessage::assistant("a1")]).unwrap();
    graph.check_integrity().expect("after create a1");
    let a2 = graph.create_vertex(&a1, vec![ChatMessage::user("a2")]).unwrap();
    graph.check_integrity().expect("after create a2");
    let a1b = graph.branch_from(&a, vec![ChatMessage::assistant("a1b")]).unwrap();
    graph.check_integrity().expect("after branch a1b");
    let b = graph.create_vertex("r", vec![ChatMessage::user("b")]).unwrap();
    graph.check_integrity().expect("after create b");

    // Remember a2 as the terminal for both a and a1, then leave the branch
    assert!(graph.set_active_vertex(&a2));
    graph.check_integrity().expect("after activating a2");
    assert_eq!(graph.terminal_for(&a), Some(a2.as_str()));
    assert_eq!(graph.terminal_for(&a1), Some(a2.as_str()));
    assert!(graph.set_active_vertex(&b));
    graph.check_integrity().expect("after activating b");

    let target = graph.get_target_sibling(&b, 1).unwrap();
    assert_eq!(target.leaf_id, a2);

    // Dropping the branch that holds the remembered terminal forgets it
    let removed = graph.delete_vertex(&a1);
    assert_eq!(removed, vec![a1.clone(), a2.clone()]);
    graph.check_integrity().expect("after deleting a1");
    assert_eq!(graph.terminal_for(&a), None);
    assert_eq!(graph.terminal_for(&a1), None);
    assert_eq!(graph.active_vertex(), b);

    let target = graph.get_target_sibling(&b, 1).unwrap();
    assert_eq!(target.sibling_id, a);
    assert_eq!(target.leaf_id, a1b);
    assert!(graph.set_active_vertex(&target.leaf_id));
    graph.check_integrity().expect("after cycling to a");
    assert_eq!(texts(&graph.flatten()), vec!["hi", "a", "a1b"]);

    let a1b_next = graph
        .create_vertex(&a1b, vec![ChatMessage::user("again")])
        .unwrap();
    graph.check_integrity().expect("after create under a1b");
    let back = graph.get_target_sibling(&a, -1).unwrap();
    assert_eq!(back.sibling_id, b);
    assert!(graph.set_active_vertex(&back.leaf_id));
    graph.check_integrity().expect("after cycling to b");

    // Deleting the active branch moves activity onto the surviving sibling
    graph.delete_vertex(&b);
    graph.check_integrity().expect("after deleting b");
    assert_eq!(graph.active_vertex(), a);
    assert_eq!(graph.get_target_sibling(&a, 1), None);
    assert!(graph.set_active_vertex(&a1b_next));
    graph.check_integrity().expect("after activating the deepest leaf");
    assert_eq!(texts(&graph.flatten()), vec!["hi", "a", "a1b", "again"]);
    assert_eq!(graph.vertex_count(), 4);
}
