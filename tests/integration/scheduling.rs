//! Scheduling tests driven from raw request values, the way a node
//! receives them: a string config map plus a transmission id.

use std::collections::HashMap;
use std::time::Duration;

use cairn_core::{delays_for_request, PeerId};

fn peer(i: u8) -> PeerId {
    [i; 32]
}

fn staged_config(delta: &str) -> HashMap<String, String> {
    [
        ("schedule".to_string(), "oneAtATime".to_string()),
        ("deltaStage".to_string(), delta.to_string()),
    ]
    .into_iter()
    .collect()
}

/// Two nodes given the same request values and the same stable peer
/// ordering must compute identical schedules without coordinating.
#[test]
fn independent_nodes_agree_on_the_schedule() {
    let peers: Vec<PeerId> = (0..7).map(peer).collect();
    let values = staged_config("200ms");

    let node_a = delays_for_request(&peers, &values, "workflow-9/step-2").unwrap();
    let node_b = delays_for_request(&peers, &values, "workflow-9/step-2").unwrap();
    assert_eq!(node_a, node_b);

    let mut assigned: Vec<Duration> = node_a.values().copied().collect();
    assigned.sort();
    let expected: Vec<Duration> = (0..7u32).map(|i| Duration::from_millis(200) * i).collect();
    assert_eq!(assigned, expected);
}

/// A node whose peer id is not in the schedule map must not transmit.
/// Here the map's key set is exactly the input population, so any peer
/// outside it gets no slot.
#[test]
fn peers_outside_the_population_get_no_slot() {
    let peers: Vec<PeerId> = (0..4).map(peer).collect();
    let values = staged_config("1s");

    let delays = delays_for_request(&peers, &values, "workflow-9/step-2").unwrap();
    assert_eq!(delays.len(), 4);
    assert!(!delays.contains_key(&peer(200)));
    for p in &peers {
        assert!(delays.contains_key(p));
    }
}

/// An empty config map falls back to the all-at-once default: everyone
/// fires immediately.
#[test]
fn missing_config_defaults_to_all_at_once() {
    let peers: Vec<PeerId> = (0..5).map(peer).collect();
    let delays = delays_for_request(&peers, &HashMap::new(), "workflow-9/step-2").unwrap();
    assert_eq!(delays.len(), 5);
    assert!(delays.values().all(|d| *d == Duration::ZERO));
}

/// Human-readable durations parse the way operators write them.
#[test]
fn delta_stage_accepts_compound_durations() {
    let peers: Vec<PeerId> = (0..2).map(peer).collect();
    let values = staged_config("1m30s");

    let delays = delays_for_request(&peers, &values, "workflow-9/step-2").unwrap();
    let mut assigned: Vec<Duration> = delays.values().copied().collect();
    assigned.sort();
    assert_eq!(assigned, vec![Duration::ZERO, Duration::from_secs(90)]);
}
