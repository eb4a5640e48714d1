mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use voxcall_session_core::prelude::*;

fn idle_session() -> Arc<CallSession> {
    fixture(test_config(), ScriptedSignaling::new(PeerSetup::default())).session
}

#[test]
fn test_registry_enforces_capacity() {
    let registry = CallRegistry::new(2);
    let first = idle_session();
    let second = idle_session();

    let first_id = registry.insert(first.clone()).unwrap();
    registry.insert(second).unwrap();
    assert_eq!(registry.len(), 2);

    assert!(matches!(
        registry.insert(idle_session()),
        Err(SessionError::Capacity(_))
    ));

    // Replacing an existing entry is not growth
    registry.insert(first).unwrap();
    assert_eq!(registry.len(), 2);

    assert!(registry.remove(&first_id).is_some());
    registry.insert(idle_session()).unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_active_calls_and_pruning() {
    init_test_logging();
    let registry = CallRegistry::new(4);
    let idle = idle_session();
    let f = fixture(test_config(), ScriptedSignaling::new(PeerSetup::default()));

    let idle_id = registry.insert(idle).unwrap();
    let busy_id = registry.insert(f.session.clone()).unwrap();
    assert!(registry.active_calls().is_empty());

    f.session.start("sip:bob@example.com").unwrap();
    assert_eq!(registry.active_calls(), vec![busy_id]);
    assert!(registry.get(&busy_id).is_some());

    f.session.stop().unwrap();
    assert_eq!(registry.prune_finished(), 1);
    assert!(registry.get(&busy_id).is_none());
    assert!(registry.get(&idle_id).is_some());
    assert!(!registry.is_empty());
}

#[test]
fn test_pruning_counts_only_finished_calls_under_churn() {
    init_test_logging();
    let registry = Arc::new(CallRegistry::new(8));
    let finished: Vec<_> = (0..2)
        .map(|_| {
            let f = fixture(test_config(), ScriptedSignaling::new(PeerSetup::default()));
            f.session.start("sip:bob@example.com").unwrap();
            f.session.stop().unwrap();
            f.session
        })
        .collect();

    let churn = {
        let registry = registry.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let id = registry.insert(idle_session()).unwrap();
                registry.remove(&id);
            }
        })
    };
    for session in finished {
        registry.insert(session).unwrap();
    }

    let mut pruned = 0;
    while !churn.is_finished() {
        pruned += registry.prune_finished();
    }
    churn.join().unwrap();
    pruned += registry.prune_finished();

    assert_eq!(pruned, 2);
    assert!(registry.is_empty());
}
