//! Subscriber registry under random register/unregister interleavings.

use std::collections::HashMap;
use std::sync::Arc;

use changecast::auth::Identity;
use changecast::realtime::{Connection, ConnectionReceiver, SubscriberRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SUBJECTS: [&str; 4] = ["D1", "D2", "D3", "D4"];

fn identity(n: usize) -> Identity {
    Identity::new(format!("user-{n}"), format!("user-{n}@example.com"))
}

#[test]
fn random_interleavings_keep_both_maps_in_step() {
    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let registry = SubscriberRegistry::new();
        let pool: Vec<(Connection, ConnectionReceiver)> =
            (0..12).map(|_| Connection::channel(4)).collect();

        // Reference model: connection index -> subject
        let mut model: HashMap<usize, &str> = HashMap::new();

        for _ in 0..400 {
            let index = rng.gen_range(0..pool.len());
            let connection = &pool[index].0;

            if rng.gen_bool(0.6) {
                let subject = SUBJECTS[rng.gen_range(0..SUBJECTS.len())];
                registry.register(connection, subject, identity(index));
                model.insert(index, subject);
            } else {
                let removed = registry.unregister(&connection.id());
                assert_eq!(removed.is_some(), model.remove(&index).is_some());
            }

            assert!(registry.is_consistent(), "seed {seed} broke the registry");
        }

        assert_eq!(registry.total_connections(), model.len());
        for subject in SUBJECTS {
            let expected = model.values().filter(|s| **s == subject).count();
            assert_eq!(registry.count_for(subject), expected, "seed {seed}, {subject}");
        }
        let occupied = SUBJECTS
            .iter()
            .filter(|subject| model.values().any(|s| s == *subject))
            .count();
        assert_eq!(registry.subjects_with_subscribers(), occupied);
    }
}

#[test]
fn double_register_same_subject_counts_once() {
    let registry = SubscriberRegistry::new();
    let (connection, _rx) = Connection::channel(4);

    registry.register(&connection, "D1", identity(1));
    registry.register(&connection, "D1", identity(1));

    assert_eq!(registry.count_for("D1"), 1);
    assert_eq!(registry.total_connections(), 1);
}

#[test]
fn reregister_moves_connection() {
    let registry = SubscriberRegistry::new();
    let (connection, _rx) = Connection::channel(4);

    registry.register(&connection, "D1", identity(1));
    registry.register(&connection, "D2", identity(1));

    assert_eq!(registry.count_for("D1"), 0);
    assert_eq!(registry.count_for("D2"), 1);
    assert_eq!(registry.subjects_with_subscribers(), 1);
}

#[test]
fn unknown_unregister_is_noop() {
    let registry = SubscriberRegistry::new();
    let (connection, _rx) = Connection::channel(4);

    assert!(registry.unregister(&connection.id()).is_none());
    assert_eq!(registry.total_connections(), 0);
}

#[test]
fn concurrent_register_unregister_from_threads() {
    let registry = Arc::new(SubscriberRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t);
                let pool: Vec<_> = (0..8).map(|_| Connection::channel(1)).collect();
                for _ in 0..200 {
                    let (connection, _) = &pool[rng.gen_range(0..pool.len())];
                    if rng.gen_bool(0.5) {
                        let subject = SUBJECTS[rng.gen_range(0..SUBJECTS.len())];
                        registry.register(connection, subject, identity(t as usize));
                    } else {
                        registry.unregister(&connection.id());
                    }
                }
                for (connection, _) in &pool {
                    registry.unregister(&connection.id());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(registry.is_consistent());
    assert_eq!(registry.total_connections(), 0);
    assert_eq!(registry.subjects_with_subscribers(), 0);
}
