use std::cmp::Ordering;

use proptest::prelude::*;
use taskd_core::domain::TaskId;
use taskd_core::scheduler::{OrderKey, OrderingPolicy};

// Small ranges so ties on every tier actually happen.
fn key_strategy() -> impl Strategy<Value = OrderKey> {
    (
        prop_oneof![Just(-1i64), 0..5i64],
        prop_oneof![Just(-1i64), 0..5i64],
        prop_oneof![Just(-1i64), 0..5i64],
        "[a-d]{1,2}",
    )
        .prop_map(|(completion, actual, scheduled, id)| OrderKey {
            completion_time: completion,
            actual_start_time: actual,
            scheduled_start_time: scheduled,
            task_id: TaskId::new(id),
        })
}

proptest! {
    #[test]
    fn order_is_antisymmetric(a in key_strategy(), b in key_strategy()) {
        prop_assert_eq!(
            OrderingPolicy::compare_keys(&a, &b),
            OrderingPolicy::compare_keys(&b, &a).reverse()
        );
    }

    #[test]
    fn equal_only_when_ids_match(a in key_strategy(), b in key_strategy()) {
        let equal = OrderingPolicy::compare_keys(&a, &b) == Ordering::Equal;
        if a.task_id != b.task_id {
            prop_assert!(!equal);
        }
    }

    #[test]
    fn order_is_transitive(a in key_strategy(), b in key_strategy(), c in key_strategy()) {
        let ab = OrderingPolicy::compare_keys(&a, &b);
        let bc = OrderingPolicy::compare_keys(&b, &c);
        if ab != Ordering::Greater && bc != Ordering::Greater {
            prop_assert_ne!(OrderingPolicy::compare_keys(&a, &c), Ordering::Greater);
        }
    }

    #[test]
    fn sorting_is_independent_of_input_order(
        keys in proptest::collection::vec(key_strategy(), 0..12)
    ) {
        // ID が重複すると同順位になり得るので一意にする
        let mut keys = keys;
        keys.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        keys.dedup_by(|a, b| a.task_id == b.task_id);

        let mut forward = keys.clone();
        forward.sort_by(OrderingPolicy::compare_keys);
        let mut backward: Vec<OrderKey> = keys.into_iter().rev().collect();
        backward.sort_by(OrderingPolicy::compare_keys);

        prop_assert_eq!(forward, backward);
    }
}
