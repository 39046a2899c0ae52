//! Total order over task records.
//!
//! Precedence:
//! 1. Completed (completion time > 0) before anything else; earlier completion first.
//! 2. Started (actual start time > 0) before not started; earlier start first.
//! 3. Earlier scheduled start time first.
//!
//! Every tier falls back to the task ID, so two records only compare equal
//! when their IDs do.

use std::cmp::Ordering;

use super::record::TaskRecord;
use crate::domain::TaskId;

/// The fields the order depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub completion_time: i64,
    pub actual_start_time: i64,
    pub scheduled_start_time: i64,
    pub task_id: TaskId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderingPolicy;

impl OrderingPolicy {
    pub fn compare_keys(a: &OrderKey, b: &OrderKey) -> Ordering {
        let tier = |completed: bool, other_completed: bool| match (completed, other_completed) {
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            _ => None,
        };

        let a_done = a.completion_time > 0;
        let b_done = b.completion_time > 0;
        if let Some(order) = tier(a_done, b_done) {
            return order;
        }
        if a_done {
            return a
                .completion_time
                .cmp(&b.completion_time)
                .then_with(|| a.task_id.cmp(&b.task_id));
        }

        let a_started = a.actual_start_time > 0;
        let b_started = b.actual_start_time > 0;
        if let Some(order) = tier(a_started, b_started) {
            return order;
        }
        if a_started {
            return a
                .actual_start_time
                .cmp(&b.actual_start_time)
                .then_with(|| a.task_id.cmp(&b.task_id));
        }

        a.scheduled_start_time
            .cmp(&b.scheduled_start_time)
            .then_with(|| a.task_id.cmp(&b.task_id))
    }

    pub fn sort(records: &mut [TaskRecord]) {
        records.sort_by_cached_key(|r| SortKey(r.order_key()));
    }
}

/// Adapter so `sort_by_cached_key` can use the policy.
struct SortKey(OrderKey);

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderingPolicy::compare_keys(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn key(id: &str, completion: i64, actual: i64, scheduled: i64) -> OrderKey {
        OrderKey {
            completion_time: completion,
            actual_start_time: actual,
            scheduled_start_time: scheduled,
            task_id: TaskId::new(id),
        }
    }

    #[rstest]
    #[case::completed_before_running(key("B", 10, 5, 0), key("A", -1, 5, 0), Ordering::Less)]
    #[case::earlier_completion(key("B", 10, 1, 0), key("A", 20, 1, 0), Ordering::Less)]
    #[case::completion_tie_by_id(key("A", 10, 1, 0), key("B", 10, 1, 0), Ordering::Less)]
    #[case::running_before_pending(key("Z", -1, 5, 0), key("A", -1, -1, 0), Ordering::Less)]
    #[case::earlier_start(key("B", -1, 5, 0), key("A", -1, 9, 0), Ordering::Less)]
    #[case::earlier_schedule(key("B", -1, -1, 100), key("A", -1, -1, 200), Ordering::Less)]
    #[case::schedule_tie_by_id(key("B", -1, -1, 100), key("A", -1, -1, 100), Ordering::Greater)]
    #[case::unset_schedule_first(key("B", -1, -1, -1), key("A", -1, -1, 100), Ordering::Less)]
    fn orders_by_precedence(#[case] a: OrderKey, #[case] b: OrderKey, #[case] expected: Ordering) {
        assert_eq!(OrderingPolicy::compare_keys(&a, &b), expected);
        assert_eq!(OrderingPolicy::compare_keys(&b, &a), expected.reverse());
    }

    #[test]
    fn equal_only_for_same_id() {
        let a = key("A", -1, -1, 100);
        assert_eq!(OrderingPolicy::compare_keys(&a, &a.clone()), Ordering::Equal);
    }
}
