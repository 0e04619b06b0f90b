//! Ordering and failure behavior of the executor.

mod common;

use common::{FailingNode, GatedNode, RecordingNode, RunLog, started_executor, wait_until};
use std::sync::Arc;
use std::thread;
use tessel_core::error::TesselError;
use tessel_core::traits::Node;
use tessel_executor::scheduler::Health;

#[test]
fn nodes_from_many_threads_run_in_id_order() {
    let executor = Arc::new(started_executor());
    let log = RunLog::default();
    let submit = Arc::new(parking_lot::Mutex::new(()));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let executor = Arc::clone(&executor);
            let log = Arc::clone(&log);
            let submit = Arc::clone(&submit);
            thread::spawn(move || {
                for _ in 0..25 {
                    let _guard = submit.lock();
                    let (node, _) = RecordingNode::new(&executor, &log);
                    executor.add(node);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    executor.wait_for_all_pending().unwrap();
    let ran = log.lock().clone();
    assert_eq!(ran.len(), 100);
    assert!(ran.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(executor.stats().completed, 100);
}

#[test]
fn failure_in_the_middle_discards_the_rest() {
    let executor = started_executor();
    let log = RunLog::default();

    let (first, first_out) = RecordingNode::new(&executor, &log);
    let failing = FailingNode::new(&executor);
    let failing_id = failing.id();
    let (third, third_out) = RecordingNode::new(&executor, &log);

    executor.add(first);
    executor.add(failing);
    executor.add(third);

    assert_eq!(*first_out.value().unwrap(), first_out.producer());

    let err = third_out.value().unwrap_err();
    assert_eq!(err.node_id(), Some(failing_id));
    assert!(!third_out.is_ready());

    let status = executor.status().unwrap_err();
    assert_eq!(status, TesselError::node_failed(failing_id, "injected failure"));
    assert_eq!(*log.lock(), vec![first_out.producer()]);
}

#[test]
fn sticky_error_survives_until_cleared() {
    let executor = started_executor();
    let log = RunLog::default();

    executor.add(FailingNode::new(&executor));
    assert!(executor.wait_for_all_pending().is_err());

    let (late, late_out) = RecordingNode::new(&executor, &log);
    executor.add(late);
    assert!(matches!(executor.health(), Health::Failed(_)));
    assert!(late_out.value().is_err());
    assert!(log.lock().is_empty());

    wait_until(|| executor.pending_len() == 0);
    executor.clear_error().unwrap();
    assert_eq!(executor.health(), Health::Healthy);

    let (next, next_out) = RecordingNode::new(&executor, &log);
    executor.add(next);
    assert_eq!(*next_out.value().unwrap(), next_out.producer());
}

#[test]
fn out_of_order_submission_poisons_the_executor() {
    let executor = started_executor();
    let log = RunLog::default();

    let (gated, gate) = GatedNode::new(&executor);
    let gated_id = gated.id();
    executor.add(gated);
    gate.wait_entered();
    let (queued, queued_out) = RecordingNode::new(&executor, &log);
    let queued_id = queued.id();
    executor.add(queued);

    executor.add(RecordingNode::with_id(gated_id, &log));
    assert_eq!(
        executor.status(),
        Err(TesselError::OrderingViolation {
            last: queued_id,
            got: gated_id,
        })
    );

    gate.open();
    assert!(queued_out.value().is_err());
    wait_until(|| executor.pending_len() == 0);
    assert!(log.lock().is_empty());
    assert_eq!(executor.stats().discarded, 2);
}

#[test]
fn clear_error_waits_for_the_running_node() {
    let executor = started_executor();
    let log = RunLog::default();

    let (gated, gate) = GatedNode::new(&executor);
    let gated_id = gated.id();
    executor.add(gated);
    gate.wait_entered();

    // Duplicate id while the gated node runs.
    executor.add(RecordingNode::with_id(gated_id, &log));
    assert!(executor.status().is_err());

    match executor.clear_error() {
        Err(TesselError::ClearWhileBusy { pending, waiters }) => {
            assert_eq!(pending, 1);
            assert_eq!(waiters, 0);
        }
        other => panic!("expected ClearWhileBusy, got {other:?}"),
    }

    gate.open();
    wait_until(|| executor.pending_len() == 0);
    executor.clear_error().unwrap();
    executor.status().unwrap();
}

#[test]
fn panics_become_sticky_errors() {
    struct Panics(tessel_core::types::NodeId);

    impl Node for Panics {
        fn id(&self) -> tessel_core::types::NodeId {
            self.0
        }

        fn run(&mut self) -> tessel_core::error::Result<()> {
            panic!("index out of range: {}", 3);
        }
    }

    let executor = started_executor();
    let log = RunLog::default();
    let panicking = Panics(executor.next_id());
    let (after, after_out) = RecordingNode::new(&executor, &log);
    executor.add(panicking);
    executor.add(after);

    match after_out.value() {
        Err(TesselError::NodePanic { message, .. }) => {
            assert_eq!(message, "index out of range: 3");
        }
        other => panic!("expected NodePanic, got {other:?}"),
    }
    assert!(log.lock().is_empty());
    assert_eq!(executor.stats().failed, 1);
}

#[test]
fn panicking_drop_poisons_instead_of_killing_the_worker() {
    struct PanicsOnDrop(tessel_core::types::NodeId);

    impl Node for PanicsOnDrop {
        fn id(&self) -> tessel_core::types::NodeId {
            self.0
        }

        fn run(&mut self) -> tessel_core::error::Result<()> {
            Ok(())
        }
    }

    impl Drop for PanicsOnDrop {
        fn drop(&mut self) {
            panic!("dropped badly");
        }
    }

    let executor = started_executor();
    let log = RunLog::default();
    let bad = PanicsOnDrop(executor.next_id());
    let bad_id = bad.id();
    let (after, after_out) = RecordingNode::new(&executor, &log);
    executor.add(bad);
    executor.add(after);

    let err = executor.wait_for_all_pending().unwrap_err();
    assert_eq!(
        err,
        TesselError::NodePanic {
            node_id: bad_id,
            message: "dropped badly".to_string(),
        }
    );
    assert_eq!(executor.status(), Err(err));
    assert!(after_out.value().is_err());
    assert!(log.lock().is_empty());

    // The worker is still alive once the error is cleared.
    wait_until(|| executor.pending_len() == 0);
    executor.clear_error().unwrap();
    let (next, next_out) = RecordingNode::new(&executor, &log);
    executor.add(next);
    assert_eq!(*next_out.value().unwrap(), next_out.producer());
}
