//! Property tests for the media row invariants

#![allow(clippy::unwrap_used, clippy::expect_used)]

use at_common::hash::{is_canonical_hash, normalize_hash};
use at_common::types::{MediaItem, PipelineStatus, RejectionStatus};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Reject(String),
    Accept,
    SetError(String),
    ClearError,
    Reset,
    Settle(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[a-z ]{1,20}".prop_map(Op::Reject),
        Just(Op::Accept),
        "[a-z ]{1,20}".prop_map(Op::SetError),
        Just(Op::ClearError),
        Just(Op::Reset),
        (0..PipelineStatus::ALL.len()).prop_map(Op::Settle),
    ]
}

fn apply(item: &mut MediaItem, op: &Op) {
    match op {
        Op::Reject(reason) => {
            item.reject(reason.clone());
        }
        Op::Accept => item.accept(),
        Op::SetError(cond) => item.set_error(cond.clone()),
        Op::ClearError => item.clear_error(),
        Op::Reset => item.reset_to_ingested(),
        Op::Settle(idx) => {
            let _ = item.settle(PipelineStatus::ALL[*idx]);
        }
    }
}

proptest! {
    #[test]
    fn test_hash_normalization_is_canonical(hash in "[0-9a-fA-F]{40}") {
        let normalized = normalize_hash(&hash).unwrap();
        prop_assert!(is_canonical_hash(&normalized));
        prop_assert_eq!(normalized, hash.to_lowercase());
    }

    #[test]
    fn test_invariants_hold_under_any_operation_sequence(
        ops in prop::collection::vec(op(), 0..30),
        start_override in any::<bool>(),
    ) {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "Some Title").unwrap();
        if start_override {
            item.rejection_status = RejectionStatus::Override;
        }

        for op in &ops {
            apply(&mut item, op);
            prop_assert!(item.validate_invariants().is_ok(), "{:?} after {:?}", item, op);
        }

        if start_override {
            prop_assert_eq!(item.rejection_status, RejectionStatus::Override);
            prop_assert_ne!(item.pipeline_status, PipelineStatus::Rejected);
        }
    }
}
