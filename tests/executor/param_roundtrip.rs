//! Worker-private parameter copies must equal the originals.

use htmbench::workloads::{MicroConfig, MicroParam, MicroWorkload};
use htmbench::{TxnParam, Workload};
use proptest::prelude::*;

const SLOTS: usize = 16;

fn micro_param() -> impl Strategy<Value = MicroParam> {
    prop_oneof![
        (0..SLOTS, any::<i64>()).prop_map(|(slot, delta)| MicroParam::Increment { slot, delta }),
        (0..SLOTS, 0..SLOTS, any::<i64>())
            .prop_map(|(from, to, amount)| MicroParam::Transfer { from, to, amount }),
    ]
}

proptest! {
    #[test]
    fn deserialized_copy_equals_original(param in micro_param()) {
        let workload = MicroWorkload::new(MicroConfig { slots: SLOTS, ..Default::default() });
        let mut bytes = Vec::new();
        param.serialize_into(&mut bytes).unwrap();

        let copy = workload.deserialize_param(param.txn_type(), &bytes).unwrap();
        prop_assert_eq!(copy, param);
        prop_assert_eq!(copy.txn_type(), param.txn_type());
    }
}

#[test]
fn truncated_payload_is_serialization_error() {
    let workload = MicroWorkload::new(MicroConfig::default());
    let mut bytes = Vec::new();
    MicroParam::Transfer {
        from: 1,
        to: 2,
        amount: 3,
    }
    .serialize_into(&mut bytes)
    .unwrap();
    bytes.truncate(bytes.len() / 2);

    let err = workload
        .deserialize_param(MicroParam::TRANSFER, &bytes)
        .unwrap_err();
    assert!(err.is_serialization());
}
