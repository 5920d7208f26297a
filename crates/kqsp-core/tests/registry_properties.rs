//! Registry behaviour under arbitrary open/close sequences.

use std::collections::BTreeSet;

use kqsp_core::{ConnectionRegistry, Direction, PeerId};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Open(String),
    Close(String),
}

fn op() -> impl Strategy<Value = Op> {
    let peer = prop_oneof![Just("me"), Just("a"), Just("b"), Just("c"), Just("d")];
    prop_oneof![
        peer.clone().prop_map(|p| Op::Open(p.to_owned())),
        peer.prop_map(|p| Op::Close(p.to_owned())),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn snapshot_tracks_model(ops in proptest::collection::vec(op(), 0..64)) {
        let mut registry: ConnectionRegistry<usize> = ConnectionRegistry::new();
        registry.bind_local(PeerId::from("me"));
        let mut model: BTreeSet<String> = BTreeSet::new();

        for (handle, op) in ops.into_iter().enumerate() {
            match op {
                Op::Open(peer) => {
                    let id = PeerId::from(peer.as_str());
                    let accepted = registry.add(id, handle, Direction::Inbound).is_ok();
                    let expected = peer != "me" && model.insert(peer);
                    prop_assert_eq!(accepted, expected);
                },
                Op::Close(peer) => {
                    let removed = registry.remove(&peer).is_some();
                    prop_assert_eq!(removed, model.remove(&peer));
                },
            }

            let snapshot: BTreeSet<String> =
                registry.snapshot().into_iter().map(PeerId::into_string).collect();
            prop_assert_eq!(&snapshot, &model);
            prop_assert!(!registry.has("me"));
            prop_assert!(registry.iter().all(|c| c.is_open()));
        }
    }
}
