//! Property tests for the envelope wire format.

use kqsp_proto::{Envelope, MessageType, WirePayload, latin1};
use proptest::prelude::*;

fn arbitrary_envelope() -> impl Strategy<Value = Envelope> {
    let from = "K\\([0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\)";
    let bytes = proptest::collection::vec(any::<u8>(), 0..256);

    prop_oneof![
        (from, bytes.clone()).prop_map(|(from, ct)| Envelope::text(from, &ct)),
        (from, bytes.clone()).prop_map(|(from, ct)| Envelope::system(from, &ct)),
        (from, "[a-zA-Z0-9_.]{1,16}", any::<bool>(), bytes.clone())
            .prop_map(|(from, name, protected, ct)| Envelope::file(from, name, protected, ct)),
        (from, "audio/[a-z]{2,8}", bytes)
            .prop_map(|(from, mime, ct)| Envelope::audio(from, mime, ct)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn latin1_carrier_preserves_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(latin1::decode(&latin1::encode(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn envelope_survives_both_transports(
        envelope in arbitrary_envelope(),
        binary in any::<bool>()
    ) {
        let payload = WirePayload::encode(&envelope, binary).unwrap();
        prop_assert_eq!(payload.decode().unwrap(), envelope);
    }

    #[test]
    fn text_ciphertext_is_recoverable_after_transit(
        ct in proptest::collection::vec(any::<u8>(), 0..256)
    ) {
        let payload = WirePayload::encode(&Envelope::text("K(1.1.1.1)", &ct), false).unwrap();
        let received = payload.decode().unwrap();

        prop_assert_eq!(&received.kind, &MessageType::Text);
        prop_assert_eq!(received.text_ciphertext().unwrap(), ct);
    }

    #[test]
    fn unknown_tags_never_fail_to_parse(tag in "[a-z]{1,10}") {
        let json = format!(r#"{{"type":"{tag}","from":"x"}}"#);
        let envelope = Envelope::from_json(&json).unwrap();

        prop_assert_eq!(envelope.kind.as_str(), tag.as_str());
    }
}
