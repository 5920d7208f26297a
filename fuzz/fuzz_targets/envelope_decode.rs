//! Fuzz target for envelope decoding
//!
//! Feeds arbitrary bytes through both wire forms and, when an envelope comes
//! out, through the message codec:
//! - CBOR bodies with missing, duplicated or mistyped fields
//! - JSON text with stray escapes and out-of-range Latin-1 code points
//! - Type tags the codec does not know
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use kqsp_client::MessageCodec;
use kqsp_crypto::{XorCipher, derive_group_secret};
use kqsp_proto::WirePayload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let secret = derive_group_secret("fuzz-a", ["fuzz-b"]).ok();

    let binary = WirePayload::Binary(data.to_vec());
    let text = WirePayload::Text(String::from_utf8_lossy(data).into_owned());

    for payload in [binary, text] {
        if let Ok(envelope) = payload.decode() {
            let _ = MessageCodec::decode(&XorCipher, &envelope, secret.as_ref());
            let _ = MessageCodec::decode(&XorCipher, &envelope, None);
        }
    }
});
