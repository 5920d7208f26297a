//! Message envelope codec.
//!
//! Applies the group cipher to text, system and audio payloads on the way
//! out and reverses it on the way in. File envelopes pass through decode
//! untouched; [`crate::FileTransferCodec`] owns their keying.
//!
//! Decoding is unauthenticated. Text deciphered under the wrong secret comes
//! out as garbage (decoded lossily as UTF-8), not as an error.

use kqsp_crypto::{Cipher, SecretKey};
use kqsp_proto::{Envelope, MessageType};

use crate::{error::DecodeError, file_transfer::IncomingFile};

/// A received envelope after deciphering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    /// Chat text.
    Text {
        /// Sender display address
        from: String,
        /// Plaintext
        text: String,
    },
    /// Peer-originated notice.
    System {
        /// Sender display address
        from: String,
        /// Plaintext
        text: String,
    },
    /// Audio clip.
    Audio {
        /// Sender display address
        from: String,
        /// Media type
        mime_type: String,
        /// Audio bytes
        data: Vec<u8>,
    },
    /// File, still enciphered.
    File(IncomingFile),
}

/// Encoder and decoder for non-file envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Cipher `plaintext` under `secret` into a `text` envelope from `sender`.
    pub fn encode_text<C: Cipher>(
        cipher: &C,
        plaintext: &str,
        secret: Option<&SecretKey>,
        sender: &str,
    ) -> Envelope {
        Envelope::text(sender, &cipher.encrypt(key_bytes(secret), plaintext.as_bytes()))
    }

    /// Cipher `plaintext` under `secret` into a `system` envelope.
    pub fn encode_system<C: Cipher>(
        cipher: &C,
        plaintext: &str,
        secret: Option<&SecretKey>,
        sender: &str,
    ) -> Envelope {
        Envelope::system(sender, &cipher.encrypt(key_bytes(secret), plaintext.as_bytes()))
    }

    /// Cipher audio bytes under `secret` into an `audio` envelope.
    pub fn encode_audio<C: Cipher>(
        cipher: &C,
        mime_type: &str,
        data: &[u8],
        secret: Option<&SecretKey>,
        sender: &str,
    ) -> Envelope {
        Envelope::audio(sender, mime_type, cipher.encrypt(key_bytes(secret), data))
    }

    /// Decipher an envelope under `secret`.
    ///
    /// # Errors
    ///
    /// - `DecodeError::UnhandledType` for unknown type tags
    /// - `DecodeError::Malformed` if a field required by the type is missing
    /// - `DecodeError::Cipher` if the cipher rejects the ciphertext
    pub fn decode<C: Cipher>(
        cipher: &C,
        envelope: &Envelope,
        secret: Option<&SecretKey>,
    ) -> Result<DecodedMessage, DecodeError> {
        let key = key_bytes(secret);
        match &envelope.kind {
            MessageType::Text => {
                let plaintext = cipher.decrypt(key, &envelope.text_ciphertext()?)?;
                Ok(DecodedMessage::Text { from: envelope.from.clone(), text: lossy(&plaintext) })
            },
            MessageType::System => {
                let plaintext = cipher.decrypt(key, &envelope.text_ciphertext()?)?;
                Ok(DecodedMessage::System { from: envelope.from.clone(), text: lossy(&plaintext) })
            },
            MessageType::Audio => {
                let data = cipher.decrypt(key, envelope.data_ciphertext()?)?;
                Ok(DecodedMessage::Audio {
                    from: envelope.from.clone(),
                    mime_type: envelope.mime_type.clone().unwrap_or_default(),
                    data,
                })
            },
            MessageType::File => IncomingFile::from_envelope(envelope).map(DecodedMessage::File),
            MessageType::Other(kind) => Err(DecodeError::UnhandledType { kind: kind.clone() }),
        }
    }
}

pub(crate) fn key_bytes(secret: Option<&SecretKey>) -> Option<&[u8]> {
    secret.map(|key| key.as_bytes().as_slice())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use kqsp_crypto::{XorCipher, derive_group_secret};

    use super::*;

    fn secret(members: &[&str]) -> SecretKey {
        derive_group_secret(members[0], members[1..].iter().copied()).unwrap()
    }

    #[test]
    fn text_round_trip() {
        let key = secret(&["a", "b"]);
        let envelope = MessageCodec::encode_text(&XorCipher, "hi", Some(&key), "K(1.2.3.4)");

        assert_ne!(envelope.text.as_deref(), Some("hi"));
        assert_eq!(
            MessageCodec::decode(&XorCipher, &envelope, Some(&key)).unwrap(),
            DecodedMessage::Text { from: "K(1.2.3.4)".into(), text: "hi".into() }
        );
    }

    #[test]
    fn multibyte_text_round_trip() {
        let key = secret(&["a", "b"]);
        let envelope = MessageCodec::encode_text(&XorCipher, "héllo ✓", Some(&key), "x");

        let DecodedMessage::Text { text, .. } =
            MessageCodec::decode(&XorCipher, &envelope, Some(&key)).unwrap()
        else {
            panic!("expected text");
        };
        assert_eq!(text, "héllo ✓");
    }

    #[test]
    fn wrong_secret_yields_garbage_not_error() {
        let envelope =
            MessageCodec::encode_text(&XorCipher, "hello there", Some(&secret(&["a", "b"])), "x");

        let decoded =
            MessageCodec::decode(&XorCipher, &envelope, Some(&secret(&["a", "b", "c"]))).unwrap();

        assert!(matches!(decoded, DecodedMessage::Text { ref text, .. } if text != "hello there"));
    }

    #[test]
    fn keyless_text_is_plaintext_on_the_wire() {
        let envelope = MessageCodec::encode_text(&XorCipher, "hi", None, "x");
        assert_eq!(envelope.text.as_deref(), Some("hi"));
    }

    #[test]
    fn audio_round_trip_keeps_mime_type() {
        let key = secret(&["a", "b"]);
        let envelope =
            MessageCodec::encode_audio(&XorCipher, "audio/webm", &[1, 2, 3], Some(&key), "x");

        assert_eq!(
            MessageCodec::decode(&XorCipher, &envelope, Some(&key)).unwrap(),
            DecodedMessage::Audio {
                from: "x".into(),
                mime_type: "audio/webm".into(),
                data: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn system_round_trip() {
        let key = secret(&["a"]);
        let envelope = MessageCodec::encode_system(&XorCipher, "joined", Some(&key), "x");

        assert!(matches!(
            MessageCodec::decode(&XorCipher, &envelope, Some(&key)).unwrap(),
            DecodedMessage::System { ref text, .. } if text == "joined"
        ));
    }

    #[test]
    fn unknown_type_is_unhandled() {
        let envelope = Envelope::from_json(r#"{"type":"video","from":"x"}"#).unwrap();

        assert_eq!(
            MessageCodec::decode(&XorCipher, &envelope, None),
            Err(DecodeError::UnhandledType { kind: "video".into() })
        );
    }

    #[test]
    fn text_without_payload_is_malformed() {
        let envelope = Envelope::from_json(r#"{"type":"text","from":"x"}"#).unwrap();

        assert!(matches!(
            MessageCodec::decode(&XorCipher, &envelope, None),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn file_passes_through_enciphered() {
        let envelope = Envelope::file("x", "f.txt", true, vec![9, 9]);

        let DecodedMessage::File(file) = MessageCodec::decode(&XorCipher, &envelope, None).unwrap()
        else {
            panic!("expected file");
        };
        assert!(file.protected);
        assert_eq!(file.ciphertext, vec![9, 9]);
    }
}
