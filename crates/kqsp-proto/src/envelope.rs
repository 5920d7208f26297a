//! Peer-to-peer message envelope.
//!
//! # Wire Shape
//!
//! ```text
//! {"type":"text","from":"K(1.2.3.4)","text":"<latin-1 ciphertext>"}
//! {"type":"file","from":"K(1.2.3.4)","filename":"a.txt","protected":true,"data":<bytes>}
//! {"type":"audio","from":"K(1.2.3.4)","mimeType":"audio/webm","data":<bytes>}
//! ```
//!
//! Optional fields are omitted when absent. The `type` tag is an open set:
//! unknown tags deserialize into [`MessageType::Other`] so the receiver can
//! report them instead of failing to parse.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    latin1,
};

/// Upper bound on a single encoded envelope.
///
/// Checked before parsing so a hostile peer cannot make the decoder allocate
/// without limit.
pub const MAX_ENVELOPE_SIZE: usize = 64 * 1024 * 1024;

/// Envelope type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Chat text, ciphertext in `text`.
    Text,
    /// Audio clip, ciphertext in `data`, format in `mimeType`.
    Audio,
    /// File, ciphertext in `data`, metadata in `filename` and `protected`.
    File,
    /// Peer-originated notice, ciphertext in `text`.
    System,
    /// Any tag this version does not understand.
    Other(String),
}

impl MessageType {
    /// Tag as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::File => "file",
            Self::System => "system",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => Self::Text,
            "audio" => Self::Audio,
            "file" => Self::File,
            "system" => Self::System,
            _ => Self::Other(tag),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chat message as exchanged between peers.
///
/// Payload fields always hold ciphertext produced under the sender's key at
/// send time. This type does not encrypt or decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Type tag.
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Sender's display address. A label only, never a routing key.
    pub from: String,

    /// Text ciphertext in its Latin-1 carrier form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Original file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Whether the file is under a password key rather than the group secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,

    /// Binary ciphertext for file and audio payloads.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub data: Option<Vec<u8>>,

    /// Media type of an audio payload.
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Envelope {
    fn bare(kind: MessageType, from: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            text: None,
            filename: None,
            protected: None,
            data: None,
            mime_type: None,
        }
    }

    /// Text envelope carrying `ciphertext`.
    pub fn text(from: impl Into<String>, ciphertext: &[u8]) -> Self {
        Self { text: Some(latin1::encode(ciphertext)), ..Self::bare(MessageType::Text, from) }
    }

    /// System notice envelope carrying `ciphertext`.
    pub fn system(from: impl Into<String>, ciphertext: &[u8]) -> Self {
        Self { text: Some(latin1::encode(ciphertext)), ..Self::bare(MessageType::System, from) }
    }

    /// File envelope.
    pub fn file(
        from: impl Into<String>,
        filename: impl Into<String>,
        protected: bool,
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            filename: Some(filename.into()),
            protected: Some(protected),
            data: Some(ciphertext),
            ..Self::bare(MessageType::File, from)
        }
    }

    /// Audio envelope.
    pub fn audio(
        from: impl Into<String>,
        mime_type: impl Into<String>,
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            data: Some(ciphertext),
            ..Self::bare(MessageType::Audio, from)
        }
    }

    /// Raw ciphertext bytes of the `text` field.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingField` if `text` is absent
    /// - `ProtocolError::NotLatin1` if the carrier string is not Latin-1
    pub fn text_ciphertext(&self) -> Result<Vec<u8>> {
        let text = self.text.as_deref().ok_or(ProtocolError::MissingField("text"))?;
        latin1::decode(text)
    }

    /// Raw ciphertext bytes of the `data` field.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingField` if `data` is absent
    pub fn data_ciphertext(&self) -> Result<&[u8]> {
        self.data.as_deref().ok_or(ProtocolError::MissingField("data"))
    }

    /// Encode as a compact JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::JsonEncode(e.to_string()))
    }

    /// Decode from JSON text.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if `json` exceeds [`MAX_ENVELOPE_SIZE`]
    /// - `ProtocolError::JsonDecode` if parsing fails
    pub fn from_json(json: &str) -> Result<Self> {
        check_size(json.len())?;
        serde_json::from_str(json).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
    }

    /// Encode as CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(out)
    }

    /// Decode from CBOR.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if `bytes` exceed [`MAX_ENVELOPE_SIZE`]
    /// - `ProtocolError::CborDecode` if parsing fails
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        check_size(bytes.len())?;
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }
}

fn check_size(size: usize) -> Result<()> {
    if size > MAX_ENVELOPE_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size, max: MAX_ENVELOPE_SIZE });
    }
    Ok(())
}
