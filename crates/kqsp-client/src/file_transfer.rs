//! File transfer codec.
//!
//! Files travel in `file` envelopes. Unprotected files are ciphered under the
//! group secret like any other payload. Protected files ignore the group
//! secret entirely:
//!
//! ```text
//! password ──SHA-256──> file key
//! FILE_MAGIC ‖ file bytes ──cipher(file key)──> ciphertext
//! ```
//!
//! On receipt, a candidate password is correct when deciphering reveals the
//! 4-byte magic literal. A wrong password re-prompts; cancelling the prompt
//! abandons the file. Nothing here blocks: the prompt is a caller-supplied
//! callback and each incoming file is an independent value.

use kqsp_crypto::{Cipher, FILE_MAGIC, SecretKey, derive_password_key};
use kqsp_proto::Envelope;

use crate::{codec::key_bytes, error::DecodeError};

/// A received file envelope, not yet deciphered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    /// Sender display address
    pub from: String,
    /// File name as sent
    pub filename: String,
    /// Whether a password key was used
    pub protected: bool,
    /// Ciphertext
    pub ciphertext: Vec<u8>,
}

impl IncomingFile {
    /// Extract file fields from an envelope.
    ///
    /// A missing `protected` flag means unprotected.
    ///
    /// # Errors
    ///
    /// - `DecodeError::Malformed` if `filename` or `data` is missing
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, DecodeError> {
        let filename = envelope
            .filename
            .clone()
            .ok_or_else(|| DecodeError::Malformed { reason: "file without filename".into() })?;

        Ok(Self {
            from: envelope.from.clone(),
            filename,
            protected: envelope.protected.unwrap_or(false),
            ciphertext: envelope.data_ciphertext()?.to_vec(),
        })
    }
}

/// What a password prompt is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptRequest<'a> {
    /// File being unlocked
    pub filename: &'a str,
    /// Sender display address
    pub from: &'a str,
    /// 1 for the first prompt, incremented per retry
    pub attempt: u32,
    /// Whether the previous attempt was wrong
    pub wrong_password: bool,
}

/// Source of candidate passwords for a protected file.
///
/// Returning `None` cancels the transfer.
pub trait PasswordPrompt {
    /// Ask for a password.
    fn prompt(&mut self, request: &PromptRequest<'_>) -> Option<String>;
}

impl<F> PasswordPrompt for F
where
    F: FnMut(&PromptRequest<'_>) -> Option<String>,
{
    fn prompt(&mut self, request: &PromptRequest<'_>) -> Option<String> {
        self(request)
    }
}

/// Result of decoding a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// File contents.
    Decrypted(Vec<u8>),
    /// The user cancelled the password prompt.
    Cancelled,
}

/// Encoder and decoder for file envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransferCodec;

impl FileTransferCodec {
    /// Build a file envelope.
    ///
    /// With a non-empty `password` the bytes are prefixed with [`FILE_MAGIC`]
    /// and ciphered under the password key. Otherwise they are ciphered under
    /// `secret`.
    pub fn encode_file<C: Cipher>(
        cipher: &C,
        data: &[u8],
        secret: Option<&SecretKey>,
        password: Option<&str>,
        filename: &str,
        sender: &str,
    ) -> Envelope {
        match password.filter(|p| !p.is_empty()) {
            Some(password) => {
                let key = derive_password_key(password);
                let mut plaintext = Vec::with_capacity(FILE_MAGIC.len() + data.len());
                plaintext.extend_from_slice(&FILE_MAGIC);
                plaintext.extend_from_slice(data);

                let ciphertext = cipher.encrypt(Some(key.as_bytes()), &plaintext);
                Envelope::file(sender, filename, true, ciphertext)
            },
            None => {
                let ciphertext = cipher.encrypt(key_bytes(secret), data);
                Envelope::file(sender, filename, false, ciphertext)
            },
        }
    }

    /// Decipher a protected file with one candidate password.
    ///
    /// # Errors
    ///
    /// - `DecodeError::WrongPassword` if the magic literal does not appear
    /// - `DecodeError::Cipher` if the cipher rejects the ciphertext
    pub fn try_password<C: Cipher>(
        cipher: &C,
        file: &IncomingFile,
        password: &str,
    ) -> Result<Vec<u8>, DecodeError> {
        let key = derive_password_key(password);
        let mut plaintext = cipher.decrypt(Some(key.as_bytes()), &file.ciphertext)?;

        if plaintext.len() < FILE_MAGIC.len() || plaintext[..FILE_MAGIC.len()] != FILE_MAGIC {
            return Err(DecodeError::WrongPassword);
        }
        plaintext.drain(..FILE_MAGIC.len());
        Ok(plaintext)
    }

    /// Decipher a file.
    ///
    /// Unprotected files decipher under `secret` without prompting. Protected
    /// files prompt until a password reveals the magic literal or the prompt
    /// returns `None`.
    ///
    /// # Errors
    ///
    /// - `DecodeError::Cipher` if the cipher rejects the ciphertext
    pub fn decode_file<C: Cipher, P: PasswordPrompt + ?Sized>(
        cipher: &C,
        file: &IncomingFile,
        secret: Option<&SecretKey>,
        prompt: &mut P,
    ) -> Result<FileOutcome, DecodeError> {
        if !file.protected {
            let data = cipher.decrypt(key_bytes(secret), &file.ciphertext)?;
            return Ok(FileOutcome::Decrypted(data));
        }

        let mut attempt = 1;
        let mut wrong_password = false;
        loop {
            let request = PromptRequest {
                filename: &file.filename,
                from: &file.from,
                attempt,
                wrong_password,
            };
            let Some(password) = prompt.prompt(&request) else {
                return Ok(FileOutcome::Cancelled);
            };

            match Self::try_password(cipher, file, &password) {
                Ok(data) => return Ok(FileOutcome::Decrypted(data)),
                Err(DecodeError::WrongPassword) => {
                    attempt += 1;
                    wrong_password = true;
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use kqsp_crypto::{XorCipher, derive_group_secret};

    use super::*;

    fn incoming(envelope: &Envelope) -> IncomingFile {
        IncomingFile::from_envelope(envelope).unwrap()
    }

    fn no_prompt(_: &PromptRequest<'_>) -> Option<String> {
        panic!("unprotected files must not prompt");
    }

    #[test]
    fn protected_round_trip() {
        let secret = derive_group_secret("a", ["b"]).unwrap();
        let envelope = FileTransferCodec::encode_file(
            &XorCipher,
            b"contents",
            Some(&secret),
            Some("pw"),
            "f.txt",
            "x",
        );

        let mut prompt = |_: &PromptRequest<'_>| Some("pw".to_string());
        let file = incoming(&envelope);
        let outcome =
            FileTransferCodec::decode_file(&XorCipher, &file, Some(&secret), &mut prompt).unwrap();

        assert_eq!(envelope.protected, Some(true));
        assert_eq!(outcome, FileOutcome::Decrypted(b"contents".to_vec()));
    }

    #[test]
    fn protected_file_ignores_group_secret() {
        let sent_under = derive_group_secret("a", ["b"]).unwrap();
        let received_under = derive_group_secret("a", ["b", "c"]).unwrap();
        let envelope = FileTransferCodec::encode_file(
            &XorCipher,
            b"x",
            Some(&sent_under),
            Some("pw"),
            "f",
            "x",
        );

        let mut prompt = |_: &PromptRequest<'_>| Some("pw".to_string());
        let outcome = FileTransferCodec::decode_file(
            &XorCipher,
            &incoming(&envelope),
            Some(&received_under),
            &mut prompt,
        )
        .unwrap();

        assert_eq!(outcome, FileOutcome::Decrypted(b"x".to_vec()));
    }

    #[test]
    fn unprotected_round_trip_without_prompt() {
        let secret = derive_group_secret("a", ["b"]).unwrap();
        let envelope =
            FileTransferCodec::encode_file(&XorCipher, b"data", Some(&secret), None, "f", "x");

        let outcome = FileTransferCodec::decode_file(
            &XorCipher,
            &incoming(&envelope),
            Some(&secret),
            &mut no_prompt,
        )
        .unwrap();

        assert_eq!(envelope.protected, Some(false));
        assert_eq!(outcome, FileOutcome::Decrypted(b"data".to_vec()));
    }

    #[test]
    fn empty_password_means_unprotected() {
        let envelope = FileTransferCodec::encode_file(&XorCipher, b"d", None, Some(""), "f", "x");
        assert_eq!(envelope.protected, Some(false));
    }

    #[test]
    fn wrong_password_is_reported() {
        let envelope = FileTransferCodec::encode_file(&XorCipher, b"d", None, Some("pw"), "f", "x");

        assert_eq!(
            FileTransferCodec::try_password(&XorCipher, &incoming(&envelope), "nope"),
            Err(DecodeError::WrongPassword)
        );
    }

    #[test]
    fn reprompts_until_correct() {
        let envelope =
            FileTransferCodec::encode_file(&XorCipher, b"secret", None, Some("right"), "f", "x");
        let mut seen = Vec::new();
        let mut answers = vec!["wrong".to_string(), "also wrong".to_string(), "right".to_string()]
            .into_iter();
        let mut prompt = |req: &PromptRequest<'_>| {
            seen.push((req.attempt, req.wrong_password));
            answers.next()
        };

        let outcome =
            FileTransferCodec::decode_file(&XorCipher, &incoming(&envelope), None, &mut prompt)
                .unwrap();

        assert_eq!(outcome, FileOutcome::Decrypted(b"secret".to_vec()));
        assert_eq!(seen, vec![(1, false), (2, true), (3, true)]);
    }

    #[test]
    fn cancelled_prompt_is_an_outcome() {
        let envelope = FileTransferCodec::encode_file(&XorCipher, b"d", None, Some("pw"), "f", "x");
        let mut prompt = |_: &PromptRequest<'_>| None;

        let outcome =
            FileTransferCodec::decode_file(&XorCipher, &incoming(&envelope), None, &mut prompt)
                .unwrap();

        assert_eq!(outcome, FileOutcome::Cancelled);
    }

    #[test]
    fn short_ciphertext_is_wrong_password() {
        let file = IncomingFile {
            from: "x".into(),
            filename: "f".into(),
            protected: true,
            ciphertext: vec![1, 2],
        };

        assert_eq!(
            FileTransferCodec::try_password(&XorCipher, &file, "pw"),
            Err(DecodeError::WrongPassword)
        );
    }

    #[test]
    fn missing_filename_is_malformed() {
        let mut envelope = Envelope::file("x", "f", false, vec![]);
        envelope.filename = None;

        assert!(matches!(
            IncomingFile::from_envelope(&envelope),
            Err(DecodeError::Malformed { .. })
        ));
    }
}
