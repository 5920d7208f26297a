//! Fuzz target for password-protected file transfer
//!
//! # Invariants
//!
//! - The sending password always unlocks the file and returns its bytes
//! - A different password is rejected or, on a magic collision, still
//!   returns exactly as many bytes as were sent
//! - An empty password sends the file unprotected under the group secret
//! - NEVER panic, whatever the ciphertext

#![no_main]

use arbitrary::Arbitrary;
use kqsp_client::{DecodeError, FileTransferCodec, IncomingFile};
use kqsp_crypto::{XorCipher, derive_group_secret};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Transfer {
    data: Vec<u8>,
    password: String,
    guess: String,
    tamper: Option<(u16, u8)>,
}

fuzz_target!(|transfer: Transfer| {
    let secret = derive_group_secret("sender", ["receiver"]).ok();
    let envelope = FileTransferCodec::encode_file(
        &XorCipher,
        &transfer.data,
        secret.as_ref(),
        Some(transfer.password.as_str()),
        "fuzz.bin",
        "K(10.0.0.1)",
    );
    let Ok(mut file) = IncomingFile::from_envelope(&envelope) else {
        panic!("encoded file envelope does not decode");
    };

    if transfer.password.is_empty() {
        assert!(!file.protected);
        return;
    }
    assert!(file.protected);

    match FileTransferCodec::try_password(&XorCipher, &file, &transfer.password) {
        Ok(data) => assert_eq!(data, transfer.data),
        Err(err) => panic!("sending password rejected: {err}"),
    }

    if transfer.guess != transfer.password {
        match FileTransferCodec::try_password(&XorCipher, &file, &transfer.guess) {
            Ok(data) => assert_eq!(data.len(), transfer.data.len()),
            Err(DecodeError::WrongPassword) => {},
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    if let Some((index, mask)) = transfer.tamper {
        if !file.ciphertext.is_empty() {
            let index = usize::from(index) % file.ciphertext.len();
            file.ciphertext[index] ^= mask;
        }
        let _ = FileTransferCodec::try_password(&XorCipher, &file, &transfer.password);
    }
});
