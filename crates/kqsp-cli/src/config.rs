//! Client configuration.

use std::path::PathBuf;

use kqsp_client::{DisplayAddress, Environment, PeerId, SessionConfig};

/// Everything the terminal client needs to start.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay address, `host:port`
    pub relay_addr: String,
    /// Peer to connect to once the identity is open
    pub connect: Option<PeerId>,
    /// Fixed peer id instead of a generated one
    pub peer_id: Option<PeerId>,
    /// Where received files and audio clips are written
    pub download_dir: PathBuf,
    /// Send files and audio as binary frames
    pub binary_payloads: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:9000".to_owned(),
            connect: None,
            peer_id: None,
            download_dir: PathBuf::from("."),
            binary_payloads: true,
        }
    }
}

impl ClientConfig {
    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig { binary_payloads: self.binary_payloads }
    }

    /// Draw a display address and pick the peer id to register.
    ///
    /// A configured peer id wins over a generated one.
    pub fn identity<E: Environment>(&self, env: &E) -> (DisplayAddress, PeerId) {
        let display = DisplayAddress::generate(env);
        let id = self.peer_id.clone().unwrap_or_else(|| PeerId::generate(env, &display));
        (display, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemEnv;

    #[test]
    fn text_only_disables_binary() {
        let config = ClientConfig { binary_payloads: false, ..ClientConfig::default() };
        assert!(!config.session_config().binary_payloads);
    }

    #[test]
    fn fixed_peer_id_wins() {
        let config =
            ClientConfig { peer_id: Some(PeerId::from("alice")), ..ClientConfig::default() };
        let (_, id) = config.identity(&SystemEnv::new());
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn generated_id_uses_display_octets() {
        let (display, id) = ClientConfig::default().identity(&SystemEnv::new());
        let [a, b, c, d] = display.octets();
        assert!(id.as_str().starts_with(&format!("kqsp-cli-{a}-{b}-{c}-{d}-")));
    }
}
