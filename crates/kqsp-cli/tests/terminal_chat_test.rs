//! Two terminal clients chatting through a real relay on loopback.
//!
//! Input is fed through in-memory pipes and the transcript is captured in a
//! shared buffer, so the test can wait for what a user would see before
//! typing the next line.

use std::{
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use kqsp_app::{App, Bridge, Runtime};
use kqsp_cli::TerminalDriver;
use kqsp_client::{DisplayAddress, PeerId, SessionConfig, transport};
use kqsp_relay::{RelayConfig, RelayServer};
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    async fn wait_for(&self, needle: &str) {
        for _ in 0..250 {
            if self.text().contains(needle) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("never saw {needle:?} in:\n{}", self.text());
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

type Client = Runtime<TerminalDriver<BufReader<DuplexStream>, SharedBuf>>;

async fn start_relay() -> String {
    let config = RelayConfig { bind_address: "127.0.0.1:0".into(), max_sessions: 8 };
    let server = RelayServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run());
    addr
}

async fn client(
    relay: &str,
    id: &str,
    octet: u8,
    download_dir: PathBuf,
) -> (Client, DuplexStream, SharedBuf) {
    let connection = transport::connect(relay, PeerId::from(id)).await.unwrap();
    let (keyboard, input) = tokio::io::duplex(4096);
    let output = SharedBuf::default();

    let driver =
        TerminalDriver::with_io(BufReader::new(input), output.clone(), connection, download_dir);
    let display = DisplayAddress::from_octets([10, 0, 0, octet]);
    let bridge = Bridge::new(display, SessionConfig::default());
    (Runtime::new(driver, App::new(), bridge), keyboard, output)
}

async fn type_line(keyboard: &mut DuplexStream, line: &str) {
    keyboard.write_all(format!("{line}\n").as_bytes()).await.unwrap();
}

#[tokio::test]
async fn two_clients_chat_and_share_a_protected_file() {
    let relay = start_relay().await;
    let alice_dir = tempfile::tempdir().unwrap();
    let bob_dir = tempfile::tempdir().unwrap();
    let outbox = tempfile::tempdir().unwrap();
    let plan = outbox.path().join("plan.txt");
    std::fs::write(&plan, b"meet at noon").unwrap();

    let (alice, mut alice_keys, alice_out) =
        client(&relay, "alice", 1, alice_dir.path().to_path_buf()).await;
    let (bob, mut bob_keys, bob_out) =
        client(&relay, "bob", 2, bob_dir.path().to_path_buf()).await;

    let script = async {
        alice_out.wait_for("Ready").await;
        bob_out.wait_for("Ready").await;

        type_line(&mut bob_keys, "/connect K(alice)").await;
        alice_out.wait_for("Connected to bob").await;
        bob_out.wait_for("Connected to alice").await;

        type_line(&mut bob_keys, "hello alice").await;
        alice_out.wait_for("K(10.0.0.2): hello alice").await;
        bob_out.wait_for("You: hello alice").await;

        type_line(&mut bob_keys, &format!("/file {} opensesame", plan.display())).await;
        alice_out.wait_for("Enter password for plan.txt").await;
        type_line(&mut alice_keys, "wrong").await;
        alice_out.wait_for("Wrong password for plan.txt").await;
        type_line(&mut alice_keys, "opensesame").await;
        alice_out.wait_for("Saved plan.txt").await;

        type_line(&mut bob_keys, "/quit").await;
        type_line(&mut alice_keys, "/quit").await;
    };

    let (alice, bob, ()) = tokio::join!(alice.run(), bob.run(), script);
    let (alice, bob) = (alice.unwrap(), bob.unwrap());

    assert!(bob.bridge().is_destroyed());
    assert!(alice.bridge().is_destroyed());
    assert_eq!(std::fs::read(alice_dir.path().join("plan.txt")).unwrap(), b"meet at noon");
    assert!(bob_out.text().contains("You sent file: plan.txt"));
}

#[tokio::test]
async fn taken_peer_id_is_reported() {
    let relay = start_relay().await;
    let dir = tempfile::tempdir().unwrap();

    let (first, mut first_keys, first_out) =
        client(&relay, "carol", 3, dir.path().to_path_buf()).await;

    let script = async {
        first_out.wait_for("Ready").await;

        let (second, _second_keys, second_out) =
            client(&relay, "carol", 4, dir.path().to_path_buf()).await;
        let second = second.run().await.unwrap();
        assert!(second.bridge().is_destroyed());
        assert!(second_out.text().contains("unavailable-id"));

        type_line(&mut first_keys, "/quit").await;
    };

    let (first, ()) = tokio::join!(first.run(), script);

    assert!(first.unwrap().bridge().session().local_id().is_some());
}
