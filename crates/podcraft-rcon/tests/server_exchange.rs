//! Exchanges with a scripted RCON server over real TCP.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rstest::{fixture, rstest};

use podcraft_rcon::{Packet, PacketKind, RconClient, RconError};

const PASSWORD: &str = "hunter2";

struct FakeServer {
    port: u16,
    handle: JoinHandle<Vec<String>>,
}

/// Reads whole frames from the client socket.
fn read_frame(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> Option<Packet> {
    loop {
        if let Some((packet, used)) = Packet::decode(buffer).expect("client frames are valid") {
            buffer.drain(..used);
            return Some(packet);
        }
        let mut chunk = [0_u8; 512];
        let read = stream.read(&mut chunk).ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

fn reply(stream: &mut TcpStream, packet: &Packet) {
    stream
        .write_all(&packet.encode().expect("reply fits"))
        .expect("write reply");
}

/// Serves one connection: authenticates, then answers every command with two
/// fragments and honours the end-of-output probe. Returns the commands seen.
#[fixture]
fn server() -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
    let port = listener.local_addr().expect("local addr").port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept client");
        let mut buffer = Vec::new();
        let mut commands = Vec::new();
        while let Some(packet) = read_frame(&mut stream, &mut buffer) {
            match packet.kind {
                PacketKind::Login => {
                    let id = if packet.text() == PASSWORD {
                        packet.request_id
                    } else {
                        -1
                    };
                    reply(&mut stream, &Packet::new(id, PacketKind::Command, Vec::new()));
                }
                PacketKind::Command => {
                    let text = packet.text();
                    reply(
                        &mut stream,
                        &Packet::new(packet.request_id, PacketKind::Response, "ran "),
                    );
                    reply(
                        &mut stream,
                        &Packet::new(packet.request_id, PacketKind::Response, text.clone()),
                    );
                    commands.push(text);
                }
                PacketKind::Response | PacketKind::Other(_) => reply(
                    &mut stream,
                    &Packet::new(
                        packet.request_id,
                        PacketKind::Response,
                        format!("Unknown request {:x}", packet.kind.raw()),
                    ),
                ),
            }
        }
        commands
    });
    FakeServer { port, handle }
}

#[rstest]
fn runs_save_commands_in_order(server: FakeServer) {
    let mut client =
        RconClient::connect("127.0.0.1", server.port, PASSWORD, Duration::from_secs(5))
            .expect("connect and log in");
    assert_eq!(client.command("save-off").expect("save-off"), "ran save-off");
    assert_eq!(
        client.command("save-all flush").expect("save-all"),
        "ran save-all flush"
    );
    assert_eq!(client.command("save-on").expect("save-on"), "ran save-on");
    drop(client);

    let seen = server.handle.join().expect("server thread");
    assert_eq!(seen, ["save-off", "save-all flush", "save-on"]);
}

#[rstest]
fn wrong_password_is_rejected(server: FakeServer) {
    let error = RconClient::connect("127.0.0.1", server.port, "nope", Duration::from_secs(5))
        .expect_err("password rejected");
    assert!(matches!(error, RconError::Authentication));
    let seen = server.handle.join().expect("server thread");
    assert!(seen.is_empty());
}

#[test]
fn refused_connection_is_reported() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("reserve port");
        listener.local_addr().expect("local addr").port()
    };
    let error = RconClient::connect("127.0.0.1", port, PASSWORD, Duration::from_millis(500))
        .expect_err("nothing listening");
    assert!(matches!(error, RconError::Connect { .. }));
}
