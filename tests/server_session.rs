//! End-to-end tests over real TCP connections.
//!
//! Run with: cargo test server_session

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use dod::PlayerKind;
use dod::game::{GameEngine, SharedEngine, TileMap};
use dod::protocol::{Command, Direction, ServerLine, encode_handshake};
use dod::server::{Connections, Server};

const MAP: &str = "name Net\nwin 3\n#######\n#.....#\n#..G..#\n#.....#\n#######\n";

fn start() -> (SocketAddr, SharedEngine) {
    let (addr, engine, _) = start_tracked();
    (addr, engine)
}

fn start_tracked() -> (SocketAddr, SharedEngine, Connections) {
    let engine = SharedEngine::new(GameEngine::with_seed(TileMap::load(MAP).unwrap(), 99));
    let server = Server::bind("127.0.0.1:0", engine.clone()).unwrap();
    let addr = server.local_addr().unwrap();
    let connections = server.connections();
    thread::spawn(move || server.serve());
    (addr, engine, connections)
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr, handshake: &str) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut client = Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        };
        client.send(handshake);
        client
    }

    fn join(addr: SocketAddr, kind: PlayerKind) -> Self {
        let mut client = Self::connect(addr, encode_handshake(kind));
        assert_eq!(client.recv(), ServerLine::Welcome);
        // A reply proves the engine has registered us
        client.send(&Command::Hello.to_string());
        assert_eq!(client.recv(), ServerLine::Gold(3));
        client
    }

    fn send(&mut self, line: &str) {
        writeln!(self.writer, "{line}").unwrap();
    }

    fn recv(&mut self) -> ServerLine {
        let mut line = String::new();
        assert!(self.reader.read_line(&mut line).unwrap() > 0, "connection closed");
        ServerLine::decode(&line)
    }

    fn at_eof(&mut self) -> bool {
        let mut line = String::new();
        self.reader.read_line(&mut line).map_or(true, |n| n == 0)
    }
}

#[test]
fn test_join_look_quit() {
    let (addr, _engine) = start();
    let mut client = Client::join(addr, PlayerKind::Human);

    client.send("LOOK");
    for _ in 0..5 {
        assert!(matches!(client.recv(), ServerLine::LookRow(row) if row.len() == 5));
    }

    client.send(&Command::Move(Direction::North).to_string());
    assert!(matches!(client.recv(), ServerLine::Success | ServerLine::Fail));

    client.send("NONSENSE");
    assert_eq!(client.recv(), ServerLine::Invalid);

    client.send("QUIT");
    assert_eq!(client.recv(), ServerLine::Bye);
    assert!(client.at_eof());
}

#[test]
fn test_invalid_handshake() {
    let (addr, engine) = start();
    let mut client = Client::connect(addr, "martian");
    assert_eq!(client.recv(), ServerLine::Bye);
    assert_eq!(client.recv(), ServerLine::InvalidConnection);
    assert!(client.at_eof());
    assert!(engine.players().is_empty());
}

#[test]
fn test_presence_and_chat() {
    let (addr, _engine) = start();
    let mut first = Client::join(addr, PlayerKind::Human);
    let mut second = Client::join(addr, PlayerKind::Bot);
    assert_eq!(first.recv(), ServerLine::NewPlayer("PLAYER_1".to_owned()));

    second.send("USERNAME Robo");
    assert_eq!(second.recv(), ServerLine::UsernameChanged("Robo".to_owned()));
    assert_eq!(
        first.recv(),
        ServerLine::UsernameUpdated {
            old: "PLAYER_1".to_owned(),
            new: "Robo".to_owned()
        }
    );

    first.send("WHISPER Robo beep");
    assert_eq!(first.recv().to_string(), "YOU (TO Robo): beep");
    assert_eq!(second.recv().to_string(), "PLAYER_0 (TO YOU): beep");

    drop(second);
    assert_eq!(first.recv(), ServerLine::PlayerExit("Robo".to_owned()));
}

#[test]
fn test_end_game_disconnects_clients() {
    let (addr, engine) = start();
    let mut client = Client::join(addr, PlayerKind::Human);

    assert_eq!(engine.end_game(), 1);
    assert_eq!(client.recv(), ServerLine::Bye);
    assert!(client.at_eof());

    let mut late = Client::connect(addr, "bot");
    assert_eq!(late.recv(), ServerLine::Welcome);
    assert_eq!(late.recv(), ServerLine::GameOver);
    assert!(late.at_eof());
}

#[test]
fn test_shutdown_waits_for_farewells() {
    let (addr, engine, connections) = start_tracked();
    let mut first = Client::join(addr, PlayerKind::Human);
    let mut second = Client::join(addr, PlayerKind::Bot);
    assert_eq!(first.recv(), ServerLine::NewPlayer("PLAYER_1".to_owned()));
    assert_eq!(connections.count(), 2);

    assert_eq!(engine.end_game(), 2);
    assert!(connections.wait_idle(Duration::from_secs(5)));
    assert_eq!(connections.count(), 0);

    assert_eq!(first.recv(), ServerLine::Bye);
    assert!(first.at_eof());
    assert_eq!(second.recv(), ServerLine::Bye);
    assert!(second.at_eof());
}
