//! LAN chat: joins a hub if one answers discovery, otherwise becomes the hub.
//!
//! Run with: `cargo run --example chat [hub | <hub-address>]`
//!
//! Every line typed on stdin is broadcast; `@<id> text` sends to one peer.
//! Set `RUST_LOG=debug` to watch the relay.

use lanhub::prelude::*;
use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

const APP_ID: u32 = type_tag("lanhub::examples::chat");
const CHAT: u32 = type_tag("chat");
const PORT: u16 = 27015;

/// Splits `@3 hello` into a target and text.
fn parse_line(line: &str) -> (Option<PeerId>, &str) {
    if let Some(rest) = line.strip_prefix('@') {
        if let Some((id, text)) = rest.split_once(' ') {
            if let Ok(id) = id.parse::<i16>() {
                return (Some(PeerId::new(id)), text);
            }
        }
    }
    (None, line)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut node = Node::new(NodeConfig::new(APP_ID, PORT))?;

    node.on_receive(|header, payload, responder| {
        if header.from != responder.self_id() {
            println!("[{}] {}", header.from, String::from_utf8_lossy(payload));
        }
    });
    node.on_connection(|event, responder| {
        if event.id == responder.self_id() {
            match event.status {
                ConnectStatus::Joined => println!("* you are {}", event.id),
                ConnectStatus::Left => println!("* disconnected"),
            }
            return;
        }
        match event.status {
            ConnectStatus::Joined => println!("* {} joined", event.id),
            ConnectStatus::Left => println!("* {} left", event.id),
        }
    });

    match std::env::args().nth(1).as_deref() {
        Some("hub") => node.start_server()?,
        Some(addr) => node.start_client(addr.parse::<SocketAddr>()?)?,
        None => match node.find_server(Duration::from_millis(500)) {
            Some(hub) => node.start_client(hub)?,
            None => {
                tracing::info!("No hub answered, hosting one");
                node.start_server()?;
            }
        },
    }

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    while node.poll() {
        match rx.try_recv() {
            Ok(line) => {
                let result = match parse_line(&line) {
                    (Some(to), text) => node.send_to(to, CHAT, text.as_bytes()),
                    (None, text) => node.send(CHAT, text.as_bytes()),
                };
                if let Err(e) = result {
                    eprintln!("send failed: {e}");
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(1)),
            Err(TryRecvError::Disconnected) => break,
        }
    }

    node.shutdown();
    Ok(())
}
