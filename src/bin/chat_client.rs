//! Chat Relay - Terminal Client
//!
//! Connects to a relay, answers the username prompt from the keyboard,
//! then forwards every typed line to the server while printing whatever
//! the server sends.

use std::env;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};

use chat_relay::message::REGISTRATION_COMPLETE;

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:1818";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let stream = TcpStream::connect(&addr).await?;
    let (mut to_server, mut from_server) = Framed::new(stream, LinesCodec::new()).split();
    let mut keyboard = spawn_keyboard();

    // Registration handshake
    while let Some(line) = from_server.next().await {
        let line = line?;
        println!("{}", line);

        if line.starts_with("Enter your username:") || line.starts_with("ERROR:") {
            if line.starts_with("ERROR:") {
                println!("Enter your username:");
            }
            let Some(username) = keyboard.recv().await else {
                return Ok(());
            };
            to_server.send(username).await?;
        } else if line == REGISTRATION_COMPLETE {
            println!("Registration successful! Proceeding to menu...");
            break;
        }
    }

    // Print server output in the background
    let printer = tokio::spawn(async move {
        while let Some(Ok(line)) = from_server.next().await {
            println!("{}", line);
        }
        println!("Connection to server lost.");
    });

    while let Some(input) = keyboard.recv().await {
        let exit = input.trim().eq_ignore_ascii_case("exit");
        to_server.send(if exit { "exit".to_string() } else { input }).await?;
        if exit || printer.is_finished() {
            break;
        }
    }

    let _ = to_server.close().await;
    println!("You have disconnected from the server.");
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up exit
fn spawn_keyboard() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
