//! Event loop of one unit.
//!
//! Socket readers, timers and the console push [`Event`]s into one queue.
//! A single consumer owns the engine and handles them strictly in order,
//! so each packet or tick is processed to completion before the next.

use std::net::SocketAddr;
use std::sync::Arc;

use suffrage_consensus::{ConsensusEngine, Dispatcher, NthPrime, Outcome, Platform, ResetReason, Timer};
use suffrage_topology::{Face, FACE_COUNT};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, trace, warn};

use crate::board::{Link, UdpBoard};
use crate::config::NodeConfig;
use crate::error::Result;

/// Largest datagram accepted on a face.
const MAX_DATAGRAM: usize = 4096;

/// Something for the engine to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A line arrived on `face` from `from`.
    Line { face: Face, line: String, from: SocketAddr },
    Timer(Timer),
    /// The fault toggle button was pressed.
    Button,
}

/// Bind the faces and run the unit until the task is dropped.
pub async fn run(config: NodeConfig) -> Result<()> {
    let (events_tx, mut events) = mpsc::unbounded_channel();

    let mut links: [Option<Link>; FACE_COUNT] = Default::default();
    for (face, face_config) in config.wired_faces() {
        let Some(bind) = face_config.bind else {
            continue;
        };
        let socket = Arc::new(UdpSocket::bind(bind).await?);
        info!(%face, %bind, peer = ?face_config.peer, "face bound");

        tokio::spawn(receive(face, Arc::clone(&socket), events_tx.clone()));
        links[face.index()] = Some(Link::new(socket, face_config.peer));
    }
    tokio::spawn(console(events_tx.clone()));

    let mut board = UdpBoard::new(links, events_tx);
    loop {
        let Some(reason) = boot(&config, &mut board, &mut events).await else {
            return Ok(());
        };
        warn!(?reason, "unit reset");

        board.reboot();
        tokio::time::sleep(config.reset_delay).await;
        // Nothing addressed to the old engine survives the reset
        while events.try_recv().is_ok() {}
    }
}

/// Run one engine lifetime. Returns why it ended, or `None` when the
/// event queue closed.
async fn boot(config: &NodeConfig, board: &mut UdpBoard, events: &mut UnboundedReceiver<Event>) -> Option<ResetReason> {
    let dispatcher = Dispatcher::new(NthPrime, config.faulty);
    let mut engine = ConsensusEngine::new(config.id, config.engine.clone(), dispatcher, board.now_ms());
    engine.start(board);

    while let Some(event) = events.recv().await {
        let outcome = match event {
            Event::Line { face, line, from } => {
                if !board.is_powered(face) {
                    trace!(%face, "link unpowered, dropping input");
                    continue;
                }
                board.learn_peer(face, from);
                engine.handle_line(&line, face, board)
            }
            Event::Timer(timer) => engine.on_timer(timer, board),
            Event::Button => {
                engine.press_button(board);
                Outcome::Continue
            }
        };

        if let Outcome::Reset(reason) = outcome {
            return Some(reason);
        }
    }
    None
}

/// Forward every line received on `face`.
async fn receive(face: Face, socket: Arc<UdpSocket>, events: UnboundedSender<Event>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let text = String::from_utf8_lossy(&buf[..len]);
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    let event = Event::Line {
                        face,
                        line: line.to_string(),
                        from,
                    };
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            Err(err) => warn!(%face, %err, "receive failed"),
        }
    }
}

/// Stdin stands in for the button: `b` presses it.
async fn console(events: UnboundedSender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "b" => {
                if events.send(Event::Button).is_err() {
                    return;
                }
            }
            "" => {}
            other => info!(input = other, "unknown console input, `b` toggles fault injection"),
        }
    }
}
