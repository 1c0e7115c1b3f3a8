//! A board emulated on a host: UDP faces, log-line indicators, tokio timers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use suffrage_consensus::{Platform, Status, Timer};
use suffrage_protocols::Transport;
use suffrage_topology::{Face, FaceSet, FACE_COUNT};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::runtime::Event;

/// The socket behind one face and where it writes to.
///
/// Lines are queued to a writer task that owns the send side of the socket,
/// so the engine never waits on the network and datagrams leave in order.
#[derive(Debug)]
pub struct Link {
    outbound: UnboundedSender<(String, SocketAddr)>,
    peer: Option<SocketAddr>,
    fixed: bool,
}

impl Link {
    /// `peer` pins the destination; without it the last sender is used.
    /// Must be called from within a tokio runtime.
    pub fn new(socket: Arc<UdpSocket>, peer: Option<SocketAddr>) -> Self {
        let (outbound, queue) = mpsc::unbounded_channel();
        tokio::spawn(write(socket, queue));
        Self {
            outbound,
            peer,
            fixed: peer.is_some(),
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// [`Platform`] over UDP sockets.
#[derive(Debug)]
pub struct UdpBoard {
    epoch: Instant,
    links: [Option<Link>; FACE_COUNT],
    unpowered: FaceSet,
    status: Status,
    timers: HashMap<Timer, JoinHandle<()>>,
    events: UnboundedSender<Event>,
}

impl UdpBoard {
    pub fn new(links: [Option<Link>; FACE_COUNT], events: UnboundedSender<Event>) -> Self {
        Self {
            epoch: Instant::now(),
            links,
            unpowered: FaceSet::EMPTY,
            status: Status::Off,
            timers: HashMap::new(),
            events,
        }
    }

    /// Power-on state: clock at zero, every link powered, no timers.
    pub fn reboot(&mut self) {
        self.cancel_timers();
        self.epoch = Instant::now();
        self.unpowered = FaceSet::EMPTY;
        self.status = Status::Off;
    }

    /// Whether traffic on `face` reaches the unit.
    pub fn is_powered(&self, face: Face) -> bool {
        !self.unpowered.contains(face)
    }

    /// Reply to `from` on `face` unless the face has a fixed peer.
    pub fn learn_peer(&mut self, face: Face, from: SocketAddr) {
        if let Some(link) = &mut self.links[face.index()] {
            if !link.fixed && link.peer != Some(from) {
                debug!(%face, %from, "face peer learned");
                link.peer = Some(from);
            }
        }
    }

    pub fn link(&self, face: Face) -> Option<&Link> {
        self.links[face.index()].as_ref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    fn cancel_timers(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

impl Drop for UdpBoard {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

impl Transport for UdpBoard {
    fn send(&mut self, face: Face, line: &str) {
        if self.unpowered.contains(face) {
            trace!(%face, "link unpowered, dropping output");
            return;
        }
        let Some(link) = &self.links[face.index()] else {
            return;
        };
        let Some(peer) = link.peer else {
            trace!(%face, "no peer on face yet");
            return;
        };
        if link.outbound.send((line.to_string(), peer)).is_err() {
            warn!(%face, "face writer stopped, dropping output");
        }
    }
}

/// Drain one face's outbound queue until its [`Link`] is dropped.
async fn write(socket: Arc<UdpSocket>, mut queue: UnboundedReceiver<(String, SocketAddr)>) {
    while let Some((line, peer)) = queue.recv().await {
        if let Err(err) = socket.send_to(line.as_bytes(), peer).await {
            warn!(%peer, %err, "send failed");
        }
    }
}

impl Platform for UdpBoard {
    fn now_ms(&self) -> u32 {
        // Wraps like the hardware millisecond counter
        self.epoch.elapsed().as_millis() as u32
    }

    fn set_status(&mut self, status: Status) {
        if status != self.status {
            info!(%status, "status light");
            self.status = status;
        }
    }

    fn fault_signal(&mut self, faulty: bool) {
        info!(faulty, signal = if faulty { "red" } else { "green" }, "fault signal");
    }

    fn set_face_power(&mut self, face: Face, powered: bool) {
        info!(%face, powered, "link power");
        if powered {
            self.unpowered.remove(face);
        } else {
            self.unpowered.insert(face);
        }
    }

    fn schedule(&mut self, timer: Timer, at_ms: u32) {
        let delay = at_ms.wrapping_sub(self.now_ms()) as i32;
        let delay = Duration::from_millis(delay.max(0) as u64);
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::Timer(timer));
        });
        if let Some(previous) = self.timers.insert(timer, handle) {
            previous.abort();
        }
    }
}
