//! In-memory mesh for end-to-end tests.
//!
//! Units run real [`ConsensusEngine`]s on simulated boards. Faces are wired
//! pairwise; a line written to a wired face is delivered to the other end,
//! a line written to an unwired face lands on that unit's console. One
//! global clock drives every board, and [`Mesh::advance`] fires timers in
//! deadline order, delivering all traffic after each one.
//!
//! A reset (full registry, reboot) replaces the unit's engine with a fresh
//! one booted at the current time, as the hardware would.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use suffrage_consensus::{
    ConsensusEngine, Dispatcher, EngineConfig, NthPrime, Outcome, Platform, ResetReason, Status, Timer,
    Workload,
};
use suffrage_protocols::Transport;
use suffrage_topology::{Face, FaceSet, NodeId};
use tracing::debug;

/// Clock value at which every mesh starts. Senders need some seconds on
/// their clocks before the rate guard lets their packets through.
pub const START_MS: u32 = 10_000;

/// A workload several engine lifetimes of one unit can share.
#[derive(Clone)]
pub struct SharedWorkload(Rc<dyn Fn(u32, bool) -> u32>);

impl SharedWorkload {
    pub fn new(f: impl Fn(u32, bool) -> u32 + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Answers `value` for every non-zero input.
    pub fn constant(value: u32) -> Self {
        Self::new(move |n, _| if n == 0 { 0 } else { value })
    }

    /// The deployed n-th prime workload.
    pub fn nth_prime() -> Self {
        Self::new(|n, faulty| NthPrime.compute(n, faulty))
    }
}

impl Workload for SharedWorkload {
    fn compute(&self, input: u32, faulty: bool) -> u32 {
        (self.0)(input, faulty)
    }
}

impl fmt::Debug for SharedWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedWorkload")
    }
}

/// Simulated board: records every indicator change and queues output.
#[derive(Debug, Default)]
pub struct SimBoard {
    now: u32,
    outbox: Vec<(Face, String)>,
    unpowered: FaceSet,
    timers: HashMap<Timer, u32>,
    pub status_log: Vec<Status>,
    pub fault_log: Vec<bool>,
    pub power_log: Vec<(Face, bool)>,
}

impl SimBoard {
    /// Current status light.
    pub fn status(&self) -> Status {
        self.status_log.last().copied().unwrap_or_default()
    }

    pub fn is_powered(&self, face: Face) -> bool {
        !self.unpowered.contains(face)
    }

    /// Deadline of `timer`, if armed.
    pub fn deadline(&self, timer: Timer) -> Option<u32> {
        self.timers.get(&timer).copied()
    }
}

impl Transport for SimBoard {
    fn send(&mut self, face: Face, line: &str) {
        self.outbox.push((face, line.to_string()));
    }
}

impl Platform for SimBoard {
    fn now_ms(&self) -> u32 {
        self.now
    }

    fn set_status(&mut self, status: Status) {
        self.status_log.push(status);
    }

    fn fault_signal(&mut self, faulty: bool) {
        self.fault_log.push(faulty);
    }

    fn set_face_power(&mut self, face: Face, powered: bool) {
        self.power_log.push((face, powered));
        if powered {
            self.unpowered.remove(face);
        } else {
            self.unpowered.insert(face);
        }
    }

    fn schedule(&mut self, timer: Timer, at_ms: u32) {
        self.timers.insert(timer, at_ms);
    }
}

/// One simulated unit.
#[derive(Debug)]
pub struct Unit {
    pub engine: ConsensusEngine<SharedWorkload>,
    pub board: SimBoard,
    /// Lines written to faces with nothing attached.
    pub console: Vec<(Face, String)>,
    /// Every reset this unit went through.
    pub resets: Vec<ResetReason>,
    id: NodeId,
    config: EngineConfig,
    workload: SharedWorkload,
    faulty: bool,
}

impl Unit {
    fn boot(&mut self) {
        let dispatcher = Dispatcher::new(self.workload.clone(), self.faulty);
        self.engine = ConsensusEngine::new(self.id, self.config.clone(), dispatcher, self.board.now);
        self.engine.start(&mut self.board);
    }
}

/// A line that crossed a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: usize,
    pub to: usize,
    /// Arrival face at the receiver.
    pub face: Face,
    pub line: String,
}

enum Input {
    Line(String, Face),
    Timer(Timer),
    Button,
}

/// Units, links and the shared clock.
#[derive(Debug)]
pub struct Mesh {
    units: Vec<Unit>,
    links: HashMap<(usize, Face), (usize, Face)>,
    clock: u32,
    deliveries: Vec<Delivery>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            links: HashMap::new(),
            clock: START_MS,
            deliveries: Vec::new(),
        }
    }

    /// Add and start a unit. Returns its index.
    pub fn add_unit(&mut self, id: u32, workload: SharedWorkload, faulty: bool) -> usize {
        self.add_unit_with(id, workload, faulty, EngineConfig::default())
    }

    pub fn add_unit_with(&mut self, id: u32, workload: SharedWorkload, faulty: bool, config: EngineConfig) -> usize {
        let id = NodeId(id);
        let board = SimBoard {
            now: self.clock,
            ..SimBoard::default()
        };
        let dispatcher = Dispatcher::new(workload.clone(), faulty);
        let engine = ConsensusEngine::new(id, config.clone(), dispatcher, self.clock);

        let mut unit = Unit {
            engine,
            board,
            console: Vec::new(),
            resets: Vec::new(),
            id,
            config,
            workload,
            faulty,
        };
        unit.engine.start(&mut unit.board);
        self.units.push(unit);
        self.units.len() - 1
    }

    /// Wire face `fa` of unit `a` to face `fb` of unit `b`.
    pub fn connect(&mut self, a: usize, fa: Face, b: usize, fb: Face) {
        self.links.insert((a, fa), (b, fb));
        self.links.insert((b, fb), (a, fa));
    }

    /// Cut the link on face `fa` of unit `a`, both directions.
    pub fn disconnect(&mut self, a: usize, fa: Face) {
        if let Some(other) = self.links.remove(&(a, fa)) {
            self.links.remove(&other);
        }
    }

    /// Wire `units` in a west-to-east line, east face to west face.
    pub fn chain(&mut self, units: &[usize]) {
        for pair in units.windows(2) {
            self.connect(pair[0], Face::EAST, pair[1], Face::WEST);
        }
    }

    /// Feed `line` to `unit` as if typed on `face`, then deliver all traffic.
    pub fn inject(&mut self, unit: usize, face: Face, line: &str) {
        self.handle(unit, Input::Line(line.to_string(), face));
        self.settle();
    }

    pub fn press_button(&mut self, unit: usize) {
        self.handle(unit, Input::Button);
        self.settle();
    }

    /// Let `ms` pass, firing every timer that falls due.
    pub fn advance(&mut self, ms: u32) {
        let target = self.clock + ms;
        self.settle();

        loop {
            let next = self
                .units
                .iter()
                .enumerate()
                .flat_map(|(i, u)| u.board.timers.iter().map(move |(t, at)| (*at, i, *t)))
                .filter(|(at, _, _)| *at <= target)
                .min_by_key(|(at, i, _)| (*at, *i));
            let Some((at, unit, timer)) = next else {
                break;
            };

            self.set_clock(at);
            self.units[unit].board.timers.remove(&timer);
            self.handle(unit, Input::Timer(timer));
            self.settle();
        }
        self.set_clock(target);
    }

    pub fn unit(&self, index: usize) -> &Unit {
        &self.units[index]
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn now(&self) -> u32 {
        self.clock
    }

    /// Everything delivered over links so far.
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    fn set_clock(&mut self, now: u32) {
        self.clock = now;
        for unit in &mut self.units {
            unit.board.now = now;
        }
    }

    fn handle(&mut self, index: usize, input: Input) {
        let unit = &mut self.units[index];
        let outcome = match input {
            Input::Line(line, face) => unit.engine.handle_line(&line, face, &mut unit.board),
            Input::Timer(timer) => unit.engine.on_timer(timer, &mut unit.board),
            Input::Button => {
                unit.engine.press_button(&mut unit.board);
                Outcome::Continue
            }
        };

        if let Outcome::Reset(reason) = outcome {
            debug!(unit = index, ?reason, "unit reset");
            unit.resets.push(reason);
            unit.board.timers.clear();
            unit.board.unpowered = FaceSet::EMPTY;
            unit.boot();
        }
    }

    /// Deliver queued output until the mesh is quiet.
    fn settle(&mut self) {
        let mut queue = VecDeque::new();
        loop {
            for (i, unit) in self.units.iter_mut().enumerate() {
                queue.extend(unit.board.outbox.drain(..).map(|(face, line)| (i, face, line)));
            }
            let Some((from, face, line)) = queue.pop_front() else {
                break;
            };
            self.transmit(from, face, line);
        }
    }

    fn transmit(&mut self, from: usize, face: Face, line: String) {
        if !self.units[from].board.is_powered(face) {
            return;
        }
        let Some(&(to, arrival)) = self.links.get(&(from, face)) else {
            self.units[from].console.push((face, line));
            return;
        };
        if !self.units[to].board.is_powered(arrival) {
            return;
        }

        self.deliveries.push(Delivery {
            from,
            to,
            face: arrival,
            line: line.clone(),
        });
        self.handle(to, Input::Line(line, arrival));
    }
}
