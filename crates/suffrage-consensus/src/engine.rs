//! The consensus step machine.
//!
//! [`ConsensusEngine`] owns all protocol state. Every entry point handles one
//! event (a received line, a fired timer, a button press) to completion and
//! reports whether the unit keeps running or must reset. Nothing is shared
//! and nothing blocks, so the runtime only has to deliver events one at a
//! time.
//!
//! # Round flow
//!
//! ```text
//! c<N> from operator     r<...> with newer version
//!        │                        │
//!        ▼                        ▼
//!   strike sweep ──► flush ──► adopt input/version
//!        │                        │
//!        ▼                        ▼
//!   compute + vote locally   record peer vote, compute + vote locally
//!        │
//!        ▼
//!   forward round notice
//! ```

use suffrage_protocols::{absorb_neighbor_flag, broadcast, forward, send_on, Packet, ResultPacket};
use suffrage_topology::{Face, FaceSet, NodeId, Topology};
use tracing::{debug, error, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::Error;
use crate::platform::{Platform, Status, Timer};
use crate::registry::{Admission, RateCheck, Registry, Slot, SELF_SLOT};
use crate::report::StatusSnapshot;
use crate::round::{RoundPhase, RoundState, VersionOrder};
use crate::supervisor::Supervisor;
use crate::tally::{Ballot, Majority, Tally, VoteOutcome};
use crate::workload::{Dispatcher, Workload};

/// Why the unit must reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// A new identifier arrived with every registry slot taken.
    RegistryFull,
    /// A reboot packet was received and propagated.
    Reboot,
}

/// What the runtime does after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    Continue,
    /// Discard this engine and start over with a fresh one.
    Reset(ResetReason),
}

/// One unit's complete protocol state.
#[derive(Debug)]
pub struct ConsensusEngine<W> {
    id: NodeId,
    config: EngineConfig,
    boot_ms: u32,
    registry: Registry,
    tally: Tally,
    round: RoundState,
    topology: Topology,
    supervisor: Supervisor,
    dispatcher: Dispatcher<W>,
    table_running: bool,
    last_emitted: Option<u32>,
}

impl<W: Workload> ConsensusEngine<W> {
    /// A fresh engine booted at `now`.
    pub fn new(id: NodeId, config: EngineConfig, dispatcher: Dispatcher<W>, now: u32) -> Self {
        Self {
            id,
            config,
            boot_ms: now,
            registry: Registry::new(id, now),
            tally: Tally::new(),
            round: RoundState::default(),
            topology: Topology::new(),
            supervisor: Supervisor::new(),
            dispatcher,
            table_running: false,
            last_emitted: None,
        }
    }

    /// Show the fault state and arm the heartbeat.
    pub fn start<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        info!(node = %self.id, faulty = self.dispatcher.is_faulty(), "engine started");
        platform.set_status(Status::Off);
        platform.fault_signal(self.dispatcher.is_faulty());
        let at = platform.now_ms().wrapping_add(self.config.heartbeat_period_ms);
        platform.schedule(Timer::Heartbeat, at);
    }

    /// Handle one line received on `arrival`. Malformed lines are dropped.
    pub fn handle_line<P: Platform + ?Sized>(&mut self, line: &str, arrival: Face, platform: &mut P) -> Outcome {
        match Packet::parse(line) {
            Ok(packet) => self.handle_packet(packet, arrival, platform),
            Err(err) => {
                let err = Error::from(err);
                debug!(%err, face = %arrival, line, "dropping malformed packet");
                Outcome::Continue
            }
        }
    }

    /// Handle one decoded packet received on `arrival`.
    pub fn handle_packet<P: Platform + ?Sized>(&mut self, packet: Packet, arrival: Face, platform: &mut P) -> Outcome {
        match packet {
            Packet::Calculation(n) => {
                self.on_calculation(n, arrival, platform);
                Outcome::Continue
            }
            Packet::Result(result) => self.on_result(result, arrival, platform),
            Packet::Terminal => {
                self.on_terminal(arrival, platform);
                Outcome::Continue
            }
            Packet::Reboot => self.on_reboot(platform),
        }
    }

    /// Handle a fired timer.
    pub fn on_timer<P: Platform + ?Sized>(&mut self, timer: Timer, platform: &mut P) -> Outcome {
        match timer {
            Timer::Heartbeat => self.heartbeat(platform),
            Timer::StatusTable => self.print_table(platform),
            Timer::PowerRestore => {
                self.supervisor.restore_links(platform);
            }
        }
        Outcome::Continue
    }

    /// The fault toggle button was pressed.
    pub fn press_button<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        let faulty = self.dispatcher.toggle_fault();
        info!(faulty, "fault injection toggled");
        platform.fault_signal(faulty);
    }

    fn on_calculation<P: Platform + ?Sized>(&mut self, n: u32, arrival: Face, platform: &mut P) {
        let max = self.config.calculation_threshold;
        if n > max {
            let err = Error::CalculationOutOfRange { value: n, max };
            warn!(%err, "calculation rejected");
            return;
        }

        let Some(version) = self.round.next_version() else {
            warn!(calc = n, version = self.round.calc_ver, "round version at maximum, calculation rejected");
            return;
        };

        self.begin_round(platform);
        self.round.adopt(n, version);
        info!(calc = n, version = self.round.calc_ver, "new round requested");
        self.vote_locally(platform);

        let notice = self.own_packet(platform.now_ms(), false);
        forward(platform, &self.topology, &notice, arrival);
    }

    fn on_result<P: Platform + ?Sized>(&mut self, mut packet: ResultPacket, arrival: Face, platform: &mut P) -> Outcome {
        if packet.id == self.id {
            trace!(time = packet.time, "own packet echoed back");
            return Outcome::Continue;
        }

        let now = platform.now_ms();
        let admission = match self.registry.admit_or_update(packet.id, packet.time, now, self.config.ping_ceiling) {
            Ok(admission) => admission,
            Err(err @ Error::RegistryFull { .. }) => {
                error!(%err, node = %packet.id, "cannot admit node, resetting");
                return Outcome::Reset(ResetReason::RegistryFull);
            }
            Err(err) => {
                debug!(%err, "dropping result packet");
                return Outcome::Continue;
            }
        };
        let Some(slot) = admission.slot() else {
            trace!(node = %packet.id, time = packet.time, "duplicate packet");
            return Outcome::Continue;
        };
        if let Admission::Updated { reached_ceiling: true, .. } = admission {
            warn!(node = %packet.id, ceiling = self.config.ping_ceiling, "ping count saturated");
        }

        if self.registry.check_rate(slot, packet.time, self.config.spam_rate_divisor_ms) == RateCheck::Spamming {
            debug!(node = %packet.id, pings = self.registry.get(slot).pings, "rate exceeded, packet dropped");
            return Outcome::Continue;
        }

        let order = VersionOrder::classify(packet.calc_ver, self.round.calc_ver);
        if order == VersionOrder::Stale {
            trace!(node = %packet.id, version = packet.calc_ver, current = self.round.calc_ver, "stale round");
            return Outcome::Continue;
        }

        absorb_neighbor_flag(&mut self.topology, &mut packet, arrival);
        forward(platform, &self.topology, &packet, arrival);

        let ballot = Ballot::new(packet.vote);
        match order {
            VersionOrder::Current => {
                self.record_vote(slot, ballot, platform);
            }
            VersionOrder::Newer => {
                self.begin_round(platform);
                self.round.adopt(packet.calc, packet.calc_ver);
                if packet.calc_ver == u32::MAX {
                    warn!(node = %packet.id, "round version at maximum, no further local rounds possible");
                }
                info!(calc = packet.calc, version = packet.calc_ver, from = %packet.id, "new round");
                self.record_vote(slot, ballot, platform);
                self.vote_locally(platform);
            }
            VersionOrder::Stale => {}
        }
        Outcome::Continue
    }

    fn on_terminal<P: Platform + ?Sized>(&mut self, arrival: Face, platform: &mut P) {
        info!(face = %arrival, "terminal attached");
        self.topology.set_terminal(arrival);
        if !self.table_running {
            self.table_running = true;
            platform.schedule(Timer::StatusTable, platform.now_ms());
        }
    }

    fn on_reboot<P: Platform + ?Sized>(&mut self, platform: &mut P) -> Outcome {
        let uptime = platform.now_ms().wrapping_sub(self.boot_ms);
        if uptime < self.config.reboot_holdoff_ms {
            debug!(uptime, "reboot ignored right after boot");
            return Outcome::Continue;
        }

        warn!("reboot requested, propagating to all faces");
        send_on(platform, FaceSet::ALL, &Packet::Reboot.to_string());
        Outcome::Reset(ResetReason::Reboot)
    }

    fn heartbeat<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        let now = platform.now_ms();

        match self.registry.check_rate(SELF_SLOT, now, self.config.spam_rate_divisor_ms) {
            RateCheck::Within => {
                let packet = self.own_packet(now, true);
                broadcast(platform, &self.topology, &packet);
            }
            RateCheck::Spamming => debug!("heartbeat suppressed by rate guard"),
        }

        let inactive = Supervisor::liveness_sweep(&mut self.registry, now, self.config.idle_window_ms);
        trace!(inactive, active = self.registry.active_count(), "liveness sweep");

        platform.schedule(Timer::Heartbeat, now.wrapping_add(self.config.heartbeat_period_ms));
    }

    fn print_table<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        let Some(face) = self.topology.terminal() else {
            self.table_running = false;
            return;
        };
        let now = platform.now_ms();

        match self.status_snapshot(now).render(self.config.table_format) {
            Ok(table) => platform.send(face, &table),
            Err(err) => warn!(%err, "status table not rendered"),
        }
        platform.schedule(Timer::StatusTable, now.wrapping_add(self.config.table_period_ms));
    }

    /// Score the outgoing round and clear it.
    fn begin_round<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        self.supervisor.strike_sweep(
            &mut self.registry,
            &self.topology,
            self.round.majority,
            self.config.strike_threshold,
            self.config.power_restore_ms,
            platform,
        );
        self.flush(platform);
    }

    fn flush<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        self.tally.clear();
        self.registry.clear_votes();
        self.round.reset_outcome();
        platform.set_status(Status::Off);
    }

    fn compute_local<P: Platform + ?Sized>(&mut self, platform: &mut P) -> Option<Ballot> {
        if self.round.calc == 0 {
            self.flush(platform);
            return None;
        }
        self.round.phase = RoundPhase::Computing;
        let ballot = self.dispatcher.dispatch(self.round.calc, platform);
        self.round.phase = RoundPhase::Voting;
        ballot
    }

    fn vote_locally<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        let ballot = self.compute_local(platform);
        if !self.record_vote(SELF_SLOT, ballot, platform) {
            self.reevaluate(platform);
        }
    }

    /// Count a vote and re-evaluate. A double vote is healed by recounting
    /// the round from the local vote alone, at most once. Returns whether a
    /// vote was counted.
    fn record_vote<P: Platform + ?Sized>(&mut self, slot: Slot, ballot: Option<Ballot>, platform: &mut P) -> bool {
        let mut slot = slot;
        let mut ballot = ballot;

        for retry in [false, true] {
            match self.tally.record_vote(&mut self.registry, slot, ballot) {
                VoteOutcome::Counted => {
                    self.reevaluate(platform);
                    return true;
                }
                VoteOutcome::Ignored(reason) => {
                    trace!(?reason, node = %self.registry.get(slot).id, "vote ignored");
                    return false;
                }
                VoteOutcome::Conflict if !retry => {
                    warn!(
                        votes = self.tally.votes_cast(),
                        active = self.registry.active_count(),
                        "more votes than active nodes, recounting"
                    );
                    self.flush(platform);
                    slot = SELF_SLOT;
                    ballot = self.compute_local(platform);
                }
                VoteOutcome::Conflict => {
                    error!("vote conflict persisted after recount");
                }
            }
        }
        false
    }

    fn reevaluate<P: Platform + ?Sized>(&mut self, platform: &mut P) {
        if self.round.calc == 0 {
            self.flush(platform);
            return;
        }

        let majority = self.tally.resolve_majority(self.config.min_voters);
        if majority != self.round.majority {
            info!(?majority, votes = self.tally.votes_cast(), version = self.round.calc_ver, "majority changed");
        }
        self.round.majority = majority;

        let status = match majority {
            Majority::Decided(winner) if self.registry.me().vote == Some(winner) => Status::Majority,
            Majority::Decided(_) => Status::Minority,
            Majority::Tie | Majority::Undecided => Status::Off,
        };
        platform.set_status(status);
    }

    /// A result packet describing the local view of the round. Each emission
    /// gets a distinct timestamp so that peers never mistake it for a duplicate.
    fn own_packet(&mut self, now: u32, neighbor: bool) -> ResultPacket {
        let time = match self.last_emitted {
            Some(last) if (now.wrapping_sub(last) as i32) <= 0 => last.wrapping_add(1),
            _ => now,
        };
        self.last_emitted = Some(time);
        self.registry.record_emission(time, self.config.ping_ceiling);

        ResultPacket {
            id: self.id,
            time,
            calc: self.round.calc,
            calc_ver: self.round.calc_ver,
            vote: Ballot::raw(self.registry.me().vote),
            neighbor,
        }
    }

    /// Capture the status table contents.
    pub fn status_snapshot(&self, now: u32) -> StatusSnapshot {
        StatusSnapshot::capture(&self.round, &self.registry, now)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn majority(&self) -> Majority {
        self.round.majority
    }

    pub fn phase(&self) -> RoundPhase {
        self.round.phase
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn is_faulty(&self) -> bool {
        self.dispatcher.is_faulty()
    }
}
