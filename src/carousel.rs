//! Carousel completion tracker (C4).
//!
//! Per-PID state machine detecting a full revolution of the data carousel
//! across every PID a module subscribes to. Mirrors
//! `original_source/src/epggrab/opentv.c`'s `_opentv_table_callback`,
//! including the Open Question's literal `1` for the `STARTED` state
//! (preserved here as an explicit discriminant, see DESIGN.md).

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use crate::provider::Pid;

/// Leading section header bytes, guaranteed by the OpenTV carousel to
/// repeat exactly when the table index wraps (§4.4).
pub const FINGERPRINT_LEN: usize = 20;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(3600);
pub const MAX_PASS_DURATION: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CarouselState {
    Init = 0,
    Started = 1,
    Complete = 2,
}

#[derive(Debug, Clone)]
struct PidStatus {
    state: CarouselState,
    fingerprint: [u8; FINGERPRINT_LEN],
}

impl Default for PidStatus {
    fn default() -> Self {
        PidStatus {
            state: CarouselState::Init,
            fingerprint: [0u8; FINGERPRINT_LEN],
        }
    }
}

/// Tracks carousel completion for every PID a single module subscribes to.
#[derive(Debug)]
pub struct CarouselTracker {
    pids: BTreeMap<Pid, PidStatus>,
    pass_started_at: Option<Instant>,
    period: Duration,
    /// Set once `observe` reports completion, so the edge-triggered signal
    /// fires exactly once per revolution instead of on every later call.
    completion_signaled: bool,
}

impl Default for CarouselTracker {
    fn default() -> Self {
        CarouselTracker {
            pids: BTreeMap::new(),
            pass_started_at: None,
            period: DEFAULT_PERIOD,
            completion_signaled: false,
        }
    }
}

impl CarouselTracker {
    pub fn new(subscribed_pids: impl IntoIterator<Item = Pid>) -> Self {
        let mut tracker = CarouselTracker::default();
        for pid in subscribed_pids {
            tracker.pids.insert(pid, PidStatus::default());
        }
        tracker
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Feed the leading 20 bytes of a section observed on `pid`. Returns
    /// `true` exactly once — the moment every subscribed PID becomes
    /// `COMPLETE` (one `complete()` call per revolution, §8 scenario 3).
    /// Further calls after that edge, including ones for unrelated or
    /// redundant sections, return `false` until a new pass begins.
    pub fn observe(&mut self, pid: Pid, leading_bytes: &[u8]) -> bool {
        if leading_bytes.len() < FINGERPRINT_LEN {
            return false;
        }
        if self.pass_started_at.is_none() {
            self.begin_pass();
        }
        if self.pass_timed_out() {
            self.begin_pass();
        }

        let mut fingerprint = [0u8; FINGERPRINT_LEN];
        fingerprint.copy_from_slice(&leading_bytes[..FINGERPRINT_LEN]);

        let status = self.pids.entry(pid).or_default();
        match status.state {
            CarouselState::Init => {
                status.state = CarouselState::Started;
                status.fingerprint = fingerprint;
                log::trace!("opentv: pid {pid} carousel started");
            }
            // Preserves the source's literal `1` comparison (§9 Open Question).
            CarouselState::Started if status.fingerprint == fingerprint => {
                status.state = CarouselState::Complete;
                log::trace!("opentv: pid {pid} carousel complete (fingerprint repeat)");
            }
            _ => {}
        }

        if self.completion_signaled || !self.is_complete() {
            return false;
        }
        self.completion_signaled = true;
        true
    }

    /// Reset every PID to `INIT`, start a fresh revolution timer, and clear
    /// the one-shot completion signal so the next revolution can fire again.
    pub fn begin_pass(&mut self) {
        for status in self.pids.values_mut() {
            status.state = CarouselState::Init;
        }
        self.pass_started_at = Some(Instant::now());
        self.completion_signaled = false;
    }

    pub fn is_complete(&self) -> bool {
        !self.pids.is_empty()
            && self
                .pids
                .values()
                .all(|status| status.state == CarouselState::Complete)
    }

    /// Whether a revolution timer is currently running and hasn't timed
    /// out — `false` means the next `observe` call will start a new pass.
    pub fn is_pass_active(&self) -> bool {
        self.pass_started_at.is_some() && !self.pass_timed_out()
    }

    fn pass_timed_out(&self) -> bool {
        self.pass_started_at
            .is_some_and(|start| start.elapsed() >= MAX_PASS_DURATION)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
