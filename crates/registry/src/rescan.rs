//! Single-flight rescan state
//!
//! `Idle -> Scanning -> Generating -> Idle`. Requests that arrive while a
//! cycle is in flight collapse into one pending follow-up cycle.

/// Registry phase for one watched root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Generating,
}

#[derive(Debug)]
pub struct RescanState {
    phase: Phase,
    pending: bool,
}

impl RescanState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            pending: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Record a qualifying event. Returns `true` when a scan should start now.
    pub fn request(&mut self) -> bool {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Scanning;
                true
            }
            Phase::Scanning | Phase::Generating => {
                self.pending = true;
                false
            }
        }
    }

    /// Scanning finished; manifest generation begins
    pub fn begin_generate(&mut self) {
        debug_assert_eq!(self.phase, Phase::Scanning);
        self.phase = Phase::Generating;
    }

    /// The cycle ended (successfully or not). Returns `true` when a coalesced
    /// follow-up scan should start immediately.
    pub fn finish(&mut self) -> bool {
        if std::mem::take(&mut self.pending) {
            self.phase = Phase::Scanning;
            true
        } else {
            self.phase = Phase::Idle;
            false
        }
    }
}

impl Default for RescanState {
    fn default() -> Self {
        Self::new()
    }
}
