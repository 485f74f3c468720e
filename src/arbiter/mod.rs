//! Bus arbitration.
//!
//! One grant decision per tick, fixed priority (master 0 wins over master
//! 1, and so on), plus the split-transaction bookkeeping: when a slave
//! defers a transaction the arbiter releases the bus, remembers which
//! master owns the deferred transaction, and later regrants that master —
//! ahead of fresh traffic to the same slave — once the slave is ready
//! again.
//!
//! The grant itself is combinational: `decide()` answers from the current
//! state and this tick's sampled inputs. The split bookkeeping is
//! sequential and trails the grant by one tick, which is why `decide()`
//! stages its updates and `commit()` applies them.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::BusConfig;
use crate::signals::MasterId;

/// A master's sampled request for this tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLine {
    /// Bus-request line, asserted whenever the master is outside idle.
    pub active: bool,
    /// Device id the master is after. The arbiter uses it only to judge
    /// the target's readiness class; it never validates the id — an
    /// out-of-range id still gets the bus and is rejected by the decoder.
    pub target: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum GrantState {
    Idle,
    Granted(MasterId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arbiter {
    state: GrantState,
    /// Master awaiting completion of a deferred split transaction, if any.
    split_owner: Option<MasterId>,
    /// Single-tick pulse toward the decoder: the retried transaction may
    /// proceed to completion.
    split_grant: bool,

    next_state: GrantState,
    next_split_owner: Option<MasterId>,
    next_split_grant: bool,
}

impl Arbiter {
    pub fn new() -> Self {
        Self {
            state: GrantState::Idle,
            split_owner: None,
            split_grant: false,
            next_state: GrantState::Idle,
            next_split_owner: None,
            next_split_grant: false,
        }
    }

    /// Which master owns a pending split transaction, as registered at the
    /// end of the previous tick.
    pub fn split_owner(&self) -> Option<MasterId> {
        self.split_owner
    }

    /// The registered split-grant pulse for this tick.
    pub fn split_grant(&self) -> bool {
        self.split_grant
    }

    /// Combinational grant decision for this tick.
    ///
    /// `ssplit` is the split condition asserted by the currently selected
    /// slave; it both releases the grant and, one tick later, records the
    /// released master as split owner.
    pub fn decide(
        &mut self,
        cfg: &BusConfig,
        requests: &[RequestLine],
        sready: &[bool],
        ssplit: bool,
    ) -> Option<MasterId> {
        let grant = match self.state {
            GrantState::Idle => self.pick(cfg, requests, sready),
            GrantState::Granted(m) => {
                let released = !requests[m].active || ssplit;
                if released {
                    trace!(
                        "arbiter: master {m} releases the bus ({})",
                        if ssplit { "split" } else { "done" }
                    );
                    None
                } else {
                    Some(m)
                }
            }
        };

        self.next_state = match grant {
            Some(m) => GrantState::Granted(m),
            None => GrantState::Idle,
        };

        // Split bookkeeping, one tick behind the combinational decision.
        self.next_split_grant = false;
        self.next_split_owner = self.split_owner;
        if let GrantState::Granted(m) = self.state {
            if ssplit && self.split_owner.is_none() {
                debug!("arbiter: master {m} recorded as split owner");
                self.next_split_owner = Some(m);
            }
        }
        if let (Some(owner), Some(g)) = (self.split_owner, grant) {
            if g == owner {
                debug!("arbiter: split owner {owner} regranted, pulsing split grant");
                self.next_split_owner = None;
                self.next_split_grant = true;
            }
        }

        grant
    }

    /// Apply the state staged by this tick's `decide()`.
    pub fn commit(&mut self) {
        self.state = self.next_state;
        self.split_owner = self.next_split_owner;
        self.split_grant = self.next_split_grant;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Highest-priority eligible requester, if any.
    fn pick(
        &self,
        cfg: &BusConfig,
        requests: &[RequestLine],
        sready: &[bool],
    ) -> Option<MasterId> {
        requests
            .iter()
            .enumerate()
            .find(|(m, r)| r.active && self.eligible(cfg, *m, r.target, sready))
            .map(|(m, _)| {
                trace!("arbiter: grant to master {m}");
                m
            })
    }

    /// Whether a requesting master may be granted this tick.
    ///
    /// While a split is pending, the owner is eligible once its target is
    /// ready again, and everyone else only for non-split-capable targets,
    /// so unrelated traffic proceeds without starving the retry.
    fn eligible(
        &self,
        cfg: &BusConfig,
        master: MasterId,
        target: Option<u16>,
        sready: &[bool],
    ) -> bool {
        let dev = target.and_then(|id| cfg.device(id));
        match self.split_owner {
            Some(owner) if owner == master => {
                dev.is_some_and(|d| sready[d.slave])
            }
            Some(_) => dev.map_or(true, |d| !d.split_capable && sready[d.slave]),
            None => dev.map_or(true, |d| sready[d.slave]),
        }
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}
