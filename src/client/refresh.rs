use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::ClientError;

/// Result every participant of one refresh cycle observes
pub(crate) type RefreshOutcome = Result<String, ClientError>;

/// Single-flight guard around the refresh call.
///
/// `in_flight` is set by the first caller (the leader) and cleared exactly once
/// when it settles; everyone arriving meanwhile parks a continuation in
/// `waiters`, drained in arrival order.
#[derive(Debug, Default)]
pub(crate) struct RefreshGate {
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

pub(crate) enum Entry<'a> {
    /// This caller must perform the refresh and settle the gate
    Leader(LeaderGuard<'a>),
    /// A refresh is already outstanding; await its outcome
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshGate {
    pub(crate) fn enter(&self) -> Entry<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            tracing::debug!(queued = state.waiters.len(), "Refresh in flight, request queued");
            Entry::Waiter(rx)
        } else {
            state.in_flight = true;
            Entry::Leader(LeaderGuard {
                gate: self,
                settled: false,
            })
        }
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clears the flag and hands back the queued continuations.
    fn release(&self) -> VecDeque<oneshot::Sender<RefreshOutcome>> {
        let mut state = self.lock();
        state.in_flight = false;
        std::mem::take(&mut state.waiters)
    }
}

/// Held by the leader for the duration of the refresh call.
///
/// Dropping it unsettled (the leader's task was cancelled) still clears the
/// flag; the queued waiters then see their sender dropped and re-enter the gate.
pub(crate) struct LeaderGuard<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl LeaderGuard<'_> {
    /// Publish `outcome` to every queued waiter, FIFO. Returns how many were woken.
    pub(crate) fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        let waiters = self.gate.release();
        let woken = waiters.len();
        for waiter in waiters {
            // A waiter whose request was dropped is no longer listening
            let _ = waiter.send(outcome.clone());
        }
        woken
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = self.gate.release();
            tracing::warn!(
                waiters = abandoned.len(),
                "Token refresh abandoned before completion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_caller_waits_for_leader() {
        let gate = RefreshGate::default();

        let leader = match gate.enter() {
            Entry::Leader(guard) => guard,
            Entry::Waiter(_) => panic!("first caller must lead"),
        };
        assert!(gate.is_refreshing());

        let first = match gate.enter() {
            Entry::Waiter(rx) => rx,
            Entry::Leader(_) => panic!("refresh already in flight"),
        };
        let second = match gate.enter() {
            Entry::Waiter(rx) => rx,
            Entry::Leader(_) => panic!("refresh already in flight"),
        };

        assert_eq!(leader.settle(&Ok("A2".to_string())), 2);
        assert!(!gate.is_refreshing());
        assert_eq!(first.await.unwrap().unwrap(), "A2");
        assert_eq!(second.await.unwrap().unwrap(), "A2");
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter() {
        let gate = RefreshGate::default();
        let Entry::Leader(leader) = gate.enter() else {
            panic!("first caller must lead")
        };
        let Entry::Waiter(rx) = gate.enter() else {
            panic!("refresh already in flight")
        };

        leader.settle(&Err(ClientError::auth_expired()));
        assert!(rx.await.unwrap().unwrap_err().is_auth_expired());
    }

    #[tokio::test]
    async fn dropped_leader_resets_flag() {
        let gate = RefreshGate::default();
        let Entry::Leader(leader) = gate.enter() else {
            panic!("first caller must lead")
        };
        let Entry::Waiter(rx) = gate.enter() else {
            panic!("refresh already in flight")
        };

        drop(leader);

        assert!(!gate.is_refreshing());
        assert!(rx.await.is_err());
        assert!(matches!(gate.enter(), Entry::Leader(_)));
    }
}
