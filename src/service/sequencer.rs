use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A logical request category with its own sequence counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Chat,
    ParseIntent,
    ConversationState,
    EventDump,
    Events,
    TestCase,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Chat => "chat",
            Channel::ParseIntent => "parseIntent",
            Channel::ConversationState => "conversationState",
            Channel::EventDump => "eventDump",
            Channel::Events => "events",
            Channel::TestCase => "testCase",
        };
        f.write_str(name)
    }
}

/// Where a channel's results land. Both hooks run while the sequencer holds
/// its lock, so an implementation must not call back into the sequencer.
pub trait StateSink<T>: Send + Sync {
    /// A new request went out on `channel` as `sequence`.
    fn dispatched(&self, channel: Channel, sequence: u64);

    /// `result` answers the latest request on `channel`.
    fn admit(&self, channel: Channel, sequence: u64, result: T);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// A newer dispatch existed when the result arrived; it was dropped.
    Superseded { latest: u64 },
    /// The work never produced a result (panicked or was cancelled).
    Abandoned,
}

/// A request that has been sent but whose result has not been admitted or
/// dropped yet.
pub struct PendingInvocation {
    channel: Channel,
    sequence: u64,
    handle: JoinHandle<Admission>,
}

impl PendingInvocation {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Waits for the result and reports what the sequencer did with it.
    pub async fn settled(self) -> Admission {
        match self.handle.await {
            Ok(admission) => admission,
            Err(e) => {
                warn!(
                    channel = %self.channel,
                    sequence = self.sequence,
                    error = %e,
                    "request task failed"
                );
                Admission::Abandoned
            }
        }
    }
}

/// Clears a pending entry when its task ends, including by panic or abort.
struct PendingGuard {
    sequencer: Arc<RequestSequencer>,
    channel: Channel,
    sequence: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.sequencer
            .lock()
            .pending
            .remove(&(self.channel, self.sequence));
    }
}

#[derive(Default)]
struct Counters {
    latest: HashMap<Channel, u64>,
    pending: BTreeSet<(Channel, u64)>,
}

/// Numbers every dispatch per channel and lets only the newest result of a
/// channel reach its sink.
#[derive(Default)]
pub struct RequestSequencer {
    counters: Mutex<Counters>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last sequence issued on `channel`; 0 before the first dispatch.
    pub fn current(&self, channel: Channel) -> u64 {
        self.lock().latest.get(&channel).copied().unwrap_or(0)
    }

    pub fn in_flight(&self, channel: Channel) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|(pending_channel, _)| *pending_channel == channel)
            .count()
    }

    /// Bumps the channel counter, tells the sink, and runs `work` on the
    /// runtime. Older requests on the channel keep running; their results
    /// are dropped when they arrive.
    pub fn dispatch<T, F>(
        self: &Arc<Self>,
        channel: Channel,
        work: F,
        sink: Arc<dyn StateSink<T>>,
    ) -> PendingInvocation
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let sequence = {
            let mut counters = self.lock();
            let counter = counters.latest.entry(channel).or_insert(0);
            *counter += 1;
            let sequence = *counter;
            counters.pending.insert((channel, sequence));
            sink.dispatched(channel, sequence);
            sequence
        };
        debug!(%channel, sequence, "dispatched");

        let guard = PendingGuard {
            sequencer: Arc::clone(self),
            channel,
            sequence,
        };
        let handle = tokio::spawn(async move {
            let result = work.await;
            guard
                .sequencer
                .admit(channel, sequence, result, sink.as_ref())
        });

        PendingInvocation {
            channel,
            sequence,
            handle,
        }
    }

    /// Hands `result` to the sink only if `sequence` is still the newest
    /// dispatch on `channel`.
    pub fn admit<T>(
        &self,
        channel: Channel,
        sequence: u64,
        result: T,
        sink: &dyn StateSink<T>,
    ) -> Admission {
        let mut counters = self.lock();
        counters.pending.remove(&(channel, sequence));
        let latest = counters.latest.get(&channel).copied().unwrap_or(0);
        if sequence != latest {
            info!(%channel, sequence, latest, "dropping stale result");
            return Admission::Superseded { latest };
        }
        sink.admit(channel, sequence, result);
        debug!(%channel, sequence, "admitted");
        Admission::Admitted
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct RecordingSink {
        dispatched: Mutex<Vec<u64>>,
        admitted: Mutex<Vec<(u64, &'static str)>>,
    }

    impl StateSink<&'static str> for RecordingSink {
        fn dispatched(&self, _channel: Channel, sequence: u64) {
            self.dispatched.lock().unwrap().push(sequence);
        }

        fn admit(&self, _channel: Channel, sequence: u64, result: &'static str) {
            self.admitted.lock().unwrap().push((sequence, result));
        }
    }

    fn as_sink(sink: &Arc<RecordingSink>) -> Arc<dyn StateSink<&'static str>> {
        sink.clone()
    }

    #[tokio::test]
    async fn counters_start_at_zero_and_increase_per_dispatch() {
        let sequencer = Arc::new(RequestSequencer::new());
        let sink = Arc::new(RecordingSink::default());
        assert_eq!(sequencer.current(Channel::Chat), 0);

        let first = sequencer.dispatch(Channel::Chat, async { "a" }, as_sink(&sink));
        let second = sequencer.dispatch(Channel::Chat, async { "b" }, as_sink(&sink));
        assert_eq!(first.sequence(), 1);
        assert_eq!(second.sequence(), 2);
        assert_eq!(sequencer.current(Channel::Chat), 2);
        assert_eq!(sequencer.current(Channel::EventDump), 0);
        assert_eq!(*sink.dispatched.lock().unwrap(), vec![1, 2]);

        first.settled().await;
        second.settled().await;
    }

    #[tokio::test]
    async fn late_result_of_superseded_dispatch_is_dropped() {
        let sequencer = Arc::new(RequestSequencer::new());
        let sink = Arc::new(RecordingSink::default());
        let (slow_tx, slow_rx) = oneshot::channel::<&'static str>();
        let (fast_tx, fast_rx) = oneshot::channel::<&'static str>();

        let slow = sequencer.dispatch(
            Channel::ParseIntent,
            async move { slow_rx.await.unwrap_or("closed") },
            as_sink(&sink),
        );
        let fast = sequencer.dispatch(
            Channel::ParseIntent,
            async move { fast_rx.await.unwrap_or("closed") },
            as_sink(&sink),
        );
        assert_eq!(sequencer.in_flight(Channel::ParseIntent), 2);

        fast_tx.send("fresh").unwrap();
        assert_eq!(fast.settled().await, Admission::Admitted);
        slow_tx.send("stale").unwrap();
        assert_eq!(slow.settled().await, Admission::Superseded { latest: 2 });

        assert_eq!(*sink.admitted.lock().unwrap(), vec![(2, "fresh")]);
        assert_eq!(sequencer.in_flight(Channel::ParseIntent), 0);
    }

    #[tokio::test]
    async fn early_result_of_superseded_dispatch_is_dropped_too() {
        let sequencer = Arc::new(RequestSequencer::new());
        let sink = Arc::new(RecordingSink::default());
        let (old_tx, old_rx) = oneshot::channel::<&'static str>();
        let old = sequencer.dispatch(
            Channel::EventDump,
            async move { old_rx.await.unwrap_or("closed") },
            as_sink(&sink),
        );
        let (new_tx, new_rx) = oneshot::channel::<&'static str>();
        let new = sequencer.dispatch(
            Channel::EventDump,
            async move { new_rx.await.unwrap_or("closed") },
            as_sink(&sink),
        );

        old_tx.send("old").unwrap();
        assert!(matches!(old.settled().await, Admission::Superseded { .. }));
        assert!(sink.admitted.lock().unwrap().is_empty());

        new_tx.send("new").unwrap();
        assert_eq!(new.settled().await, Admission::Admitted);
        assert_eq!(*sink.admitted.lock().unwrap(), vec![(2, "new")]);
    }

    #[tokio::test]
    async fn channels_do_not_supersede_each_other() {
        let sequencer = Arc::new(RequestSequencer::new());
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = oneshot::channel::<&'static str>();
        let chat = sequencer.dispatch(
            Channel::Chat,
            async move { rx.await.unwrap_or("closed") },
            as_sink(&sink),
        );
        let dump = sequencer.dispatch(Channel::EventDump, async { "dump" }, as_sink(&sink));

        assert_eq!(dump.settled().await, Admission::Admitted);
        tx.send("reply").unwrap();
        assert_eq!(chat.settled().await, Admission::Admitted);
        assert_eq!(sink.admitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn panicking_work_is_abandoned_and_leaves_nothing_in_flight() {
        let sequencer = Arc::new(RequestSequencer::new());
        let sink = Arc::new(RecordingSink::default());
        let crashed = sequencer.dispatch(
            Channel::TestCase,
            async { panic!("backend fake blew up") },
            as_sink(&sink),
        );
        assert_eq!(sequencer.in_flight(Channel::TestCase), 1);

        assert_eq!(crashed.settled().await, Admission::Abandoned);
        assert_eq!(sequencer.in_flight(Channel::TestCase), 0);
        assert!(sink.admitted.lock().unwrap().is_empty());
    }
}
