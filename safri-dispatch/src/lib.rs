mod assignment;
mod auth;
mod entities;
mod events;
mod fleet;
mod matcher;
mod presence;
mod rides;
mod sms;
mod trips;
mod util;

pub mod paths;

use std::sync::Arc;

use crossbeam::channel::unbounded;
use dashmap::DashMap;

pub use assignment::*;
pub use auth::*;
pub use entities::*;
pub use events::*;
pub use fleet::*;
pub use matcher::*;
pub use presence::*;
pub use rides::*;
pub use sms::*;
pub use trips::*;
pub use util::*;

use safri_store::RealtimeStore;

/// The production wiring of the dispatch system: the in-process realtime
/// store with the log-backed SMS gateway.
pub type LiveDispatch = Dispatch<safri_impls::MemoryStore, LoggingSms>;

/// The Safri 360 dispatch system, facilitating ride publishing, candidate
/// matching, driver assignment, and trip tracking over a realtime store.
pub struct Dispatch<S, G> {
    context: DispatchContext<S, G>,
    event_receiver: EventReceiver,

    pub auth: Auth<S>,
    pub rides: RideManager<S, G>,
    pub fleet: Fleet<S, G>,
    pub assignment: AssignmentWorkflow<S, G>,
    pub presence: Presence<S, G>,
}

/// A type passed to various components of the dispatch system, to access
/// the store, send SMS, emit events, and reach the live matchers and
/// trackers.
pub struct DispatchContext<S, G> {
    pub store: Arc<S>,
    pub sms: Arc<G>,

    event_sender: EventSender,

    pub matchers: Arc<DashMap<String, Arc<CandidateMatcher<S, G>>>>,
    pub trackers: Arc<DashMap<String, Arc<TripTracker<S, G>>>>,
}

impl<S, G> Dispatch<S, G>
where
    S: RealtimeStore,
    G: SmsGateway,
{
    pub fn new(store: S, sms: G) -> Self {
        let (event_sender, event_receiver) = unbounded();

        let context = DispatchContext {
            store: Arc::new(store),
            sms: Arc::new(sms),

            event_sender,

            matchers: Default::default(),
            trackers: Default::default(),
        };

        Self {
            auth: Auth::new(&context.store),
            rides: RideManager::new(&context),
            fleet: Fleet::new(&context),
            assignment: AssignmentWorkflow::new(&context),
            presence: Presence::new(&context),

            event_receiver,
            context,
        }
    }

    /// The live matcher for an owner, spun up on first access.
    pub fn matcher(&self, owner_uid: &str) -> Arc<CandidateMatcher<S, G>> {
        self.context
            .matchers
            .entry(owner_uid.to_string())
            .or_insert_with(|| CandidateMatcher::spawn(&self.context, owner_uid))
            .clone()
    }

    /// The live trip tracker for a driver, spun up on first access.
    pub fn tracker(&self, pin: &str) -> Arc<TripTracker<S, G>> {
        self.context
            .trackers
            .entry(pin.to_string())
            .or_insert_with(|| TripTracker::spawn(&self.context, pin))
            .clone()
    }

    /// Blocks until the next dispatch event. Returns [None] once every
    /// emitter has gone away.
    pub fn wait_for_event(&self) -> Option<DispatchEvent> {
        self.event_receiver.recv().ok()
    }

    /// Like [Self::wait_for_event], but gives up after the timeout.
    pub fn next_event_within(&self, timeout: std::time::Duration) -> Option<DispatchEvent> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    pub fn context(&self) -> DispatchContext<S, G> {
        self.context.clone()
    }
}

impl<S, G> DispatchContext<S, G> {
    pub fn emit(&self, event: DispatchEvent) {
        // The receiver only disappears during shutdown
        let _ = self.event_sender.send(event);
    }
}

impl<S, G> Clone for DispatchContext<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            sms: self.sms.clone(),
            event_sender: self.event_sender.clone(),
            matchers: self.matchers.clone(),
            trackers: self.trackers.clone(),
        }
    }
}
