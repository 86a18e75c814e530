use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, select, Sender};
use dashmap::DashMap;
use log::debug;
use parking_lot::Mutex;
use serde::Serialize;

use safri_store::{diff_children, ChildChange, RealtimeStore};

use crate::{
    paths, AccountData, CarData, CustomerCard, DispatchContext, DispatchEvent, RideData,
    RideStatus, SmsGateway,
};

/// One owner's live view of the ride requests their fleet can serve.
///
/// The matcher keeps an index of the owner's registrations and of the
/// rides it has seen, updating both from typed child changes instead of
/// rescanning the full cross product on every fan-out. The two
/// subscriptions arrive independently, so either side of the index can be
/// momentarily ahead of the other.
pub struct CandidateMatcher<S, G> {
    context: DispatchContext<S, G>,
    owner_uid: String,
    state: Mutex<MatcherState>,
    customers: DashMap<String, CustomerCard>,
    stop: Sender<()>,
}

#[derive(Default)]
struct MatcherState {
    registrations: HashSet<String>,
    rides: HashMap<String, RideData>,
    /// Rides this owner dismissed. Local only: every other owner still
    /// sees them.
    ignored: HashSet<String>,
    /// The ids last handed out, to emit only on effective change
    last_published: Vec<String>,
}

/// A candidate ride enriched with the requesting customer's profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRide {
    pub ride: RideData,
    pub customer: Option<CustomerCard>,
}

impl<S, G> CandidateMatcher<S, G>
where
    S: RealtimeStore,
    G: SmsGateway,
{
    pub fn spawn(context: &DispatchContext<S, G>, owner_uid: &str) -> Arc<Self> {
        let (stop, stop_receiver) = bounded(1);

        let matcher = Arc::new(Self {
            context: context.clone(),
            owner_uid: owner_uid.to_string(),
            state: Default::default(),
            customers: Default::default(),
            stop,
        });

        let me = Arc::downgrade(&matcher);
        let store = context.store.clone();
        let owner = owner_uid.to_string();

        thread::spawn(move || {
            let rides = store.subscribe(&paths::rides());
            let cars = store.subscribe(&paths::owner_cars(&owner));

            let mut last_rides = None;
            let mut last_cars = None;

            loop {
                select! {
                    recv(rides.receiver()) -> msg => {
                        let Ok(snapshot) = msg else { break };

                        let changed = diff_children(last_rides.as_ref(), snapshot.value());
                        last_rides = snapshot.into_value();

                        let Some(matcher) = me.upgrade() else { break };
                        matcher.apply_ride_changes(changed);
                    }
                    recv(cars.receiver()) -> msg => {
                        let Ok(snapshot) = msg else { break };

                        let changed = diff_children(last_cars.as_ref(), snapshot.value());
                        last_cars = snapshot.into_value();

                        let Some(matcher) = me.upgrade() else { break };
                        matcher.apply_car_changes(changed);
                    }
                    recv(stop_receiver) -> _ => break,
                }
            }
        });

        matcher
    }

    pub fn owner_uid(&self) -> &str {
        &self.owner_uid
    }

    /// The rides this owner's fleet can serve right now.
    pub fn candidates(&self) -> Vec<RideData> {
        Self::compute(&self.state.lock())
    }

    /// Candidates with the requesting customer's profile attached.
    /// Profiles are fetched once per customer and cached.
    pub async fn enriched_candidates(&self) -> Vec<CandidateRide> {
        let candidates = self.candidates();
        let mut result = Vec::with_capacity(candidates.len());

        for ride in candidates {
            let customer = self.customer_card(&ride.customer_id).await;

            result.push(CandidateRide { ride, customer });
        }

        result
    }

    /// Dismisses a ride from this owner's list. Nothing is written to the
    /// store, so the ride stays visible to every other owner.
    pub fn ignore(&self, ride_id: &str) {
        let mut state = self.state.lock();

        state.ignored.insert(ride_id.to_string());

        self.publish(&mut state);
    }

    fn apply_ride_changes(&self, changed: Vec<ChildChange>) {
        let mut state = self.state.lock();

        for change in changed {
            match change {
                ChildChange::Added { key, value } | ChildChange::Modified { key, value } => {
                    match serde_json::from_value::<RideData>(value) {
                        Ok(ride) => {
                            state.rides.insert(key, ride);
                        }
                        Err(e) => debug!("Skipping undecodable ride {key}: {e}"),
                    }
                }
                ChildChange::Removed { key } => {
                    state.rides.remove(&key);
                }
            }
        }

        self.publish(&mut state);
    }

    fn apply_car_changes(&self, changed: Vec<ChildChange>) {
        let mut state = self.state.lock();

        for change in changed {
            match change {
                ChildChange::Added { key, value } | ChildChange::Modified { key, value } => {
                    match serde_json::from_value::<CarData>(value) {
                        Ok(_) => {
                            state.registrations.insert(key);
                        }
                        Err(e) => debug!("Skipping undecodable car {key}: {e}"),
                    }
                }
                ChildChange::Removed { key } => {
                    state.registrations.remove(&key);
                }
            }
        }

        self.publish(&mut state);
    }

    /// A ride is a candidate while it is still on the market, its selected
    /// car belongs to this owner, and the owner has not dismissed it.
    fn compute(state: &MatcherState) -> Vec<RideData> {
        let mut rides: Vec<RideData> = state
            .rides
            .values()
            .filter(|ride| ride.status == RideStatus::Requested)
            .filter(|ride| {
                state
                    .registrations
                    .contains(&ride.selected_car.registration_number)
            })
            .filter(|ride| !state.ignored.contains(&ride.ride_id))
            .cloned()
            .collect();

        rides.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.ride_id.cmp(&b.ride_id))
        });

        rides
    }

    fn publish(&self, state: &mut MatcherState) {
        let candidates = Self::compute(state);
        let ids: Vec<String> = candidates.iter().map(|r| r.ride_id.clone()).collect();

        if ids == state.last_published {
            return;
        }

        state.last_published = ids;

        self.context.emit(DispatchEvent::CandidatesChanged {
            owner_uid: self.owner_uid.clone(),
            rides: candidates,
        });
    }

    async fn customer_card(&self, customer_id: &str) -> Option<CustomerCard> {
        if let Some(card) = self.customers.get(customer_id) {
            return Some(card.clone());
        }

        let snapshot = self
            .context
            .store
            .get(&paths::users().child(customer_id))
            .await
            .ok()?;

        let card: CustomerCard = snapshot.decode::<AccountData>().ok()?.into();

        self.customers.insert(customer_id.to_string(), card.clone());

        Some(card)
    }
}

impl<S, G> Drop for CandidateMatcher<S, G> {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use safri_impls::MemoryStore;
    use safri_store::RealtimeStore;

    use crate::{
        paths, CarData, Dispatch, DispatchEvent, DriverData, LoggingSms, NewAccount, NewRide,
        RideData, Role,
    };

    fn dispatch() -> Dispatch<MemoryStore, LoggingSms> {
        Dispatch::new(MemoryStore::new(), LoggingSms)
    }

    /// Polls until the condition holds, since matchers apply fan-out on
    /// their own threads.
    fn eventually(what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);

        while Instant::now() < deadline {
            if condition() {
                return;
            }

            std::thread::sleep(Duration::from_millis(10));
        }

        panic!("timed out waiting until {what}");
    }

    async fn seed_car(dispatch: &Dispatch<MemoryStore, LoggingSms>, owner: &str, reg: &str) {
        dispatch
            .context()
            .store
            .set(
                &paths::owner_car(owner, reg),
                serde_json::to_value(CarData::mock(reg)).unwrap(),
            )
            .await
            .unwrap();
    }

    async fn seed_ride(dispatch: &Dispatch<MemoryStore, LoggingSms>, id: &str, reg: &str) {
        dispatch
            .context()
            .store
            .set(
                &paths::ride(id),
                serde_json::to_value(RideData::mock(id, "customer-1", reg)).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn only_the_matching_fleet_sees_the_ride() {
        let dispatch = dispatch();

        let owner_a = dispatch.matcher("owner-a");
        let owner_b = dispatch.matcher("owner-b");

        seed_car(&dispatch, "owner-a", "ABC-1234").await;
        seed_car(&dispatch, "owner-b", "XYZ-99").await;
        seed_ride(&dispatch, "ride-1", "ABC-1234").await;

        eventually("owner A sees the ride", || {
            owner_a
                .candidates()
                .iter()
                .any(|ride| ride.ride_id == "ride-1")
        });

        assert!(owner_b.candidates().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn an_assigned_ride_leaves_the_list() {
        let dispatch = dispatch();
        let matcher = dispatch.matcher("owner-a");

        seed_car(&dispatch, "owner-a", "ABC-1234").await;
        seed_ride(&dispatch, "ride-1", "ABC-1234").await;

        eventually("the ride is listed", || !matcher.candidates().is_empty());

        dispatch
            .context()
            .store
            .set(
                &paths::driver("4821"),
                serde_json::to_value(DriverData::mock("4821", "owner-a")).unwrap(),
            )
            .await
            .unwrap();

        dispatch
            .assignment
            .assign("owner-a", "ride-1", "4821")
            .await
            .unwrap();

        eventually("the ride is consumed", || matcher.candidates().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_cancelled_ride_leaves_the_list() {
        let dispatch = dispatch();
        let matcher = dispatch.matcher("owner-a");

        seed_car(&dispatch, "owner-a", "ABC-1234").await;

        let ride = dispatch
            .rides
            .request_ride(NewRide {
                customer_id: "customer-1".to_string(),
                origin: RideData::mock("x", "customer-1", "ABC-1234").origin,
                destination: RideData::mock("x", "customer-1", "ABC-1234").destination,
                selected_car: RideData::mock("x", "customer-1", "ABC-1234").selected_car,
                distance: 12.4,
                duration: 25.0,
                fare: 850.0,
            })
            .await
            .unwrap();

        eventually("the ride is listed", || !matcher.candidates().is_empty());

        dispatch
            .rides
            .cancel_ride(&ride.ride_id, "customer-1")
            .await
            .unwrap();

        eventually("the ride is gone", || matcher.candidates().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ignoring_is_local_to_the_owner() {
        let dispatch = dispatch();

        // Two fleets carrying the same registration both match the ride
        let owner_a = dispatch.matcher("owner-a");
        let owner_b = dispatch.matcher("owner-b");

        seed_car(&dispatch, "owner-a", "ABC-1234").await;
        seed_car(&dispatch, "owner-b", "ABC-1234").await;
        seed_ride(&dispatch, "ride-1", "ABC-1234").await;

        eventually("both owners see the ride", || {
            !owner_a.candidates().is_empty() && !owner_b.candidates().is_empty()
        });

        owner_a.ignore("ride-1");

        assert!(owner_a.candidates().is_empty());
        assert!(!owner_b.candidates().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn candidate_changes_are_published_as_events() {
        let dispatch = dispatch();
        let _matcher = dispatch.matcher("owner-a");

        seed_car(&dispatch, "owner-a", "ABC-1234").await;
        seed_ride(&dispatch, "ride-1", "ABC-1234").await;

        let deadline = Instant::now() + Duration::from_secs(5);

        loop {
            assert!(Instant::now() < deadline, "no candidate event arrived");

            let event = dispatch.next_event_within(Duration::from_millis(100));

            if let Some(DispatchEvent::CandidatesChanged { owner_uid, rides }) = event {
                if owner_uid == "owner-a" && !rides.is_empty() {
                    break;
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn candidates_carry_the_customer_profile() {
        let dispatch = dispatch();
        let matcher = dispatch.matcher("owner-a");

        let customer = dispatch
            .auth
            .register(NewAccount {
                user_name: "Hassan".to_string(),
                email: "rider@safri360.pk".to_string(),
                phone_number: "+923001234567".to_string(),
                password: "a-strong-password".to_string(),
                role: Role::Rider,
            })
            .await
            .unwrap();

        seed_car(&dispatch, "owner-a", "ABC-1234").await;

        let mut ride = RideData::mock("ride-1", &customer.uid, "ABC-1234");
        ride.customer_id = customer.uid.clone();

        dispatch
            .context()
            .store
            .set(&paths::ride("ride-1"), serde_json::to_value(&ride).unwrap())
            .await
            .unwrap();

        eventually("the ride is listed", || !matcher.candidates().is_empty());

        let enriched = matcher.enriched_candidates().await;

        assert_eq!(enriched.len(), 1);
        assert_eq!(
            enriched[0].customer.as_ref().unwrap().user_name,
            "Hassan"
        );
    }
}
