use serde_json::json;
use thiserror::Error;

use safri_store::{changes, RealtimeStore, StoreError};

use crate::{paths, DispatchContext, DispatchEvent, DriverData, DriverStatus, Role, SmsGateway};

/// The online/offline flag each actor toggles. Going online gates
/// matchability; nothing flips the flag back on disconnect, so presence
/// is stale-positive until the actor toggles again.
pub struct Presence<S, G> {
    context: DispatchContext<S, G>,
}

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("Driver does not exist")]
    DriverNotFound,
    #[error("Driver must complete their profile before going online")]
    IncompleteProfile,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<S, G> Presence<S, G>
where
    S: RealtimeStore,
    G: SmsGateway,
{
    pub fn new(context: &DispatchContext<S, G>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn set_driver_online(&self, pin: &str, online: bool) -> Result<(), PresenceError> {
        let snapshot = self.context.store.get(&paths::driver(pin)).await?;

        if !snapshot.exists() {
            return Err(PresenceError::DriverNotFound);
        }

        let driver: DriverData = snapshot.decode()?;

        if online && !driver.has_profile() {
            return Err(PresenceError::IncompleteProfile);
        }

        let status = if online {
            DriverStatus::Online
        } else {
            DriverStatus::Offline
        };

        self.context
            .store
            .update(
                &paths::driver(pin),
                changes([("status", serde_json::to_value(status).expect("status serializes"))]),
            )
            .await?;

        self.context.emit(DispatchEvent::PresenceChanged {
            uid: pin.to_string(),
            role: Role::Driver,
            online,
        });

        Ok(())
    }

    pub async fn set_account_online(
        &self,
        role: Role,
        uid: &str,
        online: bool,
    ) -> Result<(), PresenceError> {
        self.context
            .store
            .update(
                &paths::account(role, uid),
                changes([("isOnline", json!(online))]),
            )
            .await?;

        self.context.emit(DispatchEvent::PresenceChanged {
            uid: uid.to_string(),
            role,
            online,
        });

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use safri_impls::MemoryStore;
    use safri_store::RealtimeStore;

    use super::PresenceError;
    use crate::{paths, Dispatch, DriverData, DriverStatus, LoggingSms};

    fn dispatch() -> Dispatch<MemoryStore, LoggingSms> {
        Dispatch::new(MemoryStore::new(), LoggingSms)
    }

    async fn seed_driver(dispatch: &Dispatch<MemoryStore, LoggingSms>, driver: &DriverData) {
        dispatch
            .context()
            .store
            .set(
                &paths::driver(&driver.pin_code),
                serde_json::to_value(driver).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn toggling_writes_the_status_string() {
        let dispatch = dispatch();
        let mut driver = DriverData::mock("4821", "owner-1");
        driver.status = DriverStatus::Offline;

        seed_driver(&dispatch, &driver).await;

        dispatch.presence.set_driver_online("4821", true).await.unwrap();

        let stored: DriverData = dispatch
            .context()
            .store
            .get(&paths::driver("4821"))
            .await
            .unwrap()
            .decode()
            .unwrap();

        assert_eq!(stored.status, DriverStatus::Online);
    }

    #[tokio::test]
    async fn incomplete_profile_cannot_go_online() {
        let dispatch = dispatch();
        let mut driver = DriverData::mock("4821", "owner-1");
        driver.cnic = None;
        driver.status = DriverStatus::Offline;

        seed_driver(&dispatch, &driver).await;

        let result = dispatch.presence.set_driver_online("4821", true).await;

        assert!(matches!(result, Err(PresenceError::IncompleteProfile)));
    }
}
