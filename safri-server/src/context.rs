use std::sync::Arc;

use axum::extract::FromRef;
use safri_dispatch::LiveDispatch;

use crate::sse::ServerSentEvents;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub dispatch: Arc<LiveDispatch>,
    pub sse: Arc<ServerSentEvents>,
}
