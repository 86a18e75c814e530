use std::sync::Arc;

use colored::Colorize;
use log::{error, info};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

use safri_dispatch::{Dispatch, LiveDispatch, LoggingSms};
use safri_impls::MemoryStore;

mod logging;

struct Safri {
    dispatch: Arc<LiveDispatch>,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum SafriError {
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Safri {
    fn new() -> Result<Self, SafriError> {
        info!("Building async runtime...");

        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("safri-async")
            .build()
            .map_err(|e| SafriError::Fatal(e.to_string()))?;

        info!("Setting up the realtime store and dispatch...");

        let dispatch = Arc::new(Dispatch::new(MemoryStore::new(), LoggingSms));

        Ok(Self { dispatch, runtime })
    }

    fn run(&self) {
        self.runtime
            .block_on(safri_server::run_server(self.dispatch.clone()));
    }
}

impl SafriError {
    fn hint(&self) -> String {
        match self {
            SafriError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn main() {
    logging::init_logger();

    match Safri::new() {
        Ok(safri) => {
            info!("Initialized successfully.");
            safri.run();
        }
        Err(error) => {
            error!(
                "{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.",
                "Safri failed to start!".bold().red()
            );
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
        }
    }
}
