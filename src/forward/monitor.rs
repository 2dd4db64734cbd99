use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use super::{breaker::CircuitBreaker, Upstream};
use crate::dns::{build_message, Name, RecordType, ResponseCode};
use crate::dns_error::UpstreamError;
use crate::libdns::proto::op::Query;
use crate::log::{debug, info};

/// Queries an offline upstream until it answers the validation query.
pub(super) struct HealthMonitor<U> {
    pub resolver: String,
    pub upstream: Arc<U>,
    pub breaker: Arc<CircuitBreaker>,
    pub query: Name,
    pub interval: Duration,
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error("got error {0}")]
    Upstream(#[from] UpstreamError),
    #[error("got response {0}")]
    Negative(ResponseCode),
    #[error("panic in upstream relay")]
    Panicked,
}

impl<U: Upstream> HealthMonitor<U> {
    /// Runs detached; the runtime does not wait for it on shutdown.
    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        info!("status monitoring for resolver {} started", self.resolver);

        loop {
            match self.check().await {
                Ok(()) => {
                    info!(
                        "marking resolver {} as online after getting successful response from query for {}",
                        self.resolver, self.query
                    );
                    self.breaker.set_online();
                    return;
                }
                Err(err) => {
                    debug!(
                        "resolver {} is still down, {} from upstream server for query {}",
                        self.resolver, err, self.query
                    );
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    async fn check(&self) -> Result<(), CheckError> {
        let request = build_message(Query::query(self.query.clone(), RecordType::A));
        let response = AssertUnwindSafe(self.upstream.send(&request))
            .catch_unwind()
            .await
            .map_err(|_| CheckError::Panicked)??;

        match response.response_code() {
            ResponseCode::NoError if !response.answers().is_empty() => Ok(()),
            code => Err(CheckError::Negative(code)),
        }
    }
}
