//! Relaying queries to a single upstream server.
//!
//! A [`ForwardingResolver`] stops relaying once its upstream produced too many
//! errors inside a short window, and starts a background health monitor that
//! brings it back online when a validation query succeeds again.

mod breaker;
mod config;
#[cfg(test)]
mod mock;
mod monitor;
mod upstream;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::Instant;

use crate::dns::{question_of, DnsRequest, DnsResponse, Name, ResponseCode};
use crate::log::{debug, info, warn};
use crate::resolver::Resolver;

use breaker::CircuitBreaker;
use monitor::HealthMonitor;

pub use config::ForwardingResolverConfig;
pub use upstream::{UdpTcpUpstream, Upstream};

pub struct ForwardingResolver<U: Upstream = UdpTcpUpstream> {
    name: String,
    upstream: Arc<U>,
    breaker: Arc<CircuitBreaker>,
    max_errors: usize,
    validation_query: Name,
    validation_interval: Duration,
}

impl ForwardingResolver<UdpTcpUpstream> {
    pub fn new(cfg: &ForwardingResolverConfig) -> Self {
        Self::with_upstream(cfg, UdpTcpUpstream::from_config(cfg))
    }
}

impl<U: Upstream> ForwardingResolver<U> {
    pub fn with_upstream(cfg: &ForwardingResolverConfig, upstream: U) -> Self {
        let (breaker, max_errors) = match cfg.failure_detection() {
            Some((max_errors, window)) => {
                info!(
                    "resolver {} has maxerrors and errorWindowsSize set, enabling failover detection",
                    cfg.name
                );
                (CircuitBreaker::new(max_errors, window), max_errors)
            }
            None => (CircuitBreaker::disabled(), 0),
        };

        Self {
            name: cfg.name.clone(),
            upstream: Arc::new(upstream),
            breaker: Arc::new(breaker),
            max_errors,
            validation_query: cfg.validation_query.clone(),
            validation_interval: cfg.validation_interval,
        }
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.breaker.is_online()
    }

    #[inline]
    pub fn detects_failures(&self) -> bool {
        self.breaker.is_enabled()
    }

    /// Relays `request` upstream.
    ///
    /// Returns `None` while offline, on any relay failure, and for answers that
    /// carry nothing usable so the next resolver in the chain gets a chance.
    pub async fn generate_reply(&self, request: &DnsRequest) -> Option<DnsResponse> {
        if !self.breaker.is_online() {
            debug!(
                "resolver {} is offline skipping query {}",
                self.name,
                question_of(request)
            );
            return None;
        }

        debug!(
            "resolver {} forwarding query {}",
            self.name,
            question_of(request)
        );

        let relay = AssertUnwindSafe(self.upstream.send(request)).catch_unwind();

        let err = match relay.await {
            Ok(Ok(response)) => {
                debug!(
                    "resolver {} got response {} with {} answer, {} authoritative and {} additional records",
                    self.name,
                    response.response_code(),
                    response.answers().len(),
                    response.name_servers().len(),
                    response.additionals().len()
                );
                return accept(response);
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => "panic in upstream relay".to_string(),
        };

        warn!(
            "error {} in resolver {} while forwarding query {}",
            err,
            self.name,
            question_of(request)
        );
        self.process_error();

        None
    }

    fn process_error(&self) {
        let Some(span) = self.breaker.record_error(Instant::now()) else {
            return;
        };

        warn!(
            "marking resolver {} as offline after receiving {} errors in {:?}",
            self.name, self.max_errors, span
        );

        HealthMonitor {
            resolver: self.name.clone(),
            upstream: self.upstream.clone(),
            breaker: self.breaker.clone(),
            query: self.validation_query.clone(),
            interval: self.validation_interval,
        }
        .spawn();
    }
}

#[async_trait]
impl<U: Upstream> Resolver for ForwardingResolver<U> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_reply(&self, request: &DnsRequest) -> Option<DnsResponse> {
        ForwardingResolver::<U>::generate_reply(self, request).await
    }
}

/// Keeps responses that answer something; drops failures and empty NOERROR.
fn accept(response: DnsResponse) -> Option<DnsResponse> {
    match response.response_code() {
        ResponseCode::NXDomain | ResponseCode::ServFail => None,
        ResponseCode::NoError
            if response.answers().is_empty() && response.name_servers().is_empty() =>
        {
            None
        }
        _ => Some(response),
    }
}
