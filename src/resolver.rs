use std::sync::Arc;

use crate::dns::{question_of, DnsRequest, DnsResponse};
use crate::log::debug;

/// Something that may answer a query.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    /// A complete reply, or `None` to let the next resolver try.
    async fn generate_reply(&self, request: &DnsRequest) -> Option<DnsResponse>;
}

/// Resolvers asked in order until one answers.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub async fn resolve(&self, request: &DnsRequest) -> Option<DnsResponse> {
        for resolver in &self.resolvers {
            if let Some(response) = resolver.generate_reply(request).await {
                debug!(
                    "query {} answered by resolver {}",
                    question_of(request),
                    resolver.name()
                );
                return Some(response);
            }
        }
        debug!("no resolver answered query {}", question_of(request));
        None
    }
}
