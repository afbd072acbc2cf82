// Shared builders and store doubles for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use services_cms::domain::{Organization, ServiceMetadata};
use services_cms::{ServiceData, StoreError, VersionToken, Versioned, VersionedStore};
use std::sync::Arc;
use tokio::sync::Barrier;

pub fn service_data(name: &str) -> ServiceData {
    ServiceData {
        name: name.to_string(),
        description: "Book a slot at the recycling centre".to_string(),
        organization: Organization {
            name: "Comune di Esempio".to_string(),
            fiscal_code: "01234567890".to_string(),
        },
        metadata: ServiceMetadata {
            topic_id: Some(1),
            email: Some("servizi@example.org".to_string()),
            ..ServiceMetadata::default()
        },
        require_secure_channel: false,
        authorized_recipients: vec!["BBBBBB00B00B000B".to_string()],
        max_allowed_payment_amount: 0,
    }
}

/// Holds every `fetch` until `parties` readers have read, so racing callers
/// all observe the same version before any of them writes
pub struct BarrierStore<S> {
    inner: Arc<S>,
    barrier: Barrier,
}

impl<S> BarrierStore<S> {
    pub fn new(inner: Arc<S>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl<D, S> VersionedStore<D> for BarrierStore<S>
where
    D: Send + Sync + 'static,
    S: VersionedStore<D> + 'static,
{
    async fn fetch(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        let read = self.inner.fetch(id).await;
        self.barrier.wait().await;
        read
    }

    async fn save(
        &self,
        id: &str,
        document: D,
        expected: Option<&VersionToken>,
    ) -> Result<Versioned<D>, StoreError> {
        self.inner.save(id, document, expected).await
    }
}
