use common::domain::{DomainResult, ListPayloadsRepoInput, Payload, PayloadRepository};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Service request for listing payloads
#[derive(Debug, Clone, Default)]
pub struct ListPayloadsRequest {
    /// Restrict to one device. Blank means no filter.
    pub dev_eui: Option<String>,
}

/// Read side for stored payloads
pub struct PayloadService {
    payload_repository: Arc<dyn PayloadRepository>,
}

impl PayloadService {
    pub fn new(payload_repository: Arc<dyn PayloadRepository>) -> Self {
        Self { payload_repository }
    }

    /// Payloads, newest first
    #[instrument(skip(self, request), fields(dev_eui = ?request.dev_eui))]
    pub async fn list_payloads(&self, request: ListPayloadsRequest) -> DomainResult<Vec<Payload>> {
        let dev_eui = request.dev_eui.filter(|dev_eui| !dev_eui.is_empty());

        let payloads = self
            .payload_repository
            .list_payloads(ListPayloadsRepoInput { dev_eui })
            .await?;

        debug!(count = payloads.len(), "listed payloads");

        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::MockPayloadRepository;

    #[tokio::test]
    async fn test_list_payloads_passes_filter() {
        let mut mock_repo = MockPayloadRepository::new();
        mock_repo
            .expect_list_payloads()
            .withf(|input: &ListPayloadsRepoInput| input.dev_eui.as_deref() == Some("AA:BB"))
            .times(1)
            .return_once(|_| Ok(vec![]));

        let service = PayloadService::new(Arc::new(mock_repo));
        let result = service
            .list_payloads(ListPayloadsRequest {
                dev_eui: Some("AA:BB".to_string()),
            })
            .await;

        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_filter_lists_everything() {
        let mut mock_repo = MockPayloadRepository::new();
        mock_repo
            .expect_list_payloads()
            .withf(|input: &ListPayloadsRepoInput| input.dev_eui.is_none())
            .times(1)
            .return_once(|_| Ok(vec![]));

        let service = PayloadService::new(Arc::new(mock_repo));
        let result = service
            .list_payloads(ListPayloadsRequest {
                dev_eui: Some(String::new()),
            })
            .await;

        assert!(result.is_ok());
    }
}
