//! Collaborator ports.
//!
//! The orchestrator reaches its three remote collaborators through these
//! traits so tests can run against in-memory fakes. The production
//! implementations are the `alphadesk-gateway` HTTP clients.

use alphadesk_core::{CreditType, JobId, JobRow, TriggerRequest};
use alphadesk_gateway::{
    CreditClient, CreditReservation, EngineClient, GatewayResult, JobPatch, JobStoreClient,
    TriggerReply,
};
use async_trait::async_trait;

/// Atomic credit reservation against the credit ledger.
#[async_trait]
pub trait CreditGateway: Send + Sync {
    /// Try to reserve one credit for the job. Idempotent per job id.
    async fn try_engage(
        &self,
        credit_type: CreditType,
        job_id: JobId,
    ) -> GatewayResult<CreditReservation>;
}

/// Persisted job table, treated as a dumb record keeper.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, row: &JobRow) -> GatewayResult<JobId>;
    async fn patch(&self, id: JobId, patch: &JobPatch) -> GatewayResult<()>;
    async fn delete(&self, id: JobId) -> GatewayResult<()>;
}

/// The workflow-engine trigger endpoint.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn trigger(&self, request: &TriggerRequest) -> GatewayResult<TriggerReply>;
}

#[async_trait]
impl CreditGateway for CreditClient {
    async fn try_engage(
        &self,
        credit_type: CreditType,
        job_id: JobId,
    ) -> GatewayResult<CreditReservation> {
        CreditClient::try_engage(self, credit_type, job_id).await
    }
}

#[async_trait]
impl JobStore for JobStoreClient {
    async fn insert(&self, row: &JobRow) -> GatewayResult<JobId> {
        JobStoreClient::insert(self, row).await
    }

    async fn patch(&self, id: JobId, patch: &JobPatch) -> GatewayResult<()> {
        JobStoreClient::patch(self, id, patch).await
    }

    async fn delete(&self, id: JobId) -> GatewayResult<()> {
        JobStoreClient::delete(self, id).await
    }
}

#[async_trait]
impl AnalysisEngine for EngineClient {
    async fn trigger(&self, request: &TriggerRequest) -> GatewayResult<TriggerReply> {
        EngineClient::trigger(self, request).await
    }
}
