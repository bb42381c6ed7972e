//! Persistence of protocol messages in the record store.

use std::sync::Arc;

use tether_core::{get_json, list_json, put_json, GrantId, ProofId, RecordKind, RecordStore, RequestId};

use crate::error::ProofResult;
use crate::messages::{ConsentGrant, ProofRequest, ProofResponse};

/// Requests, grants and proofs keyed by their own ids.
///
/// Lookups by request id scan the record kind; the store keeps insertion
/// order, so "latest" is the last one saved.
#[derive(Clone)]
pub struct MessageRepository {
    store: Arc<dyn RecordStore>,
}

impl MessageRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn save_request(&self, request: &ProofRequest) -> ProofResult<()> {
        put_json(
            self.store.as_ref(),
            RecordKind::ProofRequest,
            request.request_id.as_str(),
            request,
        )?;
        Ok(())
    }

    pub fn get_request(&self, id: &RequestId) -> ProofResult<Option<ProofRequest>> {
        Ok(get_json(self.store.as_ref(), RecordKind::ProofRequest, id.as_str())?)
    }

    pub fn save_grant(&self, grant: &ConsentGrant) -> ProofResult<()> {
        put_json(
            self.store.as_ref(),
            RecordKind::ConsentGrant,
            grant.grant_id.as_str(),
            grant,
        )?;
        Ok(())
    }

    pub fn get_grant(&self, id: &GrantId) -> ProofResult<Option<ConsentGrant>> {
        Ok(get_json(self.store.as_ref(), RecordKind::ConsentGrant, id.as_str())?)
    }

    pub fn grants_for_request(&self, request_id: &RequestId) -> ProofResult<Vec<ConsentGrant>> {
        let grants: Vec<ConsentGrant> = list_json(self.store.as_ref(), RecordKind::ConsentGrant)?;
        Ok(grants
            .into_iter()
            .filter(|g| &g.request_id == request_id)
            .collect())
    }

    pub fn latest_grant_for_request(
        &self,
        request_id: &RequestId,
    ) -> ProofResult<Option<ConsentGrant>> {
        Ok(self.grants_for_request(request_id)?.pop())
    }

    pub fn save_proof(&self, proof: &ProofResponse) -> ProofResult<()> {
        put_json(
            self.store.as_ref(),
            RecordKind::Proof,
            proof.proof_id.as_str(),
            proof,
        )?;
        Ok(())
    }

    pub fn get_proof(&self, id: &ProofId) -> ProofResult<Option<ProofResponse>> {
        Ok(get_json(self.store.as_ref(), RecordKind::Proof, id.as_str())?)
    }

    pub fn proofs_for_request(&self, request_id: &RequestId) -> ProofResult<Vec<ProofResponse>> {
        let proofs: Vec<ProofResponse> = list_json(self.store.as_ref(), RecordKind::Proof)?;
        Ok(proofs
            .into_iter()
            .filter(|p| &p.request_id == request_id)
            .collect())
    }
}
