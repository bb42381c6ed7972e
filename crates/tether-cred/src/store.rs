use std::sync::Arc;

use tether_core::{get_json, list_json, put_json, CredentialId, RecordKind, RecordStore, Timestamp};
use tracing::debug;

use crate::error::CredResult;
use crate::issuer::check_presentable;
use crate::types::VerifiableCredential;

/// Credentials persisted as `credential` records.
pub struct CredentialStore {
    store: Arc<dyn RecordStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, credential: &VerifiableCredential) -> CredResult<()> {
        put_json(
            self.store.as_ref(),
            RecordKind::Credential,
            credential.id.as_str(),
            credential,
        )?;
        debug!(credential_id = %credential.id, "saved credential");
        Ok(())
    }

    pub fn get(&self, id: &CredentialId) -> CredResult<Option<VerifiableCredential>> {
        Ok(get_json(self.store.as_ref(), RecordKind::Credential, id.as_str())?)
    }

    /// Every credential issued to `subject_id`, in insertion order.
    pub fn get_by_subject(&self, subject_id: &str) -> CredResult<Vec<VerifiableCredential>> {
        let all: Vec<VerifiableCredential> = list_json(self.store.as_ref(), RecordKind::Credential)?;
        Ok(all.into_iter().filter(|c| c.subject == subject_id).collect())
    }

    pub fn find_with_claims(
        &self,
        subject_id: &str,
        required: &[String],
    ) -> CredResult<Option<VerifiableCredential>> {
        self.find_with_claims_at(subject_id, required, Timestamp::now())
    }

    /// First credential for the subject, in insertion order, that is
    /// unexpired at `now`, carries a valid signature and grants every
    /// required claim.
    pub fn find_with_claims_at(
        &self,
        subject_id: &str,
        required: &[String],
        now: Timestamp,
    ) -> CredResult<Option<VerifiableCredential>> {
        let found = self
            .get_by_subject(subject_id)?
            .into_iter()
            .find(|c| check_presentable(c, required, now).is_ok());
        debug!(subject = subject_id, found = found.is_some(), "credential lookup");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::{CredentialIssuer, IssueRequest};
    use crate::types::Claims;
    use tether_vault::{InMemoryRecordStore, KeySigner};

    const NOW: u64 = 1_700_000_000;

    fn setup() -> (CredentialStore, CredentialIssuer) {
        (
            CredentialStore::new(Arc::new(InMemoryRecordStore::new())),
            CredentialIssuer::new(Arc::new(KeySigner::from_bytes([0x21; 32]))),
        )
    }

    fn issue(
        issuer: &CredentialIssuer,
        subject: &str,
        claims: &str,
        expires_in: Option<u64>,
    ) -> VerifiableCredential {
        let claims: Claims = serde_json::from_str(claims).unwrap();
        issuer
            .issue_credential_at(
                IssueRequest {
                    subject_id: subject.into(),
                    claims,
                    expires_in_seconds: expires_in,
                },
                Timestamp::from_seconds(NOW - 100),
            )
            .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_save_and_get() {
        let (store, issuer) = setup();
        let cred = issue(&issuer, "alice", r#"{"age_over_18": true}"#, None);
        store.save(&cred).unwrap();
        assert_eq!(store.get(&cred.id).unwrap().unwrap(), cred);
        assert!(store.get(&CredentialId::new("nope")).unwrap().is_none());
    }

    #[test]
    fn test_get_by_subject() {
        let (store, issuer) = setup();
        let a1 = issue(&issuer, "alice", r#"{"a": true}"#, None);
        let b1 = issue(&issuer, "bob", r#"{"a": true}"#, None);
        let a2 = issue(&issuer, "alice", r#"{"b": true}"#, None);
        for c in [&a1, &b1, &a2] {
            store.save(c).unwrap();
        }
        assert_eq!(store.get_by_subject("alice").unwrap(), vec![a1, a2]);
        assert!(store.get_by_subject("carol").unwrap().is_empty());
    }

    #[test]
    fn test_find_with_claims_first_in_insertion_order() {
        let (store, issuer) = setup();
        let first = issue(&issuer, "alice", r#"{"age_over_18": true, "x": 1}"#, None);
        let second = issue(&issuer, "alice", r#"{"age_over_18": true}"#, None);
        store.save(&first).unwrap();
        store.save(&second).unwrap();
        let found = store
            .find_with_claims_at("alice", &names(&["age_over_18"]), Timestamp::from_seconds(NOW))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn test_find_with_claims_skips_expired_false_and_forged() {
        let (store, issuer) = setup();
        let expired = issue(&issuer, "alice", r#"{"age_over_18": true}"#, Some(10));
        let denied = issue(&issuer, "alice", r#"{"age_over_18": false}"#, None);
        let mut forged = issue(&issuer, "alice", r#"{"age_over_18": false}"#, None);
        forged.claims.insert("age_over_18".into(), true.into());
        let good = issue(&issuer, "alice", r#"{"age_over_18": true}"#, Some(3600));
        for c in [&expired, &denied, &forged, &good] {
            store.save(c).unwrap();
        }
        let found = store
            .find_with_claims_at("alice", &names(&["age_over_18"]), Timestamp::from_seconds(NOW))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, good.id);
    }

    #[test]
    fn test_find_with_claims_requires_all() {
        let (store, issuer) = setup();
        store
            .save(&issue(&issuer, "alice", r#"{"age_over_18": true}"#, None))
            .unwrap();
        assert!(store
            .find_with_claims_at(
                "alice",
                &names(&["age_over_18", "email_verified"]),
                Timestamp::from_seconds(NOW)
            )
            .unwrap()
            .is_none());
    }
}
