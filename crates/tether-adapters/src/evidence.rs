use serde::{Deserialize, Serialize};

/// Descriptive metadata a source carries about its evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Wire timestamp (RFC 3339 or epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<f64>,
}

/// A reference to a piece of evidence bound to a permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub metadata: SourceMetadata,
}

impl SourceRef {
    pub fn new(source_type: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            reference: reference.into(),
            metadata: SourceMetadata::default(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.metadata.issuer = Some(issuer.into());
        self
    }

    pub fn with_issued_at(mut self, issued_at: impl Into<String>) -> Self {
        self.metadata.issued_at = Some(issued_at.into());
        self
    }

    pub fn with_trust(mut self, trust: f64) -> Self {
        self.metadata.trust = Some(trust);
        self
    }
}

/// Result of an evidence handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceCheck {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl EvidenceCheck {
    pub fn valid(summary: impl Into<String>) -> Self {
        Self {
            valid: true,
            summary: Some(summary.into()),
        }
    }

    pub fn invalid(summary: impl Into<String>) -> Self {
        Self {
            valid: false,
            summary: Some(summary.into()),
        }
    }
}

pub trait EvidenceHandler: Send + Sync {
    fn check(&self, source: &SourceRef) -> EvidenceCheck;
}

// ---------------------------------------------------------------------------
// Default handlers
// ---------------------------------------------------------------------------

/// `vc`: a credential reference with a named issuer.
#[derive(Debug, Default, Clone, Copy)]
pub struct VcHandler;

impl EvidenceHandler for VcHandler {
    fn check(&self, source: &SourceRef) -> EvidenceCheck {
        if source.reference.trim().is_empty() {
            return EvidenceCheck::invalid("vc source has an empty reference");
        }
        match source.metadata.issuer.as_deref() {
            Some(issuer) if !issuer.is_empty() => {
                EvidenceCheck::valid(format!("vc {} issued by {}", source.reference, issuer))
            }
            _ => EvidenceCheck::invalid(format!("vc {} has no issuer", source.reference)),
        }
    }
}

/// `attestation`: a third-party statement identified by reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttestationHandler;

impl EvidenceHandler for AttestationHandler {
    fn check(&self, source: &SourceRef) -> EvidenceCheck {
        if source.reference.trim().is_empty() {
            return EvidenceCheck::invalid("attestation source has an empty reference");
        }
        let by = source
            .metadata
            .issuer
            .as_deref()
            .map(|i| format!(" by {}", i))
            .unwrap_or_default();
        EvidenceCheck::valid(format!("attestation {}{}", source.reference, by))
    }
}

/// `self_attested`: the holder's own statement. Always accepted; issuer
/// policy is what restricts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfAttestedHandler;

impl EvidenceHandler for SelfAttestedHandler {
    fn check(&self, _source: &SourceRef) -> EvidenceCheck {
        EvidenceCheck::valid("self-attested")
    }
}
