use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tether_adapters::SourceRef;
use tether_core::{DeckId, ErrorCode, InstanceId, Timestamp};

/// Evidence type that matches every source type.
pub const EVIDENCE_TYPE_ANY: &str = "any";

/// Default cap on the number of sources one deck instance may bind.
pub const MAX_DECK_SOURCES: usize = 128;

/// Lowercase an evidence type and fold aliases (`credential` is `vc`).
pub fn normalize_evidence_type(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "credential" => "vc".to_string(),
        _ => lowered,
    }
}

// ---------------------------------------------------------------------------
// Deck definitions (registry-held templates)
// ---------------------------------------------------------------------------

/// Issuer constraints on the evidence for one permission.
///
/// `allow: None` means no allow-list; `allow: Some(vec![])` allows nobody.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDefinition {
    pub id: String,
    pub evidence_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_policy: Option<IssuerPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PermissionDefinition {
    pub fn new(id: impl Into<String>, evidence_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            evidence_type: evidence_type.into(),
            freshness_seconds: None,
            issuer_policy: None,
            description: None,
        }
    }

    pub fn with_freshness(mut self, seconds: u64) -> Self {
        self.freshness_seconds = Some(seconds);
        self
    }

    pub fn with_issuer_policy(mut self, policy: IssuerPolicy) -> Self {
        self.issuer_policy = Some(policy);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Immutable, versioned template of permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDefinition {
    pub id: DeckId,
    pub name: String,
    pub version: String,
    pub permissions: Vec<PermissionDefinition>,
}

impl DeckDefinition {
    pub fn permission(&self, permission_id: &str) -> Option<&PermissionDefinition> {
        self.permissions.iter().find(|p| p.id == permission_id)
    }

    pub fn permission_ids(&self) -> Vec<&str> {
        self.permissions.iter().map(|p| p.id.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Deck instances (per-owner bindings)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckInstance {
    pub instance_id: InstanceId,
    pub deck_id: DeckId,
    pub owner_did: String,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceRef>,
}

impl DeckInstance {
    pub fn new(deck_id: impl Into<DeckId>, owner_did: impl Into<String>) -> Self {
        Self {
            instance_id: InstanceId::generate(),
            deck_id: deck_id.into(),
            owner_did: owner_did.into(),
            sources: BTreeMap::new(),
        }
    }

    /// Bind (or rebind) the evidence source for a permission.
    pub fn bind(&mut self, permission_id: impl Into<String>, source: SourceRef) -> &mut Self {
        self.sources.insert(permission_id.into(), source);
        self
    }

    pub fn unbind(&mut self, permission_id: &str) -> Option<SourceRef> {
        self.sources.remove(permission_id)
    }
}

// ---------------------------------------------------------------------------
// Evaluation results
// ---------------------------------------------------------------------------

/// Why a permission could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    TooManySources,
    DeckNotFound,
    PermissionNotInDeck,
    NoSource,
    EvidenceTypeMismatch,
    InvalidTimestamp,
    Stale,
    IssuerDenied,
    IssuerNotAllowed,
    MissingIssuer,
    InsufficientTrust,
    HandlerMissing,
    HandlerRejected,
}

impl DenyReason {
    /// Structured protocol code, for the reasons that have one.
    pub fn error_code(self) -> Option<ErrorCode> {
        match self {
            DenyReason::TooManySources => Some(ErrorCode::TooManyDeckSources),
            DenyReason::InvalidTimestamp => Some(ErrorCode::InvalidTimestampFormat),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::TooManySources => "too_many_sources",
            DenyReason::DeckNotFound => "deck_not_found",
            DenyReason::PermissionNotInDeck => "permission_not_in_deck",
            DenyReason::NoSource => "no_source",
            DenyReason::EvidenceTypeMismatch => "evidence_type_mismatch",
            DenyReason::InvalidTimestamp => "invalid_timestamp",
            DenyReason::Stale => "stale",
            DenyReason::IssuerDenied => "issuer_denied",
            DenyReason::IssuerNotAllowed => "issuer_not_allowed",
            DenyReason::MissingIssuer => "missing_issuer",
            DenyReason::InsufficientTrust => "insufficient_trust",
            DenyReason::HandlerMissing => "handler_missing",
            DenyReason::HandlerRejected => "handler_rejected",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of `can_satisfy` for one permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_summary: Option<String>,
}

impl Evaluation {
    pub fn satisfied(summary: Option<String>) -> Self {
        Self {
            ok: true,
            reason: None,
            message: None,
            evidence_summary: summary,
        }
    }

    pub fn denied(reason: DenyReason, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            message: Some(message.into()),
            evidence_summary: None,
        }
    }
}

/// Partition of a request's permissions into satisfied and unsatisfied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatisfyResult {
    pub satisfied: Vec<String>,
    pub unsatisfied: Vec<String>,
    /// Source used for each satisfied permission.
    pub mapping: BTreeMap<String, SourceRef>,
    /// One human-readable line per unsatisfied permission.
    pub errors: Vec<String>,
    pub reasons: BTreeMap<String, DenyReason>,
}

impl SatisfyResult {
    pub fn all_satisfied(&self) -> bool {
        self.unsatisfied.is_empty()
    }
}

/// Optional inputs to an evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationContext {
    /// Evaluation instant; defaults to the current time.
    pub now: Option<Timestamp>,
}

impl EvaluationContext {
    pub fn at(now: Timestamp) -> Self {
        Self { now: Some(now) }
    }

    pub fn now(&self) -> Timestamp {
        self.now.unwrap_or_else(Timestamp::now)
    }
}
