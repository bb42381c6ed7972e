use std::sync::Arc;

use tether_adapters::{AdapterRegistry, SourceRef};
use tether_core::Timestamp;
use tracing::debug;

use crate::deck::{
    normalize_evidence_type, DeckInstance, DenyReason, Evaluation, EvaluationContext,
    IssuerPolicy, PermissionDefinition, SatisfyResult, EVIDENCE_TYPE_ANY, MAX_DECK_SOURCES,
};
use crate::error::{PolicyError, PolicyResult};
use crate::registry::DeckRegistry;

/// Evaluates whether a deck instance's evidence satisfies a permission.
///
/// Stateless apart from read access to the deck and adapter registries, so
/// one evaluator can serve any number of concurrent callers.
pub struct DeckEvaluator {
    decks: Arc<DeckRegistry>,
    adapters: Arc<AdapterRegistry>,
    max_sources: usize,
}

impl DeckEvaluator {
    pub fn new(decks: Arc<DeckRegistry>, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            decks,
            adapters,
            max_sources: MAX_DECK_SOURCES,
        }
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    pub fn decks(&self) -> &DeckRegistry {
        &self.decks
    }

    /// Reject instances that bind more sources than allowed.
    pub fn validate_instance(&self, instance: &DeckInstance) -> PolicyResult<()> {
        if instance.sources.len() > self.max_sources {
            return Err(PolicyError::TooManySources {
                count: instance.sources.len(),
                max: self.max_sources,
            });
        }
        Ok(())
    }

    /// Check one permission against the instance's bound source.
    ///
    /// Steps run in order and the first failure wins: deck, permission,
    /// source, evidence type, freshness, issuer policy, evidence handler.
    pub fn can_satisfy(
        &self,
        instance: &DeckInstance,
        permission_id: &str,
        ctx: &EvaluationContext,
    ) -> Evaluation {
        let evaluation = self.evaluate(instance, permission_id, ctx);
        match evaluation.reason {
            Some(reason) => debug!(
                instance_id = %instance.instance_id,
                permission_id,
                reason = %reason,
                "permission not satisfied"
            ),
            None => debug!(
                instance_id = %instance.instance_id,
                permission_id,
                "permission satisfied"
            ),
        }
        evaluation
    }

    fn evaluate(
        &self,
        instance: &DeckInstance,
        permission_id: &str,
        ctx: &EvaluationContext,
    ) -> Evaluation {
        if let Err(e) = self.validate_instance(instance) {
            return Evaluation::denied(DenyReason::TooManySources, e.to_string());
        }

        let Some(deck) = self.decks.get(&instance.deck_id) else {
            return Evaluation::denied(
                DenyReason::DeckNotFound,
                format!("deck {} is not registered", instance.deck_id),
            );
        };

        let Some(permission) = deck.permission(permission_id) else {
            return Evaluation::denied(
                DenyReason::PermissionNotInDeck,
                format!("permission {} is not part of deck {}", permission_id, deck.id),
            );
        };

        let Some(source) = instance.sources.get(permission_id) else {
            return Evaluation::denied(
                DenyReason::NoSource,
                format!("no source bound for {}", permission_id),
            );
        };

        let source_type = normalize_evidence_type(&source.source_type);
        if let Err(denied) = check_evidence_type(permission, &source_type) {
            return denied;
        }

        let freshness_unverified = match check_freshness(permission, source, ctx.now()) {
            Ok(unverified) => unverified,
            Err(denied) => return denied,
        };

        if let Some(policy) = &permission.issuer_policy {
            if let Err(denied) = check_issuer_policy(policy, source) {
                return denied;
            }
        }

        let Some(handler) = self.adapters.evidence_handler(&source_type) else {
            return Evaluation::denied(
                DenyReason::HandlerMissing,
                format!("no evidence handler registered for {}", source_type),
            );
        };
        let check = handler.check(source);
        if !check.valid {
            return Evaluation::denied(
                DenyReason::HandlerRejected,
                check
                    .summary
                    .unwrap_or_else(|| format!("{} handler rejected the source", source_type)),
            );
        }

        let summary = match (check.summary, freshness_unverified) {
            (Some(s), true) => Some(format!("{}; freshness: unverified", s)),
            (None, true) => Some("freshness: unverified".to_string()),
            (summary, false) => summary,
        };
        Evaluation::satisfied(summary)
    }

    /// Evaluate every required permission and partition the result.
    ///
    /// Duplicate ids are evaluated once; output order follows first
    /// occurrence in `required`.
    pub fn satisfy_request(
        &self,
        instance: &DeckInstance,
        required: &[String],
        ctx: &EvaluationContext,
    ) -> SatisfyResult {
        let mut result = SatisfyResult::default();
        for permission_id in required {
            if result.satisfied.contains(permission_id) || result.unsatisfied.contains(permission_id)
            {
                continue;
            }
            let evaluation = self.can_satisfy(instance, permission_id, ctx);
            if evaluation.ok {
                if let Some(source) = instance.sources.get(permission_id) {
                    result.mapping.insert(permission_id.clone(), source.clone());
                }
                result.satisfied.push(permission_id.clone());
            } else {
                let reason = evaluation.reason.unwrap_or(DenyReason::NoSource);
                result.errors.push(format!(
                    "{}: {}",
                    permission_id,
                    evaluation.message.unwrap_or_else(|| reason.to_string())
                ));
                result.reasons.insert(permission_id.clone(), reason);
                result.unsatisfied.push(permission_id.clone());
            }
        }
        result
    }
}

fn check_evidence_type(permission: &PermissionDefinition, source_type: &str) -> Result<(), Evaluation> {
    let required = normalize_evidence_type(&permission.evidence_type);
    if required == EVIDENCE_TYPE_ANY || required == source_type {
        return Ok(());
    }
    Err(Evaluation::denied(
        DenyReason::EvidenceTypeMismatch,
        format!(
            "{} requires {} evidence, source is {}",
            permission.id, required, source_type
        ),
    ))
}

/// Returns `Ok(true)` when freshness applies but the source carries no
/// issuance time; such sources are allowed.
fn check_freshness(
    permission: &PermissionDefinition,
    source: &SourceRef,
    now: Timestamp,
) -> Result<bool, Evaluation> {
    let Some(max_age) = permission.freshness_seconds else {
        return Ok(false);
    };
    let Some(raw) = source.metadata.issued_at.as_deref() else {
        return Ok(true);
    };
    let Some(issued_at) = Timestamp::parse_wire(raw) else {
        return Err(Evaluation::denied(
            DenyReason::InvalidTimestamp,
            format!("source issuedAt {:?} is not a valid timestamp", raw),
        ));
    };
    let age = issued_at.seconds_until(&now);
    if age > max_age {
        return Err(Evaluation::denied(
            DenyReason::Stale,
            format!("evidence is {}s old, limit is {}s", age, max_age),
        ));
    }
    Ok(false)
}

fn check_issuer_policy(policy: &IssuerPolicy, source: &SourceRef) -> Result<(), Evaluation> {
    let issuer = source.metadata.issuer.as_deref();

    if let (Some(deny), Some(issuer)) = (&policy.deny, issuer) {
        if deny.iter().any(|d| d == issuer) {
            return Err(Evaluation::denied(
                DenyReason::IssuerDenied,
                format!("issuer {} is deny-listed", issuer),
            ));
        }
    }

    if let Some(allow) = &policy.allow {
        let Some(issuer) = issuer else {
            return Err(Evaluation::denied(
                DenyReason::MissingIssuer,
                "allow-list requires an issuer",
            ));
        };
        if !allow.iter().any(|a| a == issuer) {
            return Err(Evaluation::denied(
                DenyReason::IssuerNotAllowed,
                format!("issuer {} is not allow-listed", issuer),
            ));
        }
    }

    if let Some(min_trust) = policy.min_trust {
        let trust = source.metadata.trust;
        // NaN never satisfies the bound
        if !trust.is_some_and(|t| t >= min_trust) {
            return Err(Evaluation::denied(
                DenyReason::InsufficientTrust,
                format!("trust {:?} is below {}", trust, min_trust),
            ));
        }
    }

    Ok(())
}
