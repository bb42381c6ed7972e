//! Tether Policy
//!
//! Decks and permission evaluation. A [`DeckDefinition`] is a registry-held
//! template of permissions, each declaring the evidence it needs (type,
//! freshness, issuer policy). A [`DeckInstance`] binds an owner's evidence
//! sources to those permissions, and the [`DeckEvaluator`] decides, per
//! permission, whether the bound source satisfies it.

pub mod deck;
pub mod error;
pub mod evaluator;
pub mod instances;
pub mod registry;

pub use deck::{
    normalize_evidence_type, DeckDefinition, DeckInstance, DenyReason, Evaluation,
    EvaluationContext, IssuerPolicy, PermissionDefinition, SatisfyResult, EVIDENCE_TYPE_ANY,
    MAX_DECK_SOURCES,
};
pub use error::{PolicyError, PolicyResult};
pub use evaluator::DeckEvaluator;
pub use instances::DeckInstanceStore;
pub use registry::{default_decks, DeckRegistry, BASIC_IDENTITY_DECK, KYC_LITE_DECK};
pub use tether_adapters::{SourceMetadata, SourceRef};
