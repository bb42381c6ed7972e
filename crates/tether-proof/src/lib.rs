//! Tether Proof Protocol
//!
//! Request, consent grant and proof messages, and the engine that moves a
//! proof through its lifecycle:
//!
//! ```text
//! ProofRequest -> ConsentGrant -> ProofResponse -> VerificationResult
//! ```
//!
//! The verifier creates a request with [`ProtocolEngine::create_request`].
//! The holder signs a grant echoing the request's nonce and audience and
//! builds a proof bound to the request hash with [`Prover`]. The verifier
//! checks schema, time windows, equality of the echoed fields, permission
//! coverage, the binding hash, the grant signature and replay status, and
//! returns every failure in one [`VerificationResult`].

pub mod config;
pub mod engine;
pub mod error;
pub mod limits;
pub mod messages;
pub mod prover;
pub mod replay;
pub mod repository;
pub mod result;
pub mod schema;
pub mod time;
pub mod version;

pub use config::{ProtocolConfig, DEFAULT_PROOF_TTL_SECONDS, DEFAULT_REQUEST_TTL_SECONDS};
pub use engine::ProtocolEngine;
pub use error::{ProofError, ProofResult};
pub use limits::{Limits, MAX_JSON_INPUT_BYTES, MAX_PERMISSIONS, MAX_PERMISSION_ID_LENGTH};
pub use messages::{
    ConsentGrant, ProofBinding, ProofRequest, ProofResponse, ProverRef, SignerRef,
    PROVER_TYPE_PAIRWISE, SIGNER_TYPE_DID,
};
pub use prover::{ProofOptions, Prover};
pub use replay::{replay_key, replay_ttl, ReplayGuard, DEFAULT_MIN_REPLAY_TTL_SECONDS};
pub use repository::MessageRepository;
pub use result::{VerificationChecks, VerificationResult};
pub use schema::{SchemaIssue, SchemaReport};
pub use time::{TimeCheck, TimePolicy, DEFAULT_MAX_CLOCK_SKEW_SECONDS, DEFAULT_MAX_PROOF_AGE_SECONDS};
pub use version::{ProtocolVersion, VersionPolicy};
