use std::collections::BTreeSet;

use crate::types::Claims;

/// Claim names that grant a permission: every key whose value is not
/// boolean `false`.
pub fn extract_claim_permissions(claims: &Claims) -> BTreeSet<String> {
    claims
        .iter()
        .filter(|(_, value)| value.grants())
        .map(|(name, _)| name.clone())
        .collect()
}

/// Required names not granted by `claims`, in the order given.
pub fn missing_claims(claims: &Claims, required: &[String]) -> Vec<String> {
    let granted = extract_claim_permissions(claims);
    let mut missing: Vec<String> = Vec::new();
    for name in required {
        if !granted.contains(name) && !missing.contains(name) {
            missing.push(name.clone());
        }
    }
    missing
}
