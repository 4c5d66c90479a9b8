//! Scope set helpers shared by tokens and stored delegation chains.

use std::collections::BTreeSet;

/// The scope that grants every other scope.
pub const WILDCARD: &str = "*";

/// Returns `true` if `scopes` contains the wildcard.
pub fn has_wildcard<'a, I>(scopes: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    scopes.into_iter().any(|scope| scope == WILDCARD)
}

/// Returns `true` if `scopes` grants `required`, either directly or through
/// the wildcard.
pub fn grants<'a, I>(scopes: I, required: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    scopes
        .into_iter()
        .any(|scope| scope == required || scope == WILDCARD)
}

/// Scopes in `child` that `parent` does not hold, sorted and deduplicated.
///
/// A parent holding the wildcard admits any child, so the result is empty.
pub fn excess<'a, C, P>(child: C, parent: P) -> Vec<String>
where
    C: IntoIterator<Item = &'a String>,
    P: IntoIterator<Item = &'a String>,
{
    let parent: BTreeSet<&String> = parent.into_iter().collect();
    if parent.iter().any(|scope| *scope == WILDCARD) {
        return Vec::new();
    }
    child
        .into_iter()
        .filter(|scope| !parent.contains(scope))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}
