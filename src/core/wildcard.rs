use std::future::Future;

use crate::core::dns::DomainName;

/// Iterative parent-walking lookup against a key-value backend.
///
/// Queries the exact name first, then `*.<parent>` at each ancestor up to
/// and including the root, returning the first non-empty result. Exact
/// beats wildcard at the same level because the exact query always runs
/// before any wildcard query is issued; a wildcard closer to the queried
/// name beats one further up because the walk proceeds rootward.
pub async fn resolve_wildcard<F, Fut, T>(name: &DomainName, mut lookup: F) -> Option<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    if let Some(value) = lookup(name.text()).await {
        return Some(value);
    }

    let mut current = name.clone();
    loop {
        if current.is_root() {
            return None;
        }
        current = current.parent();
        if let Some(value) = lookup(current.wildcard_text()).await {
            return Some(value);
        }
        if current.is_root() {
            return None;
        }
    }
}
