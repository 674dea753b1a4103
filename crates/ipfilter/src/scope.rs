//! Path scopes: ordering and matching.

/// Order scopes for evaluation and drop duplicates.
///
/// Most specific first: longer scopes before shorter ones, ties alphabetical.
#[must_use]
pub fn canonicalize<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut scopes: Vec<String> = scopes.into_iter().map(Into::into).collect();
    scopes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    scopes.dedup();
    scopes
}

/// Whether a request path falls under `scope`.
///
/// `""` and `"/"` cover every path; anything else is a case-sensitive prefix.
#[must_use]
pub fn matches(scope: &str, path: &str) -> bool {
    scope.is_empty() || scope == "/" || path.starts_with(scope)
}
