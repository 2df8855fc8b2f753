use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use docflow_core::error::Result;

/// Reserved destination marking graph completion. Not a real node.
pub const END: &str = "END";

/// Computes a routing label from the state.
///
/// Routers take the state by value and hand it back alongside the label,
/// so any bookkeeping they do (advancing a cursor, resetting a counter)
/// is visible in the signature and lands atomically with the decision.
pub trait Router<S>: Send + Sync + 'static {
    fn route(&self, state: S) -> BoxFuture<'static, Result<(S, String)>>;
}

impl<S, F, Fut> Router<S> for F
where
    S: Send + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(S, String)>> + Send + 'static,
{
    fn route(&self, state: S) -> BoxFuture<'static, Result<(S, String)>> {
        Box::pin(self(state))
    }
}

/// A runtime-resolved successor: router plus label table.
pub struct ConditionalEdge<S> {
    pub router: Arc<dyn Router<S>>,
    /// Label -> destination node name.
    pub branches: HashMap<String, String>,
}

impl<S> ConditionalEdge<S> {
    pub fn new(router: Arc<dyn Router<S>>, branches: HashMap<String, String>) -> Self {
        Self { router, branches }
    }

    /// Destination for a label; unmapped labels go to [`END`].
    pub fn resolve(&self, label: &str) -> &str {
        self.branches.get(label).map(String::as_str).unwrap_or(END)
    }

    /// Every destination named in the label table.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.branches.values().map(String::as_str)
    }
}

impl<S> Clone for ConditionalEdge<S> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            branches: self.branches.clone(),
        }
    }
}

/// Build a label table from `(label, destination)` pairs.
pub fn branches<I, L, D>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (L, D)>,
    L: Into<String>,
    D: Into<String>,
{
    pairs
        .into_iter()
        .map(|(label, dest)| (label.into(), dest.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge() -> ConditionalEdge<u32> {
        let router: Arc<dyn Router<u32>> =
            Arc::new(|n: u32| async move { Ok((n, if n > 2 { "big" } else { "small" }.to_string())) });
        ConditionalEdge::new(router, branches([("big", "shrink"), ("small", "grow")]))
    }

    #[test]
    fn test_resolve_mapped_label() {
        let e = edge();
        assert_eq!(e.resolve("big"), "shrink");
        assert_eq!(e.resolve("small"), "grow");
    }

    #[test]
    fn test_unmapped_label_goes_to_end() {
        assert_eq!(edge().resolve("medium"), END);
    }

    #[tokio::test]
    async fn test_router_returns_state_and_label() {
        let e = edge();
        let (state, label) = e.router.route(5).await.unwrap();
        assert_eq!(state, 5);
        assert_eq!(label, "big");
    }

    #[test]
    fn test_targets_lists_destinations() {
        let e = edge();
        let mut targets: Vec<&str> = e.targets().collect();
        targets.sort();
        assert_eq!(targets, vec!["grow", "shrink"]);
    }
}
