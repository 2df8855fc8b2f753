use std::future::Future;

use futures::future::BoxFuture;

use docflow_core::error::Result;

/// A unit of work in the graph: takes the state, returns the next state.
///
/// Handlers receive the state by value for the span of their invocation,
/// so nothing can keep a reference to it after returning. Any
/// `Fn(S) -> impl Future<Output = Result<S>>` closure is a handler.
pub trait NodeHandler<S>: Send + Sync + 'static {
    fn call(&self, state: S) -> BoxFuture<'static, Result<S>>;
}

impl<S, F, Fut> NodeHandler<S> for F
where
    S: Send + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S>> + Send + 'static,
{
    fn call(&self, state: S) -> BoxFuture<'static, Result<S>> {
        Box::pin(self(state))
    }
}
