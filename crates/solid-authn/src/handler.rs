//! The handler-selection core: a chain of responsibility over async
//! capability probes.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// A unit of capability: probed with `can_handle`, invoked with `handle`.
///
/// Probes must be side-effect-free; an aggregate may probe a handler that
/// never gets to run.
#[async_trait]
pub trait Handler<P, R>: Send + Sync
where
    P: Send + Sync,
    R: Send,
{
    /// Whether this handler claims the given input. Errors are not the
    /// same as `false`: a probe failure aborts the whole selection.
    async fn can_handle(&self, params: &P) -> Result<bool>;

    /// Process the input. Only called after `can_handle` returned `true`.
    async fn handle(&self, params: P) -> Result<R>;
}

/// An ordered chain of handlers; the first whose probe succeeds wins.
///
/// Probing is sequential and short-circuiting: order is priority, and a
/// probe is never run for a handler that already lost the race. A probe
/// error propagates immediately instead of falling through to later
/// handlers, so configuration mistakes surface rather than being masked.
pub struct AggregateHandler<P, R> {
    name: &'static str,
    handlers: Vec<Box<dyn Handler<P, R>>>,
}

impl<P, R> AggregateHandler<P, R>
where
    P: Debug + Send + Sync,
    R: Send,
{
    /// Build a chain under a diagnostic name. Order is significant.
    pub fn new(name: &'static str, handlers: Vec<Box<dyn Handler<P, R>>>) -> Self {
        Self { name, handlers }
    }

    async fn select(&self, params: &P) -> Result<Option<&dyn Handler<P, R>>> {
        for handler in &self.handlers {
            if handler.can_handle(params).await? {
                return Ok(Some(handler.as_ref()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<P, R> Handler<P, R> for AggregateHandler<P, R>
where
    P: Debug + Send + Sync,
    R: Send,
{
    async fn can_handle(&self, params: &P) -> Result<bool> {
        Ok(self.select(params).await?.is_some())
    }

    async fn handle(&self, params: P) -> Result<R> {
        match self.select(&params).await? {
            Some(handler) => handler.handle(params).await,
            None => Err(Error::HandlerNotFound {
                aggregate: self.name,
                params: format!("{params:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        claims: bool,
        output: &'static str,
        probes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler<String, &'static str> for Fixed {
        async fn can_handle(&self, _params: &String) -> Result<bool> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(self.claims)
        }
        async fn handle(&self, _params: String) -> Result<&'static str> {
            Ok(self.output)
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl Handler<String, &'static str> for FailingProbe {
        async fn can_handle(&self, params: &String) -> Result<bool> {
            Err(Error::Configuration(format!("bad probe for {params}")))
        }
        async fn handle(&self, _params: String) -> Result<&'static str> {
            unreachable!("probe always fails")
        }
    }

    fn fixed(claims: bool, output: &'static str) -> (Box<dyn Handler<String, &'static str>>, Arc<AtomicUsize>) {
        let probes = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Fixed {
                claims,
                output,
                probes: probes.clone(),
            }),
            probes,
        )
    }

    #[tokio::test]
    async fn first_claiming_handler_wins() {
        let (first, _) = fixed(true, "first");
        let (second, second_probes) = fixed(true, "second");
        let chain = AggregateHandler::new("test", vec![first, second]);
        assert_eq!(chain.handle("input".to_owned()).await.unwrap(), "first");
        // Short-circuit: the losing handler was never probed.
        assert_eq!(second_probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skips_declining_handlers() {
        let (first, _) = fixed(false, "first");
        let (second, _) = fixed(true, "second");
        let chain = AggregateHandler::new("test", vec![first, second]);
        assert_eq!(chain.handle("input".to_owned()).await.unwrap(), "second");
        assert!(chain.can_handle(&"input".to_owned()).await.unwrap());
    }

    #[tokio::test]
    async fn no_claim_is_handler_not_found_with_params() {
        let (first, _) = fixed(false, "first");
        let chain = AggregateHandler::new("login", vec![first]);
        let err = chain.handle("the-input".to_owned()).await.unwrap_err();
        match err {
            Error::HandlerNotFound { aggregate, params } => {
                assert_eq!(aggregate, "login");
                assert!(params.contains("the-input"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!chain.can_handle(&"x".to_owned()).await.unwrap());
    }

    #[tokio::test]
    async fn probe_error_propagates_without_fallback() {
        let (second, second_probes) = fixed(true, "second");
        let chain = AggregateHandler::new("test", vec![Box::new(FailingProbe), second]);
        let err = chain.handle("input".to_owned()).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        // Fail fast: the later handler was never consulted.
        assert_eq!(second_probes.load(Ordering::SeqCst), 0);
    }
}
