//! [`tower`] middleware that runs the [`Gateway`] in front of a service.

use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::Full;
use hyper::{Request, Response};
use tower::{Layer, Service};

use crate::{ChainStore, Gateway, Outcome, Rejection, TokenVerifier};

/// Request header carrying the delegation token.
pub const DELEGATION_HEADER: &str = "x-delegation-token";

/// Wraps services in a [`DelegationService`].
pub struct DelegationLayer<V, C> {
    gateway: Gateway<V, C>,
}

impl<V, C> DelegationLayer<V, C> {
    /// Authorize requests with `gateway`.
    pub fn new(gateway: Gateway<V, C>) -> Self {
        Self { gateway }
    }
}

impl<V, C> Clone for DelegationLayer<V, C> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
        }
    }
}

impl<S, V, C> Layer<S> for DelegationLayer<V, C> {
    type Service = DelegationService<S, V, C>;

    fn layer(&self, inner: S) -> Self::Service {
        DelegationService {
            inner,
            gateway: self.gateway.clone(),
        }
    }
}

/// Authorizes each request before handing it to the inner service.
///
/// Authorized requests reach the inner service with a
/// [`DelegationContext`](crate::DelegationContext) in their extensions.
/// Rejected requests never reach it and are answered with the rejection's
/// JSON body.
pub struct DelegationService<S, V, C> {
    inner: S,
    gateway: Gateway<V, C>,
}

impl<S: Clone, V, C> Clone for DelegationService<S, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gateway: self.gateway.clone(),
        }
    }
}

impl<S, V, C, B> Service<Request<B>> for DelegationService<S, V, C>
where
    S: Service<Request<B>, Response = Response<Full<Bytes>>> + Clone + Send + 'static,
    S::Future: Send,
    V: TokenVerifier + 'static,
    C: ChainStore + 'static,
    B: Send + 'static,
{
    type Response = Response<Full<Bytes>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        // The readied service handles this request; the clone waits for the next.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gateway = self.gateway.clone();

        Box::pin(async move {
            let credential = match request.headers().get(DELEGATION_HEADER) {
                None => None,
                Some(value) => match value.to_str() {
                    Ok(value) => Some(value.to_string()),
                    Err(_) => {
                        return Ok(Rejection::invalid(
                            "Delegation token header is not valid ASCII",
                        )
                        .into_response());
                    }
                },
            };
            let method = request.method().as_str().to_string();
            let path = request.uri().path().to_string();

            match gateway
                .authorize(&method, &path, credential.as_deref())
                .await
            {
                Ok(Outcome::Passthrough) => inner.call(request).await,
                Ok(Outcome::Authorized(context)) => {
                    request.extensions_mut().insert(context);
                    inner.call(request).await
                }
                Err(rejection) => Ok(rejection.into_response()),
            }
        })
    }
}
