//! Load shedding for the API surface.
//!
//! Requests beyond `max_concurrent_requests` are answered immediately with
//! 503 instead of queueing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::warn;

use crate::service::ApiError;

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Arc<Semaphore>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> Service<Request> for LoadShedService<S>
where
    S: Service<Request, Response = Response> + Send,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            warn!(path = %req.uri().path(), "shedding request: concurrency limit reached");
            return Box::pin(async {
                Ok(ApiError::ServiceUnavailable("server overloaded".to_string()).into_response())
            });
        };

        let fut = self.inner.call(req);
        Box::pin(async move {
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::*;

    fn slow(
        delay: Duration,
    ) -> impl Service<Request, Response = Response, Error = Infallible, Future: Send> + Clone + Send
    {
        tower::service_fn(move |_req: Request| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        })
    }

    fn request() -> Request {
        Request::builder().uri("/r").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn passes_requests_under_limit() {
        let svc = LoadShedLayer::new(4).layer(slow(Duration::from_millis(1)));
        let response = svc.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_when_saturated() {
        let layer = LoadShedLayer::new(1);
        let busy = layer.layer(slow(Duration::from_millis(300)));
        let held = tokio::spawn(busy.oneshot(request()));
        tokio::time::sleep(Duration::from_millis(30)).await;

        let response = layer
            .layer(slow(Duration::from_millis(1)))
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(held.await.unwrap().unwrap().status(), StatusCode::OK);
    }
}
