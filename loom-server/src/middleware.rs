//! `ServerTimeLayer`: a tower `Layer`/`Service` pair that times each request
//! and stamps the response with a `Server-Timing` header, logging at `info`
//! alongside it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::http::{HeaderValue, Request, Response};
use tower::{Layer, Service};
use tracing::info;

#[derive(Clone, Copy, Debug, Default)]
pub struct ServerTimeLayer;

impl<S> Layer<S> for ServerTimeLayer {
    type Service = ServerTimeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerTimeService { inner }
    }
}

#[derive(Clone)]
pub struct ServerTimeService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ServerTimeService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let start = Instant::now();

        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            let elapsed = start.elapsed();
            let status = response.status().as_u16();

            if let Ok(value) = HeaderValue::from_str(&format!("total;dur={}", elapsed.as_millis()))
            {
                response.headers_mut().insert("server-timing", value);
            }

            info!(%method, %path, status, elapsed_ms = elapsed.as_millis() as u64, "handled request");
            Ok(response)
        })
    }
}
