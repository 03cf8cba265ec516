//! The load balancer: registry admin surface plus per-request dispatch.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use axum::{body::Body, http::Request, response::Response};
use tower::{Service, ServiceExt};
use url::Url;

use crate::http::request::{into_forwarded, target_uri};
use crate::load_balancer::{
    options::{Builder, Hooks},
    pool::Pool,
    round_robin::SmoothRoundRobin,
    LbError,
};

/// Pool and scheduler state guarded by a single lock.
///
/// Guards never outlive the in-memory update; logging happens after release.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    pool: Pool,
    scheduler: SmoothRoundRobin,
    default_weight: usize,
}

impl Shared {
    pub(crate) fn new(default_weight: usize) -> Self {
        Self {
            state: Mutex::new(State {
                pool: Pool::new(),
                scheduler: SmoothRoundRobin::new(),
                default_weight,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("load balancer mutex poisoned")
    }
}

impl State {
    fn reset(&mut self) {
        self.scheduler.reset(self.pool.backends());
    }
}

/// Weighted round-robin load balancer.
///
/// Cloning is cheap and every clone shares the same pool, so one handle can
/// serve traffic while another one is used by an admin task. Selection
/// follows [`SmoothRoundRobin`]; every successful mutation restarts the
/// selection cycle from scratch.
///
/// `F` is the forwarding service that performs the actual upstream call.
#[derive(Debug, Clone)]
pub struct LoadBalancer<F> {
    forwarder: F,
    shared: Arc<Shared>,
    hooks: Arc<Hooks>,
}

impl<F> LoadBalancer<F> {
    /// Start building a load balancer that forwards through `forwarder`.
    pub fn builder(forwarder: F) -> Builder<F> {
        Builder::new(forwarder)
    }

    /// Load balancer with default options.
    pub fn new(forwarder: F) -> Result<Self, LbError> {
        Self::builder(forwarder).build()
    }

    pub(crate) fn from_parts(forwarder: F, shared: Arc<Shared>, hooks: Arc<Hooks>) -> Self {
        Self {
            forwarder,
            shared,
            hooks,
        }
    }

    /// Add a backend, or update the weight of an existing one. `None` uses
    /// the current default weight.
    pub fn upsert_server(&self, url: &Url, weight: Option<i64>) -> Result<(), LbError> {
        let weight = weight.map(non_negative).transpose()?;

        let weight = {
            let mut state = self.shared.lock();
            let weight = weight.unwrap_or(state.default_weight);
            state.pool.upsert(url, weight)?;
            state.reset();
            weight
        };

        tracing::info!(server = %url, weight, "Upserted server");
        Ok(())
    }

    /// Remove a backend.
    pub fn remove_server(&self, url: &Url) -> Result<(), LbError> {
        let removed = {
            let mut state = self.shared.lock();
            let removed = state.pool.remove(url)?;
            state.reset();
            removed
        };

        tracing::info!(server = %removed.address(), "Removed server");
        Ok(())
    }

    /// Backend URLs in slot order.
    pub fn servers(&self) -> Vec<Url> {
        self.shared.lock().pool.urls()
    }

    /// Weight of a backend, `None` if it isn't registered.
    pub fn server_weight(&self, url: &Url) -> Option<usize> {
        self.shared.lock().pool.weight_of(url)
    }

    /// Change the weight used by future upserts without an explicit weight.
    /// Existing backends keep their weight.
    pub fn set_default_weight(&self, weight: i64) -> Result<(), LbError> {
        let weight = non_negative(weight)?;
        self.shared.lock().default_weight = weight;

        tracing::info!(weight, "Default weight changed");
        Ok(())
    }

    pub fn default_weight(&self) -> usize {
        self.shared.lock().default_weight
    }

    /// Select the backend for the next request.
    pub fn next_server(&self) -> Result<Url, LbError> {
        let (url, weight) = {
            let mut state = self.shared.lock();
            let State {
                pool, scheduler, ..
            } = &mut *state;

            let backend = scheduler.next(pool.backends())?;
            (backend.url().clone(), backend.weight())
        };

        tracing::debug!(server = %url, weight, "Selected server");
        Ok(url)
    }
}

impl<F> LoadBalancer<F>
where
    F: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    F::Future: Send,
{
    /// Select a backend, rewrite the request towards it and forward it.
    ///
    /// Selection errors never reach the caller as `Err`; they go through the
    /// configured [`ErrorHandler`](crate::load_balancer::ErrorHandler). The
    /// pool lock is released before the returned future is first polled.
    pub fn dispatch(&self, request: Request<Body>) -> impl Future<Output = Response> + Send + 'static {
        let prepared = self.prepare(request);
        let forwarder = self.forwarder.clone();

        async move {
            let outgoing = match prepared {
                Ok(outgoing) => outgoing,
                Err(response) => return response,
            };

            match forwarder.oneshot(outgoing).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        }
    }

    /// Pick a backend and build the request to forward, or the error
    /// response if no backend can take it.
    fn prepare(&self, request: Request<Body>) -> Result<Request<Body>, Response> {
        let target = match self
            .next_server()
            .and_then(|url| target_uri(request.uri(), &url))
        {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!(
                    method = %request.method(),
                    uri = %request.uri(),
                    error = %err,
                    "Unable to select a server"
                );
                return Err(self.hooks.error_handler.handle(&request, &err));
            }
        };

        let (original, outgoing) = into_forwarded(request, target);

        if let Some(listener) = &self.hooks.rewrite_listener {
            listener(&original, &outgoing);
        }

        Ok(outgoing)
    }
}

impl<F> Service<Request<Body>> for LoadBalancer<F>
where
    F: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    F::Future: Send,
{
    type Response = Response;

    type Error = Infallible;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let response = self.dispatch(request);
        Box::pin(async move { Ok(response.await) })
    }
}

fn non_negative(weight: i64) -> Result<usize, LbError> {
    usize::try_from(weight).map_err(|_| LbError::InvalidWeight(weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::service_fn;

    type Reply = std::future::Ready<Result<Response, Infallible>>;
    type Echo = tower::util::ServiceFn<fn(Request<Body>) -> Reply>;

    /// Answers with the host the request was sent to.
    fn echo_host(request: Request<Body>) -> Reply {
        let host = request.uri().host().unwrap_or_default().to_string();
        std::future::ready(Ok(host.into_response()))
    }

    fn echo() -> Echo {
        service_fn(echo_host as fn(Request<Body>) -> Reply)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn seq<F>(lb: &LoadBalancer<F>, count: usize) -> Vec<String> {
        (0..count)
            .map(|_| lb.next_server().unwrap().host_str().unwrap().to_string())
            .collect()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_upsert_same_server_twice() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();

        assert_eq!(lb.servers(), vec![url("http://a")]);
        assert_eq!(seq(&lb, 3), ["a", "a", "a"]);
    }

    #[test]
    fn test_simple() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();
        lb.upsert_server(&url("http://b"), None).unwrap();

        assert_eq!(seq(&lb, 3), ["a", "b", "a"]);
    }

    #[test]
    fn test_weighted() {
        let lb = LoadBalancer::builder(echo()).default_weight(0).build().unwrap();
        lb.upsert_server(&url("http://a"), Some(3)).unwrap();
        lb.upsert_server(&url("http://b"), Some(2)).unwrap();
        lb.upsert_server(&url("http://z"), None).unwrap();

        assert_eq!(seq(&lb, 6), ["a", "a", "b", "a", "b", "a"]);
        assert_eq!(lb.server_weight(&url("http://a")), Some(3));
        assert_eq!(lb.server_weight(&url("http://b")), Some(2));
        assert_eq!(lb.server_weight(&url("http://z")), Some(0));
        assert_eq!(lb.server_weight(&url("http://caramba:4000")), None);
    }

    #[test]
    fn test_remove_server_restarts_cycle() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();
        lb.upsert_server(&url("http://b"), None).unwrap();
        assert_eq!(seq(&lb, 3), ["a", "b", "a"]);

        lb.remove_server(&url("http://a")).unwrap();
        assert_eq!(seq(&lb, 3), ["b", "b", "b"]);
    }

    #[test]
    fn test_upsert_weight_restarts_cycle() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();
        lb.upsert_server(&url("http://b"), None).unwrap();
        assert_eq!(seq(&lb, 3), ["a", "b", "a"]);

        lb.upsert_server(&url("http://b"), Some(3)).unwrap();
        assert_eq!(seq(&lb, 4), ["b", "b", "a", "b"]);
    }

    #[test]
    fn test_mutation_matches_fresh_balancer() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), Some(2)).unwrap();
        lb.upsert_server(&url("http://b"), Some(5)).unwrap();
        seq(&lb, 4);
        lb.upsert_server(&url("http://c"), Some(3)).unwrap();

        let fresh = LoadBalancer::new(echo()).unwrap();
        fresh.upsert_server(&url("http://a"), Some(2)).unwrap();
        fresh.upsert_server(&url("http://b"), Some(5)).unwrap();
        fresh.upsert_server(&url("http://c"), Some(3)).unwrap();

        assert_eq!(seq(&lb, 10), seq(&fresh, 10));
    }

    #[test]
    fn test_remove_unknown_server() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();
        lb.upsert_server(&url("http://b"), None).unwrap();
        assert_eq!(seq(&lb, 1), ["a"]);

        let err = lb.remove_server(&url("http://google.com")).unwrap_err();
        assert!(matches!(err, LbError::ServerNotFound(_)));
        // The cursor was not reset by the failed removal.
        assert_eq!(seq(&lb, 2), ["b", "a"]);
    }

    #[test]
    fn test_negative_weights_rejected() {
        let lb = LoadBalancer::new(echo()).unwrap();
        assert_eq!(
            lb.upsert_server(&url("http://a"), Some(-1)),
            Err(LbError::InvalidWeight(-1))
        );
        assert!(lb.servers().is_empty());

        assert_eq!(lb.set_default_weight(-3), Err(LbError::InvalidWeight(-3)));
        assert_eq!(lb.default_weight(), 1);

        let err = LoadBalancer::builder(echo()).default_weight(-1).build().unwrap_err();
        assert!(matches!(err, LbError::Configuration(_)));
    }

    #[test]
    fn test_default_weight_is_not_retroactive() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();
        lb.set_default_weight(4).unwrap();
        lb.upsert_server(&url("http://b"), None).unwrap();

        assert_eq!(lb.server_weight(&url("http://a")), Some(1));
        assert_eq!(lb.server_weight(&url("http://b")), Some(4));
    }

    #[test]
    fn test_default_weight_is_per_instance() {
        let first = LoadBalancer::new(echo()).unwrap();
        let second = LoadBalancer::new(echo()).unwrap();
        first.set_default_weight(0).unwrap();

        assert_eq!(first.default_weight(), 0);
        assert_eq!(second.default_weight(), 1);
    }

    #[test]
    fn test_exhaustion() {
        let lb = LoadBalancer::new(echo()).unwrap();
        assert_eq!(lb.next_server(), Err(LbError::NoAvailableServers));

        lb.upsert_server(&url("http://a"), Some(0)).unwrap();
        lb.upsert_server(&url("http://b"), Some(0)).unwrap();
        for _ in 0..3 {
            assert_eq!(lb.next_server(), Err(LbError::NoAvailableServers));
        }
    }

    #[test]
    fn test_concurrent_picks_and_mutations() {
        let lb = LoadBalancer::new(echo()).unwrap();
        lb.upsert_server(&url("http://a"), Some(3)).unwrap();
        lb.upsert_server(&url("http://b"), Some(1)).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let picked = lb.next_server().unwrap();
                        assert_ne!(picked.host_str(), Some("z"));
                    }
                });
            }
            scope.spawn(|| {
                for i in 0..200 {
                    lb.upsert_server(&url("http://c"), Some(i % 4)).unwrap();
                    lb.upsert_server(&url("http://z"), Some(0)).unwrap();
                    lb.remove_server(&url("http://c")).unwrap();
                }
            });
        });

        assert_eq!(lb.servers(), vec![url("http://a"), url("http://b"), url("http://z")]);
    }

    /// Records, for every event, whether the pool lock was free when it was emitted.
    struct LockObserver {
        shared: Arc<Shared>,
        free: Arc<Mutex<Vec<bool>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LockObserver {
        fn on_event(
            &self,
            _event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let free = self.shared.state.try_lock().is_ok();
            self.free.lock().unwrap().push(free);
        }
    }

    #[test]
    fn test_lock_released_before_logging() {
        use tracing_subscriber::layer::SubscriberExt;

        let lb = LoadBalancer::new(echo()).unwrap();
        let free = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(LockObserver {
            shared: lb.shared.clone(),
            free: free.clone(),
        });

        tracing::subscriber::with_default(subscriber, || {
            lb.upsert_server(&url("http://a"), None).unwrap();
            lb.next_server().unwrap();
            lb.set_default_weight(2).unwrap();
            lb.remove_server(&url("http://a")).unwrap();
        });

        let free = free.lock().unwrap();
        assert_eq!(free.len(), 4);
        assert!(free.iter().all(|free| *free), "{free:?}");
    }

    #[tokio::test]
    async fn test_dispatch_rewrites_target() {
        let forwarder = service_fn(|request: Request<Body>| async move {
            Ok::<_, Infallible>(request.uri().to_string().into_response())
        });
        let lb = LoadBalancer::new(forwarder).unwrap();
        lb.upsert_server(&url("http://user:pw@backend:9000/ignored"), None).unwrap();

        let request = Request::builder()
            .uri("http://proxy.local/api/items?page=2")
            .body(Body::empty())
            .unwrap();
        let response = lb.clone().oneshot(request).await.unwrap();

        assert_eq!(body_string(response).await, "http://backend:9000/api/items?page=2");
    }

    #[tokio::test]
    async fn test_no_servers_uses_default_error_handler() {
        let lb = LoadBalancer::new(echo()).unwrap();
        let response = lb.dispatch(Request::new(Body::empty())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "no available servers");
    }

    #[tokio::test]
    async fn test_custom_error_handler() {
        let lb = LoadBalancer::builder(echo())
            .error_handler(|_: &Request<Body>, _: &LbError| {
                (StatusCode::IM_A_TEAPOT, "I'm a teapot").into_response()
            })
            .build()
            .unwrap();

        let response = lb.dispatch(Request::new(Body::empty())).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_rewrite_listener_sees_both_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let lb = LoadBalancer::builder(echo())
            .rewrite_listener(move |original, outgoing| {
                assert_eq!(original.uri(), "/path");
                assert_eq!(outgoing.uri(), "http://a/path");
                assert_eq!(outgoing.headers()["x-trace"], "1");
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        lb.upsert_server(&url("http://a"), None).unwrap();

        let request = Request::builder()
            .uri("/path")
            .header("x-trace", "1")
            .body(Body::empty())
            .unwrap();
        let response = lb.dispatch(request).await;

        assert_eq!(body_string(response).await, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rewrite_listener_not_called_without_servers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let lb = LoadBalancer::builder(echo())
            .rewrite_listener(move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        lb.dispatch(Request::new(Body::empty())).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
