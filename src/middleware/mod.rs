//! Ordered global filter chain.
//!
//! Every inbound request traverses the registered [`GlobalFilter`]s in
//! ascending [`GlobalFilter::order`] before reaching the router. Each filter
//! receives the [`Exchange`] and the remainder of the chain, and decides when
//! (and whether) to continue it.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::future::{BoxFuture, FutureExt};
use std::{fmt, future::Future, net::SocketAddr, sync::Arc};

use crate::error::FilterResult;

pub mod logging;

pub use logging::RequestLogFilter;

/// Runs before every other stage.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;
/// Runs after every other stage.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

pub trait GlobalFilter: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Lower values run earlier.
    fn order(&self) -> i32;

    fn filter<'a>(
        &'a self,
        exchange: Exchange,
        chain: GatewayFilterChain,
    ) -> BoxFuture<'a, FilterResult>;
}

/// Per-request context handed through the chain.
#[derive(Debug)]
pub struct Exchange {
    request: Request,
    remote_addr: Option<SocketAddr>,
}

impl Exchange {
    /// The remote address comes from the `ConnectInfo` extension, which is
    /// only present when serving with `into_make_service_with_connect_info`.
    pub fn new(request: Request) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            request,
            remote_addr,
        }
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}

/// Final stage once every filter has continued the chain.
pub type Terminal = Box<dyn FnOnce(Request) -> BoxFuture<'static, FilterResult> + Send>;

pub fn terminal<F, Fut>(handler: F) -> Terminal
where
    F: FnOnce(Request) -> Fut + Send + 'static,
    Fut: Future<Output = FilterResult> + Send + 'static,
{
    Box::new(move |request| handler(request).boxed())
}

/// Remainder of the chain from one filter's point of view.
pub struct GatewayFilterChain {
    filters: Arc<[Arc<dyn GlobalFilter>]>,
    index: usize,
    terminal: Terminal,
}

impl GatewayFilterChain {
    pub fn new(filters: Arc<[Arc<dyn GlobalFilter>]>, terminal: Terminal) -> Self {
        Self {
            filters,
            index: 0,
            terminal,
        }
    }

    /// Hands the exchange to the next filter, or to the terminal stage when
    /// none is left. Consumes the chain so it can only be continued once.
    pub fn filter(self, exchange: Exchange) -> BoxFuture<'static, FilterResult> {
        Box::pin(async move {
            let current = self.filters.get(self.index).cloned();
            match current {
                Some(current) => {
                    let rest = GatewayFilterChain {
                        filters: self.filters,
                        index: self.index + 1,
                        terminal: self.terminal,
                    };
                    current.filter(exchange, rest).await
                }
                None => (self.terminal)(exchange.into_request()).await,
            }
        })
    }
}

impl fmt::Debug for GatewayFilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayFilterChain")
            .field("remaining", &self.filters.len().saturating_sub(self.index))
            .finish()
    }
}

/// Registry of global filters, kept sorted by order. Filters with equal
/// order keep their registration order.
#[derive(Clone)]
pub struct GlobalFilters {
    filters: Arc<[Arc<dyn GlobalFilter>]>,
}

impl Default for GlobalFilters {
    fn default() -> Self {
        Self {
            filters: Arc::from(Vec::new()),
        }
    }
}

impl GlobalFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, filter: impl GlobalFilter) -> Self {
        let mut filters: Vec<Arc<dyn GlobalFilter>> = self.filters.iter().cloned().collect();
        filters.push(Arc::new(filter));
        filters.sort_by_key(|f| f.order());
        self.filters = filters.into();
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn chain(&self, terminal: Terminal) -> GatewayFilterChain {
        GatewayFilterChain::new(self.filters.clone(), terminal)
    }
}

/// Axum adapter running the registered filters in front of the router.
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn global_filter_middleware(
    State(filters): State<GlobalFilters>,
    request: Request,
    next: Next,
) -> Response {
    let downstream = terminal(move |request| async move { Ok(next.run(request).await) });

    match filters.chain(downstream).filter(Exchange::new(request)).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use axum::{body::Body, http::StatusCode};
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        order: i32,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl GlobalFilter for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn filter<'a>(
            &'a self,
            exchange: Exchange,
            chain: GatewayFilterChain,
        ) -> BoxFuture<'a, FilterResult> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(self.name);
                chain.filter(exchange).await
            })
        }
    }

    struct ShortCircuit;

    impl GlobalFilter for ShortCircuit {
        fn name(&self) -> &'static str {
            "short-circuit"
        }

        fn order(&self) -> i32 {
            0
        }

        fn filter<'a>(
            &'a self,
            _exchange: Exchange,
            _chain: GatewayFilterChain,
        ) -> BoxFuture<'a, FilterResult> {
            let blocked: FilterResult = Err(GatewayError::NoRoute("/blocked".into()));
            Box::pin(async move { blocked })
        }
    }

    fn ok_terminal(hits: Arc<Mutex<usize>>) -> Terminal {
        terminal(move |_request| async move {
            *hits.lock().unwrap() += 1;
            Ok(StatusCode::NO_CONTENT.into_response())
        })
    }

    fn recording(
        name: &'static str,
        order: i32,
        seen: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Recording {
        Recording {
            name,
            order,
            seen: seen.clone(),
        }
    }

    #[tokio::test]
    async fn runs_filters_in_ascending_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let filters = GlobalFilters::new()
            .register(recording("late", LOWEST_PRECEDENCE, &seen))
            .register(recording("early", HIGHEST_PRECEDENCE, &seen))
            .register(recording("middle", 0, &seen));

        assert_eq!(filters.names(), vec!["early", "middle", "late"]);

        let hits = Arc::new(Mutex::new(0));
        let request = Request::builder().uri("/a").body(Body::empty()).unwrap();
        let response = filters
            .chain(ok_terminal(hits.clone()))
            .filter(Exchange::new(request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(*seen.lock().unwrap(), vec!["early", "middle", "late"]);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn equal_orders_keep_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let filters = GlobalFilters::new()
            .register(recording("first", 10, &seen))
            .register(recording("second", 10, &seen))
            .register(recording("zero", 0, &seen));

        assert_eq!(filters.names(), vec!["zero", "first", "second"]);
        assert_eq!(filters.len(), 3);
    }

    #[tokio::test]
    async fn empty_chain_goes_straight_to_terminal() {
        let hits = Arc::new(Mutex::new(0));
        let filters = GlobalFilters::new();
        assert!(filters.is_empty());

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = filters
            .chain(ok_terminal(hits.clone()))
            .filter(Exchange::new(request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn filter_can_stop_the_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hits = Arc::new(Mutex::new(0));
        let filters = GlobalFilters::new()
            .register(ShortCircuit)
            .register(recording("after", 1, &seen));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let result = filters
            .chain(ok_terminal(hits.clone()))
            .filter(Exchange::new(request))
            .await;

        assert!(matches!(result, Err(GatewayError::NoRoute(_))));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn exchange_reads_connect_info() {
        let addr: SocketAddr = "10.0.0.5:41000".parse().unwrap();
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/api/products?page=2")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let exchange = Exchange::new(request);
        assert_eq!(exchange.path(), "/api/products");
        assert_eq!(exchange.method(), Method::POST);
        assert_eq!(exchange.remote_addr(), Some(addr));
        assert_eq!(exchange.request().uri().query(), Some("page=2"));
    }

    #[test]
    fn exchange_without_connect_info_has_no_address() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(Exchange::new(request).remote_addr(), None);
    }
}
