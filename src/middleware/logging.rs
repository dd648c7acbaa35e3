use futures::future::BoxFuture;
use std::sync::Arc;

use super::{Exchange, GatewayFilterChain, GlobalFilter, HIGHEST_PRECEDENCE};
use crate::{
    config::RequestLogConfig,
    error::FilterResult,
    telemetry::{LogSink, SinkError},
};

/// Shortly after the highest precedence, leaving room for filters that must
/// see the request before it is logged.
pub const DEFAULT_REQUEST_LOG_ORDER: i32 = HIGHEST_PRECEDENCE + 100;

/// Logs path, remote address and method of every request, then a completion
/// line once the rest of the chain has finished.
///
/// The filter never touches the exchange or the response. Sink failures are
/// not swallowed: on the way in they abort the chain, on the way out they
/// are reported only if the downstream result was a success.
pub struct RequestLogFilter {
    sink: Arc<dyn LogSink>,
    order: i32,
}

impl RequestLogFilter {
    pub fn new(sink: Arc<dyn LogSink>, order: i32) -> Self {
        Self { sink, order }
    }

    pub fn from_config(config: &RequestLogConfig, sink: Arc<dyn LogSink>) -> Self {
        Self::new(sink, config.order)
    }

    fn log_request(&self, exchange: &Exchange) -> Result<(), SinkError> {
        let address = exchange
            .remote_addr()
            .map_or_else(|| "unknown".to_string(), |addr| addr.to_string());

        self.sink.info(&format!("Request Path: {}", exchange.path()))?;
        self.sink.info(&format!("Request Address: {}", address))?;
        self.sink
            .info(&format!("Request Method: {}", exchange.method()))
    }
}

impl GlobalFilter for RequestLogFilter {
    fn name(&self) -> &'static str {
        "request-log"
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
            let path = exchange.path().to_owned();
            if let Err(e) = self.log_request(&exchange) {
                return Err(e.into());
            }

            let outcome = chain.filter(exchange).await;
            let completed = self
                .sink
                .info(&format!("Response completed for request: {}", path));

            match (outcome, completed) {
                (Err(e), _) => Err(e),
                (Ok(_), Err(e)) => Err(e.into()),
                (Ok(response), Ok(())) => Ok(response),
            }
        })
    }
}
