use std::sync::Arc;
use std::time::{Duration, Instant};

use authload_core::{RequestSample, RunContext};
use authload_http::{HttpClient, HttpRequest, HttpResponse};

use crate::classify::ResponseClassifier;
use crate::config::AuthConfig;
use crate::request::{EndpointKind, RequestBuilder};

/// Result of one timed call.
#[derive(Debug)]
pub struct CallOutcome {
    pub response: authload_http::Result<HttpResponse>,
    pub duration: Duration,
}

impl CallOutcome {
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().ok().map(|r| r.status)
    }

    /// Status and a body prefix, or the transport error, for log lines.
    pub fn describe(&self, max_body: usize) -> String {
        match &self.response {
            Ok(res) if res.body.is_empty() => format!("status={} body=(no body)", res.status),
            Ok(res) => format!("status={} body={}", res.status, res.body_prefix(max_body)),
            Err(err) => format!("transport error ({}): {err}", err.transport_error_kind()),
        }
    }
}

/// The auth API as seen by workers and the setup phase: builds, sends and times calls
/// and records the built-in request series for each.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: HttpClient,
    pub(crate) requests: RequestBuilder,
    pub(crate) classifier: ResponseClassifier,
    pub(crate) run_ctx: Arc<RunContext>,
}

impl AuthApi {
    pub fn new(cfg: &AuthConfig, client: HttpClient, run_ctx: Arc<RunContext>) -> Self {
        Self {
            client,
            requests: RequestBuilder::new(cfg),
            classifier: ResponseClassifier {
                strict: cfg.strict_result_code,
                debug: cfg.debug,
            },
            run_ctx,
        }
    }

    pub fn run_ctx(&self) -> &Arc<RunContext> {
        &self.run_ctx
    }

    pub async fn call(
        &self,
        scenario: &str,
        endpoint: EndpointKind,
        req: HttpRequest,
    ) -> CallOutcome {
        let started = Instant::now();
        let response = self.client.request(req).await;
        let duration = started.elapsed();

        let outcome = CallOutcome { response, duration };
        self.run_ctx.request_metrics.record_request(
            &self.run_ctx.metrics,
            RequestSample {
                scenario,
                endpoint: endpoint.as_ref(),
                status: outcome.status(),
                duration,
            },
            &[],
        );
        outcome
    }

    /// Classifier verdict; transport errors are never accepted.
    pub fn accepts(&self, outcome: &CallOutcome, expected: &str) -> bool {
        outcome
            .response
            .as_ref()
            .is_ok_and(|res| self.classifier.accepts(res, expected))
    }
}
