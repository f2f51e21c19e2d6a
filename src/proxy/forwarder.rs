//! Resilient proxy forwarding to external genomic APIs.
//!
//! Every outbound call walks the same states: validate the destination
//! against the family's host allow-list, look the request up in the cache,
//! then forward with a bounded retry loop. 429s wait the server-supplied
//! delay (else `attempt * 2` seconds), 5xx and transport failures back off
//! linearly, other 4xx are surfaced immediately. Only successful responses
//! populate the cache.

use crate::cache::{CacheKey, CacheStore, Category};
use crate::config::GatewayConfig;
use crate::proxy::ProxyOutcome;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;
use uuid::Uuid;

const USER_AGENT: &str = "Evo2-Variant-Analysis/1.0";

const NCBI_ALLOWED_HOSTS: [&str; 2] = ["eutils.ncbi.nlm.nih.gov", "clinicaltables.nlm.nih.gov"];
const UCSC_ALLOWED_HOSTS: [&str; 1] = ["api.genome.ucsc.edu"];

/// Injectable delay between retry attempts, so tests run without wall-clock
/// waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<T: Sleeper + ?Sized> Sleeper for Arc<T> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Default sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// The upstream services the gateway is allowed to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFamily {
    /// Gene reference and clinical-variant service.
    Ncbi,
    /// Genome assembly and sequence service.
    Ucsc,
    /// Variant-analysis inference service (scarce GPU resource).
    Inference,
}

impl UpstreamFamily {
    fn label(&self) -> &'static str {
        match self {
            UpstreamFamily::Ncbi => "NCBI",
            UpstreamFamily::Ucsc => "UCSC",
            UpstreamFamily::Inference => "Modal",
        }
    }

    fn category(&self) -> Category {
        match self {
            UpstreamFamily::Ncbi => Category::NcbiProxy,
            UpstreamFamily::Ucsc => Category::UcscProxy,
            UpstreamFamily::Inference => Category::VariantAnalysis,
        }
    }
}

/// Forwarding configuration, derived from [`GatewayConfig`].
///
/// Allow-lists default to the production hosts; tests point them at a local
/// mock server.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub max_attempts: u32,
    pub http_timeout: Duration,
    pub ucsc_timeout: Duration,
    pub ncbi_hosts: Vec<String>,
    pub ucsc_hosts: Vec<String>,
    pub inference_base_url: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            http_timeout: Duration::from_secs(30),
            ucsc_timeout: Duration::from_secs(15),
            ncbi_hosts: NCBI_ALLOWED_HOSTS.iter().map(|s| s.to_string()).collect(),
            ucsc_hosts: UCSC_ALLOWED_HOSTS.iter().map(|s| s.to_string()).collect(),
            inference_base_url: None,
        }
    }
}

impl ProxyConfig {
    pub fn from_gateway(cfg: &GatewayConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            http_timeout: cfg.http_timeout,
            ucsc_timeout: cfg.ucsc_timeout,
            inference_base_url: cfg.inference_base_url.clone(),
            ..Self::default()
        }
    }

    pub fn with_ncbi_hosts(mut self, hosts: Vec<String>) -> Self {
        self.ncbi_hosts = hosts;
        self
    }

    pub fn with_ucsc_hosts(mut self, hosts: Vec<String>) -> Self {
        self.ucsc_hosts = hosts;
        self
    }

    pub fn with_inference_base_url(mut self, url: impl Into<String>) -> Self {
        self.inference_base_url = Some(url.into());
        self
    }
}

/// Identifying parameters of a variant-analysis request.
///
/// Callers normalize chromosome naming and strand before building the
/// request; the cache key is exactly these values in a fixed order.
#[derive(Debug, Clone, Serialize)]
pub struct VariantRequest {
    pub variant_pos: i64,
    pub alternative: String,
    pub genome: String,
    pub chromosome: String,
    /// Defaults to the plus strand when unset.
    pub strand: Option<String>,
}

impl VariantRequest {
    pub fn strand(&self) -> &str {
        self.strand.as_deref().unwrap_or("+")
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::build(
            Category::VariantAnalysis,
            [
                self.chromosome.clone(),
                self.variant_pos.to_string(),
                self.alternative.clone(),
                self.genome.clone(),
                self.strand().to_string(),
            ],
        )
    }
}

pub struct ProxyForwarder {
    client: reqwest::Client,
    cache: Arc<CacheStore>,
    cfg: ProxyConfig,
    sleeper: Box<dyn Sleeper>,
}

impl ProxyForwarder {
    pub fn new(cache: Arc<CacheStore>, cfg: ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(cfg.http_timeout)
            .build()?;
        Ok(Self {
            client,
            cache,
            cfg,
            sleeper: Box::new(TokioSleeper),
        })
    }

    /// Substitute the delay function. Tests use this to record backoff
    /// schedules instead of sleeping through them.
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Forward a request to the gene-reference/clinical-variant service.
    pub async fn forward_ncbi(&self, endpoint: &str) -> Result<ProxyOutcome> {
        let url = self.validate(&self.cfg.ncbi_hosts, endpoint)?;
        let key = CacheKey::build(Category::NcbiProxy, [endpoint]);
        self.forward(UpstreamFamily::Ncbi, reqwest::Method::GET, url, &key, self.cfg.http_timeout)
            .await
    }

    /// Forward a request to the genome-assembly/sequence service.
    pub async fn forward_ucsc(&self, endpoint: &str) -> Result<ProxyOutcome> {
        let url = self.validate(&self.cfg.ucsc_hosts, endpoint)?;
        let key = CacheKey::build(Category::UcscProxy, [endpoint]);
        self.forward(UpstreamFamily::Ucsc, reqwest::Method::GET, url, &key, self.cfg.ucsc_timeout)
            .await
    }

    /// Forward a variant-analysis request to the inference service.
    ///
    /// Rate-limiter gating happens in the gateway before this is called.
    pub async fn forward_variant_analysis(&self, request: &VariantRequest) -> Result<ProxyOutcome> {
        let base = self
            .cfg
            .inference_base_url
            .as_deref()
            .ok_or_else(|| Error::configuration("inference endpoint not configured"))?;
        let mut url = Url::parse(base)
            .map_err(|e| Error::configuration(format!("invalid inference base URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "unsupported inference URL scheme: {}",
                url.scheme()
            )));
        }
        // The inference API takes its parameters as query parameters on a
        // POST with an empty body.
        url.query_pairs_mut()
            .append_pair("variant_pos", &request.variant_pos.to_string())
            .append_pair("alternative", &request.alternative)
            .append_pair("genome", &request.genome)
            .append_pair("chromosome", &request.chromosome)
            .append_pair("strand", request.strand());

        let key = request.cache_key();
        self.forward(UpstreamFamily::Inference, reqwest::Method::POST, url, &key, self.cfg.http_timeout)
            .await
    }

    /// Destination allow-list check. Fails closed before any network call is
    /// made (SSRF defense). Callers pick the family's allow-list; the
    /// inference destination never comes through here because it is built
    /// from configuration, not from caller input.
    fn validate(&self, allowed: &[String], endpoint: &str) -> Result<Url> {
        let url = Url::parse(endpoint)
            .map_err(|_| Error::validation(format!("invalid endpoint URL: {endpoint}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "unsupported scheme in endpoint: {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| Error::validation("missing host in endpoint".to_string()))?;
        if !allowed.iter().any(|h| h == host) {
            return Err(Error::validation(format!("invalid host in endpoint: {host}")));
        }
        Ok(url)
    }

    /// Cache lookup, then forward with a bounded retry loop.
    async fn forward(
        &self,
        family: UpstreamFamily,
        method: reqwest::Method,
        url: Url,
        key: &CacheKey,
        timeout: Duration,
    ) -> Result<ProxyOutcome> {
        let category = family.category();

        if let Some(document) = self.cache.get(key.as_str()).await {
            tracing::info!(upstream = family.label(), key = %key, "cache hit");
            return Ok(ProxyOutcome::Success { document, category });
        }

        let request_id = Uuid::new_v4();
        let mut last_cause = String::from("unknown error");
        let mut network_failure = false;

        for attempt in 1..=self.cfg.max_attempts {
            let started = Instant::now();
            let result = self
                .client
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .header(header::ACCEPT, "application/json")
                .send()
                .await;

            let delay = match result {
                Ok(resp) if resp.status().as_u16() == 429 => {
                    let delay = retry_after(&resp)
                        .unwrap_or_else(|| Duration::from_secs(u64::from(attempt) * 2));
                    last_cause = format!("{} rate limit hit", family.label());
                    network_failure = false;
                    tracing::warn!(
                        upstream = family.label(),
                        request_id = %request_id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "upstream rate limited, backing off"
                    );
                    delay
                }
                Ok(resp) if resp.status().is_client_error() => {
                    let status = resp.status();
                    let details = resp.text().await.unwrap_or_default();
                    tracing::info!(
                        upstream = family.label(),
                        request_id = %request_id,
                        http_status = status.as_u16(),
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "upstream client error, not retrying"
                    );
                    return Ok(ProxyOutcome::ClientError {
                        status: status.as_u16(),
                        message: format!("{} API Client Error: {}", family.label(), status),
                        details,
                    });
                }
                Ok(resp) if resp.status().is_success() => match read_document(resp).await {
                    Ok(document) => {
                        self.cache.set(key.as_str(), &document, category.ttl()).await;
                        tracing::info!(
                            upstream = family.label(),
                            request_id = %request_id,
                            key = %key,
                            attempt,
                            duration_ms = started.elapsed().as_millis() as u64,
                            "cached upstream response"
                        );
                        return Ok(ProxyOutcome::Success { document, category });
                    }
                    Err(cause) => {
                        // Truncated or malformed body on a 2xx; treat it like
                        // a transport failure and retry.
                        last_cause = cause;
                        network_failure = true;
                        Duration::from_secs(u64::from(attempt))
                    }
                },
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    last_cause =
                        format!("{} API Server Error: {} - {}", family.label(), status, body);
                    network_failure = false;
                    tracing::warn!(
                        upstream = family.label(),
                        request_id = %request_id,
                        http_status = status.as_u16(),
                        attempt,
                        "upstream server error"
                    );
                    Duration::from_secs(u64::from(attempt))
                }
                Err(e) => {
                    last_cause = e.to_string();
                    network_failure = true;
                    tracing::warn!(
                        upstream = family.label(),
                        request_id = %request_id,
                        attempt,
                        error = %e,
                        "upstream request failed"
                    );
                    Duration::from_secs(u64::from(attempt))
                }
            };

            if attempt < self.cfg.max_attempts {
                self.sleeper.sleep(delay).await;
            }
        }

        tracing::warn!(
            upstream = family.label(),
            request_id = %request_id,
            cause = %last_cause,
            "retry budget exhausted"
        );
        Ok(ProxyOutcome::ServerError {
            // Transport-level failure means the upstream was never reached.
            status: if network_failure { 502 } else { 500 },
            message: "Internal server error after multiple retries".to_string(),
            details: last_cause,
        })
    }
}

/// Server-supplied retry delay, in whole seconds.
fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Parse the body as JSON when the content-type says so, else keep it as raw
/// text.
async fn read_document(resp: reqwest::Response) -> std::result::Result<Value, String> {
    let is_json = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);
    let text = resp
        .text()
        .await
        .map_err(|e| format!("failed to read upstream body: {e}"))?;
    if is_json {
        serde_json::from_str(&text).map_err(|e| format!("malformed JSON from upstream: {e}"))
    } else {
        Ok(Value::String(text))
    }
}
