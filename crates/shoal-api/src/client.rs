// Async REST client for one cluster management endpoint.
//
// Base path: /api/
// Auth: HTTP basic, credentials from the connection profile.
//
// Responses follow the record-envelope convention: collection endpoints
// return `{"num_records": N, "records": [...]}`, singleton endpoints
// return a bare object, and mutating calls may return an async job
// reference which this client waits on before reporting success.

use std::time::{Duration, Instant};

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{OnceCell, Semaphore};
use tracing::debug;
use url::Url;

use crate::error::{self, Error};
use crate::transport::TransportConfig;
use crate::version::ClusterVersion;

/// Terminal/transient job states, per the cluster jobs API.
const JOB_RUNNING_STATES: &[&str] = &["queued", "running", "paused"];

/// Retries for transient failures while polling a job.
const JOB_POLL_ERROR_RETRIES: u32 = 3;

pub type Record = serde_json::Map<String, Value>;

// ── Options ──────────────────────────────────────────────────────────

/// Tunables that are per-client rather than per-profile.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum in-flight requests against this cluster.
    pub max_concurrent_requests: usize,
    /// Interval between async job status polls.
    pub job_poll_interval: Duration,
    /// Overall deadline for an async job to reach a terminal state.
    pub job_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 6,
            job_poll_interval: Duration::from_secs(10),
            job_timeout: Duration::from_secs(600),
        }
    }
}

// ── Query ────────────────────────────────────────────────────────────

/// Query string builder with a `fields` convenience for field selection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key/value pair, replacing any previous value for the key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_owned(), value.into()));
        self
    }

    /// Request a specific set of response fields (`?fields=a,b,c`).
    pub fn fields(&mut self, fields: &[&str]) -> &mut Self {
        self.set("fields", fields.join(","))
    }

    fn as_pairs(&self) -> &[(String, String)] {
        &self.params
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client bound to one cluster management endpoint.
#[derive(Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    slots: Semaphore,
    options: ClientOptions,
    pub(crate) version_cache: OnceCell<ClusterVersion>,
}

impl RestClient {
    /// Build a client for `hostname` with basic-auth credentials.
    ///
    /// `hostname` may be a bare host (`cluster4.example.com`) or a full
    /// URL; the `/api/` base path is appended either way.
    pub fn new(
        hostname: &str,
        username: &str,
        password: SecretString,
        transport: &TransportConfig,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let base_url = Self::normalize_base_url(hostname)?;
        let slots = Semaphore::new(options.max_concurrent_requests.max(1));

        Ok(Self {
            http,
            base_url,
            username: username.to_owned(),
            password,
            slots,
            options,
            version_cache: OnceCell::new(),
        })
    }

    /// Build the base URL ending in `/api/`.
    fn normalize_base_url(hostname: &str) -> Result<Url, Error> {
        let raw = if hostname.contains("://") {
            hostname.to_owned()
        } else {
            format!("https://{hostname}")
        };
        let mut url = Url::parse(&raw)?;

        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }
        Ok(url)
    }

    /// Join a relative path (e.g. `"storage/volumes"`) onto the base URL.
    fn url(&self, path: &str) -> Url {
        // base_url always ends with `/api/`, so joining relative paths works.
        self.base_url
            .join(path.trim_start_matches('/'))
            .expect("path should be a valid relative URL")
    }

    // ── Request dispatch ─────────────────────────────────────────────

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: Option<&Query>,
        body: Option<&Value>,
    ) -> Result<(u16, String), Error> {
        let _permit = self
            .slots
            .acquire()
            .await
            .expect("request-slot semaphore is never closed");

        let url = self.url(path);
        debug!("{method} {url}");

        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(self.password.expose_secret()));
        if let Some(query) = query {
            request = request.query(query.as_pairs());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, Error> {
        serde_json::from_str(body).map_err(|e| {
            let preview = &body[..body.len().min(200)];
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.to_owned(),
            }
        })
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// GET a collection endpoint, expecting zero or one matching record.
    ///
    /// Two or more matches is an error: natural-key queries must be
    /// unambiguous.
    pub async fn get_record(&self, path: &str, query: &Query) -> Result<Option<Record>, Error> {
        let (status, body) = self.dispatch(Method::GET, path, Some(query), None).await?;
        if !(200..300).contains(&status) {
            return Err(error::translate(status, &body));
        }

        let envelope: Envelope = Self::parse(&body)?;
        let mut records = envelope.records.unwrap_or_default();
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(Error::TooManyRecords { count }),
        }
    }

    /// GET a collection endpoint, returning all matching records.
    pub async fn get_records(&self, path: &str, query: &Query) -> Result<Vec<Record>, Error> {
        let (status, body) = self.dispatch(Method::GET, path, Some(query), None).await?;
        if !(200..300).contains(&status) {
            return Err(error::translate(status, &body));
        }

        let envelope: Envelope = Self::parse(&body)?;
        Ok(envelope.records.unwrap_or_default())
    }

    /// GET a singleton endpoint (e.g. `cluster`) that returns a bare object.
    pub async fn get_object(&self, path: &str, query: &Query) -> Result<Record, Error> {
        let (status, body) = self.dispatch(Method::GET, path, Some(query), None).await?;
        if !(200..300).contains(&status) {
            return Err(error::translate(status, &body));
        }
        Self::parse(&body)
    }

    // ── Mutations ────────────────────────────────────────────────────

    fn mutating_query() -> Query {
        let mut query = Query::new();
        query.set("return_timeout", "60");
        query
    }

    /// POST a create request; waits on any returned async job.
    ///
    /// Returns the created record when the cluster inlines one in the
    /// response; job-backed creates return `None` and the caller
    /// re-reads by natural key.
    pub async fn create(&self, path: &str, body: &Value) -> Result<Option<Record>, Error> {
        let query = Self::mutating_query();
        let (status, text) = self
            .dispatch(Method::POST, path, Some(&query), Some(body))
            .await?;
        if !(200..300).contains(&status) {
            return Err(error::translate(status, &text));
        }

        let envelope: Envelope = Self::parse(&text)?;
        self.wait_on_envelope_jobs(&envelope).await?;
        Ok(envelope.records.unwrap_or_default().into_iter().next())
    }

    /// PATCH a partial update; waits on any returned async job.
    pub async fn update(&self, path: &str, body: &Value) -> Result<(), Error> {
        let query = Self::mutating_query();
        let (status, text) = self
            .dispatch(Method::PATCH, path, Some(&query), Some(body))
            .await?;
        if !(200..300).contains(&status) {
            return Err(error::translate(status, &text));
        }

        let envelope: Envelope = Self::parse(&text)?;
        self.wait_on_envelope_jobs(&envelope).await
    }

    /// DELETE by path; waits on any returned async job.
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        let query = Self::mutating_query();
        let (status, text) = self
            .dispatch(Method::DELETE, path, Some(&query), None)
            .await?;
        if !(200..300).contains(&status) {
            return Err(error::translate(status, &text));
        }

        // DELETE bodies may be empty; only job envelopes matter.
        if text.trim().is_empty() {
            return Ok(());
        }
        let envelope: Envelope = Self::parse(&text)?;
        self.wait_on_envelope_jobs(&envelope).await
    }

    // ── Async jobs ───────────────────────────────────────────────────

    async fn wait_on_envelope_jobs(&self, envelope: &Envelope) -> Result<(), Error> {
        if let Some(job) = &envelope.job {
            self.wait_on_job(&job.uuid).await?;
        }
        if let Some(jobs) = &envelope.jobs {
            for job in jobs {
                self.wait_on_job(&job.uuid).await?;
            }
        }
        Ok(())
    }

    /// Poll `cluster/jobs/{uuid}` until the job reaches a terminal state.
    ///
    /// Failed jobs are translated through the same numeric-code taxonomy
    /// as synchronous error bodies.
    pub async fn wait_on_job(&self, uuid: &str) -> Result<(), Error> {
        let deadline = Instant::now() + self.options.job_timeout;
        let mut error_retries = JOB_POLL_ERROR_RETRIES;
        let path = format!("cluster/jobs/{uuid}");

        loop {
            match self.get_object(&path, &Query::new()).await {
                Err(e) => {
                    if error_retries == 0 {
                        return Err(e);
                    }
                    error_retries -= 1;
                }
                Ok(record) => {
                    let job: Job = serde_json::from_value(Value::Object(record)).map_err(|e| {
                        Error::Deserialization {
                            message: format!("job {uuid}: {e}"),
                            body: String::new(),
                        }
                    })?;

                    if job.state == "success" {
                        return Ok(());
                    }
                    if !JOB_RUNNING_STATES.contains(&job.state.as_str()) {
                        let message = job
                            .error
                            .as_ref()
                            .and_then(|e| e.message.clone())
                            .or(job.message)
                            .unwrap_or_else(|| format!("job ended in state {:?}", job.state));
                        let code = job
                            .error
                            .as_ref()
                            .and_then(|e| e.code.as_ref())
                            .and_then(job_code)
                            .or(job.code);
                        return Err(error::translate_job(code, &message));
                    }
                }
            }

            if Instant::now() + self.options.job_poll_interval > deadline {
                return Err(Error::JobTimeout {
                    uuid: uuid.to_owned(),
                    timeout_secs: self.options.job_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.options.job_poll_interval).await;
        }
    }
}

// ── Response envelope ────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    records: Option<Vec<Record>>,
    #[serde(default)]
    job: Option<JobRef>,
    #[serde(default)]
    jobs: Option<Vec<JobRef>>,
}

#[derive(Deserialize)]
struct JobRef {
    uuid: String,
}

#[derive(Deserialize)]
struct Job {
    state: String,
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<JobErrorBody>,
}

#[derive(Deserialize)]
struct JobErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Job error codes appear as strings or numbers depending on release.
fn job_code(code: &Value) -> Option<u64> {
    match code {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
