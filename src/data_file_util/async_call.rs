//! Submit-and-poll wrapper over a remote async job service.
//!
//! ```text
//!   submit ──▶ SUBMITTED ──sleep──▶ _check_job ──finished?──▶ FINISHED
//!                 │                     │   ▲        │ no
//!                 │                     │   └─sleep──┘
//!                 ▼                     ▼
//!               ERROR                 ERROR
//! ```
//!
//! No transition is retried. A failing `_check_job` ends the wait.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::error::RpcError;
use crate::rpc::{CallContext, RpcErrorObject, RpcTransport, first_result, flag};

/// A remote operation and the number of positional arguments it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub arity: usize,
}

impl Operation {
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }
}

/// Opaque job id returned by a `_<operation>_submit` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job record returned by `_check_job`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    #[serde(deserialize_with = "flag::deserialize")]
    pub finished: bool,
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Bounds on a wait. The default waits forever.
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Give up once this much time has passed since the wait began.
    pub deadline: Option<Duration>,
    /// Abort the wait when cancelled.
    pub cancel: CancellationToken,
}

impl WaitOptions {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
            ..Default::default()
        }
    }
}

/// Turns a synchronous-looking call into submit + poll against `service`.
#[derive(Clone)]
pub struct AsyncCallProxy {
    transport: Arc<dyn RpcTransport>,
    service: String,
    poll_interval: Duration,
}

impl std::fmt::Debug for AsyncCallProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCallProxy")
            .field("url", &self.transport.url())
            .field("service", &self.service)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl AsyncCallProxy {
    pub fn new(transport: Arc<dyn RpcTransport>, service: impl Into<String>) -> Self {
        Self {
            transport,
            service: service.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Submit `operation` and return its job handle.
    pub async fn submit(
        &self,
        operation: &Operation,
        params: Vec<Value>,
        ctx: &CallContext,
    ) -> Result<JobHandle, RpcError> {
        let method = format!("{}._{}_submit", self.service, operation.name);
        if params.len() != operation.arity {
            return Err(RpcError::ArgumentShape {
                method,
                expected: operation.arity,
                actual: params.len(),
            });
        }

        let results = self.transport.call(&method, params, ctx).await?;
        let id: String = first_result(&method, results)?;

        tracing::debug!(method = %method, job_id = %id, "Submitted async job");
        Ok(JobHandle(id))
    }

    /// Fetch the current status of a job.
    pub async fn check_job(
        &self,
        handle: &JobHandle,
        ctx: &CallContext,
    ) -> Result<JobStatus, RpcError> {
        let method = format!("{}._check_job", self.service);
        let results = self
            .transport
            .call(&method, vec![Value::String(handle.0.clone())], ctx)
            .await?;
        first_result(&method, results)
    }

    /// Poll until the job finishes, then return its result sequence.
    pub async fn await_job(
        &self,
        handle: &JobHandle,
        wait: &WaitOptions,
        ctx: &CallContext,
    ) -> Result<Vec<Value>, RpcError> {
        let started = Instant::now();
        let deadline_at = wait.deadline.map(|d| started + d);
        let mut checks = 0u32;

        loop {
            let wake_at = Instant::now() + self.poll_interval;
            let (sleep_until, expires) = match deadline_at {
                Some(dl) if wake_at > dl => (dl, true),
                _ => (wake_at, false),
            };

            tokio::select! {
                _ = wait.cancel.cancelled() => {
                    tracing::info!(job_id = %handle, checks, "Job wait cancelled");
                    return Err(RpcError::Cancelled { handle: handle.0.clone() });
                }
                _ = tokio::time::sleep_until(sleep_until) => {}
            }

            if expires {
                return Err(RpcError::DeadlineExceeded {
                    handle: handle.0.clone(),
                    waited: started.elapsed(),
                });
            }

            checks += 1;
            // The bounds also cover a check that is still in flight.
            let status = tokio::select! {
                _ = wait.cancel.cancelled() => {
                    tracing::info!(job_id = %handle, checks, "Job wait cancelled during check");
                    return Err(RpcError::Cancelled { handle: handle.0.clone() });
                }
                _ = sleep_until_deadline(deadline_at) => {
                    return Err(RpcError::DeadlineExceeded {
                        handle: handle.0.clone(),
                        waited: started.elapsed(),
                    });
                }
                status = self.check_job(handle, ctx) => status?,
            };
            if !status.finished {
                tracing::debug!(job_id = %handle, checks, "Job still running");
                continue;
            }

            tracing::debug!(job_id = %handle, checks, "Job finished");
            if let Some(error) = status.error {
                return Err(error.into());
            }
            return Ok(status.result.unwrap_or_default());
        }
    }

    /// Submit `operation` and wait for its result.
    pub async fn call(
        &self,
        operation: &Operation,
        params: Vec<Value>,
        wait: &WaitOptions,
        ctx: &CallContext,
    ) -> Result<Vec<Value>, RpcError> {
        let handle = self.submit(operation, params, ctx).await?;
        self.await_job(&handle, wait, ctx).await
    }
}

async fn sleep_until_deadline(deadline_at: Option<Instant>) {
    match deadline_at {
        Some(dl) => tokio::time::sleep_until(dl).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    /// Transport that replays canned responses and records every call.
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Vec<Value>, RpcError>>>,
        pub(crate) calls: Mutex<Vec<(String, Vec<Value>, Instant)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: Vec<Result<Vec<Value>, RpcError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn methods(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(m, _, _)| m.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn call(
            &self,
            method: &str,
            params: Vec<Value>,
            _ctx: &CallContext,
        ) -> Result<Vec<Value>, RpcError> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params, Instant::now()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![json!({"finished": 0})]))
        }

        fn url(&self) -> &str {
            "http://scripted"
        }
    }

    const SHOCK_TO_FILE: Operation = Operation::new("shock_to_file", 1);

    fn proxy(transport: Arc<ScriptedTransport>) -> AsyncCallProxy {
        AsyncCallProxy::new(transport, "DataFileUtil")
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_then_two_checks() {
        let transport = ScriptedTransport::new(vec![
            Ok(vec![json!("job-42")]),
            Ok(vec![json!({"finished": 0})]),
            Ok(vec![json!({"finished": 1, "result": ["workspace1/obj1/3"]})]),
        ]);
        let started = Instant::now();

        let result = proxy(transport.clone())
            .call(
                &SHOCK_TO_FILE,
                vec![json!({"shock_id": "abc"})],
                &WaitOptions::default(),
                &CallContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(result, vec![json!("workspace1/obj1/3")]);
        assert_eq!(
            transport.methods(),
            vec![
                "DataFileUtil._shock_to_file_submit",
                "DataFileUtil._check_job",
                "DataFileUtil._check_job",
            ]
        );

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[1].1, vec![json!("job-42")]);
        // Each check is preceded by one full interval of sleep.
        assert_eq!(calls[1].2 - started, Duration::from_millis(5000));
        assert_eq!(calls[2].2 - started, Duration::from_millis(10000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_result_is_empty_sequence() {
        let transport = ScriptedTransport::new(vec![
            Ok(vec![json!("job-1")]),
            Ok(vec![json!({"finished": true})]),
        ]);

        let result = proxy(transport)
            .call(
                &SHOCK_TO_FILE,
                vec![json!({})],
                &WaitOptions::default(),
                &CallContext::default(),
            )
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_poll_interval() {
        let transport = ScriptedTransport::new(vec![Ok(vec![json!({"finished": 1, "result": []})])]);
        let started = Instant::now();

        proxy(transport.clone())
            .with_poll_interval(Duration::from_millis(250))
            .await_job(
                &JobHandle::new("job-7"),
                &WaitOptions::default(),
                &CallContext::default(),
            )
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2 - started, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_wrong_arity_rejected_before_any_call() {
        let transport = ScriptedTransport::new(vec![]);
        let err = proxy(transport.clone())
            .submit(&SHOCK_TO_FILE, vec![], &CallContext::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RpcError::ArgumentShape { expected: 1, actual: 0, .. }
        ));
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn test_submit_remote_error() {
        let transport = ScriptedTransport::new(vec![Err(RpcError::Remote {
            name: "JSONRPCError".to_string(),
            code: -32500,
            message: "no such node".to_string(),
            data: None,
        })]);

        let err = proxy(transport.clone())
            .call(
                &SHOCK_TO_FILE,
                vec![json!({})],
                &WaitOptions::default(),
                &CallContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Remote { code: -32500, .. }));
        assert_eq!(transport.methods().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![
            Ok(vec![json!("job-9")]),
            Ok(vec![json!({"finished": 0})]),
            Err(RpcError::Transport {
                url: "http://scripted".to_string(),
                reason: "connection reset".to_string(),
            }),
            Ok(vec![json!({"finished": 1})]),
        ]);

        let err = proxy(transport.clone())
            .call(
                &SHOCK_TO_FILE,
                vec![json!({})],
                &WaitOptions::default(),
                &CallContext::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Transport { .. }));
        assert_eq!(transport.methods().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_job_with_error() {
        let transport = ScriptedTransport::new(vec![Ok(vec![json!({
            "finished": 1,
            "error": {"name": "JSONRPCError", "code": -32000, "message": "file not found"}
        })])]);

        let err = proxy(transport)
            .await_job(
                &JobHandle::new("job-3"),
                &WaitOptions::default(),
                &CallContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Remote { ref message, .. } if message == "file not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_the_wait() {
        // Never finishes: the scripted transport reports unfinished forever.
        let transport = ScriptedTransport::new(vec![]);
        let started = Instant::now();

        let err = proxy(transport.clone())
            .await_job(
                &JobHandle::new("job-slow"),
                &WaitOptions::with_deadline(Duration::from_millis(12_000)),
                &CallContext::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::DeadlineExceeded { .. }));
        assert_eq!(transport.methods().len(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(12_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_the_wait() {
        let transport = ScriptedTransport::new(vec![]);
        let wait = WaitOptions::default();
        let cancel = wait.cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(7_000)).await;
            cancel.cancel();
        });

        let err = proxy(transport.clone())
            .await_job(&JobHandle::new("job-c"), &wait, &CallContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Cancelled { .. }));
        assert_eq!(transport.methods().len(), 1);
    }

    /// Transport whose calls never complete.
    struct HangingTransport;

    #[async_trait]
    impl RpcTransport for HangingTransport {
        async fn call(
            &self,
            _method: &str,
            _params: Vec<Value>,
            _ctx: &CallContext,
        ) -> Result<Vec<Value>, RpcError> {
            std::future::pending().await
        }

        fn url(&self) -> &str {
            "http://hanging"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_covers_hung_check() {
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            AsyncCallProxy::new(Arc::new(HangingTransport), "DataFileUtil").await_job(
                &JobHandle::new("job-hung"),
                &WaitOptions::with_deadline(Duration::from_secs(6)),
                &CallContext::default(),
            ),
        )
        .await
        .expect("wait ignored its deadline");

        assert!(matches!(outcome, Err(RpcError::DeadlineExceeded { .. })));
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_covers_hung_check() {
        let wait = WaitOptions::default();
        let cancel = wait.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            cancel.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            AsyncCallProxy::new(Arc::new(HangingTransport), "DataFileUtil").await_job(
                &JobHandle::new("job-hung"),
                &wait,
                &CallContext::default(),
            ),
        )
        .await
        .expect("wait ignored cancellation");

        assert!(matches!(outcome, Err(RpcError::Cancelled { .. })));
    }
}
