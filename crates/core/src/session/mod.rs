pub mod replay;

use crate::config::Settings;
use crate::decode::{
    collect_response, DecodeContext, IntradayBarAccumulator, ResponseAccumulator,
    SnapshotAccumulator, TimeSeriesAccumulator,
};
use crate::domain::{
    IntradayBarResult, IntradayBarSpec, RequestSpec, SnapshotResult, TimeCoercion,
    TimeSeriesResult,
};
use crate::error::{RefDataError, Result};
use crate::wire::{CorrelationId, EventBatch, Request};
use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8194;
pub const REFDATA_SERVICE: &str = "//blp/refdata";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection to a market-data server, as provided by the vendor SDK.
///
/// Implementations report failures with plain `anyhow` errors; [`Session`]
/// decides which [`RefDataError`] they become.
#[async_trait::async_trait]
pub trait SessionGateway: Send {
    fn name(&self) -> &'static str;

    async fn start(&mut self, options: &SessionOptions) -> anyhow::Result<()>;

    async fn open_service(&mut self, service: &str) -> anyhow::Result<()>;

    async fn send_request(
        &mut self,
        request: &Request,
        correlation_id: CorrelationId,
    ) -> anyhow::Result<()>;

    /// Waits for the next event batch from the server.
    async fn next_event(&mut self) -> anyhow::Result<EventBatch>;

    async fn stop(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub server_host: String,
    pub server_port: u16,
    pub service: String,
    /// Upper bound on the wait for one request's terminal response.
    pub request_timeout: Duration,
    pub time_coercion: TimeCoercion,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_HOST.to_string(),
            server_port: DEFAULT_PORT,
            service: REFDATA_SERVICE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            time_coercion: TimeCoercion::default(),
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server_host: settings.host.clone(),
            server_port: settings.port,
            service: settings.service.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            time_coercion: settings.time_coercion,
        }
    }
}

/// An explicitly opened session with at most one outstanding request.
///
/// Requests take `&mut self`, so a second request waits until the first one
/// has seen its terminal response (or failed).
pub struct Session<G> {
    gateway: G,
    options: SessionOptions,
    open: bool,
    cancel: CancellationToken,
}

impl<G: SessionGateway> Session<G> {
    pub fn new(gateway: G, options: SessionOptions) -> Self {
        Self {
            gateway,
            options,
            open: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Token that aborts the outstanding request with [`RefDataError::Cancelled`].
    /// After a cancellation the session issues a fresh token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts the session and opens the configured service. A no-op when
    /// already open.
    pub async fn open(&mut self) -> Result<()> {
        if self.open {
            tracing::debug!(gateway = self.gateway.name(), "session already open");
            return Ok(());
        }

        let opts = &self.options;
        tracing::info!(
            gateway = self.gateway.name(),
            host = %opts.server_host,
            port = opts.server_port,
            "connecting"
        );
        if let Err(err) = self.gateway.start(opts).await {
            return Err(RefDataError::Connection {
                host: opts.server_host.clone(),
                port: opts.server_port,
                detail: format!("{err:#}"),
            });
        }

        if let Err(err) = self.gateway.open_service(&opts.service).await {
            let service = opts.service.clone();
            self.gateway.stop().await;
            return Err(RefDataError::Service {
                service,
                detail: format!("{err:#}"),
            });
        }

        if opts.time_coercion == TimeCoercion::LegacyDateTime {
            tracing::warn!("TIME fields will be anchored on 0001-01-01 (legacy coercion)");
        }

        self.open = true;
        tracing::info!(service = %self.options.service, "session open");
        Ok(())
    }

    /// Stops the session. A no-op when already closed.
    pub async fn close(&mut self) {
        if !self.open {
            return;
        }
        self.gateway.stop().await;
        self.open = false;
        tracing::info!(gateway = self.gateway.name(), "session closed");
    }

    /// Current values of `fields` for each of `securities`.
    pub async fn fetch_snapshot<S, F>(&mut self, securities: &[S], fields: &[F]) -> Result<SnapshotResult>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        let spec = RequestSpec::new(securities, fields)?;
        self.request_snapshot(&spec).await
    }

    /// Daily values of `fields` for each of `securities` over `start..=end`.
    pub async fn fetch_time_series<S, F>(
        &mut self,
        securities: &[S],
        fields: &[F],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeriesResult>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        let spec = RequestSpec::new(securities, fields)?.with_range(start, end)?;
        self.request_time_series(&spec).await
    }

    pub async fn request_snapshot(&mut self, spec: &RequestSpec) -> Result<SnapshotResult> {
        let acc = SnapshotAccumulator::new(self.options.time_coercion);
        self.execute(spec.snapshot_request(), acc).await
    }

    pub async fn request_time_series(&mut self, spec: &RequestSpec) -> Result<TimeSeriesResult> {
        let request = spec.time_series_request()?;
        let acc = TimeSeriesAccumulator::new(self.options.time_coercion);
        self.execute(request, acc).await
    }

    pub async fn fetch_intraday_bars(&mut self, spec: &IntradayBarSpec) -> Result<IntradayBarResult> {
        let acc = IntradayBarAccumulator::new(spec.security(), self.options.time_coercion);
        self.execute(spec.request(), acc).await
    }

    async fn execute<A: ResponseAccumulator>(&mut self, request: Request, acc: A) -> Result<A::Output> {
        if !self.open {
            return Err(RefDataError::NotOpen);
        }

        let correlation_id = CorrelationId::new();
        let started = Instant::now();
        tracing::info!(
            %correlation_id,
            operation = %request.operation,
            securities = request.group("securities").len(),
            fields = request.group("fields").len(),
            "sending request"
        );

        self.gateway
            .send_request(&request, correlation_id)
            .await
            .map_err(|err| RefDataError::Transport(format!("{err:#}")))?;

        let ctx = DecodeContext::new(correlation_id, self.options.request_timeout, self.cancel.clone());
        let res = collect_response(&mut self.gateway, &ctx, acc).await;

        match &res {
            Ok(_) => tracing::info!(
                %correlation_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request complete"
            ),
            Err(err) => {
                tracing::warn!(%correlation_id, error = %err, "request failed");
                if matches!(err, RefDataError::Cancelled) {
                    self.cancel = CancellationToken::new();
                }
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::replay::{ReplayGateway, ReplayScript};
    use super::*;
    use crate::decode::fixtures::*;
    use crate::domain::{EntityFields, FieldValue};
    use crate::domain::request::{HISTORICAL_DATA_REQUEST, REFERENCE_DATA_REQUEST};

    fn session(batches: Vec<EventBatch>) -> Session<ReplayGateway> {
        Session::new(ReplayGateway::from_batches(batches), SessionOptions::default())
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn snapshot_scenario() {
        let mut s = session(vec![terminal(vec![reference_message(vec![(
            "IBM US Equity",
            vec![float("PX_LAST", 350.5)],
        )])])]);
        s.open().await.unwrap();

        let result = s.fetch_snapshot(&["IBM US Equity"], &["PX_LAST"]).await.unwrap();

        let mut expected = EntityFields::new();
        expected.insert("PX_LAST".into(), FieldValue::Float(350.5));
        assert_eq!(result.securities.len(), 1);
        assert_eq!(result.get("IBM US Equity"), Some(&expected));

        let (_, sent) = &s.gateway().sent_requests()[0];
        assert_eq!(sent.operation, REFERENCE_DATA_REQUEST);
        assert_eq!(sent.group("securities"), ["IBM US Equity"]);
        assert_eq!(sent.group("fields"), ["PX_LAST"]);
    }

    #[tokio::test]
    async fn time_series_scenario() {
        let mut s = session(vec![terminal(vec![history_message(
            "IBM US Equity",
            vec![
                ("2024-01-02", vec![float("PX_LAST", 161.5)]),
                ("2024-01-03", vec![float("PX_LAST", 160.1)]),
            ],
        )])]);
        s.open().await.unwrap();

        let result = s
            .fetch_time_series(&["IBM US Equity"], &["PX_LAST"], d(2024, 1, 2), d(2024, 1, 3))
            .await
            .unwrap();

        let ibm = result.get("IBM US Equity").unwrap();
        assert_eq!(ibm.len(), 2);
        assert!(ibm.values().all(|fields| fields.len() == 1));

        let (_, sent) = &s.gateway().sent_requests()[0];
        assert_eq!(sent.operation, HISTORICAL_DATA_REQUEST);
        assert_eq!(sent.scalar("startDate"), Some("20240102"));
        assert_eq!(sent.scalar("endDate"), Some("20240103"));
    }

    #[tokio::test]
    async fn requests_need_an_open_session() {
        let mut s = session(vec![]);
        let err = s.fetch_snapshot(&["IBM US Equity"], &["PX_LAST"]).await.unwrap_err();
        assert_eq!(err, RefDataError::NotOpen);
    }

    #[tokio::test]
    async fn open_is_idempotent_and_close_stops_the_gateway() {
        let mut s = session(vec![]);
        s.open().await.unwrap();
        s.open().await.unwrap();
        assert!(s.is_open());
        assert!(s.gateway().is_started());

        s.close().await;
        s.close().await;
        assert!(!s.is_open());
        assert!(!s.gateway().is_started());
    }

    #[tokio::test]
    async fn start_failure_is_a_connection_error() {
        let gateway = ReplayGateway::new(ReplayScript {
            connect_error: Some("connection refused".into()),
            ..Default::default()
        });
        let mut s = Session::new(gateway, SessionOptions::default());
        let err = s.open().await.unwrap_err();
        assert!(matches!(err, RefDataError::Connection { port: 8194, .. }));
        assert!(!s.is_open());
    }

    #[tokio::test]
    async fn service_failure_stops_the_session() {
        let gateway = ReplayGateway::new(ReplayScript {
            service_error: Some("service not found".into()),
            ..Default::default()
        });
        let mut s = Session::new(gateway, SessionOptions::default());
        let err = s.open().await.unwrap_err();
        assert_eq!(
            err,
            RefDataError::Service {
                service: REFDATA_SERVICE.into(),
                detail: "service not found".into()
            }
        );
        assert!(!s.gateway().is_started());
    }

    #[tokio::test]
    async fn second_request_reads_only_its_own_batches() {
        let mut s = session(vec![
            terminal(vec![reference_message(vec![("IBM US Equity", vec![float("PX_LAST", 1.0)])])]),
            terminal(vec![reference_message(vec![("MSFT US Equity", vec![float("PX_LAST", 2.0)])])]),
        ]);
        s.open().await.unwrap();

        let first = s.fetch_snapshot(&["IBM US Equity"], &["PX_LAST"]).await.unwrap();
        assert_eq!(s.gateway().remaining(), 1);
        let second = s.fetch_snapshot(&["MSFT US Equity"], &["PX_LAST"]).await.unwrap();

        assert!(first.get("MSFT US Equity").is_none());
        assert!(second.get("IBM US Equity").is_none());
        assert_eq!(s.gateway().remaining(), 0);
    }

    #[tokio::test]
    async fn stalled_link_times_out() {
        let options = SessionOptions {
            request_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let mut s = Session::new(ReplayGateway::stalled(vec![status()]), options);
        s.open().await.unwrap();

        let err = s.fetch_snapshot(&["IBM US Equity"], &["PX_LAST"]).await.unwrap_err();
        assert_eq!(err, RefDataError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn cancelled_request_gets_a_fresh_token_afterwards() {
        let mut s = Session::new(ReplayGateway::stalled(vec![]), SessionOptions::default());
        s.open().await.unwrap();

        let token = s.cancel_token();
        token.cancel();
        let err = s.fetch_snapshot(&["IBM US Equity"], &["PX_LAST"]).await.unwrap_err();
        assert_eq!(err, RefDataError::Cancelled);
        assert!(!s.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_sending() {
        let mut s = session(vec![]);
        s.open().await.unwrap();
        let err = s
            .fetch_time_series(&["IBM US Equity"], &["PX_LAST"], d(2024, 1, 3), d(2024, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, RefDataError::InvalidRequest(_)));
        assert!(s.gateway().sent_requests().is_empty());
    }
}
