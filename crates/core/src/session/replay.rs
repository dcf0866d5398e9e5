use super::{SessionGateway, SessionOptions};
use crate::wire::{CorrelationId, EventBatch, Request};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Recorded session: how start/open behaved and the batches the server sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub connect_error: Option<String>,
    #[serde(default)]
    pub service_error: Option<String>,
    #[serde(default)]
    pub batches: Vec<EventBatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhenExhausted {
    Fail,
    Stall,
}

/// Gateway that plays back a [`ReplayScript`] instead of talking to a server.
#[derive(Debug)]
pub struct ReplayGateway {
    connect_error: Option<String>,
    service_error: Option<String>,
    pending: VecDeque<EventBatch>,
    when_exhausted: WhenExhausted,
    started: bool,
    services: Vec<String>,
    sent: Vec<(CorrelationId, Request)>,
}

impl ReplayGateway {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            connect_error: script.connect_error,
            service_error: script.service_error,
            pending: script.batches.into(),
            when_exhausted: WhenExhausted::Fail,
            started: false,
            services: Vec::new(),
            sent: Vec::new(),
        }
    }

    pub fn from_batches(batches: Vec<EventBatch>) -> Self {
        Self::new(ReplayScript {
            batches,
            ..Default::default()
        })
    }

    /// Like [`Self::from_batches`], but once the batches run out `next_event`
    /// never resolves, as with a link that went silent.
    pub fn stalled(batches: Vec<EventBatch>) -> Self {
        let mut gateway = Self::from_batches(batches);
        gateway.when_exhausted = WhenExhausted::Stall;
        gateway
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script {}", path.display()))?;
        let script = serde_json::from_str::<ReplayScript>(&text)
            .with_context(|| format!("replay script {} is not valid", path.display()))?;
        Ok(Self::new(script))
    }

    pub fn sent_requests(&self) -> &[(CorrelationId, Request)] {
        &self.sent
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

#[async_trait::async_trait]
impl SessionGateway for ReplayGateway {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn start(&mut self, options: &SessionOptions) -> anyhow::Result<()> {
        if let Some(err) = &self.connect_error {
            anyhow::bail!("{err}");
        }
        tracing::debug!(
            host = %options.server_host,
            port = options.server_port,
            batches = self.pending.len(),
            "replay session started"
        );
        self.started = true;
        Ok(())
    }

    async fn open_service(&mut self, service: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.started, "session not started");
        if let Some(err) = &self.service_error {
            anyhow::bail!("{err}");
        }
        self.services.push(service.to_string());
        Ok(())
    }

    async fn send_request(
        &mut self,
        request: &Request,
        correlation_id: CorrelationId,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(self.started, "session not started");
        anyhow::ensure!(!self.services.is_empty(), "no service open");
        self.sent.push((correlation_id, request.clone()));
        Ok(())
    }

    async fn next_event(&mut self) -> anyhow::Result<EventBatch> {
        if let Some(batch) = self.pending.pop_front() {
            return Ok(batch);
        }
        match self.when_exhausted {
            WhenExhausted::Fail => anyhow::bail!("replay script exhausted"),
            WhenExhausted::Stall => std::future::pending().await,
        }
    }

    async fn stop(&mut self) {
        self.started = false;
        self.services.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::EventKind;
    use serde_json::json;

    #[test]
    fn script_parses_from_json() {
        let v = json!({
            "batches": [
                {"kind": "SESSION_STATUS", "messages": [{"message_type": "SessionStarted"}]},
                {
                    "kind": "RESPONSE",
                    "messages": [{
                        "message_type": "ReferenceDataResponse",
                        "body": [{
                            "name": "securityData",
                            "value": {"datatype": "ARRAY", "value": [
                                {"datatype": "SEQUENCE", "value": [
                                    {"name": "security", "value": {"datatype": "STRING", "value": "IBM US Equity"}},
                                    {"name": "fieldData", "value": {"datatype": "SEQUENCE", "value": [
                                        {"name": "PX_LAST", "value": {"datatype": "FLOAT64", "value": 350.5}}
                                    ]}}
                                ]}
                            ]}
                        }]
                    }]
                }
            ]
        });
        let script: ReplayScript = serde_json::from_value(v).unwrap();
        assert_eq!(script.batches.len(), 2);
        assert_eq!(script.batches[1].kind, EventKind::Response);
        assert!(script.connect_error.is_none());
    }

    #[tokio::test]
    async fn exhausted_script_fails_next_event() {
        let mut gateway = ReplayGateway::from_batches(vec![]);
        assert!(gateway.next_event().await.is_err());
    }

    #[tokio::test]
    async fn requests_need_an_open_service() {
        let mut gateway = ReplayGateway::from_batches(vec![]);
        let req = Request::new("ReferenceDataRequest");
        assert!(gateway.send_request(&req, CorrelationId::new()).await.is_err());

        gateway.start(&SessionOptions::default()).await.unwrap();
        gateway.open_service("//blp/refdata").await.unwrap();
        gateway.send_request(&req, CorrelationId::new()).await.unwrap();
        assert_eq!(gateway.sent_requests().len(), 1);
    }
}
