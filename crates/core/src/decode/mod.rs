//! Folding of response event batches into result structures.
//!
//! [`collect_response`] drives a live gateway; [`decode_recorded`] runs the same
//! fold over an already captured batch sequence.

pub mod bars;
pub mod coerce;
pub mod history;
pub mod snapshot;

use crate::error::{RefDataError, Result};
use crate::session::SessionGateway;
use crate::wire::{CorrelationId, Element, EventBatch, Message};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use bars::IntradayBarAccumulator;
pub use history::TimeSeriesAccumulator;
pub use snapshot::SnapshotAccumulator;

/// Per-request fold over response messages.
pub trait ResponseAccumulator {
    type Output;

    /// Merges one response message. Messages carrying `responseError` never
    /// reach this method.
    fn absorb(&mut self, msg: &Message) -> Result<()>;

    fn finish(self) -> Self::Output;
}

/// Bounds for one outstanding request.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pub correlation_id: Option<CorrelationId>,
    pub timeout: Duration,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl DecodeContext {
    pub fn new(correlation_id: CorrelationId, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            timeout,
            deadline: Instant::now() + timeout,
            cancel,
        }
    }
}

/// Pulls batches from `gateway` until the terminal response and returns the
/// folded result. Nothing past the terminal batch is consumed.
pub async fn collect_response<G, A>(
    gateway: &mut G,
    ctx: &DecodeContext,
    mut acc: A,
) -> Result<A::Output>
where
    G: SessionGateway + ?Sized,
    A: ResponseAccumulator,
{
    loop {
        let batch = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(RefDataError::Cancelled),
            next = tokio::time::timeout_at(ctx.deadline, gateway.next_event()) => match next {
                Err(_) => return Err(RefDataError::Timeout(ctx.timeout)),
                Ok(Err(err)) => return Err(RefDataError::Transport(format!("{err:#}"))),
                Ok(Ok(batch)) => batch,
            },
        };

        if fold_batch(&mut acc, &batch, ctx.correlation_id)? {
            return Ok(acc.finish());
        }
    }
}

/// Runs the fold over a captured batch sequence. Batches after the terminal
/// one are left in the iterator.
pub fn decode_recorded<I, A>(batches: I, mut acc: A) -> Result<A::Output>
where
    I: IntoIterator<Item = EventBatch>,
    A: ResponseAccumulator,
{
    for batch in batches {
        if fold_batch(&mut acc, &batch, None)? {
            return Ok(acc.finish());
        }
    }
    Err(RefDataError::Transport(
        "event stream ended before the terminal response".to_string(),
    ))
}

/// Folds one batch; `Ok(true)` once the terminal response has been absorbed.
fn fold_batch<A: ResponseAccumulator>(
    acc: &mut A,
    batch: &EventBatch,
    correlation_id: Option<CorrelationId>,
) -> Result<bool> {
    if !batch.kind.is_response() {
        tracing::debug!(batch_kind = ?batch.kind, "skipping non-response event");
        return Ok(false);
    }

    tracing::debug!(
        batch_kind = ?batch.kind,
        messages = batch.messages.len(),
        "received response batch"
    );

    for msg in &batch.messages {
        if let (Some(expected), Some(got)) = (correlation_id, msg.correlation_id) {
            if expected != got {
                tracing::warn!(%expected, %got, message_type = %msg.message_type, "skipping message for another request");
                continue;
            }
        }

        if let Some(message) = response_error(msg) {
            return Err(RefDataError::Response { message });
        }

        acc.absorb(msg)?;
    }

    Ok(batch.kind.is_terminal())
}

fn response_error(msg: &Message) -> Option<String> {
    let err = msg.get("responseError")?;
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| err.get("category").and_then(|c| c.as_str()))
        .unwrap_or("unspecified response error");
    Some(message.to_string())
}

/// Text of a `securityError` element.
pub(crate) fn security_error_message(err: &Element) -> String {
    err.get("message")
        .and_then(|m| m.as_str())
        .or_else(|| err.get("category").and_then(|c| c.as_str()))
        .unwrap_or("unspecified security error")
        .to_string()
}

/// Fields the server rejected for one security. They are left out of the result.
pub(crate) fn log_field_exceptions(security: &str, exceptions: &Element) {
    for exception in exceptions.values() {
        let field = exception
            .get("fieldId")
            .and_then(|f| f.as_str())
            .unwrap_or("?");
        let reason = exception
            .get("errorInfo")
            .and_then(|info| info.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("unspecified");
        tracing::warn!(security, field, reason, "field exception");
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::{FieldValue, SnapshotResult, TimeCoercion};
    use crate::session::replay::ReplayGateway;

    fn snapshot_acc() -> SnapshotAccumulator {
        SnapshotAccumulator::new(TimeCoercion::default())
    }

    #[test]
    fn stops_at_terminal_batch_and_leaves_the_rest() {
        let batches = vec![
            status(),
            partial(vec![reference_message(vec![("IBM US Equity", vec![float("PX_LAST", 1.0)])])]),
            terminal(vec![reference_message(vec![("MSFT US Equity", vec![float("PX_LAST", 2.0)])])]),
            terminal(vec![reference_message(vec![("AAPL US Equity", vec![float("PX_LAST", 3.0)])])]),
        ];
        let mut iter = batches.into_iter();
        let result = decode_recorded(iter.by_ref(), snapshot_acc()).unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.get("AAPL US Equity").is_none());
        assert_eq!(iter.len(), 1);
    }

    #[test]
    fn response_error_fails_and_discards_partial_data() {
        let batches = vec![
            partial(vec![reference_message(vec![("IBM US Equity", vec![float("PX_LAST", 1.0)])])]),
            terminal(vec![error_message("Invalid field: PX_LSAT")]),
        ];
        let err = decode_recorded(batches, snapshot_acc()).unwrap_err();
        assert_eq!(
            err,
            RefDataError::Response {
                message: "Invalid field: PX_LSAT".into()
            }
        );
    }

    #[test]
    fn stream_without_terminal_batch_is_a_transport_error() {
        let batches = vec![partial(vec![])];
        let err = decode_recorded(batches, snapshot_acc()).unwrap_err();
        assert!(matches!(err, RefDataError::Transport(_)));
    }

    #[test]
    fn decoding_the_same_recording_twice_is_identical() {
        let batches = vec![
            partial(vec![reference_message(vec![
                ("IBM US Equity", vec![float("PX_LAST", 350.5), date("LAST_UPDATE_DT", "2024-01-31")]),
            ])]),
            terminal(vec![reference_message(vec![("MSFT US Equity", vec![string("NAME", "MICROSOFT")])])]),
        ];
        let a: SnapshotResult = decode_recorded(batches.clone(), snapshot_acc()).unwrap();
        let b: SnapshotResult = decode_recorded(batches, snapshot_acc()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn skips_messages_correlated_to_another_request() {
        let ours = CorrelationId::new();
        let theirs = CorrelationId::new();
        let batch = terminal(vec![
            reference_message(vec![("IBM US Equity", vec![float("PX_LAST", 1.0)])]).with_correlation_id(theirs),
            reference_message(vec![("MSFT US Equity", vec![float("PX_LAST", 2.0)])]).with_correlation_id(ours),
        ]);
        let mut acc = snapshot_acc();
        assert!(fold_batch(&mut acc, &batch, Some(ours)).unwrap());
        let result = acc.finish();
        assert!(result.get("IBM US Equity").is_none());
        assert_eq!(result.get("MSFT US Equity").unwrap()["PX_LAST"], FieldValue::Float(2.0));
    }

    #[tokio::test]
    async fn live_loop_times_out_without_terminal_event() {
        let mut gateway = ReplayGateway::stalled(vec![partial(vec![])]);
        let ctx = DecodeContext::new(
            CorrelationId::new(),
            Duration::from_millis(20),
            CancellationToken::new(),
        );
        let err = collect_response(&mut gateway, &ctx, snapshot_acc()).await.unwrap_err();
        assert_eq!(err, RefDataError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn live_loop_observes_cancellation() {
        let mut gateway = ReplayGateway::stalled(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = DecodeContext::new(CorrelationId::new(), Duration::from_secs(5), cancel);
        let err = collect_response(&mut gateway, &ctx, snapshot_acc()).await.unwrap_err();
        assert_eq!(err, RefDataError::Cancelled);
    }
}
