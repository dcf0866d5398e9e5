use crate::Command;
use anyhow::Context;
use chrono::NaiveDate;
use refdata_core::domain::{BarEventType, IntradayBarSpec};
use refdata_core::session::{Session, SessionGateway};
use refdata_core::time::trading::{previous_trading_date, session_window};
use serde_json::Value;

pub(crate) async fn execute<G: SessionGateway>(
    session: &mut Session<G>,
    command: Command,
) -> anyhow::Result<Value> {
    match command {
        Command::Snapshot { securities, fields } => {
            let result = session
                .fetch_snapshot(securities.as_slice(), fields.as_slice())
                .await
                .context("snapshot request failed")?;
            let missing = result.missing(&securities);
            if !missing.is_empty() {
                tracing::warn!(?missing, "no data returned for some securities");
            }
            Ok(serde_json::to_value(&result)?)
        }
        Command::History {
            securities,
            fields,
            start,
            end,
        } => {
            let start = parse_date("--start", &start)?;
            let end = parse_date("--end", &end)?;
            let result = session
                .fetch_time_series(securities.as_slice(), fields.as_slice(), start, end)
                .await
                .context("history request failed")?;
            let missing = result.missing(&securities);
            if !missing.is_empty() {
                tracing::warn!(?missing, "no data returned for some securities");
            }
            Ok(serde_json::to_value(&result)?)
        }
        Command::Bars {
            security,
            event_type,
            interval,
            date,
        } => {
            let event_type = BarEventType::parse(&event_type)
                .with_context(|| format!("unknown bar event type: {event_type}"))?;
            let day = match date.as_deref() {
                Some(s) => parse_date("--date", s)?,
                None => previous_trading_date(chrono::Utc::now().date_naive()),
            };
            let (start, end) = session_window(day);
            let spec = IntradayBarSpec::new(&security, event_type, interval, start, end)?;
            let result = session
                .fetch_intraday_bars(&spec)
                .await
                .context("intraday bar request failed")?;
            tracing::info!(security = %result.security, bars = result.bars.len(), %day, "bars received");
            Ok(serde_json::to_value(&result)?)
        }
    }
}

fn parse_date(flag: &str, s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("{flag} must be YYYY-MM-DD (got {s})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdata_core::session::replay::ReplayGateway;
    use refdata_core::session::SessionOptions;
    use serde_json::json;
    use std::path::Path;

    #[tokio::test]
    async fn snapshot_command_plays_back_the_fixture() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/ibm_snapshot.json");
        let gateway = ReplayGateway::from_path(&path).unwrap();
        let mut session = Session::new(gateway, SessionOptions::default());
        session.open().await.unwrap();

        let command = Command::Snapshot {
            securities: vec!["IBM US Equity".into(), "MSFT US Equity".into()],
            fields: vec!["PX_LAST".into(), "LAST_UPDATE_DT".into(), "TIME".into()],
        };
        let out = execute(&mut session, command).await.unwrap();
        session.close().await;

        assert_eq!(out["securities"]["IBM US Equity"]["PX_LAST"], json!(350.5));
        assert_eq!(
            out["securities"]["IBM US Equity"]["LAST_UPDATE_DT"],
            json!("2024-01-31T00:00:00")
        );
        assert_eq!(out["securities"]["MSFT US Equity"]["TIME"], json!("21:00:00"));
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(
            parse_date("--start", "2024-01-02").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert!(parse_date("--start", "20240102").is_err());
    }
}
