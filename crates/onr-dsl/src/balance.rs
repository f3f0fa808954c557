//! Balance Query (§4.10): administrator-invoked, independent of request
//! serving. Builds a URL from `base_url + path`, applies auth headers,
//! issues the request(s), and extracts a balance (and optional used) number
//! either via OpenAI's two-call protocol or custom JSONPath expressions.

use std::time::Duration;

use onr_expr::{EvalCtx, ReadPath, path};
use serde_json::Value;
use time::OffsetDateTime;

use crate::headerops::HeaderMap;
use crate::model::{BalanceConfig, BalanceMode, BalanceUnit, HeaderOpKind};

const BALANCE_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error("provider has no balance configuration")]
    NotConfigured,
    #[error("balance query requires a non-empty path")]
    MissingPath,
    #[error("custom balance mode requires balance_path")]
    MissingBalancePath,
    #[error("upstream request failed: {0}")]
    Upstream(#[from] wreq::Error),
    #[error("upstream returned a non-2xx status: {0}")]
    BadStatus(u16),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceResult {
    pub balance: f64,
    pub used: Option<f64>,
    pub unit: BalanceUnit,
}

/// Queries a single provider's balance. `base_url`/`api_key` come from the
/// caller's key pool entry, not `ProviderFile` (balance queries are
/// per-channel, like everything else keyed off `Meta`).
pub async fn query(client: &wreq::Client, config: &BalanceConfig, base_url: &str, api_key: &str) -> Result<BalanceResult, BalanceError> {
    let path_expr = config.path.as_ref().ok_or(BalanceError::MissingPath)?;
    let ctx = EvalCtx {
        channel_base_url: base_url,
        channel_key: api_key,
        oauth_access_token: None,
        request_model: "",
        request_model_mapped: "",
    };
    let path = path_expr.eval(&ctx);
    if path.is_empty() {
        return Err(BalanceError::MissingPath);
    }
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let mut headers = HeaderMap::default();
    match &config.auth {
        Some(op) if op.kind == HeaderOpKind::Set => {
            let name = op.name.eval(&ctx);
            let value = op.value.as_ref().map(|v| v.eval(&ctx)).unwrap_or_default();
            headers.set(&name, value);
        }
        _ => {
            headers.set("Authorization", format!("Bearer {api_key}"));
        }
    }

    match config.mode {
        BalanceMode::Openai => query_openai(client, &url, &headers, config.unit).await,
        BalanceMode::Custom => query_custom(client, &url, &headers, config).await,
    }
}

async fn send(client: &wreq::Client, url: &str, headers: &HeaderMap) -> Result<Value, BalanceError> {
    let mut req = client.get(url).timeout(BALANCE_QUERY_TIMEOUT);
    for (name, value) in headers.iter() {
        req = req.header(name, value);
    }
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(BalanceError::BadStatus(status.as_u16()));
    }
    resp.json::<Value>().await.map_err(BalanceError::Upstream)
}

/// OpenAI's two-call protocol: `dashboard/billing/subscription` for the
/// granted limit, then `dashboard/billing/usage` with a date range covering
/// the subscription's access period for spend-to-date.
async fn query_openai(client: &wreq::Client, base_url: &str, headers: &HeaderMap, unit: BalanceUnit) -> Result<BalanceResult, BalanceError> {
    let subscription = send(client, &format!("{base_url}/dashboard/billing/subscription"), headers).await?;
    let hard_limit = subscription.get("hard_limit_usd").and_then(Value::as_f64).unwrap_or(0.0);

    let start = OffsetDateTime::now_utc() - time::Duration::days(99);
    let end = OffsetDateTime::now_utc() + time::Duration::days(1);
    let format = time::format_description::well_known::Iso8601::DATE;
    let start_date = start.format(&format).unwrap_or_default();
    let end_date = end.format(&format).unwrap_or_default();

    let usage_url = format!("{base_url}/dashboard/billing/usage?start_date={start_date}&end_date={end_date}");
    let usage = send(client, &usage_url, headers).await?;
    let used_cents = usage.get("total_usage").and_then(Value::as_f64).unwrap_or(0.0);
    let used = used_cents / 100.0;

    Ok(BalanceResult { balance: hard_limit - used, used: Some(used), unit })
}

async fn query_custom(client: &wreq::Client, url: &str, headers: &HeaderMap, config: &BalanceConfig) -> Result<BalanceResult, BalanceError> {
    let balance_path = config.balance_path.as_ref().ok_or(BalanceError::MissingBalancePath)?;
    let body = send(client, url, headers).await?;
    let balance = extract_number(&body, balance_path).unwrap_or(0.0);
    let used = config.used_path.as_ref().and_then(|p| extract_number(&body, p));
    Ok(BalanceResult { balance, used, unit: config.unit })
}

fn extract_number(body: &Value, path: &ReadPath) -> Option<f64> {
    let matches = path::eval_read(body, path);
    matches.first().and_then(|v| v.as_f64())
}

/// Batch execution across providers (§4.10a): a `join_all` over per-provider
/// futures; fail-fast mode stops awaiting further results after the first
/// error rather than aborting futures already in flight.
pub async fn query_batch<'a, F, Fut>(providers: impl IntoIterator<Item = &'a str>, fail_fast: bool, query_one: F) -> Vec<(String, Result<BalanceResult, BalanceError>)>
where
    F: Fn(&'a str) -> Fut,
    Fut: std::future::Future<Output = Result<BalanceResult, BalanceError>>,
{
    let names: Vec<&str> = providers.into_iter().collect();
    let futures = names.iter().map(|name| {
        let name = *name;
        async move { (name.to_string(), query_one(name).await) }
    });

    if !fail_fast {
        return futures_util::future::join_all(futures).await;
    }

    let mut results = Vec::new();
    let mut stream = futures_util::stream::FuturesOrdered::from_iter(futures);
    use futures_util::StreamExt;
    while let Some((name, result)) = stream.next().await {
        let failed = result.is_err();
        results.push((name, result));
        if failed {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_number_reads_configured_path() {
        let body = json!({"data": {"balance": 12.5}});
        let path = ReadPath::parse("$.data.balance").unwrap();
        assert_eq!(extract_number(&body, &path), Some(12.5));
    }

    #[test]
    fn extract_number_missing_path_is_none() {
        let body = json!({});
        let path = ReadPath::parse("$.missing").unwrap();
        assert_eq!(extract_number(&body, &path), None);
    }
}
