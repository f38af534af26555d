use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::collections::HashMap;
use std::time::Duration;
use vmdash_alert::{MetricReading, MetricSource};
use vmdash_common::types::AlertRuleDef;

use crate::config::InfluxConfig;

/// 从 InfluxDB v2 读取 Proxmox 节点指标，每个 host 一条读数。
pub struct InfluxMetricSource {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    org: String,
    bucket: String,
    time_range: String,
}

impl InfluxMetricSource {
    pub fn new(config: &InfluxConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build InfluxDB HTTP client")?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            time_range: config.time_range.clone(),
        })
    }

    async fn query(&self, flux: &str) -> anyhow::Result<Vec<HashMap<String, String>>> {
        let mut req = self
            .client
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header(CONTENT_TYPE, "application/vnd.flux")
            .header(ACCEPT, "application/csv")
            .body(flux.to_string());
        if let Some(ref token) = self.token {
            req = req.header(AUTHORIZATION, format!("Token {token}"));
        }

        let resp = req.send().await.context("InfluxDB query request failed")?;
        let status = resp.status();
        let body = resp.text().await.context("Failed to read InfluxDB response")?;
        if !status.is_success() {
            bail!(
                "InfluxDB query failed with status {status}: {}",
                body.chars().take(200).collect::<String>()
            );
        }
        Ok(parse_annotated_csv(&body))
    }

    async fn list_hosts(&self) -> anyhow::Result<Vec<String>> {
        let flux = format!(
            "import \"influxdata/influxdb/schema\"\n\
             schema.tagValues(bucket: \"{}\", tag: \"host\", start: -{})",
            self.bucket, self.time_range
        );
        let rows = self.query(&flux).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove("_value"))
            .filter(|h| !h.is_empty())
            .collect())
    }
}

#[async_trait]
impl MetricSource for InfluxMetricSource {
    async fn sample(&self, rule: &AlertRuleDef) -> anyhow::Result<Vec<MetricReading>> {
        if let Some(flux) = builtin_flux(&rule.metric_type, &self.bucket, &self.time_range) {
            let rows = self.query(&flux).await?;
            return Ok(readings_from_rows(rows));
        }

        let Some(template) = rule.influx_query.as_deref().filter(|q| !q.trim().is_empty()) else {
            bail!(
                "metric type '{}' has no built-in query and rule has no influx_query",
                rule.metric_type
            );
        };

        // 自定义查询按节点逐个执行，每次取最后一个值
        let mut readings = Vec::new();
        for host in self.list_hosts().await? {
            let flux = render_query_template(template, &host, &self.bucket);
            match self.query(&flux).await {
                Ok(rows) => {
                    if let Some(value) = rows
                        .iter()
                        .rev()
                        .find_map(|row| row.get("_value").and_then(|v| v.parse::<f64>().ok()))
                    {
                        readings.push(MetricReading::new(host, value));
                    }
                }
                Err(e) => {
                    tracing::warn!(rule = %rule.name, host = %host, error = %e, "Custom query failed");
                }
            }
        }
        Ok(readings)
    }
}

/// 内置指标的 Flux 查询，按 host 分组求平均。
pub fn builtin_flux(metric_type: &str, bucket: &str, time_range: &str) -> Option<String> {
    let flux = match metric_type {
        "cpu_usage" => format!(
            "from(bucket: \"{bucket}\")\n  \
             |> range(start: -{time_range})\n  \
             |> filter(fn: (r) => r._measurement == \"cpustat\" and r._field == \"cpu\")\n  \
             |> group(columns: [\"host\"])\n  \
             |> mean()\n  \
             |> map(fn: (r) => ({{ r with _value: r._value * 100.0 }}))"
        ),
        "memory_usage" => format!(
            "used = from(bucket: \"{bucket}\")\n  \
             |> range(start: -{time_range})\n  \
             |> filter(fn: (r) => r._measurement == \"memory\" and r._field == \"memused\")\n  \
             |> group(columns: [\"host\"])\n  \
             |> mean()\n\
             total = from(bucket: \"{bucket}\")\n  \
             |> range(start: -{time_range})\n  \
             |> filter(fn: (r) => r._measurement == \"memory\" and r._field == \"memtotal\")\n  \
             |> group(columns: [\"host\"])\n  \
             |> mean()\n\
             join(tables: {{used: used, total: total}}, on: [\"host\"])\n  \
             |> map(fn: (r) => ({{ host: r.host, _value: r._value_used / r._value_total * 100.0 }}))"
        ),
        "storage_usage" => format!(
            "from(bucket: \"{bucket}\")\n  \
             |> range(start: -{time_range})\n  \
             |> filter(fn: (r) => r._measurement == \"blockstat\" and r._field == \"per\")\n  \
             |> group(columns: [\"host\"])\n  \
             |> mean()"
        ),
        _ => return None,
    };
    Some(flux)
}

/// 替换自定义查询中的 `${node_name}` 与 `${INFLUXDB_BUCKET}` 占位符。
pub fn render_query_template(template: &str, host: &str, bucket: &str) -> String {
    template
        .replace("${node_name}", host)
        .replace("${INFLUXDB_BUCKET}", bucket)
}

fn readings_from_rows(rows: Vec<HashMap<String, String>>) -> Vec<MetricReading> {
    rows.into_iter()
        .filter_map(|row| {
            let host = row.get("host").filter(|h| !h.is_empty())?;
            let value = row.get("_value")?.parse::<f64>().ok()?;
            Some(MetricReading::new(host.clone(), value))
        })
        .collect()
}

/// 解析 InfluxDB 带注释的 CSV 响应。
///
/// `#` 开头的行是注释，空行分隔不同的表，每张表的首行是表头。
pub fn parse_annotated_csv(body: &str) -> Vec<HashMap<String, String>> {
    let mut rows = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            header = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let fields = split_csv_line(line);
        match header {
            None => header = Some(fields),
            Some(ref cols) => {
                let row = cols
                    .iter()
                    .zip(fields)
                    .filter(|(col, _)| !col.is_empty())
                    .map(|(col, value)| (col.clone(), value))
                    .collect();
                rows.push(row);
            }
        }
    }
    rows
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
