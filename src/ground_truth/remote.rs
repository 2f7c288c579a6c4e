// External ground truth: pre-computed comparisons from the results service
//
// The service answers a GET query with a JSON array whose first element
// carries `mean.differences`: rows indexed by `value.old`, `value.new` and
// `p.zero.normal`, each with one entry per metric column. Anything missing
// or non-numeric is a parse failure and the comparer falls back to local
// computation.

use crate::detection::{relative_change, Comparison};
use crate::error::{PhoenixError, Result};
use crate::sample::Sample;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Significance level the service's verdicts are read at
pub const REMOTE_P_VALUE_THRESHOLD: f64 = 0.01;

/// Default results service query endpoint
pub const DEFAULT_REMOTE_URL: &str = "https://graal.d3s.mff.cuni.cz/qry/comp/bwcmtpipi";

/// Source of pre-computed comparisons
pub trait GroundTruthSource: Send + Sync {
    /// `Ok(None)` when the source has no answer for this pair
    fn fetch(&self, old: &Sample, new: &Sample, column: &str) -> Result<Option<Comparison>>;
}

/// `[remote]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REMOTE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(PhoenixError::config("remote url must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(PhoenixError::config("remote timeout must be positive"));
        }
        Ok(())
    }
}

/// Regex selecting the metric column of `column` in a payload row
pub fn column_matcher(column: &str) -> Result<Regex> {
    let pattern = if column == "iteration_time_ns" {
        ".*(iteration_time_ns|duration_ns|nanos)$".to_string()
    } else {
        format!(".*:{}", regex::escape(column))
    };
    Regex::new(&format!("^(?:{})", pattern)).map_err(|e| PhoenixError::config(e.to_string()))
}

/// Parse one element of the service response into a Comparison
///
/// # Errors
/// `ExternalLookup` for any missing, non-numeric or unexpected field.
pub fn parse_bootstrap_diff(element: &Value, column: &str) -> Result<Comparison> {
    let fail = |reason: &str| PhoenixError::ExternalLookup(format!("{} (column {})", reason, column));
    let matcher = column_matcher(column)?;

    let rows = element
        .get("mean.differences")
        .and_then(Value::as_array)
        .ok_or_else(|| fail("payload has no mean.differences"))?;

    let (mut old_value, mut new_value, mut p_value) = (None, None, None);

    for row in rows {
        let index = row.get("index").and_then(Value::as_str);
        let slot = match index {
            Some("value.old") => &mut old_value,
            Some("value.new") => &mut new_value,
            Some("p.zero.normal") => &mut p_value,
            _ => continue,
        };

        let object = row.as_object().ok_or_else(|| fail("row is not an object"))?;
        let mut matched: Option<&Value> = None;
        for (metric, value) in object {
            if matcher.is_match(metric) {
                matched = Some(value);
                if index == Some("p.zero.normal") {
                    break;
                }
            }
        }
        let value = matched
            .ok_or_else(|| fail(&format!("row {} has no matching metric", index.unwrap_or("?"))))?
            .as_f64()
            .ok_or_else(|| fail(&format!("row {} is not numeric", index.unwrap_or("?"))))?;
        *slot = Some(value);

        if let (Some(old), Some(new), Some(p)) = (old_value, new_value, p_value) {
            return finish(element, column, old, new, p).map_err(|reason| fail(&reason));
        }
    }

    Err(fail("incomplete mean.differences"))
}

fn finish(element: &Value, column: &str, old: f64, new: f64, p: f64) -> std::result::Result<Comparison, String> {
    let count = |field: &str| {
        element
            .get(field)
            .and_then(Value::as_u64)
            .map(|c| c as usize)
            .ok_or_else(|| format!("missing {}", field))
    };
    if element.get("id").is_none() {
        return Err("missing id".to_string());
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(format!("p-value {} out of range", p));
    }
    let effect_size =
        relative_change(old, new).ok_or_else(|| format!("relative change from {} to {} is undefined", old, new))?;

    Ok(Comparison {
        column: Some(column.to_string()),
        old_run_count: count("count.old")?,
        new_run_count: count("count.new")?,
        p_value: p,
        effect_size,
        regression: p < REMOTE_P_VALUE_THRESHOLD,
        key: None,
        generated: Some(false),
    })
}

/// Ground truth fetched over HTTP with a bounded timeout
#[cfg(feature = "remote")]
pub struct HttpGroundTruth {
    client: reqwest::blocking::Client,
    url: String,
}

#[cfg(feature = "remote")]
impl HttpGroundTruth {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PhoenixError::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    fn query(old: &Sample, new: &Sample) -> Vec<(&'static str, String)> {
        vec![
            ("name", "bootstrap-diff-one-per-rep".to_string()),
            ("extra", "id".to_string()),
            ("platform_installation_old", old.identity.platform_installation.to_string()),
            ("platform_installation_new", new.identity.platform_installation.to_string()),
            ("machine_type", new.identity.machine_type.to_string()),
            ("configuration", new.identity.configuration.to_string()),
            ("benchmark_workload", new.identity.benchmark_workload.to_string()),
        ]
    }
}

#[cfg(feature = "remote")]
impl GroundTruthSource for HttpGroundTruth {
    fn fetch(&self, old: &Sample, new: &Sample, column: &str) -> Result<Option<Comparison>> {
        let lookup = |e: reqwest::Error| PhoenixError::ExternalLookup(e.to_string());

        let response = self
            .client
            .get(&self.url)
            .query(&Self::query(old, new))
            .send()
            .map_err(lookup)?;

        if !response.status().is_success() {
            return Err(PhoenixError::ExternalLookup(format!(
                "results service answered {}",
                response.status()
            )));
        }

        let payload: Value = response.json().map_err(lookup)?;
        let Some(element) = payload.as_array().and_then(|a| a.first()) else {
            return Ok(None);
        };
        parse_bootstrap_diff(element, column).map(Some)
    }
}
