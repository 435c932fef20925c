//! Bounded polling for `wait_for` and `wait_for_delete`

use crate::binding::CrdBinding;
use crate::client::DynamicClient;
use crate::id::ResourceId;
use crate::jsonpath::JsonPath;
use crate::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One `wait_for` entry: `jsonpath` must render as `value`
#[derive(Debug, Clone, PartialEq)]
pub struct WaitCondition {
    pub jsonpath: JsonPath,
    pub value: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitCondition {
    pub fn new(jsonpath: &str, value: impl Into<String>) -> Result<Self> {
        Ok(Self {
            jsonpath: JsonPath::parse(jsonpath)?,
            value: value.into(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn from_state(entry: &Value, index: usize) -> Result<Self> {
        let path = format!("wait_for[{index}]");
        let field = |name: &str| entry.get(name).and_then(Value::as_str);

        let jsonpath = field("jsonpath").ok_or_else(|| {
            Error::invalid_attribute(format!("{path}.jsonpath"), "a JSONPath expression is required")
        })?;
        let value = field("value").ok_or_else(|| {
            Error::invalid_attribute(format!("{path}.value"), "an expected value is required")
        })?;

        Ok(Self {
            jsonpath: JsonPath::parse(jsonpath)?,
            value: value.to_string(),
            timeout: parse_duration(field("timeout"), DEFAULT_TIMEOUT, &format!("{path}.timeout"))?,
            poll_interval: parse_duration(
                field("poll_interval"),
                DEFAULT_POLL_INTERVAL,
                &format!("{path}.poll_interval"),
            )?,
        })
    }

    pub fn is_met(&self, object: &Value) -> bool {
        self.jsonpath.matches(object, &self.value)
    }
}

/// `wait_for_delete` settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeleteWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DeleteWait {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Parse the `wait_for` list of a resource state
pub fn conditions_from_state(state: &Value) -> Result<Vec<WaitCondition>> {
    match state.get("wait_for") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| WaitCondition::from_state(entry, i))
            .collect(),
        Some(_) => Err(Error::invalid_attribute("wait_for", "expected a list")),
    }
}

/// Parse the `wait_for_delete` block of a resource state
pub fn delete_wait_from_state(state: &Value) -> Result<Option<DeleteWait>> {
    let block = match state.get("wait_for_delete") {
        None | Some(Value::Null) => return Ok(None),
        Some(block) => block,
    };
    let field = |name: &str| block.get(name).and_then(Value::as_str);
    Ok(Some(DeleteWait {
        timeout: parse_duration(field("timeout"), DEFAULT_TIMEOUT, "wait_for_delete.timeout")?,
        poll_interval: parse_duration(
            field("poll_interval"),
            DEFAULT_POLL_INTERVAL,
            "wait_for_delete.poll_interval",
        )?,
    }))
}

fn parse_duration(value: Option<&str>, default: Duration, path: &str) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(s) => humantime::parse_duration(s)
            .map_err(|e| Error::invalid_attribute(path, format!("invalid duration {s:?}: {e}"))),
    }
}

/// Poll until every condition holds, evaluating them in order.
///
/// Each condition gets its own timeout, starting when the previous one was met.
/// The last poll happens at the deadline, however long the poll interval.
/// Returns the last object observed.
pub async fn wait_for(
    client: &DynamicClient,
    binding: &CrdBinding,
    id: &ResourceId,
    conditions: &[WaitCondition],
    mut object: Value,
) -> Result<Value> {
    for condition in conditions {
        let deadline = Instant::now() + condition.timeout;
        loop {
            if condition.is_met(&object) {
                debug!(
                    "{} {}: {} is {:?}",
                    binding.gvk,
                    id,
                    condition.jsonpath.expression(),
                    condition.value
                );
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::WaitTimeout {
                    jsonpath: condition.jsonpath.expression().to_string(),
                    expected: condition.value.clone(),
                    observed: condition.jsonpath.first(&object),
                    timeout: condition.timeout,
                });
            }

            trace!(
                "{} {}: waiting for {} to be {:?}",
                binding.gvk,
                id,
                condition.jsonpath.expression(),
                condition.value
            );
            sleep(condition.poll_interval.min(deadline - now)).await;
            object = client
                .get(binding, id)
                .await?
                .ok_or_else(|| Error::NotFound {
                    kind: binding.gvk.kind.clone(),
                    id: id.to_string(),
                })?;
        }
    }
    Ok(object)
}

/// Poll until the object is gone
pub async fn wait_for_deletion(
    client: &DynamicClient,
    binding: &CrdBinding,
    id: &ResourceId,
    wait: DeleteWait,
) -> Result<()> {
    let deadline = Instant::now() + wait.timeout;
    loop {
        if client.get(binding, id).await?.is_none() {
            debug!("{} {} is gone", binding.gvk, id);
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(Error::DeleteTimeout {
                id: id.to_string(),
                timeout: wait.timeout,
            });
        }
        sleep(wait.poll_interval.min(deadline - now)).await;
    }
}
