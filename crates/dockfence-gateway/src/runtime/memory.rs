//! In-process runtime backend.
//!
//! Behaves like the engine for everything this gateway relies on (id/name
//! resolution, state transitions, label filters, logs) and supports fault
//! injection for tests: an unavailable daemon and per-call latency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use futures_util::StreamExt;

use dockfence_core::model::request::normalize_port_key;
use dockfence_core::model::{HostBinding, UsageSample};

use super::{
    ContainerRecord, ContainerRuntime, CreateSpec, CreatedContainer, LogOptions, LogStream,
    RemoveOptions, RuntimeError, RuntimeResult,
};

#[derive(Debug, Clone)]
struct LogLine {
    stderr: bool,
    at: i64,
    text: String,
}

#[derive(Debug, Clone)]
struct Entry {
    record: ContainerRecord,
    logs: Vec<LogLine>,
    usage: UsageSample,
}

#[derive(Default)]
pub struct InMemoryRuntime {
    containers: DashMap<String, Entry>,
    missing_images: DashSet<String>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    seq: AtomicU64,
}

fn new_container_id() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following call fails as if the daemon were down.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Delay every following call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Creating from `image` fails with a missing-image error.
    pub fn mark_missing_image(&self, image: impl Into<String>) {
        self.missing_images.insert(image.into());
    }

    pub fn push_log(&self, id: &str, stderr: bool, line: impl Into<String>) {
        if let Some(mut e) = self.containers.get_mut(id) {
            e.logs.push(LogLine {
                stderr,
                at: Utc::now().timestamp(),
                text: line.into(),
            });
        }
    }

    pub fn set_usage(&self, id: &str, usage: UsageSample) {
        if let Some(mut e) = self.containers.get_mut(id) {
            e.usage = usage;
        }
    }

    /// Force a raw state, e.g. `paused`.
    pub fn set_state(&self, id: &str, state: &str) {
        if let Some(mut e) = self.containers.get_mut(id) {
            e.record.state = state.to_string();
        }
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Raw labels of a container regardless of ownership.
    pub fn labels_of(&self, id: &str) -> Option<BTreeMap<String, String>> {
        self.containers.get(id).map(|e| e.record.labels.clone())
    }

    async fn gate(&self) -> RuntimeResult<()> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    /// Exact id, then name, then unique id prefix.
    fn resolve(&self, reference: &str) -> RuntimeResult<String> {
        let not_found = || RuntimeError::NotFound(reference.to_string());
        if reference.is_empty() {
            return Err(not_found());
        }
        if self.containers.contains_key(reference) {
            return Ok(reference.to_string());
        }
        let wanted = reference.trim_start_matches('/');
        if let Some(e) = self.containers.iter().find(|e| e.record.name == wanted) {
            return Ok(e.key().clone());
        }
        let mut matches = self
            .containers
            .iter()
            .filter(|e| e.key().starts_with(reference))
            .map(|e| e.key().clone());
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(RuntimeError::Unexpected(format!(
                "multiple IDs found with provided prefix: {reference}"
            ))),
            _ => Err(not_found()),
        }
    }

    fn with_entry<T>(&self, reference: &str, f: impl FnOnce(&mut Entry) -> RuntimeResult<T>) -> RuntimeResult<T> {
        let id = self.resolve(reference)?;
        let mut entry = self
            .containers
            .get_mut(&id)
            .ok_or_else(|| RuntimeError::NotFound(reference.to_string()))?;
        f(&mut entry)
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn ping(&self) -> RuntimeResult<()> {
        self.gate().await
    }

    async fn create(&self, spec: CreateSpec) -> RuntimeResult<CreatedContainer> {
        self.gate().await?;
        let req = spec.request();
        if self.missing_images.contains(&req.image) {
            return Err(RuntimeError::ImageNotFound(req.image.clone()));
        }

        let name = match &req.name {
            Some(n) => n.clone(),
            None => format!("container_{}", self.seq.fetch_add(1, Ordering::SeqCst) + 1),
        };
        if self.containers.iter().any(|e| e.record.name == name) {
            return Err(RuntimeError::Conflict(format!(
                "container name {name} is already in use"
            )));
        }

        let mut ports = BTreeMap::new();
        for (key, spec) in &req.ports {
            let key = normalize_port_key(key).map_err(|e| RuntimeError::Unexpected(e.to_string()))?;
            let bindings = spec
                .bindings()
                .into_iter()
                .map(|b| HostBinding {
                    host_ip: b.host_ip,
                    host_port: b.host_port.to_string(),
                })
                .collect();
            ports.insert(key, bindings);
        }

        let id = new_container_id();
        let record = ContainerRecord {
            id: id.clone(),
            name: name.clone(),
            image: req.image.clone(),
            state: "created".into(),
            created: Some(Utc::now()),
            labels: req.labels.clone(),
            ports,
        };
        self.containers.insert(
            id.clone(),
            Entry {
                record,
                logs: Vec::new(),
                usage: UsageSample {
                    online_cpus: 1,
                    ..Default::default()
                },
            },
        );

        Ok(CreatedContainer {
            id,
            name,
            warnings: Vec::new(),
        })
    }

    async fn start(&self, id: &str) -> RuntimeResult<()> {
        self.gate().await?;
        self.with_entry(id, |e| match e.record.state.as_str() {
            "running" => Err(RuntimeError::NotModified),
            "paused" => Err(RuntimeError::Conflict(
                "cannot start a paused container, try unpause instead".into(),
            )),
            _ => {
                e.record.state = "running".into();
                Ok(())
            }
        })
    }

    async fn stop(&self, id: &str, _grace: Duration) -> RuntimeResult<()> {
        self.gate().await?;
        self.with_entry(id, |e| match e.record.state.as_str() {
            "running" | "paused" | "restarting" => {
                e.record.state = "exited".into();
                Ok(())
            }
            _ => Err(RuntimeError::NotModified),
        })
    }

    async fn restart(&self, id: &str, _grace: Duration) -> RuntimeResult<()> {
        self.gate().await?;
        self.with_entry(id, |e| {
            e.record.state = "running".into();
            Ok(())
        })
    }

    async fn remove(&self, id: &str, opts: RemoveOptions) -> RuntimeResult<()> {
        self.gate().await?;
        let full = self.resolve(id)?;
        let running = self
            .containers
            .get(&full)
            .map(|e| e.record.state == "running")
            .unwrap_or(false);
        if running && !opts.force {
            return Err(RuntimeError::Conflict(format!(
                "cannot remove running container {full}: stop it first or force"
            )));
        }
        self.containers
            .remove(&full)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn inspect(&self, id: &str) -> RuntimeResult<ContainerRecord> {
        self.gate().await?;
        self.with_entry(id, |e| Ok(e.record.clone()))
    }

    async fn list(&self, label_filters: &[String], all: bool) -> RuntimeResult<Vec<ContainerRecord>> {
        self.gate().await?;
        let wanted: Vec<(&str, &str)> = label_filters
            .iter()
            .map(|f| f.split_once('=').unwrap_or((f.as_str(), "")))
            .collect();

        let mut out: Vec<ContainerRecord> = self
            .containers
            .iter()
            .filter(|e| all || e.record.state == "running")
            .filter(|e| {
                wanted
                    .iter()
                    .all(|(k, v)| e.record.labels.get(*k).map(String::as_str) == Some(*v))
            })
            .map(|e| e.record.clone())
            .collect();
        out.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn logs(&self, id: &str, opts: LogOptions) -> RuntimeResult<LogStream> {
        self.gate().await?;
        let lines = self.with_entry(id, |e| {
            let mut picked: Vec<String> = e
                .logs
                .iter()
                .filter(|l| if l.stderr { opts.stderr } else { opts.stdout })
                .filter(|l| opts.since.map_or(true, |s| l.at >= s))
                .filter(|l| opts.until.map_or(true, |u| l.at <= u))
                .map(|l| format!("{}\n", l.text))
                .collect();
            if let Some(n) = opts.tail {
                let n = usize::try_from(n).unwrap_or(usize::MAX);
                let skip = picked.len().saturating_sub(n);
                picked.drain(..skip);
            }
            Ok(picked)
        })?;

        let chunks = lines.into_iter().map(|l| Ok(Bytes::from(l)));
        Ok(futures_util::stream::iter(chunks).boxed())
    }

    async fn stats(&self, id: &str) -> RuntimeResult<UsageSample> {
        self.gate().await?;
        self.with_entry(id, |e| Ok(e.usage.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_name_and_unique_prefix() {
        let rt = InMemoryRuntime::new();
        let mut record = ContainerRecord {
            id: "abcdef0123".into(),
            name: "web".into(),
            state: "created".into(),
            ..Default::default()
        };
        rt.containers.insert(
            record.id.clone(),
            Entry {
                record: record.clone(),
                logs: Vec::new(),
                usage: UsageSample::default(),
            },
        );
        record.id = "abc999".into();
        record.name = "db".into();
        rt.containers.insert(
            record.id.clone(),
            Entry {
                record,
                logs: Vec::new(),
                usage: UsageSample::default(),
            },
        );

        assert_eq!(rt.resolve("web").unwrap(), "abcdef0123");
        assert_eq!(rt.resolve("/db").unwrap(), "abc999");
        assert_eq!(rt.resolve("abcd").unwrap(), "abcdef0123");
        assert!(matches!(rt.resolve("abc"), Err(RuntimeError::Unexpected(_))));
        assert!(matches!(rt.resolve("fff"), Err(RuntimeError::NotFound(_))));
        assert!(rt.resolve("").is_err());
    }
}
