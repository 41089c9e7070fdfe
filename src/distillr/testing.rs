//! Scripted in-memory transport for unit tests

use super::client::Transport;
use super::error::{DistillrError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Get(String),
    Post(String, Value),
    Put(String, Vec<u8>, String),
}

/// Replays canned JSON replies per URL, in order. The last reply for a URL
/// repeats once the queue is down to one entry.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Value>>>,
    put_statuses: Mutex<HashMap<String, u16>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, url: &str, body: Value) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(body);
        self
    }

    pub fn put_status(self, url: &str, status: u16) -> Self {
        self.put_statuses
            .lock()
            .unwrap()
            .insert(url.to_string(), status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_gets(&self, url: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Get(u) if u == url))
            .count()
    }

    fn next_reply(&self, url: &str) -> Result<Value> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(url)
            .ok_or_else(|| DistillrError::server(url, "no scripted reply", None))?;
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap_or(Value::Null))
        } else {
            Ok(queue.front().cloned().unwrap_or(Value::Null))
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.calls.lock().unwrap().push(Call::Get(url.to_string()));
        self.next_reply(url)
    }

    async fn get_json_with_key(&self, url: &str, _api_key: &str) -> Result<Value> {
        self.get_json(url).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Post(url.to_string(), body.clone()));
        self.next_reply(url)
    }

    async fn put_bytes(&self, url: &str, body: Vec<u8>, content_type: &str) -> Result<u16> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Put(url.to_string(), body, content_type.to_string()));
        Ok(*self.put_statuses.lock().unwrap().get(url).unwrap_or(&200))
    }
}
