//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record how the
//! detector drives its collaborators.

#![allow(dead_code)]

use rrwatch_core::config::{AlertConfig, MonitorConfig, RecordQuery};
use rrwatch_core::error::{Error, Result};
use rrwatch_core::traits::{ChangeAlert, Notifier, Resolver};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A resolver that replays scripted answers
///
/// Each call pops the next answer; the last answer repeats once the
/// script is exhausted.
pub struct ScriptedResolver {
    answers: Arc<Mutex<VecDeque<Result<String>>>>,
    last: Arc<Mutex<Option<String>>>,
    resolve_call_count: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    /// A resolver that always returns `raw`
    pub fn answering(raw: &str) -> Self {
        Self::scripted(vec![Ok(raw.to_string())])
    }

    /// A resolver that is always unavailable
    pub fn unavailable() -> Self {
        Self::scripted(vec![Err(Error::resolution("connection timed out"))])
    }

    pub fn scripted(answers: Vec<Result<String>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into())),
            last: Arc::new(Mutex::new(None)),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times resolve() was called
    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedResolver that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            answers: Arc::clone(&other.answers),
            last: Arc::clone(&other.last),
            resolve_call_count: Arc::clone(&other.resolve_call_count),
        }
    }
}

#[async_trait::async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, _query: &RecordQuery) -> Result<String> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);

        let next = self.answers.lock().unwrap().pop_front();
        match next {
            Some(Ok(raw)) => {
                *self.last.lock().unwrap() = Some(raw.clone());
                Ok(raw)
            }
            Some(Err(e)) => {
                *self.last.lock().unwrap() = None;
                Err(e)
            }
            None => match self.last.lock().unwrap().clone() {
                Some(raw) => Ok(raw),
                None => Err(Error::resolution("script exhausted")),
            },
        }
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// A notifier that records alerts and can be told to reject them
pub struct RecordingNotifier {
    accept: Arc<Mutex<bool>>,
    notify_call_count: Arc<AtomicUsize>,
    alerts: Arc<Mutex<Vec<ChangeAlert>>>,
}

impl RecordingNotifier {
    /// A notifier whose relay accepts delivery
    pub fn accepting() -> Self {
        Self::new(true)
    }

    /// A notifier whose relay rejects delivery
    pub fn rejecting() -> Self {
        Self::new(false)
    }

    fn new(accept: bool) -> Self {
        Self {
            accept: Arc::new(Mutex::new(accept)),
            notify_call_count: Arc::new(AtomicUsize::new(0)),
            alerts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Switch between accepting and rejecting
    pub fn set_accept(&self, accept: bool) {
        *self.accept.lock().unwrap() = accept;
    }

    /// Get the number of times notify() was called
    pub fn notify_call_count(&self) -> usize {
        self.notify_call_count.load(Ordering::SeqCst)
    }

    /// Alerts that were delivered successfully
    pub fn delivered(&self) -> Vec<ChangeAlert> {
        self.alerts.lock().unwrap().clone()
    }

    /// Create a new RecordingNotifier that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            accept: Arc::clone(&other.accept),
            notify_call_count: Arc::clone(&other.notify_call_count),
            alerts: Arc::clone(&other.alerts),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &ChangeAlert) -> Result<()> {
        self.notify_call_count.fetch_add(1, Ordering::SeqCst);

        if !*self.accept.lock().unwrap() {
            return Err(Error::notify("550 relay rejected delivery"));
        }

        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// The record every contract test watches
pub fn watched_record() -> RecordQuery {
    RecordQuery::new("example.com", "TXT")
}

/// Store key of [`watched_record`]
pub fn watched_key() -> String {
    watched_record().store_key()
}

/// Helper to create a minimal MonitorConfig for testing
pub fn minimal_config() -> MonitorConfig {
    MonitorConfig::new(
        watched_record(),
        AlertConfig::new("rrwatch", "alerts@example.com"),
    )
}
