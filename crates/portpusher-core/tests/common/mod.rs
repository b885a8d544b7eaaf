//! Test doubles and common utilities for engine contract tests
//!
//! This module provides minimal test doubles that verify engine behavior
//! without talking to a real sidecar or torrent client.

#![allow(dead_code)]

use portpusher_core::config::EngineConfig;
use portpusher_core::error::{Error, Result};
use portpusher_core::traits::{PortPusher, PortSource, PushOutcome};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A port source that replays a script of answers, then repeats the last one
pub struct ScriptedPortSource {
    script: Mutex<VecDeque<Result<u16>>>,
    fallback: u16,
    pull_call_count: Arc<AtomicUsize>,
}

impl ScriptedPortSource {
    /// Always answer with `port`
    pub fn fixed(port: u16) -> Self {
        Self::scripted(Vec::new(), port)
    }

    /// Answer with each entry of `script` in turn, then with `fallback`
    pub fn scripted(script: Vec<Result<u16>>, fallback: u16) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            pull_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always fail as if the sidecar had no port
    pub fn unavailable() -> Self {
        Self::scripted(
            (0..64)
                .map(|_| Err(Error::unavailable("gluetun responded with port 0")))
                .collect(),
            0,
        )
    }

    pub fn pull_call_count(&self) -> usize {
        self.pull_call_count.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pull_call_count)
    }
}

#[async_trait::async_trait]
impl PortSource for ScriptedPortSource {
    async fn pull(&self) -> Result<u16> {
        self.pull_call_count.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(answer) => answer,
            None => Ok(self.fallback),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Shared log of which backend was pushed, in call order
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// A backend that behaves like a real client: it remembers its port and
/// only counts a write when the desired port differs
pub struct MockPusher {
    name: &'static str,
    current_port: Mutex<Option<u16>>,
    fail: bool,
    push_call_count: Arc<AtomicUsize>,
    write_call_count: Arc<AtomicUsize>,
    log: CallLog,
}

impl MockPusher {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            current_port: Mutex::new(None),
            fail: false,
            push_call_count: Arc::new(AtomicUsize::new(0)),
            write_call_count: Arc::new(AtomicUsize::new(0)),
            log: Arc::clone(log),
        }
    }

    /// A backend whose every push fails
    pub fn failing(name: &'static str, log: &CallLog) -> Self {
        Self {
            fail: true,
            ..Self::new(name, log)
        }
    }

    /// Start with a port already configured
    pub fn with_port(self, port: u16) -> Self {
        *self.current_port.lock().unwrap() = Some(port);
        self
    }

    pub fn push_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.push_call_count)
    }

    pub fn write_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.write_call_count)
    }
}

#[async_trait::async_trait]
impl PortPusher for MockPusher {
    async fn push(&self, desired: u16) -> Result<PushOutcome> {
        self.push_call_count.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(self.name);

        if self.fail {
            return Err(Error::status(format!("{} login", self.name), 401));
        }

        let mut current = self.current_port.lock().unwrap();
        if *current == Some(desired) {
            return Ok(PushOutcome::Unchanged { port: desired });
        }

        self.write_call_count.fetch_add(1, Ordering::SeqCst);
        let previous_port = current.replace(desired);
        Ok(PushOutcome::Pushed {
            previous_port,
            port: desired,
        })
    }

    fn backend_name(&self) -> &'static str {
        self.name
    }
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Engine config with distinguishable delays
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        delay_success_secs: 600,
        delay_error_secs: 300,
        event_channel_capacity: 100,
    }
}
