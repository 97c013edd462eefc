//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::DuplexStream;

use mirrorfeed::ingest::{IngestReader, IngestSource};
use mirrorfeed::notify::{Notifier, Record};
use mirrorfeed::RelayConfig;

/// Build a small but well-formed baseline JFIF frame
pub fn jpeg_frame(width: u16, height: u16, scan: &[u8]) -> Vec<u8> {
    let mut v = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    v.extend_from_slice(b"JFIF\0");
    v.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);

    let mut dqt = vec![0xFF, 0xDB, 0x00, 0x43, 0x00];
    dqt.extend_from_slice(&[0x10; 64]);
    v.extend(dqt);

    v.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
    v.extend_from_slice(&height.to_be_bytes());
    v.extend_from_slice(&width.to_be_bytes());
    v.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);

    v.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    v.extend_from_slice(scan);
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}

/// `count` distinct frames of the given size
pub fn frames(count: usize, width: u16, height: u16) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| jpeg_frame(width, height, &[i as u8, 0xFF, 0x00, 0x5A]))
        .collect()
}

/// What one open of a [`ScriptedSource`] yields
pub enum Open {
    /// A finite stream that ends after these bytes
    Bytes(Vec<u8>),
    /// The open itself fails
    Fail,
    /// A stream fed by the test through the other end of the duplex
    Live(DuplexStream),
}

/// Ingest source replaying a fixed script of opens
///
/// Once the script is exhausted further opens never complete, which parks
/// the producer.
#[derive(Clone)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Open>>>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Open>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source with a single live stream; returns the writing end
    pub fn live() -> (Self, DuplexStream) {
        let (feed, reader) = tokio::io::duplex(1 << 16);
        (Self::new(vec![Open::Live(reader)]), feed)
    }

    /// Number of open attempts so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl IngestSource for ScriptedSource {
    async fn open(&self) -> io::Result<IngestReader> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();

        match next {
            Some(Open::Bytes(bytes)) => Ok(Box::new(io::Cursor::new(bytes))),
            Some(Open::Fail) => Err(io::Error::new(io::ErrorKind::NotFound, "scripted failure")),
            Some(Open::Live(reader)) => Ok(Box::new(reader)),
            None => std::future::pending().await,
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Notifier keeping every published record
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    records: Arc<Mutex<Vec<Record>>>,
}

impl RecordingNotifier {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn of_type(&self, kind: &str) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.get("type").map(String::as_str) == Some(kind))
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    async fn publish(&self, record: &Record) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Config with short delays, bound to an ephemeral localhost port
pub fn fast_config() -> RelayConfig {
    RelayConfig::with_addr("127.0.0.1:0".parse().unwrap())
        .open_retry_delay(Duration::from_millis(20))
        .reopen_delay(Duration::from_millis(20))
        .handoff_poll_interval(Duration::from_millis(10))
        .session_id("test-session")
}

/// Poll `cond` until it holds, failing the test after five seconds
pub async fn wait_until<F: FnMut() -> bool>(what: &str, mut cond: F) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {what}");
}
