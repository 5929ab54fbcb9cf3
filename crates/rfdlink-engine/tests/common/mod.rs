//! Simulated camera payload shared by the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rfdlink_engine::testing::ScriptedChannel;
use rfdlink_engine::{ImageConfig, RadioPort};
use rfdlink_protocol::ChunkDigest;

/// Deterministic random image bytes.
pub fn image_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// Image config for tests: short deadlines, images under `dir`.
pub fn test_config(dir: &std::path::Path) -> ImageConfig {
    ImageConfig::default()
        .with_image_dir(dir)
        .with_ack_deadline(Duration::from_millis(300))
        .with_time_sync_deadline(Duration::from_millis(300))
        .with_settings_deadline(Duration::from_millis(300))
        .with_ping_deadline(Duration::from_millis(200))
        .with_body_deadline(Duration::from_millis(500))
        .with_notice_interval(Duration::from_millis(50))
}

/// What the simulated camera does.
#[derive(Debug, Clone)]
pub struct CameraScript {
    /// Image body as sent on the wire (base64 text).
    pub body: Vec<u8>,
    /// 15-byte file name sent before the most recent image.
    pub remote_name: String,
    /// Chunk size the camera starts with.
    pub chunk_size: usize,
    /// 1-based chunk transmissions whose body gets corrupted in transit.
    pub corrupt: Vec<u32>,
    /// Settings line answered to a query.
    pub settings_line: String,
    /// Image listing.
    pub listing: Vec<String>,
    /// Runtime data lines.
    pub runtime_data: Vec<String>,
    /// Remote clock line sent after a time-sync ack.
    pub clock: String,
    /// Whether image requests are acknowledged at all.
    pub acknowledge: bool,
    /// Whether pushed settings are confirmed.
    pub confirm_push: bool,
    /// Whether pings are echoed.
    pub echo_pings: bool,
}

impl CameraScript {
    /// A camera holding the base64 encoding of `image`.
    pub fn with_image(image: &[u8]) -> Self {
        CameraScript {
            body: STANDARD.encode(image).into_bytes(),
            remote_name: format!("{:<15}", "image0001"),
            chunk_size: 7000,
            corrupt: Vec::new(),
            settings_line: "650,450,-10,55,5,0,800".to_string(),
            listing: vec!["image0001.jpg".to_string(), "image0002.jpg".to_string()],
            runtime_data: vec!["uptime 5321".to_string(), "load 0.12".to_string()],
            clock: "12:34:56".to_string(),
            acknowledge: true,
            confirm_push: true,
            echo_pings: true,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn corrupt(mut self, transmissions: impl IntoIterator<Item = u32>) -> Self {
        self.corrupt = transmissions.into_iter().collect();
        self
    }
}

/// What the camera saw and sent.
#[derive(Debug, Default, Clone)]
pub struct CameraLog {
    /// Body length of every chunk transmission.
    pub chunk_lengths: Vec<usize>,
    /// Settings lines pushed to the camera.
    pub pushed: Vec<String>,
    /// Names requested with the named-image operation.
    pub requested_names: Vec<String>,
    /// Pings received.
    pub pings: u32,
}

struct Camera {
    script: CameraScript,
    log: Arc<Mutex<CameraLog>>,
    position: usize,
    chunk_size: usize,
    transmissions: u32,
    awaiting_name: bool,
}

impl Camera {
    fn respond(&mut self, data: &[u8]) -> Vec<u8> {
        let ack = if self.script.acknowledge { b"A".to_vec() } else { Vec::new() };
        match data {
            b"IMAGE;1!" if self.script.acknowledge => {
                self.restart();
                let mut out = ack;
                out.extend_from_slice(self.script.remote_name.as_bytes());
                out.extend(self.size_line());
                out.extend(self.next_chunk());
                out
            }
            b"IMAGE;3!" if self.script.acknowledge => {
                self.restart();
                self.awaiting_name = true;
                ack
            }
            b"IMAGE;2!" if self.script.acknowledge => {
                let mut out = ack;
                for entry in &self.script.listing {
                    out.extend_from_slice(entry.as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(b"X\n");
                out
            }
            b"IMAGE;4!" if self.script.acknowledge => {
                let mut out = ack;
                out.extend_from_slice(b"camera warming up\n");
                out.extend_from_slice(self.script.settings_line.as_bytes());
                out.extend_from_slice(b"\n");
                out
            }
            b"IMAGE;7!" if self.script.acknowledge => {
                let mut out = ack;
                for line in &self.script.runtime_data {
                    out.extend_from_slice(line.as_bytes());
                    out.extend_from_slice(b"\n");
                }
                out.extend_from_slice(b"\r\n");
                out
            }
            b"IMAGE;8!" if self.script.acknowledge => {
                let mut out = ack;
                out.extend_from_slice(self.script.clock.as_bytes());
                out.extend_from_slice(b"\n");
                out
            }
            b"IMAGE;0!" | b"IMAGE;5!" | b"IMAGE;6!" | b"IMAGE;9!" => ack,
            b"Y" => {
                self.position += self.current_len();
                if self.position < self.script.body.len() {
                    self.next_chunk()
                } else {
                    Vec::new()
                }
            }
            b"N" => {
                self.chunk_size = self.chunk_size.saturating_sub(1000).max(1000);
                b"sync".to_vec()
            }
            b"S" => self.next_chunk(),
            b"~" => {
                self.log.lock().pings += 1;
                if self.script.echo_pings {
                    b"~".to_vec()
                } else {
                    Vec::new()
                }
            }
            [b'B', name @ ..] if self.awaiting_name => {
                self.awaiting_name = false;
                let name = String::from_utf8_lossy(name).trim_end().to_string();
                self.log.lock().requested_names.push(name);
                let mut out = self.size_line();
                out.extend(self.next_chunk());
                out
            }
            [b'A', line @ ..] if line.ends_with(b"\n") => {
                let line = String::from_utf8_lossy(line).trim_end().to_string();
                self.log.lock().pushed.push(line);
                if self.script.confirm_push {
                    b"B".to_vec()
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    fn restart(&mut self) {
        self.position = 0;
        self.chunk_size = self.script.chunk_size;
    }

    fn size_line(&self) -> Vec<u8> {
        format!("{}\n", self.script.body.len()).into_bytes()
    }

    fn current_len(&self) -> usize {
        self.chunk_size
            .min(self.script.body.len().saturating_sub(self.position))
    }

    fn next_chunk(&mut self) -> Vec<u8> {
        let end = self.position + self.current_len();
        let mut body = self.script.body[self.position..end].to_vec();
        let mut out = ChunkDigest::compute(&body).as_bytes().to_vec();

        self.transmissions += 1;
        if self.script.corrupt.contains(&self.transmissions) {
            if let Some(first) = body.first_mut() {
                *first = b'*';
            }
        }
        self.log.lock().chunk_lengths.push(body.len());
        out.extend_from_slice(&body);
        out
    }
}

/// A radio port wired to a simulated camera.
pub struct SimulatedLink {
    pub port: RadioPort,
    pub wire: ScriptedChannel,
    pub log: Arc<Mutex<CameraLog>>,
}

impl SimulatedLink {
    pub fn new(script: CameraScript) -> Self {
        Self::with_idle_delay(script, Duration::from_millis(1))
    }

    pub fn with_idle_delay(script: CameraScript, idle_delay: Duration) -> Self {
        let log = Arc::new(Mutex::new(CameraLog::default()));
        let mut camera = Camera {
            chunk_size: script.chunk_size,
            script,
            log: Arc::clone(&log),
            position: 0,
            transmissions: 0,
            awaiting_name: false,
        };
        let wire = ScriptedChannel::with_responder(move |data| camera.respond(data))
            .with_idle_delay(idle_delay);
        SimulatedLink {
            port: RadioPort::new(Box::new(wire.clone())),
            wire,
            log,
        }
    }

    pub fn log(&self) -> CameraLog {
        self.log.lock().clone()
    }
}
