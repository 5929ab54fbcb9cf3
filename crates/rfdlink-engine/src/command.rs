//! Command/acknowledgment channel.
//!
//! A command is retransmitted until the receive loop sees its identifier
//! echoed back, or until the caller cancels it. There is no deadline: the
//! retry is indefinite by contract and [`CancelToken`] is the only way out
//! short of an acknowledgment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use rfdlink_protocol::CommandFrame;
use tracing::{debug, info, trace};

use crate::channel::SerialChannel;
use crate::config::CommandConfig;
use crate::error::{LinkError, LinkResult};

/// Cooperative cancellation flag, checked once per retransmission.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not canceled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a command send ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The identifier was echoed.
    Acknowledged {
        /// Time from the first write to the acknowledgment.
        elapsed: Duration,
        /// Number of times the frame was written.
        transmissions: u32,
    },
    /// The caller canceled before an acknowledgment arrived.
    Canceled {
        /// Number of times the frame was written.
        transmissions: u32,
    },
}

impl CommandOutcome {
    /// Whether the command was acknowledged.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, CommandOutcome::Acknowledged { .. })
    }
}

/// Outstanding identifier shared with the receive loop.
pub(crate) type Outstanding = Arc<Mutex<Option<String>>>;

/// Write side of the command channel.
pub(crate) struct CommandChannel {
    writer: Box<dyn SerialChannel>,
    outstanding: Outstanding,
    acks: Receiver<String>,
    config: CommandConfig,
}

impl CommandChannel {
    pub(crate) fn new(
        writer: Box<dyn SerialChannel>,
        outstanding: Outstanding,
        acks: Receiver<String>,
        config: CommandConfig,
    ) -> Self {
        CommandChannel {
            writer,
            outstanding,
            acks,
            config,
        }
    }

    pub(crate) fn set_config(&mut self, config: CommandConfig) {
        self.config = config;
    }

    pub(crate) fn outstanding(&self) -> Option<String> {
        self.outstanding.lock().clone()
    }

    /// Transmit `<identifier>?<command>!` until echoed or canceled.
    pub(crate) fn send(
        &mut self,
        identifier: &str,
        command: &str,
        cancel: &CancelToken,
    ) -> LinkResult<CommandOutcome> {
        let frame = CommandFrame::new(identifier, command)?;
        let bytes = frame.encode();
        let interval = self.config.retry_interval();

        // Echoes of an earlier, abandoned command must not count for this one.
        while self.acks.try_recv().is_ok() {}
        *self.outstanding.lock() = Some(frame.identifier().to_string());
        debug!(id = frame.identifier(), command = frame.body(), "command registered");

        let started = Instant::now();
        let mut transmissions = 0u32;

        let result = loop {
            if cancel.is_canceled() {
                info!(id = frame.identifier(), transmissions, "command canceled");
                break Ok(CommandOutcome::Canceled { transmissions });
            }

            if let Err(e) = self.writer.write_all(&bytes) {
                break Err(LinkError::Io(e));
            }
            transmissions += 1;
            trace!(id = frame.identifier(), transmissions, "command sent");

            match self.acks.recv_timeout(interval) {
                Ok(echoed) if echoed == frame.identifier() => {
                    let elapsed = started.elapsed();
                    info!(
                        id = frame.identifier(),
                        transmissions,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "command acknowledged"
                    );
                    break Ok(CommandOutcome::Acknowledged {
                        elapsed,
                        transmissions,
                    });
                }
                Ok(stale) => trace!(stale = %stale, "ignoring stale echo"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Err(LinkError::ListenerStopped),
            }
        };

        self.clear_outstanding(frame.identifier());
        result
    }

    fn clear_outstanding(&self, identifier: &str) {
        let mut outstanding = self.outstanding.lock();
        if outstanding.as_deref() == Some(identifier) {
            *outstanding = None;
        }
    }
}
