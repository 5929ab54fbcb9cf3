//! Continuous receive loop.
//!
//! The loop owns the [`RadioPort`] while it runs. It reads one line at a time,
//! classifies it and dispatches the result to an [`EventSink`]. Stopping is
//! cooperative: the flag is checked between reads, so the loop ends within
//! one read timeout of [`Listener::stop`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rfdlink_protocol::Frame;
use tracing::{debug, info, trace, warn};

use crate::command::{CancelToken, CommandChannel, CommandOutcome, Outstanding};
use crate::config::CommandConfig;
use crate::error::{LinkError, LinkResult};
use crate::events::{EventSink, SinkResult};
use crate::port::RadioPort;

/// Pause after a transport error before reading again.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of a receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Built but not started.
    Idle,
    /// Reading and dispatching lines.
    Running,
    /// Finished; a new loop must be built to listen again.
    Stopped,
}

/// A receive loop that has not been started yet.
pub struct ReceiveLoop {
    port: RadioPort,
    sink: Box<dyn EventSink>,
    config: CommandConfig,
}

impl ReceiveLoop {
    /// Prepare a loop over `port` dispatching to `sink`.
    pub fn new(port: RadioPort, sink: impl EventSink + 'static) -> Self {
        ReceiveLoop {
            port,
            sink: Box::new(sink),
            config: CommandConfig::default(),
        }
    }

    /// Configure the command channel of the resulting listener.
    pub fn with_command_config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    /// Always [`ListenerState::Idle`]; starting consumes the loop.
    pub fn state(&self) -> ListenerState {
        ListenerState::Idle
    }

    /// Give the port back without starting.
    pub fn into_port(self) -> RadioPort {
        self.port
    }

    /// Spawn the loop thread.
    ///
    /// The port moves into the thread; it comes back from [`Listener::stop`].
    pub fn start(self) -> LinkResult<Listener> {
        let ReceiveLoop { port, sink, config } = self;

        let writer = port.writer()?;
        let outstanding: Outstanding = Arc::new(Mutex::new(None));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (ack_tx, ack_rx) = crossbeam_channel::unbounded();

        let worker = Worker {
            port,
            sink,
            outstanding: Arc::clone(&outstanding),
            acks: ack_tx,
            stop_flag: Arc::clone(&stop_flag),
        };
        let handle = thread::Builder::new()
            .name("rfd-receive".to_string())
            .spawn(move || worker.run())?;

        Ok(Listener {
            commands: CommandChannel::new(writer, outstanding, ack_rx, config),
            stop_flag,
            handle: Some(handle),
        })
    }
}

/// A running receive loop plus the command channel that depends on it.
pub struct Listener {
    commands: CommandChannel,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<RadioPort>>,
}

impl Listener {
    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        match &self.handle {
            Some(handle) if !handle.is_finished() => ListenerState::Running,
            _ => ListenerState::Stopped,
        }
    }

    /// Replace the command channel configuration.
    pub fn set_command_config(&mut self, config: CommandConfig) {
        self.commands.set_config(config);
    }

    /// Identifier currently awaiting its echo.
    pub fn outstanding_identifier(&self) -> Option<String> {
        self.commands.outstanding()
    }

    /// Send a command and retransmit it until acknowledged or canceled.
    ///
    /// Blocks the caller. Only one command can be outstanding because this
    /// borrows the listener mutably.
    pub fn send_command(
        &mut self,
        identifier: &str,
        command: &str,
        cancel: &CancelToken,
    ) -> LinkResult<CommandOutcome> {
        if self.state() != ListenerState::Running {
            return Err(LinkError::ListenerStopped);
        }
        self.commands.send(identifier, command, cancel)
    }

    /// Ask the loop to stop without waiting for it.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and take the port back.
    pub fn stop(mut self) -> LinkResult<RadioPort> {
        self.request_stop();
        let handle = self.handle.take().ok_or(LinkError::ListenerStopped)?;
        let port = handle.join().map_err(|_| LinkError::ListenerPanicked)?;
        info!(port = %port.name(), "receive loop stopped");
        Ok(port)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Loop Thread
// ============================================================================

struct Worker {
    port: RadioPort,
    sink: Box<dyn EventSink>,
    outstanding: Outstanding,
    acks: Sender<String>,
    stop_flag: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) -> RadioPort {
        info!(port = %self.port.name(), "receive loop started");
        if let Err(e) = self.port.clear_input() {
            warn!(error = %e, "failed to flush input");
        }

        while !self.stop_flag.load(Ordering::SeqCst) {
            match self.port.read_line() {
                Ok(Some(line)) => self.dispatch(&line),
                Ok(None) => trace!("no data"),
                Err(e) => {
                    warn!(error = %e, "read failed");
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        self.port
    }

    fn dispatch(&mut self, line: &str) {
        let outstanding = self.outstanding.lock().clone();
        let frame = Frame::classify(line, outstanding.as_deref());

        match &frame {
            Frame::Telemetry(record) => {
                debug!(time = %record.fix_time(), sats = record.satellite_count, "telemetry");
                let result = self.sink.on_telemetry(record);
                report("telemetry", result);
            }
            Frame::AcknowledgedIdentifier(identifier) => {
                {
                    let mut slot = self.outstanding.lock();
                    if slot.as_deref() == Some(identifier.as_str()) {
                        *slot = None;
                    }
                }
                debug!(id = %identifier, "identifier echoed");
                // The sender may already have given up on this command.
                let _ = self.acks.send(identifier.clone());
                let result = self.sink.on_identifier_ack(identifier);
                report("identifier ack", result);
            }
            Frame::PlainText(text) => {
                let result = self.sink.on_text(text);
                report("text", result);
                if let Some(message) = frame.payload_message() {
                    let result = self.sink.on_payload(&message);
                    report("payload", result);
                }
            }
            Frame::Malformed { line, error } => {
                warn!(line = %line, error = %error, "dropping malformed line");
            }
            Frame::Empty => trace!("dropping empty line"),
        }
    }
}

fn report(event: &str, result: SinkResult) {
    if let Err(e) = result {
        warn!(event, error = %e, "event sink failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LinkEvent;
    use crate::testing::{RecordingSink, ScriptedChannel};
    use rfdlink_protocol::TelemetryRecord;
    use std::time::Instant;

    struct FailingSink {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl EventSink for FailingSink {
        fn on_telemetry(&mut self, _record: &TelemetryRecord) -> SinkResult {
            Err("telemetry consumer broke".into())
        }

        fn on_text(&mut self, line: &str) -> SinkResult {
            self.seen.lock().push(line.to_string());
            Ok(())
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn idle_channel() -> ScriptedChannel {
        ScriptedChannel::new().with_idle_delay(Duration::from_millis(2))
    }

    #[test]
    fn test_lifecycle() {
        let channel = idle_channel();
        let receive_loop = ReceiveLoop::new(RadioPort::new(Box::new(channel)), RecordingSink::new());
        assert_eq!(receive_loop.state(), ListenerState::Idle);

        let listener = receive_loop.start().unwrap();
        assert_eq!(listener.state(), ListenerState::Running);

        let port = listener.stop().unwrap();
        assert_eq!(port.name(), "scripted");
    }

    #[test]
    fn test_sink_errors_do_not_stop_the_loop() {
        let channel = idle_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = FailingSink {
            seen: Arc::clone(&seen),
        };
        let listener = ReceiveLoop::new(RadioPort::new(Box::new(channel.clone())), sink)
            .start()
            .unwrap();

        // Let the start-up flush happen before feeding lines.
        wait_for(|| !channel.clears().is_empty());
        channel.push_inbound(b"GPS,1,2,3,4,5,6,7\nstill alive\n");

        wait_for(|| seen.lock().len() == 1);
        assert_eq!(listener.state(), ListenerState::Running);
        assert_eq!(seen.lock()[0], "still alive");
        listener.stop().unwrap();
    }

    #[test]
    fn test_malformed_and_empty_lines_are_dropped() {
        let channel = idle_channel();
        let sink = RecordingSink::new();
        let listener = ReceiveLoop::new(RadioPort::new(Box::new(channel.clone())), sink.clone())
            .start()
            .unwrap();

        wait_for(|| !channel.clears().is_empty());
        channel.push_inbound(b"GPS,1,2\n\r\n\nhello\n");

        wait_for(|| !sink.events().is_empty());
        listener.stop().unwrap();
        assert_eq!(sink.events(), vec![LinkEvent::Text("hello".to_string())]);
    }

    #[test]
    fn test_send_after_stop_request_fails() {
        let channel = idle_channel();
        let mut listener = ReceiveLoop::new(RadioPort::new(Box::new(channel.clone())), RecordingSink::new())
            .start()
            .unwrap();

        listener.request_stop();
        wait_for(|| listener.state() == ListenerState::Stopped);

        let err = listener
            .send_command("X1", "PING", &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, LinkError::ListenerStopped));
        assert!(channel.written().is_empty());
    }
}
