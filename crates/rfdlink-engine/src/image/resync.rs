//! Stream realignment after a rejected chunk.

use rfdlink_protocol::{SYNC_ACK, SYNC_SENTINEL};
use tracing::debug;

use crate::error::LinkResult;
use crate::port::RadioPort;

/// How a resync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// The sentinel was found.
    Recovered,
    /// The link went idle first.
    Abandoned,
}

/// Scan for the `sync` sentinel, then answer with `S` and flush both buffers.
///
/// The scan keeps a 4-byte window and ends on the sentinel or on the first
/// idle read, so it never blocks longer than one read timeout past the last
/// byte received. The acknowledgment and flush happen in both cases.
pub fn resync(port: &mut RadioPort) -> LinkResult<ResyncOutcome> {
    let mut window = [0u8; 4];
    let mut seen = 0usize;
    let mut skipped = 0usize;

    let outcome = loop {
        match port.read_byte()? {
            Some(byte) => {
                window.copy_within(1.., 0);
                window[window.len() - 1] = byte;
                seen += 1;
                if seen >= window.len() && &window == SYNC_SENTINEL {
                    break ResyncOutcome::Recovered;
                }
                skipped += 1;
            }
            None => break ResyncOutcome::Abandoned,
        }
    };

    port.write(&[SYNC_ACK])?;
    port.clear_input()?;
    port.clear_output()?;
    debug!(?outcome, skipped, "resync finished");
    Ok(outcome)
}
