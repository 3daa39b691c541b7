// SPDX-License-Identifier: GPL-3.0-only

//! devd socket reader
//!
//! Lines are forwarded verbatim to the device tree thread; parsing happens
//! there so malformed input is logged next to the events it interleaves with.

use std::path::PathBuf;
use std::time::Duration;

use hal_core::{LoopEvent, LoopHandle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The peer closed the connection or the read failed.
    Disconnected,
    /// The event loop is gone; stop reading for good.
    LoopClosed,
}

/// Keep a connection to devd open, reconnecting after `reconnect_delay`
/// whenever it cannot be opened or drops.
pub async fn run_reader(socket: PathBuf, reconnect_delay: Duration, handle: LoopHandle) {
    loop {
        match UnixStream::connect(&socket).await {
            Ok(stream) => {
                info!("connected to {}", socket.display());
                if forward_lines(BufReader::new(stream), &handle).await == StreamEnd::LoopClosed {
                    return;
                }
                warn!("lost connection to {}", socket.display());
            }
            Err(e) => warn!("failed to connect to {}: {e}", socket.display()),
        }

        if handle.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

pub async fn forward_lines<R>(reader: R, handle: &LoopHandle) -> StreamEnd
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.is_empty() => {}
            Ok(Some(line)) => {
                if !handle.post(LoopEvent::Hotplug(line)) {
                    return StreamEnd::LoopClosed;
                }
            }
            Ok(None) => return StreamEnd::Disconnected,
            Err(e) => {
                warn!("devd read failed: {e}");
                return StreamEnd::Disconnected;
            }
        }
    }
}
