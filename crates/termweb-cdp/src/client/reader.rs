use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use base64::Engine as _;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::client::transport::Transport;
use crate::client::waiters::WaiterMap;
use crate::error::CdpError;
use crate::screencast::{ScreencastFrame, ScreencastRing};

/// An event with no registered waiter: a CDP notification such as
/// `Page.frameNavigated` or `Runtime.consoleAPICalled`. Unknown methods are
/// kept as the raw payload rather than dropped, per §9's duck-typed-JSON
/// design note.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub payload: Value,
}

pub struct ReaderHandles {
    pub transport: Arc<dyn Transport>,
    pub waiters: Arc<WaiterMap>,
    pub events_tx: Sender<CdpEvent>,
    pub screencast: Arc<ScreencastRing>,
    pub navigation_flag: Arc<AtomicBool>,
    pub screencast_restart_needed: Arc<AtomicBool>,
    pub next_id: Arc<AtomicU64>,
    pub stop: Arc<AtomicBool>,
}

const NAVIGATION_EVENTS: &[&str] = &["Page.frameNavigated", "Page.navigatedWithinDocument"];

/// Body of the dedicated CDP reader thread (§4.4, §5). Decodes frames and
/// classifies them into replies, events, or screencast frames; never takes
/// the writer mutex.
pub fn run(handles: ReaderHandles) {
    while !handles.stop.load(Ordering::SeqCst) {
        match handles.transport.recv_frame() {
            Ok(None) => continue,
            Ok(Some(bytes)) => handle_frame(&handles, &bytes),
            Err(CdpError::TransportClosed) => {
                warn!("cdp transport closed; reader thread stopping");
                break;
            }
            Err(e) => {
                warn!("cdp transport read error: {e}; reader thread stopping");
                break;
            }
        }
    }
    handles.waiters.cancel_all("transport closed");
}

fn handle_frame(handles: &ReaderHandles, bytes: &[u8]) {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            debug!("dropping malformed cdp frame: {e}");
            return;
        }
    };

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        handle_reply(handles, id, value);
        return;
    }

    let Some(method) = value.get("method").and_then(Value::as_str) else {
        debug!("dropping cdp frame with neither id nor method");
        return;
    };
    let method = method.to_string();
    let params = value.get("params").cloned().unwrap_or(Value::Null);

    if method == "Page.screencastFrame" {
        handle_screencast_frame(handles, &params);
        return;
    }

    if NAVIGATION_EVENTS.contains(&method.as_str()) {
        handles.navigation_flag.store(true, Ordering::SeqCst);
    }

    trace!(%method, "cdp event");
    let _ = handles.events_tx.send(CdpEvent { method, payload: params });
}

fn handle_reply(handles: &ReaderHandles, id: u64, value: Value) {
    let Some((method, tx)) = handles.waiters.take(id) else {
        trace!(id, "reply for unknown/expired waiter discarded");
        return;
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let _ = tx.send(Err(CdpError::Remote { method, message }));
        return;
    }

    let result = value.get("result").cloned().unwrap_or(Value::Null);
    let _ = tx.send(Ok(result));
}

fn handle_screencast_frame(handles: &ReaderHandles, params: &Value) {
    let parsed = parse_screencast_frame(handles.screencast.next_generation(), params);
    match parsed {
        Some(frame) => {
            let session_id = frame.session_id;
            handles.screencast.publish(frame);
            ack_screencast_frame(handles, session_id);
        }
        None => {
            debug!("malformed Page.screencastFrame; dropping frame");
            if handles.screencast.record_parse_failure() {
                warn!("three consecutive screencast parse failures; requesting restart");
                handles.screencast_restart_needed.store(true, Ordering::SeqCst);
            }
            // Chrome stalls the screencast stream until every delivered frame is
            // acked, parse failure or not. Fall back to the raw sessionId since
            // the typed parse didn't make it that far.
            if let Some(session_id) = params.get("sessionId").and_then(Value::as_i64) {
                ack_screencast_frame(handles, session_id);
            }
        }
    }
}

fn parse_screencast_frame(generation: u64, params: &Value) -> Option<ScreencastFrame> {
    let data_b64 = params.get("data")?.as_str()?;
    let data = base64::engine::general_purpose::STANDARD.decode(data_b64).ok()?;
    let metadata = params.get("metadata")?;
    let device_width = metadata.get("deviceWidth")?.as_f64()? as u32;
    let device_height = metadata.get("deviceHeight")?.as_f64()? as u32;
    let session_id = params.get("sessionId")?.as_i64()?;
    Some(ScreencastFrame {
        data,
        device_width,
        device_height,
        session_id,
        generation,
    })
}

/// Chrome must always receive an ack for a delivered screencast frame or it
/// stalls the stream; the reader thread sends it immediately on receipt
/// rather than waiting for the viewer to render (see DESIGN.md for why this
/// resolves the C4/C5 split more strictly than the viewer-side "ack on
/// drop" framing).
fn ack_screencast_frame(handles: &ReaderHandles, session_id: i64) {
    let id = handles.next_id.fetch_add(1, Ordering::SeqCst);
    let frame = serde_json::json!({
        "id": id,
        "method": "Page.screencastFrameAck",
        "params": { "sessionId": session_id },
    });
    let Ok(bytes) = serde_json::to_vec(&frame) else {
        return;
    };
    if let Err(e) = handles.transport.send_frame(&bytes) {
        warn!("failed to ack screencast frame {session_id}: {e}");
    }
}
