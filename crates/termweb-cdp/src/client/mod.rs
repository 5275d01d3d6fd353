mod reader;
mod transport;
mod waiters;

pub use reader::CdpEvent;
pub use transport::{PipeTransport, Transport, WebSocketTransport};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::CdpError;
use crate::screencast::ScreencastRing;
use reader::ReaderHandles;
use waiters::WaiterMap;

/// The C4 facade: a synchronous `send_command` over a framed transport,
/// backed by one dedicated reader OS thread. No async runtime is involved —
/// per §5 and §9, the viewer drives this from its own cooperative loop.
pub struct CdpClient {
    transport: Arc<dyn Transport>,
    next_id: Arc<AtomicU64>,
    waiters: Arc<WaiterMap>,
    events_rx: Mutex<Receiver<CdpEvent>>,
    write_mutex: Mutex<()>,
    navigation_flag: Arc<AtomicBool>,
    screencast_restart_needed: Arc<AtomicBool>,
    pub screencast: Arc<ScreencastRing>,
    stop: Arc<AtomicBool>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    default_timeout: Duration,
}

impl CdpClient {
    pub fn start(transport: Arc<dyn Transport>, default_timeout: Duration) -> Result<Self, CdpError> {
        let (events_tx, events_rx) = mpsc::channel();
        let waiters = Arc::new(WaiterMap::default());
        let screencast = Arc::new(ScreencastRing::default());
        let navigation_flag = Arc::new(AtomicBool::new(false));
        let screencast_restart_needed = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let next_id = Arc::new(AtomicU64::new(1));

        let handles = ReaderHandles {
            transport: transport.clone(),
            waiters: waiters.clone(),
            events_tx,
            screencast: screencast.clone(),
            navigation_flag: navigation_flag.clone(),
            screencast_restart_needed: screencast_restart_needed.clone(),
            next_id: next_id.clone(),
            stop: stop.clone(),
        };
        let reader_handle = std::thread::Builder::new()
            .name("termweb-cdp-reader".to_string())
            .spawn(move || reader::run(handles))
            .map_err(CdpError::Io)?;

        Ok(Self {
            transport,
            next_id,
            waiters,
            events_rx: Mutex::new(events_rx),
            write_mutex: Mutex::new(()),
            navigation_flag,
            screencast_restart_needed,
            screencast,
            stop,
            reader_handle: Mutex::new(Some(reader_handle)),
            default_timeout,
        })
    }

    pub fn send_command(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        self.send_command_timeout(method, params, self.default_timeout)
    }

    pub fn send_command_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, CdpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        self.waiters.register(id, method.to_string(), tx);

        let frame = serde_json::json!({ "id": id, "method": method, "params": params });
        let bytes = serde_json::to_vec(&frame)?;

        {
            let _write_guard = self
                .write_mutex
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Err(e) = self.transport.send_frame(&bytes) {
                self.waiters.take(id);
                return Err(e);
            }
        }

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => {
                self.waiters.take(id);
                Err(CdpError::Timeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Drains pending events, non-blocking. Called once per viewer tick.
    pub fn poll_events(&self, max: usize) -> Vec<CdpEvent> {
        let rx = self
            .events_rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out = Vec::new();
        while out.len() < max {
            match rx.try_recv() {
                Ok(event) => out.push(event),
                Err(_) => break,
            }
        }
        out
    }

    /// Reads and clears the "navigation happened" flag (§4.4).
    pub fn take_navigation_flag(&self) -> bool {
        self.navigation_flag.swap(false, Ordering::SeqCst)
    }

    /// Reads and clears the "screencast needs restart" flag, set by the
    /// reader thread after three consecutive frame-parse failures (§4.5).
    pub fn take_screencast_restart_needed(&self) -> bool {
        self.screencast_restart_needed.swap(false, Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.transport.close();
        self.waiters.cancel_all("client closed");
        let mut guard = self
            .reader_handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = guard.take()
            && let Err(e) = handle.join()
        {
            warn!("cdp reader thread panicked: {e:?}");
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.close();
    }
}
