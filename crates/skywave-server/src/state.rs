//! Shared process state: the subscriber registry, per-IP connection limit,
//! and the channel the websocket handler uses to hand commands to the
//! pipeline worker (`orchestrator`). The worker thread owns the DSP engine,
//! scanner and POCSAG decoder exclusively; `AppState` never touches them
//! directly (spec §4.F/§5 single-owner worker).

use axum::extract::ws::Message;
use dashmap::DashMap;
use skywave_core::config::Config;
use skywave_core::protocol::ClientCommand;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type ClientId = u64;
pub type ClientSender = mpsc::Sender<Message>;

const CLIENT_CHANNEL_CAPACITY: usize = 64;

pub struct AppState {
    pub cfg: Config,
    pub html_root: String,
    pub clients: DashMap<ClientId, ClientSender>,
    pub command_tx: mpsc::UnboundedSender<(ClientId, ClientCommand)>,
    next_client_id: AtomicU64,
    ws_ip_counts: DashMap<IpAddr, usize>,
}

impl AppState {
    pub fn new(
        cfg: Config,
        html_root: String,
        command_tx: mpsc::UnboundedSender<(ClientId, ClientCommand)>,
    ) -> Self {
        Self {
            cfg,
            html_root,
            clients: DashMap::new(),
            command_tx,
            next_client_id: AtomicU64::new(1),
            ws_ip_counts: DashMap::new(),
        }
    }

    pub fn alloc_client_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn new_client_channel(&self) -> (ClientSender, mpsc::Receiver<Message>) {
        mpsc::channel(CLIENT_CHANNEL_CAPACITY)
    }

    /// Reserves a connection slot for `ip`, returning `None` once
    /// `limits.ws_per_ip` is already in use. The returned guard releases
    /// the slot on drop.
    pub fn try_acquire_ws_ip(self: &Arc<Self>, ip: IpAddr) -> Option<WsIpGuard> {
        let mut count = self.ws_ip_counts.entry(ip).or_insert(0);
        if *count >= self.cfg.limits.ws_per_ip {
            return None;
        }
        *count += 1;
        Some(WsIpGuard {
            state: Arc::clone(self),
            ip,
        })
    }

    /// Non-blocking fan-out to every connected subscriber: drop-newest on a
    /// full per-client channel, mirroring `IqQueue`'s contract (spec §4.F).
    pub fn broadcast(&self, msg: Message) {
        for entry in self.clients.iter() {
            let _ = entry.value().try_send(msg.clone());
        }
    }
}

pub struct WsIpGuard {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl Drop for WsIpGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.state.ws_ip_counts.get_mut(&self.ip) {
            *count = count.saturating_sub(1);
        }
    }
}
