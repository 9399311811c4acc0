//! Connection reactor: owns the link and drives the lifecycle.
//!
//! One task per lifecycle, spawned by `SessionClient::connect` and stopped
//! only by `disconnect()` (cancellation token). The task loops:
//!
//! ```text
//! connecting ──ok──▶ connected ──closed / pongs missed──▶ disconnected ─┐
//!     ▲  └─failed──▶ error ──────────────────────────────────────────────┤
//!     └──────────────────── backoff[min(attempts, last)] ◀──────────────┘
//! ```
//!
//! While connected it interleaves caller commands, inbound frames and the
//! heartbeat in a single `select!` loop, so frames are handled strictly in
//! arrival order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use liveconf::ConnectionConfig;
use liveproto::{codec, Command, Inbound};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backoff::Backoff;
use crate::bus::EventBus;
use crate::status::{ConnectionState, ConnectionStatus, StatusEvent};
use crate::store::SessionStore;
use crate::transport::{Link, Transport};

/// Lower bound for the heartbeat period; a zero interval would spin.
const MIN_HEARTBEAT: Duration = Duration::from_millis(100);

/// Unanswered pings remembered when the liveness check is off.
const MAX_UNANSWERED_PINGS: usize = 8;

/// Process-wide state shared between the facade and the reactor.
#[derive(Default)]
pub(crate) struct Shared {
    pub status: ConnectionStatus,
    pub bus: EventBus,
    pub store: Arc<SessionStore>,
}

/// Command sent to the reactor task
#[derive(Debug)]
pub(crate) enum ReactorCommand {
    /// Transmit if connected, drop otherwise
    Send(Command),
    /// Skip the pending backoff and connect to this endpoint now
    ConnectNow(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ReactorSettings {
    pub name: String,
    pub heartbeat_interval: Duration,
    pub max_missed_pongs: u32,
    pub backoff: Backoff,
}

impl ReactorSettings {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            name: config.client_name.clone(),
            heartbeat_interval: config.heartbeat_interval().max(MIN_HEARTBEAT),
            max_missed_pongs: config.max_missed_pongs,
            backoff: Backoff::exponential(config.backoff_base(), config.backoff_max()),
        }
    }
}

/// Why a connected link ended.
enum LinkEnd {
    /// `disconnect()` or the facade went away
    Stopped,
    /// Peer closed, I/O error, or too many missed pongs
    Lost(String),
}

pub(crate) struct Reactor {
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    settings: ReactorSettings,
    endpoint: String,
    generation: u64,
    cmd_rx: mpsc::UnboundedReceiver<ReactorCommand>,
    cancel: CancellationToken,
}

impl Reactor {
    pub fn new(
        transport: Arc<dyn Transport>,
        shared: Arc<Shared>,
        settings: ReactorSettings,
        endpoint: String,
        generation: u64,
        cmd_rx: mpsc::UnboundedReceiver<ReactorCommand>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            shared,
            settings,
            endpoint,
            generation,
            cmd_rx,
            cancel,
        }
    }

    /// Move to a new state and publish it, unless this lifecycle is stale.
    ///
    /// The transition happens inside the status queue, so a concurrent
    /// `disconnect()` is delivered either before it (and this is skipped) or
    /// after it.
    fn enter(&self, event: StatusEvent) -> bool {
        self.shared.bus.status.publish_if(|| {
            if self.cancel.is_cancelled() || !self.shared.status.transition(self.generation, event.state) {
                return None;
            }
            match &event.message {
                Some(message) => info!("{}: {} ({})", self.settings.name, event.state, message),
                None => info!("{}: {}", self.settings.name, event.state),
            }
            Some(event)
        })
    }

    pub async fn run(mut self) {
        debug!("{}: Reactor task started", self.settings.name);

        'lifecycle: loop {
            self.drop_stale_commands();
            if !self.enter(StatusEvent::new(ConnectionState::Connecting)) {
                break;
            }

            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break 'lifecycle,
                result = self.transport.connect(&self.endpoint) => result,
            };

            match attempt {
                Ok(mut link) => {
                    info!("{}: Link open to {}", self.settings.name, self.endpoint);
                    let end = self.drive(&mut link).await;
                    link.close().await;
                    match end {
                        LinkEnd::Stopped => break 'lifecycle,
                        LinkEnd::Lost(reason) => {
                            warn!("{}: Link to {} lost: {}", self.settings.name, self.endpoint, reason);
                            let event = StatusEvent {
                                state: ConnectionState::Disconnected,
                                message: Some(reason),
                            };
                            if !self.enter(event) {
                                break 'lifecycle;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("{}: Connect to {} failed: {:#}", self.settings.name, self.endpoint, e);
                    if !self.enter(StatusEvent::error(format!("{:#}", e))) {
                        break 'lifecycle;
                    }
                }
            }

            if !self.backoff().await {
                break;
            }
        }

        debug!("{}: Reactor task exiting", self.settings.name);
    }

    /// Discard commands queued for a link that no longer exists.
    fn drop_stale_commands(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            match cmd {
                ReactorCommand::Send(command) => {
                    debug!("{}: Dropping stale {}", self.settings.name, command.kind());
                }
                ReactorCommand::ConnectNow(endpoint) => self.endpoint = endpoint,
            }
        }
    }

    /// Wait out the next backoff step. Returns false if the reactor should stop.
    async fn backoff(&mut self) -> bool {
        let Some(attempt) = self.shared.status.next_attempt(self.generation) else {
            return false;
        };
        let delay = self.settings.backoff.delay_for(attempt);
        info!(
            "{}: Reconnecting to {} in {:?} (attempt {})",
            self.settings.name,
            self.endpoint,
            delay,
            attempt + 1
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ReactorCommand::ConnectNow(endpoint)) => {
                        debug!("{}: Reconnect requested, skipping backoff", self.settings.name);
                        self.endpoint = endpoint;
                        return true;
                    }
                    Some(ReactorCommand::Send(command)) => {
                        debug!("{}: Not connected, dropping {}", self.settings.name, command.kind());
                    }
                    None => return false,
                },
                _ = &mut sleep => return true,
            }
        }
    }

    /// Run one open link until it ends.
    async fn drive(&mut self, link: &mut Box<dyn Link>) -> LinkEnd {
        if !self.enter(StatusEvent::new(ConnectionState::Connected)) {
            return LinkEnd::Stopped;
        }
        if let Err(e) = self.transmit(link, &Command::GetSession).await {
            return LinkEnd::Lost(format!("{:#}", e));
        }

        let period = self.settings.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Unanswered pings, oldest first: (echoed timestamp, send instant)
        let mut pending: VecDeque<(i64, Instant)> = VecDeque::new();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return LinkEnd::Stopped,

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ReactorCommand::Send(command)) => {
                        if let Err(e) = self.transmit(link, &command).await {
                            return LinkEnd::Lost(format!("{:#}", e));
                        }
                    }
                    Some(ReactorCommand::ConnectNow(_)) => {
                        trace!("{}: Already connected", self.settings.name);
                    }
                    None => return LinkEnd::Stopped,
                },

                frame = link.recv() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text, &mut pending),
                    Some(Err(e)) => return LinkEnd::Lost(format!("{:#}", e)),
                    None => return LinkEnd::Lost("closed by peer".to_string()),
                },

                _ = heartbeat.tick() => {
                    let missed = pending.len() as u32;
                    if missed > 0 {
                        debug!("{}: {} pong(s) outstanding", self.settings.name, missed);
                        if self.settings.max_missed_pongs > 0 && missed >= self.settings.max_missed_pongs {
                            return LinkEnd::Lost(format!("{} consecutive pongs missed", missed));
                        }
                    }

                    let ping = Command::ping();
                    if let Err(e) = self.transmit(link, &ping).await {
                        return LinkEnd::Lost(format!("{:#}", e));
                    }
                    if let Command::Ping { timestamp } = ping {
                        pending.push_back((timestamp, Instant::now()));
                    }
                    // With the check on, the link is lost before this bound matters
                    if self.settings.max_missed_pongs == 0 && pending.len() > MAX_UNANSWERED_PINGS {
                        pending.pop_front();
                    }
                }
            }
        }
    }

    async fn transmit(&self, link: &mut Box<dyn Link>, command: &Command) -> anyhow::Result<()> {
        let frame = match codec::encode(command) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{}: {}", self.settings.name, e);
                return Ok(());
            }
        };
        match command.correlation_id() {
            Some(id) => debug!("{}: → {} ({})", self.settings.name, command.kind(), id),
            None => trace!("{}: → {}", self.settings.name, command.kind()),
        }
        link.send(frame).await
    }

    fn handle_frame(&self, text: &str, pending: &mut VecDeque<(i64, Instant)>) {
        let Some(inbound) = codec::decode_frame(text) else {
            return;
        };
        if self.cancel.is_cancelled() {
            return;
        }
        trace!("{}: ← {}", self.settings.name, inbound.kind());

        match inbound {
            Inbound::SessionState { session } => {
                self.shared.bus.session.publish(&Arc::new(session));
            }
            Inbound::ParameterDelta(delta) => {
                self.shared.bus.delta.publish(&delta);
            }
            Inbound::Ack(ack) => {
                let outcome = self.shared.store.apply_ack(&ack.path, &ack.value);
                debug!(
                    "{}: Ack {} = {} ({:?}) -> {:?}",
                    self.settings.name, ack.path, ack.value, ack.id, outcome
                );
            }
            Inbound::Pong { timestamp } => {
                let sent = match timestamp.and_then(|ts| pending.iter().position(|(t, _)| *t == ts)) {
                    Some(pos) => pending.get(pos).map(|(_, at)| *at),
                    None => pending.front().map(|(_, at)| *at),
                };
                pending.clear();

                match sent {
                    Some(sent) => {
                        let latency = Instant::now().saturating_duration_since(sent);
                        self.shared.status.record_pong(self.generation, latency);
                        debug!("{}: Heartbeat latency {:?}", self.settings.name, latency);
                        self.shared.bus.latency.publish(&latency);
                    }
                    None => debug!("{}: Unsolicited pong", self.settings.name),
                }
            }
            Inbound::Error { message } => {
                let count = self.shared.status.record_peer_error();
                warn!("{}: Bridge error #{}: {}", self.settings.name, count, message);
            }
            Inbound::Unknown { kind } => {
                debug!("{}: Ignoring {}", self.settings.name, kind);
            }
        }
    }
}
