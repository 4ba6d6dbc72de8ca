//! Bus supervisor actor
//!
//! This module provides the async actor that owns the bus connection. All
//! frame traffic and registry mutation happens in this actor, so callers
//! interact with the bus purely through channels.
//!
//! The actor runs a connection lifecycle: connect, then pump frames until
//! the stream fails, then retry at the configured interval. Terminal
//! configuration errors (a serial port that does not exist) stop the retry
//! loop instead of hammering a hopeless endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use pbus_link::{BusHandle, TcpConnector};
//! use std::time::Duration;
//!
//! let connector = TcpConnector::new("10.0.0.12:8234".to_string());
//! let (handle, mut events, _task) = BusHandle::spawn(connector, Duration::from_secs(15));
//!
//! // Send frames and receive events
//! ```

use std::time::Duration;

use pbus_protocol::{Frame, FrameReader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::events::{LinkEvent, LinkState};
use crate::registry::{FrameConsumer, ListenerRegistry};
use crate::sender::PacedSender;
use crate::transport::Connector;

/// Commands sent to the bus supervisor actor
pub enum BusCommand {
    /// Queue a frame for transmission
    Send(Frame),

    /// Claim a module address for a consumer
    Register {
        /// Bus address to claim
        address: u8,
        /// Consumer that receives frames for this address
        consumer: Box<dyn FrameConsumer>,
    },

    /// Release a module address
    Unregister {
        /// Bus address to release
        address: u8,
    },

    /// Install the catch-all consumer for unclaimed addresses
    SetCatchAll(Box<dyn FrameConsumer>),

    /// Remove the catch-all consumer
    ClearCatchAll,

    /// Query the current connection state
    QueryState(oneshot::Sender<LinkState>),

    /// Shutdown the actor
    Shutdown,
}

impl std::fmt::Debug for BusCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusCommand::Send(frame) => f.debug_tuple("Send").field(frame).finish(),
            BusCommand::Register { address, .. } => {
                f.debug_struct("Register").field("address", address).finish()
            }
            BusCommand::Unregister { address } => {
                f.debug_struct("Unregister").field("address", address).finish()
            }
            BusCommand::SetCatchAll(_) => f.write_str("SetCatchAll"),
            BusCommand::ClearCatchAll => f.write_str("ClearCatchAll"),
            BusCommand::QueryState(_) => f.write_str("QueryState"),
            BusCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Why the online phase ended
enum PhaseEnd {
    /// The stream failed; the supervisor should reconnect
    ConnectionLost(String),
    /// Shutdown was requested or the command channel closed
    Stop,
}

/// Internal state for the bus supervisor
struct BusActor<C: Connector> {
    connector: C,
    reconnect_interval: Duration,
    cmd_rx: mpsc::Receiver<BusCommand>,
    event_tx: mpsc::Sender<LinkEvent>,
    registry: ListenerRegistry,
    pacer: PacedSender,
    reader: FrameReader,
    state: LinkState,
}

impl<C: Connector> BusActor<C> {
    fn new(
        connector: C,
        reconnect_interval: Duration,
        cmd_rx: mpsc::Receiver<BusCommand>,
        event_tx: mpsc::Sender<LinkEvent>,
    ) -> Self {
        Self {
            connector,
            reconnect_interval,
            cmd_rx,
            event_tx,
            registry: ListenerRegistry::new(),
            pacer: PacedSender::new(),
            reader: FrameReader::new(),
            state: LinkState::Disconnected,
        }
    }

    /// Run the connection lifecycle until shutdown
    async fn run(mut self) {
        info!("bus supervisor started");

        loop {
            self.state = LinkState::Connecting;

            match self.connector.connect().await {
                Ok(stream) => {
                    self.state = LinkState::Online;
                    self.reader.reset();
                    let _ = self.event_tx.send(LinkEvent::Online).await;
                    info!("bus connection established");

                    match self.run_online(stream).await {
                        PhaseEnd::ConnectionLost(reason) => {
                            warn!("bus connection lost: {}", reason);
                            self.pacer.clear();
                            let _ = self.event_tx.send(LinkEvent::Offline { reason }).await;
                        }
                        PhaseEnd::Stop => break,
                    }
                }
                Err(e) => {
                    let terminal = e.is_terminal();
                    warn!("bus connection failed: {}", e);
                    let _ = self
                        .event_tx
                        .send(LinkEvent::ConnectFailed {
                            reason: e.to_string(),
                            terminal,
                        })
                        .await;

                    if terminal {
                        // No interval will make a bad config connect
                        if self.run_parked().await {
                            continue;
                        }
                        break;
                    }
                }
            }

            if self.reconnect_interval.is_zero() {
                info!("reconnection disabled; bus staying offline");
                if self.run_parked().await {
                    continue;
                }
                break;
            }

            self.state = LinkState::Reconnecting;
            if !self.wait_for_retry().await {
                break;
            }
        }

        info!("bus supervisor stopped");
    }

    /// Pump frames over a connected stream until it fails or we stop
    async fn run_online(&mut self, stream: C::Stream) -> PhaseEnd {
        let (mut read_half, mut write_half) = tokio::io::split(stream);
        let mut read_buf = [0u8; 1024];

        loop {
            let write_deadline = self.pacer.next_deadline();

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { return PhaseEnd::Stop; };
                    match cmd {
                        BusCommand::Send(frame) => {
                            self.pacer.enqueue(frame);
                        }
                        BusCommand::Shutdown => return PhaseEnd::Stop,
                        other => self.apply_registry_command(other),
                    }
                }

                result = read_half.read(&mut read_buf) => {
                    match result {
                        Ok(0) => {
                            return PhaseEnd::ConnectionLost(
                                "connection closed by peer".to_string(),
                            );
                        }
                        Ok(n) => {
                            self.reader.push_bytes(&read_buf[..n]);
                            while let Some(frame) = self.reader.next_frame() {
                                debug!("received {}", frame);
                                self.registry.dispatch(frame);
                            }
                        }
                        Err(e) => {
                            return PhaseEnd::ConnectionLost(format!("read failed: {}", e));
                        }
                    }
                }

                _ = sleep_until(write_deadline.unwrap_or_else(Instant::now)),
                        if write_deadline.is_some() => {
                    if let Some(frame) = self.pacer.begin_write() {
                        debug!("sending {}", frame);
                        if let Err(e) = write_half.write_all(frame.as_bytes()).await {
                            return PhaseEnd::ConnectionLost(format!("write failed: {}", e));
                        }
                        if let Err(e) = write_half.flush().await {
                            return PhaseEnd::ConnectionLost(format!("flush failed: {}", e));
                        }
                    }
                }
            }
        }
    }

    /// Wait out the reconnection interval while still serving commands
    ///
    /// Returns false when the actor should stop.
    async fn wait_for_retry(&mut self) -> bool {
        let mut retry = interval_at(Instant::now() + self.reconnect_interval, self.reconnect_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { return false; };
                    match cmd {
                        BusCommand::Shutdown => return false,
                        other => self.apply_registry_command(other),
                    }
                }
                _ = retry.tick() => {
                    info!("retrying bus connection");
                    return true;
                }
            }
        }
    }

    /// Serve commands while permanently offline
    ///
    /// Returns true only if a future command should resume connecting.
    /// Today nothing resumes a parked bus, so this returns false on
    /// shutdown or channel close.
    async fn run_parked(&mut self) -> bool {
        self.state = LinkState::Disconnected;
        loop {
            let Some(cmd) = self.cmd_rx.recv().await else {
                return false;
            };
            match cmd {
                BusCommand::Shutdown => return false,
                other => self.apply_registry_command(other),
            }
        }
    }

    /// Handle the commands that are valid in every phase
    fn apply_registry_command(&mut self, cmd: BusCommand) {
        match cmd {
            BusCommand::Register { address, consumer } => {
                self.registry.register(address, consumer);
            }
            BusCommand::Unregister { address } => {
                self.registry.unregister(address);
            }
            BusCommand::SetCatchAll(consumer) => {
                self.registry.set_catch_all(consumer);
            }
            BusCommand::ClearCatchAll => {
                self.registry.clear_catch_all();
            }
            BusCommand::QueryState(reply) => {
                let _ = reply.send(self.state);
            }
            BusCommand::Send(frame) => {
                debug!("bus offline; dropping frame for address {}", frame.address());
            }
            BusCommand::Shutdown => {}
        }
    }
}

/// Cloneable handle for talking to a running bus supervisor
#[derive(Clone)]
pub struct BusHandle {
    cmd_tx: mpsc::Sender<BusCommand>,
}

impl BusHandle {
    /// Spawn a supervisor for the given connector
    ///
    /// Returns the handle, the event stream, and the actor task. A zero
    /// `reconnect_interval` disables reconnection.
    pub fn spawn<C: Connector>(
        connector: C,
        reconnect_interval: Duration,
    ) -> (
        BusHandle,
        mpsc::Receiver<LinkEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);

        let actor = BusActor::new(connector, reconnect_interval, cmd_rx, event_tx);
        let task = tokio::spawn(actor.run());

        (BusHandle { cmd_tx }, event_rx, task)
    }

    /// Queue a frame for transmission
    pub async fn send_frame(&self, frame: Frame) -> Result<(), LinkError> {
        self.send(BusCommand::Send(frame)).await
    }

    /// Claim an address for a consumer
    pub async fn register(
        &self,
        address: u8,
        consumer: Box<dyn FrameConsumer>,
    ) -> Result<(), LinkError> {
        self.send(BusCommand::Register { address, consumer }).await
    }

    /// Release an address
    pub async fn unregister(&self, address: u8) -> Result<(), LinkError> {
        self.send(BusCommand::Unregister { address }).await
    }

    /// Install the catch-all consumer
    pub async fn set_catch_all(&self, consumer: Box<dyn FrameConsumer>) -> Result<(), LinkError> {
        self.send(BusCommand::SetCatchAll(consumer)).await
    }

    /// Remove the catch-all consumer
    pub async fn clear_catch_all(&self) -> Result<(), LinkError> {
        self.send(BusCommand::ClearCatchAll).await
    }

    /// Ask the supervisor for its current connection state
    pub async fn state(&self) -> Result<LinkState, LinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(BusCommand::QueryState(reply_tx)).await?;
        reply_rx.await.map_err(|_| LinkError::ChannelClosed)
    }

    /// Stop the supervisor
    pub async fn shutdown(&self) -> Result<(), LinkError> {
        self.send(BusCommand::Shutdown).await
    }

    async fn send(&self, cmd: BusCommand) -> Result<(), LinkError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| LinkError::ChannelClosed)
    }
}
