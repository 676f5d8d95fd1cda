//! Mastership arbitration over the P4Runtime stream channel.
//!
//! A session owns one `StreamChannel`. It sends the initial mastership
//! claim, reads the device's arbitration reply, and keeps re-sending the
//! same claim from a background task for as long as it is open.
//!
//! All outbound messages go through a single bounded queue whose receiver
//! is the request body of the gRPC call, so the transport has exactly one
//! writer. The foreground only ever enqueues the first claim.
//!
//! ```text
//! Opening -> AwaitingArbitration -> Primary -> Closed
//!                               \-> Backup  -> Closed
//! ```

use crate::config::ArbitrationConfig;
use crate::error::{P4rtError, Result};
use futures::StreamExt;
use p4rt_proto::p4runtime::{
    MasterArbitrationUpdate, StreamMessageRequest, stream_message_request, stream_message_response,
};
use p4rt_proto::{InboundStream, P4RuntimeApi, rpc};
use p4rt_types::{DeviceId, ElectionId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// `google.rpc.Code.UNAVAILABLE`, reported when the stream is lost.
const CODE_UNAVAILABLE: i32 = 14;

/// Arbitration outcome reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrationStatus {
    /// Canonical `google.rpc.Code`; 0 means this controller is primary.
    pub code: i32,
    pub message: String,
}

impl ArbitrationStatus {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.code == 0
    }

    pub fn canonical_code(&self) -> tonic::Code {
        tonic::Code::from_i32(self.code)
    }

    /// Status published when the stream to the device is gone.
    fn lost(reason: impl Into<String>) -> Self {
        Self::new(CODE_UNAVAILABLE, reason)
    }
}

/// An absent status decodes as the proto default, code 0.
impl From<Option<rpc::Status>> for ArbitrationStatus {
    fn from(status: Option<rpc::Status>) -> Self {
        let status = status.unwrap_or_default();
        Self::new(status.code, status.message)
    }
}

impl fmt::Display for ArbitrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.canonical_code())
        } else {
            write!(f, "{}: {}", self.canonical_code(), self.message)
        }
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    AwaitingArbitration,
    Primary,
    Backup,
    Closed,
}

/// Stream and timing parameters of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub reinforce_interval: Duration,
    pub send_queue_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ArbitrationConfig::default())
    }
}

impl From<&ArbitrationConfig> for SessionOptions {
    fn from(config: &ArbitrationConfig) -> Self {
        Self {
            reinforce_interval: Duration::from_secs(config.reinforce_interval_secs),
            send_queue_depth: config.send_queue_depth.max(1),
        }
    }
}

/// Builds the mastership claim for the default role.
pub fn claim(device_id: DeviceId, election_id: ElectionId) -> StreamMessageRequest {
    StreamMessageRequest {
        update: Some(stream_message_request::Update::Arbitration(
            MasterArbitrationUpdate {
                device_id: device_id.as_u64(),
                role: None,
                election_id: Some(election_id.into()),
                status: None,
            },
        )),
    }
}

/// One controller's mastership session with one device.
pub struct ArbitrationSession {
    device_id: DeviceId,
    election_id: ElectionId,
    state: SessionState,
    outbound: Option<mpsc::Sender<StreamMessageRequest>>,
    /// Never locked; reached through `get_mut`/`into_inner`. Keeps the
    /// session `Sync`.
    inbound: Option<Mutex<InboundStream>>,
    mastership: Option<watch::Receiver<ArbitrationStatus>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    claims_sent: Arc<AtomicU64>,
}

impl ArbitrationSession {
    /// Opens the stream channel and sends the initial claim.
    ///
    /// Reinforcement starts immediately: the first repeat claim goes out one
    /// `reinforce_interval` after open.
    pub async fn open<D>(
        device: &D,
        device_id: DeviceId,
        election_id: ElectionId,
        options: SessionOptions,
    ) -> Result<Self>
    where
        D: P4RuntimeApi + ?Sized,
    {
        let mut state = SessionState::Opening;
        debug!(%device_id, %election_id, ?state, "Opening stream channel");

        let (tx, rx) = mpsc::channel(options.send_queue_depth.max(1));
        let first_claim = claim(device_id, election_id);
        tx.send(first_claim.clone())
            .await
            .map_err(|_| P4rtError::Connection("outbound queue closed before open".to_string()))?;

        let inbound = device
            .stream_channel(ReceiverStream::new(rx))
            .await
            .map_err(|status| P4rtError::connection("StreamChannel", &status))?;

        let claims_sent = Arc::new(AtomicU64::new(1));
        let cancel = CancellationToken::new();
        let reinforcer = tokio::spawn(reinforce(
            tx.clone(),
            first_claim,
            options.reinforce_interval,
            cancel.clone(),
            claims_sent.clone(),
        ));

        state = SessionState::AwaitingArbitration;
        info!(%device_id, %election_id, "Sent mastership claim");

        Ok(Self {
            device_id,
            election_id,
            state,
            outbound: Some(tx),
            inbound: Some(Mutex::new(inbound)),
            mastership: None,
            cancel,
            tasks: vec![reinforcer],
            claims_sent,
        })
    }

    /// Waits for the device's answer to the claim.
    ///
    /// Not being elected is reported as a non-primary status, not an error.
    pub async fn await_primary(&mut self) -> Result<ArbitrationStatus> {
        if self.state != SessionState::AwaitingArbitration {
            return Err(P4rtError::Protocol(format!(
                "arbitration reply awaited in state {:?}",
                self.state
            )));
        }
        let Some(inbound) = self.inbound.as_mut().map(Mutex::get_mut) else {
            return Err(P4rtError::Protocol("stream read side already taken".to_string()));
        };

        let first = inbound.next().await;
        let update = match first {
            Some(Ok(response)) => match response.update {
                Some(stream_message_response::Update::Arbitration(update)) => update,
                _ => {
                    let kind = response.kind();
                    self.shutdown();
                    return Err(P4rtError::Protocol(format!(
                        "expected arbitration update, got {} message",
                        kind
                    )));
                }
            },
            Some(Err(status)) => {
                self.shutdown();
                return Err(P4rtError::connection("StreamChannel", &status));
            }
            None => {
                self.shutdown();
                return Err(P4rtError::Protocol(
                    "stream closed before arbitration reply".to_string(),
                ));
            }
        };

        let status = ArbitrationStatus::from(update.status);
        if status.is_primary() {
            self.state = SessionState::Primary;
            info!(
                device_id = %self.device_id,
                election_id = %self.election_id,
                "Became primary controller"
            );
        } else {
            self.state = SessionState::Backup;
            warn!(
                device_id = %self.device_id,
                election_id = %self.election_id,
                code = status.code,
                message = %status.message,
                "Not primary"
            );
        }
        Ok(status)
    }

    /// Keeps reading the stream in the background and publishes every later
    /// arbitration update.
    ///
    /// The receiver starts at the status from [`Self::await_primary`]. A lost
    /// stream is published as a non-primary `UNAVAILABLE` status.
    pub fn monitor(&mut self) -> Result<watch::Receiver<ArbitrationStatus>> {
        if self.state != SessionState::Primary {
            return Err(P4rtError::Protocol(format!(
                "mastership monitor started in state {:?}",
                self.state
            )));
        }
        let Some(inbound) = self.inbound.take().map(Mutex::into_inner) else {
            return Err(P4rtError::Protocol("stream read side already taken".to_string()));
        };

        let (tx, rx) = watch::channel(ArbitrationStatus::new(0, ""));
        let task = tokio::spawn(read_loop(
            inbound,
            tx,
            self.device_id,
            self.cancel.clone(),
        ));
        self.tasks.push(task);
        self.mastership = Some(rx.clone());
        Ok(rx)
    }

    /// Current state; a monitored session that was demoted reads as
    /// [`SessionState::Backup`].
    pub fn state(&self) -> SessionState {
        match (&self.state, &self.mastership) {
            (SessionState::Primary, Some(rx)) if !rx.borrow().is_primary() => SessionState::Backup,
            (state, _) => *state,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn election_id(&self) -> ElectionId {
        self.election_id
    }

    /// Claims enqueued so far, the initial one included.
    pub fn claims_sent(&self) -> u64 {
        self.claims_sent.load(Ordering::Relaxed)
    }

    /// Stops reinforcement and ends the stream. No release message is sent;
    /// the device drops mastership when the stream goes away.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.shutdown();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Session task ended abnormally");
            }
        }
        info!(
            device_id = %self.device_id,
            claims_sent = self.claims_sent(),
            "Closed arbitration session"
        );
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        self.outbound = None;
        self.inbound = None;
        self.state = SessionState::Closed;
    }
}

impl Drop for ArbitrationSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Re-sends `claim` every `period` until cancelled or the stream is gone.
async fn reinforce(
    tx: mpsc::Sender<StreamMessageRequest>,
    claim: StreamMessageRequest,
    period: Duration,
    cancel: CancellationToken,
    claims_sent: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(claim.clone()) => sent,
        };
        if sent.is_err() {
            debug!("Stream channel closed, stopping reinforcement");
            break;
        }
        let total = claims_sent.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(claims_sent = total, "Reinforced mastership claim");
    }
}

/// Drains the read side after election.
async fn read_loop(
    mut inbound: InboundStream,
    tx: watch::Sender<ArbitrationStatus>,
    device_id: DeviceId,
    cancel: CancellationToken,
) {
    use stream_message_response::Update;

    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = inbound.next() => item,
        };

        match item {
            Some(Ok(response)) => match &response.update {
                Some(Update::Arbitration(update)) => {
                    let status = ArbitrationStatus::from(update.status.clone());
                    if status.is_primary() {
                        info!(%device_id, "Mastership confirmed");
                    } else {
                        warn!(%device_id, %status, "Demoted from primary");
                    }
                    tx.send_replace(status);
                }
                Some(Update::Error(error)) => {
                    warn!(
                        %device_id,
                        code = error.canonical_code,
                        message = %error.message,
                        "Device reported stream error"
                    );
                }
                _ => {
                    debug!(%device_id, kind = response.kind(), "Ignoring unsolicited stream message");
                }
            },
            Some(Err(status)) => {
                warn!(%device_id, code = %status.code(), message = %status.message(), "Stream channel failed");
                tx.send_replace(ArbitrationStatus::lost(format!(
                    "stream failed: {}",
                    status.message()
                )));
                break;
            }
            None => {
                warn!(%device_id, "Stream channel closed by device");
                tx.send_replace(ArbitrationStatus::lost("stream closed by device"));
                break;
            }
        }
    }
}
