//! In-process P4Runtime device.
//!
//! [`MockDevice`] implements [`P4RuntimeApi`] without a network. It records
//! every request it receives and answers according to a configurable
//! [`MockBehavior`], so controller code can be driven end to end.

use async_trait::async_trait;
use futures::StreamExt;
use p4rt_proto::p4runtime::{
    field_match, stream_message_request, stream_message_response, MasterArbitrationUpdate,
    PacketIn, SetForwardingPipelineConfigRequest, SetForwardingPipelineConfigResponse,
    StreamMessageRequest, StreamMessageResponse, WriteRequest, WriteResponse,
};
use p4rt_proto::{rpc, InboundStream, P4RuntimeApi};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tonic::{Code, Status};

/// How the device answers the first arbitration claim on a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbitrationReply {
    /// Arbitration update with this status code (0 = primary).
    Status(i32),
    /// Arbitration update without a status field.
    NoStatus,
    /// A packet-in instead of an arbitration update.
    PacketIn,
    /// Close the inbound stream without a message.
    Close,
    /// Fail the inbound stream with a transport error.
    TransportError(Code),
    /// Keep the stream open and never answer.
    Silent,
}

/// Configurable device behaviour.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Reply to the first arbitration claim.
    pub arbitration: ArbitrationReply,
    /// Refuse to open the stream channel with this code.
    pub refuse_stream: Option<Code>,
    /// Reject `SetForwardingPipelineConfig` with this code.
    pub pipeline_error: Option<Code>,
    /// Reject writes whose LPM destination matches one of these values.
    pub reject_destinations: Vec<Vec<u8>>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            arbitration: ArbitrationReply::Status(0),
            refuse_stream: None,
            pipeline_error: None,
            reject_destinations: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Recorded {
    stream_requests: Vec<StreamMessageRequest>,
    pipeline_requests: Vec<SetForwardingPipelineConfigRequest>,
    writes: Vec<WriteRequest>,
    streams_opened: usize,
}

#[derive(Default)]
struct Shared {
    behavior: Mutex<MockBehavior>,
    recorded: Mutex<Recorded>,
    inbound: Mutex<Option<mpsc::UnboundedSender<Result<StreamMessageResponse, Status>>>>,
}

/// In-memory P4Runtime target. Clones share state.
#[derive(Clone, Default)]
pub struct MockDevice {
    shared: Arc<Shared>,
}

impl MockDevice {
    /// Device that grants primary to any claim.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        let device = Self::default();
        *device.shared.behavior.lock() = behavior;
        device
    }

    /// Device that answers the first claim with `code`.
    pub fn with_arbitration_code(code: i32) -> Self {
        Self::with_behavior(MockBehavior {
            arbitration: ArbitrationReply::Status(code),
            ..Default::default()
        })
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.shared.behavior.lock() = behavior;
    }

    /// All messages received on stream channels, in arrival order.
    pub fn stream_requests(&self) -> Vec<StreamMessageRequest> {
        self.shared.recorded.lock().stream_requests.clone()
    }

    /// Arbitration claims received (initial plus reinforcements).
    pub fn arbitration_claims(&self) -> Vec<MasterArbitrationUpdate> {
        self.shared
            .recorded
            .lock()
            .stream_requests
            .iter()
            .filter_map(|request| match &request.update {
                Some(stream_message_request::Update::Arbitration(update)) => {
                    Some(update.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn pipeline_requests(&self) -> Vec<SetForwardingPipelineConfigRequest> {
        self.shared.recorded.lock().pipeline_requests.clone()
    }

    /// Write requests received, including rejected ones.
    pub fn writes(&self) -> Vec<WriteRequest> {
        self.shared.recorded.lock().writes.clone()
    }

    pub fn streams_opened(&self) -> usize {
        self.shared.recorded.lock().streams_opened
    }

    /// Pushes an arbitration update with `code` to the open stream, as a
    /// device does when another controller takes over.
    pub fn send_arbitration(&self, code: i32) -> bool {
        let update = arbitration_response(code, "mastership changed");
        self.push_inbound(Ok(update))
    }

    /// Pushes an unsolicited packet-in to the open stream.
    pub fn send_packet_in(&self, payload: Vec<u8>) -> bool {
        let response = StreamMessageResponse {
            update: Some(stream_message_response::Update::Packet(PacketIn {
                payload,
                metadata: Vec::new(),
            })),
        };
        self.push_inbound(Ok(response))
    }

    /// Ends the open stream from the device side.
    pub fn close_stream(&self) {
        self.shared.inbound.lock().take();
    }

    fn push_inbound(&self, item: Result<StreamMessageResponse, Status>) -> bool {
        match self.shared.inbound.lock().as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

fn arbitration_response(code: i32, message: &str) -> StreamMessageResponse {
    StreamMessageResponse {
        update: Some(stream_message_response::Update::Arbitration(
            MasterArbitrationUpdate {
                status: Some(rpc::Status {
                    code,
                    message: message.to_string(),
                    details: Vec::new(),
                }),
                ..Default::default()
            },
        )),
    }
}

fn lpm_destination(request: &WriteRequest) -> Option<Vec<u8>> {
    use p4rt_proto::p4runtime::entity;

    request.updates.iter().find_map(|update| {
        let Some(entity::Entity::TableEntry(entry)) =
            update.entity.as_ref().and_then(|e| e.entity.as_ref())
        else {
            return None;
        };
        entry.r#match.iter().find_map(|m| match &m.field_match_type {
            Some(field_match::FieldMatchType::Lpm(lpm)) => Some(lpm.value.clone()),
            _ => None,
        })
    })
}

#[async_trait]
impl P4RuntimeApi for MockDevice {
    async fn stream_channel(
        &self,
        mut outbound: ReceiverStream<StreamMessageRequest>,
    ) -> Result<InboundStream, Status> {
        let behavior = self.shared.behavior.lock().clone();
        if let Some(code) = behavior.refuse_stream {
            return Err(Status::new(code, "stream channel refused"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.inbound.lock() = Some(tx);
        self.shared.recorded.lock().streams_opened += 1;

        let device = self.clone();
        tokio::spawn(async move {
            let mut answered = false;
            while let Some(request) = outbound.next().await {
                let is_claim = matches!(
                    request.update,
                    Some(stream_message_request::Update::Arbitration(_))
                );
                device.shared.recorded.lock().stream_requests.push(request);

                if !is_claim || answered {
                    continue;
                }
                answered = true;

                match &behavior.arbitration {
                    ArbitrationReply::Status(code) => {
                        let message = if *code == 0 {
                            "primary"
                        } else {
                            "a controller with a higher election id is primary"
                        };
                        device.push_inbound(Ok(arbitration_response(*code, message)));
                    }
                    ArbitrationReply::NoStatus => {
                        let mut response = arbitration_response(0, "");
                        if let Some(stream_message_response::Update::Arbitration(update)) =
                            response.update.as_mut()
                        {
                            update.status = None;
                        }
                        device.push_inbound(Ok(response));
                    }
                    ArbitrationReply::PacketIn => {
                        device.send_packet_in(vec![0xde, 0xad]);
                    }
                    ArbitrationReply::Close => device.close_stream(),
                    ArbitrationReply::TransportError(code) => {
                        device.push_inbound(Err(Status::new(*code, "transport failure")));
                        device.close_stream();
                    }
                    ArbitrationReply::Silent => {}
                }
            }
            tracing::debug!("Mock device outbound stream ended");
            device.close_stream();
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn set_forwarding_pipeline_config(
        &self,
        request: SetForwardingPipelineConfigRequest,
    ) -> Result<SetForwardingPipelineConfigResponse, Status> {
        self.shared.recorded.lock().pipeline_requests.push(request);
        match self.shared.behavior.lock().pipeline_error {
            Some(code) => Err(Status::new(code, "pipeline rejected by device")),
            None => Ok(SetForwardingPipelineConfigResponse {}),
        }
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResponse, Status> {
        let destination = lpm_destination(&request);
        self.shared.recorded.lock().writes.push(request);

        let rejected = destination.is_some_and(|dst| {
            self.shared
                .behavior
                .lock()
                .reject_destinations
                .contains(&dst)
        });
        if rejected {
            return Err(Status::invalid_argument("table entry rejected by device"));
        }
        Ok(WriteResponse {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4rt_proto::p4runtime::Uint128;
    use pretty_assertions::assert_eq;

    fn claim() -> StreamMessageRequest {
        StreamMessageRequest {
            update: Some(stream_message_request::Update::Arbitration(
                MasterArbitrationUpdate {
                    device_id: 0,
                    election_id: Some(Uint128 { high: 0, low: 10 }),
                    ..Default::default()
                },
            )),
        }
    }

    #[tokio::test]
    async fn test_replies_to_first_claim() {
        let device = MockDevice::with_arbitration_code(6);
        let (tx, rx) = mpsc::channel(4);
        tx.send(claim()).await.unwrap();

        let mut inbound = device
            .stream_channel(ReceiverStream::new(rx))
            .await
            .unwrap();
        let reply = inbound.next().await.unwrap().unwrap();

        let Some(stream_message_response::Update::Arbitration(update)) = reply.update else {
            panic!("expected arbitration reply");
        };
        assert_eq!(update.status.unwrap().code, 6);
        assert_eq!(device.arbitration_claims().len(), 1);
        assert_eq!(device.streams_opened(), 1);
    }

    #[tokio::test]
    async fn test_refused_stream() {
        let device = MockDevice::with_behavior(MockBehavior {
            refuse_stream: Some(Code::Unavailable),
            ..Default::default()
        });
        let (_tx, rx) = mpsc::channel(1);
        let err = device
            .stream_channel(ReceiverStream::new(rx))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn test_stream_ends_when_outbound_dropped() {
        let device = MockDevice::new();
        let (tx, rx) = mpsc::channel(1);
        let mut inbound = device
            .stream_channel(ReceiverStream::new(rx))
            .await
            .unwrap();
        drop(tx);
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn test_pipeline_error() {
        let device = MockDevice::with_behavior(MockBehavior {
            pipeline_error: Some(Code::InvalidArgument),
            ..Default::default()
        });
        let err = device
            .set_forwarding_pipeline_config(SetForwardingPipelineConfigRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(device.pipeline_requests().len(), 1);
    }
}
