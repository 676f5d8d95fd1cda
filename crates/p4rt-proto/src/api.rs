//! The device-facing seam of the controller.
//!
//! [`P4RuntimeApi`] covers the three RPCs the controller issues. The
//! generated gRPC client implements it for real targets; tests substitute an
//! in-memory device.

use crate::p4runtime::p4_runtime_client::P4RuntimeClient;
use crate::p4runtime::{
    SetForwardingPipelineConfigRequest, SetForwardingPipelineConfigResponse,
    StreamMessageRequest, StreamMessageResponse, WriteRequest, WriteResponse,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::Status;

/// Messages arriving from the device on the stream channel.
pub type InboundStream = BoxStream<'static, Result<StreamMessageResponse, Status>>;

/// The P4Runtime operations the controller depends on.
#[async_trait]
pub trait P4RuntimeApi: Send + Sync {
    /// Opens the bidirectional stream. Every message pushed into the
    /// channel behind `outbound` is sent to the device in order.
    async fn stream_channel(
        &self,
        outbound: ReceiverStream<StreamMessageRequest>,
    ) -> Result<InboundStream, Status>;

    async fn set_forwarding_pipeline_config(
        &self,
        request: SetForwardingPipelineConfigRequest,
    ) -> Result<SetForwardingPipelineConfigResponse, Status>;

    async fn write(&self, request: WriteRequest) -> Result<WriteResponse, Status>;
}

// Generated methods take `&mut self`; calls go through the inherent path on a
// clone so they never resolve back to the trait.
#[async_trait]
impl P4RuntimeApi for P4RuntimeClient<Channel> {
    async fn stream_channel(
        &self,
        outbound: ReceiverStream<StreamMessageRequest>,
    ) -> Result<InboundStream, Status> {
        let mut client = self.clone();
        let response = P4RuntimeClient::stream_channel(&mut client, outbound).await?;
        Ok(response.into_inner().boxed())
    }

    async fn set_forwarding_pipeline_config(
        &self,
        request: SetForwardingPipelineConfigRequest,
    ) -> Result<SetForwardingPipelineConfigResponse, Status> {
        let mut client = self.clone();
        let response =
            P4RuntimeClient::set_forwarding_pipeline_config(&mut client, request).await?;
        Ok(response.into_inner())
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResponse, Status> {
        let mut client = self.clone();
        let response = P4RuntimeClient::write(&mut client, request).await?;
        Ok(response.into_inner())
    }
}
