//! Forwarding pipeline installation.

use crate::arbitration::{ArbitrationSession, SessionState};
use crate::error::{P4rtError, Result};
use crate::loader::PipelineInputs;
use p4rt_proto::P4RuntimeApi;
use p4rt_proto::p4info::P4Info;
use p4rt_proto::p4runtime::{
    ForwardingPipelineConfig, SetForwardingPipelineConfigRequest,
    set_forwarding_pipeline_config_request::Action,
};
use p4rt_types::{DeviceId, ElectionId};
use tracing::{error, info};

/// A pipeline the device has committed.
///
/// Only [`PipelineInstaller::install`] produces one, and rule installation
/// requires one, so no table entry can be written before the device has
/// confirmed the program.
#[derive(Debug, Clone)]
pub struct InstalledPipeline {
    device_id: DeviceId,
    election_id: ElectionId,
    p4info: P4Info,
}

impl InstalledPipeline {
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn election_id(&self) -> ElectionId {
        self.election_id
    }

    /// The program that was pushed.
    pub fn p4info(&self) -> &P4Info {
        &self.p4info
    }
}

/// Pushes programs with `VERIFY_AND_COMMIT`.
pub struct PipelineInstaller<'a, D: ?Sized> {
    device: &'a D,
}

impl<'a, D> PipelineInstaller<'a, D>
where
    D: P4RuntimeApi + ?Sized,
{
    pub fn new(device: &'a D) -> Self {
        Self { device }
    }

    /// Builds the `SetForwardingPipelineConfig` request.
    pub fn build_request(
        device_id: DeviceId,
        election_id: ElectionId,
        p4info: P4Info,
        device_config: Vec<u8>,
    ) -> SetForwardingPipelineConfigRequest {
        SetForwardingPipelineConfigRequest {
            device_id: device_id.as_u64(),
            election_id: Some(election_id.into()),
            action: Action::VerifyAndCommit as i32,
            config: Some(ForwardingPipelineConfig {
                p4info: Some(p4info),
                p4_device_config: device_config,
                cookie: None,
            }),
            ..Default::default()
        }
    }

    /// Installs `inputs` on the device the session is primary for.
    pub async fn install(
        &self,
        session: &ArbitrationSession,
        inputs: PipelineInputs,
    ) -> Result<InstalledPipeline> {
        if session.state() != SessionState::Primary {
            return Err(P4rtError::Protocol(format!(
                "pipeline install requires a primary session, state is {:?}",
                session.state()
            )));
        }

        let device_id = session.device_id();
        let election_id = session.election_id();
        let image_bytes = inputs.device_config.len();
        let request =
            Self::build_request(device_id, election_id, inputs.p4info.clone(), inputs.device_config);

        info!(%device_id, %election_id, image_bytes, "Installing pipeline config");
        if let Err(status) = self.device.set_forwarding_pipeline_config(request).await {
            error!(
                %device_id,
                code = %status.code(),
                message = %status.message(),
                "SetForwardingPipelineConfig failed"
            );
            return Err(P4rtError::Install(status));
        }
        info!(%device_id, "Pipeline config installed");

        Ok(InstalledPipeline {
            device_id,
            election_id,
            p4info: inputs.p4info,
        })
    }
}
