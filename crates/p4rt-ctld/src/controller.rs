//! Top-level provisioning sequence.
//!
//! ```text
//! load inputs -> open session -> await primary -> install pipeline
//!             -> resolve schema -> insert rules -> hold until shutdown
//! ```
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - AC-3: Access Enforcement - No write before mastership and pipeline commit
//! - AU-12: Audit Record Generation - Every provisioning step is logged
//! - CM-6: Configuration Settings - Inputs validated before the device is contacted

use crate::arbitration::{ArbitrationSession, ArbitrationStatus, SessionOptions};
use crate::config::ControllerConfig;
use crate::error::Result;
use crate::loader::{ConfigLoader, PipelineInputs};
use crate::pipeline::PipelineInstaller;
use crate::rules::{InstallSummary, RuleInstaller};
use crate::schema::SchemaIndex;
use p4rt_proto::P4RuntimeApi;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of [`Controller::provision`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionOutcome {
    /// Pipeline committed and rules written; the session stays open.
    Primary(InstallSummary),
    /// Another controller holds mastership; the session has been closed.
    NotPrimary(ArbitrationStatus),
}

/// Why [`Controller::hold`] returned.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldOutcome {
    Shutdown,
    Demoted(ArbitrationStatus),
}

/// Result of a full [`Controller::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    NotPrimary(ArbitrationStatus),
    Shutdown,
    Demoted(ArbitrationStatus),
}

/// Drives one device from a cold start to a provisioned, primary session.
pub struct Controller<D> {
    device: D,
    config: ControllerConfig,
    session: Option<ArbitrationSession>,
    mastership: Option<watch::Receiver<ArbitrationStatus>>,
}

impl<D> Controller<D>
where
    D: P4RuntimeApi,
{
    pub fn new(device: D, config: ControllerConfig) -> Self {
        Self {
            device,
            config,
            session: None,
            mastership: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The open session, once provisioning succeeded.
    pub fn session(&self) -> Option<&ArbitrationSession> {
        self.session.as_ref()
    }

    /// Runs the provisioning sequence.
    ///
    /// Inputs are loaded before the device is contacted so that a bad path
    /// never claims mastership. On a fatal error the session is closed.
    pub async fn provision(&mut self) -> Result<ProvisionOutcome> {
        self.config.validate()?;
        let inputs = ConfigLoader::load(&self.config)?;

        let device_id = self.config.device_id();
        let election_id = self.config.election_id();
        info!(
            %device_id,
            %election_id,
            address = %self.config.device.address,
            "Claiming mastership"
        );

        let mut session = ArbitrationSession::open(
            &self.device,
            device_id,
            election_id,
            SessionOptions::from(&self.config.arbitration),
        )
        .await?;

        let status = match session.await_primary().await {
            Ok(status) => status,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        if !status.is_primary() {
            session.close().await;
            return Ok(ProvisionOutcome::NotPrimary(status));
        }

        match self.install(&mut session, inputs).await {
            Ok(summary) => {
                self.session = Some(session);
                Ok(ProvisionOutcome::Primary(summary))
            }
            Err(e) => {
                error!(%device_id, error = %e, "Provisioning failed");
                session.close().await;
                Err(e)
            }
        }
    }

    async fn install(
        &mut self,
        session: &mut ArbitrationSession,
        inputs: PipelineInputs,
    ) -> Result<InstallSummary> {
        let pipeline = PipelineInstaller::new(&self.device)
            .install(session, inputs)
            .await?;

        let schema = &self.config.schema;
        let template = SchemaIndex::new(pipeline.p4info()).resolve(
            &schema.table,
            &schema.match_field,
            &schema.action,
            &schema.param,
        )?;

        let summary = RuleInstaller::new(&self.device, &pipeline, template)
            .install_routes(&self.config.routes)
            .await;

        if self.config.arbitration.watch_mastership {
            self.mastership = Some(session.monitor()?);
        }
        Ok(summary)
    }

    /// Idles while primary until `token` is cancelled, or until the device
    /// demotes this controller when mastership is being watched.
    pub async fn hold(&mut self, token: &CancellationToken) -> HoldOutcome {
        let Some(mastership) = self.mastership.as_mut() else {
            token.cancelled().await;
            return HoldOutcome::Shutdown;
        };

        tokio::select! {
            _ = token.cancelled() => HoldOutcome::Shutdown,
            demoted = mastership.wait_for(|status| !status.is_primary()) => match demoted {
                Ok(status) => HoldOutcome::Demoted(status.clone()),
                Err(_) => HoldOutcome::Demoted(ArbitrationStatus::new(
                    tonic::Code::Unavailable as i32,
                    "mastership monitor stopped",
                )),
            },
        }
    }

    /// Closes the session, if any. Mastership is released by ending the
    /// stream.
    pub async fn shutdown(&mut self) {
        self.mastership = None;
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }

    /// Provisions, then holds until shutdown or demotion.
    pub async fn run(&mut self, token: CancellationToken) -> Result<RunOutcome> {
        let provisioned = tokio::select! {
            _ = token.cancelled() => None,
            outcome = self.provision() => Some(outcome),
        };

        let summary = match provisioned {
            None => {
                info!("Shutdown requested during provisioning");
                self.shutdown().await;
                return Ok(RunOutcome::Shutdown);
            }
            Some(outcome) => match outcome? {
                ProvisionOutcome::Primary(summary) => summary,
                ProvisionOutcome::NotPrimary(status) => return Ok(RunOutcome::NotPrimary(status)),
            },
        };

        info!(
            inserted = summary.inserted,
            failed = summary.failed,
            "Provisioned, holding mastership"
        );

        let outcome = match self.hold(&token).await {
            HoldOutcome::Shutdown => {
                info!("Shutdown requested");
                RunOutcome::Shutdown
            }
            HoldOutcome::Demoted(status) => {
                warn!(%status, "Lost mastership");
                RunOutcome::Demoted(status)
            }
        };
        self.shutdown().await;
        Ok(outcome)
    }
}
