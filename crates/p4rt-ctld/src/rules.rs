//! LPM table entry installation.
//!
//! Every rule is written as its own `WriteRequest` holding a single INSERT,
//! so one rejected entry does not affect the others.

use crate::config::RouteConfig;
use crate::error::{P4rtError, Result};
use crate::pipeline::InstalledPipeline;
use crate::schema::ResolvedRuleTemplate;
use p4rt_proto::P4RuntimeApi;
use p4rt_proto::p4runtime::{
    Action, Entity, FieldMatch, TableAction, TableEntry, Update, WriteRequest, action, entity,
    field_match, table_action, update, write_request,
};
use p4rt_types::{DeviceId, ElectionId, Ipv4Address, Ipv4Prefix, PortNumber};
use tracing::{debug, info, warn};

/// Per-batch result of [`RuleInstaller::install_routes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub inserted: usize,
    pub failed: usize,
}

impl InstallSummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Builds the table entry for `prefix -> port`.
///
/// A zero-length prefix is the table default and carries no match field.
pub fn lpm_entry(template: &ResolvedRuleTemplate, prefix: Ipv4Prefix, port: PortNumber) -> TableEntry {
    let r#match = if prefix.is_default() {
        Vec::new()
    } else {
        vec![FieldMatch {
            field_id: template.match_field_id,
            field_match_type: Some(field_match::FieldMatchType::Lpm(field_match::Lpm {
                value: prefix.address().to_bytes(),
                prefix_len: i32::from(prefix.prefix_len()),
            })),
        }]
    };

    TableEntry {
        table_id: template.table_id,
        r#match,
        action: Some(TableAction {
            r#type: Some(table_action::Type::Action(Action {
                action_id: template.action_id,
                params: vec![action::Param {
                    param_id: template.param_id,
                    value: port.to_be_bytes().to_vec(),
                }],
            })),
        }),
        ..Default::default()
    }
}

/// Writes forwarding rules into a committed pipeline.
pub struct RuleInstaller<'a, D: ?Sized> {
    device: &'a D,
    device_id: DeviceId,
    election_id: ElectionId,
    template: ResolvedRuleTemplate,
}

impl<'a, D> RuleInstaller<'a, D>
where
    D: P4RuntimeApi + ?Sized,
{
    pub fn new(device: &'a D, pipeline: &InstalledPipeline, template: ResolvedRuleTemplate) -> Self {
        Self {
            device,
            device_id: pipeline.device_id(),
            election_id: pipeline.election_id(),
            template,
        }
    }

    pub fn template(&self) -> &ResolvedRuleTemplate {
        &self.template
    }

    /// Checks the raw inputs and inserts one rule.
    pub async fn insert_lpm_rule(&self, dst_ip: &str, prefix_len: u32, port: u64) -> Result<()> {
        let address: Ipv4Address = dst_ip.parse()?;
        let prefix = Ipv4Prefix::new(address, prefix_len)?;
        let port = PortNumber::new(port)?;
        self.insert_route(prefix, port).await
    }

    /// Inserts `prefix -> port` as a single-update write.
    pub async fn insert_route(&self, prefix: Ipv4Prefix, port: PortNumber) -> Result<()> {
        let request = self.write_request(prefix, port);
        debug!(%prefix, %port, "Writing table entry");

        self.device
            .write(request)
            .await
            .map_err(|status| P4rtError::Write {
                prefix: prefix.to_string(),
                status,
            })?;

        info!(
            device_id = %self.device_id,
            %prefix,
            %port,
            table_id = self.template.table_id,
            "Inserted LPM rule"
        );
        Ok(())
    }

    /// Installs `routes` in order; a failed rule is logged and counted and
    /// the rest are still attempted.
    pub async fn install_routes(&self, routes: &[RouteConfig]) -> InstallSummary {
        let mut summary = InstallSummary::default();
        for route in routes {
            let result = match route.parse() {
                Ok((prefix, port)) => self.insert_route(prefix, port).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => summary.inserted += 1,
                Err(e) => {
                    warn!(prefix = %route.prefix, port = route.port, error = %e, "Failed to install rule");
                    summary.failed += 1;
                }
            }
        }
        info!(
            inserted = summary.inserted,
            failed = summary.failed,
            "Rule installation finished"
        );
        summary
    }

    fn write_request(&self, prefix: Ipv4Prefix, port: PortNumber) -> WriteRequest {
        WriteRequest {
            device_id: self.device_id.as_u64(),
            election_id: Some(self.election_id.into()),
            updates: vec![Update {
                r#type: update::Type::Insert as i32,
                entity: Some(Entity {
                    entity: Some(entity::Entity::TableEntry(lpm_entry(
                        &self.template,
                        prefix,
                        port,
                    ))),
                }),
            }],
            atomicity: write_request::Atomicity::ContinueOnError as i32,
            ..Default::default()
        }
    }
}
