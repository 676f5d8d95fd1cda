//! Verification helpers for requests captured by [`crate::MockDevice`].

use p4rt_proto::p4runtime::{
    entity, field_match, table_action, update, FieldMatch, TableEntry, Uint128, WriteRequest,
};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug, PartialEq)]
pub enum VerificationError {
    #[error("Expected {expected} write requests, found {actual}")]
    WriteCountMismatch { expected: usize, actual: usize },

    #[error("Write request {index} does not exist")]
    MissingWrite { index: usize },

    #[error("Write request {index} carries {updates} updates, expected exactly one INSERT")]
    NotSingleInsert { index: usize, updates: usize },

    #[error("Write request {index} has no table entry")]
    NoTableEntry { index: usize },

    #[error("Value mismatch for write {index} {field}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        index: usize,
        field: String,
        expected: String,
        actual: String,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Assertions over the write requests a device received.
pub struct WriteVerifier<'a> {
    writes: &'a [WriteRequest],
}

impl<'a> WriteVerifier<'a> {
    pub fn new(writes: &'a [WriteRequest]) -> Self {
        Self { writes }
    }

    /// Verify the number of write requests.
    pub fn assert_count(&self, expected: usize) -> VerifyResult<()> {
        if self.writes.len() != expected {
            return Err(VerificationError::WriteCountMismatch {
                expected,
                actual: self.writes.len(),
            });
        }
        Ok(())
    }

    /// Verify that write `index` holds exactly one INSERT of a table entry,
    /// and return that entry.
    pub fn assert_single_insert(&self, index: usize) -> VerifyResult<&'a TableEntry> {
        let request = self
            .writes
            .get(index)
            .ok_or(VerificationError::MissingWrite { index })?;

        if request.updates.len() != 1 || request.updates[0].r#type() != update::Type::Insert {
            return Err(VerificationError::NotSingleInsert {
                index,
                updates: request.updates.len(),
            });
        }

        match request.updates[0]
            .entity
            .as_ref()
            .and_then(|e| e.entity.as_ref())
        {
            Some(entity::Entity::TableEntry(entry)) => Ok(entry),
            _ => Err(VerificationError::NoTableEntry { index }),
        }
    }

    /// Verify device id and election id of write `index`.
    pub fn assert_identity(
        &self,
        index: usize,
        device_id: u64,
        election_id: Uint128,
    ) -> VerifyResult<()> {
        let request = self
            .writes
            .get(index)
            .ok_or(VerificationError::MissingWrite { index })?;

        check(index, "device_id", device_id, request.device_id)?;
        check(
            index,
            "election_id",
            format!("{:?}", Some(election_id)),
            format!("{:?}", request.election_id),
        )
    }

    /// Verify the LPM destination bytes and prefix length of write `index`.
    pub fn assert_lpm(&self, index: usize, value: &[u8], prefix_len: i32) -> VerifyResult<()> {
        let entry = self.assert_single_insert(index)?;
        let (actual_value, actual_len) = lpm_match(entry)
            .map(|lpm| (lpm.value.clone(), lpm.prefix_len))
            .unwrap_or_default();

        check(index, "lpm.value", format!("{:?}", value), format!("{:?}", actual_value))?;
        check(index, "lpm.prefix_len", prefix_len, actual_len)
    }

    /// Verify the single action parameter value of write `index`.
    pub fn assert_param(&self, index: usize, param_id: u32, value: &[u8]) -> VerifyResult<()> {
        let entry = self.assert_single_insert(index)?;
        let actual = action_param(entry, param_id).unwrap_or_default();
        check(
            index,
            "action.param",
            format!("{:?}", value),
            format!("{:?}", actual),
        )
    }
}

fn check<T: ToString + PartialEq>(
    index: usize,
    field: &str,
    expected: T,
    actual: T,
) -> VerifyResult<()> {
    if expected == actual {
        return Ok(());
    }
    Err(VerificationError::ValueMismatch {
        index,
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

/// The LPM match of an entry, if present.
pub fn lpm_match(entry: &TableEntry) -> Option<&field_match::Lpm> {
    entry.r#match.iter().find_map(|m: &FieldMatch| match &m.field_match_type {
        Some(field_match::FieldMatchType::Lpm(lpm)) => Some(lpm),
        _ => None,
    })
}

/// Value of action parameter `param_id` in a direct action.
pub fn action_param(entry: &TableEntry, param_id: u32) -> Option<Vec<u8>> {
    match entry.action.as_ref()?.r#type.as_ref()? {
        table_action::Type::Action(action) => action
            .params
            .iter()
            .find(|p| p.param_id == param_id)
            .map(|p| p.value.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4rt_proto::p4runtime::{action, Action, Entity, TableAction, Update};
    use pretty_assertions::assert_eq;

    fn insert(dst: [u8; 4], prefix_len: i32, port: [u8; 2]) -> WriteRequest {
        let entry = TableEntry {
            table_id: 1,
            r#match: vec![FieldMatch {
                field_id: 1,
                field_match_type: Some(field_match::FieldMatchType::Lpm(field_match::Lpm {
                    value: dst.to_vec(),
                    prefix_len,
                })),
            }],
            action: Some(TableAction {
                r#type: Some(table_action::Type::Action(Action {
                    action_id: 2,
                    params: vec![action::Param {
                        param_id: 1,
                        value: port.to_vec(),
                    }],
                })),
            }),
            ..Default::default()
        };
        WriteRequest {
            device_id: 0,
            election_id: Some(Uint128 { high: 0, low: 10 }),
            updates: vec![Update {
                r#type: update::Type::Insert as i32,
                entity: Some(Entity {
                    entity: Some(entity::Entity::TableEntry(entry)),
                }),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_verifier_accepts_matching_insert() {
        let writes = vec![insert([10, 0, 0, 1], 32, [0, 0])];
        let verifier = WriteVerifier::new(&writes);

        verifier.assert_count(1).unwrap();
        verifier
            .assert_identity(0, 0, Uint128 { high: 0, low: 10 })
            .unwrap();
        verifier.assert_lpm(0, &[10, 0, 0, 1], 32).unwrap();
        verifier.assert_param(0, 1, &[0, 0]).unwrap();
    }

    #[test]
    fn test_verifier_reports_mismatch() {
        let writes = vec![insert([10, 0, 0, 2], 32, [0, 1])];
        let verifier = WriteVerifier::new(&writes);

        assert_eq!(
            verifier.assert_count(2),
            Err(VerificationError::WriteCountMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert!(verifier.assert_lpm(0, &[10, 0, 0, 1], 32).is_err());
        assert_eq!(
            verifier.assert_single_insert(3),
            Err(VerificationError::MissingWrite { index: 3 })
        );
    }

    #[test]
    fn test_non_insert_rejected() {
        let mut request = insert([10, 0, 0, 1], 32, [0, 0]);
        request.updates[0].r#type = update::Type::Delete as i32;
        let writes = vec![request];
        assert!(WriteVerifier::new(&writes).assert_single_insert(0).is_err());
    }
}
