//! Conveniences on the generated messages.

use crate::p4info::{Action, Table};
use crate::p4runtime::{stream_message_response, StreamMessageResponse, Uint128};
use crate::rpc::Status;
use p4rt_types::ElectionId;

impl From<ElectionId> for Uint128 {
    fn from(id: ElectionId) -> Self {
        Uint128 {
            high: id.high(),
            low: id.low(),
        }
    }
}

impl From<Uint128> for ElectionId {
    fn from(value: Uint128) -> Self {
        ElectionId::new(value.high, value.low)
    }
}

impl StreamMessageResponse {
    /// Name of the populated `update` arm, for diagnostics.
    pub fn kind(&self) -> &'static str {
        use stream_message_response::Update;
        match &self.update {
            Some(Update::Arbitration(_)) => "arbitration",
            Some(Update::Packet(_)) => "packet",
            Some(Update::Digest(_)) => "digest",
            Some(Update::IdleTimeoutNotification(_)) => "idle_timeout_notification",
            Some(Update::Other(_)) => "other",
            Some(Update::Error(_)) => "error",
            None => "unset",
        }
    }
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Canonical code as a tonic code, `Unknown` for out-of-range values.
    pub fn canonical_code(&self) -> tonic::Code {
        tonic::Code::from_i32(self.code)
    }
}

impl Table {
    /// Table name from the preamble, empty if absent.
    pub fn name(&self) -> &str {
        self.preamble.as_ref().map_or("", |p| p.name.as_str())
    }

    /// Table id from the preamble, 0 if absent.
    pub fn id(&self) -> u32 {
        self.preamble.as_ref().map_or(0, |p| p.id)
    }
}

impl Action {
    pub fn name(&self) -> &str {
        self.preamble.as_ref().map_or("", |p| p.name.as_str())
    }

    pub fn id(&self) -> u32 {
        self.preamble.as_ref().map_or(0, |p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use crate::p4runtime::*;
    use crate::rpc::Status;
    use p4rt_types::ElectionId;
    use pretty_assertions::assert_eq;
    use prost::Message;

    #[test]
    fn test_arbitration_request_wire_bytes() {
        let request = StreamMessageRequest {
            update: Some(stream_message_request::Update::Arbitration(
                MasterArbitrationUpdate {
                    device_id: 0,
                    election_id: Some(Uint128 { high: 0, low: 10 }),
                    ..Default::default()
                },
            )),
        };

        // field 1 (arbitration) { field 3 (election_id) { field 2 (low) = 10 } }
        assert_eq!(request.encode_to_vec(), vec![0x0a, 0x04, 0x1a, 0x02, 0x10, 0x0a]);
    }

    #[test]
    fn test_election_id_conversion() {
        let wire = Uint128::from(ElectionId::from_low(10));
        assert_eq!(wire, Uint128 { high: 0, low: 10 });
        assert_eq!(ElectionId::from(wire), ElectionId::new(0, 10));
    }

    #[test]
    fn test_update_type_accessor() {
        let update = Update {
            r#type: update::Type::Insert as i32,
            entity: None,
        };
        assert_eq!(update.r#type(), update::Type::Insert);
    }

    #[test]
    fn test_response_kind() {
        let response = StreamMessageResponse {
            update: Some(stream_message_response::Update::Packet(PacketIn::default())),
        };
        assert_eq!(response.kind(), "packet");
        assert_eq!(StreamMessageResponse::default().kind(), "unset");
    }

    #[test]
    fn test_digest_arm_decodes() {
        // field 3 (digest) carrying an empty message
        let bytes = [0x1a, 0x00];
        let response = StreamMessageResponse::decode(&bytes[..]).unwrap();
        assert_eq!(response.kind(), "digest");
    }

    #[test]
    fn test_default_status_is_ok() {
        assert!(Status::default().is_ok());
    }

    #[test]
    fn test_canonical_code() {
        let status = Status {
            code: 6,
            message: "a primary already exists".to_string(),
            details: Vec::new(),
        };
        assert!(!status.is_ok());
        assert_eq!(status.canonical_code(), tonic::Code::AlreadyExists);
    }
}
