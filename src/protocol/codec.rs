//! Newline-delimited JSON framing used by the reference transport.
//!
//! One message per line. Inbound lines decode to [`SwitchEvent`], outbound
//! [`ControllerMessage`]s encode to a single line without the trailing newline.

use thiserror::Error;

use crate::protocol::messages::{ControllerMessage, SwitchEvent};

/// Errors produced while framing messages.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed event: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Decode one inbound line.
pub fn decode_event(line: &str) -> Result<SwitchEvent, CodecError> {
    serde_json::from_str(line.trim()).map_err(CodecError::Decode)
}

/// Encode one outbound message as a single line.
pub fn encode_message(message: &ControllerMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{BufferId, DatapathId, FlowAction, OutputPort};
    use crate::protocol::version::ProtocolVersion;

    #[test]
    fn decodes_switch_connected() {
        let event =
            decode_event(r#"{"type":"switch_connected","datapath_id":1,"protocol_version":4}"#)
                .unwrap();
        assert_eq!(
            event,
            SwitchEvent::SwitchConnected {
                datapath_id: DatapathId(1),
                protocol_version: ProtocolVersion::V1_3,
            }
        );
    }

    #[test]
    fn packet_in_buffer_defaults_to_no_buffer() {
        let event = decode_event(
            r#"{"type":"packet_in","datapath_id":2,"ingress_port":1,"raw_frame":[0,1]}"#,
        )
        .unwrap();
        match event {
            SwitchEvent::PacketIn { buffer_id, .. } => assert_eq!(buffer_id, BufferId::NO_BUFFER),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn encoded_messages_are_single_line() {
        let message = ControllerMessage::packet_out(
            DatapathId(3),
            BufferId::NO_BUFFER,
            1,
            vec![FlowAction::output(OutputPort::Flood)],
            &[0xde, 0xad],
        );
        let line = encode_message(&message).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""type":"packet_out""#));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_event("{not json"), Err(CodecError::Decode(_))));
    }
}
