//! Engine.IO v4 / Socket.IO v5 packet codec (WebSocket transport only).
//!
//! Engine.IO text frames start with a one-digit packet type. A `4` (message)
//! carries a Socket.IO packet, itself a type digit optionally followed by an
//! attachment count (`<n>-`), a namespace (`/nsp,`), an ack id, and a JSON
//! array `["event", args...]`. Binary attachments travel as separate binary
//! WebSocket frames, without any prefix.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::CodecError;

/// Engine.IO handshake sent by the server in the `0` packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    Ack { id: u64, args: Vec<Value> },
    ConnectError(Value),
    BinaryEvent { attachments: usize, name: String, args: Vec<Value> },
    BinaryAck { attachments: usize, id: u64, args: Vec<Value> },
}

/// Client `CONNECT` to the default namespace.
pub const CONNECT: &str = "40";

/// Pong reply to a server ping with the same payload.
pub fn encode_pong(payload: &str) -> String {
    format!("3{}", payload)
}

/// `42["name",payload]`
pub fn encode_event(name: &str, payload: &Value) -> String {
    format!("42{}", json!([name, payload]))
}

/// `451-["name",{"_placeholder":true,"num":0}]`, followed on the wire by one
/// binary frame.
pub fn encode_binary_event(name: &str) -> String {
    format!(
        "451-{}",
        json!([name, { "_placeholder": true, "num": 0 }])
    )
}

pub fn decode_engine(text: &str) -> Result<EnginePacket, CodecError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => Ok(EnginePacket::Message(rest.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(CodecError::UnknownType(other)),
    }
}

pub fn decode_socket(text: &str) -> Result<SocketPacket, CodecError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let mut rest = chars.as_str();

    let mut attachments = 0;
    if matches!(kind, '5' | '6') {
        if let Some((count, tail)) = rest.split_once('-') {
            attachments = count.parse().unwrap_or(0);
            rest = tail;
        }
    }

    // namespace is ignored: the client only joins "/"
    if rest.starts_with('/') {
        rest = match rest.split_once(',') {
            Some((_, tail)) => tail,
            None => "",
        };
    }

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let ack_id = rest[..digits].parse::<u64>().ok();
    rest = &rest[digits..];

    match kind {
        '0' => {
            let payload = if rest.is_empty() {
                None
            } else {
                Some(serde_json::from_str(rest)?)
            };
            Ok(SocketPacket::Connect(payload))
        }
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let (name, args) = split_event(rest)?;
            Ok(SocketPacket::Event { name, args })
        }
        '3' => Ok(SocketPacket::Ack {
            id: ack_id.unwrap_or(0),
            args: serde_json::from_str(rest)?,
        }),
        '4' => {
            let payload = if rest.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(rest)?
            };
            Ok(SocketPacket::ConnectError(payload))
        }
        '5' => {
            let (name, args) = split_event(rest)?;
            Ok(SocketPacket::BinaryEvent {
                attachments,
                name,
                args,
            })
        }
        '6' => Ok(SocketPacket::BinaryAck {
            attachments,
            id: ack_id.unwrap_or(0),
            args: serde_json::from_str(rest)?,
        }),
        other => Err(CodecError::UnknownType(other)),
    }
}

fn split_event(json_text: &str) -> Result<(String, Vec<Value>), CodecError> {
    let mut items: Vec<Value> = serde_json::from_str(json_text)?;
    if items.is_empty() {
        return Err(CodecError::MissingEventName);
    }
    match items.remove(0) {
        Value::String(name) => Ok((name, items)),
        _ => Err(CodecError::MissingEventName),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_open_handshake() {
        let packet = decode_engine(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        match packet {
            EnginePacket::Open(handshake) => {
                assert_eq!(handshake.sid, "abc");
                assert_eq!(handshake.ping_interval, 25000);
                assert_eq!(handshake.max_payload, Some(1_000_000));
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet = decode_socket(r#"2["status",{"message":"Listening..."}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "status".to_string(),
                args: vec![json!({"message": "Listening..."})],
            }
        );
    }

    #[test]
    fn decodes_namespaced_event_with_ack_id() {
        let packet = decode_socket(r#"2/chat,12["transcript",{"transcript":"hi"}]"#).unwrap();
        assert!(matches!(packet, SocketPacket::Event { ref name, .. } if name == "transcript"));
    }

    #[test]
    fn decodes_connect_ack() {
        let packet = decode_socket(r#"0{"sid":"xyz"}"#).unwrap();
        assert_eq!(packet, SocketPacket::Connect(Some(json!({"sid": "xyz"}))));
    }

    #[test]
    fn decodes_binary_event_header() {
        let packet = decode_socket(r#"51-["message",{"_placeholder":true,"num":0}]"#).unwrap();
        assert!(matches!(
            packet,
            SocketPacket::BinaryEvent { attachments: 1, ref name, .. } if name == "message"
        ));
    }

    #[test]
    fn encodes_events() {
        assert_eq!(
            encode_event("start_stream", &json!({"format": "wav"})),
            r#"42["start_stream",{"format":"wav"}]"#
        );
        assert_eq!(encode_event("stop_stream", &json!({})), r#"42["stop_stream",{}]"#);
        assert_eq!(
            encode_binary_event("message"),
            r#"451-["message",{"_placeholder":true,"num":0}]"#
        );
        assert_eq!(encode_pong(""), "3");
    }

    #[test]
    fn rejects_event_without_name() {
        assert!(matches!(
            decode_socket("2[]"),
            Err(CodecError::MissingEventName)
        ));
        assert!(matches!(decode_engine(""), Err(CodecError::Empty)));
        assert!(matches!(decode_engine("9"), Err(CodecError::UnknownType('9'))));
    }
}
