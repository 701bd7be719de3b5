//! Wire protocol message types for broker IPC.
//!
//! Every message is a MessagePack map with at least `type` and `id`.
//! Requests mirror the data object and enumerator calls one for one;
//! replies are always a [`Message::Response`] carrying the same `id`.

use serde::{Deserialize, Serialize};

use crate::data_object::DataDir;
use crate::format::{ClipFormat, FormatEtc};
use crate::hresult::HResult;
use crate::medium::Medium;

/// All wire protocol messages, tagged on `type`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32, role: Role },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Object lifecycle --
    #[serde(rename = "create_object")]
    CreateObject {
        id: u32,
        #[serde(default)]
        name: Option<String>,
    },

    #[serde(rename = "release_object")]
    ReleaseObject { id: u32, object: String },

    #[serde(rename = "list_objects")]
    ListObjects { id: u32 },

    #[serde(rename = "register_format")]
    RegisterFormat { id: u32, name: String },

    // -- Data transfer --
    /// `release: true` hands the medium to the broker as-is; `false`
    /// makes the broker store its own copy.
    #[serde(rename = "set_data")]
    SetData {
        id: u32,
        object: String,
        format: FormatEtc,
        medium: Medium,
        release: bool,
    },

    #[serde(rename = "get_data")]
    GetData {
        id: u32,
        object: String,
        format: FormatEtc,
    },

    #[serde(rename = "query_get_data")]
    QueryGetData {
        id: u32,
        object: String,
        format: FormatEtc,
    },

    // -- Enumeration --
    #[serde(rename = "enum_formats")]
    EnumFormats {
        id: u32,
        object: String,
        direction: DataDir,
    },

    /// `capacity` is the number of descriptors the caller can receive
    /// (0 = no buffer); `want_fetched` says whether it can learn the
    /// fetched count.
    #[serde(rename = "enum_next")]
    EnumNext {
        id: u32,
        enumerator: u32,
        count: u32,
        capacity: u32,
        want_fetched: bool,
    },

    #[serde(rename = "enum_skip")]
    EnumSkip {
        id: u32,
        enumerator: u32,
        count: u32,
    },

    #[serde(rename = "enum_reset")]
    EnumReset { id: u32, enumerator: u32 },

    #[serde(rename = "enum_clone")]
    EnumClone { id: u32, enumerator: u32 },

    #[serde(rename = "enum_release")]
    EnumRelease { id: u32, enumerator: u32 },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Data-object status code for data-object calls.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hresult: Option<HResult>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        objects: Option<Vec<ObjectDescriptor>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<ClipFormat>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formats: Option<Vec<FormatEtc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fetched: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        medium: Option<Medium>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enumerator: Option<u32>,
    },
}

/// Client role in the handshake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Publishes data: may create objects and set data on them.
    Source,
    /// Reads data only.
    Consumer,
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Hosted object entry in `list_objects` responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub object: String,
    #[serde(default)]
    pub name: Option<String>,
    pub formats: u32,
}

pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Largest `count` a single `enum_next` may ask for.
pub const MAX_ENUM_BATCH: u32 = 4096;

/// Minimal envelope for extracting `{type, id}` from unknown messages,
/// so the error reply can echo the request id.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Aspect, Tymed};

    fn round_trip(msg: &Message) -> Message {
        let encoded = rmp_serde::to_vec_named(msg).unwrap();
        rmp_serde::from_slice(&encoded).unwrap()
    }

    fn text() -> FormatEtc {
        FormatEtc::new(ClipFormat::TEXT, Tymed::HGLOBAL)
    }

    #[test]
    fn hello_round_trip() {
        let msg = Message::Hello {
            id: 0,
            version: PROTOCOL_VERSION,
            role: Role::Source,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn set_data_carries_descriptor_and_medium() {
        let msg = Message::SetData {
            id: 3,
            object: "obj".into(),
            format: text().with_aspect(Aspect::Thumbnail).with_lindex(2),
            medium: Medium::HGlobal((0..=255).collect()),
            release: true,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn create_object_name_defaults_to_none() {
        #[derive(serde::Serialize)]
        struct Bare {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let encoded = rmp_serde::to_vec_named(&Bare {
            msg_type: "create_object",
            id: 4,
        })
        .unwrap();
        let decoded: Message = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(decoded, Message::CreateObject { id: 4, name: None });
    }

    #[test]
    fn response_with_negative_hresult() {
        let msg = Message::Response {
            id: 9,
            status: Status::Ok,
            error: None,
            hresult: Some(HResult::DV_E_CLIPFORMAT),
            object: None,
            objects: None,
            format: None,
            formats: None,
            fetched: None,
            medium: None,
            enumerator: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn response_omits_absent_fields() {
        let msg = Message::Response {
            id: 1,
            status: Status::Ok,
            error: None,
            hresult: None,
            object: None,
            objects: None,
            format: None,
            formats: None,
            fetched: None,
            medium: None,
            enumerator: None,
        };
        let encoded = rmp_serde::to_vec_named(&msg).unwrap();
        let as_map: std::collections::BTreeMap<String, serde::de::IgnoredAny> =
            rmp_serde::from_slice(&encoded).unwrap();
        let keys: Vec<&str> = as_map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "status", "type"]);
    }

    #[test]
    fn unknown_type_falls_back_to_envelope() {
        #[derive(serde::Serialize)]
        struct Future {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let encoded = rmp_serde::to_vec_named(&Future {
            msg_type: "dadvise",
            id: 12,
        })
        .unwrap();
        assert!(rmp_serde::from_slice::<Message>(&encoded).is_err());
        let envelope: RawEnvelope = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(envelope.id, 12);
    }
}
