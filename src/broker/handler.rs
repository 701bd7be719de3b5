//! Message dispatch and request handling.
//!
//! Pure logic, no I/O. Each handler takes the [`BrokerState`] and returns
//! the response message. Data-object calls report their status code in
//! `hresult` whether they succeed or not; a call the object answered
//! (even with a "no" such as `DV_E_CLIPFORMAT` from a query) is `ok`.

use crate::data_object::DataObjectError;
use crate::format::{ClipFormat, FormatEtc, FormatNameError};
use crate::hresult::HResult;
use crate::ipc::protocol::{
    MAX_ENUM_BATCH, Message, ObjectDescriptor, PROTOCOL_VERSION, Role, Status,
};
use crate::medium::Medium;

use super::state::{BrokerState, ConnectionId, StateError};

/// Dispatch a request message to the appropriate handler.
///
/// Enforces role-based access: object creation, release and `set_data`
/// are refused from consumers with `not_permitted`. A connection joins
/// once; a repeated `hello` gets `already_joined` and keeps its role.
/// Server-originated variants sent by a client get `unknown_type`.
pub fn handle_message(
    state: &mut BrokerState,
    request: Message,
    connection_id: ConnectionId,
) -> Message {
    match request {
        Message::Hello { id, version, role } => {
            handle_hello(state, id, version, role, connection_id)
        }

        // -- Source-only --
        Message::CreateObject { id, name } => {
            if !is_source(state, connection_id) {
                return Reply::error(id, "not_permitted");
            }
            match state.create_object(connection_id, name) {
                Ok(object) => Reply {
                    object: Some(object),
                    ..Reply::default()
                }
                .ok(id),
                Err(reason) => Reply::error(id, reason),
            }
        }
        Message::ReleaseObject { id, object } => {
            if !is_source(state, connection_id) {
                return Reply::error(id, "not_permitted");
            }
            match state.release_object(connection_id, &object) {
                Ok(report) => {
                    if report.failed > 0 {
                        tracing::warn!(%object, failed = report.failed, "release incomplete");
                    }
                    Reply::default().ok(id)
                }
                Err(reason) => Reply::error(id, reason),
            }
        }
        Message::SetData {
            id,
            object,
            format,
            medium,
            release,
        } => {
            if !is_source(state, connection_id) {
                return Reply::error(id, "not_permitted");
            }
            match state.set_data(connection_id, &object, format, medium, release) {
                Ok(()) => Reply::with_hresult(HResult::S_OK).ok(id),
                Err(e) => state_error(id, e),
            }
        }

        // -- Any role --
        Message::ListObjects { id } => handle_list_objects(state, id),
        Message::RegisterFormat { id, name } => handle_register_format(state, id, &name),
        Message::GetData { id, object, format } => handle_get_data(state, id, &object, &format),
        Message::QueryGetData { id, object, format } => {
            match state.query_get_data(&object, &format) {
                Ok(status) => Reply::with_hresult(status.hresult()).ok(id),
                Err(reason) => Reply::error(id, reason),
            }
        }
        Message::EnumFormats {
            id,
            object,
            direction,
        } => match state.enum_formats(connection_id, &object, direction) {
            Ok(handle) => Reply {
                enumerator: Some(handle),
                ..Reply::with_hresult(HResult::S_OK)
            }
            .ok(id),
            Err(e) => state_error(id, e),
        },
        Message::EnumNext {
            id,
            enumerator,
            count,
            capacity,
            want_fetched,
        } => {
            if count > MAX_ENUM_BATCH {
                return Reply {
                    hresult: Some(HResult::E_INVALIDARG),
                    ..Reply::default()
                }
                .error_with(id, "batch_too_large");
            }
            match state.enum_next(connection_id, enumerator, count, capacity, want_fetched) {
                Ok(batch) => Reply {
                    formats: Some(batch.formats),
                    fetched: batch.fetched,
                    ..Reply::with_hresult(batch.status.hresult())
                }
                .ok(id),
                Err(e) => state_error(id, e),
            }
        }
        Message::EnumSkip {
            id,
            enumerator,
            count,
        } => match state.enum_skip(connection_id, enumerator, count) {
            Ok(status) => Reply::with_hresult(status.hresult()).ok(id),
            Err(reason) => Reply::error(id, reason),
        },
        Message::EnumReset { id, enumerator } => {
            match state.enum_reset(connection_id, enumerator) {
                Ok(status) => Reply::with_hresult(status.hresult()).ok(id),
                Err(reason) => Reply::error(id, reason),
            }
        }
        Message::EnumClone { id, enumerator } => {
            match state.enum_clone(connection_id, enumerator) {
                Ok(handle) => Reply {
                    enumerator: Some(handle),
                    ..Reply::with_hresult(HResult::S_OK)
                }
                .ok(id),
                Err(reason) => Reply::error(id, reason),
            }
        }
        Message::EnumRelease { id, enumerator } => {
            match state.enum_release(connection_id, enumerator) {
                Ok(()) => Reply::default().ok(id),
                Err(reason) => Reply::error(id, reason),
            }
        }

        // Server-originated messages should never be sent by clients.
        Message::HelloAck { id, .. } | Message::Response { id, .. } => {
            Reply::error(id, "unknown_type")
        }
    }
}

// -- Individual handlers --

fn handle_hello(
    state: &mut BrokerState,
    id: u32,
    version: u32,
    role: Role,
    connection_id: ConnectionId,
) -> Message {
    if state.role_of(connection_id).is_some() {
        return hello_ack(Some("already_joined"));
    }
    if id != 0 {
        return hello_ack(Some("invalid_hello_id"));
    }
    if version != PROTOCOL_VERSION {
        return hello_ack(Some("version_mismatch"));
    }
    state.add_connection(connection_id, role);
    hello_ack(None)
}

fn handle_list_objects(state: &BrokerState, id: u32) -> Message {
    let objects: Vec<ObjectDescriptor> = state.list_objects();
    Reply {
        objects: Some(objects),
        ..Reply::default()
    }
    .ok(id)
}

fn handle_register_format(state: &mut BrokerState, id: u32, name: &str) -> Message {
    match state.register_format(name) {
        Ok(format) => Reply {
            format: Some(format),
            ..Reply::default()
        }
        .ok(id),
        Err(FormatNameError::EmptyName) => Reply::error(id, "invalid_format_name"),
        Err(FormatNameError::Exhausted) => Reply::error(id, "format_names_exhausted"),
    }
}

fn handle_get_data(state: &BrokerState, id: u32, object: &str, format: &FormatEtc) -> Message {
    match state.get_data(object, format) {
        Ok(medium) => {
            if medium.is_null() {
                tracing::debug!(%object, %format, "no matching entry");
            }
            Reply {
                medium: Some(medium),
                ..Reply::with_hresult(HResult::S_OK)
            }
            .ok(id)
        }
        Err(e) => state_error(id, e),
    }
}

// -- Helpers --

fn is_source(state: &BrokerState, connection_id: ConnectionId) -> bool {
    state.role_of(connection_id) == Some(Role::Source)
}

fn hello_ack(error: Option<&str>) -> Message {
    Message::HelloAck {
        id: 0,
        status: if error.is_some() {
            Status::Error
        } else {
            Status::Ok
        },
        error: error.map(Into::into),
    }
}

fn state_error(id: u32, err: StateError) -> Message {
    match err {
        StateError::Rejected(reason) => Reply::error(id, reason),
        StateError::DataObject(e) => {
            tracing::debug!(id, error = %e, "data object call failed");
            Reply::with_hresult(e.hresult()).error_with(id, data_object_reason(&e))
        }
    }
}

/// Machine-readable reason for a data-object failure.
fn data_object_reason(err: &DataObjectError) -> &'static str {
    match err {
        DataObjectError::Duplicate { .. } => "duplicate_failed",
        DataObjectError::AdviseNotSupported => "advise_not_supported",
        DataObjectError::NoCanonicalFormat => "no_canonical_format",
        DataObjectError::GetDataHereNotSupported => "not_supported",
        DataObjectError::NotImplemented(_) => "not_implemented",
        DataObjectError::BufferTooSmall { .. } => "buffer_too_small",
    }
}

/// Optional payload of a [`Message::Response`].
#[derive(Debug, Default)]
struct Reply {
    hresult: Option<HResult>,
    object: Option<String>,
    objects: Option<Vec<ObjectDescriptor>>,
    format: Option<ClipFormat>,
    formats: Option<Vec<FormatEtc>>,
    fetched: Option<u32>,
    medium: Option<Medium>,
    enumerator: Option<u32>,
}

impl Reply {
    fn with_hresult(hresult: HResult) -> Self {
        Self {
            hresult: Some(hresult),
            ..Self::default()
        }
    }

    fn error(id: u32, reason: &str) -> Message {
        Self::default().error_with(id, reason)
    }

    fn ok(self, id: u32) -> Message {
        self.into_message(id, Status::Ok, None)
    }

    fn error_with(self, id: u32, reason: &str) -> Message {
        self.into_message(id, Status::Error, Some(reason.into()))
    }

    fn into_message(self, id: u32, status: Status, error: Option<String>) -> Message {
        Message::Response {
            id,
            status,
            error,
            hresult: self.hresult,
            object: self.object,
            objects: self.objects,
            format: self.format,
            formats: self.formats,
            fetched: self.fetched,
            medium: self.medium,
            enumerator: self.enumerator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::state::HostConfig;
    use crate::data_object::DataDir;
    use crate::format::{Aspect, Tymed};

    fn fresh() -> (BrokerState, ConnectionId) {
        let state = BrokerState::new(HostConfig::default());
        (state, ConnectionId::new())
    }

    fn joined(role: Role) -> (BrokerState, ConnectionId) {
        let (mut s, c) = fresh();
        handle_message(&mut s, hello(PROTOCOL_VERSION, role), c);
        (s, c)
    }

    fn hello(version: u32, role: Role) -> Message {
        Message::Hello { id: 0, version, role }
    }

    fn text() -> FormatEtc {
        FormatEtc::new(ClipFormat::TEXT, Tymed::HGLOBAL)
    }

    fn create(s: &mut BrokerState, c: ConnectionId) -> String {
        match handle_message(s, Message::CreateObject { id: 1, name: None }, c) {
            Message::Response {
                status: Status::Ok,
                object: Some(object),
                ..
            } => object,
            other => panic!("expected object id, got {other:?}"),
        }
    }

    fn set(s: &mut BrokerState, c: ConnectionId, object: &str, format: FormatEtc, bytes: &[u8]) -> Message {
        handle_message(
            s,
            Message::SetData {
                id: 2,
                object: object.into(),
                format,
                medium: Medium::HGlobal(bytes.to_vec()),
                release: true,
            },
            c,
        )
    }

    fn hresult_of(msg: &Message) -> Option<HResult> {
        match msg {
            Message::Response { hresult, .. } => *hresult,
            other => panic!("expected Response, got {other:?}"),
        }
    }

    fn error_of(msg: &Message) -> Option<&str> {
        match msg {
            Message::Response { error, .. } => error.as_deref(),
            other => panic!("expected Response, got {other:?}"),
        }
    }

    // -- Hello --

    #[test]
    fn hello_success() {
        let (mut s, c) = fresh();
        let resp = handle_message(&mut s, hello(PROTOCOL_VERSION, Role::Consumer), c);
        assert_eq!(
            resp,
            Message::HelloAck {
                id: 0,
                status: Status::Ok,
                error: None
            }
        );
        assert_eq!(s.role_of(c), Some(Role::Consumer));
    }

    #[test]
    fn hello_version_mismatch() {
        let (mut s, c) = fresh();
        match handle_message(&mut s, hello(999, Role::Source), c) {
            Message::HelloAck { id, status, error } => {
                assert_eq!(id, 0);
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("version_mismatch"));
            }
            other => panic!("expected HelloAck, got {other:?}"),
        }
        assert_eq!(s.role_of(c), None);
    }

    #[test]
    fn repeated_hello_keeps_role() {
        let (mut s, c) = joined(Role::Consumer);
        let resp = handle_message(&mut s, Message::CreateObject { id: 1, name: None }, c);
        assert_eq!(error_of(&resp), Some("not_permitted"));

        match handle_message(&mut s, hello(PROTOCOL_VERSION, Role::Source), c) {
            Message::HelloAck { status, error, .. } => {
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("already_joined"));
            }
            other => panic!("expected HelloAck, got {other:?}"),
        }
        assert_eq!(s.role_of(c), Some(Role::Consumer));

        let resp = handle_message(&mut s, Message::CreateObject { id: 2, name: None }, c);
        assert_eq!(error_of(&resp), Some("not_permitted"));
    }

    #[test]
    fn hello_nonzero_id_rejected() {
        let (mut s, c) = fresh();
        let msg = Message::Hello {
            id: 5,
            version: PROTOCOL_VERSION,
            role: Role::Source,
        };
        match handle_message(&mut s, msg, c) {
            Message::HelloAck { id, error, .. } => {
                assert_eq!(id, 0);
                assert_eq!(error.as_deref(), Some("invalid_hello_id"));
            }
            other => panic!("expected HelloAck, got {other:?}"),
        }
    }

    // -- Roles --

    #[test]
    fn consumer_cannot_publish() {
        let (mut s, c) = joined(Role::Consumer);
        let resp = handle_message(&mut s, Message::CreateObject { id: 3, name: None }, c);
        assert_eq!(error_of(&resp), Some("not_permitted"));

        let resp = set(&mut s, c, "anything", text(), b"x");
        assert_eq!(error_of(&resp), Some("not_permitted"));

        let resp = handle_message(
            &mut s,
            Message::ReleaseObject {
                id: 4,
                object: "anything".into(),
            },
            c,
        );
        assert_eq!(error_of(&resp), Some("not_permitted"));
    }

    #[test]
    fn server_variants_rejected() {
        let (mut s, c) = joined(Role::Source);
        let resp = handle_message(
            &mut s,
            Message::HelloAck {
                id: 8,
                status: Status::Ok,
                error: None,
            },
            c,
        );
        assert!(matches!(resp, Message::Response { id: 8, status: Status::Error, .. }));
        assert_eq!(error_of(&resp), Some("unknown_type"));
    }

    // -- Data calls --

    #[test]
    fn set_then_get_and_query() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        let resp = set(&mut s, c, &obj, text(), b"payload");
        assert_eq!(hresult_of(&resp), Some(HResult::S_OK));

        let resp = handle_message(
            &mut s,
            Message::GetData {
                id: 5,
                object: obj.clone(),
                format: text(),
            },
            c,
        );
        match resp {
            Message::Response {
                id: 5,
                status: Status::Ok,
                medium: Some(medium),
                ..
            } => assert_eq!(medium, Medium::HGlobal(b"payload".to_vec())),
            other => panic!("expected medium, got {other:?}"),
        }

        let query = |format: FormatEtc| Message::QueryGetData {
            id: 6,
            object: obj.clone(),
            format,
        };
        let resp = handle_message(&mut s, query(text()), c);
        assert_eq!(hresult_of(&resp), Some(HResult::S_OK));

        let resp = handle_message(&mut s, query(text().with_aspect(Aspect::Thumbnail)), c);
        assert!(matches!(resp, Message::Response { status: Status::Ok, .. }));
        assert_eq!(hresult_of(&resp), Some(HResult::DV_E_DVASPECT));

        let resp = handle_message(&mut s, query(FormatEtc::new(ClipFormat::TEXT, Tymed::FILE)), c);
        assert_eq!(hresult_of(&resp), Some(HResult::DV_E_TYMED));
    }

    #[test]
    fn get_missing_format_returns_null_medium() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        let resp = handle_message(
            &mut s,
            Message::GetData {
                id: 7,
                object: obj,
                format: text(),
            },
            c,
        );
        assert!(matches!(
            resp,
            Message::Response {
                status: Status::Ok,
                medium: Some(Medium::Null),
                ..
            }
        ));
    }

    #[test]
    fn copy_failure_carries_hresult() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        let resp = handle_message(
            &mut s,
            Message::SetData {
                id: 9,
                object: obj,
                format: FormatEtc::new(ClipFormat(0xC000), Tymed::ISTORAGE),
                medium: Medium::Foreign {
                    tymed: Tymed::ISTORAGE,
                    handle: 1,
                },
                release: false,
            },
            c,
        );
        assert_eq!(error_of(&resp), Some("duplicate_failed"));
        assert_eq!(hresult_of(&resp), Some(HResult::DV_E_TYMED));
    }

    #[test]
    fn unknown_object_has_no_hresult() {
        let (mut s, c) = joined(Role::Consumer);
        let resp = handle_message(
            &mut s,
            Message::QueryGetData {
                id: 1,
                object: "missing".into(),
                format: text(),
            },
            c,
        );
        assert_eq!(error_of(&resp), Some("object_not_found"));
        assert_eq!(hresult_of(&resp), None);
    }

    #[test]
    fn list_objects_reports_counts() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        set(&mut s, c, &obj, text(), b"a");
        match handle_message(&mut s, Message::ListObjects { id: 2 }, c) {
            Message::Response {
                objects: Some(objects),
                ..
            } => {
                assert_eq!(objects.len(), 1);
                assert_eq!(objects[0].object, obj);
                assert_eq!(objects[0].formats, 1);
            }
            other => panic!("expected objects, got {other:?}"),
        }
    }

    #[test]
    fn register_format_names() {
        let (mut s, c) = joined(Role::Consumer);
        let resp = handle_message(
            &mut s,
            Message::RegisterFormat {
                id: 1,
                name: "Preferred DropEffect".into(),
            },
            c,
        );
        assert!(matches!(
            resp,
            Message::Response {
                format: Some(ClipFormat(0xC000)),
                ..
            }
        ));
        let resp = handle_message(&mut s, Message::RegisterFormat { id: 2, name: String::new() }, c);
        assert_eq!(error_of(&resp), Some("invalid_format_name"));
    }

    // -- Enumeration --

    fn enumerate(s: &mut BrokerState, c: ConnectionId, object: &str, direction: DataDir) -> Message {
        handle_message(
            s,
            Message::EnumFormats {
                id: 10,
                object: object.into(),
                direction,
            },
            c,
        )
    }

    #[test]
    fn enumerate_walks_snapshot() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        set(&mut s, c, &obj, text(), b"a");
        set(&mut s, c, &obj, FormatEtc::new(ClipFormat::DIB, Tymed::HGLOBAL), b"b");

        let handle = match enumerate(&mut s, c, &obj, DataDir::Get) {
            Message::Response {
                enumerator: Some(h),
                ..
            } => h,
            other => panic!("expected handle, got {other:?}"),
        };

        let resp = handle_message(
            &mut s,
            Message::EnumNext {
                id: 11,
                enumerator: handle,
                count: 3,
                capacity: 3,
                want_fetched: true,
            },
            c,
        );
        match resp {
            Message::Response {
                hresult,
                formats: Some(formats),
                fetched,
                ..
            } => {
                assert_eq!(hresult, Some(HResult::S_FALSE));
                assert_eq!(fetched, Some(2));
                assert_eq!(formats[0], text());
                assert_eq!(formats[1].format, ClipFormat::DIB);
            }
            other => panic!("expected batch, got {other:?}"),
        }

        let resp = handle_message(&mut s, Message::EnumReset { id: 12, enumerator: handle }, c);
        assert_eq!(hresult_of(&resp), Some(HResult::S_OK));
        let resp = handle_message(
            &mut s,
            Message::EnumSkip {
                id: 13,
                enumerator: handle,
                count: 3,
            },
            c,
        );
        assert_eq!(hresult_of(&resp), Some(HResult::S_FALSE));
    }

    #[test]
    fn enumerate_set_direction_not_implemented() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        let resp = enumerate(&mut s, c, &obj, DataDir::Set);
        assert_eq!(error_of(&resp), Some("not_implemented"));
        assert_eq!(hresult_of(&resp), Some(HResult::E_NOTIMPL));
    }

    #[test]
    fn enum_next_limits() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        set(&mut s, c, &obj, text(), b"a");
        set(&mut s, c, &obj, FormatEtc::new(ClipFormat::DIB, Tymed::HGLOBAL), b"b");
        let Message::Response {
            enumerator: Some(handle),
            ..
        } = enumerate(&mut s, c, &obj, DataDir::Get)
        else {
            panic!("expected handle");
        };

        let next = |count, capacity| Message::EnumNext {
            id: 20,
            enumerator: handle,
            count,
            capacity,
            want_fetched: true,
        };

        let resp = handle_message(&mut s, next(MAX_ENUM_BATCH + 1, 1), c);
        assert_eq!(error_of(&resp), Some("batch_too_large"));

        let resp = handle_message(&mut s, next(2, 1), c);
        assert_eq!(error_of(&resp), Some("buffer_too_small"));
        assert_eq!(hresult_of(&resp), Some(HResult::E_INVALIDARG));
    }

    #[test]
    fn clone_and_release_enumerator() {
        let (mut s, c) = joined(Role::Source);
        let obj = create(&mut s, c);
        set(&mut s, c, &obj, text(), b"a");
        let Message::Response {
            enumerator: Some(handle),
            ..
        } = enumerate(&mut s, c, &obj, DataDir::Get)
        else {
            panic!("expected handle");
        };

        let copy = match handle_message(&mut s, Message::EnumClone { id: 1, enumerator: handle }, c) {
            Message::Response {
                enumerator: Some(h),
                ..
            } => h,
            other => panic!("expected cloned handle, got {other:?}"),
        };
        assert_ne!(copy, handle);

        let resp = handle_message(&mut s, Message::EnumRelease { id: 2, enumerator: copy }, c);
        assert!(matches!(resp, Message::Response { status: Status::Ok, .. }));
        let resp = handle_message(&mut s, Message::EnumRelease { id: 3, enumerator: copy }, c);
        assert_eq!(error_of(&resp), Some("enumerator_not_found"));

        // Another connection cannot reach this connection's handles.
        let other = ConnectionId::new();
        s.add_connection(other, Role::Consumer);
        let resp = handle_message(&mut s, Message::EnumClone { id: 4, enumerator: handle }, other);
        assert_eq!(error_of(&resp), Some("enumerator_not_found"));
    }
}
