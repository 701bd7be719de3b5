//! Broker state: hosted objects, enumerator handles, connection roles.
//!
//! All methods are pure state transitions with no I/O. Failures are
//! either machine-readable reasons or the data object's own error, which
//! the handler turns into a reason plus status code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::data_object::{
    DataDir, DataObject, DataObjectError, FetchStatus, FormatEnumerator, Handoff, QueryStatus,
    ReleaseReport,
};
use crate::format::{ClipFormat, FormatEtc, FormatNameError, FormatNames, Tymed};
use crate::ipc::protocol::{ObjectDescriptor, Role};
use crate::medium::Medium;

/// Unique identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Host limits, set from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    /// Objects hosted at once, across all connections.
    pub max_objects: usize,
    /// Distinct entries per object. Replacing an entry never counts.
    pub max_formats: usize,
    /// Open enumerators per connection.
    pub max_enumerators: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_objects: 64,
            max_formats: 32,
            max_enumerators: 64,
        }
    }
}

/// Why a state transition was refused.
#[derive(Debug, PartialEq)]
pub enum StateError {
    Rejected(&'static str),
    DataObject(DataObjectError),
}

impl From<&'static str> for StateError {
    fn from(reason: &'static str) -> Self {
        StateError::Rejected(reason)
    }
}

impl From<DataObjectError> for StateError {
    fn from(err: DataObjectError) -> Self {
        StateError::DataObject(err)
    }
}

#[derive(Debug)]
struct HostedObject {
    owner: ConnectionId,
    name: Option<String>,
    /// Creation order, for stable listings.
    seq: u64,
    object: DataObject,
}

#[derive(Debug)]
struct EnumeratorEntry {
    owner: ConnectionId,
    cursor: FormatEnumerator,
}

/// Result of one `enum_next` against a hosted enumerator.
#[derive(Debug, PartialEq)]
pub struct NextBatch {
    pub status: FetchStatus,
    pub formats: Vec<FormatEtc>,
    /// Reported only when the caller asked for it.
    pub fetched: Option<u32>,
}

/// Owned exclusively by the broker loop.
#[derive(Debug)]
pub struct BrokerState {
    config: HostConfig,
    connections: HashMap<ConnectionId, Role>,
    objects: HashMap<String, HostedObject>,
    names: FormatNames,
    enumerators: HashMap<u32, EnumeratorEntry>,
    next_seq: u64,
    next_enumerator: u32,
}

impl BrokerState {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            connections: HashMap::new(),
            objects: HashMap::new(),
            names: FormatNames::default(),
            enumerators: HashMap::new(),
            next_seq: 0,
            next_enumerator: 1,
        }
    }

    // -- Connections --

    pub fn add_connection(&mut self, id: ConnectionId, role: Role) {
        self.connections.insert(id, role);
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.connections.get(&id).copied()
    }

    /// Forget a connection: its objects are cleared and its enumerators
    /// dropped.
    pub fn remove_connection(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        self.enumerators.retain(|_, entry| entry.owner != id);

        let owned: Vec<String> = self
            .objects
            .iter()
            .filter(|(_, hosted)| hosted.owner == id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in owned {
            if let Some(hosted) = self.objects.remove(&key) {
                release_hosted(&key, hosted);
            }
        }
    }

    /// Clear every hosted object. Used on shutdown.
    pub fn release_all(&mut self) -> ReleaseReport {
        self.enumerators.clear();
        let mut total = ReleaseReport::default();
        for (key, hosted) in self.objects.drain() {
            let report = release_hosted(&key, hosted);
            total.released += report.released;
            total.failed += report.failed;
        }
        total
    }

    // -- Objects --

    /// Host a new empty object owned by `owner`. Returns its id.
    pub fn create_object(
        &mut self,
        owner: ConnectionId,
        name: Option<String>,
    ) -> Result<String, &'static str> {
        if self.objects.len() >= self.config.max_objects {
            return Err("too_many_objects");
        }
        let key = uuid::Uuid::new_v4().to_string();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.objects.insert(
            key.clone(),
            HostedObject {
                owner,
                name,
                seq,
                object: DataObject::new(),
            },
        );
        tracing::debug!(object = %key, ?owner, "object created");
        Ok(key)
    }

    /// Only the owner may release an object.
    pub fn release_object(
        &mut self,
        caller: ConnectionId,
        object: &str,
    ) -> Result<ReleaseReport, &'static str> {
        let hosted = self.objects.get(object).ok_or("object_not_found")?;
        if hosted.owner != caller {
            return Err("not_owner");
        }
        let hosted = self.objects.remove(object).ok_or("object_not_found")?;
        Ok(release_hosted(object, hosted))
    }

    /// Descriptors for every hosted object, oldest first.
    pub fn list_objects(&self) -> Vec<ObjectDescriptor> {
        let mut hosted: Vec<(&String, &HostedObject)> = self.objects.iter().collect();
        hosted.sort_by_key(|(_, h)| h.seq);
        hosted
            .into_iter()
            .map(|(key, h)| ObjectDescriptor {
                object: key.clone(),
                name: h.name.clone(),
                formats: h.object.len() as u32,
            })
            .collect()
    }

    pub fn register_format(&mut self, name: &str) -> Result<ClipFormat, FormatNameError> {
        self.names.register(name)
    }

    pub fn format_names(&self) -> &FormatNames {
        &self.names
    }

    // -- Data object calls --

    /// Store `medium` under `format`. `release` hands the medium over
    /// as-is; otherwise the object keeps its own copy.
    pub fn set_data(
        &mut self,
        caller: ConnectionId,
        object: &str,
        format: FormatEtc,
        medium: Medium,
        release: bool,
    ) -> Result<(), StateError> {
        let max_formats = self.config.max_formats;
        let hosted = self.objects.get_mut(object).ok_or("object_not_found")?;
        if hosted.owner != caller {
            return Err("not_owner".into());
        }
        let replaces = hosted.object.formats().any(|f| f.matches(&format));
        if !replaces && hosted.object.len() >= max_formats {
            return Err("too_many_formats".into());
        }

        let handoff = if release {
            Handoff::Transfer(medium)
        } else {
            Handoff::Copy(&medium)
        };
        hosted.object.set_data(format, handoff)?;
        Ok(())
    }

    pub fn get_data(&self, object: &str, request: &FormatEtc) -> Result<Medium, StateError> {
        let hosted = self.objects.get(object).ok_or("object_not_found")?;
        Ok(hosted.object.get_data(request)?)
    }

    pub fn query_get_data(
        &self,
        object: &str,
        request: &FormatEtc,
    ) -> Result<QueryStatus, &'static str> {
        let hosted = self.objects.get(object).ok_or("object_not_found")?;
        Ok(hosted.object.query_get_data(request))
    }

    // -- Enumerators --

    /// Snapshot the object's formats into a new enumerator owned by
    /// `caller`. Returns its handle.
    pub fn enum_formats(
        &mut self,
        caller: ConnectionId,
        object: &str,
        direction: DataDir,
    ) -> Result<u32, StateError> {
        let hosted = self.objects.get(object).ok_or("object_not_found")?;
        let cursor = hosted.object.enum_format_etc(direction)?;
        Ok(self.insert_enumerator(caller, cursor)?)
    }

    /// Fetch up to `count` descriptors. `capacity` is the caller's
    /// buffer size, 0 meaning no buffer at all.
    pub fn enum_next(
        &mut self,
        caller: ConnectionId,
        handle: u32,
        count: u32,
        capacity: u32,
        want_fetched: bool,
    ) -> Result<NextBatch, StateError> {
        let entry = self.enumerator_mut(caller, handle)?;

        let blank = FormatEtc::new(ClipFormat(0), Tymed::empty());
        let mut buffer = vec![blank; capacity.min(count) as usize];
        let out = (capacity > 0).then_some(&mut buffer[..]);
        let mut fetched = 0usize;
        let before = entry.cursor.position();

        let status = entry.cursor.next(
            count as usize,
            out,
            want_fetched.then_some(&mut fetched),
        )?;

        let copied = entry.cursor.position() - before;
        buffer.truncate(copied);
        Ok(NextBatch {
            status,
            formats: buffer,
            fetched: want_fetched.then_some(fetched as u32),
        })
    }

    pub fn enum_skip(
        &mut self,
        caller: ConnectionId,
        handle: u32,
        count: u32,
    ) -> Result<FetchStatus, &'static str> {
        Ok(self.enumerator_mut(caller, handle)?.cursor.skip(count as usize))
    }

    pub fn enum_reset(&mut self, caller: ConnectionId, handle: u32) -> Result<FetchStatus, &'static str> {
        Ok(self.enumerator_mut(caller, handle)?.cursor.reset())
    }

    /// Independent copy at the same position, under a new handle.
    pub fn enum_clone(&mut self, caller: ConnectionId, handle: u32) -> Result<u32, &'static str> {
        let cursor = self.enumerator_mut(caller, handle)?.cursor.clone();
        self.insert_enumerator(caller, cursor)
    }

    pub fn enum_release(&mut self, caller: ConnectionId, handle: u32) -> Result<(), &'static str> {
        self.enumerator_mut(caller, handle)?;
        self.enumerators.remove(&handle);
        Ok(())
    }

    fn enumerator_mut(
        &mut self,
        caller: ConnectionId,
        handle: u32,
    ) -> Result<&mut EnumeratorEntry, &'static str> {
        match self.enumerators.get_mut(&handle) {
            Some(entry) if entry.owner == caller => Ok(entry),
            _ => Err("enumerator_not_found"),
        }
    }

    fn insert_enumerator(
        &mut self,
        owner: ConnectionId,
        cursor: FormatEnumerator,
    ) -> Result<u32, &'static str> {
        let open = self
            .enumerators
            .values()
            .filter(|entry| entry.owner == owner)
            .count();
        if open >= self.config.max_enumerators {
            return Err("too_many_enumerators");
        }

        let mut handle = self.next_enumerator;
        while handle == 0 || self.enumerators.contains_key(&handle) {
            handle = handle.wrapping_add(1);
        }
        self.next_enumerator = handle.wrapping_add(1);
        self.enumerators.insert(handle, EnumeratorEntry { owner, cursor });
        Ok(handle)
    }
}

fn release_hosted(key: &str, mut hosted: HostedObject) -> ReleaseReport {
    let report = hosted.object.clear();
    tracing::debug!(
        object = %key,
        released = report.released,
        failed = report.failed,
        "object released"
    );
    report
}
