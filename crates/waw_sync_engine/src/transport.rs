//! Remote contract used by the reconcilers.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use waw_sync_protocol::{ContentHash, ProfilePayload};

/// The remote profile service.
///
/// Implementations must treat [`push_profile`](Self::push_profile) as an
/// upsert keyed by `id`, so a repeated push is harmless.
pub trait RemoteProfileClient: Send + Sync {
    /// Pushes a profile. Only a 2xx answer is `Ok`.
    fn push_profile(&self, payload: &ProfilePayload) -> SyncResult<()>;

    /// Deletes the remote copy of a profile.
    ///
    /// Returns `Ok(false)` if the remote had no such profile.
    fn delete_profile(&self, id: &str) -> SyncResult<bool>;
}

impl<T: RemoteProfileClient + ?Sized> RemoteProfileClient for Arc<T> {
    fn push_profile(&self, payload: &ProfilePayload) -> SyncResult<()> {
        (**self).push_profile(payload)
    }

    fn delete_profile(&self, id: &str) -> SyncResult<bool> {
        (**self).delete_profile(id)
    }
}

/// What the remote says about its current model, available before the body
/// is read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteModelDescriptor {
    /// Advertised content hash, if the remote sent one.
    pub sha256: Option<ContentHash>,
}

/// A model response: the descriptor plus the not yet consumed body.
pub struct ModelDownload {
    /// Advertised metadata.
    pub descriptor: RemoteModelDescriptor,
    /// Body stream. Read errors mean the transfer broke off.
    pub body: Box<dyn Read + Send>,
}

impl ModelDownload {
    /// Creates a download from a descriptor and a body stream.
    pub fn new(descriptor: RemoteModelDescriptor, body: impl Read + Send + 'static) -> Self {
        Self {
            descriptor,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for ModelDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDownload")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// The remote model service.
pub trait RemoteModelClient: Send + Sync {
    /// Requests the latest model. Non-2xx answers are errors.
    fn fetch_latest(&self) -> SyncResult<ModelDownload>;
}

impl<T: RemoteModelClient + ?Sized> RemoteModelClient for Arc<T> {
    fn fetch_latest(&self) -> SyncResult<ModelDownload> {
        (**self).fetch_latest()
    }
}

/// A mock profile service for testing.
///
/// Records every accepted payload and can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct MockProfileClient {
    accepted: Mutex<Vec<ProfilePayload>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MockProfileClient {
    /// Creates a mock that accepts every push.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail with a retryable transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of calls made, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Payloads accepted so far, oldest first.
    pub fn accepted(&self) -> Vec<ProfilePayload> {
        self.accepted.lock().clone()
    }

    /// The remote's current view: the last accepted payload.
    pub fn current(&self) -> Option<ProfilePayload> {
        self.accepted.lock().last().cloned()
    }

    fn check(&self) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("mock remote unavailable"));
        }
        Ok(())
    }
}

impl RemoteProfileClient for MockProfileClient {
    fn push_profile(&self, payload: &ProfilePayload) -> SyncResult<()> {
        self.check()?;
        self.accepted.lock().push(payload.clone());
        Ok(())
    }

    fn delete_profile(&self, id: &str) -> SyncResult<bool> {
        self.check()?;
        let mut accepted = self.accepted.lock();
        let before = accepted.len();
        accepted.retain(|p| p.id != id);
        Ok(accepted.len() != before)
    }
}

#[derive(Debug, Default)]
struct MockModel {
    body: Vec<u8>,
    advertised: Option<ContentHash>,
    fail_body_after: Option<usize>,
}

/// A mock model service for testing.
///
/// By default the advertised hash matches the body. Tests can override the
/// hash, drop it, cut the body short or fail the request.
#[derive(Debug, Default)]
pub struct MockModelClient {
    model: Mutex<MockModel>,
    failing: AtomicBool,
    fetches: AtomicUsize,
    bytes_read: Arc<AtomicUsize>,
}

impl MockModelClient {
    /// Creates a mock serving `body` with its correct hash.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        let client = Self::default();
        client.set_body(body);
        client
    }

    /// Replaces the served body and advertises its correct hash.
    pub fn set_body(&self, body: impl Into<Vec<u8>>) {
        let body = body.into();
        let mut model = self.model.lock();
        model.advertised = Some(ContentHash::of_bytes(&body));
        model.body = body;
    }

    /// Overrides the advertised hash. `None` omits the header.
    pub fn set_advertised(&self, sha256: Option<ContentHash>) {
        self.model.lock().advertised = sha256;
    }

    /// Makes the body fail with an I/O error after `bytes` bytes.
    pub fn fail_body_after(&self, bytes: Option<usize>) {
        self.model.lock().fail_body_after = bytes;
    }

    /// Makes subsequent requests fail with a retryable transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of requests made, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Total body bytes handed out across all requests.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::SeqCst)
    }
}

impl RemoteModelClient for MockModelClient {
    fn fetch_latest(&self) -> SyncResult<ModelDownload> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("mock remote unavailable"));
        }

        let model = self.model.lock();
        let body = MockBody {
            data: Cursor::new(model.body.clone()),
            fail_after: model.fail_body_after,
            counter: Arc::clone(&self.bytes_read),
        };
        Ok(ModelDownload::new(
            RemoteModelDescriptor {
                sha256: model.advertised.clone(),
            },
            body,
        ))
    }
}

struct MockBody {
    data: Cursor<Vec<u8>>,
    fail_after: Option<usize>,
    counter: Arc<AtomicUsize>,
}

impl Read for MockBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let position = self.data.position() as usize;
        let limit = match self.fail_after {
            Some(limit) if position >= limit => {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by mock",
                ))
            }
            Some(limit) => (limit - position).min(buf.len()),
            None => buf.len(),
        };
        let n = self.data.read(&mut buf[..limit])?;
        self.counter.fetch_add(n, Ordering::SeqCst);
        Ok(n)
    }
}
