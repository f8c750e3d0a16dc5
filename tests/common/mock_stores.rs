//! Mock collaborator stores.
//!
//! Each mock records the ops it was asked to apply and appends its step name
//! to a shared call log, so tests can assert both the payloads and the
//! cross-collaborator ordering. Failures are configurable per store.

use bookmark_merge::completion::{
    BufferCompletionOp, LocalOverrideCompletionOp, UpstreamCompletionOp,
};
use bookmark_merge::guid::Guid;
use bookmark_merge::item::{BookmarkItem, Timestamp};
use bookmark_merge::store::{
    BookmarkStorer, BoxFuture, BufferStore, ItemSource, LocalBookmarkStore, StoreError,
    UploadOutcome,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Step names in the order the collaborators were invoked.
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn logged_calls(log: &CallLog) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

/// Remote-write mock with optimistic-concurrency checking.
pub struct MockStorer {
    log: CallLog,
    /// Pretend server-side modification time. An op whose precondition is
    /// older than this is rejected like a 412.
    server_modified: Timestamp,
    fail: bool,
    applied: Mutex<Vec<UpstreamCompletionOp>>,
}

impl MockStorer {
    pub fn new(log: CallLog, server_modified: Timestamp) -> Self {
        Self {
            log,
            server_modified,
            fail: false,
            applied: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn failing(log: CallLog) -> Self {
        Self {
            log,
            server_modified: 0,
            fail: true,
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn applied(&self) -> Vec<UpstreamCompletionOp> {
        self.applied.lock().unwrap().clone()
    }
}

impl BookmarkStorer for MockStorer {
    fn apply_upstream_op<'a>(
        &'a self,
        op: &'a UpstreamCompletionOp,
    ) -> BoxFuture<'a, UploadOutcome> {
        Box::pin(async move {
            self.log.lock().unwrap().push("upstream");
            if self.fail {
                return Err(StoreError("upstream unavailable".to_string()));
            }
            if let Some(since) = op.if_unmodified_since {
                if since < self.server_modified {
                    return Err(StoreError(format!(
                        "precondition failed: server at {}, caller expected {}",
                        self.server_modified, since
                    )));
                }
            }
            self.applied.lock().unwrap().push(op.clone());
            Ok(UploadOutcome {
                modified: self.server_modified + 1000,
            })
        })
    }
}

/// Local overlay store mock.
pub struct MockLocalStore {
    log: CallLog,
    fail: bool,
    applied: Mutex<Vec<(LocalOverrideCompletionOp, Option<Timestamp>)>>,
}

impl MockLocalStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail: false,
            applied: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn failing(log: CallLog) -> Self {
        Self {
            log,
            fail: true,
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn applied(&self) -> Vec<(LocalOverrideCompletionOp, Option<Timestamp>)> {
        self.applied.lock().unwrap().clone()
    }
}

impl LocalBookmarkStore for MockLocalStore {
    fn apply_local_override_op<'a>(
        &'a self,
        op: &'a LocalOverrideCompletionOp,
        modified: Option<Timestamp>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.log.lock().unwrap().push("local");
            if self.fail {
                return Err(StoreError("local store unavailable".to_string()));
            }
            self.applied.lock().unwrap().push((op.clone(), modified));
            Ok(())
        })
    }
}

/// Buffer store mock.
pub struct MockBufferStore {
    log: CallLog,
    fail: bool,
    applied: Mutex<Vec<BufferCompletionOp>>,
}

impl MockBufferStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail: false,
            applied: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn failing(log: CallLog) -> Self {
        Self {
            log,
            fail: true,
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn applied(&self) -> Vec<BufferCompletionOp> {
        self.applied.lock().unwrap().clone()
    }
}

impl BufferStore for MockBufferStore {
    fn apply_buffer_op<'a>(&'a self, op: &'a BufferCompletionOp) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.log.lock().unwrap().push("buffer");
            if self.fail {
                return Err(StoreError("buffer store unavailable".to_string()));
            }
            self.applied.lock().unwrap().push(op.clone());
            Ok(())
        })
    }
}

/// Item source preloaded with records, keyed by GUID.
pub struct MockItemSource {
    items: HashMap<Guid, BookmarkItem>,
    fail: bool,
}

impl MockItemSource {
    pub fn new(items: impl IntoIterator<Item = BookmarkItem>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.guid.clone(), item))
                .collect(),
            fail: false,
        }
    }

    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            items: HashMap::new(),
            fail: true,
        }
    }
}

impl ItemSource for MockItemSource {
    fn get_buffer_item<'a>(&'a self, guid: &'a Guid) -> BoxFuture<'a, Option<BookmarkItem>> {
        Box::pin(async move {
            if self.fail {
                return Err(StoreError("item source unavailable".to_string()));
            }
            Ok(self.items.get(guid).cloned())
        })
    }

    fn get_buffer_items<'a>(
        &'a self,
        guids: &'a [Guid],
    ) -> BoxFuture<'a, HashMap<Guid, BookmarkItem>> {
        Box::pin(async move {
            if self.fail {
                return Err(StoreError("item source unavailable".to_string()));
            }
            Ok(guids
                .iter()
                .filter_map(|g| self.items.get(g).map(|i| (g.clone(), i.clone())))
                .collect())
        })
    }
}
