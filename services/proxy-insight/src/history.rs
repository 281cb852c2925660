//! Paginated, query-scoped working set of transaction records
//!
//! The cache does no I/O itself. It hands out [`PageRequest`]s and accepts
//! their results later; every request carries the query epoch it was issued
//! under, and a result whose epoch no longer matches is dropped. Query
//! changes are debounced against caller-supplied instants so the timing is
//! driven by whoever owns the clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::record::{RecordId, TransactionRecord};

/// Records requested per page
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Quiet period after the last query edit before it is committed
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Upper bound on loaded records kept under live prepends
pub const DEFAULT_MAX_RECORDS: usize = 500;

/// A pull the cache wants issued against the paginated store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub epoch: u64,
    pub query: String,
    pub limit: usize,
    pub offset: usize,
}

/// What happened to a pull result handed back to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Records were appended for the current query
    Applied { received: usize, exhausted: bool },
    /// The query changed (or the cache was cleared) since the request was issued
    Stale,
    /// The pull failed; the cursor is unchanged and loading may be retried
    Failed,
}

#[derive(Debug, Clone)]
struct PendingQuery {
    query: String,
    deadline: Instant,
}

/// Query-scoped record cache with offset pagination
#[derive(Debug, Clone)]
pub struct HistoryCache {
    query: String,
    offset: usize,
    page_size: usize,
    max_records: usize,
    debounce: Duration,
    records: VecDeque<Arc<TransactionRecord>>,
    exhausted: bool,
    in_flight: bool,
    epoch: u64,
    next_local: u64,
    revision: u64,
    pending: Option<PendingQuery>,
}

impl HistoryCache {
    pub fn new(page_size: usize, debounce: Duration, max_records: usize) -> Self {
        Self {
            query: String::new(),
            offset: 0,
            page_size: page_size.max(1),
            max_records: max_records.max(1),
            debounce,
            records: VecDeque::new(),
            exhausted: false,
            in_flight: false,
            epoch: 0,
            next_local: 0,
            revision: 0,
            pending: None,
        }
    }

    /// Start pulling the next page, unless exhausted or a pull is outstanding
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if self.exhausted {
            tracing::debug!("History exhausted for query {:?}; not loading", self.query);
            return None;
        }
        if self.in_flight {
            tracing::debug!("History pull already in flight; ignoring load request");
            return None;
        }

        self.in_flight = true;
        Some(PageRequest {
            epoch: self.epoch,
            query: self.query.clone(),
            limit: self.page_size,
            offset: self.offset,
        })
    }

    /// Apply the records returned for `request`
    pub fn complete_load(
        &mut self,
        request: &PageRequest,
        records: Vec<TransactionRecord>,
    ) -> PageOutcome {
        if request.epoch != self.epoch {
            tracing::debug!(
                "Discarding {} records for stale query {:?} (epoch {} != {})",
                records.len(),
                request.query,
                request.epoch,
                self.epoch
            );
            return PageOutcome::Stale;
        }

        let received = records.len();
        self.in_flight = false;
        self.offset += received;
        for mut record in records {
            if record.id == RecordId::Unassigned {
                self.next_local += 1;
                record.id = RecordId::Local(self.next_local);
            }
            self.records.push_back(Arc::new(record));
        }
        self.revision += 1;
        if received < request.limit {
            self.exhausted = true;
        }

        tracing::debug!(
            "Loaded {} records for query {:?}; offset={} exhausted={}",
            received,
            self.query,
            self.offset,
            self.exhausted
        );
        PageOutcome::Applied {
            received,
            exhausted: self.exhausted,
        }
    }

    /// Record that the pull for `request` failed
    pub fn fail_load(&mut self, request: &PageRequest) -> PageOutcome {
        if request.epoch != self.epoch {
            return PageOutcome::Stale;
        }
        self.in_flight = false;
        PageOutcome::Failed
    }

    /// Note a query edit made at `now`.
    ///
    /// Returns true if a commit is now pending. Editing back to the committed
    /// query cancels whatever was pending.
    pub fn set_query(&mut self, query: &str, now: Instant) -> bool {
        if query == self.query {
            if self.pending.take().is_some() {
                tracing::debug!("Query edit returned to {:?}; pending search cancelled", query);
            }
            return false;
        }

        self.pending = Some(PendingQuery {
            query: query.to_string(),
            deadline: now + self.debounce,
        });
        true
    }

    /// When the pending query becomes due, if any
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn pending_query(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.query.as_str())
    }

    /// Commit the pending query if its quiet period has elapsed by `now`.
    ///
    /// On commit the loaded set is discarded, the cursor reset and the first
    /// page of the new query requested.
    pub fn commit_due(&mut self, now: Instant) -> Option<PageRequest> {
        let due = self.pending.as_ref().is_some_and(|p| now >= p.deadline);
        if !due {
            return None;
        }

        let pending = self.pending.take()?;
        tracing::debug!("Committing search query {:?}", pending.query);
        self.start_epoch();
        self.query = pending.query;
        self.begin_load()
    }

    /// Put a freshly pushed record at the front.
    ///
    /// Does not move the pagination cursor. A record that does not match the
    /// active query is not shown. Returns the record evicted from the tail when
    /// the working set is over its bound.
    pub fn ingest_live(&mut self, record: TransactionRecord) -> Option<Arc<TransactionRecord>> {
        if !matches_query(&record, &self.query) {
            tracing::debug!("Live record {} hidden by query {:?}", record.id, self.query);
            return None;
        }

        self.records.push_front(Arc::new(record));
        self.revision += 1;
        if self.records.len() > self.max_records {
            self.records.pop_back()
        } else {
            None
        }
    }

    /// Drop everything loaded and cancel pending work. The query is kept.
    pub fn clear(&mut self) {
        self.start_epoch();
        self.pending = None;
    }

    /// [`clear`](Self::clear) and also return to the unfiltered query
    pub fn reset(&mut self) {
        self.clear();
        self.query.clear();
    }

    fn start_epoch(&mut self) {
        self.epoch += 1;
        self.revision += 1;
        self.records.clear();
        self.offset = 0;
        self.exhausted = false;
        self.in_flight = false;
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<TransactionRecord>> {
        self.records.iter()
    }

    pub fn get(&self, id: RecordId) -> Option<&Arc<TransactionRecord>> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Bumped whenever the loaded sequence changes
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl Default for HistoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_DEBOUNCE, DEFAULT_MAX_RECORDS)
    }
}

/// Case-insensitive substring match over the fields the store searches:
/// url, method, request body and response body. An empty query matches all.
pub fn matches_query(record: &TransactionRecord, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    let contains = |text: &str| text.to_lowercase().contains(&needle);

    contains(&record.url)
        || contains(&record.method)
        || record.request.body.as_deref().is_some_and(contains)
        || record.response.body.as_deref().is_some_and(contains)
}
