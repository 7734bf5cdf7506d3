use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use crate::journal::{Journal, JournalWriter};
use crate::model::*;
use crate::repository::*;

use super::availability::count_overlapping;

/// Journal writer plus the gate that keeps compaction from snapshotting the
/// maps while an acknowledged record is still on its way into them.
struct Durability {
    writer: JournalWriter,
    gate: RwLock<()>,
}

/// `DashMap`-backed implementation of every repository the engine consumes.
///
/// With a journal attached, each write is made durable by the journal writer
/// thread before it is applied, and `open` rebuilds the maps by replaying the
/// journal. Writes to one booking are serialized by the engine's per-resource
/// admission lock, so journal order and map order agree for every entity.
pub struct MemoryStore {
    resources: DashMap<ResourceId, Resource>,
    bookings: DashMap<BookingId, Booking>,
    /// Booking ids per resource, for overlap counting.
    by_resource: DashMap<ResourceId, Vec<BookingId>>,
    payments: DashMap<PaymentId, Payment>,
    durability: Option<Durability>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store: state is lost on drop.
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            bookings: DashMap::new(),
            by_resource: DashMap::new(),
            payments: DashMap::new(),
            durability: None,
        }
    }

    /// Durable store backed by the journal at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let (journal, records) = Journal::open(path)?;
        let mut store = Self::new();
        for record in records {
            store.apply(record);
        }
        store.durability = Some(Durability {
            writer: JournalWriter::spawn(journal)?,
            gate: RwLock::new(()),
        });
        info!(
            path = %path.display(),
            resources = store.resources.len(),
            bookings = store.bookings.len(),
            "store replayed"
        );
        Ok(store)
    }

    /// Journal first, then apply.
    async fn commit(&self, record: StoreRecord) -> RepoResult<()> {
        match &self.durability {
            Some(durability) => {
                let _gate = durability.gate.read().await;
                durability.writer.append(record.clone()).await?;
                self.apply(record);
            }
            None => self.apply(record),
        }
        Ok(())
    }

    fn apply(&self, record: StoreRecord) {
        match record {
            StoreRecord::ResourceUpserted(resource) => {
                self.resources.insert(resource.id, resource);
            }
            StoreRecord::BookingSaved(booking) => {
                let (id, resource_id) = (booking.id, booking.resource_id);
                match self.bookings.insert(id, booking) {
                    Some(old) if old.resource_id == resource_id => {}
                    Some(old) => {
                        self.unindex(old.resource_id, id);
                        self.by_resource.entry(resource_id).or_default().push(id);
                    }
                    None => self.by_resource.entry(resource_id).or_default().push(id),
                }
            }
            StoreRecord::BookingDeleted { id } => {
                if let Some((_, old)) = self.bookings.remove(&id) {
                    self.unindex(old.resource_id, id);
                }
            }
            StoreRecord::PaymentSaved(payment) => {
                self.payments.insert(payment.id, payment);
            }
        }
    }

    fn unindex(&self, resource_id: ResourceId, id: BookingId) {
        if let Some(mut ids) = self.by_resource.get_mut(&resource_id) {
            ids.retain(|b| *b != id);
        }
    }

    fn booking_ids_on(&self, resource_id: ResourceId) -> Vec<BookingId> {
        self.by_resource
            .get(&resource_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default()
    }

    // ── Seeding / collaborator writes ────────────────────────

    pub async fn upsert_resource(&self, resource: Resource) -> RepoResult<()> {
        self.commit(StoreRecord::ResourceUpserted(resource)).await
    }

    pub async fn save_payment(&self, payment: Payment) -> RepoResult<()> {
        self.commit(StoreRecord::PaymentSaved(payment)).await
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    /// Snapshot of every booking on a resource, in no particular order.
    pub fn bookings_on(&self, resource_id: ResourceId) -> Vec<Booking> {
        self.booking_ids_on(resource_id)
            .iter()
            .filter_map(|id| self.bookings.get(id).map(|e| e.value().clone()))
            .collect()
    }

    // ── Journal maintenance ──────────────────────────────────

    pub async fn appends_since_compact(&self) -> u64 {
        match &self.durability {
            Some(durability) => durability.writer.appends_since_compact().await,
            None => 0,
        }
    }

    /// Rewrite the journal with one record per live entity.
    pub async fn compact(&self) -> RepoResult<()> {
        let Some(durability) = &self.durability else {
            return Ok(());
        };
        // No commit is between its append and its apply while this is held.
        let _gate = durability.gate.write().await;
        let mut records: Vec<StoreRecord> =
            Vec::with_capacity(self.resources.len() + self.bookings.len() + self.payments.len());
        records.extend(self.resources.iter().map(|e| StoreRecord::ResourceUpserted(e.value().clone())));
        records.extend(self.bookings.iter().map(|e| StoreRecord::BookingSaved(e.value().clone())));
        records.extend(self.payments.iter().map(|e| StoreRecord::PaymentSaved(e.value().clone())));
        let count = records.len();
        durability.writer.compact(records).await?;
        info!(records = count, path = %durability.writer.path().display(), "journal compacted");
        Ok(())
    }
}

fn paginate(mut items: Vec<Booking>, page: PageRequest) -> Page<Booking> {
    items.sort_by(|a, b| page.sort.compare(a, b));
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset())
        .take(page.size as usize)
        .collect();
    Page {
        items,
        number: page.number,
        size: page.size,
        total,
    }
}

#[async_trait]
impl ResourceRepository for MemoryStore {
    async fn find_by_id(&self, id: ResourceId) -> RepoResult<Option<Resource>> {
        Ok(self.resources.get(&id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn find_by_id(&self, id: BookingId) -> RepoResult<Option<Booking>> {
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn save(&self, booking: &Booking) -> RepoResult<()> {
        self.commit(StoreRecord::BookingSaved(booking.clone())).await
    }

    async fn delete(&self, id: BookingId) -> RepoResult<()> {
        self.commit(StoreRecord::BookingDeleted { id }).await
    }

    async fn count_overlapping(
        &self,
        resource_id: ResourceId,
        stay: Stay,
        excluded: &[BookingStatus],
        exclude_id: Option<BookingId>,
    ) -> RepoResult<u32> {
        let ids = self.booking_ids_on(resource_id);
        let on_resource: Vec<_> = ids.iter().filter_map(|id| self.bookings.get(id)).collect();
        Ok(count_overlapping(
            on_resource.iter().map(|e| e.value()),
            resource_id,
            &stay,
            excluded,
            exclude_id,
        ))
    }

    async fn find_by_user_and_status(
        &self,
        user_id: UserId,
        status: BookingStatus,
        page: PageRequest,
    ) -> RepoResult<Page<Booking>> {
        let items = self
            .bookings
            .iter()
            .filter(|e| e.value().user_id == user_id && e.value().status == status)
            .map(|e| e.value().clone())
            .collect();
        Ok(paginate(items, page))
    }

    async fn find_by_user(&self, user_id: UserId, page: PageRequest) -> RepoResult<Page<Booking>> {
        let items = self
            .bookings
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(paginate(items, page))
    }

    async fn find_expired_candidates(
        &self,
        excluded: &[BookingStatus],
        cutoff: NaiveDate,
    ) -> RepoResult<Vec<Booking>> {
        let mut found: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| {
                let b = e.value();
                !b.deleted && !excluded.contains(&b.status) && b.stay.ends_on_or_before(cutoff)
            })
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|b| (b.stay.check_out, b.id));
        Ok(found)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn count_pending_for_user(&self, user_id: UserId) -> RepoResult<u64> {
        let n = self
            .payments
            .iter()
            .filter(|e| e.value().user_id == user_id && e.value().status == PaymentStatus::Pending)
            .count();
        Ok(n as u64)
    }
}

/// Background task: compact the journal once it has grown by `threshold`
/// appends. Checks every `every`; stops when `shutdown` flips to true.
pub async fn run_compactor(
    store: Arc<MemoryStore>,
    threshold: u64,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        if store.appends_since_compact().await < threshold {
            continue;
        }
        if let Err(e) = store.compact().await {
            warn!(error = %e, "journal compaction failed");
        }
    }
}
