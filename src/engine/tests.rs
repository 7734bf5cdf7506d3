use super::conflict::{check_capacity, validate_stay};
use super::*;
use crate::cache::{booking_detail_key, BookingKey, InMemoryCache};
use crate::clock::FixedClock;
use crate::limits::MAX_STAY_NIGHTS;
use crate::messages;
use crate::notify::NotifyHub;
use crate::repository::BookingRepository;

use chrono::{Days, NaiveDate};
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};
use ulid::Ulid;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, day).unwrap()
}

fn stay(a: NaiveDate, b: NaiveDate) -> Stay {
    Stay::try_new(a, b).unwrap()
}

// ── Pure checks ──────────────────────────────────────────

#[test]
fn validate_stay_requires_checkout_after_checkin() {
    assert!(validate_stay(d(6, 1), d(6, 2)).is_ok());
    assert!(matches!(
        validate_stay(d(6, 2), d(6, 2)),
        Err(EngineError::InvalidDateRange { .. })
    ));
    assert!(matches!(
        validate_stay(d(6, 3), d(6, 2)),
        Err(EngineError::InvalidDateRange { .. })
    ));
}

#[test]
fn validate_stay_caps_length() {
    let start = d(1, 1);
    let longest = start + Days::new(MAX_STAY_NIGHTS as u64);
    assert_eq!(validate_stay(start, longest).unwrap().nights(), MAX_STAY_NIGHTS);
    assert!(matches!(
        validate_stay(start, longest + Days::new(1)),
        Err(EngineError::InvalidDateRange { reason: "stay too long", .. })
    ));
}

#[test]
fn capacity_check_at_boundary() {
    let resource = Resource::new(Ulid::new(), None, 3);
    let s = stay(d(6, 1), d(6, 4));
    assert!(check_capacity(&resource, &s, 2).is_ok());
    match check_capacity(&resource, &s, 3) {
        Err(EngineError::CapacityExceeded { overlapping, availability, .. }) => {
            assert_eq!((overlapping, availability), (3, 3));
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
}

#[test]
fn zero_availability_admits_nothing() {
    let resource = Resource::new(Ulid::new(), None, 0);
    assert!(check_capacity(&resource, &stay(d(6, 1), d(6, 2)), 0).is_err());
}

// ── Async engine tests ───────────────────────────────────

struct Fixture {
    store: Arc<MemoryStore>,
    cache: Arc<InMemoryCache>,
    clock: Arc<FixedClock>,
    engine: Arc<BookingEngine>,
    notes: broadcast::Receiver<String>,
}

impl Fixture {
    async fn flush(&self) {
        self.engine.effects().flush().await;
    }

    fn drain_notes(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(m) = self.notes.try_recv() {
            out.push(m);
        }
        out
    }

    async fn resource(&self, availability: u32) -> ResourceId {
        let id = Ulid::new();
        self.store
            .upsert_resource(Resource::new(id, Some("Sea view".into()), availability))
            .await
            .unwrap();
        id
    }

    async fn stored(&self, id: BookingId) -> Booking {
        BookingRepository::find_by_id(self.store.as_ref(), id).await.unwrap().unwrap()
    }
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let hub = Arc::new(NotifyHub::new());
    let notes = hub.subscribe();
    let (effects, _worker) = EffectDispatcher::spawn(Cache::new(cache.clone()), hub, 256);
    let clock = Arc::new(FixedClock::on(d(6, 1)));
    let engine = Arc::new(
        BookingEngine::with_store(store.clone(), Cache::new(cache.clone()), effects).with_clock(clock.clone()),
    );
    Fixture {
        store,
        cache,
        clock,
        engine,
        notes,
    }
}

fn guest() -> User {
    User::user(Ulid::new())
}

fn admin() -> User {
    User::admin(Ulid::new())
}

fn set_status(status: &str) -> UpdateBooking {
    UpdateBooking {
        status: Some(status.into()),
        ..Default::default()
    }
}

fn move_to(check_in: NaiveDate, check_out: NaiveDate) -> UpdateBooking {
    UpdateBooking {
        check_in: Some(check_in),
        check_out: Some(check_out),
        status: None,
    }
}

#[tokio::test]
async fn create_admits_pending_booking() {
    let mut f = fixture();
    let rid = f.resource(1).await;
    let user = guest();

    let view = f.engine.create(&user, d(6, 10), d(6, 13), rid).await.unwrap();
    assert_eq!(view.status, BookingStatus::Pending);
    assert_eq!(view.nights, 3);
    assert_eq!(view.user_id, user.id);

    let stored = f.stored(view.id).await;
    assert_eq!(stored.created_at, f.clock.now());
    assert!(!stored.deleted);

    f.flush().await;
    let notes = f.drain_notes();
    assert_eq!(notes, vec![messages::booking_created(&stored)]);
}

#[tokio::test]
async fn create_fills_capacity_then_rejects() {
    let f = fixture();
    let rid = f.resource(2).await;

    f.engine.create(&guest(), d(6, 10), d(6, 15), rid).await.unwrap();
    f.engine.create(&guest(), d(6, 12), d(6, 14), rid).await.unwrap();
    let err = f.engine.create(&guest(), d(6, 13), d(6, 20), rid).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::CapacityExceeded { overlapping: 2, availability: 2, .. }
    ));
    assert_eq!(f.store.booking_count(), 2);
}

#[tokio::test]
async fn back_to_back_stays_share_a_unit() {
    let f = fixture();
    let rid = f.resource(1).await;
    assert_ok!(f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await);
    assert_ok!(f.engine.create(&guest(), d(6, 12), d(6, 14), rid).await);
    assert_ok!(f.engine.create(&guest(), d(6, 8), d(6, 10), rid).await);
    assert_err!(f.engine.create(&guest(), d(6, 11), d(6, 12), rid).await);
}

#[tokio::test]
async fn canceled_booking_releases_capacity() {
    let f = fixture();
    let rid = f.resource(1).await;
    let user = guest();
    let first = assert_ok!(f.engine.create(&user, d(6, 10), d(6, 12), rid).await);
    assert_err!(f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await);

    assert_ok!(f.engine.cancel(&user, first.id).await);
    assert_ok!(f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await);
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let f = fixture();
    let rid = f.resource(1).await;

    assert!(matches!(
        f.engine.create(&guest(), d(6, 12), d(6, 12), rid).await,
        Err(EngineError::InvalidDateRange { .. })
    ));
    assert!(matches!(
        f.engine.create(&guest(), d(6, 10), d(6, 12), Ulid::new()).await,
        Err(EngineError::NotFound { entity: Entity::Resource, .. })
    ));

    let mut gone = Resource::new(Ulid::new(), None, 5);
    gone.deleted = true;
    let gone_id = gone.id;
    f.store.upsert_resource(gone).await.unwrap();
    assert!(matches!(
        f.engine.create(&guest(), d(6, 10), d(6, 12), gone_id).await,
        Err(EngineError::NotFound { entity: Entity::Resource, .. })
    ));
    assert_eq!(f.store.booking_count(), 0);
}

#[tokio::test]
async fn pending_payment_blocks_new_bookings() {
    let f = fixture();
    let rid = f.resource(5).await;
    let user = guest();
    let first = f.engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();
    f.store
        .save_payment(Payment {
            id: Ulid::new(),
            booking_id: first.id,
            user_id: user.id,
            status: PaymentStatus::Pending,
        })
        .await
        .unwrap();

    let err = f.engine.create(&user, d(7, 1), d(7, 3), rid).await.unwrap_err();
    assert!(matches!(err, EngineError::PendingPaymentConflict(id) if id == user.id));
    assert_eq!(f.store.booking_count(), 1);

    // Other users are unaffected.
    assert!(f.engine.create(&guest(), d(7, 1), d(7, 3), rid).await.is_ok());
}

#[tokio::test]
async fn settled_payment_does_not_block() {
    let f = fixture();
    let rid = f.resource(5).await;
    let user = guest();
    f.store
        .save_payment(Payment {
            id: Ulid::new(),
            booking_id: Ulid::new(),
            user_id: user.id,
            status: PaymentStatus::Paid,
        })
        .await
        .unwrap();
    assert!(f.engine.create(&user, d(7, 1), d(7, 3), rid).await.is_ok());
}

#[tokio::test]
async fn concurrent_creates_never_overbook() {
    let f = fixture();
    let rid = f.resource(1).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = f.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.create(&guest(), d(6, 10), d(6, 12), rid).await
        }));
    }
    let mut admitted = 0;
    let mut rejected = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(EngineError::CapacityExceeded { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((admitted, rejected), (1, 15));

    let stays: Vec<Stay> = f.store.bookings_on(rid).iter().map(|b| b.stay).collect();
    assert_eq!(peak_occupancy(&stays), 1);
}

// ── Updates ──────────────────────────────────────────────

#[tokio::test]
async fn owner_can_reschedule_over_own_dates() {
    let f = fixture();
    let rid = f.resource(1).await;
    let user = guest();
    let b = f.engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();

    // Overlaps only itself, so a single-unit resource still fits it.
    let moved = f.engine.update_as_user(&user, b.id, move_to(d(6, 11), d(6, 14))).await.unwrap();
    assert_eq!((moved.check_in, moved.check_out), (d(6, 11), d(6, 14)));
    assert_eq!(moved.status, BookingStatus::Pending);

    let only_out = UpdateBooking {
        check_out: Some(d(6, 15)),
        ..Default::default()
    };
    let extended = f.engine.update_as_user(&user, b.id, only_out).await.unwrap();
    assert_eq!((extended.check_in, extended.check_out), (d(6, 11), d(6, 15)));
}

#[tokio::test]
async fn reschedule_into_full_window_is_rejected() {
    let f = fixture();
    let rid = f.resource(1).await;
    let user = guest();
    f.engine.create(&guest(), d(6, 20), d(6, 25), rid).await.unwrap();
    let b = f.engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();

    let err = f.engine.update_as_user(&user, b.id, move_to(d(6, 21), d(6, 23))).await.unwrap_err();
    assert!(matches!(err, EngineError::CapacityExceeded { .. }));
    assert_eq!(f.stored(b.id).await.stay, stay(d(6, 10), d(6, 12)));
}

#[tokio::test]
async fn user_update_rules() {
    let f = fixture();
    let rid = f.resource(2).await;
    let owner = guest();
    let b = f.engine.create(&owner, d(6, 10), d(6, 12), rid).await.unwrap();

    assert!(matches!(
        f.engine.update_as_user(&guest(), b.id, move_to(d(6, 11), d(6, 13))).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        f.engine.update_as_user(&owner, b.id, set_status("CONFIRMED")).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        f.engine.update_as_user(&owner, b.id, move_to(d(6, 14), d(6, 13))).await,
        Err(EngineError::InvalidDateRange { .. })
    ));
    assert!(matches!(
        f.engine.update_as_user(&owner, Ulid::new(), move_to(d(6, 11), d(6, 13))).await,
        Err(EngineError::NotFound { entity: Entity::Booking, .. })
    ));
    assert_eq!(f.stored(b.id).await.stay, stay(d(6, 10), d(6, 12)));
}

#[tokio::test]
async fn admin_confirms_and_notifies() {
    let mut f = fixture();
    let rid = f.resource(1).await;
    let b = f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await.unwrap();
    f.flush().await;
    f.drain_notes();

    let confirmed = f.engine.update_as_admin(b.id, set_status("confirmed")).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    f.flush().await;
    assert_eq!(f.drain_notes(), vec![messages::booking_confirmed(&f.stored(b.id).await)]);

    // Dates alone: no status change, no notification.
    f.engine.update_as_admin(b.id, move_to(d(6, 11), d(6, 13))).await.unwrap();
    f.flush().await;
    assert!(f.drain_notes().is_empty());
    assert_eq!(f.stored(b.id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn admin_rejects_unknown_and_reserved_statuses() {
    let f = fixture();
    let rid = f.resource(1).await;
    let b = f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await.unwrap();

    let before = f.stored(b.id).await;
    for status in ["bogus", "EXPIRED", "PENDING", "pending"] {
        assert!(matches!(
            f.engine.update_as_admin(b.id, set_status(status)).await,
            Err(EngineError::InvalidTransition(_))
        ));
    }
    assert_eq!(f.stored(b.id).await, before);

    f.engine.update_as_admin(b.id, set_status("CONFIRMED")).await.unwrap();
    assert!(matches!(
        f.engine.update_as_admin(b.id, set_status("PENDING")).await,
        Err(EngineError::InvalidTransition(_))
    ));
    assert_eq!(f.stored(b.id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn admin_cancel_soft_deletes_and_freezes() {
    let mut f = fixture();
    let rid = f.resource(1).await;
    let b = f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await.unwrap();
    f.flush().await;
    f.drain_notes();

    let canceled = f.engine.update_as_admin(b.id, set_status("CANCELLED")).await.unwrap();
    assert_eq!(canceled.status, BookingStatus::Canceled);
    assert!(f.stored(b.id).await.deleted);
    f.flush().await;
    assert_eq!(f.drain_notes().len(), 1);

    assert!(matches!(
        f.engine.update_as_admin(b.id, set_status("CONFIRMED")).await,
        Err(EngineError::InvalidTransition(_))
    ));
    assert!(matches!(
        f.engine.update_as_admin(b.id, move_to(d(6, 20), d(6, 22))).await,
        Err(EngineError::InvalidTransition(_))
    ));
}

// ── Cancel ───────────────────────────────────────────────

#[tokio::test]
async fn cancel_by_owner_then_again() {
    let mut f = fixture();
    let rid = f.resource(1).await;
    let user = guest();
    let b = f.engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();

    assert!(matches!(
        f.engine.cancel(&guest(), b.id).await,
        Err(EngineError::Forbidden(_))
    ));

    let canceled = f.engine.cancel(&user, b.id).await.unwrap();
    assert_eq!(canceled.status, BookingStatus::Canceled);
    let stored = f.stored(b.id).await;
    assert!(stored.deleted);

    assert!(matches!(
        f.engine.cancel(&user, b.id).await,
        Err(EngineError::AlreadyTerminal { state: "canceled", .. })
    ));

    f.flush().await;
    let notes = f.drain_notes();
    assert_eq!(notes.last(), Some(&messages::booking_canceled(&stored)));
}

#[tokio::test]
async fn admin_may_cancel_any_booking() {
    let f = fixture();
    let rid = f.resource(1).await;
    let b = f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await.unwrap();
    assert!(f.engine.cancel(&admin(), b.id).await.is_ok());
}

#[tokio::test]
async fn expired_booking_cannot_be_canceled() {
    let f = fixture();
    let rid = f.resource(1).await;
    let user = guest();
    let b = f.engine.create(&user, d(6, 1), d(6, 3), rid).await.unwrap();

    f.clock.advance_days(5);
    let expired = f.engine.expire(b.id, d(6, 5)).await.unwrap().unwrap();
    assert_eq!(expired.status, BookingStatus::Expired);

    assert!(matches!(
        f.engine.cancel(&user, b.id).await,
        Err(EngineError::AlreadyTerminal { state: "expired", .. })
    ));
    assert!(matches!(
        f.engine.update_as_user(&user, b.id, move_to(d(6, 20), d(6, 22))).await,
        Err(EngineError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn expire_skips_ineligible_bookings() {
    let f = fixture();
    let rid = f.resource(2).await;
    let user = guest();
    let future = f.engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();
    let canceled = f.engine.create(&user, d(6, 1), d(6, 2), rid).await.unwrap();
    f.engine.cancel(&user, canceled.id).await.unwrap();

    assert!(f.engine.expire(future.id, d(6, 5)).await.unwrap().is_none());
    assert!(f.engine.expire(canceled.id, d(6, 5)).await.unwrap().is_none());
    assert!(f.engine.expire(Ulid::new(), d(6, 5)).await.unwrap().is_none());
    assert_eq!(f.stored(future.id).await.status, BookingStatus::Pending);
}

// ── Reads and caching ────────────────────────────────────

#[tokio::test]
async fn get_by_id_respects_ownership() {
    let f = fixture();
    let rid = f.resource(1).await;
    let owner = guest();
    let b = f.engine.create(&owner, d(6, 10), d(6, 12), rid).await.unwrap();

    assert_eq!(f.engine.get_by_id_for_user(&owner, b.id).await.unwrap(), b);
    assert_eq!(f.engine.get_by_id_for_user(&admin(), b.id).await.unwrap(), b);
    assert_eq!(f.engine.get_by_id_for_admin(b.id).await.unwrap(), b);
    assert!(matches!(
        f.engine.get_by_id_for_user(&guest(), b.id).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        f.engine.get_by_id_for_admin(Ulid::new()).await,
        Err(EngineError::NotFound { entity: Entity::Booking, .. })
    ));
}

#[tokio::test]
async fn detail_reads_go_through_cache() {
    let f = fixture();
    let rid = f.resource(1).await;
    let b = f.engine.create(&guest(), d(6, 10), d(6, 12), rid).await.unwrap();
    f.flush().await;

    assert!(!f.cache.contains_key(&booking_detail_key(b.id)));
    f.engine.get_by_id_for_admin(b.id).await.unwrap();
    assert!(f.cache.contains_key(&booking_detail_key(b.id)));

    f.engine.update_as_admin(b.id, set_status("CONFIRMED")).await.unwrap();
    f.flush().await;
    assert!(!f.cache.contains_key(&booking_detail_key(b.id)));
    assert_eq!(
        f.engine.get_by_id_for_admin(b.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn can_user_modify_checks_owner() {
    let f = fixture();
    let rid = f.resource(1).await;
    let owner = guest();
    let b = f.engine.create(&owner, d(6, 10), d(6, 12), rid).await.unwrap();
    assert!(f.engine.can_user_modify(&owner, b.id).await.unwrap());
    assert!(!f.engine.can_user_modify(&guest(), b.id).await.unwrap());
    assert!(!f.engine.can_user_modify(&owner, Ulid::new()).await.unwrap());
}

#[tokio::test]
async fn list_is_served_from_cache_until_invalidated() {
    let f = fixture();
    let rid = f.resource(3).await;
    let user = guest();
    f.engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();
    f.flush().await;

    let page = PageRequest::new(0, 10);
    let key = BookingKey::new(page).user(user.id).build();
    let first = f.engine.list_by_user(&user, page).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(f.cache.contains_key(&key));

    // A write behind the engine's back is invisible while the entry lives.
    let sneaky = Booking::pending(Ulid::new(), rid, user.id, stay(d(7, 1), d(7, 2)), f.clock.now());
    f.store.save(&sneaky).await.unwrap();
    assert_eq!(f.engine.list_by_user(&user, page).await.unwrap(), first);

    // Any engine write clears every booking key.
    f.engine.create(&user, d(8, 1), d(8, 2), rid).await.unwrap();
    f.flush().await;
    assert!(!f.cache.contains_key(&key));
    assert_eq!(f.engine.list_by_user(&user, page).await.unwrap().len(), 3);
}

#[tokio::test]
async fn cancel_clears_cached_list_even_when_effect_queue_is_full() {
    use crate::notify::{Notifier, NotifyError};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Notifier for Gate {
        async fn send(&self, message: &str) -> Result<(), NotifyError> {
            if message == "hold" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(())
        }
    }

    let store = Arc::new(MemoryStore::new());
    let cache = Cache::in_memory();
    let gate = Arc::new(Gate::default());
    let (effects, _worker) = EffectDispatcher::spawn(cache.clone(), gate.clone(), 1);
    let engine = BookingEngine::with_store(store.clone(), cache, effects);
    let rid = Ulid::new();
    store.upsert_resource(Resource::new(rid, None, 1)).await.unwrap();

    let user = guest();
    let page = PageRequest::new(0, 10);
    let b = engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();
    engine.effects().flush().await;
    assert_eq!(engine.list_by_user(&user, page).await.unwrap()[0].status, BookingStatus::Pending);

    engine.effects().submit(Effect::Notify("hold".into()));
    gate.entered.notified().await;
    engine.effects().submit(Effect::Notify("filler".into()));

    engine.cancel(&user, b.id).await.unwrap();
    gate.release.notify_one();
    engine.effects().flush().await;

    let listed = engine.list_by_user(&user, page).await.unwrap();
    assert_eq!(listed[0].status, BookingStatus::Canceled);
}

#[tokio::test]
async fn empty_lists_are_not_served_from_cache() {
    let f = fixture();
    let rid = f.resource(1).await;
    let user = guest();
    let page = PageRequest::new(0, 10);

    assert!(f.engine.list_by_user(&user, page).await.unwrap().is_empty());
    let b = Booking::pending(Ulid::new(), rid, user.id, stay(d(7, 1), d(7, 2)), f.clock.now());
    f.store.save(&b).await.unwrap();
    assert_eq!(f.engine.list_by_user(&user, page).await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_by_status_filters_and_pages() {
    let f = fixture();
    let rid = f.resource(10).await;
    let user = guest();
    let mut ids = Vec::new();
    for day in 1..=5 {
        ids.push(f.engine.create(&user, d(7, day), d(7, day + 1), rid).await.unwrap().id);
    }
    f.engine.update_as_admin(ids[1], set_status("CONFIRMED")).await.unwrap();
    f.engine.update_as_admin(ids[3], set_status("CONFIRMED")).await.unwrap();
    f.flush().await;

    let confirmed = f
        .engine
        .list_by_user_and_status(user.id, BookingStatus::Confirmed, PageRequest::new(0, 10))
        .await
        .unwrap();
    assert_eq!(confirmed.iter().map(|v| v.id).collect::<Vec<_>>(), vec![ids[1], ids[3]]);

    let second_page = f
        .engine
        .list_by_user_and_status(user.id, BookingStatus::Pending, PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, ids[4]);
}

#[tokio::test]
async fn mutations_survive_cache_outage() {
    use crate::cache::{CacheError, CacheStore};
    use async_trait::async_trait;

    struct Down;

    #[async_trait]
    impl CacheStore for Down {
        async fn set(&self, _: &str, _: String) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _: &str) -> Result<bool, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn delete_by_pattern(&self, _: &str) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    let store = Arc::new(MemoryStore::new());
    let cache = Cache::new(Arc::new(Down));
    let (effects, _worker) = EffectDispatcher::spawn(cache.clone(), Arc::new(NotifyHub::new()), 16);
    let engine = BookingEngine::with_store(store.clone(), cache, effects);
    let rid = Ulid::new();
    store.upsert_resource(Resource::new(rid, None, 1)).await.unwrap();

    let user = guest();
    let b = engine.create(&user, d(6, 10), d(6, 12), rid).await.unwrap();
    assert_eq!(engine.get_by_id_for_user(&user, b.id).await.unwrap(), b);
    assert_eq!(engine.list_by_user(&user, PageRequest::new(0, 5)).await.unwrap(), vec![b.clone()]);
    engine.cancel(&user, b.id).await.unwrap();
    engine.effects().flush().await;
}
