use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use roomslot::calendar::FixedClock;
use roomslot::engine::{Engine, EngineError, Rejection};
use roomslot::model::{BookingRequest, PriorityTier, Requester, TimeRange};
use roomslot::store::{BookingStore, WalStore};

// ── Test infrastructure ──────────────────────────────────────

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomslot_int_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn monday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 10)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn meeting() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 19).unwrap()
}

fn slot(start: &str, end: &str) -> TimeRange {
    TimeRange::parse(start, end).unwrap()
}

fn request(tier: PriorityTier, preferred: TimeRange, who: usize) -> BookingRequest {
    BookingRequest {
        requester: Requester {
            name: format!("Requester {who}"),
            email: format!("requester{who}@example.cl"),
        },
        date: meeting(),
        preferred,
        tier,
        attendees: 6,
        purpose: format!("Meeting {who}"),
    }
}

fn open_engine(path: &PathBuf) -> (Arc<WalStore>, Arc<Engine>) {
    let store = Arc::new(WalStore::open(path).unwrap());
    let engine = Engine::new(store.clone(), Arc::new(FixedClock::new(monday_morning())));
    (store, Arc::new(engine))
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_survive_restart() {
    let path = test_wal_path("concurrent_restart.wal");
    let (_, engine) = open_engine(&path);

    let handles: Vec<_> = (0..12)
        .map(|who| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .submit(request(PriorityTier::Team, TimeRange::business_day(), who))
                    .await
            })
        })
        .collect();

    let mut placed = Vec::new();
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(p) => placed.push(p.booking),
            Err(EngineError::Rejected(Rejection::NoAvailability)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(placed.len(), 6);
    placed.sort_by_key(|b| b.assigned);

    let (store, reopened) = open_engine(&path);
    let stored = store.load_bookings(Some(meeting())).await.unwrap();
    assert_eq!(stored.len(), 6);
    assert_eq!(reopened.bookings_on(meeting()).await.unwrap(), placed);
    assert_eq!(
        reopened.next_id(meeting()).await.unwrap().as_str(),
        "RES-20250319-007"
    );
    assert!(reopened
        .free_slots(meeting(), TimeRange::business_day())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn relocation_is_durable() {
    let path = test_wal_path("relocation_durable.wal");
    let (_, engine) = open_engine(&path);

    let general = engine
        .submit(request(PriorityTier::General, slot("09:00", "10:30"), 1))
        .await
        .unwrap();
    assert_eq!(general.assigned, slot("09:00", "10:30"));

    let urgent = engine
        .submit(request(PriorityTier::Supervision, slot("09:00", "10:30"), 2))
        .await
        .unwrap();
    assert_eq!(urgent.assigned, slot("09:00", "10:30"));
    assert_eq!(urgent.relocated.len(), 1);

    let (_, reopened) = open_engine(&path);
    let day: Vec<_> = reopened
        .bookings_on(meeting())
        .await
        .unwrap()
        .into_iter()
        .map(|b| (b.id.to_string(), b.assigned))
        .collect();
    assert_eq!(
        day,
        vec![
            ("RES-20250319-002".to_string(), Some(slot("09:00", "10:30"))),
            ("RES-20250319-001".to_string(), Some(slot("10:30", "12:00"))),
        ]
    );
}

#[tokio::test]
async fn compaction_keeps_relocated_ranges() {
    let path = test_wal_path("compaction.wal");
    let (store, engine) = open_engine(&path);

    engine
        .submit(request(PriorityTier::General, slot("08:00", "09:30"), 1))
        .await
        .unwrap();
    engine
        .submit(request(PriorityTier::Community, slot("08:00", "09:30"), 2))
        .await
        .unwrap();
    assert_eq!(store.appends_since_compact().await, 3);

    store.compact().await.unwrap();
    assert_eq!(store.appends_since_compact().await, 0);

    let (_, reopened) = open_engine(&path);
    let day: Vec<_> = reopened
        .bookings_on(meeting())
        .await
        .unwrap()
        .into_iter()
        .map(|b| (b.id.to_string(), b.assigned))
        .collect();
    assert_eq!(
        day,
        vec![
            ("RES-20250319-002".to_string(), Some(slot("08:00", "09:30"))),
            ("RES-20250319-001".to_string(), Some(slot("09:30", "11:00"))),
        ]
    );
}
