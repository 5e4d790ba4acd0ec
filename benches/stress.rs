use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, TimeDelta};

use roomslot::calendar::FixedClock;
use roomslot::engine::{Engine, EngineError};
use roomslot::model::{BookingRequest, PriorityTier, Requester, TimeRange};
use roomslot::store::WalStore;

/// Full-day placements that fit on one date.
const SLOTS_PER_DAY: usize = 6;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn first_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 19).unwrap()
}

fn nth_date(n: usize) -> NaiveDate {
    first_date() + TimeDelta::days(n as i64)
}

fn request(date: NaiveDate, i: usize) -> BookingRequest {
    BookingRequest {
        requester: Requester {
            name: format!("Bench {i}"),
            email: format!("bench{i}@example.cl"),
        },
        date,
        preferred: TimeRange::business_day(),
        tier: PriorityTier::Team,
        attendees: 5,
        purpose: "load test".to_string(),
    }
}

fn open_engine(name: &str) -> (Arc<WalStore>, Arc<Engine>) {
    let dir = std::env::temp_dir().join("roomslot_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    let store = Arc::new(WalStore::open(&path).unwrap());
    let now = NaiveDate::from_ymd_opt(2025, 3, 10)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let engine = Engine::new(store.clone(), Arc::new(FixedClock::new(now)));
    (store, Arc::new(engine))
}

async fn phase1_sequential() {
    let (_, engine) = open_engine("phase1.wal");
    let n = 1200;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        engine.submit(request(nth_date(i / SLOTS_PER_DAY), i)).await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("submit latency", &mut latencies);
}

async fn phase2_concurrent_dates() {
    let (_, engine) = open_engine("phase2.wal");
    let n_tasks = 10;
    let dates_per_task = 20;

    let start = Instant::now();
    let mut handles = Vec::new();
    for task in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            for d in 0..dates_per_task {
                let date = nth_date(task * dates_per_task + d);
                for k in 0..SLOTS_PER_DAY {
                    engine.submit(request(date, k)).await.unwrap();
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * dates_per_task * SLOTS_PER_DAY;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {dates_per_task} dates = {total} bookings in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_contended_date() {
    let (_, engine) = open_engine("phase3.wal");
    let n_tasks = 64;

    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let t = Instant::now();
            let result = engine.submit(request(first_date(), i)).await;
            (result, t.elapsed())
        }));
    }

    let mut latencies = Vec::with_capacity(n_tasks);
    let mut placed = 0;
    let mut rejected = 0;
    for h in handles {
        let (result, latency) = h.await.unwrap();
        latencies.push(latency);
        match result {
            Ok(_) => placed += 1,
            Err(EngineError::Rejected(_)) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(placed, SLOTS_PER_DAY);

    println!(
        "  {n_tasks} requests on one date: {placed} placed, {rejected} rejected in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    print_latency("contended submit latency", &mut latencies);
}

async fn phase4_compaction() {
    let (store, engine) = open_engine("phase4.wal");
    for i in 0..600 {
        engine.submit(request(nth_date(i / SLOTS_PER_DAY), i)).await.unwrap();
    }
    let appends = store.appends_since_compact().await;
    let t = Instant::now();
    store.compact().await.unwrap();
    println!(
        "  compacted {appends} log entries in {:.2}ms",
        t.elapsed().as_secs_f64() * 1000.0
    );
}

#[tokio::main]
async fn main() {
    println!("=== roomslot stress benchmark ===\n");

    println!("[phase 1] sequential submissions across dates");
    phase1_sequential().await;

    println!("\n[phase 2] concurrent submissions, one date per task at a time");
    phase2_concurrent_dates().await;

    println!("\n[phase 3] contention on a single date");
    phase3_contended_date().await;

    println!("\n[phase 4] log compaction");
    phase4_compaction().await;

    println!("\n=== benchmark complete ===");
}
