//! FlagKit decision engine lab
//!
//! Verification and throughput script for the engine.
//! Run with: cargo run --release --example sdk-lab [datafile.json] [users]

use flagkit_engine::{
    Attributes, Client, ClientOptions, DecideOption, DecideOptions, DecisionSource, Event,
    EventSendFuture, EventSender, ProjectConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PASS: &str = "\x1b[32m[PASS]\x1b[0m";
const FAIL: &str = "\x1b[31m[FAIL]\x1b[0m";

const BUILTIN_DATAFILE: &str = include_str!("../tests/fixtures/project.json");
const DEFAULT_USERS: usize = 100_000;

#[tokio::main]
async fn main() {
    println!("=== FlagKit Decision Engine Lab ===\n");

    let mut passed = 0;
    let mut failed = 0;

    macro_rules! pass {
        ($test:expr) => {{
            println!("{} {}", PASS, $test);
            passed += 1;
        }};
    }

    macro_rules! fail {
        ($test:expr) => {{
            println!("{} {}", FAIL, $test);
            failed += 1;
        }};
    }

    let mut args = std::env::args().skip(1);
    let datafile = match args.next() {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                fail!(format!("Reading {} - {}", path, e));
                print_summary(passed, failed);
                std::process::exit(1);
            }
        },
        None => BUILTIN_DATAFILE.to_string(),
    };
    let users = args
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(DEFAULT_USERS);

    // Test 1: Configuration load
    println!("Testing configuration...");
    let config = match ProjectConfig::from_json(&datafile) {
        Ok(config) => {
            pass!(format!(
                "Datafile loaded (revision {}, {} flags)",
                config.revision(),
                config.flags().len()
            ));
            config
        }
        Err(e) => {
            fail!(format!("Datafile load - {}", e));
            print_summary(passed, failed);
            std::process::exit(1);
        }
    };
    let flag_keys: Vec<String> = config.flags().iter().map(|f| f.key.clone()).collect();
    let Some(flag_key) = flag_keys.first().cloned() else {
        fail!("Datafile declares no flags");
        print_summary(passed, failed);
        std::process::exit(1);
    };

    let client = match Client::builder(config)
        .options(ClientOptions::builder().event_batch_size(500).build())
        .build()
    {
        Ok(client) => {
            pass!("Client construction");
            client
        }
        Err(e) => {
            fail!(format!("Client construction - {}", e));
            print_summary(passed, failed);
            std::process::exit(1);
        }
    };

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let sender: EventSender = Arc::new(move |batch: Vec<Event>| -> EventSendFuture {
        counter.fetch_add(batch.len(), Ordering::Relaxed);
        Box::pin(async { Ok(()) })
    });
    client.start_event_delivery(sender);

    // Test 2: Determinism
    println!("\nTesting decisions on \"{}\"...", flag_key);
    let user = client.create_user_context("lab-user-42", Attributes::new());
    let first = user.decide(&flag_key, DecideOption::IgnoreCache);
    let stable = (0..100).all(|_| user.decide(&flag_key, DecideOption::IgnoreCache) == first);
    if stable {
        pass!(format!("Repeated decisions agree (variation \"{}\")", first.variation_key));
    } else {
        fail!("Repeated decisions disagree");
    }

    // Test 3: Event option does not change the answer
    let quiet = user.decide(&flag_key, DecideOption::DisableDecisionEvent | DecideOption::IgnoreCache);
    if quiet == first {
        pass!("DisableDecisionEvent leaves the decision unchanged");
    } else {
        fail!("DisableDecisionEvent changed the decision");
    }

    // Test 4: Unknown flag
    let missing = user.decide("lab-missing-flag", DecideOptions::empty());
    if !missing.enabled && missing.source == DecisionSource::Default && !missing.reasons.is_empty() {
        pass!("Unknown flag yields a disabled default decision");
    } else {
        fail!(format!("Unknown flag - unexpected decision {:?}", missing));
    }

    // Test 5: decide_all
    let all = user.decide_all(DecideOption::DisableDecisionEvent);
    if all.len() == flag_keys.len() {
        pass!(format!("decide_all() returned {} decisions", all.len()));
    } else {
        fail!(format!(
            "decide_all() - expected {} decisions, got {}",
            flag_keys.len(),
            all.len()
        ));
    }

    // Test 6: Throughput
    println!("\nMeasuring throughput over {} users...", users);
    let started = Instant::now();
    let mut distribution: HashMap<String, usize> = HashMap::new();
    for n in 0..users {
        let context = client.create_user_context(format!("user{}", n), Attributes::new());
        let decision = context.decide(&flag_key, DecideOption::DisableDecisionEvent);
        *distribution.entry(decision.variation_key).or_default() += 1;
    }
    let elapsed = started.elapsed();
    let rate = users as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    pass!(format!(
        "{} decisions in {:.2?} ({:.0} decisions/s)",
        users, elapsed, rate
    ));

    let mut variations: Vec<_> = distribution.into_iter().collect();
    variations.sort();
    for (variation, count) in variations {
        println!(
            "    {:<20} {:>8} ({:.2}%)",
            variation,
            count,
            count as f64 * 100.0 / users.max(1) as f64
        );
    }

    // Test 7: Event delivery
    println!("\nTesting event delivery...");
    for n in 0..10 {
        client
            .create_user_context(format!("event-user{}", n), Attributes::new())
            .decide(&flag_key, DecideOptions::empty());
    }
    let queued = client.event_queue().map(|q| q.queue_size()).unwrap_or(0);
    client.close().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let sent = delivered.load(Ordering::Relaxed);
    if sent >= queued {
        pass!(format!("close() delivered {} events", sent));
    } else {
        fail!(format!("close() - {} queued but {} delivered", queued, sent));
    }

    print_summary(passed, failed);

    if failed > 0 {
        println!("\n\x1b[31mSome verifications failed!\x1b[0m");
        std::process::exit(1);
    } else {
        println!("\n\x1b[32mAll verifications passed!\x1b[0m");
        std::process::exit(0);
    }
}

fn print_summary(passed: i32, failed: i32) {
    println!("\n{}", "=".repeat(40));
    println!("Results: {} passed, {} failed", passed, failed);
    println!("{}", "=".repeat(40));
}
