//! Timer example: a heartbeat whose cadence changes, plus a one-shot timeout

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempo_rs::prelude::*;

fn main() {
    tracing_subscriber::fmt().with_env_filter("tempo_rs=info").init();

    println!("=== Timer Example ===\n");

    let executor = Arc::new(TimerExecutor::with_threads(1).expect("Failed to start executor"));
    let started = Instant::now();

    let beats = Arc::new(AtomicUsize::new(0));
    let mut heartbeat = Timer::repeating(executor.clone());
    let b = beats.clone();
    heartbeat.start(50, move || {
        let n = b.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[{:>4}ms] heartbeat {}", started.elapsed().as_millis(), n);
    });

    let mut timeout = Timer::once(executor.clone());
    timeout.start(300, move || {
        println!("[{:>4}ms] request timed out", started.elapsed().as_millis());
    });

    std::thread::sleep(Duration::from_millis(200));
    println!("slowing heartbeat to 150ms");
    heartbeat.set_interval(150);

    std::thread::sleep(Duration::from_millis(600));
    heartbeat.stop();
    println!(
        "\nheartbeat stopped after {} beats; timeout running: {}",
        beats.load(Ordering::SeqCst),
        timeout.is_running()
    );

    let stats = executor.stats();
    println!(
        "fires: {}, max lateness: {}us",
        stats.executed, stats.max_delay_us
    );
    println!("\n=== Example Complete ===");
}
