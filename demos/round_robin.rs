//! Grouped pool example: two groups sharing one worker

use std::time::Duration;
use tempo_rs::prelude::*;

const DOWNLOADS: GroupId = 1;
const THUMBNAILS: GroupId = 2;

fn main() {
    tracing_subscriber::fmt().with_env_filter("tempo_rs=debug").init();

    println!("=== Grouped Round-Robin Example ===\n");

    let pool = GroupedThreadPool::with_threads(1).expect("Failed to create pool");
    pool.add_group(DOWNLOADS);
    pool.add_group(THUMBNAILS);

    // A long burst in one group does not hold the other back.
    for i in 0..5 {
        pool.execute_back(DOWNLOADS, move || {
            println!("[DOWNLOAD] chunk {}", i);
            std::thread::sleep(Duration::from_millis(20));
        })
        .expect("submit failed");
    }
    for i in 0..2 {
        pool.execute_back(THUMBNAILS, move || {
            println!("[THUMB] image {}", i);
            std::thread::sleep(Duration::from_millis(20));
        })
        .expect("submit failed");
    }

    let urgent = pool
        .submit_front(THUMBNAILS, || {
            println!("[THUMB] urgent preview");
            "preview ready"
        })
        .expect("submit failed");
    println!("urgent result: {}", urgent.join().expect("task failed"));

    pool.shutdown(true);

    let stats = pool.stats();
    println!(
        "\nexecuted {} tasks, avg queue delay {}us, p99 {}us",
        stats.executed, stats.avg_delay_us, stats.p99_delay_us
    );
    println!("\n=== Example Complete ===");
}
