/*!
 * Shaper - Main Entry Point
 *
 * Runs a shaper against the system clock with synthetic traffic:
 * - Loads the schedule from the path in argv[1] or SHAPER_CONFIG
 * - Falls back to a two-class 1ms cycle when neither is given
 * - Drains queues on every gate change and prints a JSON state dump
 */

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use time_aware_shaper::{
    init_tracing, EntryConfig, Packet, QueueLayout, Shaper, ShaperConfig, ShaperTask, SystemClock,
};

const CONFIG_ENV: &str = "SHAPER_CONFIG";

fn load_config() -> anyhow::Result<ShaperConfig> {
    let path = std::env::args().nth(1).or_else(|| std::env::var(CONFIG_ENV).ok());
    match path {
        Some(path) => ShaperConfig::from_file(&path).with_context(|| format!("loading {}", path)),
        None => Ok(ShaperConfig::new(
            vec![EntryConfig::new(0b01, 300_000), EntryConfig::new(0b10, 700_000)],
            0,
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config()?;
    info!(entries = config.entries.len(), mode = config.flags.mode_str(), "configuration loaded");

    let shaper = Arc::new(
        Shaper::builder()
            .with_clock(Arc::new(SystemClock))
            .with_layout(QueueLayout::one_queue_per_class(2))
            .with_link_speed(1_000)
            .build()?,
    );
    let task = ShaperTask::spawn(shaper.clone());
    task.change(config).await?;

    let producer = {
        let shaper = shaper.clone();
        tokio::spawn(async move {
            for i in 0..2_000u32 {
                let priority = i % 2;
                shaper.enqueue(Packet::with_len(priority, 200 + (i as usize % 5) * 100).on_queue(priority as usize));
                tokio::time::sleep(Duration::from_micros(50)).await;
            }
        })
    };

    let consumer = {
        let shaper = shaper.clone();
        tokio::spawn(async move {
            let mut sent = 0usize;
            let deadline = tokio::time::Instant::now() + Duration::from_millis(250);
            while tokio::time::Instant::now() < deadline {
                while shaper.dequeue().is_some() {
                    sent += 1;
                }
                let _ = tokio::time::timeout(Duration::from_millis(1), shaper.tx_ready().notified()).await;
            }
            sent
        })
    };

    producer.await.context("producer task")?;
    let sent = consumer.await.context("consumer task")?;
    info!(sent, backlog = shaper.backlog(), "traffic finished");

    task.shutdown().await;
    println!("{}", shaper.dump_state().to_json());
    Ok(())
}
