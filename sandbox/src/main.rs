// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Tickbus Sandbox
// Producer threads feed the bus while the main thread ticks it once per frame.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tickbus_core::{
    callback, create_event_struct2, global, BusConfig, Event, EventContext, EventStruct,
    EventType, Payload,
};
use tickbus_telemetry::{logging, ScopedTickTimer, TickStats};

const DOWNLOAD_FINISHED: EventType = EventType(1);
const PROGRESS: EventType = EventType(2);
const CANCELLED_WORK: EventType = EventType(3);

#[derive(Debug)]
struct Download {
    producer: u64,
    status: u16,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive a tickbus from several producer threads")]
struct Args {
    /// Number of frames to tick before shutting down.
    #[arg(long, default_value_t = 30)]
    frames: usize,

    /// Number of producer threads.
    #[arg(long, default_value_t = 3)]
    producers: usize,

    /// Frame duration in milliseconds.
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Optional JSON bus configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log a summary after every tick.
    #[arg(long)]
    verbose_ticks: bool,
}

fn load_config(args: &Args) -> Result<BusConfig> {
    let mut config = match &args.config {
        Some(path) => BusConfig::from_json_file(path)
            .with_context(|| format!("reading bus config {}", path.display()))?,
        None => BusConfig::default(),
    };
    config.log_tick_summary |= args.verbose_ticks;
    Ok(config)
}

fn spawn_producer(
    bus: EventContext,
    running: Arc<AtomicBool>,
    frame: Duration,
) -> thread::JoinHandle<Result<()>> {
    thread::spawn(move || {
        let id = bus.next_producer_id();
        let mut step = 0u16;
        while running.load(Ordering::Relaxed) {
            step = step.wrapping_add(1);
            bus.enqueue(
                Event::new(PROGRESS)
                    .from_producer(id)
                    .with_payload(Payload::owned(step)),
            )?;
            if step % 10 == 0 {
                let url = format!("http://localhost/{id}/{step}");
                let payload = create_event_struct2(
                    Download {
                        producer: id.raw(),
                        status: 200,
                    },
                    Some(&url),
                    None,
                )?
                .into_payload();
                bus.enqueue(
                    Event::new(DOWNLOAD_FINISHED)
                        .from_producer(id)
                        .with_payload(payload),
                )?;
            }
            // Work nobody will ever see: retracted before the next tick.
            bus.enqueue(Event::new(CANCELLED_WORK).from_producer(id))?;
            bus.remove_by_type(CANCELLED_WORK);
            thread::sleep(frame / 2);
        }
        Ok(())
    })
}

fn main() -> Result<()> {
    logging::init("info");
    let args = Args::parse();
    let config = load_config(&args)?;

    let bus = global::init(config)?;
    let stats = TickStats::attach(&bus, 64);

    let downloads = Arc::new(AtomicUsize::new(0));
    {
        let downloads = Arc::clone(&downloads);
        bus.register(
            callback(move |d| {
                if let Some(done) = d.payload_as::<EventStruct<Download, 2>>() {
                    downloads.fetch_add(1, Ordering::Relaxed);
                    log::debug!(
                        "producer {} finished {} with status {}",
                        done.body.producer,
                        done.field(0).unwrap_or("<unknown>"),
                        done.body.status
                    );
                }
            }),
            None,
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let frame = Duration::from_millis(args.frame_ms);
    let producers: Vec<_> = (0..args.producers)
        .map(|_| spawn_producer(bus.clone(), Arc::clone(&running), frame))
        .collect();

    log::info!(
        "Ticking {} frames with {} producers.",
        args.frames,
        args.producers
    );
    for _ in 0..args.frames {
        {
            let _timer = ScopedTickTimer::new(&stats).with_budget(frame);
            bus.tick();
        }
        thread::sleep(frame);
    }

    running.store(false, Ordering::Relaxed);
    for producer in producers {
        producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))??;
    }
    // Drain what the producers left behind.
    bus.tick();

    let frame_time = stats.frame_time();
    log::info!(
        "{} ticks, {} events delivered, {} downloads, mean frame {}us (max {}us).",
        stats.ticks_observed(),
        stats.total_delivered(),
        downloads.load(Ordering::Relaxed),
        frame_time.mean_us(),
        frame_time.max_us
    );
    if let Some(report) = stats.latest() {
        log::info!("Last tick: {report:?}");
    }

    stats.detach(&bus);
    global::shutdown();
    Ok(())
}
