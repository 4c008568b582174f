//! Scheduler and real-time play loop
//!
//! Takes the unsorted play list from ingestion, time-sorts it and walks it
//! with a monotonic clock: sleep precisely to each pin's target instant,
//! transmit, measure the slippage, and carry any lateness beyond the jitter
//! threshold forward as drag so late pins do not compound. Peer discovery
//! rides along inside the sleep windows.

pub mod report;
pub mod timing;

pub use report::PlayReport;

use bytes::Bytes;
use std::time::Instant;

use crate::constants::{self, DRAG_THRESHOLD_MS};
use crate::error::Result;
use crate::ingest;
use crate::net::discovery::discovery_tick;
use crate::net::registry::DeviceId;
use crate::net::socket::TalkieSocket;
use crate::player::timing::precision_sleep;

/// A scheduled transmission unit
///
/// Immutable in its schedule and payload once enqueued; the measured delay
/// is written exactly once, after emission.
#[derive(Debug)]
pub struct Pin {
    time_ms: f64,
    device: DeviceId,
    payload: Bytes,
    delay_ms: Option<f64>,
}

impl Pin {
    pub(crate) fn new(time_ms: f64, device: DeviceId, payload: Bytes) -> Self {
        Self {
            time_ms,
            device,
            payload,
            delay_ms: None,
        }
    }

    /// Target wall-offset from player start, in milliseconds
    pub fn time_ms(&self) -> f64 {
        self.time_ms
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Final checksum-stamped wire bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Measured emission slippage, present once the pin has been played
    pub fn delay_ms(&self) -> Option<f64> {
        self.delay_ms
    }

    pub(crate) fn record_delay(&mut self, delay_ms: f64) {
        debug_assert!(self.delay_ms.is_none());
        self.delay_ms = Some(delay_ms);
    }
}

/// The timed dispatch engine
pub struct Player {
    delay_ms: f64,
    verbose: bool,
}

impl Player {
    /// `delay_ms` is added to every scheduled time in the timeline.
    pub fn new(delay_ms: f64, verbose: bool) -> Self {
        Self { delay_ms, verbose }
    }

    /// Ingest the timeline and play it to completion.
    ///
    /// Fails only when the shared socket cannot be initialised; once the
    /// play loop has started every error is logged and absorbed.
    pub fn play(&self, json_text: &str) -> Result<PlayReport> {
        let mut socket = TalkieSocket::initialise()?;
        Ok(self.play_on(json_text, &mut socket))
    }

    pub(crate) fn play_on(&self, json_text: &str, socket: &mut TalkieSocket) -> PlayReport {
        if self.verbose {
            println!("JsonTalkiePlayer version: {}", constants::VERSION);
        }

        let processing_start = Instant::now();
        let outcome = ingest::build_play_list(json_text, self.delay_ms, socket);
        let mut pins = outcome.pins;
        // Stable sort: equal times keep their timeline order
        pins.sort_by(|a, b| a.time_ms().total_cmp(&b.time_ms()));
        let json_processing_ms = processing_start.elapsed().as_millis() as u64;

        if pins.is_empty() {
            let report = report::summarise(
                &[],
                json_processing_ms,
                outcome.total_validated,
                outcome.total_incorrect,
                0.0,
            );
            self.finish(&report);
            return report;
        }

        let last_time_ms = pins[pins.len() - 1].time_ms();
        let duration_sec = (last_time_ms / 1000.0).round() as u64;
        tracing::info!(
            pins = pins.len(),
            "playing for {} minutes and {} seconds",
            duration_sec / 60,
            duration_sec % 60
        );
        if self.verbose {
            println!(
                "The data will now be played during {} minutes and {} seconds...",
                duration_sec / 60,
                duration_sec % 60
            );
        }

        let playing_start = Instant::now();
        let mut total_drag_ms = 0.0_f64;
        let mut processed: Vec<Pin> = Vec::with_capacity(pins.len());

        for mut pin in pins {
            let target_us = target_us(pin.time_ms(), total_drag_ms);
            let elapsed_us = playing_start.elapsed().as_micros() as i64;
            let sleep_us = (target_us - elapsed_us).max(0) as u64;

            precision_sleep(sleep_us, || {
                if !socket.registry().all_names_resolved() {
                    discovery_tick(socket);
                }
            });

            let pluck_elapsed_us = playing_start.elapsed().as_micros() as i64;
            socket.send_to_device(pin.device(), pin.payload());

            let delay_ms = (pluck_elapsed_us - target_us) as f64 / 1000.0;
            pin.record_delay(delay_ms);
            processed.push(pin);

            total_drag_ms += drag_increment(delay_ms);
        }

        let report = report::summarise(
            &processed,
            json_processing_ms,
            outcome.total_validated,
            outcome.total_incorrect,
            total_drag_ms,
        );
        self.finish(&report);
        report
    }

    fn finish(&self, report: &PlayReport) {
        tracing::info!(
            validated = report.total_validated,
            incorrect = report.total_incorrect,
            total_drag_ms = report.total_drag_ms,
            average_delay_ms = report.average_delay_ms,
            "play finished"
        );
        if self.verbose {
            print!("{}", report.render());
        }
    }
}

/// Absolute target instant for a pin, in microseconds since playing start
fn target_us(time_ms: f64, total_drag_ms: f64) -> i64 {
    ((time_ms + total_drag_ms) * 1000.0).round() as i64
}

/// Drag contributed by one emission: only lateness beyond the jitter
/// threshold counts, anything under it is tolerated as jitter.
fn drag_increment(delay_ms: f64) -> f64 {
    (delay_ms - DRAG_THRESHOLD_MS).max(0.0)
}

/// Engine entry point with a C-shaped signature.
///
/// Returns 0 on success (an empty play list is a success), non-zero when
/// the engine cannot start. Never panics and never lets an error escape;
/// a fatal setup failure prints one diagnostic line on stderr.
pub fn play_list(json_text: &str, delay_ms: f64, verbose: bool) -> i32 {
    match Player::new(delay_ms, verbose).play(json_text) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("talkie-player: {e}");
            1
        }
    }
}
