//! Play run statistics

use crate::player::Pin;

/// Summary of a full play run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayReport {
    /// Time spent turning the timeline JSON into a sorted play list
    pub json_processing_ms: u64,
    /// Messages accepted into the play list
    pub total_validated: u64,
    /// Messages rejected during ingestion
    pub total_incorrect: u64,
    /// Cumulative lateness beyond the jitter threshold
    pub total_drag_ms: f64,
    /// Sum of per-pin delays
    pub total_delay_ms: f64,
    pub maximum_delay_ms: f64,
    pub minimum_delay_ms: f64,
    pub average_delay_ms: f64,
    /// Population standard deviation of per-pin delays
    pub sd_delay_ms: f64,
}

impl PlayReport {
    /// Human-readable stats block for verbose runs
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Data stats reporting:\n");
        out.push_str(&format!(
            "\tMessages processing time (ms):       {:>10}\n",
            self.json_processing_ms
        ));
        out.push_str(&format!(
            "\tTotal validated messages (accepted): {:>10}\n",
            self.total_validated
        ));
        out.push_str(&format!(
            "\tTotal incorrect messages (excluded): {:>10}\n",
            self.total_incorrect
        ));
        out.push_str("Delay stats reporting:\n");
        out.push_str(&format!(
            "\tTotal drag (ms):                   {:>12.3}\n",
            self.total_drag_ms
        ));
        out.push_str(&format!(
            "\tCumulative delay (ms):             {:>12.3}\n",
            self.total_delay_ms
        ));
        out.push_str(&format!(
            "\tMaximum delay (ms):                {:>12.3}\n",
            self.maximum_delay_ms
        ));
        out.push_str(&format!(
            "\tMinimum delay (ms):                {:>12.3}\n",
            self.minimum_delay_ms
        ));
        out.push_str(&format!(
            "\tAverage delay (ms):                {:>12.3}\n",
            self.average_delay_ms
        ));
        out.push_str(&format!(
            "\tStandard deviation of delays (ms): {:>12.3}\n",
            self.sd_delay_ms
        ));
        out
    }
}

/// Aggregate the processed pins into the final report.
///
/// Delay statistics are computed in two passes: totals and maximum first,
/// then minimum (seeded from the maximum) and the population variance.
/// With no processed pins all delay figures stay zero.
pub(crate) fn summarise(
    processed: &[Pin],
    json_processing_ms: u64,
    total_validated: u64,
    total_incorrect: u64,
    total_drag_ms: f64,
) -> PlayReport {
    let mut report = PlayReport {
        json_processing_ms,
        total_validated,
        total_incorrect,
        total_drag_ms,
        ..PlayReport::default()
    };

    let delays: Vec<f64> = processed.iter().filter_map(Pin::delay_ms).collect();
    if delays.is_empty() {
        return report;
    }

    for &delay in &delays {
        report.total_delay_ms += delay;
        report.maximum_delay_ms = report.maximum_delay_ms.max(delay);
    }

    report.minimum_delay_ms = report.maximum_delay_ms;
    report.average_delay_ms = report.total_delay_ms / delays.len() as f64;

    let mut squared = 0.0;
    for &delay in &delays {
        report.minimum_delay_ms = report.minimum_delay_ms.min(delay);
        squared += (delay - report.average_delay_ms).powi(2);
    }
    report.sd_delay_ms = (squared / delays.len() as f64).sqrt();

    report
}
