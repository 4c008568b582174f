//! Timeline ingestion and validation
//!
//! Walks the input JSON (an array of file objects), rejects files that do
//! not carry the expected type tags, classifies each content entry as a
//! tempo declaration or a timed message, checks the message kind against
//! the known enumeration, stamps message ids and checksums, and builds the
//! play list. Devices are created lazily on first mention; a freshly
//! created device is immediately told the file's tempo when one was
//! declared up front.
//!
//! Nothing in here is fatal: malformed files and entries are logged,
//! counted and skipped.

use serde::Deserialize;
use serde_json::Value;

use crate::constants::{FILE_TYPE, FILE_URL};
use crate::error::IngestError;
use crate::net::registry::DeviceId;
use crate::net::socket::TalkieSocket;
use crate::player::Pin;
use crate::wire::message::{stamp_payload, tempo_set_message, MessageKind};

/// A file's tempo declaration
#[derive(Debug, Clone, Copy, Deserialize)]
struct Tempo {
    bpm_numerator: i64,
    bpm_denominator: i64,
}

/// What ingestion produced: the unsorted play list plus its counters
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub pins: Vec<Pin>,
    pub total_validated: u64,
    pub total_incorrect: u64,
}

/// Build the play list from the raw timeline JSON.
///
/// `delay_ms` is the global offset added to every scheduled time. Device
/// registration and tempo transmissions go through the supplied socket.
pub fn build_play_list(
    json_text: &str,
    delay_ms: f64,
    socket: &mut TalkieSocket,
) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();

    let files: Value = match serde_json::from_str(json_text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("{}", IngestError::Json(e));
            return outcome;
        }
    };
    let Some(files) = files.as_array() else {
        tracing::warn!("timeline top level is not an array");
        return outcome;
    };

    for file in files {
        ingest_file(file, delay_ms, socket, &mut outcome);
    }
    outcome
}

fn ingest_file(file: &Value, delay_ms: f64, socket: &mut TalkieSocket, outcome: &mut IngestOutcome) {
    let filetype = file.get("filetype").and_then(Value::as_str);
    let url = file.get("url").and_then(Value::as_str);
    if filetype != Some(FILE_TYPE) || url != Some(FILE_URL) {
        let rejected = IngestError::WrongFileType(format!(
            "filetype {filetype:?}, url {url:?}"
        ));
        tracing::warn!("skipping file: {rejected}");
        return;
    }

    let content = match file.get("content").and_then(Value::as_array) {
        Some(content) if !content.is_empty() => content,
        _ => {
            tracing::warn!("file content is empty");
            return;
        }
    };

    // Only a tempo declared before the first timed message counts; a late
    // declaration cannot retroactively reach devices already playing.
    let mut tempo: Option<Tempo> = None;
    let mut seen_message = false;

    for entry in content {
        if let Some(tempo_value) = entry.get("tempo") {
            if tempo.is_none() && !seen_message {
                match serde_json::from_value::<Tempo>(tempo_value.clone()) {
                    Ok(declared) => tempo = Some(declared),
                    Err(e) => tracing::warn!("invalid tempo entry: {e}"),
                }
            }
            continue;
        }
        ingest_timed_entry(
            entry,
            delay_ms,
            tempo.as_ref(),
            socket,
            outcome,
            &mut seen_message,
        );
    }
}

fn ingest_timed_entry(
    entry: &Value,
    delay_ms: f64,
    tempo: Option<&Tempo>,
    socket: &mut TalkieSocket,
    outcome: &mut IngestOutcome,
    seen_message: &mut bool,
) {
    let (Some(port), Some(time_ms), Some(message)) = (
        entry.get("port").and_then(Value::as_u64),
        entry.get("time_ms").and_then(Value::as_f64),
        entry.get("message").and_then(Value::as_object),
    ) else {
        tracing::warn!("entry is neither a tempo nor a timed message, skipping");
        outcome.total_incorrect += 1;
        return;
    };

    let Ok(port) = u16::try_from(port) else {
        tracing::warn!(port, "port out of range");
        outcome.total_incorrect += 1;
        return;
    };

    let t_ms = time_ms + delay_ms;
    if t_ms < 0.0 {
        tracing::warn!(time_ms, "negative scheduled time");
        outcome.total_incorrect += 1;
        return;
    }

    let kind = message
        .get("m")
        .and_then(Value::as_u64)
        .and_then(MessageKind::from_u64);
    if kind.is_none() {
        let rejected = IngestError::Rejected("message kind is not recognised".to_string());
        tracing::warn!("{rejected}");
        outcome.total_incorrect += 1;
        return;
    }

    let mut payload = message.clone();
    let bytes = match stamp_payload(&mut payload, t_ms) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("failed to encode message: {e}");
            outcome.total_incorrect += 1;
            return;
        }
    };

    let (device, created) = match payload.get("t") {
        Some(Value::String(name)) => socket.registry_mut().lookup_or_create_name(name, port),
        Some(Value::Number(number)) => {
            match number.as_u64().and_then(|value| u8::try_from(value).ok()) {
                Some(channel) => socket.registry_mut().lookup_or_create_channel(channel, port),
                None => {
                    tracing::warn!(%number, "channel target out of range");
                    outcome.total_incorrect += 1;
                    return;
                }
            }
        }
        _ => {
            let rejected = IngestError::Rejected("message has no usable target tag".to_string());
            tracing::warn!("{rejected}");
            outcome.total_incorrect += 1;
            return;
        }
    };

    if created {
        if let Some(tempo) = tempo {
            send_tempo(socket, device, tempo);
        }
    }

    outcome.pins.push(Pin::new(t_ms, device, bytes));
    outcome.total_validated += 1;
    *seen_message = true;
}

/// Tell a freshly created device the file's tempo, ahead of the play loop.
fn send_tempo(socket: &TalkieSocket, device: DeviceId, tempo: &Tempo) {
    let target = socket.registry().get(device).target_tag();
    let properties = [
        ("bpm_n", tempo.bpm_numerator),
        ("bpm_d", tempo.bpm_denominator),
    ];
    for (property, value) in properties {
        match tempo_set_message(target.clone(), property, value) {
            Ok(bytes) => socket.send_to_device(device, &bytes),
            Err(e) => tracing::warn!("failed to encode tempo message: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::registry::DeviceKey;
    use crate::wire::checksum::checksum;

    fn socket() -> TalkieSocket {
        TalkieSocket::bind_to(0).unwrap()
    }

    fn timeline(content: &str) -> String {
        format!(
            r#"[{{"filetype":"{FILE_TYPE}","url":"{FILE_URL}","content":{content}}}]"#
        )
    }

    #[test]
    fn test_single_message_builds_one_pin() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":0,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 1);
        assert_eq!(outcome.total_incorrect, 0);
        assert_eq!(outcome.pins.len(), 1);

        let pin = &outcome.pins[0];
        assert_eq!(pin.time_ms(), 0.0);
        let device = socket.registry().get(pin.device());
        assert_eq!(device.key(), &DeviceKey::Name("A".to_string()));
        assert_eq!(device.port(), 5005);
        assert!(!device.is_resolved());
    }

    #[test]
    fn test_pin_payload_carries_valid_checksum() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":1234,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        let payload = outcome.pins[0].payload();
        let value: Value = serde_json::from_slice(payload).unwrap();

        assert_eq!(value.get("i").and_then(Value::as_u64), Some(1234));
        assert_eq!(
            value.get("c").and_then(Value::as_u64),
            Some(checksum(payload) as u64)
        );
    }

    #[test]
    fn test_delay_offset_shifts_times_and_ids() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":10.5,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 100.0, &mut socket);
        let pin = &outcome.pins[0];
        assert_eq!(pin.time_ms(), 110.5);

        let value: Value = serde_json::from_slice(pin.payload()).unwrap();
        assert_eq!(value.get("i").and_then(Value::as_u64), Some(110));
    }

    #[test]
    fn test_wrong_filetype_skips_file() {
        let mut socket = socket();
        let json = format!(
            r#"[{{"filetype":"Something Else","url":"{FILE_URL}","content":[{{"port":5005,"time_ms":0,"message":{{"t":"A","m":0}}}}]}}]"#
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 0);
        assert!(outcome.pins.is_empty());
        assert!(socket.registry().is_empty());
    }

    #[test]
    fn test_channel_target_uses_channel_table() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":6000,"time_ms":0,"message":{"t":7,"m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 1);
        let device = socket.registry().get(outcome.pins[0].device());
        assert_eq!(device.key(), &DeviceKey::Channel(7));
        assert_eq!(device.port(), 6000);
    }

    #[test]
    fn test_unknown_message_kind_counts_incorrect() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":0,"message":{"t":"A","m":9,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 0);
        assert_eq!(outcome.total_incorrect, 1);
        assert!(outcome.pins.is_empty());
    }

    #[test]
    fn test_missing_message_kind_counts_incorrect() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":0,"message":{"t":"A","n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_incorrect, 1);
        assert!(outcome.pins.is_empty());
    }

    #[test]
    fn test_bad_target_type_counts_incorrect() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":0,"message":{"t":true,"m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 0);
        assert_eq!(outcome.total_incorrect, 1);
        assert!(outcome.pins.is_empty());
    }

    #[test]
    fn test_channel_out_of_range_counts_incorrect() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":0,"message":{"t":256,"m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_incorrect, 1);
        assert!(outcome.pins.is_empty());
    }

    #[test]
    fn test_unparseable_timeline_yields_empty_outcome() {
        let mut socket = socket();
        let outcome = build_play_list("{not json", 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 0);
        assert!(outcome.pins.is_empty());
    }

    #[test]
    fn test_devices_are_shared_across_messages() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":0,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}},
                {"port":5005,"time_ms":50,"message":{"t":"A","m":0,"n":"y","v":2,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 2);
        assert_eq!(socket.registry().len(), 1);
        assert_eq!(outcome.pins[0].device(), outcome.pins[1].device());
    }

    #[test]
    fn test_tempo_before_messages_is_captured() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"tempo":{"bpm_numerator":120,"bpm_denominator":1}},
                {"port":5005,"time_ms":0,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        // The tempo entry itself produces no pin; the message does
        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 1);
        assert_eq!(outcome.total_incorrect, 0);
        assert_eq!(outcome.pins.len(), 1);
        assert_eq!(socket.registry().len(), 1);
    }

    #[test]
    fn test_second_tempo_is_ignored() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"tempo":{"bpm_numerator":120,"bpm_denominator":1}},
                {"tempo":{"bpm_numerator":90,"bpm_denominator":1}},
                {"port":5005,"time_ms":0,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 1);
        assert_eq!(outcome.total_incorrect, 0);
    }

    #[test]
    fn test_tempo_after_first_message_is_ignored() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":0,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}},
                {"tempo":{"bpm_numerator":120,"bpm_denominator":1}},
                {"port":5005,"time_ms":50,"message":{"t":"B","m":0,"n":"y","v":2,"i":0,"c":0}}]"#,
        );

        // Device B is created after the late tempo entry, which must not
        // have been captured; ingestion still validates both messages.
        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 2);
        assert_eq!(socket.registry().len(), 2);
    }

    #[test]
    fn test_devices_are_shared_across_files() {
        let mut socket = socket();
        let file = format!(
            r#"{{"filetype":"{FILE_TYPE}","url":"{FILE_URL}","content":[{{"port":5005,"time_ms":0,"message":{{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}}}}]}}"#
        );
        let json = format!("[{file},{file}]");

        // The registry spans files; the second file reuses device A
        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_validated, 2);
        assert_eq!(socket.registry().len(), 1);
    }

    #[test]
    fn test_negative_time_counts_incorrect() {
        let mut socket = socket();
        let json = timeline(
            r#"[{"port":5005,"time_ms":-5,"message":{"t":"A","m":0,"n":"x","v":1,"i":0,"c":0}}]"#,
        );

        let outcome = build_play_list(&json, 0.0, &mut socket);
        assert_eq!(outcome.total_incorrect, 1);
        assert!(outcome.pins.is_empty());
    }
}
