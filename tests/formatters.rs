use chrono::{TimeZone, Utc};
use json_line_log::{
    JsonLineFormatter, Level, LogEvent, LogFormatter, PropertyValue, Scalar,
};
use serde_json::{json, Value};

fn request_event() -> LogEvent {
    LogEvent::new(Level::Information, "Test message")
        .with_property("RequestId", "12345")
        .with_property("TraceId", "abcde")
        .with_property("ExtraField", "extra")
}

fn parse(line: &str) -> Value {
    assert!(line.ends_with('\n'), "line must be terminated: {:?}", line);
    assert_eq!(line.matches('\n').count(), 1, "exactly one line expected");
    serde_json::from_str(line.trim_end()).expect("valid json")
}

#[test]
fn allow_list_keeps_allowed_fields_and_moves_extras_to_message() {
    let formatter = JsonLineFormatter::allow_list(["RequestId", "TraceId"]);
    let line = formatter.format_to_string(&request_event()).unwrap();

    assert!(line.contains(r#""RequestId":"12345""#));
    assert!(line.contains(r#""TraceId":"abcde""#));

    let value = parse(&line);
    assert_eq!(value["fields"], json!({ "RequestId": "12345", "TraceId": "abcde" }));
    assert_eq!(value["message"], "Test message | ExtraFields: ExtraField=extra");
}

#[test]
fn allow_list_with_every_field_leaves_message_untouched() {
    let formatter = JsonLineFormatter::allow_list(["RequestId", "TraceId", "ExtraField"]);
    let line = formatter.format_to_string(&request_event()).unwrap();

    assert!(!line.contains("ExtraFields:"));
    let value = parse(&line);
    assert_eq!(value["message"], "Test message");
    assert_eq!(value["fields"]["ExtraField"], "extra");
    assert_eq!(value["fields"].as_object().unwrap().len(), 3);
}

#[test]
fn empty_allow_list_moves_everything_to_message() {
    let formatter = JsonLineFormatter::allow_list(Vec::<&str>::new());
    let event = LogEvent::new(Level::Information, "Test message")
        .with_property("RequestId", "12345")
        .with_property("TraceId", "abcde");
    let line = formatter.format_to_string(&event).unwrap();

    assert!(!line.contains(r#""RequestId""#));
    assert!(!line.contains(r#""TraceId""#));
    assert!(line.contains("ExtraFields: RequestId=12345, TraceId=abcde"));
    assert_eq!(parse(&line)["fields"], json!({}));
}

#[test]
fn allow_list_matches_names_ignoring_case() {
    let formatter = JsonLineFormatter::allow_list(["requestid"]);
    let value = parse(&formatter.format_to_string(&request_event()).unwrap());

    assert_eq!(value["fields"], json!({ "RequestId": "12345" }));
    assert_eq!(value["message"], "Test message | ExtraFields: TraceId=abcde, ExtraField=extra");
}

#[test]
fn rename_map_emits_mapped_names_only() {
    let formatter = JsonLineFormatter::rename_map([("RequestId", "request_id"), ("TraceId", "trace_id")]);
    let line = formatter.format_to_string(&request_event()).unwrap();

    assert!(line.contains(r#""request_id":"12345""#));
    assert!(line.contains(r#""trace_id":"abcde""#));
    assert!(!line.contains(r#""RequestId""#));
    assert!(!line.contains(r#""TraceId""#));
    assert!(line.contains("ExtraFields: ExtraField=extra"));
}

#[test]
fn rename_map_with_every_field_mapped_has_no_extras() {
    let formatter = JsonLineFormatter::rename_map([
        ("RequestId", "request_id"),
        ("TraceId", "trace_id"),
        ("ExtraField", "extra_field"),
    ]);
    let line = formatter.format_to_string(&request_event()).unwrap();

    assert!(line.contains(r#""extra_field":"extra""#));
    assert!(!line.contains("ExtraFields:"));
}

#[test]
fn rename_map_lookup_is_case_sensitive() {
    let formatter = JsonLineFormatter::rename_map([("requestid", "request_id")]);
    let value = parse(&formatter.format_to_string(&request_event()).unwrap());

    assert_eq!(value["fields"], json!({}));
    assert!(value["message"].as_str().unwrap().contains("RequestId=12345"));
}

#[test]
fn rename_map_only_mapped_field_present() {
    let formatter = JsonLineFormatter::rename_map([("RequestId", "request_id")]);
    let event = LogEvent::new(Level::Information, "Test message")
        .with_property("RequestId", "12345")
        .with_property("TraceId", "abcde");
    let value = parse(&formatter.format_to_string(&event).unwrap());

    assert_eq!(value["fields"], json!({ "request_id": "12345" }));
    assert_eq!(value["message"], "Test message | ExtraFields: TraceId=abcde");
}

#[test]
fn allow_list_and_rename_include_exception() {
    let event = LogEvent::new(Level::Error, "Test message")
        .with_property("RequestId", "12345")
        .with_exception("InvalidOperation: Test error");

    for formatter in [
        Box::new(JsonLineFormatter::allow_list(["RequestId"])) as Box<dyn LogFormatter>,
        Box::new(JsonLineFormatter::rename_map([("RequestId", "request_id")])),
    ] {
        let value = parse(&formatter.format_to_string(&event).unwrap());
        assert!(value["exception"].as_str().unwrap().contains("Test error"));
        assert_eq!(value["level"], "Error");
    }
}

#[test]
fn exception_key_is_omitted_when_absent() {
    let event = LogEvent::new(Level::Information, "no error");

    for formatter in [
        Box::new(JsonLineFormatter::allow_list(["RequestId"])) as Box<dyn LogFormatter>,
        Box::new(JsonLineFormatter::rename_map([("RequestId", "request_id")])),
        Box::new(JsonLineFormatter::snake_case()),
    ] {
        let line = formatter.format_to_string(&event).unwrap();
        assert!(!line.contains("exception"), "{}", line);
    }
}

#[test]
fn snake_case_serializes_complex_property_values() {
    let formatter = JsonLineFormatter::snake_case();
    let event = LogEvent::new(Level::Information, "Complex value").with_property(
        "ComplexProperty",
        PropertyValue::structure([("InnerValue", PropertyValue::from(42))]),
    );
    let line = formatter.format_to_string(&event).unwrap();

    assert!(line.contains(r#""complex_property""#));
    assert!(line.contains(r#""inner_value":42"#));
    assert_eq!(parse(&line)["fields"], json!({ "complex_property": { "inner_value": 42 } }));
}

#[test]
fn snake_case_includes_exception_when_present() {
    let formatter = JsonLineFormatter::snake_case();
    let event = LogEvent::new(Level::Error, "Error occurred").with_exception("InvalidOperation: Test error");
    let line = formatter.format_to_string(&event).unwrap();

    assert!(line.contains(r#""exception""#));
    assert!(line.contains("Test error"));
}

#[test]
fn snake_case_leaves_map_keys_and_values_alone() {
    let formatter = JsonLineFormatter::snake_case();
    let event = LogEvent::new(Level::Information, "Headers")
        .with_property(
            "RequestHeaders",
            PropertyValue::map([(PropertyValue::from("ContentType"), PropertyValue::from("Application/Json"))]),
        )
        .with_property("ID", "MixedCase");
    let value = parse(&formatter.format_to_string(&event).unwrap());

    assert_eq!(
        value["fields"],
        json!({
            "request_headers": { "ContentType": "Application/Json" },
            "i_d": "MixedCase"
        })
    );
    assert_eq!(value["message"], "Headers");
}

#[test]
fn timestamp_keys_and_format() {
    let ts = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();
    let event = LogEvent::new(Level::Warning, "m").at(ts);

    let allow = parse(&JsonLineFormatter::allow_list(["A"]).format_to_string(&event).unwrap());
    assert_eq!(allow["@timestamp"], "2024-03-09T08:07:06.000000000Z");
    assert!(allow.get("timestamp").is_none());

    let snake = parse(&JsonLineFormatter::snake_case().format_to_string(&event).unwrap());
    assert_eq!(snake["timestamp"], "2024-03-09T08:07:06.000000000Z");
    assert!(snake.get("@timestamp").is_none());
    assert_eq!(snake["level"], "Warning");
}

#[test]
fn output_key_order_is_stable() {
    let event = request_event()
        .at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .with_exception("boom");
    let line = JsonLineFormatter::rename_map([("RequestId", "request_id")])
        .format_to_string(&event)
        .unwrap();

    assert_eq!(
        line,
        concat!(
            r#"{"@timestamp":"2024-01-01T00:00:00.000000000Z","level":"Information","#,
            r#""message":"Test message | ExtraFields: TraceId=abcde, ExtraField=extra","#,
            r#""fields":{"request_id":"12345"},"exception":"boom"}"#,
            "\n"
        )
    );
}

#[test]
fn overflow_renders_structured_values_as_json() {
    let formatter = JsonLineFormatter::allow_list(Vec::<&str>::new());
    let event = LogEvent::new(Level::Information, "m")
        .with_property("Count", 3)
        .with_property("Missing", Scalar::Null)
        .with_property("Tags", PropertyValue::sequence([PropertyValue::from("a"), PropertyValue::from("b")]));
    let value = parse(&formatter.format_to_string(&event).unwrap());

    assert_eq!(value["message"], r#"m | ExtraFields: Count=3, Missing=, Tags=["a","b"]"#);
}

#[test]
fn formatting_is_idempotent() {
    let event = request_event().with_property(
        "Order",
        PropertyValue::structure([
            ("LineItems", PropertyValue::sequence([PropertyValue::from(1), PropertyValue::from(2)])),
            ("Total", PropertyValue::from(19.99)),
        ]),
    );

    for formatter in [
        Box::new(JsonLineFormatter::allow_list(["RequestId"])) as Box<dyn LogFormatter>,
        Box::new(JsonLineFormatter::rename_map([("Order", "order")])),
        Box::new(JsonLineFormatter::snake_case()),
    ] {
        let first = formatter.format_to_string(&event).unwrap();
        let second = formatter.format_to_string(&event).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn formatters_are_shareable_across_threads() {
    let formatter = std::sync::Arc::new(JsonLineFormatter::allow_list(["RequestId"]));
    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            let formatter = std::sync::Arc::clone(&formatter);
            std::thread::spawn(move || {
                let event = LogEvent::new(Level::Information, "m").with_property("RequestId", i);
                formatter.format_to_string(&event).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let value = parse(&handle.join().unwrap());
        assert_eq!(value["fields"]["RequestId"], json!(i));
    }
}

/// Records how many `write` calls each formatted event costs.
#[derive(Default)]
struct CountingWriter {
    calls: usize,
    buf: Vec<u8>,
}

impl std::io::Write for CountingWriter {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.calls += 1;
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn each_event_is_written_in_one_call() {
    for formatter in [
        Box::new(JsonLineFormatter::allow_list(["RequestId"])) as Box<dyn LogFormatter>,
        Box::new(JsonLineFormatter::rename_map([("RequestId", "request_id")])),
        Box::new(JsonLineFormatter::snake_case()),
    ] {
        let mut out = CountingWriter::default();
        formatter.format(&request_event(), &mut out).unwrap();
        formatter.format(&request_event(), &mut out).unwrap();

        assert_eq!(out.calls, 2);
        let text = String::from_utf8(out.buf).unwrap();
        assert_eq!(text.lines().count(), 2);
        for line in text.lines() {
            serde_json::from_str::<Value>(line).unwrap();
        }
    }
}

/// A shared sink whose individual writes are atomic, like a locked stdout.
#[derive(Clone, Default)]
struct SharedSink(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for SharedSink {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn concurrent_writers_never_split_lines() {
    let formatter = std::sync::Arc::new(JsonLineFormatter::allow_list(["RequestId"]));
    let sink = SharedSink::default();

    let handles: Vec<_> = (0..8u64)
        .map(|worker| {
            let formatter = std::sync::Arc::clone(&formatter);
            let mut sink = sink.clone();
            std::thread::spawn(move || {
                for n in 0..500u64 {
                    let event = LogEvent::new(Level::Information, "m")
                        .with_property("RequestId", worker)
                        .with_property("Seq", n);
                    formatter.format(&event, &mut sink).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let bytes = sink.0.lock().unwrap().clone();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text.lines().count(), 8 * 500);
    for line in text.lines() {
        let value: Value = serde_json::from_str(line).unwrap();
        assert!(value["message"].as_str().unwrap().starts_with("m | ExtraFields: Seq="));
    }
}
