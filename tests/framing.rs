mod common;

use common::{decode_frame, CollectingSink};
use packstream::{
    ByteBufferConsumer, Discard, Error, Mapper, MessageFormatter, Packer, PackerConfig, SinkError,
    Value, Writable, WriteResult, NO_CACHING,
};
use rmpv::Value as Mp;

/// A single-entry map message.
struct Entry<'a> {
    key: &'a str,
    value: Value<'a>,
}

fn map_entry(entry: &Entry<'_>, w: &mut dyn Writable) -> WriteResult {
    w.start_map(1)?;
    w.write_string(entry.key, &NO_CACHING)?;
    w.write_object(&entry.value, &NO_CACHING)
}

fn map_null(_: &(), w: &mut dyn Writable) -> WriteResult {
    w.write_null()
}

/// Fails the first `failures` deliveries, then records message counts.
#[derive(Default)]
struct FlakySink {
    failures: usize,
    delivered: Vec<u32>,
}

impl ByteBufferConsumer for FlakySink {
    fn accept(&mut self, message_count: u32, _frame: &[u8]) -> Result<(), SinkError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err("downstream unavailable".into());
        }
        self.delivered.push(message_count);
        Ok(())
    }
}

#[derive(Default)]
struct CountingMapper {
    calls: usize,
    resets: usize,
}

impl Mapper<str> for CountingMapper {
    fn map(&mut self, message: &str, w: &mut dyn Writable) -> WriteResult {
        self.calls += 1;
        w.write_string(message, &NO_CACHING)
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

#[test]
fn should_recycle_buffer_when_full() {
    // Arrange: each message is 10 bytes, 20 bytes of payload space
    let mut packer = Packer::with_capacity(CollectingSink::default(), 25);
    let entry = Entry { key: "foo", value: Value::Str("abcd") };

    // Act
    for _ in 0..4 {
        packer.format(&entry, &mut map_entry).unwrap();
    }
    let flushed_before_final = packer.sink().frames.len();
    packer.flush().unwrap();

    // Assert
    assert_eq!(flushed_before_final, 1);
    let sink = packer.into_sink();
    let counts: Vec<u32> = sink.frames.iter().map(|(n, _)| *n).collect();
    assert_eq!(counts, vec![2, 2]);
    for message in sink.messages() {
        assert_eq!(message, Mp::Map(vec![(Mp::from("foo"), Mp::from("abcd"))]));
    }
}

#[test]
fn should_flush_and_retry_preserving_message_order() {
    // Arrange: 4, 7 and 9 byte messages against 16 bytes of payload space
    let numbers = [Value::I64(1), Value::I64(2), Value::I64(3)];
    let messages = [
        Entry { key: "a", value: Value::I64(1) },
        Entry { key: "b", value: Value::Array(&numbers) },
        Entry { key: "c", value: Value::Str("hello") },
    ];
    let mut packer = Packer::with_capacity(CollectingSink::default(), 21);

    // Act
    for message in &messages {
        packer.format(message, &mut map_entry).unwrap();
    }
    packer.flush().unwrap();

    // Assert
    let sink = packer.into_sink();
    assert_eq!(sink.frames.len(), 2);
    assert_eq!(sink.frames[0].0, 2);
    assert_eq!(sink.frames[0].1.len(), 1 + 4 + 7);
    assert_eq!(sink.frames[1].0, 1);
    assert_eq!(hex::encode(&sink.frames[1].1), "9181a163a568656c6c6f");
    assert_eq!(
        sink.messages(),
        vec![
            Mp::Map(vec![(Mp::from("a"), Mp::from(1))]),
            Mp::Map(vec![(
                Mp::from("b"),
                Mp::Array(vec![Mp::from(1), Mp::from(2), Mp::from(3)])
            )]),
            Mp::Map(vec![(Mp::from("c"), Mp::from("hello"))]),
        ]
    );
}

#[test]
fn should_report_message_too_large_for_empty_buffer() {
    // Arrange
    let mut packer = Packer::with_capacity(CollectingSink::default(), 25);
    let value = "x".repeat(26);
    let entry = Entry { key: "foo", value: Value::Str(&value) };

    // Act
    let result = packer.format(&entry, &mut map_entry);

    // Assert
    assert!(matches!(result, Err(Error::MessageTooLarge { capacity: 25 })));
    assert_eq!(packer.message_count(), 0);
    assert_eq!(packer.frame_len(), 0);
    packer.flush().unwrap();
    assert!(packer.sink().frames.is_empty());
}

#[test]
fn should_flush_pending_frame_before_rejecting_oversized_message() {
    // Arrange
    let mut packer = Packer::with_capacity(CollectingSink::default(), 25);
    let small = Entry { key: "foo", value: Value::Str("abcd") };
    let value = "x".repeat(26);
    let huge = Entry { key: "foo", value: Value::Str(&value) };
    packer.format(&small, &mut map_entry).unwrap();

    // Act
    let result = packer.format(&huge, &mut map_entry);

    // Assert
    assert!(matches!(result, Err(Error::MessageTooLarge { .. })));
    assert_eq!(packer.sink().frames.len(), 1);
    assert_eq!(packer.sink().frames[0].0, 1);
    assert_eq!(packer.message_count(), 0);
}

#[test]
fn should_keep_earlier_messages_intact_after_failed_write() {
    // Arrange
    let mut packer = Packer::with_capacity(CollectingSink::default(), 64);
    packer.format(&(), &mut map_null).unwrap();
    let before = packer.frame_len();
    let mut partial = |_: &(), w: &mut dyn Writable| -> WriteResult {
        w.start_array(2)?;
        w.write_long(7)?;
        w.write_binary(&[0u8; 100])
    };

    // Act
    let result = packer.format(&(), &mut partial);

    // Assert
    assert!(result.is_err());
    packer.format(&(), &mut map_null).unwrap();
    packer.flush().unwrap();
    assert_eq!(before, 1);
    let sink = packer.into_sink();
    let counts: Vec<u32> = sink.frames.iter().map(|(n, _)| *n).collect();
    assert_eq!(counts, vec![1, 1]);
    assert_eq!(sink.messages(), vec![Mp::Nil, Mp::Nil]);
}

#[test]
fn should_not_call_sink_for_empty_frame() {
    // Arrange
    let mut calls = 0;
    let sink = |_: u32, _: &[u8]| -> Result<(), SinkError> {
        calls += 1;
        Ok(())
    };
    let mut packer = Packer::with_capacity(sink, 64);

    // Act
    packer.flush().unwrap();
    packer.flush().unwrap();
    drop(packer);

    // Assert
    assert_eq!(calls, 0);
}

#[test]
fn should_surface_sink_error_and_stay_usable() {
    // Arrange
    let sink = FlakySink { failures: 1, ..Default::default() };
    let mut packer = Packer::with_capacity(sink, 64);
    packer.format(&(), &mut map_null).unwrap();

    // Act
    let result = packer.flush();

    // Assert
    match result {
        Err(Error::Sink { message_count, source }) => {
            assert_eq!(message_count, 1);
            assert_eq!(source.to_string(), "downstream unavailable");
        }
        other => panic!("expected sink error, got {other:?}"),
    }
    assert_eq!(packer.message_count(), 0);
    packer.format(&(), &mut map_null).unwrap();
    packer.format(&(), &mut map_null).unwrap();
    packer.flush().unwrap();
    assert_eq!(packer.sink().delivered, vec![2]);
}

#[test]
fn should_propagate_sink_error_from_overflow_flush() {
    // Arrange
    let sink = FlakySink { failures: 1, ..Default::default() };
    let mut packer = Packer::with_capacity(sink, 25);
    let mut mapper = CountingMapper::default();
    let message = "a".repeat(9);
    packer.format(message.as_str(), &mut mapper).unwrap();
    packer.format(message.as_str(), &mut mapper).unwrap();

    // Act
    let result = packer.format(message.as_str(), &mut mapper);

    // Assert
    assert!(matches!(result, Err(Error::Sink { message_count: 2, .. })));
    assert_eq!(packer.message_count(), 0);
    assert_eq!(mapper.resets, 0);
}

#[test]
fn should_reset_mapper_before_retry() {
    // Arrange: 10-byte strings, two per frame
    let mut packer = Packer::with_capacity(Discard, 25);
    let mut mapper = CountingMapper::default();
    let message = "a".repeat(9);

    // Act
    for _ in 0..3 {
        packer.format(message.as_str(), &mut mapper).unwrap();
    }

    // Assert
    assert_eq!(mapper.calls, 4);
    assert_eq!(mapper.resets, 1);
    assert_eq!(packer.message_count(), 1);
    assert_eq!(packer.frame_len(), 10);
}

#[test]
fn should_size_frame_header_by_message_count() {
    let cases: [(u32, &str); 5] = [
        (1, "91"),
        (15, "9f"),
        (16, "dc0010"),
        (65535, "dcffff"),
        (65536, "dd00010000"),
    ];
    for (count, header) in cases {
        // Arrange
        let mut packer = Packer::with_capacity(CollectingSink::default(), count as usize + 5);

        // Act
        for _ in 0..count {
            packer.format(&(), &mut map_null).unwrap();
        }
        packer.flush().unwrap();

        // Assert
        let sink = packer.into_sink();
        assert_eq!(sink.frames.len(), 1, "count {count}");
        let (delivered, frame) = &sink.frames[0];
        assert_eq!(*delivered, count);
        assert!(hex::encode(&frame[..header.len() / 2]) == header, "count {count}");
        assert_eq!(frame.len(), header.len() / 2 + count as usize);
        assert_eq!(decode_frame(frame).len(), count as usize);
    }
}

#[test]
fn should_build_packer_from_config() {
    // Arrange
    let config: PackerConfig = serde_json::from_str(r#"{ "buffer_capacity": 4096 }"#).unwrap();

    // Act
    let packer = Packer::from_config(&config, Discard).unwrap();

    // Assert
    assert_eq!(packer.capacity(), 4096);
}

#[test]
fn should_default_missing_config_fields() {
    let config: PackerConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, PackerConfig::default());
    assert_eq!(config.buffer_capacity, 1 << 20);
}

#[test]
fn should_reject_config_without_room_for_payload() {
    let config = PackerConfig::default().with_buffer_capacity(5);
    let result = Packer::from_config(&config, Discard);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
