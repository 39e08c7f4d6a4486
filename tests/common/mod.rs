#![allow(dead_code)]

use packstream::{ByteBufferConsumer, MessageFormatter, Packer, SinkError, Writable, WriteResult};

/// Sink that keeps a copy of every frame it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub frames: Vec<(u32, Vec<u8>)>,
}

impl ByteBufferConsumer for CollectingSink {
    fn accept(&mut self, message_count: u32, frame: &[u8]) -> Result<(), SinkError> {
        self.frames.push((message_count, frame.to_vec()));
        Ok(())
    }
}

impl CollectingSink {
    /// Every message of every frame, in delivery order.
    pub fn messages(&self) -> Vec<rmpv::Value> {
        self.frames
            .iter()
            .flat_map(|(count, frame)| {
                let items = decode_frame(frame);
                assert_eq!(items.len(), *count as usize);
                items
            })
            .collect()
    }
}

/// Decode one frame with the reference decoder and return its messages.
pub fn decode_frame(frame: &[u8]) -> Vec<rmpv::Value> {
    let mut rd = frame;
    let value = rmpv::decode::read_value(&mut rd).expect("frame must be valid msgpack");
    assert!(rd.is_empty(), "trailing bytes after frame");
    match value {
        rmpv::Value::Array(items) => items,
        other => panic!("frame is not an array: {other:?}"),
    }
}

/// Encode a single message through `write`, flush, and return the raw message bytes.
pub fn encode_bytes(mut write: impl FnMut(&mut dyn Writable) -> WriteResult) -> Vec<u8> {
    let mut packer = Packer::with_capacity(CollectingSink::default(), 1 << 20);
    let mut mapper = |_: &(), w: &mut dyn Writable| -> WriteResult { write(w) };
    packer.format(&(), &mut mapper).unwrap();
    packer.flush().unwrap();
    let sink = packer.into_sink();
    assert_eq!(sink.frames.len(), 1);
    let (count, frame) = &sink.frames[0];
    assert_eq!(*count, 1);
    assert_eq!(frame[0], 0x91);
    frame[1..].to_vec()
}

/// Encode a single message through `write` and decode it with the reference decoder.
pub fn encode_value(write: impl FnMut(&mut dyn Writable) -> WriteResult) -> rmpv::Value {
    let bytes = encode_bytes(write);
    let mut rd = &bytes[..];
    let value = rmpv::decode::read_value(&mut rd).unwrap();
    assert!(rd.is_empty());
    value
}
