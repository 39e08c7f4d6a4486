use packstream::{
    ByteBufferConsumer, CachingStrategies, MessageFormatter, Packer, SinkError, Utf8Table,
    Writable, WriteResult,
};
use std::time::Instant;

/// Counts what would have been shipped.
#[derive(Default)]
struct Tally {
    frames: u64,
    messages: u64,
    bytes: u64,
}

impl ByteBufferConsumer for Tally {
    fn accept(&mut self, message_count: u32, frame: &[u8]) -> Result<(), SinkError> {
        self.frames += 1;
        self.messages += u64::from(message_count);
        self.bytes += frame.len() as u64;
        Ok(())
    }
}

struct Metric<'a> {
    name: &'a str,
    value: f64,
    timestamp: i64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // One packer per thread, one 64 KiB buffer allocated up front and reused for every frame.
    let caches = CachingStrategies::new(
        Utf8Table::from_static(&["name", "value", "ts"]),
        Utf8Table::from_static(&["cpu.user", "cpu.system"]),
    );
    let mut mapper = |m: &Metric<'_>, w: &mut dyn Writable| -> WriteResult {
        w.start_map(3)?;
        w.write_string("name", caches.constant_keys())?;
        w.write_string(m.name, caches.constant_values())?;
        w.write_string("value", caches.constant_keys())?;
        w.write_double(m.value)?;
        w.write_string("ts", caches.constant_keys())?;
        w.write_long(m.timestamp)
    };
    let mut packer = Packer::with_capacity(Tally::default(), 64 * 1024);
    let iterations = 1_000_000i64;

    let start = Instant::now();

    for i in 0..iterations {
        let metric = Metric {
            name: if i % 2 == 0 { "cpu.user" } else { "cpu.system" },
            value: i as f64 * 0.5,
            timestamp: 1_700_000_000_000 + i,
        };
        packer.format(&metric, &mut mapper)?;
    }
    packer.flush()?;

    let duration = start.elapsed();
    let tally = packer.sink();

    println!("Encoded {} metrics into {} frames", tally.messages, tally.frames);
    println!("Total bytes: {}", tally.bytes);
    println!("Total time: {:?}", duration);
    println!(
        "Average: {:.2} ns/message",
        duration.as_nanos() as f64 / iterations as f64
    );
    Ok(())
}
