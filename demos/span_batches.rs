use packstream::{
    CachingStrategies, Error, GenerationalUtf8Cache, MessageFormatter, Packer, PackerConfig,
    SinkError, Utf8Table, Value, Writable, WriteResult,
};

struct Span<'a> {
    name: &'a str,
    trace_id: u64,
    duration_ns: i64,
    tags: &'a [(&'a str, Value<'a>)],
}

fn main() -> Result<(), Error> {
    // Small buffer so the demo shows several frames.
    let config = PackerConfig::default().with_buffer_capacity(128);
    let values = GenerationalUtf8Cache::new();
    let caches = CachingStrategies::new(
        Utf8Table::from_static(&["name", "trace_id", "duration", "meta"]),
        &values,
    );

    let sink = |count: u32, frame: &[u8]| -> Result<(), SinkError> {
        println!("frame: {count} spans, {} bytes", frame.len());
        Ok(())
    };
    let mut packer = Packer::from_config(&config, sink)?;

    let mut mapper = |span: &Span<'_>, w: &mut dyn Writable| -> WriteResult {
        w.start_map(4)?;
        w.write_string("name", caches.constant_keys())?;
        w.write_string(span.name, caches.constant_values())?;
        w.write_string("trace_id", caches.constant_keys())?;
        w.write_long_as_string(span.trace_id as i64)?;
        w.write_string("duration", caches.constant_keys())?;
        w.write_long(span.duration_ns)?;
        w.write_string("meta", caches.constant_keys())?;
        w.write_map(span.tags, caches.no_caching())
    };

    let db_tags = [("rows", Value::I64(12)), ("table", Value::Str("orders"))];
    let http_tags = [("status", Value::I32(200)), ("cached", Value::Bool(false))];
    for i in 0..10u64 {
        let span = if i % 3 == 0 {
            Span { name: "http.request", trace_id: 1000 + i, duration_ns: 1_500_000, tags: &http_tags }
        } else {
            Span { name: "db.query", trace_id: 1000 + i, duration_ns: 80_000, tags: &db_tags }
        };
        packer.format(&span, &mut mapper)?;
    }
    packer.flush()?;
    println!("value cache: {:?}", values.stats());
    values.recalibrate();

    // A span that can never fit is reported instead of corrupting the stream.
    let huge = "x".repeat(256);
    let oversized = Span { name: &huge, trace_id: 1, duration_ns: 1, tags: &[] };
    match packer.format(&oversized, &mut mapper) {
        Err(Error::MessageTooLarge { capacity }) => println!("dropped span larger than {capacity} bytes"),
        other => other?,
    }
    Ok(())
}
