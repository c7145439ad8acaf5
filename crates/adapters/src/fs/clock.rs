use scanshelf_application::Clock;

/// Unix seconds with millisecond precision, e.g. `1718000000.123`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_timestamp_string(&self) -> String {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        format!("{}.{:03}", elapsed.as_secs(), elapsed.subsec_millis())
    }
}
