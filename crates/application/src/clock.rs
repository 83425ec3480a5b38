/// Current wall-clock time as milliseconds since UNIX epoch.
///
/// Domain engines take timestamps as parameters to stay pure; this is
/// the single place the application layer reads the clock.
#[allow(clippy::cast_possible_truncation)]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Minutes since UTC midnight, for time-window policy predicates.
#[allow(clippy::cast_possible_truncation)]
pub fn minute_of_day(now_ms: u64) -> u16 {
    ((now_ms / 60_000) % 1440) as u16
}
