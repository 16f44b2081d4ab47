/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms)
///
/// IDs are strictly increasing within a process, so rows written in the same
/// millisecond (lines of one order) never collide.
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    use std::sync::atomic::{AtomicI64, Ordering};
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    static LAST_ID: AtomicI64 = AtomicI64::new(0);

    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    let candidate = (ts << 12) | rand_bits;

    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = if candidate > last { candidate } else { last + 1 };
        match LAST_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Characters used in order number suffixes (no 0/O/1/I to keep them readable aloud)
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_SUFFIX_LEN: usize = 6;

/// Generate a human-readable order number: `ORD-YYYYMMDD-XXXXXX`
///
/// Uniqueness is enforced by the storage layer; the random suffix gives
/// 32^6 combinations per day.
pub fn order_number() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .map(|_| ORDER_NUMBER_ALPHABET[rng.gen_range(0..ORDER_NUMBER_ALPHABET.len())] as char)
        .collect();
    format!("ORD-{}-{}", chrono::Utc::now().format("%Y%m%d"), suffix)
}
