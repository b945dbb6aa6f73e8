//! Per-call correlation identifiers sent as `X-Trace-Id`.

use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_LEN: usize = 14;

/// Source of epoch milliseconds for trace ids.
pub type Clock = fn() -> i64;

pub fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn generate_trace_id() -> String {
    trace_id_at(system_clock())
}

/// Fourteen random base-36 characters followed by `millis` in base 36, so ids
/// sort roughly by time within the random prefix.
pub fn trace_id_at(millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let mut id: String = (0..RANDOM_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    id.push_str(&to_base36(millis.max(0) as u64));
    id
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
