use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1904-01-01 and 1970-01-01.
pub const EPOCH_1904_OFFSET: u64 = 2_082_844_800;

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 { 0 } else { a / gcd(a, b) * b }
}

/// `value` ticks of `from` per second expressed in `to` per second,
/// rounded down.
pub fn rescale(value: u64, from: u32, to: u32) -> u64 {
    if from == 0 {
        return 0;
    }
    (value as u128 * to as u128 / from as u128).min(u64::MAX as u128) as u64
}

/// Wall clock as seconds since 1904, the epoch of `mvhd`/`tkhd`/`mdhd`.
pub fn now_since_1904() -> u64 {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    unix + EPOCH_1904_OFFSET
}

pub fn hex_dump(bytes: &[u8], start_offset: u64) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let offs = start_offset + (i as u64) * 16;
        let hexs: String = chunk.iter().map(|b| format!("{b:02x} ")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect();
        out.push_str(&format!("{offs:08x}  {hexs:<48}  |{ascii}|\n"));
    }
    out
}
