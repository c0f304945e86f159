use rand::Rng;

const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<prefix>-<epoch ms>-<9 chars of [0-9a-z]>`, e.g. `req-1718755200000-k3j9x0a2b`.
pub fn generate_id<R: Rng + ?Sized>(prefix: &str, epoch_ms: u64, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{prefix}-{epoch_ms}-{suffix}")
}

pub fn request_id(epoch_ms: u64) -> String {
    generate_id("req", epoch_ms, &mut rand::thread_rng())
}

pub fn user_id(epoch_ms: u64) -> String {
    generate_id("user", epoch_ms, &mut rand::thread_rng())
}

/// Checks the `X-Request-ID` shape: `req-<decimal>-<lowercase alphanumeric>`.
pub fn is_request_id(value: &str) -> bool {
    let mut parts = value.splitn(3, '-');
    let (Some("req"), Some(ts), Some(suffix)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    !ts.is_empty()
        && ts.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}
