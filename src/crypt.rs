//! SHA-512 crypt (`$6$`) password hashing for `/etc/shadow`.
//!
//! Implements the SHA-crypt scheme bit for bit so that hashes can be checked
//! by any libc `crypt(3)`. The salt is drawn from the OS random source.

use rand::Rng;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

/// Crypt base64 alphabet.
const ALPHABET: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Rounds used by [`sha512_hash`].
pub const DEFAULT_ROUNDS: u32 = 5000;
pub const MIN_ROUNDS: u32 = 1000;
pub const MAX_ROUNDS: u32 = 999_999_999;

/// Salt length in characters; longer salts are truncated.
pub const SALT_LEN: usize = 16;

/// Byte order of the final digest, three bytes per group.
const PERMUTATION: [(usize, usize, usize); 21] = [
    (0, 21, 42),
    (22, 43, 1),
    (44, 2, 23),
    (3, 24, 45),
    (25, 46, 4),
    (47, 5, 26),
    (6, 27, 48),
    (28, 49, 7),
    (50, 8, 29),
    (9, 30, 51),
    (31, 52, 10),
    (53, 11, 32),
    (12, 33, 54),
    (34, 55, 13),
    (56, 14, 35),
    (15, 36, 57),
    (37, 58, 16),
    (59, 17, 38),
    (18, 39, 60),
    (40, 61, 19),
    (62, 20, 41),
];

/// Hash a password with a fresh random salt and 5000 rounds.
///
/// Output: `$6$rounds=5000$<16 salt chars>$<86 digest chars>`.
pub fn sha512_hash(password: &str) -> String {
    sha512_crypt(password.as_bytes(), &generate_salt(), DEFAULT_ROUNDS)
}

/// Generate a random salt from the crypt alphabet.
pub fn generate_salt() -> String {
    let mut rng = OsRng;
    (0..SALT_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Full crypt string for an explicit salt and round count.
///
/// The salt is truncated to 16 bytes and rounds are clamped to the scheme's
/// limits, as `crypt(3)` does.
pub fn sha512_crypt(password: &[u8], salt: &str, rounds: u32) -> String {
    let salt = truncate_salt(salt);
    let rounds = rounds.clamp(MIN_ROUNDS, MAX_ROUNDS);
    let digest = sha512_crypt_digest(password, salt.as_bytes(), rounds);
    format!("$6$rounds={}${}${}", rounds, salt, encode_digest(&digest))
}

fn truncate_salt(salt: &str) -> &str {
    match salt.char_indices().nth(SALT_LEN) {
        Some((end, _)) => &salt[..end],
        None => salt,
    }
}

/// The raw 64-byte SHA-crypt digest.
pub fn sha512_crypt_digest(password: &[u8], salt: &[u8], rounds: u32) -> [u8; 64] {
    let pw_len = password.len();

    // Digest B = H(P S P)
    let digest_b = Sha512::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(password)
        .finalize();

    // Digest A = H(P S B... bits-of-len(P))
    let mut hasher = Sha512::new();
    hasher.update(password);
    hasher.update(salt);
    let mut remaining = pw_len;
    while remaining > 64 {
        hasher.update(digest_b);
        remaining -= 64;
    }
    hasher.update(&digest_b[..remaining]);

    let mut bits = pw_len;
    while bits > 0 {
        if bits & 1 != 0 {
            hasher.update(digest_b);
        } else {
            hasher.update(password);
        }
        bits >>= 1;
    }
    let mut digest_a = hasher.finalize();

    // P sequence: H(P repeated len(P) times), stretched to len(P)
    let mut hasher = Sha512::new();
    for _ in 0..pw_len {
        hasher.update(password);
    }
    let p_bytes = repeat_to_len(&hasher.finalize(), pw_len);

    // S sequence: H(S repeated 16 + A[0] times), stretched to len(S)
    let mut hasher = Sha512::new();
    for _ in 0..16 + digest_a[0] as usize {
        hasher.update(salt);
    }
    let s_bytes = repeat_to_len(&hasher.finalize(), salt.len());

    for i in 0..rounds {
        let mut hasher = Sha512::new();
        if i % 2 == 1 {
            hasher.update(&p_bytes);
        } else {
            hasher.update(digest_a);
        }
        if i % 3 != 0 {
            hasher.update(&s_bytes);
        }
        if i % 7 != 0 {
            hasher.update(&p_bytes);
        }
        if i % 2 == 1 {
            hasher.update(digest_a);
        } else {
            hasher.update(&p_bytes);
        }
        digest_a = hasher.finalize();
    }

    let mut out = [0u8; 64];
    out.copy_from_slice(&digest_a);
    out
}

fn repeat_to_len(block: &[u8], len: usize) -> Vec<u8> {
    block.iter().copied().cycle().take(len).collect()
}

/// Encode the 64-byte digest as 86 crypt base64 characters.
fn encode_digest(digest: &[u8; 64]) -> String {
    let mut out = String::with_capacity(86);
    for &(b2, b1, b0) in &PERMUTATION {
        push_b64(&mut out, digest[b2], digest[b1], digest[b0], 4);
    }
    push_b64(&mut out, 0, 0, digest[63], 2);
    out
}

fn push_b64(out: &mut String, b2: u8, b1: u8, b0: u8, chars: usize) {
    let mut word = (u32::from(b2) << 16) | (u32::from(b1) << 8) | u32::from(b0);
    for _ in 0..chars {
        out.push(ALPHABET[(word & 0x3f) as usize] as char);
        word >>= 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_part(hash: &str) -> &str {
        hash.rsplit('$').next().unwrap()
    }

    #[test]
    fn test_reference_vector_default_rounds() {
        let hash = sha512_crypt(b"Hello world!", "saltstring", 5000);
        assert_eq!(
            digest_part(&hash),
            "svn8UoSVapNtMuq1ukKS4tPQd8iKwSMHWjl/O817G3uBnIFNjnQJuesI68u4OTLiBFdcbYEdFCoEOfaS35inz1"
        );
        assert_eq!(&hash[..27], "$6$rounds=5000$saltstring$s");
    }

    #[test]
    fn test_reference_vector_custom_rounds_truncated_salt() {
        let hash = sha512_crypt(b"Hello world!", "saltstringsaltstring", 10000);
        assert_eq!(
            hash,
            "$6$rounds=10000$saltstringsaltst$OW1/O6BYHV6BcXZu8QVeXbDWra3Oeqh0sbHbbMCVNSnCM/UrjmM0Dp8vOuZeHBy/YTBmSK6H9qs/y3RnOaw5v."
        );
    }

    #[test]
    fn test_reference_vector_long_salt() {
        let hash = sha512_crypt(b"This is just a test", "toolongsaltstring", 5000);
        assert_eq!(
            hash,
            "$6$rounds=5000$toolongsaltstrin$lQ8jolhgVRVhY4b5pZKaysCLi0QBxGoNeKQzQ3glMhwllF7oGDZxUhx1yxdYcz/e1JSbq3y6JMxxl8audkUEm0"
        );
    }

    #[test]
    fn test_rounds_clamped_to_minimum() {
        let low = sha512_crypt(b"pw", "salt", 10);
        assert!(low.starts_with("$6$rounds=1000$salt$"));
    }

    #[test]
    fn test_hash_format() {
        let hash = sha512_hash("secret");
        let parts: Vec<&str> = hash.split('$').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "");
        assert_eq!(parts[1], "6");
        assert_eq!(parts[2], "rounds=5000");
        assert_eq!(parts[3].len(), 16);
        assert_eq!(parts[4].len(), 86);
        assert!(parts[3].bytes().chain(parts[4].bytes()).all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_hash_is_reproducible_from_salt() {
        let hash = sha512_hash("secret");
        let salt = hash.split('$').nth(3).unwrap();
        assert_eq!(sha512_crypt(b"secret", salt, DEFAULT_ROUNDS), hash);
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_empty_password() {
        let hash = sha512_crypt(b"", "saltstring", 5000);
        assert_eq!(digest_part(&hash).len(), 86);
    }
}
