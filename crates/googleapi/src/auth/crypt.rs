//! SHA-256-crypt password hashing
//!
//! The Directory API accepts pre-hashed passwords with
//! `hashFunction = "crypt"`. Hashes are produced in the `$5$salt$hash` form
//! with the implicit 5000 rounds; Google rejects an explicit `rounds=` field.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

const ROUNDS: usize = 5000;
const SALT_LEN: usize = 15;
const MAX_SALT_LEN: usize = 16;

const CRYPT_ALPHABET: &[u8; 64] =
    b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    sha256_crypt(password.as_bytes(), &salt)
}

/// SHA-256-crypt with a caller-supplied salt (truncated to 16 bytes).
pub fn sha256_crypt(password: &[u8], salt: &str) -> String {
    let salt = &salt.as_bytes()[..salt.len().min(MAX_SALT_LEN)];
    let digest = crypt_digest(password, salt);

    let mut out = String::with_capacity(3 + salt.len() + 1 + 43);
    out.push_str("$5$");
    out.push_str(&String::from_utf8_lossy(salt));
    out.push('$');
    encode_digest(&digest, &mut out);
    out
}

fn crypt_digest(password: &[u8], salt: &[u8]) -> [u8; 32] {
    let pw_len = password.len();

    let alternate: [u8; 32] = Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(password)
        .finalize()
        .into();

    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    hasher.update(repeat_to_len(&alternate, pw_len));

    let mut n = pw_len;
    while n > 0 {
        if n & 1 == 1 {
            hasher.update(alternate);
        } else {
            hasher.update(password);
        }
        n >>= 1;
    }
    let mut current: [u8; 32] = hasher.finalize().into();

    let mut dp = Sha256::new();
    for _ in 0..pw_len {
        dp.update(password);
    }
    let p_bytes = repeat_to_len(&dp.finalize(), pw_len);

    let mut ds = Sha256::new();
    for _ in 0..(16 + current[0] as usize) {
        ds.update(salt);
    }
    let s_bytes = repeat_to_len(&ds.finalize(), salt.len());

    for round in 0..ROUNDS {
        let mut c = Sha256::new();
        if round % 2 == 1 {
            c.update(&p_bytes);
        } else {
            c.update(current);
        }
        if round % 3 != 0 {
            c.update(&s_bytes);
        }
        if round % 7 != 0 {
            c.update(&p_bytes);
        }
        if round % 2 == 1 {
            c.update(current);
        } else {
            c.update(&p_bytes);
        }
        current = c.finalize().into();
    }

    current
}

fn repeat_to_len(block: &[u8], len: usize) -> Vec<u8> {
    block.iter().copied().cycle().take(len).collect()
}

fn encode_digest(d: &[u8; 32], out: &mut String) {
    const ORDER: [(usize, usize, usize); 10] = [
        (0, 10, 20),
        (21, 1, 11),
        (12, 22, 2),
        (3, 13, 23),
        (24, 4, 14),
        (15, 25, 5),
        (6, 16, 26),
        (27, 7, 17),
        (18, 28, 8),
        (9, 19, 29),
    ];
    for (a, b, c) in ORDER {
        push_b64(d[a], d[b], d[c], 4, out);
    }
    push_b64(0, d[31], d[30], 3, out);
}

fn push_b64(b2: u8, b1: u8, b0: u8, n: usize, out: &mut String) {
    let mut w = ((b2 as u32) << 16) | ((b1 as u32) << 8) | b0 as u32;
    for _ in 0..n {
        out.push(CRYPT_ALPHABET[(w & 0x3f) as usize] as char);
        w >>= 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            sha256_crypt(b"Hello world!", "saltstring"),
            "$5$saltstring$5B8vYYiY.CVt1RlTTf8KbXBH3hsxY/GNooZaBBGWEc5"
        );
        assert_eq!(
            sha256_crypt(b"correct horse battery", "Ab3dEf9hIj0kLmN"),
            "$5$Ab3dEf9hIj0kLmN$TySIIl2KiJdmuxezTNcYNhnL/MpKBTbG.Oc0T5c8GtB"
        );
    }

    #[test]
    fn test_salt_is_truncated() {
        let long = sha256_crypt(b"pw", "0123456789abcdefXYZ");
        assert!(long.starts_with("$5$0123456789abcdef$"));
    }

    #[test]
    fn test_hash_password_format() {
        let hashed = hash_password("hunter2hunter2");
        let parts: Vec<&str> = hashed.split('$').collect();
        assert_eq!(parts[1], "5");
        assert_eq!(parts[2].len(), SALT_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts[3].len(), 43);
        assert!(!hashed.contains("rounds="));
    }

    #[test]
    fn test_hash_password_salts_differ() {
        assert_ne!(hash_password("same-password"), hash_password("same-password"));
    }
}
