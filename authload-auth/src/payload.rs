use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const LOWERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SPECIALS: &[u8] = b"!@#$%^&*";
const PASSWORD_LEN: usize = 12;

/// A provisioned account the login scenario signs in with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupPayload {
    pub name: String,
    pub nickname: String,
    pub phone_number: String,
    pub login_id: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupPayload {
    /// Fresh identity fields within the target API's length limits.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let suffix = unique_suffix(rng);
        let phone_tail: String = format!("{:08}", hash_code(&suffix))
            .chars()
            .take(8)
            .collect();
        let password = random_password(rng);

        Self {
            name: format!("u{}", pick_n(rng, LOWER_ALNUM, 7)),
            nickname: format!("nk{}", pick_n(rng, LOWER_ALNUM, 8)),
            phone_number: format!("010{phone_tail}"),
            login_id: format!("t{}", pick_n(rng, LOWER_ALNUM, 11)),
            confirm_password: password.clone(),
            password,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            login_id: self.login_id.clone(),
            password: self.password.clone(),
        }
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, charset: &[u8]) -> char {
    char::from(charset[rng.gen_range(0..charset.len())])
}

fn pick_n<R: Rng + ?Sized>(rng: &mut R, charset: &[u8], len: usize) -> String {
    (0..len).map(|_| pick(rng, charset)).collect()
}

/// `{unix_millis}_{6 lower alnum}_{6 digits}`
fn unique_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!(
        "{millis}_{}_{}",
        pick_n(rng, LOWER_ALNUM, 6),
        pick_n(rng, DIGITS, 6)
    )
}

/// 31-multiplier string hash over wrapping `i32`, returned as its absolute value.
fn hash_code(s: &str) -> u32 {
    let h = s.encode_utf16().fold(0i32, |h, c| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(c))
    });
    h.unsigned_abs()
}

/// 12 characters with at least one lower, upper, digit and special character.
pub fn random_password<R: Rng + ?Sized>(rng: &mut R) -> String {
    let all: Vec<u8> = [LOWERS, UPPERS, DIGITS, SPECIALS].concat();

    let mut chars: Vec<char> = vec![
        pick(rng, LOWERS),
        pick(rng, UPPERS),
        pick(rng, DIGITS),
        pick(rng, SPECIALS),
    ];
    while chars.len() < PASSWORD_LEN {
        chars.push(pick(rng, &all));
    }
    chars.shuffle(rng);
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn payload_fields_respect_length_limits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let p = SignupPayload::random(&mut rng);
            assert_eq!(p.name.len(), 8);
            assert!(p.name.starts_with('u'));
            assert_eq!(p.nickname.len(), 10);
            assert!(p.nickname.starts_with("nk"));
            assert_eq!(p.login_id.len(), 12);
            assert!(
                p.login_id
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            );
            assert_eq!(p.phone_number.len(), 11);
            assert!(p.phone_number.starts_with("010"));
            assert!(p.phone_number.bytes().all(|b| b.is_ascii_digit()));
            assert_eq!(p.password, p.confirm_password);
        }
    }

    #[test]
    fn password_contains_every_class() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let pw = random_password(&mut rng);
            assert_eq!(pw.len(), PASSWORD_LEN);
            assert!(pw.bytes().any(|b| b.is_ascii_lowercase()));
            assert!(pw.bytes().any(|b| b.is_ascii_uppercase()));
            assert!(pw.bytes().any(|b| b.is_ascii_digit()));
            assert!(pw.bytes().any(|b| SPECIALS.contains(&b)));
        }
    }

    #[test]
    fn hash_code_matches_java_string_hash() {
        assert_eq!(hash_code(""), 0);
        assert_eq!(hash_code("a"), 97);
        // "hello".hashCode() == 99162322
        assert_eq!(hash_code("hello"), 99_162_322);
        // Overflowing input wraps and takes the absolute value.
        assert_eq!(hash_code("polygenelubricants"), 2_147_483_648);
    }

    #[test]
    fn serializes_camel_case() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = SignupPayload::random(&mut rng);
        let v = serde_json::to_value(&p).unwrap_or_else(|e| panic!("{e}"));
        for key in [
            "name",
            "nickname",
            "phoneNumber",
            "loginId",
            "password",
            "confirmPassword",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }
}
