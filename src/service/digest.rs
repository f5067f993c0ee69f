/// One-way transform applied to passwords before they are stored or compared.
pub trait PasswordDigest: Send + Sync {
    fn digest(&self, password: &str) -> String;
}

/// Multiply-by-31 rolling hash over UTF-16 code units, 32-bit wrapping,
/// rendered as the decimal absolute value.
///
/// Not a cryptographic hash. It only keeps plaintext out of the `users` table;
/// collisions are expected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingDigest;

impl PasswordDigest for RollingDigest {
    fn digest(&self, password: &str) -> String {
        rolling_hash(password)
    }
}

pub fn rolling_hash(password: &str) -> String {
    let acc = password.encode_utf16().fold(0i32, |acc, unit| {
        acc.wrapping_shl(5)
            .wrapping_sub(acc)
            .wrapping_add(i32::from(unit))
    });
    // Widen first: |i32::MIN| does not fit in i32.
    i64::from(acc).abs().to_string()
}
