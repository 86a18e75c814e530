use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern");
    /// International format with country code, e.g. +923001234567
    static ref PHONE_NUMBER: Regex = Regex::new(r"^\+\d{11,14}$").expect("phone pattern");
    /// CNIC format, e.g. 35202-1234567-8
    static ref CNIC: Regex = Regex::new(r"^\d{5}-\d{7}-\d$").expect("cnic pattern");
    /// Registration plate format, e.g. ABC-1234
    static ref REGISTRATION: Regex = Regex::new(r"^[A-Z]{2,3}-\d{1,4}$").expect("plate pattern");
}

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// A 4-digit driver PIN. Uniqueness is the caller's concern.
pub fn random_pin() -> String {
    let mut rng = thread_rng();

    format!("{:04}", rng.gen_range(0..10_000))
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

pub fn is_valid_phone_number(value: &str) -> bool {
    PHONE_NUMBER.is_match(value)
}

pub fn is_valid_cnic(value: &str) -> bool {
    CNIC.is_match(value)
}

pub fn is_valid_registration(value: &str) -> bool {
    REGISTRATION.is_match(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pin_is_four_digits() {
        for _ in 0..100 {
            let pin = random_pin();

            assert_eq!(pin.len(), 4);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn validation_patterns() {
        assert!(is_valid_email("rider@safri360.pk"));
        assert!(!is_valid_email("not-an-email"));

        assert!(is_valid_phone_number("+923001234567"));
        assert!(!is_valid_phone_number("03001234567"));

        assert!(is_valid_cnic("35202-1234567-8"));
        assert!(!is_valid_cnic("352021234567"));

        assert!(is_valid_registration("ABC-1234"));
        assert!(!is_valid_registration("abc1234"));
    }
}
