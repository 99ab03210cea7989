//! Storage account and file share naming rules.
//!
//! These run before a backend session is opened: a malformed account name
//! would otherwise surface as an opaque client construction failure.

use crate::error::NameError;

const ACCOUNT_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=24;
const SHARE_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=63;

/// Check a storage account name: 3 to 24 lowercase ASCII letters or digits.
pub fn validate_account_name(name: &str) -> Result<(), NameError> {
    let valid = ACCOUNT_NAME_LEN.contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(NameError::InvalidAccountName(name.to_owned()))
    }
}

/// Check a file share name: 3 to 63 lowercase letters, digits or hyphens,
/// starting and ending with a letter or digit, with no consecutive hyphens.
pub fn validate_share_name(name: &str) -> Result<(), NameError> {
    let bytes = name.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let valid = SHARE_NAME_LEN.contains(&name.len())
        && bytes.iter().all(|b| alnum(b) || *b == b'-')
        && bytes.first().is_some_and(alnum)
        && bytes.last().is_some_and(alnum)
        && !name.contains("--");
    if valid {
        Ok(())
    } else {
        Err(NameError::InvalidShareName(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_names() {
        for ok in ["abc", "unittest", "devstoreaccount1", "a".repeat(24).as_str()] {
            assert!(validate_account_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "ut", "UnitTest", "unit-test", "unit_test", "a".repeat(25).as_str()] {
            assert_eq!(
                validate_account_name(bad),
                Err(NameError::InvalidAccountName(bad.to_owned()))
            );
        }
    }

    #[test]
    fn share_names() {
        for ok in ["unit-test", "pvc-0a1b2c", "abc", "a".repeat(63).as_str()] {
            assert!(validate_share_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "ab", "-abc", "abc-", "a--b", "Share", "a_b_c", "a".repeat(64).as_str()] {
            assert!(validate_share_name(bad).is_err(), "{bad}");
        }
    }
}
