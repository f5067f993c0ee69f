//! Caller-side input checks. Everything here runs before storage is touched.

use crate::error::NexusError;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration form after validation: username and email trimmed, password untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

pub fn validate_registration<'a>(
    username: &'a str,
    email: &'a str,
    password: &'a str,
    confirm_password: Option<&str>,
) -> Result<Registration<'a>, NexusError> {
    let blank_confirm = confirm_password.is_some_and(|c| c.trim().is_empty());
    if username.trim().is_empty()
        || email.trim().is_empty()
        || password.trim().is_empty()
        || blank_confirm
    {
        return Err(NexusError::validation("Please fill in all fields"));
    }
    // Minimum lengths count UTF-16 units, the username before trimming.
    if utf16_len(username) < MIN_USERNAME_LEN {
        return Err(NexusError::validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters long"
        )));
    }
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(NexusError::validation("Please enter a valid email address"));
    }
    if utf16_len(password) < MIN_PASSWORD_LEN {
        return Err(NexusError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if confirm_password.is_some_and(|c| c != password) {
        return Err(NexusError::validation("Passwords do not match"));
    }

    Ok(Registration {
        username: username.trim(),
        email,
        password,
    })
}

/// Returns the trimmed username; the password is passed through as typed.
pub fn validate_login<'a>(username: &'a str, password: &str) -> Result<&'a str, NexusError> {
    if username.trim().is_empty() || password.trim().is_empty() {
        return Err(NexusError::validation("Please fill in all fields"));
    }
    Ok(username.trim())
}

pub fn validate_title(title: &str) -> Result<&str, NexusError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(NexusError::validation("Please enter a todo title"));
    }
    Ok(title)
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot in the domain
/// with at least one character on each side.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@mail.example.org"));
        assert!(is_valid_email("a@b..c"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@com."));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a@b@c.co"));
        assert!(!is_valid_email("a b@c.co"));
    }

    #[test]
    fn registration_trims_identity_but_not_password() {
        let reg = validate_registration("  alice ", " alice@x.io ", " secret ", Some(" secret "))
            .unwrap();
        assert_eq!(reg.username, "alice");
        assert_eq!(reg.email, "alice@x.io");
        assert_eq!(reg.password, " secret ");
    }

    #[test]
    fn registration_rejections() {
        let msg = |r: Result<Registration<'_>, NexusError>| r.unwrap_err().to_string();
        assert_eq!(
            msg(validate_registration("", "a@b.co", "secret", None)),
            "Please fill in all fields"
        );
        assert_eq!(
            msg(validate_registration("al", "a@b.co", "secret", None)),
            "Username must be at least 3 characters long"
        );
        assert_eq!(
            msg(validate_registration("alice", "nope", "secret", None)),
            "Please enter a valid email address"
        );
        assert_eq!(
            msg(validate_registration("alice", "a@b.co", "short", None)),
            "Password must be at least 6 characters long"
        );
        assert_eq!(
            msg(validate_registration("alice", "a@b.co", "secret", Some("secreT"))),
            "Passwords do not match"
        );
    }

    #[test]
    fn lengths_count_utf16_units_before_trimming() {
        // Padding counts toward the minimum; the stored name is still trimmed.
        let reg = validate_registration(" al ", "a@b.co", "secret", None).unwrap();
        assert_eq!(reg.username, "al");
        // One astral character is two units.
        assert!(validate_registration("a\u{1F600}", "a@b.co", "secret", None).is_ok());
        assert!(validate_registration("alice", "a@b.co", "\u{1F600}\u{1F600}\u{1F600}", None).is_ok());
        assert!(validate_registration("alice", "a@b.co", "\u{1F600}\u{1F600}x", None).is_err());
    }

    #[test]
    fn titles_are_trimmed_and_required() {
        assert_eq!(validate_title("  buy milk \n").unwrap(), "buy milk");
        assert_eq!(validate_title("line one\nline two").unwrap(), "line one\nline two");
        assert!(matches!(validate_title(" \t\n"), Err(NexusError::Validation(_))));
    }
}
