use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::database::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Please enter an email address")]
    EmptyEmail,
    #[error("Not a valid email address: {0}")]
    InvalidEmail(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$",
    )
    .expect("email pattern compiles")
});

pub fn is_valid_email(email: &str) -> bool {
    RE_EMAIL.is_match(email)
}

/// Remember `email` as the signed-in user. Only the format is checked.
pub fn login(db: &Database, email: &str) -> Result<String, SessionError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(SessionError::EmptyEmail);
    }
    if !is_valid_email(email) {
        return Err(SessionError::InvalidEmail(email.to_string()));
    }
    db.save_user_email(email)?;
    db.set_user_logged_in(true)?;
    tracing::info!("user logged in");
    Ok(db.user_display_name()?)
}

pub fn logout(db: &Database) -> Result<(), SessionError> {
    db.logout_user()?;
    Ok(())
}

/// Display name when logged in
pub fn current_user(db: &Database) -> Result<Option<String>, SessionError> {
    if !db.is_user_logged_in()? {
        return Ok(None);
    }
    Ok(Some(db.user_display_name()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.com"));
    }

    #[test]
    fn login_then_logout() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(login(&db, "   "), Err(SessionError::EmptyEmail)));
        assert!(matches!(login(&db, "bad"), Err(SessionError::InvalidEmail(_))));
        assert_eq!(current_user(&db).unwrap(), None);

        assert_eq!(login(&db, " reza@example.com ").unwrap(), "Reza");
        assert_eq!(current_user(&db).unwrap().as_deref(), Some("Reza"));
        logout(&db).unwrap();
        assert_eq!(current_user(&db).unwrap(), None);
    }
}
