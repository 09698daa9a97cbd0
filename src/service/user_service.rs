use std::sync::Arc;

use serde::Deserialize;
use validator::ValidateEmail;

use crate::{
    auth,
    domain::{CreateUserRequest, User},
    error::{AppError, FieldErrors, Result},
    repository::UserRepository,
};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 150;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SignupForm {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password1: String,
    pub password2: String,
}

impl SignupForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let username = self.username.trim();

        if username.is_empty() {
            errors.add("username", "This field is required.");
        } else if username.chars().count() > MAX_USERNAME_LEN {
            errors.add("username", "Ensure this value has at most 150 characters.");
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            if !email.validate_email() {
                errors.add("email", "Enter a valid email address.");
            }
        }

        if self.password1.chars().count() < MIN_PASSWORD_LEN {
            errors.add("password1", "This password is too short. It must contain at least 8 characters.");
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors
    }
}

pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn register(&self, form: SignupForm) -> Result<User> {
        form.validate().into_result()?;

        let request = CreateUserRequest {
            username: form.username.trim().to_string(),
            email: form.email
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty()),
            password: form.password1,
            is_staff: false,
        };

        match self.repo.create(request).await {
            Ok(user) => {
                tracing::info!("Registered user {}", user.username);
                Ok(user)
            }
            Err(AppError::Conflict(msg)) => {
                let mut errors = FieldErrors::new();
                errors.add("username", msg);
                Err(AppError::Form(errors))
            }
            Err(e) => Err(e),
        }
    }

    /// `None` when the username is unknown or the password is wrong.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some((user, hash)) = self.repo.find_credentials(username.trim()).await? else {
            return Ok(None);
        };

        if auth::password::verify(password, &hash).await? {
            Ok(Some(user))
        } else {
            tracing::debug!("Password mismatch for {}", user.username);
            Ok(None)
        }
    }

    /// Creates a staff account, or promotes an existing user to staff.
    pub async fn ensure_staff(&self, username: &str, email: Option<String>, password: &str) -> Result<User> {
        if let Some(existing) = self.repo.find_by_username(username).await? {
            return self.repo.set_staff(existing.id, true).await;
        }

        self.repo
            .create(CreateUserRequest {
                username: username.to_string(),
                email,
                password: password.to_string(),
                is_staff: true,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, p1: &str, p2: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            email: None,
            password1: p1.to_string(),
            password2: p2.to_string(),
        }
    }

    #[test]
    fn accepts_reasonable_signup() {
        assert!(form("jane.doe+1", "s3cret-pass", "s3cret-pass").validate().is_empty());
    }

    #[test]
    fn rejects_mismatched_and_short_passwords() {
        let errors = form("jane", "short", "shorter").validate();
        assert!(errors.contains("password1"));
        assert!(errors.contains("password2"));
    }

    #[test]
    fn email_is_optional_but_must_be_valid() {
        let mut signup = form("jane", "s3cret-pass", "s3cret-pass");
        signup.email = Some("   ".to_string());
        assert!(signup.validate().is_empty());

        signup.email = Some("jane@example.com".to_string());
        assert!(signup.validate().is_empty());

        signup.email = Some("not-an-email".to_string());
        assert_eq!(signup.validate().first("email"), "Enter a valid email address.");
    }

    #[test]
    fn rejects_odd_usernames() {
        assert!(form("", "s3cret-pass", "s3cret-pass").validate().contains("username"));
        assert!(form("jane doe", "s3cret-pass", "s3cret-pass").validate().contains("username"));
    }
}
