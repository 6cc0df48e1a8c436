use chatrelay_core::User;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for `POST /api/register`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

impl RegisterRequest {
    /// Surrounding whitespace is not part of an account name.
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_owned();
        self.email = self.email.trim().to_owned();
        self
    }
}

/// Request body for `POST /api/login`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Public view of an account; the password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Response body of both `register` and `login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserProfile,
    /// HS256 bearer token for the `/api` routes.
    pub token: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_requires_a_valid_email() {
        let req = RegisterRequest {
            username: "alice".into(),
            password: "pw".into(),
            email: "not-an-email".into(),
        };
        assert!(req.validate().is_err());

        let req = RegisterRequest {
            email: "alice@example.com".into(),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn normalized_trims_account_names() {
        let req = RegisterRequest {
            username: "  alice ".into(),
            password: " pw ".into(),
            email: " alice@example.com\n".into(),
        }
        .normalized();
        assert_eq!(req.username, "alice");
        assert_eq!(req.email, "alice@example.com");
        assert_eq!(req.password, " pw ");
    }
}
