use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, ResetPasswordRequest, SignupUser},
        jwt::JwtKeys,
        password::{generate_reset_token, hash_password, verify_password},
        repo::UserStore,
        repo_types::NewUser,
    },
    db::StoreError,
    error::{AppError, ResetError},
    state::AppState,
};

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const NAME_MIN_LEN: usize = 2;
pub(crate) const NAME_MAX_LEN: usize = 50;
pub(crate) const EMAIL_TAKEN: &str = "Email has already been taken";

lazy_static! {
    /// Verified against on the unknown-email path so both login failures
    /// cost one argon2 run.
    static ref DUMMY_DIGEST: String =
        hash_password("dummy-password-for-timing").unwrap_or_default();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn email_errors(email: &str) -> Vec<String> {
    if email.is_empty() {
        vec!["Email can't be blank".into()]
    } else if !is_valid_email(email) {
        vec!["Email is invalid".into()]
    } else {
        Vec::new()
    }
}

pub(crate) fn name_errors(name: &str) -> Vec<String> {
    let len = name.chars().count();
    if len == 0 {
        vec!["Name can't be blank".into()]
    } else if len < NAME_MIN_LEN {
        vec![format!("Name is too short (minimum is {NAME_MIN_LEN} characters)")]
    } else if len > NAME_MAX_LEN {
        vec![format!("Name is too long (maximum is {NAME_MAX_LEN} characters)")]
    } else {
        Vec::new()
    }
}

pub(crate) fn password_errors(password: &str, confirmation: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.is_empty() {
        errors.push("Password can't be blank".into());
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password is too short (minimum is {MIN_PASSWORD_LEN} characters)"
        ));
    }
    if confirmation.is_empty() {
        errors.push("Password confirmation can't be blank".into());
    } else if confirmation != password {
        errors.push("Password confirmation doesn't match Password".into());
    }
    errors
}

/// Trims optional profile text; blank input is treated as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Unknown email and wrong password produce the same error.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = req.email.trim();

    let Some(user) = state.store.find_user_by_email(email).await? else {
        // result is irrelevant, only the work
        verify_password(&req.password, &DUMMY_DIGEST).ok();
        warn!("login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_digest)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    state
        .store
        .record_login(user.id, OffsetDateTime::now_utc())
        .await?;

    let token = JwtKeys::from_ref(state).sign(&user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

/// Validates, persists and signs in a new account. Messages come back in
/// field order: email, name, password, confirmation.
pub async fn signup(state: &AppState, input: SignupUser) -> Result<AuthResponse, AppError> {
    let email = input.email.trim().to_string();
    let name = input.name.trim().to_string();

    let mut errors = email_errors(&email);
    if errors.is_empty() && state.store.find_user_by_email(&email).await?.is_some() {
        errors.push(EMAIL_TAKEN.into());
    }
    errors.extend(name_errors(&name));
    errors.extend(password_errors(
        &input.password,
        &input.password_confirmation,
    ));
    if !errors.is_empty() {
        debug!(count = errors.len(), "signup rejected");
        return Err(AppError::Validation(errors));
    }

    let new_user = NewUser {
        email,
        name,
        password_digest: hash_password(&input.password)?,
        bio: non_blank(input.bio),
        location: non_blank(input.location),
        website: non_blank(input.website),
        avatar_url: non_blank(input.avatar_url),
    };

    let user = match state.store.create_user(new_user).await {
        Ok(u) => u,
        Err(StoreError::Conflict("email")) => {
            return Err(AppError::Validation(vec![EMAIL_TAKEN.into()]))
        }
        Err(e) => return Err(e.into()),
    };

    let token = JwtKeys::from_ref(state).sign(&user)?;
    info!(user_id = %user.id, "user registered");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

/// Issues a reset token when the address is registered. The caller answers
/// the same way in both cases.
pub async fn request_reset(
    state: &AppState,
    email: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let email = email.trim();
    let Some(user) = state.store.find_user_by_email(email).await? else {
        debug!("password reset requested for unknown email");
        return Ok(());
    };

    let token = generate_reset_token();
    state.store.store_reset_token(user.id, &token, now).await?;
    info!(user_id = %user.id, "password reset requested");
    if state.config.reset.log_tokens {
        info!(user_id = %user.id, %token, "password reset token issued");
    }
    Ok(())
}

pub async fn complete_reset(
    state: &AppState,
    req: ResetPasswordRequest,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let user = state
        .store
        .find_user_by_reset_token(&req.token)
        .await?
        .ok_or(ResetError::InvalidToken)?;
    let issued_at = user
        .reset_token_issued_at
        .ok_or(ResetError::InvalidToken)?;

    if now - issued_at > Duration::minutes(state.config.reset.ttl_minutes) {
        warn!(user_id = %user.id, "expired reset token presented");
        return Err(ResetError::Expired.into());
    }
    if req.password != req.password_confirmation {
        return Err(ResetError::Mismatch.into());
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ResetError::TooShort.into());
    }

    let digest = hash_password(&req.password)?;
    // Someone else may have consumed the token since the lookup.
    if !state
        .store
        .complete_password_reset(user.id, &req.token, &digest)
        .await?
    {
        return Err(ResetError::InvalidToken.into());
    }

    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_input(email: &str, password: &str, confirmation: &str) -> SignupUser {
        SignupUser {
            name: "Hanako".into(),
            email: email.into(),
            password: password.into(),
            password_confirmation: confirmation.into(),
            ..Default::default()
        }
    }

    fn reset_req(token: &str, password: &str, confirmation: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            token: token.into(),
            password: password.into(),
            password_confirmation: confirmation.into(),
        }
    }

    async fn issued_token(state: &AppState, email: &str) -> String {
        state
            .store
            .find_user_by_email(email)
            .await
            .unwrap()
            .and_then(|u| u.reset_token)
            .expect("reset token stored")
    }

    #[test]
    fn dummy_digest_is_a_real_hash() {
        assert_eq!(verify_password("Password123!", &DUMMY_DIGEST).ok(), Some(false));
    }

    #[test]
    fn email_checks() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert_eq!(email_errors(""), vec!["Email can't be blank"]);
        assert_eq!(email_errors("nope"), vec!["Email is invalid"]);
    }

    #[test]
    fn name_bounds_count_characters() {
        assert!(name_errors("太郎").is_empty());
        assert_eq!(
            name_errors("A"),
            vec!["Name is too short (minimum is 2 characters)"]
        );
        assert_eq!(
            name_errors(&"x".repeat(51)),
            vec!["Name is too long (maximum is 50 characters)"]
        );
    }

    #[test]
    fn password_rules() {
        assert!(password_errors("Password123!", "Password123!").is_empty());
        assert_eq!(
            password_errors("short", "short"),
            vec!["Password is too short (minimum is 8 characters)"]
        );
        assert_eq!(
            password_errors("Password123!", "Password123?"),
            vec!["Password confirmation doesn't match Password"]
        );
    }

    #[tokio::test]
    async fn signup_stores_hash_not_plaintext() {
        let state = AppState::fake();
        let res = signup(&state, signup_input("a@x.com", "Password123!", "Password123!"))
            .await
            .expect("signup");
        assert!(!res.token.is_empty());
        let stored = state
            .store
            .find_user_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_digest, "Password123!");
        assert!(verify_password("Password123!", &stored.password_digest).unwrap());
    }

    #[tokio::test]
    async fn signup_reports_every_problem_in_order() {
        let state = AppState::fake();
        let mut input = signup_input("bad", "short", "other");
        input.name = "A".into();
        let Err(AppError::Validation(errors)) = signup(&state, input).await else {
            panic!("expected validation failure");
        };
        assert_eq!(
            errors,
            vec![
                "Email is invalid",
                "Name is too short (minimum is 2 characters)",
                "Password is too short (minimum is 8 characters)",
                "Password confirmation doesn't match Password",
            ]
        );
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_email() {
        let state = AppState::fake();
        signup(&state, signup_input("a@x.com", "Password123!", "Password123!"))
            .await
            .unwrap();
        let Err(AppError::Validation(errors)) =
            signup(&state, signup_input("a@x.com", "Password123!", "Password123!")).await
        else {
            panic!("expected validation failure");
        };
        assert_eq!(errors, vec![EMAIL_TAKEN]);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = AppState::fake();
        signup(&state, signup_input("a@x.com", "Password123!", "Password123!"))
            .await
            .unwrap();

        let wrong_password = login(
            &state,
            LoginRequest {
                email: "a@x.com".into(),
                password: "nope-nope".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown_email = login(
            &state,
            LoginRequest {
                email: "b@x.com".into(),
                password: "Password123!".into(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn login_records_last_login() {
        let state = AppState::fake();
        signup(&state, signup_input("a@x.com", "Password123!", "Password123!"))
            .await
            .unwrap();
        login(
            &state,
            LoginRequest {
                email: "a@x.com".into(),
                password: "Password123!".into(),
            },
        )
        .await
        .unwrap();
        let user = state
            .store
            .find_user_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn reset_succeeds_once() {
        let state = AppState::fake();
        signup(&state, signup_input("a@x.com", "Password123!", "Password123!"))
            .await
            .unwrap();
        let now = OffsetDateTime::now_utc();
        request_reset(&state, "a@x.com", now).await.unwrap();
        let token = issued_token(&state, "a@x.com").await;

        complete_reset(&state, reset_req(&token, "NewPass456!", "NewPass456!"), now)
            .await
            .expect("first completion");
        let user = state
            .store
            .find_user_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.reset_token.is_none());
        assert!(user.reset_token_issued_at.is_none());
        assert!(verify_password("NewPass456!", &user.password_digest).unwrap());

        let again = complete_reset(&state, reset_req(&token, "Other789!!", "Other789!!"), now)
            .await
            .unwrap_err();
        assert!(matches!(again, AppError::Reset(ResetError::InvalidToken)));
    }

    #[tokio::test]
    async fn reset_expires_after_an_hour() {
        let state = AppState::fake();
        signup(&state, signup_input("a@x.com", "Password123!", "Password123!"))
            .await
            .unwrap();
        let issued = OffsetDateTime::now_utc() - Duration::minutes(61);
        request_reset(&state, "a@x.com", issued).await.unwrap();
        let token = issued_token(&state, "a@x.com").await;

        let err = complete_reset(
            &state,
            reset_req(&token, "NewPass456!", "NewPass456!"),
            OffsetDateTime::now_utc(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Reset(ResetError::Expired)));

        // invalid new password does not change the outcome
        let err = complete_reset(&state, reset_req(&token, "x", "y"), OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Reset(ResetError::Expired)));
    }

    #[tokio::test]
    async fn reset_checks_confirmation_then_length() {
        let state = AppState::fake();
        signup(&state, signup_input("a@x.com", "Password123!", "Password123!"))
            .await
            .unwrap();
        let now = OffsetDateTime::now_utc();
        request_reset(&state, "a@x.com", now).await.unwrap();
        let token = issued_token(&state, "a@x.com").await;

        let err = complete_reset(&state, reset_req(&token, "short", "shorter"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Reset(ResetError::Mismatch)));

        let err = complete_reset(&state, reset_req(&token, "short", "short"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Reset(ResetError::TooShort)));

        // failed attempts leave the token usable
        assert_eq!(issued_token(&state, "a@x.com").await, token);
    }

    #[tokio::test]
    async fn reset_request_for_unknown_email_is_silent() {
        let state = AppState::fake();
        request_reset(&state, "ghost@x.com", OffsetDateTime::now_utc())
            .await
            .expect("no error for unknown address");
    }
}
