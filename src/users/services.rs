use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::{
        password::hash_password,
        repo::UserStore,
        repo_types::{User, UserChanges},
        services::{email_errors, name_errors, non_blank, password_errors, EMAIL_TAKEN},
    },
    db::StoreError,
    error::AppError,
    pagination::Pagination,
    state::AppState,
    users::dto::ProfileInput,
};

pub async fn list_users(state: &AppState, pagination: Pagination) -> Result<Vec<User>, AppError> {
    Ok(state.store.list_users(pagination.window()).await?)
}

pub async fn get_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Partial update of the caller's own profile. A blank password leaves the
/// current one in place; blank profile text is ignored.
pub async fn update_profile(
    state: &AppState,
    user: &User,
    input: ProfileInput,
) -> Result<User, AppError> {
    let mut errors = Vec::new();
    let mut changes = UserChanges::default();

    if let Some(email) = input.email.map(|e| e.trim().to_string()) {
        if email != user.email {
            let mut email_errs = email_errors(&email);
            if email_errs.is_empty() && state.store.find_user_by_email(&email).await?.is_some() {
                email_errs.push(EMAIL_TAKEN.into());
            }
            errors.extend(email_errs);
            changes.email = Some(email);
        }
    }
    if let Some(name) = input.name.map(|n| n.trim().to_string()) {
        errors.extend(name_errors(&name));
        changes.name = Some(name);
    }
    if let Some(password) = input.password.filter(|p| !p.is_empty()) {
        let confirmation = input.password_confirmation.unwrap_or_default();
        errors.extend(password_errors(&password, &confirmation));
        if errors.is_empty() {
            changes.password_digest = Some(hash_password(&password)?);
        }
    }
    if !errors.is_empty() {
        debug!(user_id = %user.id, count = errors.len(), "profile update rejected");
        return Err(AppError::Validation(errors));
    }

    changes.bio = non_blank(input.bio);
    changes.location = non_blank(input.location);
    changes.website = non_blank(input.website);
    changes.avatar_url = non_blank(input.avatar_url);

    let updated = match state.store.update_user(user.id, changes).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err(AppError::UserNotFound),
        Err(StoreError::Conflict("email")) => {
            return Err(AppError::Validation(vec![EMAIL_TAKEN.into()]))
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id = %updated.id, "profile updated");
    Ok(updated)
}

pub async fn delete_account(state: &AppState, user: &User) -> Result<(), AppError> {
    if !state.store.delete_user(user.id).await? {
        return Err(AppError::UserNotFound);
    }
    info!(user_id = %user.id, "account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{dto::SignupUser, password::verify_password, services::signup};

    async fn registered(state: &AppState, email: &str) -> User {
        let input = SignupUser {
            name: "Hanako".into(),
            email: email.into(),
            password: "Password123!".into(),
            password_confirmation: "Password123!".into(),
            ..Default::default()
        };
        signup(state, input).await.unwrap();
        state
            .store
            .find_user_by_email(email)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn updates_only_given_fields() {
        let state = AppState::fake();
        let user = registered(&state, "a@x.com").await;
        let input = ProfileInput {
            bio: Some("Backpacker".into()),
            location: Some("  ".into()),
            ..Default::default()
        };
        let updated = update_profile(&state, &user, input).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Backpacker"));
        assert_eq!(updated.location, None);
        assert_eq!(updated.name, "Hanako");
        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn taken_email_is_rejected() {
        let state = AppState::fake();
        registered(&state, "a@x.com").await;
        let b = registered(&state, "b@x.com").await;
        let input = ProfileInput {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        match update_profile(&state, &b, input).await {
            Err(AppError::Validation(errors)) => assert_eq!(errors, vec![EMAIL_TAKEN]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn password_change_needs_confirmation() {
        let state = AppState::fake();
        let user = registered(&state, "a@x.com").await;

        let mismatched = ProfileInput {
            password: Some("NewPassword1".into()),
            password_confirmation: Some("Different1".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_profile(&state, &user, mismatched).await,
            Err(AppError::Validation(_))
        ));

        let ok = ProfileInput {
            password: Some("NewPassword1".into()),
            password_confirmation: Some("NewPassword1".into()),
            ..Default::default()
        };
        let updated = update_profile(&state, &user, ok).await.unwrap();
        assert!(verify_password("NewPassword1", &updated.password_digest).unwrap());
    }

    #[tokio::test]
    async fn deleted_account_is_gone() {
        let state = AppState::fake();
        let user = registered(&state, "a@x.com").await;
        delete_account(&state, &user).await.unwrap();
        assert!(state.store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(matches!(
            delete_account(&state, &user).await,
            Err(AppError::UserNotFound)
        ));
    }
}
