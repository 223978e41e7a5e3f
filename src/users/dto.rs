use serde::{Deserialize, Serialize};

use crate::auth::dto::PublicUser;

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct UserItem {
    pub user: PublicUser,
}

/// Body of `PUT /users`: `{ "user": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub user: ProfileInput,
}

/// Every field is optional; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub avatar_url: Option<String>,
}
