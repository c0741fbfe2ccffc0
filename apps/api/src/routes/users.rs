//! User management routes.
//!
//! Site admins create shop admins; shop admins create their cashiers. Site
//! admin accounts are only made by the seed binary.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use shopdesk_core::{Role, User, ValidationError};
use shopdesk_db::NewUser;

use crate::auth::CurrentActor;
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/me", get(me))
        .route("/api/users/{id}/deactivate", post(deactivate_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub role: Role,
    #[serde(flatten)]
    pub user: NewUser,
}

async fn list_users(State(state): State<AppState>, CurrentActor(actor): CurrentActor) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.db.users().list(&actor).await?))
}

async fn me(State(state): State<AppState>, CurrentActor(actor): CurrentActor) -> ApiResult<Json<User>> {
    Ok(Json(state.db.users().get(&actor, &actor.user_id).await?))
}

async fn create_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let users = state.db.users();
    let user = match request.role {
        Role::ShopAdmin => users.create_shop_admin(&actor, request.user).await?,
        Role::Cashier => users.create_cashier(&actor, request.user).await?,
        Role::SiteAdmin => {
            return Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec![Role::ShopAdmin.to_string(), Role::Cashier.to_string()],
            }
            .into())
        }
    };
    Ok((StatusCode::CREATED, Json(user)))
}

async fn deactivate_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.db.users().deactivate(&actor, &id).await?))
}
