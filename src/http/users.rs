//! Administrative CRUD over user accounts. Nothing beyond plain record
//! management is exposed here; sign-in belongs to the authentication layer.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::models::user::{NewUser, PasswordChangeRequest, UserPatch, UserView};
use crate::state::AppState;
use crate::store::users;

use super::{HttpError, PageQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/admin/users/{id}/password", post(change_password))
}

async fn list_users(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserView>>, HttpError> {
    let limit = state.pagination.resolve(page.limit);
    let offset = page.offset.unwrap_or(0);
    let users = users::list_users(&state.database, limit, offset).await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<UserView>), HttpError> {
    let user = users::create_user(&state.database, payload).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

async fn get_user(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<UserView>, HttpError> {
    let user = users::get_user(&state.database, id).await?;
    Ok(Json(UserView::from(&user)))
}

async fn update_user(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<UserView>, HttpError> {
    let user = users::update_user(&state.database, id, patch).await?;
    Ok(Json(UserView::from(&user)))
}

async fn delete_user(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    users::delete_user(&state.database, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_password(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(request): Json<PasswordChangeRequest>,
) -> Result<StatusCode, HttpError> {
    users::set_password(&state.database, id, &request.password).await?;
    Ok(StatusCode::NO_CONTENT)
}
