use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::models::poll::{
    ChoicePatch, ChoiceView, DeletionSummary, NewChoice, NewPoll, NewQuestion, PollDetailView,
    PollPatch, PollView, QuestionView,
};
use crate::state::AppState;
use crate::store::polls;

use super::{HttpError, PageQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/polls", get(list_polls).post(create_poll))
        .route(
            "/polls/{id}",
            get(get_poll_detail).patch(update_poll).delete(delete_poll),
        )
        .route(
            "/polls/{id}/questions",
            get(list_questions).post(create_question),
        )
        .route(
            "/questions/{id}",
            get(get_question).patch(update_question).delete(delete_question),
        )
        .route(
            "/questions/{id}/choices",
            get(list_choices).post(create_choice),
        )
        .route(
            "/choices/{id}",
            get(get_choice).patch(update_choice).delete(delete_choice),
        )
}

async fn list_polls(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PollView>>, HttpError> {
    let limit = state.pagination.resolve(page.limit);
    let offset = page.offset.unwrap_or(0);
    let polls = polls::list_polls(&state.database, limit, offset).await?;
    Ok(Json(polls.iter().map(PollView::from).collect()))
}

async fn create_poll(
    State(state): State<AppState>,
    Json(payload): Json<NewPoll>,
) -> Result<(StatusCode, Json<PollView>), HttpError> {
    let poll = polls::create_poll(&state.database, payload).await?;
    Ok((StatusCode::CREATED, Json(PollView::from(&poll))))
}

async fn get_poll_detail(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<PollDetailView>, HttpError> {
    if let Some(cached) = state.cache.poll_details.get(&id).await {
        return Ok(Json((*cached).clone()));
    }

    let epoch = state.cache.poll_epoch();
    let detail = polls::poll_detail(&state.database, id).await?;
    state
        .cache
        .store_poll_detail(id, Arc::new(detail.clone()), epoch)
        .await;
    Ok(Json(detail))
}

async fn update_poll(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(patch): Json<PollPatch>,
) -> Result<Json<PollView>, HttpError> {
    let poll = polls::update_poll(&state.database, id, patch).await?;
    state.cache.invalidate_poll(id).await;
    Ok(Json(PollView::from(&poll)))
}

async fn delete_poll(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<DeletionSummary>, HttpError> {
    let summary = polls::delete_poll(&state.database, id).await?;
    state.cache.invalidate_poll(id).await;
    Ok(Json(summary))
}

async fn list_questions(
    Path(poll_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestionView>>, HttpError> {
    let questions = polls::list_questions(&state.database, poll_id).await?;
    Ok(Json(questions.iter().map(QuestionView::from).collect()))
}

async fn create_question(
    Path(poll_id): Path<i32>,
    State(state): State<AppState>,
    Json(payload): Json<NewQuestion>,
) -> Result<(StatusCode, Json<QuestionView>), HttpError> {
    let question =
        polls::create_question(&state.database, poll_id, &payload.question_text).await?;
    state.cache.invalidate_poll(poll_id).await;
    Ok((StatusCode::CREATED, Json(QuestionView::from(&question))))
}

async fn get_question(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<QuestionView>, HttpError> {
    let question = polls::get_question(&state.database, id).await?;
    Ok(Json(QuestionView::from(&question)))
}

async fn update_question(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(payload): Json<NewQuestion>,
) -> Result<Json<QuestionView>, HttpError> {
    let question = polls::update_question(&state.database, id, &payload.question_text).await?;
    state.cache.invalidate_poll(question.poll_id).await;
    Ok(Json(QuestionView::from(&question)))
}

async fn delete_question(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<DeletionSummary>, HttpError> {
    let poll_id = polls::get_question(&state.database, id).await?.poll_id;
    let summary = polls::delete_question(&state.database, id).await?;
    state.cache.invalidate_poll(poll_id).await;
    Ok(Json(summary))
}

async fn list_choices(
    Path(question_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChoiceView>>, HttpError> {
    let choices = polls::list_choices(&state.database, question_id).await?;
    Ok(Json(choices.iter().map(ChoiceView::from).collect()))
}

async fn create_choice(
    Path(question_id): Path<i32>,
    State(state): State<AppState>,
    Json(payload): Json<NewChoice>,
) -> Result<(StatusCode, Json<ChoiceView>), HttpError> {
    let written = polls::create_choice(&state.database, question_id, payload).await?;
    state.cache.invalidate_poll(written.poll_id).await;
    Ok((StatusCode::CREATED, Json(ChoiceView::from(&written.choice))))
}

async fn get_choice(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ChoiceView>, HttpError> {
    let choice = polls::get_choice(&state.database, id).await?;
    Ok(Json(ChoiceView::from(&choice)))
}

async fn update_choice(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(patch): Json<ChoicePatch>,
) -> Result<Json<ChoiceView>, HttpError> {
    let written = polls::update_choice(&state.database, id, patch).await?;
    state.cache.invalidate_poll(written.poll_id).await;
    Ok(Json(ChoiceView::from(&written.choice)))
}

async fn delete_choice(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    let poll_id = polls::delete_choice(&state.database, id).await?;
    state.cache.invalidate_poll(poll_id).await;
    Ok(StatusCode::NO_CONTENT)
}
