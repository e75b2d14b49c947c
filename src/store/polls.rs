use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::info;

use crate::entities::{choice, poll, question};
use crate::models::poll::{
    ChoicePatch, DeletionSummary, NewChoice, NewPoll, PollDetailView, PollPatch,
};
use crate::polls::{canonicalize_text, validate_votes};

use super::{StoreError, foreign_key_error};

pub async fn create_poll(
    database: &DatabaseConnection,
    new: NewPoll,
) -> Result<poll::Model, StoreError> {
    let title = canonicalize_text("title", &new.title)?;
    let model = poll::ActiveModel {
        id: NotSet,
        title: Set(title),
        start_date: Set(new.start_date.fixed_offset()),
        end_date: Set(new.end_date.fixed_offset()),
    };
    let created = model.insert(database).await?;
    info!(poll_id = created.id, title = %created.title, "Created poll");
    Ok(created)
}

pub async fn get_poll(database: &DatabaseConnection, id: i32) -> Result<poll::Model, StoreError> {
    find_poll(database, id).await
}

/// Newest polls first.
pub async fn list_polls(
    database: &DatabaseConnection,
    limit: u64,
    offset: u64,
) -> Result<Vec<poll::Model>, StoreError> {
    assert!(limit > 0, "Poll page limit must be positive");
    let polls = poll::Entity::find()
        .order_by_desc(poll::Column::StartDate)
        .order_by_desc(poll::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(database)
        .await?;
    Ok(polls)
}

pub async fn update_poll(
    database: &DatabaseConnection,
    id: i32,
    patch: PollPatch,
) -> Result<poll::Model, StoreError> {
    let existing = find_poll(database, id).await?;
    let mut active: poll::ActiveModel = existing.clone().into();
    if let Some(title) = patch.title.as_deref() {
        active.title = Set(canonicalize_text("title", title)?);
    }
    if let Some(start) = patch.start_date {
        active.start_date = Set(start.fixed_offset());
    }
    if let Some(end) = patch.end_date {
        active.end_date = Set(end.fixed_offset());
    }
    if !active.is_changed() {
        return Ok(existing);
    }
    Ok(active.update(database).await?)
}

/// Removes the poll together with its questions and their choices in one
/// transaction. Nothing is removed if any step fails.
pub async fn delete_poll(
    database: &DatabaseConnection,
    id: i32,
) -> Result<DeletionSummary, StoreError> {
    let txn = database.begin().await?;
    find_poll(&txn, id).await?;

    let question_ids: Vec<i32> = question::Entity::find()
        .select_only()
        .column(question::Column::Id)
        .filter(question::Column::PollId.eq(id))
        .into_tuple()
        .all(&txn)
        .await?;

    let mut summary = DeletionSummary::default();
    if !question_ids.is_empty() {
        summary.choices = choice::Entity::delete_many()
            .filter(choice::Column::QuestionId.is_in(question_ids))
            .exec(&txn)
            .await?
            .rows_affected;
        summary.questions = question::Entity::delete_many()
            .filter(question::Column::PollId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
    }
    summary.polls = poll::Entity::delete_by_id(id)
        .exec(&txn)
        .await?
        .rows_affected;
    if summary.polls == 0 {
        // Removed by a concurrent delete after our lookup; dropping `txn` rolls back.
        return Err(StoreError::not_found("poll", id));
    }

    txn.commit().await?;
    info!(
        poll_id = id,
        questions = summary.questions,
        choices = summary.choices,
        "Deleted poll"
    );
    Ok(summary)
}

/// The poll with every question and choice, each level ordered by id.
pub async fn poll_detail(
    database: &DatabaseConnection,
    id: i32,
) -> Result<PollDetailView, StoreError> {
    let poll = find_poll(database, id).await?;
    let questions = question::Entity::find()
        .filter(question::Column::PollId.eq(id))
        .order_by_asc(question::Column::Id)
        .all(database)
        .await?;
    let question_ids: Vec<i32> = questions.iter().map(|q| q.id).collect();
    let choices = if question_ids.is_empty() {
        Vec::new()
    } else {
        choice::Entity::find()
            .filter(choice::Column::QuestionId.is_in(question_ids))
            .order_by_asc(choice::Column::Id)
            .all(database)
            .await?
    };
    Ok(PollDetailView::assemble(&poll, &questions, &choices))
}

pub async fn create_question(
    database: &DatabaseConnection,
    poll_id: i32,
    question_text: &str,
) -> Result<question::Model, StoreError> {
    let question_text = canonicalize_text("question_text", question_text)?;
    if poll::Entity::find_by_id(poll_id).one(database).await?.is_none() {
        return Err(StoreError::ForeignKeyViolation {
            entity: "question",
            parent: "poll",
            parent_id: poll_id,
        });
    }

    let model = question::ActiveModel {
        id: NotSet,
        poll_id: Set(poll_id),
        question_text: Set(question_text),
    };
    let created = model
        .insert(database)
        .await
        .map_err(|err| foreign_key_error(err, "question", "poll", poll_id))?;
    info!(question_id = created.id, poll_id, "Created question");
    Ok(created)
}

pub async fn get_question(
    database: &DatabaseConnection,
    id: i32,
) -> Result<question::Model, StoreError> {
    find_question(database, id).await
}

pub async fn list_questions(
    database: &DatabaseConnection,
    poll_id: i32,
) -> Result<Vec<question::Model>, StoreError> {
    find_poll(database, poll_id).await?;
    let questions = question::Entity::find()
        .filter(question::Column::PollId.eq(poll_id))
        .order_by_asc(question::Column::Id)
        .all(database)
        .await?;
    Ok(questions)
}

pub async fn update_question(
    database: &DatabaseConnection,
    id: i32,
    question_text: &str,
) -> Result<question::Model, StoreError> {
    let question_text = canonicalize_text("question_text", question_text)?;
    let existing = find_question(database, id).await?;
    let mut active: question::ActiveModel = existing.into();
    active.question_text = Set(question_text);
    Ok(active.update(database).await?)
}

/// Removes the question and its choices in one transaction.
pub async fn delete_question(
    database: &DatabaseConnection,
    id: i32,
) -> Result<DeletionSummary, StoreError> {
    let txn = database.begin().await?;
    find_question(&txn, id).await?;

    let choices = choice::Entity::delete_many()
        .filter(choice::Column::QuestionId.eq(id))
        .exec(&txn)
        .await?
        .rows_affected;
    let questions = question::Entity::delete_by_id(id)
        .exec(&txn)
        .await?
        .rows_affected;
    if questions == 0 {
        return Err(StoreError::not_found("question", id));
    }
    txn.commit().await?;

    info!(question_id = id, choices, "Deleted question");
    Ok(DeletionSummary {
        polls: 0,
        questions,
        choices,
    })
}

/// A written choice together with the poll that owns it, so callers can
/// act on the poll without reading it back after the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedChoice {
    pub choice: choice::Model,
    pub poll_id: i32,
}

pub async fn create_choice(
    database: &DatabaseConnection,
    question_id: i32,
    new: NewChoice,
) -> Result<OwnedChoice, StoreError> {
    let choice_text = canonicalize_text("choice_text", &new.choice_text)?;
    let votes = validate_votes(new.votes.unwrap_or(0))?;
    let Some(question) = question::Entity::find_by_id(question_id)
        .one(database)
        .await?
    else {
        return Err(StoreError::ForeignKeyViolation {
            entity: "choice",
            parent: "question",
            parent_id: question_id,
        });
    };

    let model = choice::ActiveModel {
        id: NotSet,
        question_id: Set(question_id),
        choice_text: Set(choice_text),
        votes: Set(votes),
    };
    let created = model
        .insert(database)
        .await
        .map_err(|err| foreign_key_error(err, "choice", "question", question_id))?;
    info!(choice_id = created.id, question_id, "Created choice");
    Ok(OwnedChoice {
        choice: created,
        poll_id: question.poll_id,
    })
}

pub async fn get_choice(
    database: &DatabaseConnection,
    id: i32,
) -> Result<choice::Model, StoreError> {
    find_choice(database, id).await
}

pub async fn list_choices(
    database: &DatabaseConnection,
    question_id: i32,
) -> Result<Vec<choice::Model>, StoreError> {
    find_question(database, question_id).await?;
    let choices = choice::Entity::find()
        .filter(choice::Column::QuestionId.eq(question_id))
        .order_by_asc(choice::Column::Id)
        .all(database)
        .await?;
    Ok(choices)
}

/// Administrative edit of a choice. The tally may be corrected here but
/// never made negative.
pub async fn update_choice(
    database: &DatabaseConnection,
    id: i32,
    patch: ChoicePatch,
) -> Result<OwnedChoice, StoreError> {
    let txn = database.begin().await?;
    let existing = find_choice(&txn, id).await?;
    let poll_id = find_question(&txn, existing.question_id).await?.poll_id;

    let mut active: choice::ActiveModel = existing.clone().into();
    if let Some(text) = patch.choice_text.as_deref() {
        active.choice_text = Set(canonicalize_text("choice_text", text)?);
    }
    if let Some(votes) = patch.votes {
        active.votes = Set(validate_votes(votes)?);
    }
    if !active.is_changed() {
        return Ok(OwnedChoice {
            choice: existing,
            poll_id,
        });
    }

    let updated = active.update(&txn).await.map_err(|err| match err {
        DbErr::RecordNotUpdated => StoreError::not_found("choice", id),
        other => StoreError::Database(other),
    })?;
    txn.commit().await?;
    Ok(OwnedChoice {
        choice: updated,
        poll_id,
    })
}

/// Deletes the choice and returns the id of the poll it belonged to.
pub async fn delete_choice(database: &DatabaseConnection, id: i32) -> Result<i32, StoreError> {
    let txn = database.begin().await?;
    let existing = find_choice(&txn, id).await?;
    let poll_id = find_question(&txn, existing.question_id).await?.poll_id;

    let result = choice::Entity::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(StoreError::not_found("choice", id));
    }
    txn.commit().await?;
    info!(choice_id = id, poll_id, "Deleted choice");
    Ok(poll_id)
}

async fn find_choice<C: ConnectionTrait>(
    connection: &C,
    id: i32,
) -> Result<choice::Model, StoreError> {
    choice::Entity::find_by_id(id)
        .one(connection)
        .await?
        .ok_or_else(|| StoreError::not_found("choice", id))
}

async fn find_poll<C: ConnectionTrait>(connection: &C, id: i32) -> Result<poll::Model, StoreError> {
    poll::Entity::find_by_id(id)
        .one(connection)
        .await?
        .ok_or_else(|| StoreError::not_found("poll", id))
}

async fn find_question<C: ConnectionTrait>(
    connection: &C,
    id: i32,
) -> Result<question::Model, StoreError> {
    question::Entity::find_by_id(id)
        .one(connection)
        .await?
        .ok_or_else(|| StoreError::not_found("question", id))
}
