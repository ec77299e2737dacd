/// Task model and database operations
///
/// Tasks belong to exactly one user via the `owner` column. The relation is
/// lookup-only: a user row never embeds tasks, callers ask
/// [`Task::list_by_owner`] instead. Account deletion relies on
/// [`Task::delete_all_by_owner`] running before the user row is removed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     description TEXT NOT NULL,
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     owner UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Task model representing a single to-do item
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// What needs doing
    pub description: String,

    /// Whether the task is done
    pub completed: bool,

    /// User who owns this task
    pub owner: Uuid,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    /// What needs doing
    pub description: String,

    /// User who owns this task
    pub owner: Uuid,
}

impl Task {
    /// Creates a new task for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the owner does not exist (foreign key violation)
    /// or the database is unavailable
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (description, owner)
            VALUES ($1, $2)
            RETURNING id, description, completed, owner, created_at, updated_at
            "#,
        )
        .bind(data.description.trim())
        .bind(data.owner)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, description, completed, owner, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists every task owned by a user, oldest first
    ///
    /// This is the explicit query behind the user-to-tasks relation.
    pub async fn list_by_owner(pool: &PgPool, owner: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, description, completed, owner, created_at, updated_at
            FROM tasks
            WHERE owner = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Marks a task complete or incomplete
    ///
    /// Returns the updated task, or None if it no longer exists.
    pub async fn set_completed(
        pool: &PgPool,
        id: Uuid,
        completed: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET completed = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, description, completed, owner, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(completed)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Deletes a task by ID
    ///
    /// Returns true if a row was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every task owned by a user
    ///
    /// Runs as part of account deletion, before the user row goes away.
    /// Returns the number of tasks removed.
    pub async fn delete_all_by_owner(pool: &PgPool, owner: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE owner = $1")
            .bind(owner)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Counts tasks owned by a user
    pub async fn count_by_owner(pool: &PgPool, owner: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE owner = $1")
            .bind(owner)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
