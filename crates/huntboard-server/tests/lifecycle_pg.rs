//! Postgres-backed lifecycle tests.
//!
//! These run against a real database and are ignored by default:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/huntboard_test cargo test -- --ignored
//! ```

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use huntboard_server::db;
use huntboard_server::scoring::{self, JobOutcome, MeanScoreThreshold};

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for these tests");
    let pool = db::create_pool(&url).await.expect("connect");
    db::run_migrations(&pool).await.expect("migrate");
    pool
}

async fn seed_bounty(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO bounties (id, creator_id, title, description, status) \
         VALUES ($1, $2, 'Find the bug', 'Hunt it down', 'active')",
    )
    .bind(id)
    .bind(Uuid::new_v4())
    .execute(pool)
    .await
    .expect("seed bounty");
    id
}

async fn seed_submission(pool: &PgPool, bounty_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO submissions (id, bounty_id, submitter_id, title, description, content, \
                                  urls, content_type, status) \
         VALUES ($1, $2, $3, 'Entry', 'My entry', 'writeup', '{}', 'text', 'pending')",
    )
    .bind(id)
    .bind(bounty_id)
    .bind(Uuid::new_v4())
    .execute(pool)
    .await
    .expect("seed submission");
    id
}

async fn seed_screener(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO screeners (id, name, identity_key, endpoint) \
         VALUES ($1, 'test-screener', $2, 'https://screener.test')",
    )
    .bind(id)
    .bind(format!("key-{}", Uuid::new_v4()))
    .execute(pool)
    .await
    .expect("seed screener");
    id
}

async fn seed_job(pool: &PgPool, submission_id: Uuid, screener_id: Uuid, status: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(&format!(
        "INSERT INTO scoring_jobs (id, submission_id, screener_id, status) \
         VALUES ($1, $2, $3, '{}')",
        status
    ))
    .bind(id)
    .bind(submission_id)
    .bind(screener_id)
    .execute(pool)
    .await
    .expect("seed job");

    sqlx::query(
        "INSERT INTO scoring_tasks (job_id, dimension, weight) VALUES ($1, 'quality', 1)",
    )
    .bind(id)
    .execute(pool)
    .await
    .expect("seed task");
    id
}

async fn job_and_task_counts(pool: &PgPool, submission_id: Uuid) -> (i64, i64) {
    let (jobs,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM scoring_jobs WHERE submission_id = $1")
            .bind(submission_id)
            .fetch_one(pool)
            .await
            .unwrap();
    let (tasks,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM scoring_tasks WHERE job_id IN \
         (SELECT id FROM scoring_jobs WHERE submission_id = $1)",
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await
    .unwrap();
    (jobs, tasks)
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
async fn rescore_clears_all_scoring_state() {
    let pool = test_pool().await;
    let bounty_id = seed_bounty(&pool).await;
    let submission_id = seed_submission(&pool, bounty_id).await;
    let screener_id = seed_screener(&pool).await;
    seed_job(&pool, submission_id, screener_id, "completed").await;
    seed_job(&pool, submission_id, screener_id, "failed").await;

    sqlx::query(
        "UPDATE submissions SET status = 'approved', score = 88, scored_by = $2 WHERE id = $1",
    )
    .bind(submission_id)
    .bind(vec![screener_id])
    .execute(&pool)
    .await
    .unwrap();

    scoring::rescore_submission(&pool, submission_id)
        .await
        .expect("rescore");

    assert_eq!(job_and_task_counts(&pool, submission_id).await, (0, 0));

    let (status, score, scored_by): (String, Option<BigDecimal>, Vec<Uuid>) = sqlx::query_as(
        "SELECT status::TEXT, score, scored_by FROM submissions WHERE id = $1",
    )
    .bind(submission_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(status, "pending");
    assert_eq!(score, None);
    assert!(scored_by.is_empty());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
async fn rescore_unknown_submission_is_not_found() {
    let pool = test_pool().await;
    let result = scoring::rescore_submission(&pool, Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(huntboard_server::AppError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
async fn rescore_statements_roll_back_as_one_unit() {
    let pool = test_pool().await;
    let bounty_id = seed_bounty(&pool).await;
    let submission_id = seed_submission(&pool, bounty_id).await;
    let screener_id = seed_screener(&pool).await;
    seed_job(&pool, submission_id, screener_id, "completed").await;

    sqlx::query("UPDATE submissions SET status = 'approved', score = 90 WHERE id = $1")
        .bind(submission_id)
        .execute(&pool)
        .await
        .unwrap();

    // Run the same delete/reset sequence inside a transaction that is
    // dropped before commit; nothing may stick.
    {
        let mut tx = pool.begin().await.unwrap();
        sqlx::query(
            "DELETE FROM scoring_tasks WHERE job_id IN \
             (SELECT id FROM scoring_jobs WHERE submission_id = $1)",
        )
        .bind(submission_id)
        .execute(&mut *tx)
        .await
        .unwrap();
        sqlx::query("DELETE FROM scoring_jobs WHERE submission_id = $1")
            .bind(submission_id)
            .execute(&mut *tx)
            .await
            .unwrap();
        sqlx::query("UPDATE submissions SET status = 'pending', score = NULL WHERE id = $1")
            .bind(submission_id)
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.rollback().await.unwrap();
    }

    assert_eq!(job_and_task_counts(&pool, submission_id).await, (1, 1));
    let (status, score): (String, Option<BigDecimal>) =
        sqlx::query_as("SELECT status::TEXT, score FROM submissions WHERE id = $1")
            .bind(submission_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "approved");
    assert_eq!(score, Some(BigDecimal::from(90)));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
async fn completed_outcome_advances_the_submission() {
    let pool = test_pool().await;
    let bounty_id = seed_bounty(&pool).await;
    let submission_id = seed_submission(&pool, bounty_id).await;
    let screener_id = seed_screener(&pool).await;
    let job_id = seed_job(&pool, submission_id, screener_id, "pending").await;

    let strategy = MeanScoreThreshold::default();
    for outcome in [
        JobOutcome::Assigned,
        JobOutcome::Scoring,
        JobOutcome::Completed {
            score: BigDecimal::from(92),
        },
    ] {
        scoring::record_job_outcome(&pool, job_id, outcome, &strategy)
            .await
            .expect("outcome");
    }

    let (status, score, scored_by): (String, Option<BigDecimal>, Vec<Uuid>) = sqlx::query_as(
        "SELECT status::TEXT, score, scored_by FROM submissions WHERE id = $1",
    )
    .bind(submission_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(status, "approved");
    assert_eq!(score, Some(BigDecimal::from(92)));
    assert_eq!(scored_by, vec![screener_id]);

    // Terminal jobs reject further outcomes.
    let again = scoring::record_job_outcome(
        &pool,
        job_id,
        JobOutcome::Completed {
            score: BigDecimal::from(10),
        },
        &strategy,
    )
    .await;
    assert!(matches!(
        again,
        Err(huntboard_server::AppError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance via DATABASE_URL"]
async fn concurrent_first_votes_persist_exactly_once() {
    let pool = test_pool().await;
    let bounty_id = seed_bounty(&pool).await;
    let submission_id = seed_submission(&pool, bounty_id).await;
    let user_id = Uuid::new_v4();

    let insert = |pool: PgPool| async move {
        sqlx::query(
            "INSERT INTO votes (id, submission_id, user_id, vote_type) \
             VALUES ($1, $2, $3, 'upvote')",
        )
        .bind(Uuid::new_v4())
        .bind(submission_id)
        .bind(user_id)
        .execute(&pool)
        .await
    };

    let (a, b) = tokio::join!(insert(pool.clone()), insert(pool.clone()));
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    let conflicts = [&a, &b]
        .iter()
        .filter(|r| {
            matches!(r, Err(sqlx::Error::Database(db)) if db.is_unique_violation())
        })
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM votes WHERE submission_id = $1 AND user_id = $2",
    )
    .bind(submission_id)
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}
