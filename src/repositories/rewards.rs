use sqlx::PgConnection;
use uuid::Uuid;

use super::StoreError;
use crate::models::rewards::{NewRewardRecord, RewardRecord, REWARD_STATUS_COMPLETED};

#[derive(sqlx::FromRow)]
struct RewardRecordRow {
    id: String,
    user_id: String,
    reward_type: String,
    amount: i64,
    related_user_id: Option<String>,
    invitation_id: Option<String>,
    status: String,
    created_at: chrono::NaiveDateTime,
}

impl TryFrom<RewardRecordRow> for RewardRecord {
    type Error = StoreError;

    fn try_from(row: RewardRecordRow) -> Result<Self, Self::Error> {
        let reward_type = row.reward_type.parse().map_err(StoreError::Corrupt)?;

        Ok(RewardRecord {
            id: row.id,
            user_id: row.user_id,
            reward_type,
            amount: row.amount,
            related_user_id: row.related_user_id,
            invitation_id: row.invitation_id,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

pub async fn insert_reward_record(
    conn: &mut PgConnection,
    record: &NewRewardRecord,
) -> Result<RewardRecord, StoreError> {
    let record_id = Uuid::new_v4().hyphenated().to_string();

    let row = sqlx::query_as::<_, RewardRecordRow>(
        r#"
            INSERT INTO reward_records
            (id, user_id, reward_type, amount, related_user_id, invitation_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        "#,
    )
    .bind(&record_id)
    .bind(&record.user_id)
    .bind(record.reward_type.as_str())
    .bind(record.amount)
    .bind(&record.related_user_id)
    .bind(&record.invitation_id)
    .bind(REWARD_STATUS_COMPLETED)
    .fetch_one(&mut *conn)
    .await?;

    RewardRecord::try_from(row)
}

pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: &str,
) -> Result<Vec<RewardRecord>, StoreError> {
    let rows = sqlx::query_as::<_, RewardRecordRow>(
        "SELECT * FROM reward_records WHERE user_id = $1 ORDER BY created_at, id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(RewardRecord::try_from).collect()
}

pub async fn sum_for_user(conn: &mut PgConnection, user_id: &str) -> Result<i64, StoreError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM reward_records WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(total)
}

pub async fn total_distributed(conn: &mut PgConnection) -> Result<i64, StoreError> {
    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM reward_records")
        .fetch_one(&mut *conn)
        .await?;

    Ok(total)
}
