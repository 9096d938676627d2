use sqlx::PgConnection;
use uuid::Uuid;

use super::StoreError;
use crate::models::{
    stats::LedgerMismatch,
    users::{NewUser, User},
    wallet::WalletAddress,
};

pub async fn insert_user(conn: &mut PgConnection, new_user: &NewUser) -> Result<User, StoreError> {
    let user_id = Uuid::new_v4().hyphenated().to_string();

    let user = sqlx::query_as::<_, User>(
        r#"
            INSERT INTO users (id, wallet_address, angel_balance, total_earned, referred_by)
            VALUES ($1, $2, $3, $3, $4)
            RETURNING *
        "#,
    )
    .bind(&user_id)
    .bind(new_user.wallet.as_str())
    .bind(new_user.starting_balance)
    .bind(&new_user.referred_by)
    .fetch_one(&mut *conn)
    .await?;

    Ok(user)
}

pub async fn get_user_by_wallet(
    conn: &mut PgConnection,
    wallet: &WalletAddress,
) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE wallet_address = $1")
        .bind(wallet.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(user)
}

pub async fn get_user_by_id(
    conn: &mut PgConnection,
    user_id: &str,
) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(user)
}

pub async fn increment_balance(
    conn: &mut PgConnection,
    user_id: &str,
    amount: i64,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
            UPDATE users
            SET angel_balance = angel_balance + $1,
                total_earned = total_earned + $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Missing(format!("user {}", user_id)));
    }

    Ok(())
}

pub async fn increment_invites_count(
    conn: &mut PgConnection,
    user_id: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE users SET invites_count = invites_count + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Missing(format!("user {}", user_id)));
    }

    Ok(())
}

pub async fn set_active(
    conn: &mut PgConnection,
    user_id: &str,
    active: bool,
) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET is_active = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(active)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

pub async fn reset_total_earned(
    conn: &mut PgConnection,
    user_id: &str,
    total: i64,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE users SET total_earned = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(total)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Missing(format!("user {}", user_id)));
    }

    Ok(())
}

pub async fn count_users(conn: &mut PgConnection) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users")
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

pub async fn ledger_mismatches(conn: &mut PgConnection) -> Result<Vec<LedgerMismatch>, StoreError> {
    let mismatches = sqlx::query_as::<_, LedgerMismatch>(
        r#"
            SELECT u.id AS user_id,
                   u.wallet_address,
                   u.total_earned,
                   COALESCE(SUM(r.amount), 0)::BIGINT AS ledger_total
            FROM users u
            LEFT JOIN reward_records r ON r.user_id = u.id
            GROUP BY u.id, u.wallet_address, u.total_earned
            HAVING u.total_earned <> COALESCE(SUM(r.amount), 0)
            ORDER BY u.created_at
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(mismatches)
}
