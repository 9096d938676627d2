use sqlx::PgConnection;
use uuid::Uuid;

use super::StoreError;
use crate::models::invitations::{Invitation, NewInvitation};

#[derive(sqlx::FromRow)]
struct InvitationRow {
    id: String,
    inviter_id: String,
    invitee_id: String,
    level: i16,
    reward_amount: i64,
    status: String,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = StoreError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(StoreError::Corrupt)?;

        Ok(Invitation {
            id: row.id,
            inviter_id: row.inviter_id,
            invitee_id: row.invitee_id,
            level: row.level,
            reward_amount: row.reward_amount,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_invitation(
    conn: &mut PgConnection,
    invitation: &NewInvitation,
) -> Result<Option<Invitation>, StoreError> {
    let invitation_id = Uuid::new_v4().hyphenated().to_string();

    let row = sqlx::query_as::<_, InvitationRow>(
        r#"
            INSERT INTO invitations (id, inviter_id, invitee_id, level, reward_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (inviter_id, invitee_id) DO NOTHING
            RETURNING *
        "#,
    )
    .bind(&invitation_id)
    .bind(&invitation.inviter_id)
    .bind(&invitation.invitee_id)
    .bind(invitation.level)
    .bind(invitation.reward_amount)
    .bind(invitation.status.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Invitation::try_from).transpose()
}

pub async fn list_for_inviter(
    conn: &mut PgConnection,
    inviter_id: &str,
) -> Result<Vec<Invitation>, StoreError> {
    let rows = sqlx::query_as::<_, InvitationRow>(
        "SELECT * FROM invitations WHERE inviter_id = $1 ORDER BY created_at, id",
    )
    .bind(inviter_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Invitation::try_from).collect()
}

pub async fn count_invitations(conn: &mut PgConnection) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM invitations")
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}
