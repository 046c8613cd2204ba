use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use fitlog_types::PendingInvite;

use super::friend_repository::insert_friendship;
use super::user_repository::map_summary;
use crate::db::{format_timestamp, timestamp_col, uuid_col, DbPool};

const INVITE_SELECT: &str = "
    SELECT i.id, i.created_at,
           fu.id, fu.username, fu.display_name, fu.avatar_key,
           tu.id, tu.username, tu.display_name, tu.avatar_key
    FROM pending_invites i
    JOIN users fu ON fu.id = i.from_user_id
    JOIN users tu ON tu.id = i.to_user_id";

fn map_invite(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingInvite> {
    Ok(PendingInvite {
        id: uuid_col(row, 0)?,
        created_at: timestamp_col(row, 1)?,
        from_user: map_summary(row, 2)?,
        to_user: map_summary(row, 6)?,
    })
}

/// Friend requests that have been sent but not yet answered
pub struct InviteRepository {
    pool: DbPool,
}

impl InviteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an invite. Returns `None` if one from `from` to `to` already exists.
    pub fn create(&self, from: &Uuid, to: &Uuid) -> Result<Option<PendingInvite>> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        let inserted = conn
            .execute(
                "INSERT INTO pending_invites (id, from_user_id, to_user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(from_user_id, to_user_id) DO NOTHING",
                (
                    id.to_string(),
                    from.to_string(),
                    to.to_string(),
                    format_timestamp(Utc::now()),
                ),
            )
            .context("Failed to create invite")?;
        if inserted == 0 {
            return Ok(None);
        }

        let invite = conn
            .query_row(
                &format!("{} WHERE i.id = ?1", INVITE_SELECT),
                [id.to_string()],
                map_invite,
            )
            .optional()?;
        Ok(invite)
    }

    pub fn get(&self, invite_id: &Uuid) -> Result<Option<PendingInvite>> {
        let conn = self.pool.get()?;
        let invite = conn
            .query_row(
                &format!("{} WHERE i.id = ?1", INVITE_SELECT),
                [invite_id.to_string()],
                map_invite,
            )
            .optional()?;
        Ok(invite)
    }

    /// The invite sent from `from` to `to`, if any
    pub fn find_between(&self, from: &Uuid, to: &Uuid) -> Result<Option<PendingInvite>> {
        let conn = self.pool.get()?;
        let invite = conn
            .query_row(
                &format!("{} WHERE i.from_user_id = ?1 AND i.to_user_id = ?2", INVITE_SELECT),
                (from.to_string(), to.to_string()),
                map_invite,
            )
            .optional()?;
        Ok(invite)
    }

    /// Invites addressed to the user, newest first
    pub fn incoming(&self, user_id: &Uuid) -> Result<Vec<PendingInvite>> {
        self.list_where("i.to_user_id = ?1", user_id)
    }

    /// Invites the user has sent, newest first
    pub fn outgoing(&self, user_id: &Uuid) -> Result<Vec<PendingInvite>> {
        self.list_where("i.from_user_id = ?1", user_id)
    }

    fn list_where(&self, condition: &str, user_id: &Uuid) -> Result<Vec<PendingInvite>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE {} ORDER BY i.created_at DESC",
            INVITE_SELECT, condition
        ))?;
        let invites = stmt
            .query_map([user_id.to_string()], map_invite)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(invites)
    }

    /// Turn an invite into a friendship: both friendship rows are written and
    /// the invite (plus any reverse invite) removed in one transaction.
    pub fn accept(&self, invite: &PendingInvite) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        insert_friendship(&tx, &invite.from_user.id, &invite.to_user.id)?;
        tx.execute(
            "DELETE FROM pending_invites
             WHERE (from_user_id = ?1 AND to_user_id = ?2) OR (from_user_id = ?2 AND to_user_id = ?1)",
            (invite.from_user.id.to_string(), invite.to_user.id.to_string()),
        )
        .context("Failed to remove accepted invite")?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete(&self, invite_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let deleted = conn
            .execute("DELETE FROM pending_invites WHERE id = ?1", [invite_id.to_string()])
            .context("Failed to delete invite")?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{create_user, setup_db};
    use crate::db::repositories::FriendRepository;

    #[test]
    fn test_create_is_unique_per_direction() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let repo = InviteRepository::new(db.pool.clone());

        let invite = repo.create(&alice, &bob).unwrap().unwrap();
        assert_eq!(invite.from_user.username, "alice");
        assert_eq!(invite.to_user.username, "bob");
        assert!(repo.create(&alice, &bob).unwrap().is_none());

        assert_eq!(repo.incoming(&bob).unwrap().len(), 1);
        assert_eq!(repo.outgoing(&alice).unwrap().len(), 1);
        assert!(repo.incoming(&alice).unwrap().is_empty());
    }

    #[test]
    fn test_accept_creates_friendship_and_clears_invites() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let repo = InviteRepository::new(db.pool.clone());
        let friends = FriendRepository::new(db.pool.clone());

        let invite = repo.create(&alice, &bob).unwrap().unwrap();
        repo.create(&bob, &alice).unwrap().unwrap();
        repo.accept(&invite).unwrap();

        assert!(friends.are_friends(&alice, &bob).unwrap());
        assert!(friends.are_friends(&bob, &alice).unwrap());
        assert!(repo.find_between(&alice, &bob).unwrap().is_none());
        assert!(repo.find_between(&bob, &alice).unwrap().is_none());
    }

    #[test]
    fn test_self_invite_rejected() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let repo = InviteRepository::new(db.pool.clone());
        assert!(repo.create(&alice, &alice).is_err());
    }

    #[test]
    fn test_delete_invite() {
        let db = setup_db();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let repo = InviteRepository::new(db.pool.clone());

        let invite = repo.create(&alice, &bob).unwrap().unwrap();
        assert!(repo.get(&invite.id).unwrap().is_some());
        assert!(repo.delete(&invite.id).unwrap());
        assert!(repo.get(&invite.id).unwrap().is_none());
        assert!(!repo.delete(&invite.id).unwrap());
    }
}
