// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message and owner lookups.
//!
//! These tables belong to the account and content layer; the engine only
//! reads them. The upserts exist for seeding and tests.

use lastword_core::{LastwordError, MessageRecord, Owner};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

pub async fn get_message(db: &Database, id: &str) -> Result<Option<MessageRecord>, LastwordError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, user_id, title, body FROM messages WHERE id = ?1",
                params![id],
                |row| {
                    Ok(MessageRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        title: row.get(2)?,
                        body: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(message) => Ok(Some(message)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_message(db: &Database, message: &MessageRecord) -> Result<(), LastwordError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, user_id, title, body) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (id) DO UPDATE SET
                    user_id = excluded.user_id, title = excluded.title, body = excluded.body",
                params![message.id, message.user_id, message.title, message.body],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_owner(db: &Database, user_id: &str) -> Result<Option<Owner>, LastwordError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, name, email, phone FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(Owner {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        phone: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(owner) => Ok(Some(owner)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_owner(db: &Database, owner: &Owner) -> Result<(), LastwordError> {
    let owner = owner.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, phone) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name, email = excluded.email, phone = excluded.phone",
                params![owner.user_id, owner.name, owner.email, owner.phone],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn upsert_then_read_back() {
        let (db, _dir) = setup_db().await;
        let owner = Owner {
            user_id: "owner-1".into(),
            name: "Olu".into(),
            email: Some("olu@example.com".into()),
            phone: None,
        };
        upsert_owner(&db, &owner).await.unwrap();
        let updated = Owner {
            phone: Some("+15550002222".into()),
            ..owner
        };
        upsert_owner(&db, &updated).await.unwrap();
        assert_eq!(get_owner(&db, "owner-1").await.unwrap(), Some(updated));
        assert_eq!(get_owner(&db, "nobody").await.unwrap(), None);

        let message = MessageRecord {
            id: "m1".into(),
            user_id: "owner-1".into(),
            title: "For my sister".into(),
            body: "The key is under the mat.".into(),
        };
        upsert_message(&db, &message).await.unwrap();
        assert_eq!(get_message(&db, "m1").await.unwrap(), Some(message));

        db.close().await.unwrap();
    }
}
