use anyhow::Result;
use redb::{ReadableTable, TableDefinition};

use super::db::Txn;
use super::document::{check_id, StoreError};
use crate::models::User;

/// Lowercased email → user id. Backs case-insensitive email uniqueness.
pub(crate) const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Txn<'_> {
    fn email_owner(&self, email: &str) -> Result<Option<String>> {
        let table = self.inner.open_table(USER_EMAILS)?;
        let owner = table.get(email)?.map(|guard| guard.value().to_owned());
        Ok(owner)
    }

    fn claim_email(&self, email: &str, user_id: &str) -> Result<()> {
        if let Some(owner) = self.email_owner(email)? {
            if owner != user_id {
                return Err(StoreError::Duplicate {
                    field: "email".into(),
                }
                .into());
            }
        }
        let mut table = self.inner.open_table(USER_EMAILS)?;
        table.insert(email, user_id)?;
        Ok(())
    }

    fn release_email(&self, email: &str) -> Result<()> {
        let mut table = self.inner.open_table(USER_EMAILS)?;
        table.remove(email)?;
        Ok(())
    }
}

impl super::db::Store {
    /// Insert a new user. The email is normalized and claimed in the same
    /// transaction; a taken email fails with [`StoreError::Duplicate`].
    pub fn create_user(&self, user: &mut User) -> Result<()> {
        user.email = normalize_email(&user.email);
        self.write(|txn| {
            txn.claim_email(&user.email, &user.id)?;
            txn.put(&*user)
        })?;
        tracing::info!(user_id = %user.id, role = %user.role, "created user");
        Ok(())
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USER_EMAILS)?;
        let Some(id) = table.get(email.as_str())?.map(|guard| guard.value().to_owned()) else {
            return Ok(None);
        };
        drop(table);
        drop(read_txn);
        self.get::<User>(&id)
    }

    /// Atomic read-modify-write of a user that keeps the email index in step.
    pub fn update_user(
        &self,
        id: &str,
        f: impl FnOnce(&mut User) -> Result<()>,
    ) -> Result<Option<User>> {
        check_id(id)?;
        self.write(|txn| {
            let Some(mut user) = txn.get::<User>(id)? else {
                return Ok(None);
            };
            let previous = user.email.clone();
            f(&mut user)?;
            user.email = normalize_email(&user.email);
            if user.email != previous {
                txn.claim_email(&user.email, &user.id)?;
                txn.release_email(&previous)?;
            }
            txn.put(&user)?;
            Ok(Some(user))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::db::tests::make_store;
    use crate::store::new_id;
    use chrono::Utc;

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: new_id(),
            name: "Jo".into(),
            email: email.into(),
            password_hash: "h".into(),
            role: Role::User,
            is_verified: false,
            is_suspended: false,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn email_is_unique_ignoring_case() {
        let (store, _dir) = make_store();
        let mut jo = user("Jo@X.com");
        store.create_user(&mut jo).unwrap();
        assert_eq!(jo.email, "jo@x.com");

        let err = store.create_user(&mut user("JO@x.COM")).unwrap_err();
        assert!(StoreError::is_duplicate(&err));
        assert_eq!(store.count::<User>().unwrap(), 1);
    }

    #[test]
    fn lookup_by_email_is_case_insensitive() {
        let (store, _dir) = make_store();
        let mut jo = user("jo@x.com");
        store.create_user(&mut jo).unwrap();
        let found = store.find_user_by_email("  JO@x.com ").unwrap().unwrap();
        assert_eq!(found.id, jo.id);
        assert!(store.find_user_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn changing_email_moves_the_index() {
        let (store, _dir) = make_store();
        let mut a = user("a@x.com");
        let mut b = user("b@x.com");
        store.create_user(&mut a).unwrap();
        store.create_user(&mut b).unwrap();

        let err = store
            .update_user(&a.id, |u| {
                u.email = "B@x.com".into();
                Ok(())
            })
            .unwrap_err();
        assert!(StoreError::is_duplicate(&err));

        store
            .update_user(&a.id, |u| {
                u.email = "new@x.com".into();
                Ok(())
            })
            .unwrap()
            .unwrap();
        assert!(store.find_user_by_email("a@x.com").unwrap().is_none());
        assert_eq!(
            store.find_user_by_email("new@x.com").unwrap().unwrap().id,
            a.id
        );

        let mut c = user("a@x.com");
        store.create_user(&mut c).unwrap();
    }
}
