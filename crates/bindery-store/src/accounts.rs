//! User administration.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use bindery_common::{CatalogProgress, Role, User, hash_id, hash_password};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::info;

const GENERATED_PASSWORD_LEN: usize = 16;

impl Store {
    pub fn create_user(&self, name: &str, pass: &str, role: Role) -> StoreResult<User> {
        let user = User::new(name, pass, role);
        self.save_user(&user, false)?;
        Ok(user)
    }

    /// Write a user. An existing user with the same id is only replaced when
    /// `overwrite` is set.
    pub fn save_user(&self, user: &User, overwrite: bool) -> StoreResult<()> {
        self.update(|t| {
            let mut users = t.users();
            if !overwrite && users.has_user(&user.hash)? {
                return Err(StoreError::UserExists(user.name.clone()));
            }
            users.put_user(user)
        })?;
        info!(uid = %user.hash, name = %user.name, role = %user.role, "saved user");
        Ok(())
    }

    pub fn delete_user(&self, uid: &str) -> StoreResult<()> {
        self.update(|t| t.users().delete_user(uid))?;
        info!(uid, "deleted user");
        Ok(())
    }

    /// Rename a user. The id follows the name, so the namespace moves.
    /// Returns the new id.
    pub fn rename_user(&self, uid: &str, name: &str) -> StoreResult<String> {
        let new_uid = hash_id(name);
        self.update(|t| {
            let mut users = t.users();
            users.move_user(uid, &new_uid)?;
            users.user(&new_uid)?.set_name(name)
        })?;
        info!(from = uid, to = %new_uid, name, "renamed user");
        Ok(new_uid)
    }

    pub fn user(&self, uid: &str) -> StoreResult<User> {
        self.view(|t| t.users().user(uid)?.to_user())
    }

    /// Every user. With `safe`, password hashes are blanked.
    pub fn users(&self, safe: bool) -> StoreResult<Vec<User>> {
        let mut users = self.view(|t| t.users().users())?;
        if safe {
            for user in &mut users {
                user.pass.clear();
            }
        }
        Ok(users)
    }

    pub fn has_user(&self, uid: &str) -> StoreResult<bool> {
        self.view(|t| t.users().has_user(uid))
    }

    pub fn has_users(&self) -> StoreResult<bool> {
        self.view(|t| Ok(!t.users().user_ids()?.is_empty()))
    }

    pub fn admin_count(&self) -> StoreResult<usize> {
        self.view(|t| t.users().admin_count())
    }

    pub fn is_admin(&self, uid: &str) -> StoreResult<bool> {
        self.view(|t| Ok(t.users().user(uid)?.role()? == Role::Admin))
    }

    /// Whether `name` exists and `pass` matches its stored hash
    pub fn validate_login(&self, name: &str, pass: &str) -> StoreResult<bool> {
        let uid = hash_id(name);
        self.view(|t| {
            let mut users = t.users();
            if !users.has_user(&uid)? {
                return Ok(false);
            }
            Ok(users.user(&uid)?.pass_hash()? == hash_password(pass))
        })
    }

    pub fn change_password(&self, uid: &str, pass: &str) -> StoreResult<()> {
        self.update(|t| t.users().user(uid)?.set_pass_hash(&hash_password(pass)))?;
        info!(uid, "changed password");
        Ok(())
    }

    /// Change a user's role. Demoting the last administrator is rejected.
    pub fn change_user_type(&self, uid: &str, role: Role) -> StoreResult<()> {
        self.update(|t| {
            let mut users = t.users();
            let admins = users.admin_count()?;
            let mut user = users.user(uid)?;
            let demoting = user.role()? == Role::Admin && role != Role::Admin;
            if demoting && admins <= 1 {
                return Err(StoreError::NotEnoughAdmins);
            }
            user.set_role(role)
        })?;
        info!(uid, %role, "changed user type");
        Ok(())
    }

    pub fn change_progress(&self, uid: &str, progress: &CatalogProgress) -> StoreResult<()> {
        self.update(|t| t.users().user(uid)?.set_progress(progress))
    }

    /// Create an administrator named `name` with a random password when no
    /// users exist. Returns the generated credentials.
    pub fn ensure_default_user(&self, name: &str) -> StoreResult<Option<(String, String)>> {
        if self.has_users()? {
            return Ok(None);
        }
        let pass: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_PASSWORD_LEN)
            .map(char::from)
            .collect();
        self.create_user(name, &pass, Role::Admin)?;
        info!(name, "created default administrator");
        Ok(Some((name.to_string(), pass)))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::store::testutil::*;
    use bindery_common::{CatalogProgress, Role, SeriesProgress, hash_id};

    #[test]
    fn test_create_and_validate() {
        let fx = fixture();
        let user = fx.store.create_user("alice", "hunter2", Role::Standard).unwrap();
        assert_eq!(user.hash, hash_id("alice"));

        assert!(fx.store.validate_login("alice", "hunter2").unwrap());
        assert!(!fx.store.validate_login("alice", "wrong").unwrap());
        assert!(!fx.store.validate_login("bob", "hunter2").unwrap());
        assert_eq!(fx.store.user(&user.hash).unwrap(), user);
    }

    #[test]
    fn test_duplicate_user_needs_overwrite() {
        let fx = fixture();
        let user = fx.store.create_user("alice", "one", Role::Standard).unwrap();

        let err = fx.store.create_user("alice", "two", Role::Admin).unwrap_err();
        assert!(matches!(err, StoreError::UserExists(_)));
        assert!(fx.store.validate_login("alice", "one").unwrap());

        let mut replaced = user.clone();
        replaced.role = Role::Admin;
        fx.store.save_user(&replaced, true).unwrap();
        assert!(fx.store.is_admin(&user.hash).unwrap());
    }

    #[test]
    fn test_last_admin_cannot_be_demoted() {
        let fx = fixture();
        let root = fx.store.create_user("root", "pw", Role::Admin).unwrap();

        let err = fx.store.change_user_type(&root.hash, Role::Standard).unwrap_err();
        assert!(matches!(err, StoreError::NotEnoughAdmins));
        assert!(err.is_precondition());
        assert!(fx.store.is_admin(&root.hash).unwrap());

        fx.store.create_user("ops", "pw", Role::Admin).unwrap();
        fx.store.change_user_type(&root.hash, Role::Standard).unwrap();
        assert!(!fx.store.is_admin(&root.hash).unwrap());
        assert_eq!(fx.store.admin_count().unwrap(), 1);
    }

    #[test]
    fn test_rename_moves_user() {
        let fx = fixture();
        let alice = fx.store.create_user("alice", "pw", Role::Standard).unwrap();
        fx.store.create_user("bob", "pw", Role::Standard).unwrap();
        let mut progress = CatalogProgress::default();
        progress.set("sid", SeriesProgress::default());
        fx.store.change_progress(&alice.hash, &progress).unwrap();

        let err = fx.store.rename_user(&alice.hash, "bob").unwrap_err();
        assert!(matches!(err, StoreError::UserExists(_)));

        let uid = fx.store.rename_user(&alice.hash, "alicia").unwrap();
        assert!(!fx.store.has_user(&alice.hash).unwrap());
        let renamed = fx.store.user(&uid).unwrap();
        assert_eq!(renamed.name, "alicia");
        assert_eq!(renamed.progress, progress);
        assert!(fx.store.validate_login("alicia", "pw").unwrap());

        let err = fx.store.rename_user(&alice.hash, "carol").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_safe_listing_hides_passwords() {
        let fx = fixture();
        fx.store.create_user("alice", "pw", Role::Standard).unwrap();
        let users = fx.store.users(true).unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].pass.is_empty());
        assert!(!fx.store.users(false).unwrap()[0].pass.is_empty());
    }

    #[test]
    fn test_default_user_created_once() {
        let fx = fixture();
        let (name, pass) = fx.store.ensure_default_user("default").unwrap().unwrap();
        assert_eq!(name, "default");
        assert_eq!(pass.len(), 16);
        assert!(fx.store.validate_login("default", &pass).unwrap());
        assert!(fx.store.is_admin(&hash_id("default")).unwrap());

        assert!(fx.store.ensure_default_user("default").unwrap().is_none());
    }

    #[test]
    fn test_delete_user() {
        let fx = fixture();
        let user = fx.store.create_user("alice", "pw", Role::Standard).unwrap();
        fx.store.delete_user(&user.hash).unwrap();
        assert!(!fx.store.has_users().unwrap());
        assert!(fx.store.delete_user(&user.hash).unwrap_err().is_not_found());
    }
}
