//! Users root and per-user namespaces.

use super::raw::Bucket;
use crate::error::{StoreError, StoreResult};
use crate::kv::{KvRead, KvWrite};
use bindery_common::{CatalogProgress, Role, User};

const NAME: &str = "username";
const PASS: &str = "password";
const ROLE: &str = "type";
const PROGRESS: &str = "progress";

pub struct UsersBucket<'a, K: ?Sized> {
    inner: Bucket<'a, K>,
}

impl<'a, K: KvRead + ?Sized> UsersBucket<'a, K> {
    pub fn new(kv: &'a mut K) -> Self {
        Self {
            inner: Bucket::root(kv),
        }
    }

    pub fn user_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.child_names()
    }

    pub fn has_user(&self, uid: &str) -> StoreResult<bool> {
        self.inner.has_child(uid)
    }

    pub fn user(&mut self, uid: &str) -> StoreResult<UserBucket<'_, K>> {
        match self.inner.child(uid)? {
            Some(inner) => Ok(UserBucket {
                inner,
                uid: uid.to_string(),
            }),
            None => Err(StoreError::UserNotFound(uid.to_string())),
        }
    }

    pub fn users(&mut self) -> StoreResult<Vec<User>> {
        let mut users = Vec::new();
        for uid in self.user_ids()? {
            users.push(self.user(&uid)?.to_user()?);
        }
        Ok(users)
    }

    pub fn admin_count(&mut self) -> StoreResult<usize> {
        let mut count = 0;
        for uid in self.user_ids()? {
            if self.user(&uid)?.role()? == Role::Admin {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl<K: KvWrite + ?Sized> UsersBucket<'_, K> {
    /// Write every field of a user, creating its namespace if needed
    pub fn put_user(&mut self, user: &User) -> StoreResult<()> {
        let mut bucket = UserBucket {
            inner: self.inner.create_child(&user.hash)?,
            uid: user.hash.clone(),
        };
        bucket.set_name(&user.name)?;
        bucket.set_pass_hash(&user.pass)?;
        bucket.set_role(user.role)?;
        bucket.set_progress(&user.progress)
    }

    pub fn delete_user(&mut self, uid: &str) -> StoreResult<()> {
        if !self.inner.delete_child(uid)? {
            return Err(StoreError::UserNotFound(uid.to_string()));
        }
        Ok(())
    }

    /// Move a user namespace to a new id
    pub fn move_user(&mut self, from: &str, to: &str) -> StoreResult<()> {
        if !self.has_user(from)? {
            return Err(StoreError::UserNotFound(from.to_string()));
        }
        if self.has_user(to)? {
            return Err(StoreError::UserExists(to.to_string()));
        }
        self.inner.copy_child(from, to)?;
        self.inner.delete_child(from)?;
        Ok(())
    }
}

pub struct UserBucket<'a, K: ?Sized> {
    inner: Bucket<'a, K>,
    uid: String,
}

impl<K: KvRead + ?Sized> UserBucket<'_, K> {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> StoreResult<String> {
        Ok(self.inner.get(NAME)?.unwrap_or_default())
    }

    pub fn pass_hash(&self) -> StoreResult<String> {
        Ok(self.inner.get(PASS)?.unwrap_or_default())
    }

    pub fn role(&self) -> StoreResult<Role> {
        Ok(self.inner.get(ROLE)?.unwrap_or_default())
    }

    pub fn progress(&self) -> StoreResult<CatalogProgress> {
        Ok(self.inner.get(PROGRESS)?.unwrap_or_default())
    }

    pub fn to_user(&self) -> StoreResult<User> {
        Ok(User {
            hash: self.uid.clone(),
            name: self.name()?,
            pass: self.pass_hash()?,
            role: self.role()?,
            progress: self.progress()?,
        })
    }
}

impl<K: KvWrite + ?Sized> UserBucket<'_, K> {
    pub fn set_name(&mut self, name: &str) -> StoreResult<()> {
        self.inner.put(NAME, name)
    }

    /// Store an already hashed password
    pub fn set_pass_hash(&mut self, hash: &str) -> StoreResult<()> {
        self.inner.put(PASS, hash)
    }

    pub fn set_role(&mut self, role: Role) -> StoreResult<()> {
        self.inner.put(ROLE, &role)
    }

    pub fn set_progress(&mut self, progress: &CatalogProgress) -> StoreResult<()> {
        self.inner.put(PROGRESS, progress)
    }
}
