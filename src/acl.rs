//! Access-control lookups.
//!
//! The rest of the service only asks one question: which of these objects may
//! this user see for a given permission? [`AccessControl`] answers it, keeping
//! the candidates in the order they were passed in.

use std::collections::HashSet;
use std::fmt;

use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    db::PgPool,
    error::{AppError, AppResult},
    schema::acl_grants,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    namespace: &'static str,
    name: &'static str,
}

impl Permission {
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self { namespace, name }
    }

    pub fn stored_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

pub const PERMISSION_TAG_VIEW: Permission = Permission::new("tags", "tag_view");

pub trait AccessControl: Send + Sync + 'static {
    /// Returns the subset of `candidates` that `user` holds `permission` for.
    fn filter_by_access(
        &self,
        permission: &Permission,
        user: &AuthenticatedUser,
        candidates: &[Uuid],
    ) -> AppResult<Vec<Uuid>>;
}

/// Grants stored in `acl_grants`; admins bypass the table entirely.
pub struct DatabaseAccessControl {
    pool: PgPool,
}

impl DatabaseAccessControl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AccessControl for DatabaseAccessControl {
    fn filter_by_access(
        &self,
        permission: &Permission,
        user: &AuthenticatedUser,
        candidates: &[Uuid],
    ) -> AppResult<Vec<Uuid>> {
        if candidates.is_empty() || user.is_admin() {
            return Ok(candidates.to_vec());
        }

        let mut conn = self
            .pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))?;

        let granted: Vec<Option<Uuid>> = acl_grants::table
            .filter(acl_grants::user_id.eq(user.user_id))
            .filter(acl_grants::permission.eq(permission.stored_name()))
            .select(acl_grants::object_id)
            .load(&mut conn)?;

        Ok(retain_granted(candidates, &granted))
    }
}

/// A `None` grant covers every object.
fn retain_granted(candidates: &[Uuid], granted: &[Option<Uuid>]) -> Vec<Uuid> {
    if granted.iter().any(Option::is_none) {
        return candidates.to_vec();
    }
    let allowed: HashSet<Uuid> = granted.iter().flatten().copied().collect();
    candidates
        .iter()
        .filter(|id| allowed.contains(id))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_names_are_namespaced() {
        assert_eq!(PERMISSION_TAG_VIEW.stored_name(), "tags.tag_view");
        assert_eq!(PERMISSION_TAG_VIEW.to_string(), "tags.tag_view");
    }

    #[test]
    fn retains_candidate_order() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let granted = vec![Some(ids[3]), Some(ids[1])];
        assert_eq!(retain_granted(&ids, &granted), vec![ids[1], ids[3]]);
    }

    #[test]
    fn global_grant_allows_everything() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        assert_eq!(retain_granted(&ids, &[Some(ids[0]), None]), ids);
    }

    #[test]
    fn no_grants_hides_everything() {
        let ids = vec![Uuid::new_v4()];
        assert!(retain_granted(&ids, &[]).is_empty());
    }
}
