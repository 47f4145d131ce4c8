//! Adapter over the identity and membership collaborator.
use bson::oid::ObjectId;
use tracing::{info, warn};

use crate::error::{Result, SplitError};
use crate::schemas::{Email, Group, PublicUser, User};
use crate::store::{DirectoryStore, SharedStore};

#[derive(Clone)]
pub struct Directory {
    store: SharedStore,
}

/// Drops blanks and repeated entries, keeping first-seen order.
pub(crate) fn dedup_emails(emails: Vec<Email>) -> Vec<Email> {
    let mut unique: Vec<Email> = Vec::with_capacity(emails.len());
    for email in emails {
        let email = email.trim().to_string();
        if !email.is_empty() && !unique.contains(&email) {
            unique.push(email);
        }
    }
    unique
}

impl Directory {
    pub fn new(store: SharedStore) -> Self {
        Directory { store }
    }

    pub async fn create_user(&self, name: &str, email: &str) -> Result<PublicUser> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() {
            return Err(SplitError::InvalidInput(
                "name and email are required".to_string(),
            ));
        }
        let user = User::new(name, email);
        self.store.insert_user(&user).await?;
        info!(email, "User created");
        Ok(user.public())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.store.find_user(email).await
    }

    pub async fn require_user(&self, email: &str) -> Result<User> {
        self.store
            .find_user(email)
            .await?
            .ok_or_else(|| SplitError::UserNotFound(email.to_string()))
    }

    pub async fn list_users(&self) -> Result<Vec<PublicUser>> {
        let users = self.store.list_users().await?;
        Ok(users.iter().map(User::public).collect())
    }

    /// Links two users as friends in both directions. A user is never found
    /// as their own friend.
    pub async fn add_friend_link(&self, email: &str, friend_email: &str) -> Result<()> {
        if email == friend_email {
            return Err(SplitError::UserNotFound(friend_email.to_string()));
        }
        let user = self.require_user(email).await?;
        self.require_user(friend_email).await?;
        if user.friends.iter().any(|f| f == friend_email) {
            return Err(SplitError::AlreadyFriends(
                email.to_string(),
                friend_email.to_string(),
            ));
        }

        self.store.add_friend(email, friend_email).await?;
        self.store.add_friend(friend_email, email).await?;
        info!(email, friend_email, "Friend link added");
        Ok(())
    }

    /// Creates a group. The creator is always a member, even when left out of
    /// `members`.
    pub async fn create_group(
        &self,
        creator_email: &str,
        name: &str,
        members: Vec<Email>,
    ) -> Result<Group> {
        let name = name.trim();
        let mut members = dedup_emails(members);
        if name.is_empty() || members.is_empty() {
            return Err(SplitError::InvalidInput(
                "a group needs a name and at least one member".to_string(),
            ));
        }
        self.require_user(creator_email).await?;
        for member in &members {
            self.require_user(member).await?;
        }
        if !members.iter().any(|m| m == creator_email) {
            members.insert(0, creator_email.to_string());
        }

        let group = Group {
            id: ObjectId::new().to_hex(),
            name: name.to_string(),
            created_by: creator_email.to_string(),
            members,
        };
        self.store.insert_group(&group).await?;
        for member in &group.members {
            if let Err(err) = self.store.add_group_ref(member, &group.id).await {
                warn!(member = %member, group_id = %group.id, error = %err, "Failed to register group reference");
            }
        }
        info!(group_id = %group.id, members = group.members.len(), "Group created");
        Ok(group)
    }

    pub async fn groups_containing(&self, email: &str) -> Result<Vec<Group>> {
        self.store.groups_containing(&[email]).await
    }

    pub async fn groups_for_user(&self, email: &str) -> Result<Vec<Group>> {
        self.require_user(email).await?;
        self.groups_containing(email).await
    }

    pub async fn common_groups(&self, email: &str, other: &str) -> Result<Vec<Group>> {
        self.store.groups_containing(&[email, other]).await
    }

    pub async fn require_group(&self, id: &str) -> Result<Group> {
        self.store
            .find_group(id)
            .await?
            .ok_or_else(|| SplitError::GroupNotFound(id.to_string()))
    }

    pub(crate) async fn register_expense(&self, email: &str, expense_id: &str) -> Result<()> {
        self.store.add_expense_ref(email, expense_id).await
    }

    pub(crate) async fn replace_expense_refs(&self, email: &str, ids: &[String]) -> Result<()> {
        self.store.set_expense_refs(email, ids).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryStore;

    async fn directory_with(users: &[(&str, &str)]) -> Directory {
        let directory = Directory::new(Arc::new(MemoryStore::new()));
        for (name, email) in users {
            directory.create_user(name, email).await.unwrap();
        }
        directory
    }

    #[actix_web::test]
    async fn duplicate_signup_is_a_conflict() {
        let directory = directory_with(&[("Ann", "ann@x.io")]).await;
        let err = directory.create_user("Ann again", "ann@x.io").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[actix_web::test]
    async fn signup_requires_name_and_email() {
        let directory = directory_with(&[]).await;
        let err = directory.create_user(" ", "ann@x.io").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[actix_web::test]
    async fn friend_links_are_symmetric_and_unique() {
        let directory = directory_with(&[("Ann", "ann@x.io"), ("Bob", "bob@x.io")]).await;
        directory.add_friend_link("ann@x.io", "bob@x.io").await.unwrap();

        let bob = directory.require_user("bob@x.io").await.unwrap();
        assert_eq!(bob.friends, vec!["ann@x.io".to_string()]);

        let err = directory
            .add_friend_link("bob@x.io", "ann@x.io")
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::AlreadyFriends(..)));
    }

    #[actix_web::test]
    async fn befriending_unknown_user_fails() {
        let directory = directory_with(&[("Ann", "ann@x.io")]).await;
        let err = directory
            .add_friend_link("ann@x.io", "ghost@x.io")
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::UserNotFound(email) if email == "ghost@x.io"));

        let err = directory
            .add_friend_link("ann@x.io", "ann@x.io")
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::UserNotFound(email) if email == "ann@x.io"));
        assert!(directory.require_user("ann@x.io").await.unwrap().friends.is_empty());
    }

    #[actix_web::test]
    async fn group_includes_creator_and_back_references() {
        let directory = directory_with(&[
            ("Ann", "ann@x.io"),
            ("Bob", "bob@x.io"),
            ("Cid", "cid@x.io"),
        ])
        .await;
        let group = directory
            .create_group(
                "ann@x.io",
                "Trip",
                vec!["bob@x.io".into(), "cid@x.io".into(), "bob@x.io".into()],
            )
            .await
            .unwrap();

        assert_eq!(group.members, vec!["ann@x.io", "bob@x.io", "cid@x.io"]);
        let cid = directory.require_user("cid@x.io").await.unwrap();
        assert_eq!(cid.groups, vec![group.id.clone()]);

        let shared = directory.common_groups("ann@x.io", "cid@x.io").await.unwrap();
        assert_eq!(shared.len(), 1);
    }

    #[actix_web::test]
    async fn group_with_unknown_member_is_rejected() {
        let directory = directory_with(&[("Ann", "ann@x.io")]).await;
        let err = directory
            .create_group("ann@x.io", "Trip", vec!["ghost@x.io".into()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(directory.groups_containing("ann@x.io").await.unwrap().is_empty());
    }
}
