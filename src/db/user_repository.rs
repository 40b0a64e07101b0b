use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{
    company::Student,
    user::{NewUser, User, UserProfileUpdate},
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;
    /// Fails with a unique violation when the email is already registered.
    async fn create_user(&self, new_user: &NewUser) -> Result<User, sqlx::Error>;
    async fn delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error>;
    /// Only attaches when the user has no company yet; `false` otherwise.
    async fn set_user_company(&self, user_id: Uuid, company_id: Uuid)
        -> Result<bool, sqlx::Error>;
    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error>;

    async fn list_company_employees(&self, company_id: Uuid) -> Result<Vec<User>, sqlx::Error>;
    /// Only touches users with the employee role inside `company_id`.
    async fn update_company_employee(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        update: &UserProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error>;
    async fn delete_company_employee(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    async fn ensure_student(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        plan: Option<&str>,
    ) -> Result<Student, sqlx::Error>;

    async fn insert_password_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error>;
    /// Marks an unused, unexpired token as used and returns its owner.
    async fn consume_password_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, sqlx::Error>;
}
