use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::user_repository::UserRepository,
    models::{
        company::Student,
        user::{NewUser, User, UserProfileUpdate, UserRole},
    },
};

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, country, \
                            role, company_id, is_verified, created_at";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users
                (email, password_hash, first_name, last_name, phone, country, role,
                 company_id, is_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.phone)
            .bind(&new_user.country)
            .bind(new_user.role)
            .bind(new_user.company_id)
            .bind(new_user.is_verified)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_user_company(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET company_id = $2 WHERE id = $1 AND company_id IS NULL",
        )
        .bind(user_id)
        .bind(company_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_company_employees(&self, company_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM users WHERE company_id = $1 AND role = $2 ORDER BY created_at, email",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(company_id)
            .bind(UserRole::Employee)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_company_employee(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        update: &UserProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE users
               SET first_name = COALESCE($3, first_name),
                   last_name = COALESCE($4, last_name),
                   phone = COALESCE($5, phone)
             WHERE id = $1 AND company_id = $2 AND role = $6
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(company_id)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.phone)
            .bind(UserRole::Employee)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_company_employee(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM users WHERE id = $1 AND company_id = $2 AND role = $3")
                .bind(user_id)
                .bind(company_id)
                .bind(UserRole::Employee)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ensure_student(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        plan: Option<&str>,
    ) -> Result<Student, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (user_id, company_id, plan)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
               SET company_id = COALESCE(EXCLUDED.company_id, students.company_id),
                   plan = COALESCE(EXCLUDED.plan, students.plan)
            RETURNING id, user_id, company_id, plan, created_at
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .bind(plan)
        .fetch_one(&self.pool)
        .await
    }

    async fn insert_password_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO password_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_password_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE password_tokens
               SET used_at = $2
             WHERE token_hash = $1
               AND used_at IS NULL
               AND expires_at > $2
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }
}
