use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::company_repository::CompanyRepository;
use crate::models::company::Company;

pub struct PostgresCompanyRepository {
    pub pool: PgPool,
}

#[async_trait]
impl CompanyRepository for PostgresCompanyRepository {
    async fn create_company(&self, name: &str, owner_id: Uuid) -> Result<Company, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name, owner_id)
            VALUES ($1, $2)
            RETURNING id, name, owner_id, 0::BIGINT AS employee_count, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            r#"
            SELECT c.id,
                   c.name,
                   c.owner_id,
                   (SELECT COUNT(*) FROM users u
                     WHERE u.company_id = c.id AND u.role = 'employee') AS employee_count,
                   c.created_at,
                   c.updated_at
            FROM companies c
            WHERE c.id = $1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn rename_company(
        &self,
        company_id: Uuid,
        name: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies c
               SET name = $2, updated_at = now()
             WHERE c.id = $1
            RETURNING c.id,
                      c.name,
                      c.owner_id,
                      (SELECT COUNT(*) FROM users u
                        WHERE u.company_id = c.id AND u.role = 'employee') AS employee_count,
                      c.created_at,
                      c.updated_at
            "#,
        )
        .bind(company_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_company(&self, company_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
