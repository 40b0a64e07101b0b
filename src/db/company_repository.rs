use async_trait::async_trait;
use uuid::Uuid;

use crate::models::company::Company;

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn create_company(&self, name: &str, owner_id: Uuid) -> Result<Company, sqlx::Error>;
    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, sqlx::Error>;
    async fn rename_company(
        &self,
        company_id: Uuid,
        name: &str,
    ) -> Result<Option<Company>, sqlx::Error>;
    async fn delete_company(&self, company_id: Uuid) -> Result<(), sqlx::Error>;
}
