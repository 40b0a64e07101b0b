use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{
    company_repository::CompanyRepository, payment_repository::PaymentRepository,
    stripe_event_log_repository::{EventClaim, StripeEventLogRepository, STALE_CLAIM_SECONDS},
    user_repository::UserRepository,
};
use crate::models::{
    company::{Company, Student},
    payment::{NewPayment, Payment},
    user::{NewUser, User, UserProfileUpdate, UserRole},
};

#[derive(Debug, Clone)]
pub struct MockStripeEvent {
    pub event_id: String,
    pub event_type: String,
    pub claimed_at: OffsetDateTime,
    pub processed: bool,
}

#[derive(Debug, Clone)]
pub struct MockPasswordToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
    pub used_at: Option<OffsetDateTime>,
}

/// In-memory stand-in for every repository, enforcing the same unique
/// constraints as the real schema.
#[derive(Default)]
pub struct MockDb {
    pub users: Mutex<Vec<User>>,
    pub companies: Mutex<Vec<Company>>,
    pub students: Mutex<Vec<Student>>,
    pub payments: Mutex<Vec<Payment>>,
    pub password_tokens: Mutex<Vec<MockPasswordToken>>,
    pub stripe_events: Mutex<Vec<MockStripeEvent>>,
    pub deleted_users: Mutex<Vec<Uuid>>,
    pub should_fail: bool,
    pub fail_create_company: bool,
    pub fail_ensure_student: bool,
    pub fail_insert_payment: bool,
}

#[derive(Debug)]
struct MockUniqueViolation(&'static str);

impl fmt::Display for MockUniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.0)
    }
}

impl StdError for MockUniqueViolation {}

impl sqlx::error::DatabaseError for MockUniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.0)
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }
}

fn mock_failure() -> sqlx::Error {
    sqlx::Error::Protocol("Mock DB failure".into())
}

fn unique_violation(constraint: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(MockUniqueViolation(constraint)))
}

/// A verified user row ready to be pushed into `MockDb::users`.
pub fn sample_user(email: &str, role: UserRole, company_id: Option<Uuid>) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: String::new(),
        first_name: "Test".into(),
        last_name: "User".into(),
        phone: None,
        country: None,
        role,
        company_id,
        is_verified: true,
        created_at: OffsetDateTime::now_utc(),
    }
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) -> User {
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn insert_company(&self, name: &str, owner_id: Uuid) -> Company {
        let now = OffsetDateTime::now_utc();
        let company = Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            employee_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.companies.lock().unwrap().push(company.clone());
        company
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    fn with_employee_count(&self, mut company: Company) -> Company {
        company.employee_count = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.company_id == Some(company.id) && u.role == UserRole::Employee)
            .count() as i64;
        company
    }

    fn remove_user_cascade(&self, user_id: Uuid) {
        self.users.lock().unwrap().retain(|u| u.id != user_id);
        self.students.lock().unwrap().retain(|s| s.user_id != user_id);
        self.payments.lock().unwrap().retain(|p| p.user_id != user_id);
        self.password_tokens
            .lock()
            .unwrap()
            .retain(|t| t.user_id != user_id);

        let owned: Vec<Uuid> = {
            let mut companies = self.companies.lock().unwrap();
            let owned = companies
                .iter()
                .filter(|c| c.owner_id == user_id)
                .map(|c| c.id)
                .collect::<Vec<_>>();
            companies.retain(|c| c.owner_id != user_id);
            owned
        };
        if !owned.is_empty() {
            for user in self.users.lock().unwrap().iter_mut() {
                if user.company_id.is_some_and(|id| owned.contains(&id)) {
                    user.company_id = None;
                }
            }
        }
        self.deleted_users.lock().unwrap().push(user_id);
    }
}

#[async_trait]
impl UserRepository for MockDb {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self.user_by_email(email))
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(unique_violation("users_email_key"));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            phone: new_user.phone.clone(),
            country: new_user.country.clone(),
            role: new_user.role,
            company_id: new_user.company_id,
            is_verified: new_user.is_verified,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        self.remove_user_cascade(user_id);
        Ok(())
    }

    async fn set_user_company(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let mut users = self.users.lock().unwrap();
        match users
            .iter_mut()
            .find(|u| u.id == user_id && u.company_id.is_none())
        {
            Some(user) => {
                user.company_id = Some(company_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        if let Some(user) = self
            .users
            .lock()
            .unwrap()
            .iter_mut()
            .find(|u| u.id == user_id)
        {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn list_company_employees(&self, company_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.company_id == Some(company_id) && u.role == UserRole::Employee)
            .cloned()
            .collect())
    }

    async fn update_company_employee(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        update: &UserProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| {
            u.id == user_id && u.company_id == Some(company_id) && u.role == UserRole::Employee
        }) else {
            return Ok(None);
        };
        if let Some(first_name) = &update.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        Ok(Some(user.clone()))
    }

    async fn delete_company_employee(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let found = self.users.lock().unwrap().iter().any(|u| {
            u.id == user_id && u.company_id == Some(company_id) && u.role == UserRole::Employee
        });
        if found {
            self.remove_user_cascade(user_id);
        }
        Ok(found)
    }

    async fn ensure_student(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        plan: Option<&str>,
    ) -> Result<Student, sqlx::Error> {
        if self.should_fail || self.fail_ensure_student {
            return Err(mock_failure());
        }
        let mut students = self.students.lock().unwrap();
        if let Some(existing) = students.iter_mut().find(|s| s.user_id == user_id) {
            if company_id.is_some() {
                existing.company_id = company_id;
            }
            if let Some(plan) = plan {
                existing.plan = Some(plan.to_string());
            }
            return Ok(existing.clone());
        }
        let student = Student {
            id: Uuid::new_v4(),
            user_id,
            company_id,
            plan: plan.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        students.push(student.clone());
        Ok(student)
    }

    async fn insert_password_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        self.password_tokens
            .lock()
            .unwrap()
            .push(MockPasswordToken {
                user_id,
                token_hash: token_hash.to_string(),
                expires_at,
                used_at: None,
            });
        Ok(())
    }

    async fn consume_password_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let mut tokens = self.password_tokens.lock().unwrap();
        let token = tokens.iter_mut().find(|t| {
            t.token_hash == token_hash && t.used_at.is_none() && t.expires_at > now
        });
        Ok(token.map(|t| {
            t.used_at = Some(now);
            t.user_id
        }))
    }
}

#[async_trait]
impl CompanyRepository for MockDb {
    async fn create_company(&self, name: &str, owner_id: Uuid) -> Result<Company, sqlx::Error> {
        if self.should_fail || self.fail_create_company {
            return Err(mock_failure());
        }
        Ok(self.insert_company(name, owner_id))
    }

    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let company = self
            .companies
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == company_id)
            .cloned();
        Ok(company.map(|c| self.with_employee_count(c)))
    }

    async fn rename_company(
        &self,
        company_id: Uuid,
        name: &str,
    ) -> Result<Option<Company>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let company = {
            let mut companies = self.companies.lock().unwrap();
            companies.iter_mut().find(|c| c.id == company_id).map(|c| {
                c.name = name.to_string();
                c.updated_at = OffsetDateTime::now_utc();
                c.clone()
            })
        };
        Ok(company.map(|c| self.with_employee_count(c)))
    }

    async fn delete_company(&self, company_id: Uuid) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        self.companies.lock().unwrap().retain(|c| c.id != company_id);
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for MockDb {
    async fn find_payment_by_session(
        &self,
        stripe_session_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.stripe_session_id == stripe_session_id)
            .cloned())
    }

    async fn insert_payment_if_absent(
        &self,
        payment: &NewPayment,
    ) -> Result<Option<Payment>, sqlx::Error> {
        if self.should_fail || self.fail_insert_payment {
            return Err(mock_failure());
        }
        let mut payments = self.payments.lock().unwrap();
        if payments
            .iter()
            .any(|p| p.stripe_session_id == payment.stripe_session_id)
        {
            return Ok(None);
        }
        let row = Payment {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            stripe_session_id: payment.stripe_session_id.clone(),
            stripe_customer_id: payment.stripe_customer_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            plan: payment.plan.clone(),
            status: payment.status.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        payments.push(row.clone());
        Ok(Some(row))
    }
}

#[async_trait]
impl StripeEventLogRepository for MockDb {
    async fn claim_event(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<EventClaim, sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        let now = OffsetDateTime::now_utc();
        let mut events = self.stripe_events.lock().unwrap();
        match events.iter_mut().find(|e| e.event_id == event_id) {
            Some(event) if event.processed => Ok(EventClaim::Processed),
            Some(event)
                if now - event.claimed_at > time::Duration::seconds(STALE_CLAIM_SECONDS) =>
            {
                event.claimed_at = now;
                Ok(EventClaim::Claimed)
            }
            Some(_) => Ok(EventClaim::InFlight),
            None => {
                events.push(MockStripeEvent {
                    event_id: event_id.to_string(),
                    event_type: event_type.to_string(),
                    claimed_at: now,
                    processed: false,
                });
                Ok(EventClaim::Claimed)
            }
        }
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(mock_failure());
        }
        if let Some(event) = self
            .stripe_events
            .lock()
            .unwrap()
            .iter_mut()
            .find(|e| e.event_id == event_id)
        {
            event.processed = true;
        }
        Ok(())
    }

    async fn forget_event(&self, event_id: &str) -> Result<(), sqlx::Error> {
        self.stripe_events
            .lock()
            .unwrap()
            .retain(|e| e.event_id != event_id || e.processed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_unique_violation;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: None,
            country: None,
            role: UserRole::Learner,
            company_id: None,
            is_verified: true,
        }
    }

    #[tokio::test]
    async fn duplicate_email_surfaces_as_unique_violation() {
        let db = MockDb::new();
        db.create_user(&new_user("a@example.com")).await.unwrap();
        let err = db.create_user(&new_user("a@example.com")).await.unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&mock_failure()));
    }

    #[tokio::test]
    async fn deleting_an_owner_drops_its_company() {
        let db = MockDb::new();
        let owner = db.insert_user(sample_user("hr@example.com", UserRole::Hr, None));
        let company = db.insert_company("Acme", owner.id);
        db.insert_user(sample_user(
            "emp@example.com",
            UserRole::Employee,
            Some(company.id),
        ));

        db.delete_user(owner.id).await.unwrap();
        assert!(db.find_company(company.id).await.unwrap().is_none());
        let orphan = db.user_by_email("emp@example.com").unwrap();
        assert_eq!(orphan.company_id, None);
    }

    #[tokio::test]
    async fn event_claims_move_from_in_flight_to_processed() {
        let db = MockDb::new();
        let claim = db.claim_event("evt_1", "checkout.session.completed").await.unwrap();
        assert_eq!(claim, EventClaim::Claimed);
        let claim = db.claim_event("evt_1", "checkout.session.completed").await.unwrap();
        assert_eq!(claim, EventClaim::InFlight);

        db.mark_event_processed("evt_1").await.unwrap();
        db.forget_event("evt_1").await.unwrap();
        let claim = db.claim_event("evt_1", "checkout.session.completed").await.unwrap();
        assert_eq!(claim, EventClaim::Processed);
    }

    #[tokio::test]
    async fn stale_unfinished_claim_is_handed_over() {
        let db = MockDb::new();
        db.claim_event("evt_2", "checkout.session.completed").await.unwrap();
        db.stripe_events.lock().unwrap()[0].claimed_at -=
            time::Duration::seconds(STALE_CLAIM_SECONDS + 1);

        let claim = db.claim_event("evt_2", "checkout.session.completed").await.unwrap();
        assert_eq!(claim, EventClaim::Claimed);
    }
}
