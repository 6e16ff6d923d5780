use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CabType, DriverProfile, Role, User};

/// In-memory user registry standing in for the external directory service.
/// Holds customers and drivers; the driver availability flag lives here.
#[derive(Default)]
pub struct UserDirectory {
    users: DashMap<Uuid, User>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_customer(&self, name: String, email: String) -> Result<User, AppError> {
        self.register(name, email, Role::Customer, None)
    }

    pub fn register_driver(
        &self,
        name: String,
        email: String,
        cab_type: CabType,
    ) -> Result<User, AppError> {
        let profile = DriverProfile {
            available: true,
            cab_type,
        };
        self.register(name, email, Role::Driver, Some(profile))
    }

    fn register(
        &self,
        name: String,
        email: String,
        role: Role,
        driver_profile: Option<DriverProfile>,
    ) -> Result<User, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AppError::Validation(format!("invalid email: {email:?}")));
        }
        if self.find_by_email(&email).is_some() {
            return Err(AppError::Validation(format!(
                "email already registered: {email}"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            role,
            driver_profile,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn find(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.clone())
    }

    pub fn get(&self, id: Uuid) -> Result<User, AppError> {
        self.find(id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .iter()
            .find(|entry| entry.email.eq_ignore_ascii_case(email))
            .map(|entry| entry.clone())
    }

    pub fn drivers(&self) -> Vec<User> {
        self.users
            .iter()
            .filter(|entry| entry.role == Role::Driver)
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn available_driver_count(&self) -> usize {
        self.users
            .iter()
            .filter(|entry| {
                entry
                    .driver_profile
                    .as_ref()
                    .is_some_and(|profile| profile.available)
            })
            .count()
    }

    /// Writes the driver's self-reported availability flag. Fails if the user
    /// is unknown or not a driver.
    pub fn set_availability(&self, driver_id: Uuid, available: bool) -> Result<User, AppError> {
        let mut user = self
            .users
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        let profile = user
            .driver_profile
            .as_mut()
            .ok_or_else(|| AppError::Validation(format!("user {driver_id} is not a driver")))?;
        profile.available = available;

        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::UserDirectory;
    use crate::error::AppError;
    use crate::models::CabType;

    #[test]
    fn register_and_resolve_by_id_and_email() {
        let directory = UserDirectory::new();
        let user = directory
            .register_customer("Asha".to_string(), "asha@example.com".to_string())
            .unwrap();

        assert_eq!(directory.get(user.id).unwrap().name, "Asha");
        assert_eq!(
            directory.find_by_email("ASHA@example.com").unwrap().id,
            user.id
        );
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let directory = UserDirectory::new();
        directory
            .register_customer("A".to_string(), "a@example.com".to_string())
            .unwrap();
        let err = directory
            .register_customer("B".to_string(), "a@example.com".to_string())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn drivers_lists_only_driver_role() {
        let directory = UserDirectory::new();
        directory
            .register_customer("C".to_string(), "c@example.com".to_string())
            .unwrap();
        let driver = directory
            .register_driver("D".to_string(), "d@example.com".to_string(), CabType::Sedan)
            .unwrap();

        let drivers = directory.drivers();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].id, driver.id);
    }

    #[test]
    fn set_availability_round_trips() {
        let directory = UserDirectory::new();
        let driver = directory
            .register_driver("D".to_string(), "d@example.com".to_string(), CabType::Mini)
            .unwrap();

        let updated = directory.set_availability(driver.id, false).unwrap();
        assert!(!updated.driver_profile.unwrap().available);

        let updated = directory.set_availability(driver.id, true).unwrap();
        assert!(updated.driver_profile.unwrap().available);
    }

    #[test]
    fn set_availability_on_customer_fails() {
        let directory = UserDirectory::new();
        let customer = directory
            .register_customer("C".to_string(), "c@example.com".to_string())
            .unwrap();
        let err = directory.set_availability(customer.id, true).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let directory = UserDirectory::new();
        let err = directory.get(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
