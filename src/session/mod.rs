use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::Gateway;
use crate::models::driver::{
    AccountStatus, CompensationClass, Driver, Presence, VehicleType,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub license_number: String,
    pub vehicle_type: VehicleType,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileChanges {
    pub full_name: String,
    pub phone: String,
    pub license_number: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
}

pub async fn sign_in(
    gateway: &dyn Gateway,
    email: &str,
    password: &str,
) -> Result<Driver, AppError> {
    let email = email.trim().to_lowercase();
    let user = gateway.sign_in(&email, password).await?;

    let Some(driver) = gateway.driver_by_user(user.id).await? else {
        discard_auth(gateway).await;
        return Err(AppError::NotFound("driver profile not found".to_string()));
    };

    if !driver.status.allows_session() {
        discard_auth(gateway).await;
        let reason = match driver.status {
            AccountStatus::Pending => "account is awaiting approval",
            AccountStatus::Suspended => "account is suspended",
            _ => "account is not eligible to sign in",
        };
        return Err(AppError::Unauthorized(reason.to_string()));
    }

    info!(driver_id = %driver.id, "driver signed in");
    Ok(driver)
}

pub async fn register(gateway: &dyn Gateway, form: RegisterForm) -> Result<Driver, AppError> {
    validate_full_name(&form.full_name)?;
    let email = form.email.trim().to_lowercase();
    if !valid_email(&email) {
        return Err(AppError::BadRequest("invalid email address".to_string()));
    }
    validate_phone(&form.phone)?;
    validate_license(&form.license_number)?;
    if form.password.len() < 6 {
        return Err(AppError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }

    if gateway.driver_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "an account with this email already exists".to_string(),
        ));
    }

    let user = gateway.sign_up(&email, &form.password).await?;

    let driver = Driver {
        id: Uuid::new_v4(),
        user_id: user.id,
        full_name: form.full_name.trim().to_string(),
        email,
        phone: form.phone.trim().replace(' ', ""),
        license_number: form.license_number.trim().to_string(),
        vehicle_type: form.vehicle_type,
        compensation_class: CompensationClass::Permanent,
        status: AccountStatus::Pending,
        presence: Presence::Offline,
        total_deliveries: 0,
        rating: 0.0,
        position: None,
        last_seen: None,
        created_at: Utc::now(),
        emergency_contact_name: None,
        emergency_contact_phone: None,
    };
    let driver = gateway.insert_driver(driver).await?;

    // approval is an external step; registration never opens a session
    discard_auth(gateway).await;

    info!(driver_id = %driver.id, "driver registered, awaiting approval");
    Ok(driver)
}

pub async fn set_presence(
    gateway: &dyn Gateway,
    driver: &Driver,
    online: bool,
) -> Result<Driver, AppError> {
    if online && driver.compensation_class == CompensationClass::Temporary {
        let active = gateway.latest_activation().await?.unwrap_or(false);
        if !active {
            return Err(AppError::PermissionDenied(
                "temporary driver hiring is currently not active".to_string(),
            ));
        }
    }

    let mut updated = driver.clone();
    updated.presence = if online {
        Presence::Online
    } else {
        Presence::Offline
    };
    updated.last_seen = Some(Utc::now());

    gateway.update_driver(&updated).await?;
    info!(driver_id = %driver.id, online, "presence updated");
    Ok(updated)
}

pub async fn update_profile(
    gateway: &dyn Gateway,
    driver: &Driver,
    changes: ProfileChanges,
) -> Result<Driver, AppError> {
    validate_full_name(&changes.full_name)?;
    validate_phone(&changes.phone)?;
    validate_license(&changes.license_number)?;
    if let Some(contact_phone) = changes
        .emergency_contact_phone
        .as_deref()
        .filter(|phone| !phone.trim().is_empty())
    {
        validate_emergency_phone(contact_phone)?;
    }

    let mut updated = driver.clone();
    updated.full_name = changes.full_name.trim().to_string();
    updated.phone = changes.phone.trim().replace(' ', "");
    updated.license_number = changes.license_number.trim().to_string();
    updated.vehicle_type = changes.vehicle_type;
    updated.emergency_contact_name = changes
        .emergency_contact_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    updated.emergency_contact_phone = changes
        .emergency_contact_phone
        .map(|phone| phone.trim().to_string())
        .filter(|phone| !phone.is_empty());

    gateway.update_driver(&updated).await?;
    info!(driver_id = %driver.id, "profile updated");
    Ok(updated)
}

// teardown counterpart of sign_in: presence goes offline best-effort, then
// the auth session is dropped
pub async fn sign_out(gateway: &dyn Gateway, driver: &Driver) {
    let mut updated = driver.clone();
    updated.presence = Presence::Offline;
    updated.last_seen = Some(Utc::now());
    if let Err(err) = gateway.update_driver(&updated).await {
        warn!(driver_id = %driver.id, error = %err, "presence-offline write failed on sign-out");
    }

    discard_auth(gateway).await;
    info!(driver_id = %driver.id, "driver signed out");
}

async fn discard_auth(gateway: &dyn Gateway) {
    if let Err(err) = gateway.sign_out().await {
        warn!(error = %err, "auth sign-out failed");
    }
}

fn validate_full_name(full_name: &str) -> Result<(), AppError> {
    if full_name.trim().len() < 3 {
        return Err(AppError::BadRequest(
            "full name must be at least 3 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    if phone.replace(' ', "").len() < 10 {
        return Err(AppError::BadRequest(
            "phone number must have at least 10 digits".to_string(),
        ));
    }
    Ok(())
}

fn validate_license(license_number: &str) -> Result<(), AppError> {
    if license_number.trim().len() < 2 {
        return Err(AppError::BadRequest(
            "license number is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_emergency_phone(phone: &str) -> Result<(), AppError> {
    let stripped = phone.replace(' ', "");
    let ten_digits =
        stripped.len() >= 10 && stripped.chars().take(10).all(|c| c.is_ascii_digit());
    if !ten_digits {
        return Err(AppError::BadRequest(
            "emergency contact phone must be 10 digits".to_string(),
        ));
    }
    Ok(())
}

fn valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}
