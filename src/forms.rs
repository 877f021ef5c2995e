// Form models and client-side validation.
// Each form holds raw field text and validates into a typed request before anything is sent.

use reqwest::Url;
use thiserror::Error;

use crate::api::{LoginRequest, RegisterRequest, VerifyOtpRequest};

/// Food categories offered by the new-food form.
pub const CATEGORIES: &[&str] = &[
    "Breakfast",
    "Lunch",
    "Dinner",
    "Snacks",
    "Desserts",
    "Beverages",
    "Appetizers",
    "Main Course",
    "Side Dishes",
    "Salads",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Please enter a valid price")]
    InvalidPrice,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Verification code must contain digits only")]
    InvalidOtp,

    #[error("Please enter a valid website URL")]
    InvalidWebsite,
}

/// Collect the names of required fields that are blank.
fn require(fields: &[(&'static str, &str)]) -> Result<(), ValidationError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing))
    }
}

/// Loose `local@domain.tld` check; the server does the real verification.
fn check_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(ValidationError::InvalidEmail),
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Raw input of the new-food screen.
#[derive(Debug, Clone, Default)]
pub struct NewFoodForm {
    pub name: String,
    pub category: String,
    pub price: String,
    pub description: String,
}

/// A validated food ready to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFood {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub description: Option<String>,
}

impl NewFoodForm {
    pub fn validate(&self) -> Result<NewFood, ValidationError> {
        require(&[
            ("name", self.name.as_str()),
            ("category", self.category.as_str()),
            ("price", self.price.as_str()),
        ])?;

        let price: f64 = self
            .price
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidPrice)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }

        let category = self.category.trim();
        if !CATEGORIES.contains(&category) {
            return Err(ValidationError::UnknownCategory(category.to_string()));
        }

        Ok(NewFood {
            name: self.name.trim().to_string(),
            category: category.to_string(),
            price,
            description: optional(&self.description),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, ValidationError> {
        require(&[("email", self.email.as_str()), ("password", self.password.as_str())])?;
        check_email(&self.email)?;
        Ok(LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<RegisterRequest, ValidationError> {
        require(&[
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
            ("password", self.password.as_str()),
        ])?;
        check_email(&self.email)?;
        Ok(RegisterRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct OtpForm {
    pub email: String,
    pub otp: String,
}

impl OtpForm {
    pub fn validate(&self) -> Result<VerifyOtpRequest, ValidationError> {
        require(&[("email", self.email.as_str()), ("otp", self.otp.as_str())])?;
        check_email(&self.email)?;
        let otp = self.otp.trim();
        if !otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidOtp);
        }
        Ok(VerifyOtpRequest {
            email: self.email.trim().to_string(),
            otp: otp.to_string(),
        })
    }
}

/// Raw input of the profile editor.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub display_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub bio: String,
    pub website: String,
    pub company: String,
    pub position: String,
}

/// A validated profile; blank optional fields are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<Profile, ValidationError> {
        require(&[
            ("display name", self.display_name.as_str()),
            ("email", self.email.as_str()),
        ])?;
        check_email(&self.email)?;

        let website = optional(&self.website);
        if let Some(site) = &website {
            let valid = Url::parse(site)
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                return Err(ValidationError::InvalidWebsite);
            }
        }

        Ok(Profile {
            display_name: self.display_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: optional(&self.phone),
            address: optional(&self.address),
            bio: optional(&self.bio),
            website,
            company: optional(&self.company),
            position: optional(&self.position),
        })
    }
}
