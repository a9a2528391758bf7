use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationErrors>;

/// Collection of validation errors
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self {
            errors: HashMap::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: String) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Moves another validator's messages under `field`.
    pub fn absorb(&mut self, field: &str, other: ValidationErrors) {
        for messages in other.errors.into_values() {
            for message in messages {
                self.add_error(field, message);
            }
        }
    }

    pub fn into_field_errors(self) -> HashMap<String, Vec<String>> {
        self.errors
    }
}

impl Default for ValidationErrors {
    fn default() -> Self {
        Self::new()
    }
}

/// Validator trait for implementing custom validation logic
pub trait Validator<T: ?Sized> {
    fn validate(&self, value: &T) -> ValidationResult<()>;
}

/// Email validator
pub struct EmailValidator;

impl EmailValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid_email(email: &str) -> bool {
        static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
        // RFC 5322 compliant email regex (simplified)
        let email_regex = EMAIL_REGEX.get_or_init(|| {
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
            )
            .expect("email pattern is valid")
        });

        email.len() <= 254 && email_regex.is_match(email)
    }
}

impl Default for EmailValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator<str> for EmailValidator {
    fn validate(&self, email: &str) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();

        if email.is_empty() {
            errors.add_error("email", "Email is required".to_string());
        } else if !Self::is_valid_email(email) {
            errors.add_error("email", "Invalid email address".to_string());
        }

        if errors.has_errors() {
            Err(errors)
        } else {
            Ok(())
        }
    }
}

/// String length validator, counted in characters
pub struct StringLengthValidator {
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl StringLengthValidator {
    pub fn new() -> Self {
        Self {
            min_length: None,
            max_length: None,
        }
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.min_length = Some(length);
        self
    }

    pub fn max_length(mut self, length: usize) -> Self {
        self.max_length = Some(length);
        self
    }
}

impl Default for StringLengthValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator<str> for StringLengthValidator {
    fn validate(&self, value: &str) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        let length = value.chars().count();

        if let Some(min_len) = self.min_length {
            if length < min_len {
                errors.add_error(
                    "length",
                    format!("Must be at least {} characters long", min_len),
                );
            }
        }

        if let Some(max_len) = self.max_length {
            if length > max_len {
                errors.add_error(
                    "length",
                    format!("Must be no more than {} characters long", max_len),
                );
            }
        }

        if errors.has_errors() {
            Err(errors)
        } else {
            Ok(())
        }
    }
}

/// Collection of common validation functions
pub mod validators {
    use super::*;

    pub const USERNAME_LENGTH: (usize, usize) = (3, 25);
    pub const EMAIL_LENGTH: (usize, usize) = (6, 40);
    pub const PASSWORD_LENGTH: (usize, usize) = (6, 40);

    fn check_length(
        errors: &mut ValidationErrors,
        field: &str,
        value: &str,
        (min, max): (usize, usize),
    ) {
        let validator = StringLengthValidator::new().min_length(min).max_length(max);
        if let Err(found) = validator.validate(value) {
            errors.absorb(field, found);
        }
    }

    /// Validate the registration form
    pub fn validate_registration(
        username: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> ValidationResult<()> {
        let mut all_errors = ValidationErrors::new();

        check_length(&mut all_errors, "username", username, USERNAME_LENGTH);

        check_length(&mut all_errors, "email", email, EMAIL_LENGTH);
        if let Err(errors) = EmailValidator::new().validate(email) {
            all_errors.absorb("email", errors);
        }

        check_length(&mut all_errors, "password", password, PASSWORD_LENGTH);
        if password != confirm {
            all_errors.add_error("confirm", "Passwords must match".to_string());
        }

        if all_errors.has_errors() {
            Err(all_errors)
        } else {
            Ok(())
        }
    }
}
