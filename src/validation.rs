// Request body validation.
//
// Request structs derive `validator::Validate`. Formats the crate has no
// built-in rule for (phone, OTP, pincode, bank details) are custom functions
// here. Failures are flattened to one message per field for `field_errors`.
use std::borrow::Cow;
use std::collections::HashMap;

use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::ApiError;

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn is_digits(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if is_digits(value, 10, 10) {
        return Ok(());
    }
    Err(failure("phone", "must be exactly 10 digits"))
}

pub fn validate_otp(value: &str) -> Result<(), ValidationError> {
    if is_digits(value, 6, 6) {
        return Ok(());
    }
    Err(failure("otp", "must be exactly 6 digits"))
}

pub fn validate_pincode(value: &str) -> Result<(), ValidationError> {
    if is_digits(value, 6, 6) {
        return Ok(());
    }
    Err(failure("pincode", "must be exactly 6 digits"))
}

pub fn validate_account_number(value: &str) -> Result<(), ValidationError> {
    if is_digits(value, 9, 18) {
        return Ok(());
    }
    Err(failure("account_number", "must be 9 to 18 digits"))
}

/// Four letters, a literal zero, then six letters or digits
pub fn validate_ifsc(value: &str) -> Result<(), ValidationError> {
    let bytes = value.as_bytes();
    let ok = bytes.len() == 11
        && bytes[..4].iter().all(|b| b.is_ascii_uppercase())
        && bytes[4] == b'0'
        && bytes[5..].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if ok {
        return Ok(());
    }
    Err(failure("ifsc", "must look like ABCD0123456"))
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(failure("required", "is required"));
    }
    Ok(())
}

/// Message for a built-in rule that was declared without one
fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let min = error.params.get("min");
    let max = error.params.get("max");
    match error.code.as_ref() {
        "email" => "must be a valid email address".to_string(),
        "length" => match (min, max) {
            (Some(min), Some(max)) => format!("must be between {} and {} characters", min, max),
            (Some(min), None) => format!("must be at least {} characters", min),
            (None, Some(max)) => format!("must be at most {} characters", max),
            (None, None) => "has an invalid length".to_string(),
        },
        "range" => match (min, max) {
            (Some(min), Some(max)) => format!("must be between {} and {}", min, max),
            (Some(min), None) => format!("must be at least {}", min),
            (None, Some(max)) => format!("must be at most {}", max),
            (None, None) => "is out of range".to_string(),
        },
        other => format!("failed the {} check", other),
    }
}

/// First message per field. Struct-level (schema) failures are keyed by
/// their error code, which names the field they concern.
pub fn field_errors(errors: &ValidationErrors) -> HashMap<String, String> {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, failures)| {
            let first = failures.first()?;
            let key = if field == "__all__" {
                first.code.to_string()
            } else {
                field.to_string()
            };
            Some((key, describe(first)))
        })
        .collect()
}

/// JSON body that has passed `Validate` before the handler runs
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    #[validate(schema(function = "band_is_ordered"))]
    struct Sample {
        #[validate(email)]
        email: String,
        #[validate(length(min = 2, max = 100))]
        name: String,
        #[validate(custom = "validate_otp")]
        otp: String,
        #[validate(custom = "validate_phone")]
        phone: Option<String>,
        low: i64,
        high: i64,
    }

    fn band_is_ordered(sample: &Sample) -> Result<(), ValidationError> {
        if sample.high < sample.low {
            return Err(failure("high", "must not be below low"));
        }
        Ok(())
    }

    fn sample() -> Sample {
        Sample {
            email: "sam@example.com".into(),
            name: "Sam".into(),
            otp: "123456".into(),
            phone: None,
            low: 1,
            high: 2,
        }
    }

    #[test]
    fn phone_must_be_ten_digits() {
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("987654321").is_err());
        assert!(validate_phone("98765432a0").is_err());
    }

    #[test]
    fn ifsc_format() {
        assert!(validate_ifsc("HDFC0001234").is_ok());
        assert!(validate_ifsc("SBIN0ABC123").is_ok());
        assert!(validate_ifsc("HDFC1001234").is_err());
        assert!(validate_ifsc("hdfc0001234").is_err());
        assert!(validate_ifsc("HDFC000123").is_err());
    }

    #[test]
    fn collects_every_failing_field() {
        let bad = Sample {
            email: "nope".into(),
            name: "x".into(),
            otp: "12345".into(),
            phone: Some("12".into()),
            ..sample()
        };
        let fields = field_errors(&bad.validate().unwrap_err());

        assert_eq!(fields.len(), 4);
        assert_eq!(fields["email"], "must be a valid email address");
        assert_eq!(fields["name"], "must be between 2 and 100 characters");
        assert_eq!(fields["otp"], "must be exactly 6 digits");
        assert_eq!(fields["phone"], "must be exactly 10 digits");
    }

    #[test]
    fn absent_optional_fields_are_not_checked() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn schema_failures_are_keyed_by_field() {
        let fields = field_errors(&Sample { low: 5, high: 1, ..sample() }.validate().unwrap_err());
        assert_eq!(fields["high"], "must not be below low");
    }
}
