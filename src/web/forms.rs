use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::{
    domain::{RefundInput, RefundRequest},
    error::FieldErrors,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw refund form fields as posted by the browser. Kept as strings so a
/// rejected submission can be rendered back exactly as typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundForm {
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub order_date: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub products: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub bank_name: String,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub iban: String,
}

impl RefundForm {
    pub fn from_refund(refund: &RefundRequest) -> Self {
        Self {
            order_number: refund.order_number.clone(),
            order_date: refund.order_date.format(DATE_FORMAT).to_string(),
            first_name: refund.first_name.clone(),
            last_name: refund.last_name.clone(),
            phone_number: refund.phone_number.clone(),
            email: refund.email.clone(),
            country: refund.country.clone(),
            address: refund.address.clone(),
            postal_code: refund.postal_code.clone(),
            city: refund.city.clone(),
            products: refund.products.clone(),
            reason: refund.reason.clone(),
            bank_name: refund.bank_name.clone(),
            account_type: refund.account_type.clone(),
            iban: refund.iban.clone(),
        }
    }

    /// Parses the form into an input. An unparseable order date is
    /// reported together with every other field error.
    pub fn to_input(&self) -> Result<RefundInput, FieldErrors> {
        let order_date = NaiveDate::parse_from_str(self.order_date.trim(), DATE_FORMAT);

        let input = RefundInput {
            order_number: self.order_number.trim().to_string(),
            order_date: *order_date.as_ref().unwrap_or(&NaiveDate::MIN),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            email: self.email.trim().to_string(),
            country: self.country.trim().to_string(),
            address: self.address.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            city: self.city.trim().to_string(),
            products: self.products.trim().to_string(),
            reason: self.reason.trim().to_string(),
            bank_name: self.bank_name.trim().to_string(),
            account_type: self.account_type.trim().to_string(),
            iban: self.iban.clone(),
        };

        if order_date.is_ok() {
            return Ok(input);
        }

        let mut errors = match input.validate() {
            Ok(()) => FieldErrors::new(),
            Err(errors) => errors.into(),
        };
        errors.add("order_date", "Enter a valid date.");
        Err(errors)
    }
}
