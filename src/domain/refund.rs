use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundRequest {
    pub id: i64,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub order_number: String,
    pub order_date: NaiveDate,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub country: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub products: String,
    pub reason: String,
    pub bank_name: String,
    pub account_type: String,
    pub iban: String,
    pub iban_verified: bool,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefundRequest {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Copy the user-editable fields out of the record.
    pub fn to_input(&self) -> RefundInput {
        RefundInput {
            order_number: self.order_number.clone(),
            order_date: self.order_date,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            email: self.email.clone(),
            country: self.country.clone(),
            address: self.address.clone(),
            postal_code: self.postal_code.clone(),
            city: self.city.clone(),
            products: self.products.clone(),
            reason: self.reason.clone(),
            bank_name: self.bank_name.clone(),
            account_type: self.account_type.clone(),
            iban: self.iban.clone(),
        }
    }
}

impl fmt::Display for RefundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Refund #{} - {} ({})", self.id, self.order_number, self.status)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RefundStatus {
    pub const ALL: [RefundStatus; 3] = [
        RefundStatus::Pending,
        RefundStatus::Approved,
        RefundStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Approved => "approved",
            RefundStatus::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "Pending",
            RefundStatus::Approved => "Approved",
            RefundStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "approved" => Ok(RefundStatus::Approved),
            "rejected" => Ok(RefundStatus::Rejected),
            other => Err(format!("Invalid refund status: {}", other)),
        }
    }
}

/// The field set a submitter may provide. Owner, status and the IBAN
/// verification flag are always filled in server-side.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RefundInput {
    #[validate(length(min = 1, max = 100, message = "Order number is required (max 100 characters)."))]
    pub order_number: String,
    pub order_date: NaiveDate,
    #[validate(length(min = 1, max = 100, message = "First name is required (max 100 characters)."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required (max 100 characters)."))]
    pub last_name: String,
    #[validate(length(min = 1, max = 20, message = "Phone number is required (max 20 characters)."))]
    pub phone_number: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, max = 50, message = "Country is required (max 50 characters)."))]
    pub country: String,
    #[validate(length(min = 1, message = "Address is required."))]
    pub address: String,
    #[validate(length(min = 1, max = 20, message = "Postal code is required (max 20 characters)."))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 50, message = "City is required (max 50 characters)."))]
    pub city: String,
    #[validate(length(min = 1, message = "List the products to refund."))]
    pub products: String,
    #[validate(length(min = 1, message = "Reason is required."))]
    pub reason: String,
    #[validate(length(min = 1, max = 200, message = "Bank name is required (max 200 characters)."))]
    pub bank_name: String,
    #[validate(length(min = 1, max = 50, message = "Account type is required (max 50 characters)."))]
    pub account_type: String,
    #[validate(length(min = 1, max = 34, message = "IBAN is required (max 34 characters)."))]
    pub iban: String,
}

/// Partial update. `status` is only honoured for staff.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RefundChanges {
    pub order_number: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub products: Option<String>,
    pub reason: Option<String>,
    pub bank_name: Option<String>,
    pub account_type: Option<String>,
    pub iban: Option<String>,
    pub status: Option<RefundStatus>,
}

impl RefundChanges {
    /// A full replacement of the editable fields, optionally with a status.
    pub fn replace_with(input: RefundInput, status: Option<RefundStatus>) -> Self {
        Self {
            order_number: Some(input.order_number),
            order_date: Some(input.order_date),
            first_name: Some(input.first_name),
            last_name: Some(input.last_name),
            phone_number: Some(input.phone_number),
            email: Some(input.email),
            country: Some(input.country),
            address: Some(input.address),
            postal_code: Some(input.postal_code),
            city: Some(input.city),
            products: Some(input.products),
            reason: Some(input.reason),
            bank_name: Some(input.bank_name),
            account_type: Some(input.account_type),
            iban: Some(input.iban),
            status,
        }
    }

    /// Overlay these changes on an existing input.
    pub fn apply_to(self, mut input: RefundInput) -> RefundInput {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field { input.$field = value; })*
            };
        }
        overlay!(
            order_number, order_date, first_name, last_name, phone_number, email,
            country, address, postal_code, city, products, reason, bank_name,
            account_type, iban
        );
        input
    }
}

/// A fully-formed record ready for insertion.
#[derive(Debug, Clone)]
pub struct NewRefundRequest {
    pub user_id: Uuid,
    pub input: RefundInput,
    pub iban_verified: bool,
}

/// A refund request joined with its owner's username, for the admin list.
#[derive(Debug, Clone, Serialize)]
pub struct RefundWithOwner {
    #[serde(flatten)]
    pub refund: RefundRequest,
    pub username: String,
}

/// Admin console search and filter parameters.
#[derive(Debug, Clone, Default)]
pub struct RefundFilter {
    /// Matches order number, owner username or email.
    pub search: Option<String>,
    pub status: Option<RefundStatus>,
    pub country: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}
