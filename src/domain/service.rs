use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fsm::Rejected;

pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_PAYMENT_AMOUNT: u64 = 9_999_999_999;

/// A mobile-app service integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub data: ServiceData,
    /// Outcome of the last editorial review, cleared on edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<Review>,
}

impl Service {
    pub fn new(id: impl Into<String>, data: ServiceData) -> Self {
        Self {
            id: id.into(),
            data,
            review: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Review {
    Approved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approval_date: Option<DateTime<Utc>>,
    },
    Rejected {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceData {
    pub name: String,
    pub description: String,
    pub organization: Organization,
    #[serde(default)]
    pub metadata: ServiceMetadata,
    #[serde(default)]
    pub require_secure_channel: bool,
    /// Fiscal codes allowed to receive messages while in test mode
    #[serde(default)]
    pub authorized_recipients: Vec<String>,
    /// In euro cents
    #[serde(default)]
    pub max_allowed_payment_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    pub fiscal_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub scope: ServiceScope,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceScope {
    #[default]
    Local,
    National,
}

impl ServiceData {
    /// Business rules every stored service must satisfy
    pub fn validate(&self) -> Result<(), Rejected> {
        if self.name.trim().is_empty() {
            return Err(Rejected::new("name must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(Rejected::new("description must not be empty"));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(Rejected::new(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.organization.name.trim().is_empty() {
            return Err(Rejected::new("organization name must not be empty"));
        }
        if !is_organization_fiscal_code(&self.organization.fiscal_code) {
            return Err(Rejected::new(format!(
                "invalid organization fiscal code {:?}",
                self.organization.fiscal_code
            )));
        }
        if !self.metadata.has_contact() {
            return Err(Rejected::new(
                "at least one of email, phone or web_url is required",
            ));
        }
        if let Some(email) = &self.metadata.email {
            if !email.contains('@') {
                return Err(Rejected::new(format!("invalid email {email:?}")));
            }
        }
        if let Some(bad) = self
            .authorized_recipients
            .iter()
            .find(|r| !is_person_fiscal_code(r))
        {
            return Err(Rejected::new(format!(
                "invalid authorized recipient {bad:?}"
            )));
        }
        if self.max_allowed_payment_amount > MAX_PAYMENT_AMOUNT {
            return Err(Rejected::new(format!(
                "max_allowed_payment_amount exceeds {MAX_PAYMENT_AMOUNT}"
            )));
        }
        Ok(())
    }
}

impl ServiceMetadata {
    pub fn has_contact(&self) -> bool {
        [&self.email, &self.phone, &self.web_url]
            .iter()
            .any(|c| c.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Organizations are identified by an 11-digit fiscal code
fn is_organization_fiscal_code(code: &str) -> bool {
    code.len() == 11 && code.chars().all(|c| c.is_ascii_digit())
}

/// Personal fiscal codes are 16 uppercase alphanumerics
fn is_person_fiscal_code(code: &str) -> bool {
    code.len() == 16
        && code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}
