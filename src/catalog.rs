//! Clinic reference data
//!
//! Specialties, practitioners, insurance plans and the reserved button
//! tokens. Built once at startup and shared read-only by every session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of the back button shown on every menu except the root one
pub const BACK_LABEL: &str = "🔙 بازگشت";
const BACK_WORD: &str = "بازگشت";

/// Label of the payment button
pub const PAY_LABEL: &str = "💳 پرداخت";
const PAY_WORD: &str = "پرداخت";

/// Command that resets a conversation to the root menu
pub const START_COMMAND: &str = "/start";

/// True for the back button, with or without its emoji
pub fn is_back(text: &str) -> bool {
    text == BACK_LABEL || text == BACK_WORD
}

/// True for the payment button, with or without its emoji
pub fn is_pay(text: &str) -> bool {
    text == PAY_LABEL || text == PAY_WORD
}

/// True for `/start`, the group-chat form `/start@SomeBot`, and deep links
/// that carry a payload after the command
pub fn is_start(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    match command.split_once('@') {
        Some((command, bot)) => command == START_COMMAND && !bot.is_empty(),
        None => command == START_COMMAND,
    }
}

// ============================================================================
// Insurance
// ============================================================================

/// Insurance plans accepted by the clinic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insurance {
    /// تأمین اجتماعی
    SocialSecurity,
    /// نیروهای مسلح
    ArmedForces,
    /// آزاد (self-paying)
    SelfPay,
    /// سایر
    Other,
}

impl Insurance {
    /// Every plan, in keyboard order
    pub const ALL: [Insurance; 4] = [
        Insurance::SocialSecurity,
        Insurance::ArmedForces,
        Insurance::SelfPay,
        Insurance::Other,
    ];

    /// Button label, also the value written to the appointments table
    pub fn label(self) -> &'static str {
        match self {
            Insurance::SocialSecurity => "تأمین اجتماعی",
            Insurance::ArmedForces => "نیروهای مسلح",
            Insurance::SelfPay => "آزاد",
            Insurance::Other => "سایر",
        }
    }

    pub fn from_label(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|plan| plan.label() == text)
    }
}

impl fmt::Display for Insurance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Specialties
// ============================================================================

/// A specialty and the practitioners who can be booked under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specialty {
    pub name: String,
    pub doctors: Vec<String>,
}

impl Specialty {
    pub fn new<I, S>(name: impl Into<String>, doctors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            doctors: doctors.into_iter().map(Into::into).collect(),
        }
    }
}

/// Immutable reference data for the intake form
#[derive(Debug, Clone)]
pub struct Catalog {
    specialties: Vec<Specialty>,
}

impl Catalog {
    pub fn new(specialties: Vec<Specialty>) -> Self {
        Self { specialties }
    }

    /// The clinic's current roster
    pub fn clinic() -> Self {
        Self::new(vec![
            Specialty::new("گوش و حلق و بینی", ["دکتر نیوشا اصغری", "دکتر حسن رضایی"]),
            Specialty::new("مغز و اعصاب", ["دکتر ماهور شمس", "دکتر سعید کرمی"]),
            Specialty::new("پوست و مو", ["دکتر مریم عبدی", "دکتر احد کاظمی"]),
            Specialty::new("فیزیوتراپی", ["دکتر رها غلامی", "دکتر سهیل نوربخش"]),
        ])
    }

    pub fn specialties(&self) -> &[Specialty] {
        &self.specialties
    }

    /// Look up a specialty by its exact button label
    pub fn specialty(&self, name: &str) -> Option<&Specialty> {
        self.specialties.iter().find(|s| s.name == name)
    }

    /// Practitioners of a specialty; empty for an unknown specialty
    pub fn doctors(&self, specialty: &str) -> &[String] {
        self.specialty(specialty)
            .map(|s| s.doctors.as_slice())
            .unwrap_or_default()
    }

    /// Resolve `name` to a practitioner of `specialty`
    pub fn doctor(&self, specialty: &str, name: &str) -> Option<&str> {
        self.doctors(specialty)
            .iter()
            .find(|d| *d == name)
            .map(String::as_str)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::clinic()
    }
}
