//! Status enums shared between the cart engine and its collaborators.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Visual variant of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastVariant {
    /// Neutral message.
    #[default]
    Default,
    /// Error or refused action.
    Destructive,
    /// Completed action.
    Success,
    /// Informational hint.
    Info,
}

impl std::fmt::Display for ToastVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Destructive => write!(f, "destructive"),
            Self::Success => write!(f, "success"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// How the current page was reached.
///
/// Mirrors the navigation-timing entry types. Only [`NavigationType::Reload`]
/// changes cart behavior: a hard reload discards the guest cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NavigationType {
    #[default]
    Navigate,
    Reload,
    BackForward,
    Prerender,
}

impl NavigationType {
    /// Whether this navigation is a hard page reload.
    #[must_use]
    pub const fn is_reload(self) -> bool {
        matches!(self, Self::Reload)
    }
}

impl std::str::FromStr for NavigationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(Self::Navigate),
            "reload" => Ok(Self::Reload),
            "back_forward" | "back-forward" => Ok(Self::BackForward),
            "prerender" => Ok(Self::Prerender),
            _ => Err(format!("invalid navigation type: {s}")),
        }
    }
}

/// Delivery option chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Standard delivery (flat 5.99).
    #[default]
    Standard,
    /// Express delivery (flat 12.99).
    Express,
}

impl DeliveryMethod {
    /// Flat delivery fee for this method.
    #[must_use]
    pub fn fee(self) -> Decimal {
        match self {
            Self::Standard => Decimal::new(599, 2),
            Self::Express => Decimal::new(1299, 2),
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Express => write!(f, "express"),
        }
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            _ => Err(format!("invalid delivery method: {s}")),
        }
    }
}
