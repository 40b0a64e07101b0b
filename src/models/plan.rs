use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Basic, PlanTier::Pro, PlanTier::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlanTier::Basic => "Pitchlab Basic",
            PlanTier::Pro => "Pitchlab Pro",
            PlanTier::Enterprise => "Pitchlab Enterprise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|plan| plan.as_str().eq_ignore_ascii_case(value))
    }

    /// Catalog price in minor units. Prices are identical across currencies.
    pub fn price(&self, _currency: Currency) -> i64 {
        match self {
            PlanTier::Basic => 1900,
            PlanTier::Pro => 4900,
            PlanTier::Enterprise => 9900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Eur,
    Usd,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Eur, Currency::Usd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Eur => "eur",
            Currency::Usd => "usd",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|currency| currency.as_str().eq_ignore_ascii_case(value))
    }
}

/// Every amount the checkout endpoint will ever accept.
pub fn allowed_amounts() -> Vec<i64> {
    let mut amounts: Vec<i64> = PlanTier::ALL
        .iter()
        .flat_map(|plan| Currency::ALL.iter().map(move |c| plan.price(*c)))
        .collect();
    amounts.sort_unstable();
    amounts.dedup();
    amounts
}
