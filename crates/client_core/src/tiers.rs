//! Tier authoring: the single-tier scratch buffer behind the "add tier" form
//! and the parsing rules that turn it into a [`TicketTier`].

use shared::domain::TicketTier;
use thiserror::Error;

/// Raw form input for one tier. Prices and perks stay as typed text until
/// the organizer presses "add".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftTierBuffer {
    pub name: String,
    pub price_text: String,
    pub perks_text: String,
}

impl DraftTierBuffer {
    pub fn new(
        name: impl Into<String>,
        price_text: impl Into<String>,
        perks_text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price_text: price_text.into(),
            perks_text: perks_text.into(),
        }
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.price_text.clear();
        self.perks_text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.price_text.is_empty() && self.perks_text.is_empty()
    }
}

/// Why a tier was not added. Shown to the organizer as a prompt; the draft
/// is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierRejected {
    #[error("Please enter a tier name and price")]
    MissingName,
    #[error("Please enter a tier name and price")]
    MissingPrice,
    #[error("'{0}' is not a valid price")]
    InvalidPrice(String),
}

pub fn parse_tier(buffer: &DraftTierBuffer) -> Result<TicketTier, TierRejected> {
    let name = buffer.name.trim();
    if name.is_empty() {
        return Err(TierRejected::MissingName);
    }
    let price = parse_price(&buffer.price_text)?;

    Ok(TicketTier {
        name: name.to_string(),
        price,
        features: split_perks(&buffer.perks_text),
    })
}

/// Non-negative decimal. Zero is a valid (free) tier; there is no ceiling.
pub fn parse_price(text: &str) -> Result<f64, TierRejected> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TierRejected::MissingPrice);
    }
    match trimmed.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(TierRejected::InvalidPrice(trimmed.to_string())),
    }
}

pub fn split_perks(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|perk| !perk.is_empty())
        .map(str::to_string)
        .collect()
}
