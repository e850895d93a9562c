//! Render-ready ticket cards for the event page.

use shared::domain::{Event, TicketTier};

pub const DEFAULT_BASE_PRICE: f64 = 89.0;
/// Real tier lists mark this position as popular once they are long enough.
const POPULAR_INDEX: usize = 1;
const POPULAR_MIN_TIERS: usize = 3;

const EARLY_BIRD_FEATURES: &[&str] = &[
    "General admission",
    "Access to the main floor",
    "Limited early pricing",
];
const GENERAL_FEATURES: &[&str] = &[
    "General admission",
    "Access to all stages",
    "Free coat check",
];
const VIP_FEATURES: &[&str] = &[
    "Priority entry",
    "VIP lounge access",
    "Complimentary drinks",
    "Exclusive merch",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTier {
    pub title: String,
    pub price: f64,
    pub features: Vec<String>,
    pub rank: usize,
    pub popular: bool,
}

/// Restartable card sequence: clone it to iterate again. Produced by
/// [`to_display_tiers`].
#[derive(Debug, Clone)]
pub struct DisplayTiers<'a> {
    source: Source<'a>,
    next: usize,
}

#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    Custom(&'a [TicketTier]),
    Fallback { base: f64 },
}

impl<'a> DisplayTiers<'a> {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, Source::Fallback { .. })
    }

    fn total(&self) -> usize {
        match self.source {
            Source::Custom(tiers) => tiers.len(),
            Source::Fallback { .. } => 3,
        }
    }
}

impl<'a> Iterator for DisplayTiers<'a> {
    type Item = DisplayTier;

    fn next(&mut self) -> Option<Self::Item> {
        let rank = self.next;
        let item = match self.source {
            Source::Custom(tiers) => {
                let tier = tiers.get(rank)?;
                DisplayTier {
                    title: tier.name.clone(),
                    price: tier.price,
                    features: tier.features.clone(),
                    rank,
                    popular: rank == POPULAR_INDEX && tiers.len() >= POPULAR_MIN_TIERS,
                }
            }
            Source::Fallback { base } => fallback_tier(base, rank)?,
        };
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DisplayTiers<'_> {}

pub fn to_display_tiers(event: &Event) -> DisplayTiers<'_> {
    let source = if event.ticket_tiers.is_empty() {
        Source::Fallback {
            base: event.min_price.unwrap_or(DEFAULT_BASE_PRICE),
        }
    } else {
        Source::Custom(&event.ticket_tiers)
    };
    DisplayTiers { source, next: 0 }
}

fn fallback_tier(base: f64, rank: usize) -> Option<DisplayTier> {
    let (title, price, features, popular) = match rank {
        0 => ("Early Bird", base, EARLY_BIRD_FEATURES, false),
        1 => ("General", (base * 1.5).floor(), GENERAL_FEATURES, true),
        2 => ("VIP", (base * 3.0).floor(), VIP_FEATURES, false),
        _ => return None,
    };
    Some(DisplayTier {
        title: title.to_string(),
        price,
        features: features.iter().map(|f| f.to_string()).collect(),
        rank,
        popular,
    })
}

#[cfg(test)]
#[path = "tests/display_tests.rs"]
mod tests;
