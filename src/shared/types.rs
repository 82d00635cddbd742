//! Common types used across the application

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Token representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    #[serde(with = "pubkey_string")]
    pub mint: Pubkey,
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn new(symbol: impl Into<String>, mint: Pubkey, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            mint,
            decimals,
        }
    }
}

/// The traded pair. `quote` is the unit trade sizes and profits are measured in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPair {
    pub base: TokenDescriptor,
    pub quote: TokenDescriptor,
}

impl AssetPair {
    pub fn new(base: TokenDescriptor, quote: TokenDescriptor) -> Self {
        Self { base, quote }
    }

    /// Token received when swapping `input` on either venue.
    pub fn counterpart(&self, input: &TokenDescriptor) -> &TokenDescriptor {
        if input.mint == self.quote.mint {
            &self.base
        } else {
            &self.quote
        }
    }
}

/// Position of a venue in the configured pair of venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueSlot {
    First,
    Second,
}

impl VenueSlot {
    pub const ALL: [VenueSlot; 2] = [VenueSlot::First, VenueSlot::Second];

    pub fn index(self) -> usize {
        match self {
            VenueSlot::First => 0,
            VenueSlot::Second => 1,
        }
    }
}

/// Static description of a venue (one pool of the pair on one DEX).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueDescriptor {
    pub slot: VenueSlot,
    /// Display name, e.g. "Raydium"
    pub name: String,
    #[serde(with = "pubkey_string")]
    pub pool_address: Pubkey,
}

/// Both venues, indexed by slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenuePair {
    pub first: VenueDescriptor,
    pub second: VenueDescriptor,
}

impl VenuePair {
    pub fn get(&self, slot: VenueSlot) -> &VenueDescriptor {
        match slot {
            VenueSlot::First => &self.first,
            VenueSlot::Second => &self.second,
        }
    }

    pub fn slot_of(&self, pool: &Pubkey) -> Option<VenueSlot> {
        VenueSlot::ALL
            .into_iter()
            .find(|slot| &self.get(*slot).pool_address == pool)
    }
}

/// Round-trip strategy. `A` enters on the first venue and exits on the second,
/// `B` is the mirror image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    A,
    B,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::A, Strategy::B];

    /// Venue where quote is spent to acquire base.
    pub fn entry(self) -> VenueSlot {
        match self {
            Strategy::A => VenueSlot::First,
            Strategy::B => VenueSlot::Second,
        }
    }

    /// Venue where the acquired base is sold back for quote.
    pub fn exit(self) -> VenueSlot {
        match self {
            Strategy::A => VenueSlot::Second,
            Strategy::B => VenueSlot::First,
        }
    }

    pub fn describe(self, venues: &VenuePair) -> String {
        format!(
            "{} (Buy {} → Sell {})",
            self,
            venues.get(self.entry()).name,
            venues.get(self.exit()).name
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::A => write!(f, "A"),
            Strategy::B => write!(f, "B"),
        }
    }
}

/// One swap within a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Leg {
    Buy,
    Sell,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Buy => write!(f, "BUY"),
            Leg::Sell => write!(f, "SELL"),
        }
    }
}

/// A value kept per strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPair<T> {
    pub a: T,
    pub b: T,
}

impl<T> StrategyPair<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn get(&self, strategy: Strategy) -> &T {
        match strategy {
            Strategy::A => &self.a,
            Strategy::B => &self.b,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strategy, &T)> {
        [(Strategy::A, &self.a), (Strategy::B, &self.b)].into_iter()
    }
}

/// A value kept per venue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueValues<T> {
    pub first: T,
    pub second: T,
}

impl<T> VenueValues<T> {
    pub fn new(first: T, second: T) -> Self {
        Self { first, second }
    }

    pub fn get(&self, slot: VenueSlot) -> &T {
        match slot {
            VenueSlot::First => &self.first,
            VenueSlot::Second => &self.second,
        }
    }

    pub fn get_mut(&mut self, slot: VenueSlot) -> &mut T {
        match slot {
            VenueSlot::First => &mut self.first,
            VenueSlot::Second => &mut self.second,
        }
    }
}

/// Serde helper: public keys travel as base58 strings.
pub mod pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Pubkey::from_str(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_legs_are_mirrored() {
        assert_eq!(Strategy::A.entry(), VenueSlot::First);
        assert_eq!(Strategy::A.exit(), VenueSlot::Second);
        assert_eq!(Strategy::B.entry(), VenueSlot::Second);
        assert_eq!(Strategy::B.exit(), VenueSlot::First);
    }

    #[test]
    fn test_counterpart_token() {
        let base = TokenDescriptor::new("SKR", Pubkey::new_unique(), 6);
        let quote = TokenDescriptor::new("USDC", Pubkey::new_unique(), 6);
        let pair = AssetPair::new(base.clone(), quote.clone());

        assert_eq!(pair.counterpart(&quote).symbol, "SKR");
        assert_eq!(pair.counterpart(&base).symbol, "USDC");
    }

    #[test]
    fn test_venue_lookup_by_pool() {
        let venues = VenuePair {
            first: VenueDescriptor {
                slot: VenueSlot::First,
                name: "Raydium".to_string(),
                pool_address: Pubkey::new_unique(),
            },
            second: VenueDescriptor {
                slot: VenueSlot::Second,
                name: "Orca".to_string(),
                pool_address: Pubkey::new_unique(),
            },
        };

        let orca_pool = venues.second.pool_address;
        assert_eq!(venues.slot_of(&orca_pool), Some(VenueSlot::Second));
        assert_eq!(venues.slot_of(&Pubkey::new_unique()), None);
        assert_eq!(Strategy::A.describe(&venues), "A (Buy Raydium → Sell Orca)");
    }
}
