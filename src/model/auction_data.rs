//! Packed decay-curve blob attached to each order
//!
//! Layout is `abi.encodePacked(address, uint256, uint256, uint256)`:
//! the decay contract address followed by the packed start/end timestamps,
//! the start price and the end price.

use crate::error::DecayError;

use alloy_primitives::{Address, U256};

const ADDRESS_LEN: usize = 20;
const WORD_LEN: usize = 32;

/// Encoded length of a well-formed blob in bytes
pub const AUCTION_DATA_LEN: usize = ADDRESS_LEN + 3 * WORD_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionData {
    pub decay_contract: Address,
    pub start_end_ts: U256,
    pub start_price: U256,
    pub end_price: U256,
}

impl AuctionData {
    /// Decode a `0x`-prefixed hex blob
    pub fn decode(blob: &str) -> Result<Self, DecayError> {
        let malformed = || DecayError::Malformed {
            field: "auctionData",
            value: blob.to_string(),
        };

        let raw = blob.strip_prefix("0x").unwrap_or(blob);
        let bytes = hex::decode(raw).map_err(|_| malformed())?;
        if bytes.len() != AUCTION_DATA_LEN {
            return Err(malformed());
        }

        let (address, words) = bytes.split_at(ADDRESS_LEN);
        let word = |i: usize| U256::from_be_slice(&words[i * WORD_LEN..(i + 1) * WORD_LEN]);

        Ok(Self {
            decay_contract: Address::from_slice(address),
            start_end_ts: word(0),
            start_price: word(1),
            end_price: word(2),
        })
    }

    /// The calldata suffix handed to the decay contract (everything after the address)
    pub fn extra_data(&self) -> String {
        let mut out = Vec::with_capacity(3 * WORD_LEN);
        out.extend_from_slice(&self.start_end_ts.to_be_bytes::<32>());
        out.extend_from_slice(&self.start_price.to_be_bytes::<32>());
        out.extend_from_slice(&self.end_price.to_be_bytes::<32>());
        format!("0x{}", hex::encode(out))
    }
}
