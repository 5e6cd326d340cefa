#![cfg_attr(not(feature = "std"), no_std)]

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_runtime::{
	traits::{IdentifyAccount, Verify},
	MultiSignature, RuntimeDebug,
};
use sp_std::prelude::*;
#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

pub type Amount = i128;

/// An index to a block.
pub type BlockNumber = u32;

pub type Moment = u64;

/// Alias to 512-bit hash when used in the context of a transaction signature on the chain.
pub type Signature = MultiSignature;

/// Some way of identifying an account on the chain. We intentionally make it equivalent
/// to the public key of our transaction signing scheme.
pub type AccountId = <<Signature as Verify>::Signer as IdentifyAccount>::AccountId;

/// Balance of an account.
pub type Balance = u128;

/// Index of a transaction in the chain.
pub type Index = u32;

/// A hash of some data used by the chain.
pub type Hash = sp_core::H256;

/// Monotonic arena-style identifiers. All registries start counting at 1;
/// `PROTOCOL_INDEX` is the one reserved platform id below that.
pub type IdentityId = u64;
pub type PlatformId = u64;
pub type CourseId = u64;
pub type TransactionId = u64;
pub type DisputeId = u64;

/// Fixed-length time buckets counted from the escrow's epoch beginning.
pub type EpochIndex = u64;

/// Denominator for all basis-point fee rates.
pub const FEE_DIVIDER: u16 = 10_000;

/// The synthetic platform owned by the protocol treasury.
pub const PROTOCOL_INDEX: PlatformId = 0;

/// Protocol fee charged on every purchase unless reconfigured.
pub const DEFAULT_PROTOCOL_FEE_BPS: u16 = 100;

pub const MAX_HANDLE_LEN: usize = 31;

#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, PartialOrd, TypeInfo, Ord, MaxEncodedLen)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum CurrencyId<H> {
	Native,
	Registered(H),
}

/// Outcome of an arbitrated dispute.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo, MaxEncodedLen)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum Ruling {
	NoWinner,
	SenderWins,
	ReceiverWins,
}

impl Ruling {
	pub fn from_choice(choice: u32) -> Option<Ruling> {
		match choice {
			0 => Some(Ruling::NoWinner),
			1 => Some(Ruling::SenderWins),
			2 => Some(Ruling::ReceiverWins),
			_ => None,
		}
	}
}

#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo, MaxEncodedLen)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum MintStatus {
	Paused,
	WhitelistOnly,
	Public,
}

impl Default for MintStatus {
	fn default() -> Self {
		MintStatus::Paused
	}
}

/// Handles are 1..=31 bytes, start with a lowercase alphanumeric and continue
/// with lowercase alphanumerics, `_` or `-`.
pub fn is_valid_handle(handle: &[u8]) -> bool {
	if handle.is_empty() || handle.len() > MAX_HANDLE_LEN {
		return false
	}

	handle.iter().enumerate().all(|(i, c)| match c {
		b'a'..=b'z' | b'0'..=b'9' => true,
		b'_' | b'-' => i > 0,
		_ => false,
	})
}
