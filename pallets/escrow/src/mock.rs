#![cfg(test)]

use crate as pallet_escrow;

use frame_support::{
	construct_runtime, parameter_types,
	traits::{GenesisBuild, Nothing},
	PalletId,
};
use frame_system as system;
use orml_currencies::BasicCurrencyAdapter;
use orml_traits::parameter_type_with_key;
use pallet_timestamp::{self as timestamp};
pub use primitives::{CurrencyId, Hash, MintStatus};
use sp_runtime::{
	generic,
	traits::{BlakeTwo256, IdentityLookup},
};

pub type BlockNumber = u64;
pub type AccountId = u128;
pub type Amount = i128;
pub type Balance = u128;
pub type Moment = u64;
pub type Header = generic::Header<BlockNumber, BlakeTwo256>;

/// Buyer (sender side of every escrowed purchase).
pub const ALICE: AccountId = 1;
/// Course owner (receiver side).
pub const BOB: AccountId = 2;
/// Second buyer, also used as a delegate.
pub const CHARLIE: AccountId = 3;
/// Owner of the origin platform (id 1).
pub const DAVE: AccountId = 4;
/// Owner of the buy platform (id 2).
pub const EVE: AccountId = 5;
pub const TREASURY: AccountId = 6;

pub const INITIAL_BALANCE: Balance = 1_000_000_000_000_000_000;
pub const EPOCH_DURATION: Moment = 1_000;
pub const MIN_DISPUTE_PERIOD: Moment = 1_000;
pub const MAX_DISPUTE_PERIOD: Moment = 10_000_000;
pub const MIN_ARBITRATION_FEE_TIMEOUT: Moment = 500;

pub fn token() -> CurrencyId<Hash> {
	CurrencyId::Registered(Hash::repeat_byte(7))
}

parameter_types! {
	pub const BlockHashCount: u64 = 250;
	pub const SS58Prefix: u8 = 42;
}

impl frame_system::Config for Runtime {
	type BaseCallFilter = frame_support::traits::Everything;
	type BlockWeights = ();
	type BlockLength = ();
	type DbWeight = ();
	type Origin = Origin;
	type Call = Call;
	type Index = u64;
	type BlockNumber = BlockNumber;
	type Hash = Hash;
	type Hashing = BlakeTwo256;
	type AccountId = AccountId;
	type Lookup = IdentityLookup<Self::AccountId>;
	type Header = Header;
	type Event = Event;
	type BlockHashCount = BlockHashCount;
	type Version = ();
	type PalletInfo = PalletInfo;
	type AccountData = pallet_balances::AccountData<Balance>;
	type OnNewAccount = ();
	type OnKilledAccount = ();
	type SystemWeightInfo = ();
	type SS58Prefix = SS58Prefix;
	type OnSetCode = ();
	type MaxConsumers = frame_support::traits::ConstU32<16>;
}

parameter_types! {
	pub const ExistentialDeposit: u128 = 1;
	pub const MaxLocks: u32 = 50;
}

impl pallet_balances::Config for Runtime {
	type MaxLocks = MaxLocks;
	type MaxReserves = ();
	type ReserveIdentifier = [u8; 8];
	type Balance = Balance;
	type Event = Event;
	type DustRemoval = ();
	type ExistentialDeposit = ExistentialDeposit;
	type AccountStore = frame_system::Pallet<Runtime>;
	type WeightInfo = pallet_balances::weights::SubstrateWeight<Runtime>;
}

parameter_types! {
	pub const MinimumPeriod: Moment = 1000;
}

impl timestamp::Config for Runtime {
	type Moment = u64;
	type OnTimestampSet = ();
	type MinimumPeriod = MinimumPeriod;
	type WeightInfo = ();
}

parameter_type_with_key! {
	pub ExistentialDeposits: |_currency_id: CurrencyId<Hash>| -> Balance {
		Default::default()
	};
}

impl orml_tokens::Config for Runtime {
	type Event = Event;
	type Balance = Balance;
	type Amount = Amount;
	type CurrencyId = CurrencyId<Hash>;
	type WeightInfo = ();
	type ExistentialDeposits = ExistentialDeposits;
	type OnDust = ();
	type MaxLocks = MaxLocks;
	type DustRemovalWhitelist = Nothing;
}

parameter_types! {
	pub const GetNativeCurrencyId: CurrencyId<Hash> = CurrencyId::<Hash>::Native;
}

impl orml_currencies::Config for Runtime {
	type Event = Event;
	type MultiCurrency = Tokens;
	type NativeCurrency = BasicCurrencyAdapter<Runtime, Balances, Amount, BlockNumber>;
	type GetNativeCurrencyId = GetNativeCurrencyId;
	type WeightInfo = ();
}

parameter_types! {
	pub const MinArbitrationFeeTimeout: Moment = MIN_ARBITRATION_FEE_TIMEOUT;
}

impl pallet_platforms::Config for Runtime {
	type Event = Event;
	type MinArbitrationFeeTimeout = MinArbitrationFeeTimeout;
}

parameter_types! {
	pub const IdentitiesPalletId: PalletId = PalletId(*b"ocp/idnt");
}

impl pallet_identities::Config for Runtime {
	type Event = Event;
	type Currency = Currencies;
	type Platforms = Platforms;
	type PalletId = IdentitiesPalletId;
}

parameter_types! {
	pub const MinDisputePeriod: Moment = MIN_DISPUTE_PERIOD;
	pub const MaxDisputePeriod: Moment = MAX_DISPUTE_PERIOD;
}

impl pallet_courses::Config for Runtime {
	type Event = Event;
	type Currency = Currencies;
	type Identities = Identities;
	type Platforms = Platforms;
	type MinDisputePeriod = MinDisputePeriod;
	type MaxDisputePeriod = MaxDisputePeriod;
}

parameter_types! {
	pub const ArbitratorPalletId: PalletId = PalletId(*b"ocp/arbi");
}

impl pallet_arbitrator::Config for Runtime {
	type Event = Event;
	type Currency = Currencies;
	type Platforms = Platforms;
	type RulingHandler = Escrow;
	type PalletId = ArbitratorPalletId;
}

parameter_types! {
	pub const EscrowPalletId: PalletId = PalletId(*b"ocp/escr");
	pub const EpochDuration: Moment = EPOCH_DURATION;
}

impl pallet_escrow::Config for Runtime {
	type Event = Event;
	type Currency = Currencies;
	type Identities = Identities;
	type Platforms = Platforms;
	type Courses = Courses;
	type Arbitration = Arbitrator;
	type PalletId = EscrowPalletId;
	type EpochDuration = EpochDuration;
}

type UncheckedExtrinsic = frame_system::mocking::MockUncheckedExtrinsic<Runtime>;
type Block = frame_system::mocking::MockBlock<Runtime>;

construct_runtime!(
	pub enum Runtime where
		Block = Block,
		NodeBlock = Block,
		UncheckedExtrinsic = UncheckedExtrinsic,
	{
		System: frame_system::{Pallet, Call, Config, Storage, Event<T>},
		Timestamp: timestamp::{Pallet, Call, Storage, Inherent},
		Balances: pallet_balances::{Pallet, Call, Storage, Config<T>, Event<T>},
		Tokens: orml_tokens::{Pallet, Storage, Event<T>, Config<T>},
		Currencies: orml_currencies::{Pallet, Call, Event<T>},
		Platforms: pallet_platforms::{Pallet, Call, Storage, Event<T>},
		Identities: pallet_identities::{Pallet, Call, Storage, Config<T>, Event<T>},
		Courses: pallet_courses::{Pallet, Call, Storage, Event<T>},
		Arbitrator: pallet_arbitrator::{Pallet, Call, Storage, Event<T>},
		Escrow: pallet_escrow::{Pallet, Call, Storage, Config<T>, Event<T>},
	}
);

pub struct ExtBuilder {
	balances: Vec<(AccountId, CurrencyId<Hash>, Balance)>,
}

impl Default for ExtBuilder {
	fn default() -> Self {
		Self {
			balances: vec![
				(ALICE, token(), INITIAL_BALANCE),
				(CHARLIE, token(), INITIAL_BALANCE),
			],
		}
	}
}

impl ExtBuilder {
	pub fn build(self) -> sp_io::TestExternalities {
		let mut t = system::GenesisConfig::default().build_storage::<Runtime>().unwrap();

		pallet_balances::GenesisConfig::<Runtime> {
			balances: vec![
				(ALICE, INITIAL_BALANCE),
				(BOB, INITIAL_BALANCE),
				(CHARLIE, INITIAL_BALANCE),
				(DAVE, INITIAL_BALANCE),
				(EVE, INITIAL_BALANCE),
				(TREASURY, INITIAL_BALANCE),
			],
		}
		.assimilate_storage(&mut t)
		.unwrap();

		orml_tokens::GenesisConfig::<Runtime> { balances: self.balances }
			.assimilate_storage(&mut t)
			.unwrap();

		pallet_identities::GenesisConfig::<Runtime> {
			mint_status: MintStatus::Public,
			mint_fee: 0,
			short_handle_max_price: 0,
		}
		.assimilate_storage(&mut t)
		.unwrap();

		pallet_escrow::GenesisConfig::<Runtime> {
			protocol_fee_bps: 100,
			protocol_treasury: Some(TREASURY),
			epoch_beginning: 0,
		}
		.assimilate_storage(&mut t)
		.unwrap();

		t.into()
	}
}

pub fn last_event() -> Event {
	system::Pallet::<Runtime>::events().pop().expect("Event expected").event
}
