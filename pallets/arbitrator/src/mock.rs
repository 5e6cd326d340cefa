#![cfg(test)]

use crate as pallet_arbitrator;
use crate::RulingHandler;

use frame_support::{
	construct_runtime, parameter_types,
	traits::{GenesisBuild, Nothing},
	PalletId,
};
use frame_system as system;
use orml_currencies::BasicCurrencyAdapter;
use orml_traits::parameter_type_with_key;
use pallet_timestamp::{self as timestamp};
pub use primitives::{CurrencyId, DisputeId, Hash, MintStatus, Ruling};
use sp_runtime::{
	generic,
	traits::{BlakeTwo256, IdentityLookup},
	DispatchResult,
};
use std::cell::RefCell;

pub type BlockNumber = u64;
pub type AccountId = u128;
pub type Amount = i128;
pub type Balance = u128;
pub type Moment = u64;
pub type Header = generic::Header<BlockNumber, BlakeTwo256>;

pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const PAYER: AccountId = 3;

pub const INITIAL_BALANCE: Balance = 100_000;

thread_local! {
	static RULINGS: RefCell<Vec<(AccountId, DisputeId, Ruling)>> = RefCell::new(Vec::new());
}

/// Records every callback so tests can assert on the flow.
pub struct RecordRulings;

impl RulingHandler<AccountId> for RecordRulings {
	fn on_ruling(arbitrator: AccountId, dispute_id: DisputeId, ruling: Ruling) -> DispatchResult {
		RULINGS.with(|rulings| rulings.borrow_mut().push((arbitrator, dispute_id, ruling)));
		Ok(())
	}
}

pub fn recorded_rulings() -> Vec<(AccountId, DisputeId, Ruling)> {
	RULINGS.with(|rulings| rulings.borrow().clone())
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
	pub const MinArbitrationFeeTimeout: Moment = 86_400_000;
}

impl pallet_platforms::Config for Runtime {
	type Event = Event;
	type MinArbitrationFeeTimeout = MinArbitrationFeeTimeout;
}

parameter_types! {
	pub const ArbitratorPalletId: PalletId = PalletId(*b"ocp/arbi");
}

impl pallet_arbitrator::Config for Runtime {
	type Event = Event;
	type Currency = Currencies;
	type Platforms = Platforms;
	type RulingHandler = RecordRulings;
	type PalletId = ArbitratorPalletId;
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
		Arbitrator: pallet_arbitrator::{Pallet, Call, Storage, Event<T>},
	}
);

pub struct ExtBuilder;

impl Default for ExtBuilder {
	fn default() -> Self {
		Self
	}
}

impl ExtBuilder {
	pub fn build(self) -> sp_io::TestExternalities {
		RULINGS.with(|rulings| rulings.borrow_mut().clear());

		let mut t = system::GenesisConfig::default().build_storage::<Runtime>().unwrap();

		pallet_balances::GenesisConfig::<Runtime> {
			balances: vec![
				(ALICE, INITIAL_BALANCE),
				(BOB, INITIAL_BALANCE),
				(PAYER, INITIAL_BALANCE),
			],
		}
		.assimilate_storage(&mut t)
		.unwrap();

		t.into()
	}
}

pub fn last_event() -> Event {
	system::Pallet::<Runtime>::events().pop().expect("Event expected").event
}
