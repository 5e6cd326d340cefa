//! # Escrow Ledger & Dispute Engine
//!
//! Purchases are paid into the pallet's custody account up front: the course
//! price plus the origin-platform, buy-platform, and protocol fees. The price
//! and every fee share are bucketed by *releasable epoch* — the first
//! fixed-length time bucket after the course's dispute period has run out —
//! so the course owner can settle a whole backlog with one call and platform
//! fees mature on the same clock.
//!
//! ## Usage
//!
//! - `create_transaction` - Buy a course: funds move into custody, fee rates
//!   and the origin platform's arbitration settings are snapshotted, and the
//!   access token is minted through the catalog.
//! - `release` - Settle a single matured transaction to the course owner.
//! - `release_all` - Settle every matured epoch bucket of a course at once.
//! - `claim` - Pay out a platform's matured fee balance to its owner (or the
//!   protocol treasury for the reserved index).
//! - `pay_arbitration_fee_by_sender` / `pay_arbitration_fee_by_receiver` -
//!   Deposit arbitration fees; the dispute is created the moment both
//!   deposits cover the arbitrator's current price.
//! - `arbitration_fee_timeout` - Default judgment when the counterparty
//!   never deposits within the platform's fee timeout.
//! - `submit_evidence` / `appeal` - Forwarded to the arbitrator while a
//!   dispute is open.
//!
//! Rulings come back through [`RulingHandler`]: the escrow only accepts them
//! from the arbitrator account snapshotted into the disputed transaction.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
mod mock;


#[frame_support::pallet]
pub mod pallet {
	use frame_support::{
		dispatch::DispatchResult, pallet_prelude::*, sp_std::vec::Vec, traits::GenesisBuild,
		transactional, PalletId,
	};
	use frame_system::pallet_prelude::*;
	use orml_traits::MultiCurrency;
	use pallet_arbitrator::{Arbitration, RulingHandler};
	use pallet_courses::CourseCatalog;
	use pallet_identities::IdentityRegistry;
	use pallet_platforms::PlatformRegistry;
	use pallet_timestamp::{self as timestamp};
	use primitives::{
		CourseId, CurrencyId, DisputeId, EpochIndex, IdentityId, PlatformId, Ruling,
		TransactionId, FEE_DIVIDER, PROTOCOL_INDEX,
	};
	use scale_info::TypeInfo;
	use sp_runtime::{
		traits::{AccountIdConversion, CheckedAdd, CheckedMul, Saturating, Zero},
		SaturatedConversion,
	};

	#[cfg(feature = "std")]
	use serde::{Deserialize, Serialize};

	/// Number of choices every escrow dispute offers the arbitrator.
	const RULING_CHOICES: u32 = 2;

	#[pallet::config]
	pub trait Config: frame_system::Config + timestamp::Config {
		type Event: From<Event<Self>> + IsType<<Self as frame_system::Config>::Event>;
		type Currency: MultiCurrency<Self::AccountId, CurrencyId = CurrencyId<Self::Hash>>;
		type Identities: IdentityRegistry<Self::AccountId>;
		type Platforms: PlatformRegistry<Self::AccountId, Self::Moment>;
		type Courses: CourseCatalog<Self::AccountId, BalanceOf<Self>, Self::Hash, Self::Moment>;
		type Arbitration: Arbitration<Self::AccountId, BalanceOf<Self>>;
		/// Custody account for escrowed funds and fee deposits.
		type PalletId: Get<PalletId>;
		/// Length of one release epoch.
		#[pallet::constant]
		type EpochDuration: Get<MomentOf<Self>>;
	}

	type AccountOf<T> = <T as frame_system::Config>::AccountId;
	pub type BalanceOf<T> =
		<<T as Config>::Currency as MultiCurrency<<T as frame_system::Config>::AccountId>>::Balance;
	type MomentOf<T> = <T as pallet_timestamp::Config>::Moment;
	type CurrencyOf<T> = CurrencyId<<T as frame_system::Config>::Hash>;

	#[derive(Clone, Copy, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
	pub enum TransactionStatus {
		NoDispute,
		WaitingSender,
		WaitingReceiver,
		DisputeCreated,
		Resolved,
	}

	#[derive(Clone, Copy, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
	pub enum PaymentKind {
		Release,
		Reimburse,
	}

	#[derive(Clone, Copy, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
	pub enum Party {
		Sender,
		Receiver,
	}

	#[derive(Clone, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[scale_info(skip_type_params(T))]
	pub struct Transaction<T: Config> {
		pub id: TransactionId,
		pub sender: AccountOf<T>,
		pub receiver: AccountOf<T>,
		pub sender_id: IdentityId,
		pub receiver_id: IdentityId,
		pub course_id: CourseId,
		pub buy_platform_id: PlatformId,
		pub origin_platform_id: PlatformId,
		pub token: CurrencyOf<T>,
		pub amount: BalanceOf<T>,
		pub protocol_fee_bps: u16,
		pub origin_fee_bps: u16,
		pub buy_fee_bps: u16,
		pub created_at: MomentOf<T>,
		pub last_interaction: MomentOf<T>,
		pub releasable_at: MomentOf<T>,
		pub sender_fee: BalanceOf<T>,
		pub receiver_fee: BalanceOf<T>,
		pub status: TransactionStatus,
		pub arbitrator: Option<AccountOf<T>>,
		pub arbitrator_extra: Vec<u8>,
		pub dispute_id: Option<DisputeId>,
	}

	#[pallet::pallet]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::storage]
	#[pallet::getter(fn transactions)]
	pub(super) type Transactions<T: Config> =
		StorageMap<_, Twox64Concat, TransactionId, Transaction<T>>;

	#[pallet::storage]
	pub(super) type LatestTransactionId<T: Config> = StorageValue<_, TransactionId, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn releasable_balance_by_epoch)]
	pub(super) type ReleasableBalanceByEpoch<T: Config> = StorageDoubleMap<
		_,
		Twox64Concat,
		CourseId,
		Twox64Concat,
		EpochIndex,
		BalanceOf<T>,
		ValueQuery,
	>;

	#[pallet::storage]
	#[pallet::getter(fn last_released_epoch)]
	pub(super) type LastReleasedEpoch<T: Config> =
		StorageMap<_, Twox64Concat, CourseId, EpochIndex, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn platform_epoch_balance)]
	pub(super) type PlatformEpochBalances<T: Config> = StorageDoubleMap<
		_,
		Twox64Concat,
		(PlatformId, CurrencyOf<T>),
		Twox64Concat,
		EpochIndex,
		BalanceOf<T>,
		ValueQuery,
	>;

	#[pallet::storage]
	#[pallet::getter(fn last_platform_released_epoch)]
	pub(super) type LastPlatformReleasedEpoch<T: Config> =
		StorageMap<_, Twox64Concat, (PlatformId, CurrencyOf<T>), EpochIndex, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn platform_balance)]
	pub(super) type PlatformBalances<T: Config> =
		StorageMap<_, Twox64Concat, (PlatformId, CurrencyOf<T>), BalanceOf<T>, ValueQuery>;

	#[pallet::storage]
	pub(super) type DisputeToTransaction<T: Config> =
		StorageMap<_, Twox64Concat, DisputeId, TransactionId>;

	#[pallet::storage]
	#[pallet::getter(fn protocol_fee_bps)]
	pub(super) type ProtocolFeeBps<T: Config> = StorageValue<_, u16, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn protocol_treasury)]
	pub(super) type ProtocolTreasury<T: Config> = StorageValue<_, AccountOf<T>, OptionQuery>;

	#[pallet::storage]
	#[pallet::getter(fn epoch_beginning)]
	pub(super) type EpochBeginning<T: Config> = StorageValue<_, MomentOf<T>, ValueQuery>;

	#[pallet::genesis_config]
	pub struct GenesisConfig<T: Config> {
		pub protocol_fee_bps: u16,
		pub protocol_treasury: Option<AccountOf<T>>,
		pub epoch_beginning: MomentOf<T>,
	}

	#[cfg(feature = "std")]
	impl<T: Config> Default for GenesisConfig<T> {
		fn default() -> Self {
			Self {
				protocol_fee_bps: primitives::DEFAULT_PROTOCOL_FEE_BPS,
				protocol_treasury: None,
				epoch_beginning: Zero::zero(),
			}
		}
	}

	#[pallet::genesis_build]
	impl<T: Config> GenesisBuild<T> for GenesisConfig<T> {
		fn build(&self) {
			<ProtocolFeeBps<T>>::put(self.protocol_fee_bps);
			if let Some(treasury) = &self.protocol_treasury {
				<ProtocolTreasury<T>>::put(treasury);
			}
			<EpochBeginning<T>>::put(self.epoch_beginning);
		}
	}

	#[pallet::event]
	#[pallet::generate_deposit(pub(super) fn deposit_event)]
	pub enum Event<T: Config> {
		TransactionCreated {
			tx_id: TransactionId,
			sender_id: IdentityId,
			receiver_id: IdentityId,
			course_id: CourseId,
			buy_platform_id: PlatformId,
			token: CurrencyOf<T>,
			amount: BalanceOf<T>,
			protocol_fee_bps: u16,
			origin_fee_bps: u16,
			buy_fee_bps: u16,
		},
		MetaEvidence {
			tx_id: TransactionId,
			cid: Vec<u8>,
		},
		Evidence {
			arbitrator: AccountOf<T>,
			tx_id: TransactionId,
			submitter: AccountOf<T>,
			cid: Vec<u8>,
		},
		Dispute {
			arbitrator: AccountOf<T>,
			tx_id: TransactionId,
			meta_evidence_id: TransactionId,
			evidence_group_id: TransactionId,
		},
		Payment {
			tx_id: TransactionId,
			kind: PaymentKind,
			amount: BalanceOf<T>,
		},
		EpochReleased {
			course_id: CourseId,
			epoch: EpochIndex,
			amount: BalanceOf<T>,
		},
		PlatformFeesClaimed {
			platform_id: PlatformId,
			token: CurrencyOf<T>,
			amount: BalanceOf<T>,
		},
		ArbitrationFeeDeposited {
			tx_id: TransactionId,
			party: Party,
			amount: BalanceOf<T>,
		},
		ProtocolFeeUpdated {
			fee_bps: u16,
		},
		ProtocolTreasuryUpdated {
			treasury: AccountOf<T>,
		},
	}

	#[pallet::error]
	pub enum Error<T> {
		Unauthorized,
		NotOwnerOrDelegate,
		TransactionNotFound,
		NonMatchingFunds,
		AlreadyReleased,
		NoBalanceToRelease,
		TransactionInDispute,
		DisputePeriodNotElapsed,
		DisputePeriodElapsed,
		ArbitratorNotSet,
		DisputeAlreadyCreated,
		SenderFeeMismatch,
		ReceiverFeeMismatch,
		SenderHasNotPaid,
		TimeoutNotElapsed,
		NoFeePaymentPending,
		DisputeNotFound,
		DisputeNotCreated,
		DisputeAlreadySolved,
		CallerNotArbitrator,
		InvalidCid,
		EvidenceOnResolved,
		AppealCostExceeded,
		NoTreasury,
		FeeTooHigh,
		Overflow,
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		#[pallet::weight(1_000)]
		#[transactional]
		pub fn create_transaction(
			origin: OriginFor<T>,
			buyer_id: IdentityId,
			course_id: CourseId,
			buy_platform_id: PlatformId,
			meta_evidence_cid: Vec<u8>,
			value: BalanceOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_create_transaction(
				who,
				buyer_id,
				course_id,
				buy_platform_id,
				meta_evidence_cid,
				value,
			)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn release(
			origin: OriginFor<T>,
			caller_id: IdentityId,
			tx_id: TransactionId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_release(who, caller_id, tx_id)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn release_all(
			origin: OriginFor<T>,
			caller_id: IdentityId,
			course_id: CourseId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_release_all(who, caller_id, course_id)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn claim(
			origin: OriginFor<T>,
			platform_id: PlatformId,
			token: CurrencyOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_claim(who, platform_id, token)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn pay_arbitration_fee_by_sender(
			origin: OriginFor<T>,
			tx_id: TransactionId,
			value: BalanceOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_pay_arbitration_fee(who, tx_id, value, Party::Sender)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn pay_arbitration_fee_by_receiver(
			origin: OriginFor<T>,
			tx_id: TransactionId,
			value: BalanceOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_pay_arbitration_fee(who, tx_id, value, Party::Receiver)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn arbitration_fee_timeout(
			origin: OriginFor<T>,
			tx_id: TransactionId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_arbitration_fee_timeout(who, tx_id)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn submit_evidence(
			origin: OriginFor<T>,
			party_id: IdentityId,
			tx_id: TransactionId,
			cid: Vec<u8>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_submit_evidence(who, party_id, tx_id, cid)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn appeal(
			origin: OriginFor<T>,
			tx_id: TransactionId,
			value: BalanceOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_appeal(who, tx_id, value)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn set_protocol_fee(origin: OriginFor<T>, fee_bps: u16) -> DispatchResult {
			ensure_root(origin)?;
			ensure!(fee_bps <= FEE_DIVIDER, <Error<T>>::FeeTooHigh);
			<ProtocolFeeBps<T>>::put(fee_bps);
			Self::deposit_event(Event::ProtocolFeeUpdated { fee_bps });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn set_protocol_treasury(
			origin: OriginFor<T>,
			treasury: AccountOf<T>,
		) -> DispatchResult {
			ensure_root(origin)?;
			<ProtocolTreasury<T>>::put(&treasury);
			Self::deposit_event(Event::ProtocolTreasuryUpdated { treasury });
			Ok(())
		}
	}

	impl<T: Config> Pallet<T> {
		pub fn account_id() -> AccountOf<T> {
			T::PalletId::get().into_account()
		}

		fn now() -> MomentOf<T> {
			<timestamp::Pallet<T>>::get()
		}

		pub fn current_epoch() -> EpochIndex {
			Self::epoch_at(Self::now())
		}

		fn epoch_at(moment: MomentOf<T>) -> EpochIndex {
			let elapsed = moment.saturating_sub(<EpochBeginning<T>>::get());
			(elapsed / T::EpochDuration::get()).saturated_into::<EpochIndex>()
		}

		/// First epoch in which a transaction maturing at `releasable_at`
		/// becomes claimable.
		pub fn releasable_epoch_at(releasable_at: MomentOf<T>) -> EpochIndex {
			Self::epoch_at(releasable_at).saturating_add(1)
		}

		/// Matured, not-yet-released balance of a course.
		pub fn releasable_balance(course_id: CourseId) -> BalanceOf<T> {
			let current = Self::current_epoch();
			let last = Self::last_released_epoch(course_id);
			<ReleasableBalanceByEpoch<T>>::iter_prefix(course_id)
				.filter(|(epoch, _)| *epoch > last && *epoch <= current)
				.fold(Zero::zero(), |acc: BalanceOf<T>, (_, value)| acc.saturating_add(value))
		}

		/// Authorized view of a transaction: its parties and its arbitrator.
		pub fn transaction_for(
			who: &AccountOf<T>,
			tx_id: TransactionId,
		) -> Result<Transaction<T>, DispatchError> {
			let tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;
			let authorized =
				tx.sender == *who || tx.receiver == *who || tx.arbitrator.as_ref() == Some(who);
			ensure!(authorized, <Error<T>>::Unauthorized);
			Ok(tx)
		}

		fn fee_share(amount: BalanceOf<T>, fee_bps: u16) -> Result<BalanceOf<T>, DispatchError> {
			let numerator = amount
				.checked_mul(&BalanceOf::<T>::from(fee_bps as u32))
				.ok_or(<Error<T>>::Overflow)?;
			Ok(numerator / BalanceOf::<T>::from(FEE_DIVIDER as u32))
		}

		/// Amount plus the combined fee term, the exact sum the buyer owes.
		fn total_due(
			amount: BalanceOf<T>,
			origin_fee_bps: u16,
			buy_fee_bps: u16,
			protocol_fee_bps: u16,
		) -> Result<BalanceOf<T>, DispatchError> {
			let total_bps = origin_fee_bps as u32 + buy_fee_bps as u32 + protocol_fee_bps as u32;
			let fees = amount
				.checked_mul(&BalanceOf::<T>::from(total_bps))
				.ok_or(<Error<T>>::Overflow)? /
				BalanceOf::<T>::from(FEE_DIVIDER as u32);
			amount.checked_add(&fees).ok_or_else(|| <Error<T>>::Overflow.into())
		}

		fn transaction_total_due(tx: &Transaction<T>) -> Result<BalanceOf<T>, DispatchError> {
			Self::total_due(tx.amount, tx.origin_fee_bps, tx.buy_fee_bps, tx.protocol_fee_bps)
		}

		fn platform_fees(tx: &Transaction<T>) -> [(PlatformId, u16); 3] {
			[
				(tx.origin_platform_id, tx.origin_fee_bps),
				(tx.buy_platform_id, tx.buy_fee_bps),
				(PROTOCOL_INDEX, tx.protocol_fee_bps),
			]
		}

		/// Fill the course and platform epoch buckets for a new transaction.
		fn credit_epoch_buckets(tx: &Transaction<T>) -> DispatchResult {
			let epoch = Self::releasable_epoch_at(tx.releasable_at);

			<ReleasableBalanceByEpoch<T>>::mutate(tx.course_id, epoch, |balance| {
				*balance = balance.saturating_add(tx.amount)
			});

			for (platform_id, fee_bps) in Self::platform_fees(tx) {
				let share = Self::fee_share(tx.amount, fee_bps)?;
				<PlatformEpochBalances<T>>::mutate((platform_id, tx.token), epoch, |balance| {
					*balance = balance.saturating_add(share)
				});
			}

			Ok(())
		}

		/// Claw a contested transaction's amount and fee shares back out of
		/// their epoch buckets when its dispute opens. Opening is bounded by
		/// the dispute period, so nothing of this transaction can have been
		/// swept yet; the cursor checks and saturating arithmetic keep a
		/// drained bucket from going negative regardless.
		fn clear_epoch_buckets(tx: &Transaction<T>) -> DispatchResult {
			let epoch = Self::releasable_epoch_at(tx.releasable_at);

			if epoch > Self::last_released_epoch(tx.course_id) {
				<ReleasableBalanceByEpoch<T>>::mutate(tx.course_id, epoch, |balance| {
					*balance = balance.saturating_sub(tx.amount)
				});
			}

			for (platform_id, fee_bps) in Self::platform_fees(tx) {
				let share = Self::fee_share(tx.amount, fee_bps)?;
				if epoch > Self::last_platform_released_epoch((platform_id, tx.token)) {
					<PlatformEpochBalances<T>>::mutate((platform_id, tx.token), epoch, |balance| {
						*balance = balance.saturating_sub(share)
					});
				}
			}

			Ok(())
		}

		/// Settle a released transaction's buckets: the amount leaves the
		/// course bucket and each fee share moves to its platform's mature
		/// ledger. A share whose epoch the platform has already claimed was
		/// paid out by that claim and is left alone.
		fn settle_released_buckets(tx: &Transaction<T>) -> DispatchResult {
			let epoch = Self::releasable_epoch_at(tx.releasable_at);

			<ReleasableBalanceByEpoch<T>>::mutate(tx.course_id, epoch, |balance| {
				*balance = balance.saturating_sub(tx.amount)
			});

			for (platform_id, fee_bps) in Self::platform_fees(tx) {
				let share = Self::fee_share(tx.amount, fee_bps)?;
				if !share.is_zero() &&
					epoch > Self::last_platform_released_epoch((platform_id, tx.token))
				{
					<PlatformEpochBalances<T>>::mutate((platform_id, tx.token), epoch, |balance| {
						*balance = balance.saturating_sub(share)
					});
					<PlatformBalances<T>>::mutate((platform_id, tx.token), |balance| {
						*balance = balance.saturating_add(share)
					});
				}
			}

			Ok(())
		}

		/// Credit each platform's mature ledger with its fee share of `base`.
		/// Used when settling a dispute, whose shares were pulled back from
		/// the epoch buckets when it opened.
		fn credit_mature_fees(tx: &Transaction<T>, base: BalanceOf<T>) -> DispatchResult {
			for (platform_id, fee_bps) in Self::platform_fees(tx) {
				let share = Self::fee_share(base, fee_bps)?;
				if !share.is_zero() {
					<PlatformBalances<T>>::mutate((platform_id, tx.token), |balance| {
						*balance = balance.saturating_add(share)
					});
				}
			}
			Ok(())
		}

		fn pay_out(
			token: CurrencyOf<T>,
			to: &AccountOf<T>,
			amount: BalanceOf<T>,
		) -> DispatchResult {
			if amount.is_zero() {
				return Ok(())
			}
			T::Currency::transfer(token, &Self::account_id(), to, amount)
		}

		fn do_create_transaction(
			who: AccountOf<T>,
			buyer_id: IdentityId,
			course_id: CourseId,
			buy_platform_id: PlatformId,
			meta_evidence_cid: Vec<u8>,
			value: BalanceOf<T>,
		) -> DispatchResult {
			ensure!(
				T::Identities::is_owner_or_delegate(buyer_id, &who),
				<Error<T>>::NotOwnerOrDelegate
			);

			let (owner_id, origin_platform_id, price, token, dispute_period) =
				T::Courses::course(course_id)?;

			let protocol_fee_bps = Self::protocol_fee_bps();
			let origin_fee_bps = T::Platforms::origin_fee_bps(origin_platform_id)?;
			let buy_fee_bps = T::Platforms::buy_fee_bps(buy_platform_id)?;

			let total_due = Self::total_due(price, origin_fee_bps, buy_fee_bps, protocol_fee_bps)?;

			// Native purchases must attach the exact total; registered tokens
			// are pulled from the buyer instead and attach nothing.
			match token {
				CurrencyId::Native => ensure!(value == total_due, <Error<T>>::NonMatchingFunds),
				CurrencyId::Registered(_) =>
					ensure!(value.is_zero(), <Error<T>>::NonMatchingFunds),
			}

			let sender = T::Identities::owner_of(buyer_id)?;
			let receiver = T::Identities::owner_of(owner_id)?;

			T::Currency::transfer(token, &sender, &Self::account_id(), total_due)?;

			let id =
				<LatestTransactionId<T>>::get().checked_add(1).ok_or(<Error<T>>::Overflow)?;
			let now = Self::now();
			let (arbitrator, arbitrator_extra, _) =
				T::Platforms::arbitration_setting(origin_platform_id)?;

			let tx = Transaction::<T> {
				id,
				sender,
				receiver,
				sender_id: buyer_id,
				receiver_id: owner_id,
				course_id,
				buy_platform_id,
				origin_platform_id,
				token,
				amount: price,
				protocol_fee_bps,
				origin_fee_bps,
				buy_fee_bps,
				created_at: now,
				last_interaction: now,
				releasable_at: now + dispute_period,
				sender_fee: Zero::zero(),
				receiver_fee: Zero::zero(),
				status: TransactionStatus::NoDispute,
				arbitrator,
				arbitrator_extra,
				dispute_id: None,
			};

			Self::credit_epoch_buckets(&tx)?;
			T::Courses::grant_access(course_id, buyer_id, &tx.sender)?;

			<Transactions<T>>::insert(id, &tx);
			<LatestTransactionId<T>>::put(id);

			Self::deposit_event(Event::TransactionCreated {
				tx_id: id,
				sender_id: buyer_id,
				receiver_id: owner_id,
				course_id,
				buy_platform_id,
				token,
				amount: price,
				protocol_fee_bps,
				origin_fee_bps,
				buy_fee_bps,
			});
			Self::deposit_event(Event::MetaEvidence { tx_id: id, cid: meta_evidence_cid });

			Ok(())
		}

		fn do_release(
			who: AccountOf<T>,
			caller_id: IdentityId,
			tx_id: TransactionId,
		) -> DispatchResult {
			let mut tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;

			ensure!(caller_id == tx.receiver_id, <Error<T>>::Unauthorized);
			ensure!(
				T::Identities::is_owner_or_delegate(caller_id, &who),
				<Error<T>>::NotOwnerOrDelegate
			);

			match tx.status {
				TransactionStatus::NoDispute => {},
				TransactionStatus::Resolved => return Err(<Error<T>>::AlreadyReleased.into()),
				_ => return Err(<Error<T>>::TransactionInDispute.into()),
			}

			ensure!(Self::now() >= tx.releasable_at, <Error<T>>::DisputePeriodNotElapsed);

			let epoch = Self::releasable_epoch_at(tx.releasable_at);
			ensure!(
				epoch > Self::last_released_epoch(tx.course_id),
				<Error<T>>::AlreadyReleased
			);

			Self::settle_released_buckets(&tx)?;

			tx.status = TransactionStatus::Resolved;
			tx.last_interaction = Self::now();
			<Transactions<T>>::insert(tx_id, &tx);

			Self::pay_out(tx.token, &tx.receiver, tx.amount)?;

			Self::deposit_event(Event::Payment {
				tx_id,
				kind: PaymentKind::Release,
				amount: tx.amount,
			});

			Ok(())
		}

		fn do_release_all(
			who: AccountOf<T>,
			caller_id: IdentityId,
			course_id: CourseId,
		) -> DispatchResult {
			let (owner_id, _, _, token, _) = T::Courses::course(course_id)?;

			ensure!(caller_id == owner_id, <Error<T>>::Unauthorized);
			ensure!(
				T::Identities::is_owner_or_delegate(caller_id, &who),
				<Error<T>>::NotOwnerOrDelegate
			);

			let current = Self::current_epoch();
			let last = Self::last_released_epoch(course_id);

			let mut matured: Vec<(EpochIndex, BalanceOf<T>)> =
				<ReleasableBalanceByEpoch<T>>::iter_prefix(course_id)
					.filter(|(epoch, _)| *epoch > last && *epoch <= current)
					.collect();
			matured.sort_by_key(|(epoch, _)| *epoch);

			let total = matured
				.iter()
				.fold(Zero::zero(), |acc: BalanceOf<T>, (_, value)| acc.saturating_add(*value));
			ensure!(!total.is_zero(), <Error<T>>::NoBalanceToRelease);

			for (epoch, _) in &matured {
				<ReleasableBalanceByEpoch<T>>::remove(course_id, epoch);
			}
			<LastReleasedEpoch<T>>::insert(course_id, current);

			let recipient = T::Identities::owner_of(owner_id)?;
			Self::pay_out(token, &recipient, total)?;

			for (epoch, value) in matured {
				if !value.is_zero() {
					Self::deposit_event(Event::EpochReleased { course_id, epoch, amount: value });
				}
			}

			Ok(())
		}

		fn do_claim(
			who: AccountOf<T>,
			platform_id: PlatformId,
			token: CurrencyOf<T>,
		) -> DispatchResult {
			let recipient = if platform_id == PROTOCOL_INDEX {
				let treasury = Self::protocol_treasury().ok_or(<Error<T>>::NoTreasury)?;
				ensure!(who == treasury, <Error<T>>::Unauthorized);
				treasury
			} else {
				let owner = T::Platforms::owner_of(platform_id)?;
				ensure!(who == owner, <Error<T>>::Unauthorized);
				owner
			};

			let key = (platform_id, token);
			let current = Self::current_epoch();
			let last = Self::last_platform_released_epoch(key);

			let matured: Vec<(EpochIndex, BalanceOf<T>)> =
				<PlatformEpochBalances<T>>::iter_prefix(key)
					.filter(|(epoch, _)| *epoch > last && *epoch <= current)
					.collect();

			let mut total = <PlatformBalances<T>>::take(key);
			for (epoch, value) in matured {
				<PlatformEpochBalances<T>>::remove(key, epoch);
				total = total.saturating_add(value);
			}
			ensure!(!total.is_zero(), <Error<T>>::NoBalanceToRelease);

			<LastPlatformReleasedEpoch<T>>::insert(key, current);

			Self::pay_out(token, &recipient, total)?;

			Self::deposit_event(Event::PlatformFeesClaimed { platform_id, token, amount: total });

			Ok(())
		}

		fn do_pay_arbitration_fee(
			who: AccountOf<T>,
			tx_id: TransactionId,
			value: BalanceOf<T>,
			party: Party,
		) -> DispatchResult {
			let mut tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;

			let party_id = match party {
				Party::Sender => tx.sender_id,
				Party::Receiver => tx.receiver_id,
			};
			ensure!(
				T::Identities::is_owner_or_delegate(party_id, &who),
				<Error<T>>::Unauthorized
			);

			let arbitrator = tx.arbitrator.clone().ok_or(<Error<T>>::ArbitratorNotSet)?;

			match tx.status {
				TransactionStatus::DisputeCreated | TransactionStatus::Resolved =>
					return Err(<Error<T>>::DisputeAlreadyCreated.into()),
				// The receiver never opens the flow; nothing is contested yet.
				TransactionStatus::NoDispute if party == Party::Receiver =>
					return Err(<Error<T>>::SenderHasNotPaid.into()),
				// Contesting is bounded by the dispute period; once the
				// purchase is releasable its funds belong to the release path.
				TransactionStatus::NoDispute =>
					ensure!(Self::now() < tx.releasable_at, <Error<T>>::DisputePeriodElapsed),
				_ => {},
			}

			let cost = T::Arbitration::arbitration_cost(&arbitrator, &tx.arbitrator_extra)?;
			match party {
				Party::Sender => ensure!(value == cost, <Error<T>>::SenderFeeMismatch),
				Party::Receiver => ensure!(value == cost, <Error<T>>::ReceiverFeeMismatch),
			}

			// Take the fresh deposit at the current cost and hand back the
			// previous one, so the retained deposit tracks the latest price.
			let (account, previous) = match party {
				Party::Sender => (tx.sender.clone(), tx.sender_fee),
				Party::Receiver => (tx.receiver.clone(), tx.receiver_fee),
			};
			if !cost.is_zero() {
				T::Currency::transfer(CurrencyId::Native, &account, &Self::account_id(), cost)?;
			}
			if !previous.is_zero() {
				Self::pay_out(CurrencyId::Native, &account, previous)?;
			}
			match party {
				Party::Sender => tx.sender_fee = cost,
				Party::Receiver => tx.receiver_fee = cost,
			}
			tx.last_interaction = Self::now();

			Self::deposit_event(Event::ArbitrationFeeDeposited { tx_id, party, amount: cost });

			let counterparty_fee = match party {
				Party::Sender => tx.receiver_fee,
				Party::Receiver => tx.sender_fee,
			};
			let counterparty_waiting = match party {
				Party::Sender => TransactionStatus::WaitingReceiver,
				Party::Receiver => TransactionStatus::WaitingSender,
			};

			match tx.status {
				TransactionStatus::NoDispute => {
					// Opening the dispute pulls the purchase out of the epoch
					// buckets so no batch release or claim can pay it while
					// contested; resolution settles from custody directly.
					Self::clear_epoch_buckets(&tx)?;
					tx.status = TransactionStatus::WaitingReceiver;
					<Transactions<T>>::insert(tx_id, &tx);
				},
				status if status == counterparty_waiting => {
					// Still the counterparty's turn; only the deposit changed.
					<Transactions<T>>::insert(tx_id, &tx);
				},
				_ => {
					// It was this party's turn. Create the dispute if the
					// counterparty's deposit still covers the current cost,
					// otherwise the cost rose and the wait flips onto them.
					if counterparty_fee >= cost {
						Self::raise_dispute(tx_id, tx, arbitrator, cost)?;
					} else {
						tx.status = counterparty_waiting;
						<Transactions<T>>::insert(tx_id, &tx);
					}
				},
			}

			Ok(())
		}

		fn raise_dispute(
			tx_id: TransactionId,
			mut tx: Transaction<T>,
			arbitrator: AccountOf<T>,
			cost: BalanceOf<T>,
		) -> DispatchResult {
			// A deposit made before the cost dropped is refunded down to it.
			if tx.sender_fee > cost {
				Self::pay_out(CurrencyId::Native, &tx.sender, tx.sender_fee - cost)?;
				tx.sender_fee = cost;
			}
			if tx.receiver_fee > cost {
				Self::pay_out(CurrencyId::Native, &tx.receiver, tx.receiver_fee - cost)?;
				tx.receiver_fee = cost;
			}

			let dispute_id = T::Arbitration::create_dispute(
				&arbitrator,
				RULING_CHOICES,
				&tx.arbitrator_extra,
				&Self::account_id(),
				cost,
			)?;

			tx.dispute_id = Some(dispute_id);
			tx.status = TransactionStatus::DisputeCreated;
			tx.last_interaction = Self::now();

			<DisputeToTransaction<T>>::insert(dispute_id, tx_id);
			<Transactions<T>>::insert(tx_id, &tx);

			Self::deposit_event(Event::Dispute {
				arbitrator,
				tx_id,
				meta_evidence_id: tx_id,
				evidence_group_id: tx_id,
			});

			Ok(())
		}

		fn do_arbitration_fee_timeout(who: AccountOf<T>, tx_id: TransactionId) -> DispatchResult {
			let mut tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;

			ensure!(
				T::Identities::is_owner_or_delegate(tx.sender_id, &who) ||
					T::Identities::is_owner_or_delegate(tx.receiver_id, &who),
				<Error<T>>::Unauthorized
			);

			let (_, _, fee_timeout) = T::Platforms::arbitration_setting(tx.origin_platform_id)?;
			ensure!(
				Self::now() >= tx.last_interaction + fee_timeout,
				<Error<T>>::TimeoutNotElapsed
			);

			let sender_fee = tx.sender_fee;
			let receiver_fee = tx.receiver_fee;

			match tx.status {
				TransactionStatus::WaitingReceiver => {
					// The receiver defaulted: the sender takes everything back.
					tx.status = TransactionStatus::Resolved;
					<Transactions<T>>::insert(tx_id, &tx);

					Self::pay_out(tx.token, &tx.sender, Self::transaction_total_due(&tx)?)?;
					Self::pay_out(CurrencyId::Native, &tx.sender, sender_fee)?;
					Self::pay_out(CurrencyId::Native, &tx.receiver, receiver_fee)?;

					Self::deposit_event(Event::Payment {
						tx_id,
						kind: PaymentKind::Reimburse,
						amount: tx.amount,
					});
				},
				TransactionStatus::WaitingSender => {
					// The sender defaulted: settle as a release to the receiver.
					Self::credit_mature_fees(&tx, tx.amount)?;

					tx.status = TransactionStatus::Resolved;
					<Transactions<T>>::insert(tx_id, &tx);

					Self::pay_out(tx.token, &tx.receiver, tx.amount)?;
					Self::pay_out(CurrencyId::Native, &tx.receiver, receiver_fee)?;
					Self::pay_out(CurrencyId::Native, &tx.sender, sender_fee)?;

					Self::deposit_event(Event::Payment {
						tx_id,
						kind: PaymentKind::Release,
						amount: tx.amount,
					});
				},
				_ => return Err(<Error<T>>::NoFeePaymentPending.into()),
			}

			Ok(())
		}

		fn do_submit_evidence(
			who: AccountOf<T>,
			party_id: IdentityId,
			tx_id: TransactionId,
			cid: Vec<u8>,
		) -> DispatchResult {
			let tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;

			ensure!(
				party_id == tx.sender_id || party_id == tx.receiver_id,
				<Error<T>>::Unauthorized
			);
			ensure!(
				T::Identities::is_owner_or_delegate(party_id, &who),
				<Error<T>>::NotOwnerOrDelegate
			);
			ensure!(!cid.is_empty(), <Error<T>>::InvalidCid);
			ensure!(tx.status != TransactionStatus::Resolved, <Error<T>>::EvidenceOnResolved);

			let arbitrator = tx.arbitrator.ok_or(<Error<T>>::ArbitratorNotSet)?;

			Self::deposit_event(Event::Evidence { arbitrator, tx_id, submitter: who, cid });

			Ok(())
		}

		fn do_appeal(
			who: AccountOf<T>,
			tx_id: TransactionId,
			value: BalanceOf<T>,
		) -> DispatchResult {
			let tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;

			ensure!(who == tx.sender || who == tx.receiver, <Error<T>>::Unauthorized);
			ensure!(
				tx.status == TransactionStatus::DisputeCreated,
				<Error<T>>::DisputeNotCreated
			);

			let arbitrator = tx.arbitrator.clone().ok_or(<Error<T>>::ArbitratorNotSet)?;
			let dispute_id = tx.dispute_id.ok_or(<Error<T>>::DisputeNotCreated)?;

			let cost = T::Arbitration::appeal_cost(&arbitrator, dispute_id, &tx.arbitrator_extra)?;
			ensure!(value == cost, <Error<T>>::AppealCostExceeded);

			T::Currency::transfer(CurrencyId::Native, &who, &Self::account_id(), cost)?;
			T::Arbitration::appeal(
				&arbitrator,
				dispute_id,
				&tx.arbitrator_extra,
				&Self::account_id(),
				cost,
			)?;

			Ok(())
		}

		fn apply_ruling(tx_id: TransactionId, ruling: Ruling) -> DispatchResult {
			let mut tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;

			tx.status = TransactionStatus::Resolved;
			tx.last_interaction = Self::now();
			<Transactions<T>>::insert(tx_id, &tx);

			match ruling {
				Ruling::SenderWins => {
					// Full reimbursement of the purchase and the sender's fee;
					// the receiver's fee stays with the arbitrator.
					Self::pay_out(tx.token, &tx.sender, Self::transaction_total_due(&tx)?)?;
					Self::pay_out(CurrencyId::Native, &tx.sender, tx.sender_fee)?;

					Self::deposit_event(Event::Payment {
						tx_id,
						kind: PaymentKind::Reimburse,
						amount: tx.amount,
					});
				},
				Ruling::ReceiverWins => {
					Self::credit_mature_fees(&tx, tx.amount)?;
					Self::pay_out(tx.token, &tx.receiver, tx.amount)?;
					Self::pay_out(CurrencyId::Native, &tx.receiver, tx.sender_fee)?;

					Self::deposit_event(Event::Payment {
						tx_id,
						kind: PaymentKind::Release,
						amount: tx.amount,
					});
				},
				Ruling::NoWinner => {
					let half = tx.amount / BalanceOf::<T>::from(2u32);
					let two = BalanceOf::<T>::from(2u32);

					// Receiver's half settles like a release, including the
					// fee buckets; the sender's half comes back with its fee
					// term. Each side also recovers half its arbitration fee.
					Self::credit_mature_fees(&tx, half)?;
					Self::pay_out(tx.token, &tx.receiver, half)?;

					let sender_half =
						Self::total_due(half, tx.origin_fee_bps, tx.buy_fee_bps, tx.protocol_fee_bps)?;
					Self::pay_out(tx.token, &tx.sender, sender_half)?;

					Self::pay_out(CurrencyId::Native, &tx.sender, tx.sender_fee / two)?;
					Self::pay_out(CurrencyId::Native, &tx.receiver, tx.receiver_fee / two)?;

					Self::deposit_event(Event::Payment {
						tx_id,
						kind: PaymentKind::Release,
						amount: half,
					});
					Self::deposit_event(Event::Payment {
						tx_id,
						kind: PaymentKind::Reimburse,
						amount: half,
					});
				},
			}

			Ok(())
		}
	}

	impl<T: Config> RulingHandler<T::AccountId> for Pallet<T> {
		fn on_ruling(
			arbitrator: T::AccountId,
			dispute_id: DisputeId,
			ruling: Ruling,
		) -> DispatchResult {
			let tx_id =
				<DisputeToTransaction<T>>::get(dispute_id).ok_or(<Error<T>>::DisputeNotFound)?;
			let tx = Self::transactions(tx_id).ok_or(<Error<T>>::TransactionNotFound)?;

			ensure!(tx.arbitrator == Some(arbitrator), <Error<T>>::CallerNotArbitrator);
			ensure!(
				tx.status == TransactionStatus::DisputeCreated,
				<Error<T>>::DisputeAlreadySolved
			);

			Self::apply_ruling(tx_id, ruling)
		}
	}
}
