//! # Reference Arbitrator
//!
//! The protocol-owned default arbitrator. It is addressed on chain by its
//! sovereign account: platforms allowlist and configure that account, the
//! escrow forwards arbitration fees to it, and rulings flow back through
//! [`RulingHandler`] carrying it as the caller identity.
//!
//! Pricing is per platform and set by the platform owner, who is also the
//! only account that may rule the platform's disputes. Disputes progress
//! straight from `Waiting` to `Solved`; there is no appeal round here, so
//! the advertised appeal cost is unpayable by construction.
//!
//! The `extra` bytes every [`Arbitration`] call carries are opaque to the
//! escrow; this implementation reads them as the SCALE-encoded platform id
//! whose price list and owner apply.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
mod mock;


#[frame_support::pallet]
pub mod pallet {
	use frame_support::{
		dispatch::DispatchResult, pallet_prelude::*, sp_runtime::traits::AccountIdConversion,
		transactional, PalletId,
	};
	use frame_system::pallet_prelude::*;
	use orml_traits::MultiCurrency;
	use pallet_platforms::PlatformRegistry;
	use pallet_timestamp::{self as timestamp};
	use primitives::{CurrencyId, DisputeId, PlatformId, Ruling};
	use scale_info::TypeInfo;
	use sp_runtime::traits::{Bounded, Zero};

	#[pallet::config]
	pub trait Config: frame_system::Config + timestamp::Config {
		type Event: From<Event<Self>> + IsType<<Self as frame_system::Config>::Event>;
		type Currency: MultiCurrency<Self::AccountId, CurrencyId = CurrencyId<Self::Hash>>;
		type Platforms: PlatformRegistry<Self::AccountId, Self::Moment>;
		/// Applies rulings back onto the arbitrated escrow.
		type RulingHandler: RulingHandler<Self::AccountId>;
		/// Account identifying this arbitrator on chain and holding collected fees.
		type PalletId: Get<PalletId>;
	}

	type AccountOf<T> = <T as frame_system::Config>::AccountId;
	type BalanceOf<T> =
		<<T as Config>::Currency as MultiCurrency<<T as frame_system::Config>::AccountId>>::Balance;

	/// Arbitration capability consumed by the escrow: cost discovery, dispute
	/// creation and appeals. Every call names the arbitrator account it is
	/// addressed to, so a registry implementation can host several.
	pub trait Arbitration<AccountId, Balance> {
		fn arbitration_cost(arbitrator: &AccountId, extra: &[u8]) -> Result<Balance, DispatchError>;

		fn create_dispute(
			arbitrator: &AccountId,
			choices: u32,
			extra: &[u8],
			payer: &AccountId,
			fee: Balance,
		) -> Result<DisputeId, DispatchError>;

		fn appeal_cost(
			arbitrator: &AccountId,
			dispute_id: DisputeId,
			extra: &[u8],
		) -> Result<Balance, DispatchError>;

		fn appeal(
			arbitrator: &AccountId,
			dispute_id: DisputeId,
			extra: &[u8],
			payer: &AccountId,
			fee: Balance,
		) -> DispatchResult;

		fn current_ruling(dispute_id: DisputeId) -> Result<Ruling, DispatchError>;
	}

	/// Callback into the arbitrated pallet. `arbitrator` is the account the
	/// ruling originates from; the receiver must verify it against the
	/// arbitrator it snapshotted for the disputed transaction.
	pub trait RulingHandler<AccountId> {
		fn on_ruling(arbitrator: AccountId, dispute_id: DisputeId, ruling: Ruling)
			-> DispatchResult;
	}

	#[derive(Clone, Copy, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	pub enum DisputeStatus {
		Waiting,
		Appealable,
		Solved,
	}

	#[derive(Clone, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[scale_info(skip_type_params(T))]
	pub struct Dispute<T: Config> {
		pub id: DisputeId,
		pub platform_id: PlatformId,
		pub choices: u32,
		pub fee: BalanceOf<T>,
		pub ruling: u32,
		pub status: DisputeStatus,
	}

	#[pallet::pallet]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::storage]
	#[pallet::getter(fn arbitration_price)]
	pub(super) type ArbitrationPrices<T: Config> =
		StorageMap<_, Twox64Concat, PlatformId, BalanceOf<T>, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn disputes)]
	pub(super) type Disputes<T: Config> = StorageMap<_, Twox64Concat, DisputeId, Dispute<T>>;

	#[pallet::storage]
	pub(super) type LatestDisputeId<T: Config> = StorageValue<_, DisputeId, ValueQuery>;

	#[pallet::event]
	#[pallet::generate_deposit(pub(super) fn deposit_event)]
	pub enum Event<T: Config> {
		ArbitrationPriceUpdated {
			platform_id: PlatformId,
			price: BalanceOf<T>,
		},
		DisputeCreated {
			dispute_id: DisputeId,
			platform_id: PlatformId,
			fee: BalanceOf<T>,
		},
		Ruling {
			arbitrator: AccountOf<T>,
			dispute_id: DisputeId,
			ruling: u32,
		},
	}

	#[pallet::error]
	pub enum Error<T> {
		UnknownArbitrator,
		BadArbitratorExtra,
		DisputeNotFound,
		DisputeAlreadySolved,
		NotPlatformOwner,
		InvalidRuling,
		ArbitrationFeeTooLow,
		DisputeNotAppealable,
		Overflow,
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		#[pallet::weight(1_000)]
		pub fn set_arbitration_price(
			origin: OriginFor<T>,
			platform_id: PlatformId,
			price: BalanceOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let owner = T::Platforms::owner_of(platform_id)?;
			ensure!(who == owner, <Error<T>>::NotPlatformOwner);

			<ArbitrationPrices<T>>::insert(platform_id, price);

			Self::deposit_event(Event::ArbitrationPriceUpdated { platform_id, price });
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn give_ruling(
			origin: OriginFor<T>,
			dispute_id: DisputeId,
			ruling: u32,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut dispute = Self::disputes(dispute_id).ok_or(<Error<T>>::DisputeNotFound)?;

			ensure!(dispute.status == DisputeStatus::Waiting, <Error<T>>::DisputeAlreadySolved);

			let owner = T::Platforms::owner_of(dispute.platform_id)?;
			ensure!(who == owner, <Error<T>>::NotPlatformOwner);

			ensure!(ruling <= dispute.choices, <Error<T>>::InvalidRuling);
			let decoded = Ruling::from_choice(ruling).ok_or(<Error<T>>::InvalidRuling)?;

			dispute.ruling = ruling;
			dispute.status = DisputeStatus::Solved;
			let fee = dispute.fee;
			<Disputes<T>>::insert(dispute_id, dispute);

			// The collected arbitration fee is the platform owner's compensation.
			if !fee.is_zero() {
				T::Currency::transfer(CurrencyId::Native, &Self::account_id(), &owner, fee)?;
			}

			let arbitrator = Self::account_id();
			Self::deposit_event(Event::Ruling { arbitrator: arbitrator.clone(), dispute_id, ruling });

			T::RulingHandler::on_ruling(arbitrator, dispute_id, decoded)?;

			Ok(())
		}
	}

	impl<T: Config> Pallet<T> {
		pub fn account_id() -> AccountOf<T> {
			T::PalletId::get().into_account()
		}

		fn platform_from_extra(extra: &[u8]) -> Result<PlatformId, DispatchError> {
			PlatformId::decode(&mut &extra[..])
				.map_err(|_| <Error<T>>::BadArbitratorExtra.into())
		}

		fn ensure_self(arbitrator: &AccountOf<T>) -> DispatchResult {
			ensure!(*arbitrator == Self::account_id(), <Error<T>>::UnknownArbitrator);
			Ok(())
		}
	}

	impl<T: Config> Arbitration<T::AccountId, BalanceOf<T>> for Pallet<T> {
		fn arbitration_cost(
			arbitrator: &T::AccountId,
			extra: &[u8],
		) -> Result<BalanceOf<T>, DispatchError> {
			Self::ensure_self(arbitrator)?;
			let platform_id = Self::platform_from_extra(extra)?;
			Ok(Self::arbitration_price(platform_id))
		}

		fn create_dispute(
			arbitrator: &T::AccountId,
			choices: u32,
			extra: &[u8],
			payer: &T::AccountId,
			fee: BalanceOf<T>,
		) -> Result<DisputeId, DispatchError> {
			Self::ensure_self(arbitrator)?;
			let platform_id = Self::platform_from_extra(extra)?;

			ensure!(fee >= Self::arbitration_price(platform_id), <Error<T>>::ArbitrationFeeTooLow);

			if !fee.is_zero() {
				T::Currency::transfer(CurrencyId::Native, payer, &Self::account_id(), fee)?;
			}

			let id = <LatestDisputeId<T>>::get().checked_add(1).ok_or(<Error<T>>::Overflow)?;

			let dispute = Dispute::<T> {
				id,
				platform_id,
				choices,
				fee,
				ruling: 0,
				status: DisputeStatus::Waiting,
			};

			<Disputes<T>>::insert(id, dispute);
			<LatestDisputeId<T>>::put(id);

			Self::deposit_event(Event::DisputeCreated { dispute_id: id, platform_id, fee });

			Ok(id)
		}

		fn appeal_cost(
			arbitrator: &T::AccountId,
			_dispute_id: DisputeId,
			_extra: &[u8],
		) -> Result<BalanceOf<T>, DispatchError> {
			Self::ensure_self(arbitrator)?;
			// No appeal round: advertise a cost nobody can pay.
			Ok(BalanceOf::<T>::max_value())
		}

		fn appeal(
			arbitrator: &T::AccountId,
			_dispute_id: DisputeId,
			_extra: &[u8],
			_payer: &T::AccountId,
			_fee: BalanceOf<T>,
		) -> DispatchResult {
			Self::ensure_self(arbitrator)?;
			Err(<Error<T>>::DisputeNotAppealable.into())
		}

		fn current_ruling(dispute_id: DisputeId) -> Result<Ruling, DispatchError> {
			let dispute = Self::disputes(dispute_id).ok_or(<Error<T>>::DisputeNotFound)?;
			Ruling::from_choice(dispute.ruling).ok_or_else(|| <Error<T>>::InvalidRuling.into())
		}
	}
}
