//! # Identity Registry
//!
//! Every marketplace participant owns exactly one identity: a soulbound
//! record binding an account to a unique handle and an origin platform.
//! Owners can appoint delegate accounts that act on the identity's behalf
//! in the catalog and the escrow. Short handles (1 to 4 characters) are
//! priced on a halving curve from `ShortHandleMaxPrice`; longer handles
//! cost the flat `MintFee`. Collected fees accumulate in the pallet
//! account until the operator withdraws them.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
mod mock;


#[frame_support::pallet]
pub mod pallet {
	use frame_support::{
		dispatch::DispatchResult, pallet_prelude::*, sp_runtime::traits::AccountIdConversion,
		sp_std::vec::Vec, traits::GenesisBuild, transactional, PalletId,
	};
	use frame_system::pallet_prelude::*;
	use orml_traits::MultiCurrency;
	use pallet_platforms::PlatformRegistry;
	use pallet_timestamp::{self as timestamp};
	use primitives::{is_valid_handle, CurrencyId, IdentityId, MintStatus, PlatformId};
	use scale_info::TypeInfo;
	use sp_runtime::traits::Zero;

	#[pallet::config]
	pub trait Config: frame_system::Config + timestamp::Config {
		type Event: From<Event<Self>> + IsType<<Self as frame_system::Config>::Event>;
		type Currency: MultiCurrency<Self::AccountId, CurrencyId = CurrencyId<Self::Hash>>;
		type Platforms: PlatformRegistry<Self::AccountId, Self::Moment>;
		/// Account holding collected mint fees.
		type PalletId: Get<PalletId>;
	}

	type AccountOf<T> = <T as frame_system::Config>::AccountId;
	type BalanceOf<T> =
		<<T as Config>::Currency as MultiCurrency<<T as frame_system::Config>::AccountId>>::Balance;

	/// Authority checks for the pallets acting on behalf of identities.
	pub trait IdentityRegistry<AccountId> {
		fn exists(id: IdentityId) -> bool;
		fn owner_of(id: IdentityId) -> Result<AccountId, DispatchError>;
		fn is_owner_or_delegate(id: IdentityId, who: &AccountId) -> bool;
	}

	#[derive(Clone, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[scale_info(skip_type_params(T))]
	pub struct Identity<T: Config> {
		pub id: IdentityId,
		pub owner: AccountOf<T>,
		pub platform_id: PlatformId,
		pub handle: Vec<u8>,
		pub data_uri: Vec<u8>,
		pub delegates: Vec<AccountOf<T>>,
	}

	#[pallet::pallet]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::storage]
	#[pallet::getter(fn identities)]
	pub(super) type Identities<T: Config> = StorageMap<_, Twox64Concat, IdentityId, Identity<T>>;

	#[pallet::storage]
	#[pallet::getter(fn identity_by_handle)]
	pub(super) type Handles<T: Config> = StorageMap<_, Blake2_128Concat, Vec<u8>, IdentityId>;

	#[pallet::storage]
	#[pallet::getter(fn identity_of)]
	pub(super) type IdentityOf<T: Config> = StorageMap<_, Twox64Concat, AccountOf<T>, IdentityId>;

	#[pallet::storage]
	pub(super) type LatestIdentityId<T: Config> = StorageValue<_, IdentityId, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn minting_status)]
	pub(super) type MintingStatus<T: Config> = StorageValue<_, MintStatus, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn mint_fee)]
	pub(super) type MintFee<T: Config> = StorageValue<_, BalanceOf<T>, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn short_handle_max_price)]
	pub(super) type ShortHandleMaxPrice<T: Config> = StorageValue<_, BalanceOf<T>, ValueQuery>;

	#[pallet::genesis_config]
	pub struct GenesisConfig<T: Config> {
		pub mint_status: MintStatus,
		pub mint_fee: BalanceOf<T>,
		pub short_handle_max_price: BalanceOf<T>,
	}

	#[cfg(feature = "std")]
	impl<T: Config> Default for GenesisConfig<T> {
		fn default() -> Self {
			Self {
				mint_status: MintStatus::Paused,
				mint_fee: Zero::zero(),
				short_handle_max_price: Zero::zero(),
			}
		}
	}

	#[pallet::genesis_build]
	impl<T: Config> GenesisBuild<T> for GenesisConfig<T> {
		fn build(&self) {
			<MintingStatus<T>>::put(self.mint_status);
			<MintFee<T>>::put(self.mint_fee);
			<ShortHandleMaxPrice<T>>::put(self.short_handle_max_price);
		}
	}

	#[pallet::event]
	#[pallet::generate_deposit(pub(super) fn deposit_event)]
	pub enum Event<T: Config> {
		Mint {
			id: IdentityId,
			owner: AccountOf<T>,
			handle: Vec<u8>,
			platform_id: PlatformId,
		},
		ProfileDataUpdated {
			id: IdentityId,
		},
		DelegateAdded {
			id: IdentityId,
			delegate: AccountOf<T>,
		},
		DelegateRemoved {
			id: IdentityId,
			delegate: AccountOf<T>,
		},
		MintStatusUpdated {
			status: MintStatus,
		},
		MintFeeUpdated {
			fee: BalanceOf<T>,
		},
		ShortHandleMaxPriceUpdated {
			price: BalanceOf<T>,
		},
		FeesWithdrawn {
			recipient: AccountOf<T>,
			amount: BalanceOf<T>,
		},
	}

	#[pallet::error]
	pub enum Error<T> {
		PublicMintDisabled,
		AlreadyMinted,
		HandleInvalid,
		HandleTaken,
		WrongFee,
		PlatformNotFound,
		IdentityNotFound,
		NotOwner,
		NotOwnerOrDelegate,
		AlreadyDelegate,
		DelegateNotFound,
		TransferForbidden,
		NoFeesToWithdraw,
		Overflow,
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		#[pallet::weight(1_000)]
		#[transactional]
		pub fn mint(
			origin: OriginFor<T>,
			platform_id: PlatformId,
			handle: Vec<u8>,
			value: BalanceOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			ensure!(
				Self::minting_status() == MintStatus::Public,
				<Error<T>>::PublicMintDisabled
			);
			Self::do_mint(who.clone(), who, platform_id, handle, Some(value))?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn mint_for(
			origin: OriginFor<T>,
			target: AccountOf<T>,
			platform_id: PlatformId,
			handle: Vec<u8>,
			value: BalanceOf<T>,
		) -> DispatchResult {
			let payer = ensure_signed(origin)?;
			ensure!(
				Self::minting_status() == MintStatus::Public,
				<Error<T>>::PublicMintDisabled
			);
			Self::do_mint(payer, target, platform_id, handle, Some(value))?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn free_mint(
			origin: OriginFor<T>,
			target: AccountOf<T>,
			platform_id: PlatformId,
			handle: Vec<u8>,
		) -> DispatchResult {
			ensure_root(origin)?;
			Self::do_mint(target.clone(), target, platform_id, handle, None)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn update_profile_data(
			origin: OriginFor<T>,
			id: IdentityId,
			data_uri: Vec<u8>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut identity = Self::identities(id).ok_or(<Error<T>>::IdentityNotFound)?;

			ensure!(
				identity.owner == who || identity.delegates.contains(&who),
				<Error<T>>::NotOwnerOrDelegate
			);

			identity.data_uri = data_uri;
			<Identities<T>>::insert(id, identity);

			Self::deposit_event(Event::ProfileDataUpdated { id });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn add_delegate(
			origin: OriginFor<T>,
			id: IdentityId,
			delegate: AccountOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut identity = Self::identities(id).ok_or(<Error<T>>::IdentityNotFound)?;

			ensure!(identity.owner == who, <Error<T>>::NotOwner);
			ensure!(!identity.delegates.contains(&delegate), <Error<T>>::AlreadyDelegate);

			identity.delegates.push(delegate.clone());
			<Identities<T>>::insert(id, identity);

			Self::deposit_event(Event::DelegateAdded { id, delegate });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn remove_delegate(
			origin: OriginFor<T>,
			id: IdentityId,
			delegate: AccountOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut identity = Self::identities(id).ok_or(<Error<T>>::IdentityNotFound)?;

			ensure!(identity.owner == who, <Error<T>>::NotOwner);
			ensure!(identity.delegates.contains(&delegate), <Error<T>>::DelegateNotFound);

			identity.delegates.retain(|d| d != &delegate);
			<Identities<T>>::insert(id, identity);

			Self::deposit_event(Event::DelegateRemoved { id, delegate });
			Ok(())
		}

		/// Identities are soulbound; the call exists only to make that explicit.
		#[pallet::weight(1_000)]
		pub fn transfer(
			origin: OriginFor<T>,
			_id: IdentityId,
			_to: AccountOf<T>,
		) -> DispatchResult {
			let _ = ensure_signed(origin)?;
			Err(<Error<T>>::TransferForbidden.into())
		}

		#[pallet::weight(1_000)]
		pub fn set_mint_status(origin: OriginFor<T>, status: MintStatus) -> DispatchResult {
			ensure_root(origin)?;
			<MintingStatus<T>>::put(status);
			Self::deposit_event(Event::MintStatusUpdated { status });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn set_mint_fee(origin: OriginFor<T>, fee: BalanceOf<T>) -> DispatchResult {
			ensure_root(origin)?;
			<MintFee<T>>::put(fee);
			Self::deposit_event(Event::MintFeeUpdated { fee });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn set_short_handle_max_price(
			origin: OriginFor<T>,
			price: BalanceOf<T>,
		) -> DispatchResult {
			ensure_root(origin)?;
			<ShortHandleMaxPrice<T>>::put(price);
			Self::deposit_event(Event::ShortHandleMaxPriceUpdated { price });
			Ok(())
		}

		#[pallet::weight(1_000)]
		#[transactional]
		pub fn withdraw(origin: OriginFor<T>, recipient: AccountOf<T>) -> DispatchResult {
			ensure_root(origin)?;

			let pot = Self::account_id();
			let amount = T::Currency::free_balance(CurrencyId::Native, &pot);
			ensure!(!amount.is_zero(), <Error<T>>::NoFeesToWithdraw);

			T::Currency::transfer(CurrencyId::Native, &pot, &recipient, amount)?;

			Self::deposit_event(Event::FeesWithdrawn { recipient, amount });
			Ok(())
		}
	}

	impl<T: Config> Pallet<T> {
		pub fn account_id() -> AccountOf<T> {
			T::PalletId::get().into_account()
		}

		/// Price of a handle at its current length. Lengths 1 to 4 halve the
		/// short-handle maximum per extra character; anything longer costs the
		/// flat mint fee.
		pub fn handle_price(handle: &[u8]) -> BalanceOf<T> {
			let len = handle.len();
			if len >= 5 {
				return Self::mint_fee()
			}
			Self::short_handle_max_price() / BalanceOf::<T>::from(1u32 << (len.max(1) - 1))
		}

		pub fn is_delegate(id: IdentityId, who: &AccountOf<T>) -> bool {
			Self::identities(id).map_or(false, |identity| identity.delegates.contains(who))
		}

		fn do_mint(
			payer: AccountOf<T>,
			owner: AccountOf<T>,
			platform_id: PlatformId,
			handle: Vec<u8>,
			value: Option<BalanceOf<T>>,
		) -> DispatchResult {
			ensure!(T::Platforms::exists(platform_id), <Error<T>>::PlatformNotFound);
			ensure!(!<IdentityOf<T>>::contains_key(&owner), <Error<T>>::AlreadyMinted);
			ensure!(is_valid_handle(&handle), <Error<T>>::HandleInvalid);
			ensure!(!<Handles<T>>::contains_key(&handle), <Error<T>>::HandleTaken);

			if let Some(value) = value {
				let price = Self::handle_price(&handle);
				ensure!(value == price, <Error<T>>::WrongFee);
				if !value.is_zero() {
					T::Currency::transfer(CurrencyId::Native, &payer, &Self::account_id(), value)?;
				}
			}

			let id = <LatestIdentityId<T>>::get().checked_add(1).ok_or(<Error<T>>::Overflow)?;

			let identity = Identity::<T> {
				id,
				owner: owner.clone(),
				platform_id,
				handle: handle.clone(),
				data_uri: Vec::new(),
				delegates: Vec::new(),
			};

			<Identities<T>>::insert(id, identity);
			<Handles<T>>::insert(&handle, id);
			<IdentityOf<T>>::insert(&owner, id);
			<LatestIdentityId<T>>::put(id);

			Self::deposit_event(Event::Mint { id, owner, handle, platform_id });

			Ok(())
		}
	}

	impl<T: Config> IdentityRegistry<T::AccountId> for Pallet<T> {
		fn exists(id: IdentityId) -> bool {
			<Identities<T>>::contains_key(id)
		}

		fn owner_of(id: IdentityId) -> Result<T::AccountId, DispatchError> {
			let identity = Self::identities(id).ok_or(<Error<T>>::IdentityNotFound)?;
			Ok(identity.owner)
		}

		fn is_owner_or_delegate(id: IdentityId, who: &T::AccountId) -> bool {
			Self::identities(id)
				.map_or(false, |identity| identity.owner == *who || identity.delegates.contains(who))
		}
	}
}
