//! # Platform Registry
//!
//! Platforms are the storefronts of the marketplace. Each platform is minted
//! once per account, carries an origin fee (earned on courses listed through
//! it) and a buy fee (earned on purchases initiated through it), and may
//! configure an allowlisted arbitrator for disputes on its courses.
//!
//! Platform id 0 is reserved for the protocol treasury and never stored here.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;



#[frame_support::pallet]
pub mod pallet {
	use frame_support::{dispatch::DispatchResult, pallet_prelude::*, sp_std::vec::Vec};
	use frame_system::pallet_prelude::*;
	use pallet_timestamp::{self as timestamp};
	use primitives::{is_valid_handle, MintStatus, PlatformId, FEE_DIVIDER};
	use scale_info::TypeInfo;

	#[pallet::config]
	pub trait Config: frame_system::Config + timestamp::Config {
		type Event: From<Event<Self>> + IsType<<Self as frame_system::Config>::Event>;
		/// Lower bound for per-platform arbitration fee timeouts.
		#[pallet::constant]
		type MinArbitrationFeeTimeout: Get<MomentOf<Self>>;
	}

	type AccountOf<T> = <T as frame_system::Config>::AccountId;
	type MomentOf<T> = <T as pallet_timestamp::Config>::Moment;

	/// Read access for the pallets that price and arbitrate purchases.
	pub trait PlatformRegistry<AccountId, Moment> {
		fn exists(id: PlatformId) -> bool;
		fn owner_of(id: PlatformId) -> Result<AccountId, DispatchError>;
		fn origin_fee_bps(id: PlatformId) -> Result<u16, DispatchError>;
		fn buy_fee_bps(id: PlatformId) -> Result<u16, DispatchError>;
		fn arbitration_setting(
			id: PlatformId,
		) -> Result<(Option<AccountId>, Vec<u8>, Moment), DispatchError>;
	}

	#[derive(Clone, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[scale_info(skip_type_params(T))]
	pub struct Platform<T: Config> {
		pub id: PlatformId,
		pub owner: AccountOf<T>,
		pub handle: Vec<u8>,
		pub origin_fee_bps: u16,
		pub buy_fee_bps: u16,
		pub arbitrator: Option<AccountOf<T>>,
		pub arbitrator_extra: Vec<u8>,
		pub arbitration_fee_timeout: MomentOf<T>,
		pub created_at: MomentOf<T>,
	}

	#[pallet::pallet]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::storage]
	#[pallet::getter(fn platforms)]
	pub(super) type Platforms<T: Config> = StorageMap<_, Twox64Concat, PlatformId, Platform<T>>;

	#[pallet::storage]
	#[pallet::getter(fn platform_by_handle)]
	pub(super) type Handles<T: Config> = StorageMap<_, Blake2_128Concat, Vec<u8>, PlatformId>;

	#[pallet::storage]
	#[pallet::getter(fn platform_of)]
	pub(super) type PlatformOf<T: Config> = StorageMap<_, Twox64Concat, AccountOf<T>, PlatformId>;

	#[pallet::storage]
	pub(super) type LatestPlatformId<T: Config> = StorageValue<_, PlatformId, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn minting_status)]
	pub(super) type MintingStatus<T: Config> = StorageValue<_, MintStatus, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn is_whitelisted)]
	pub(super) type Whitelist<T: Config> =
		StorageMap<_, Twox64Concat, AccountOf<T>, bool, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn is_allowed_arbitrator)]
	pub(super) type ArbitratorAllowlist<T: Config> =
		StorageMap<_, Twox64Concat, AccountOf<T>, bool, ValueQuery>;

	#[pallet::event]
	#[pallet::generate_deposit(pub(super) fn deposit_event)]
	pub enum Event<T: Config> {
		PlatformMint {
			platform_id: PlatformId,
			owner: AccountOf<T>,
			handle: Vec<u8>,
		},
		OriginFeeUpdated {
			platform_id: PlatformId,
			fee_bps: u16,
		},
		BuyFeeUpdated {
			platform_id: PlatformId,
			fee_bps: u16,
		},
		ArbitratorUpdated {
			platform_id: PlatformId,
			arbitrator: Option<AccountOf<T>>,
		},
		ArbitrationFeeTimeoutUpdated {
			platform_id: PlatformId,
			timeout: MomentOf<T>,
		},
		MintStatusUpdated {
			status: MintStatus,
		},
		AddedToWhitelist {
			account: AccountOf<T>,
		},
		RemovedFromWhitelist {
			account: AccountOf<T>,
		},
		ArbitratorAllowed {
			account: AccountOf<T>,
		},
		ArbitratorDisallowed {
			account: AccountOf<T>,
		},
	}

	#[pallet::error]
	pub enum Error<T> {
		PublicMintDisabled,
		NotWhitelisted,
		AlreadyMinted,
		HandleInvalid,
		HandleTaken,
		PlatformNotFound,
		NotOwner,
		FeeTooHigh,
		ArbitratorNotAllowed,
		FeeTimeoutTooLow,
		Overflow,
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		#[pallet::weight(1_000)]
		pub fn mint(origin: OriginFor<T>, handle: Vec<u8>) -> DispatchResult {
			let owner = ensure_signed(origin)?;
			Self::do_mint(owner, handle)?;
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn update_origin_fee(
			origin: OriginFor<T>,
			platform_id: PlatformId,
			fee_bps: u16,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut platform = Self::owned_platform(platform_id, &who)?;

			ensure!(fee_bps <= FEE_DIVIDER, <Error<T>>::FeeTooHigh);
			platform.origin_fee_bps = fee_bps;
			<Platforms<T>>::insert(platform_id, platform);

			Self::deposit_event(Event::OriginFeeUpdated { platform_id, fee_bps });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn update_buy_fee(
			origin: OriginFor<T>,
			platform_id: PlatformId,
			fee_bps: u16,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut platform = Self::owned_platform(platform_id, &who)?;

			ensure!(fee_bps <= FEE_DIVIDER, <Error<T>>::FeeTooHigh);
			platform.buy_fee_bps = fee_bps;
			<Platforms<T>>::insert(platform_id, platform);

			Self::deposit_event(Event::BuyFeeUpdated { platform_id, fee_bps });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn update_arbitrator(
			origin: OriginFor<T>,
			platform_id: PlatformId,
			arbitrator: Option<AccountOf<T>>,
			extra: Vec<u8>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut platform = Self::owned_platform(platform_id, &who)?;

			if let Some(account) = &arbitrator {
				ensure!(Self::is_allowed_arbitrator(account), <Error<T>>::ArbitratorNotAllowed);
			}

			platform.arbitrator = arbitrator.clone();
			platform.arbitrator_extra = extra;
			<Platforms<T>>::insert(platform_id, platform);

			Self::deposit_event(Event::ArbitratorUpdated { platform_id, arbitrator });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn update_arbitration_fee_timeout(
			origin: OriginFor<T>,
			platform_id: PlatformId,
			timeout: MomentOf<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut platform = Self::owned_platform(platform_id, &who)?;

			ensure!(timeout >= T::MinArbitrationFeeTimeout::get(), <Error<T>>::FeeTimeoutTooLow);
			platform.arbitration_fee_timeout = timeout;
			<Platforms<T>>::insert(platform_id, platform);

			Self::deposit_event(Event::ArbitrationFeeTimeoutUpdated { platform_id, timeout });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn set_mint_status(origin: OriginFor<T>, status: MintStatus) -> DispatchResult {
			ensure_root(origin)?;
			<MintingStatus<T>>::put(status);
			Self::deposit_event(Event::MintStatusUpdated { status });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn add_to_whitelist(origin: OriginFor<T>, account: AccountOf<T>) -> DispatchResult {
			ensure_root(origin)?;
			<Whitelist<T>>::insert(&account, true);
			Self::deposit_event(Event::AddedToWhitelist { account });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn remove_from_whitelist(
			origin: OriginFor<T>,
			account: AccountOf<T>,
		) -> DispatchResult {
			ensure_root(origin)?;
			<Whitelist<T>>::remove(&account);
			Self::deposit_event(Event::RemovedFromWhitelist { account });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn allow_arbitrator(origin: OriginFor<T>, account: AccountOf<T>) -> DispatchResult {
			ensure_root(origin)?;
			<ArbitratorAllowlist<T>>::insert(&account, true);
			Self::deposit_event(Event::ArbitratorAllowed { account });
			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn disallow_arbitrator(origin: OriginFor<T>, account: AccountOf<T>) -> DispatchResult {
			ensure_root(origin)?;
			<ArbitratorAllowlist<T>>::remove(&account);
			Self::deposit_event(Event::ArbitratorDisallowed { account });
			Ok(())
		}
	}

	impl<T: Config> Pallet<T> {
		fn do_mint(owner: AccountOf<T>, handle: Vec<u8>) -> DispatchResult {
			match Self::minting_status() {
				MintStatus::Paused => return Err(<Error<T>>::PublicMintDisabled.into()),
				MintStatus::WhitelistOnly =>
					ensure!(Self::is_whitelisted(&owner), <Error<T>>::NotWhitelisted),
				MintStatus::Public => {},
			}

			ensure!(!<PlatformOf<T>>::contains_key(&owner), <Error<T>>::AlreadyMinted);
			ensure!(is_valid_handle(&handle), <Error<T>>::HandleInvalid);
			ensure!(!<Handles<T>>::contains_key(&handle), <Error<T>>::HandleTaken);

			let id = <LatestPlatformId<T>>::get().checked_add(1).ok_or(<Error<T>>::Overflow)?;
			let now = <timestamp::Pallet<T>>::get();

			let platform = Platform::<T> {
				id,
				owner: owner.clone(),
				handle: handle.clone(),
				origin_fee_bps: 0,
				buy_fee_bps: 0,
				arbitrator: None,
				arbitrator_extra: Vec::new(),
				arbitration_fee_timeout: T::MinArbitrationFeeTimeout::get(),
				created_at: now,
			};

			<Platforms<T>>::insert(id, platform);
			<Handles<T>>::insert(&handle, id);
			<PlatformOf<T>>::insert(&owner, id);
			<LatestPlatformId<T>>::put(id);

			Self::deposit_event(Event::PlatformMint { platform_id: id, owner, handle });

			Ok(())
		}

		fn owned_platform(
			platform_id: PlatformId,
			who: &AccountOf<T>,
		) -> Result<Platform<T>, DispatchError> {
			let platform = Self::platforms(platform_id).ok_or(<Error<T>>::PlatformNotFound)?;
			ensure!(&platform.owner == who, <Error<T>>::NotOwner);
			Ok(platform)
		}
	}

	impl<T: Config> PlatformRegistry<T::AccountId, MomentOf<T>> for Pallet<T> {
		fn exists(id: PlatformId) -> bool {
			<Platforms<T>>::contains_key(id)
		}

		fn owner_of(id: PlatformId) -> Result<T::AccountId, DispatchError> {
			let platform = Self::platforms(id).ok_or(<Error<T>>::PlatformNotFound)?;
			Ok(platform.owner)
		}

		fn origin_fee_bps(id: PlatformId) -> Result<u16, DispatchError> {
			let platform = Self::platforms(id).ok_or(<Error<T>>::PlatformNotFound)?;
			Ok(platform.origin_fee_bps)
		}

		fn buy_fee_bps(id: PlatformId) -> Result<u16, DispatchError> {
			let platform = Self::platforms(id).ok_or(<Error<T>>::PlatformNotFound)?;
			Ok(platform.buy_fee_bps)
		}

		fn arbitration_setting(
			id: PlatformId,
		) -> Result<(Option<T::AccountId>, Vec<u8>, MomentOf<T>), DispatchError> {
			let platform = Self::platforms(id).ok_or(<Error<T>>::PlatformNotFound)?;
			Ok((platform.arbitrator, platform.arbitrator_extra, platform.arbitration_fee_timeout))
		}
	}
}
