//! Course catalog. Courses belong to identities, are priced in a single
//! currency, and carry the dispute period that governs their escrowed
//! purchases. Access tokens are soulbound and minted only by the escrow
//! through [`CourseCatalog::grant_access`].

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;



#[frame_support::pallet]
pub mod pallet {
	use frame_support::{dispatch::DispatchResult, pallet_prelude::*, sp_std::vec::Vec};
	use frame_system::pallet_prelude::*;
	use orml_traits::MultiCurrency;
	use pallet_identities::IdentityRegistry;
	use pallet_platforms::PlatformRegistry;
	use pallet_timestamp::{self as timestamp};
	use primitives::{CourseId, CurrencyId, IdentityId, PlatformId};
	use scale_info::TypeInfo;
	use sp_runtime::traits::Zero;

	#[pallet::config]
	pub trait Config: frame_system::Config + timestamp::Config {
		type Event: From<Event<Self>> + IsType<<Self as frame_system::Config>::Event>;
		type Currency: MultiCurrency<Self::AccountId, CurrencyId = CurrencyId<Self::Hash>>;
		type Identities: IdentityRegistry<Self::AccountId>;
		type Platforms: PlatformRegistry<Self::AccountId, Self::Moment>;
		#[pallet::constant]
		type MinDisputePeriod: Get<MomentOf<Self>>;
		#[pallet::constant]
		type MaxDisputePeriod: Get<MomentOf<Self>>;
	}

	type AccountOf<T> = <T as frame_system::Config>::AccountId;
	type BalanceOf<T> =
		<<T as Config>::Currency as MultiCurrency<<T as frame_system::Config>::AccountId>>::Balance;
	type MomentOf<T> = <T as pallet_timestamp::Config>::Moment;

	/// The escrow's window into the catalog. `grant_access` is deliberately
	/// not an extrinsic: holding this trait is the only way to mint access.
	pub trait CourseCatalog<AccountId, Balance, Hash, Moment> {
		fn course(
			id: CourseId,
		) -> Result<(IdentityId, PlatformId, Balance, CurrencyId<Hash>, Moment), DispatchError>;

		fn grant_access(course_id: CourseId, buyer_id: IdentityId, to: &AccountId)
			-> DispatchResult;
	}

	#[derive(Clone, Encode, Decode, PartialEq, RuntimeDebug, TypeInfo)]
	#[scale_info(skip_type_params(T))]
	pub struct Course<T: Config> {
		pub id: CourseId,
		pub owner_id: IdentityId,
		pub platform_id: PlatformId,
		pub price: BalanceOf<T>,
		pub token: CurrencyId<T::Hash>,
		pub dispute_period: MomentOf<T>,
		pub data_uri: Vec<u8>,
		pub created_at: MomentOf<T>,
	}

	#[pallet::pallet]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::storage]
	#[pallet::getter(fn courses)]
	pub(super) type Courses<T: Config> = StorageMap<_, Twox64Concat, CourseId, Course<T>>;

	#[pallet::storage]
	pub(super) type LatestCourseId<T: Config> = StorageValue<_, CourseId, ValueQuery>;

	#[pallet::storage]
	#[pallet::getter(fn access_grants)]
	pub(super) type AccessGrants<T: Config> = StorageDoubleMap<
		_,
		Twox64Concat,
		CourseId,
		Twox64Concat,
		AccountOf<T>,
		MomentOf<T>,
	>;

	#[pallet::event]
	#[pallet::generate_deposit(pub(super) fn deposit_event)]
	pub enum Event<T: Config> {
		CourseCreated {
			course_id: CourseId,
			owner_id: IdentityId,
			platform_id: PlatformId,
			price: BalanceOf<T>,
			token: CurrencyId<T::Hash>,
			dispute_period: MomentOf<T>,
			data_uri: Vec<u8>,
		},
		CourseUpdated {
			course_id: CourseId,
			price: BalanceOf<T>,
		},
		AccessGranted {
			course_id: CourseId,
			buyer_id: IdentityId,
			owner: AccountOf<T>,
		},
	}

	#[pallet::error]
	pub enum Error<T> {
		NotOwnerOrDelegate,
		PlatformNotFound,
		CourseNotFound,
		PriceIsZero,
		InvalidDisputePeriod,
		TransferForbidden,
		Overflow,
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		#[pallet::weight(1_000)]
		pub fn create_course(
			origin: OriginFor<T>,
			owner_id: IdentityId,
			platform_id: PlatformId,
			price: BalanceOf<T>,
			token: CurrencyId<T::Hash>,
			dispute_period: MomentOf<T>,
			data_uri: Vec<u8>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;

			ensure!(
				T::Identities::is_owner_or_delegate(owner_id, &who),
				<Error<T>>::NotOwnerOrDelegate
			);
			ensure!(T::Platforms::exists(platform_id), <Error<T>>::PlatformNotFound);
			ensure!(!price.is_zero(), <Error<T>>::PriceIsZero);
			ensure!(
				dispute_period >= T::MinDisputePeriod::get() &&
					dispute_period <= T::MaxDisputePeriod::get(),
				<Error<T>>::InvalidDisputePeriod
			);

			let id = <LatestCourseId<T>>::get().checked_add(1).ok_or(<Error<T>>::Overflow)?;
			let now = <timestamp::Pallet<T>>::get();

			let course = Course::<T> {
				id,
				owner_id,
				platform_id,
				price,
				token,
				dispute_period,
				data_uri: data_uri.clone(),
				created_at: now,
			};

			<Courses<T>>::insert(id, course);
			<LatestCourseId<T>>::put(id);

			Self::deposit_event(Event::CourseCreated {
				course_id: id,
				owner_id,
				platform_id,
				price,
				token,
				dispute_period,
				data_uri,
			});

			Ok(())
		}

		#[pallet::weight(1_000)]
		pub fn update_course(
			origin: OriginFor<T>,
			course_id: CourseId,
			price: BalanceOf<T>,
			data_uri: Vec<u8>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let mut course = Self::courses(course_id).ok_or(<Error<T>>::CourseNotFound)?;

			ensure!(
				T::Identities::is_owner_or_delegate(course.owner_id, &who),
				<Error<T>>::NotOwnerOrDelegate
			);
			ensure!(!price.is_zero(), <Error<T>>::PriceIsZero);

			course.price = price;
			course.data_uri = data_uri;
			<Courses<T>>::insert(course_id, course);

			Self::deposit_event(Event::CourseUpdated { course_id, price });
			Ok(())
		}

		/// Access tokens are soulbound; the call exists only to make that explicit.
		#[pallet::weight(1_000)]
		pub fn transfer_access(
			origin: OriginFor<T>,
			_course_id: CourseId,
			_to: AccountOf<T>,
		) -> DispatchResult {
			let _ = ensure_signed(origin)?;
			Err(<Error<T>>::TransferForbidden.into())
		}
	}

	impl<T: Config> Pallet<T> {
		pub fn has_access(course_id: CourseId, who: &AccountOf<T>) -> bool {
			<AccessGrants<T>>::contains_key(course_id, who)
		}
	}

	impl<T: Config> CourseCatalog<T::AccountId, BalanceOf<T>, T::Hash, MomentOf<T>> for Pallet<T> {
		fn course(
			id: CourseId,
		) -> Result<
			(IdentityId, PlatformId, BalanceOf<T>, CurrencyId<T::Hash>, MomentOf<T>),
			DispatchError,
		> {
			let course = Self::courses(id).ok_or(<Error<T>>::CourseNotFound)?;
			Ok((course.owner_id, course.platform_id, course.price, course.token, course.dispute_period))
		}

		fn grant_access(
			course_id: CourseId,
			buyer_id: IdentityId,
			to: &T::AccountId,
		) -> DispatchResult {
			ensure!(<Courses<T>>::contains_key(course_id), <Error<T>>::CourseNotFound);

			let now = <timestamp::Pallet<T>>::get();
			<AccessGrants<T>>::insert(course_id, to, now);

			Self::deposit_event(Event::AccessGranted { course_id, buyer_id, owner: to.clone() });
			Ok(())
		}
	}
}
