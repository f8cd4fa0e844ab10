//! Business logic layer

pub mod user_profile;

pub use user_profile::UserProfileService;
