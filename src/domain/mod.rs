//! Domain models for realm user profiles

pub mod config_value;
pub mod equivalence;
pub mod user_profile;

pub use config_value::{ConfigMap, ConfigValue};
pub use equivalence::{equivalent, AbsentPolicyInterpretation, Drift, ProfileComparator};
pub use user_profile::{
    Attribute, Group, Permissions, RequiredBy, Selector, UnmanagedAttributePolicy, UserProfile,
    MANDATORY_ATTRIBUTES,
};
