//! Row types. Each derives `FromRow` over snake_case columns and serializes
//! with the camelCase keys the API speaks.

pub mod attendance;
pub mod biometric;
pub mod district;
pub mod excuse;
pub mod group;
pub mod institution;
pub mod role;
pub mod student;
pub mod user;

pub use attendance::AttendanceRecord;
pub use biometric::BiometricTemplate;
pub use district::District;
pub use excuse::DailyExcuse;
pub use group::{GroupMember, StudentGroup};
pub use institution::Institution;
pub use role::RoleRecord;
pub use student::{Student, StudentWithGroup};
pub use user::{User, UserCredentials};
