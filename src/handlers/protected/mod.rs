pub mod attendance;
pub mod biometrics;
pub mod districts;
pub mod excuses;
pub mod groups;
pub mod institutions;
pub mod roles;
pub mod students;
pub mod users;
