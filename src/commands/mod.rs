pub mod add_user;
pub mod purge_sessions;
pub mod serve;
