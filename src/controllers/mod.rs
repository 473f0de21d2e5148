pub mod login;
pub mod paste;
