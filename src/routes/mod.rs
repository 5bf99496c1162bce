pub mod account;
pub mod auth;
pub mod contact;
pub mod home;
pub mod posts;
