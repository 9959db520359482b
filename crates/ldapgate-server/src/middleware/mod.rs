//! Request preprocessing for the auth endpoint

pub mod credentials;
