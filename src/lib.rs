#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod devices;
pub mod error;
pub mod opener;

#[cfg(feature = "async")]
pub mod hub;
#[cfg(feature = "async")]
pub mod setup;

#[cfg(feature = "async")]
pub use setup::async_setup;
