#![no_std]
#![allow(async_fn_in_trait)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
pub(crate) mod utils;

pub mod csma;
pub mod error;
pub mod mac;
pub mod phy;
#[cfg(any(feature = "std", test))]
pub mod sim;
pub mod time;

pub use error::Error;
