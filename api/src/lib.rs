// Licensed under the Apache-2.0 license

#![cfg_attr(not(test), no_std)]

pub mod apdu;

pub mod dispatch;

mod oid;

mod session;

pub use trustelem_error as error;

pub use dispatch::{dispatch, Exchange, TlEvent, TransportLayer};

pub use oid::ObjectId;

pub use session::Session;
