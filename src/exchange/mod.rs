pub mod client;
pub mod dispatcher;
pub mod error;
pub mod signer;

pub use client::KrakenFuturesClient;
pub use dispatcher::{HttpMethod, HttpTransport, PreparedRequest, RequestDispatcher, ReqwestTransport};
pub use error::ExchangeError;
pub use signer::{Credentials, Signer};
