pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod resolver;
pub mod token;

pub use context::Context;
pub use error::{Result, VerifyError};
pub use resolver::{StaticTxtResolver, SystemTxtResolver, TxtResolver};
pub use token::Token;
