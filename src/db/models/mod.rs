mod admin;
mod chat;
mod detection;
mod farmer;
mod issue;
mod subsidy;

pub use admin::*;
pub use chat::*;
pub use detection::*;
pub use farmer::*;
pub use issue::*;
pub use subsidy::*;
