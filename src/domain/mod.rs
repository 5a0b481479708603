mod credential;
mod expense;
mod group;
mod ledger;
mod money;
mod notification;
mod payment;
mod user;
mod wallet;

pub use credential::*;
pub use expense::*;
pub use group::*;
pub use ledger::*;
pub use money::*;
pub use notification::*;
pub use payment::*;
pub use user::*;
pub use wallet::*;
