pub mod claim;
pub mod error;
pub mod records;
pub mod types;

pub use claim::{strip_whitespace, Claim};
pub use error::DhaliError;
pub use records::{PrivateChannelRecord, PublicChannelRecord, RequestRecord};
pub use types::{Cid, Currency, Rid, ToClaim};
