mod error;
mod ids;
mod site_set;


pub use error::{err, script_err, Error, ErrorKind, Result};
pub use ids::{SiteId, Timestamp, TxnId, Value, VarId};
pub use site_set::SiteSet;
