pub mod retention;
pub mod router;
pub mod store;

pub use router::{Delivery, DirectRequest, GroupRequest, RelayService};
