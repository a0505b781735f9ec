pub mod error;
pub mod requests;
pub mod responses;
pub mod status;


pub use error::{Result, SearchwireError};
pub use requests::{Method, RestRequest};
pub use responses::RestResponse;
pub use status::Status;
