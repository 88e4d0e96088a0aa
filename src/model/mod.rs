pub mod draft;
pub mod filter;
pub mod material;
pub mod request;

pub use draft::*;
pub use filter::*;
pub use material::*;
pub use request::*;
