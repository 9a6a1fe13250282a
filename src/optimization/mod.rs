pub mod calibration;
pub mod factors;
pub mod homography;
pub mod linear;
pub mod pnp;

pub use calibration::*;
pub use homography::*;
pub use linear::*;
pub use pnp::*;
