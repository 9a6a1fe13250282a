pub mod board;
pub mod camera;
pub mod chessboard;
pub mod data_loader;
pub mod detected_points;
pub mod error;
pub mod io;
pub mod marker;
pub mod optimization;
pub mod pipeline;
pub mod refine;
pub mod types;
pub mod util;
pub mod visualization;

pub use error::{CalibError, Result};
