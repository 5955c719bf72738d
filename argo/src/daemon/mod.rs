pub mod error;
pub mod process;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use shutdown::ShutdownCoordinator;
pub use state::{DaemonState, IoChannelPair};
