pub mod errors;
pub mod handlers;
pub mod server;

pub use errors::RpcError;
pub use handlers::RpcHandler;
pub use server::RpcServer;
