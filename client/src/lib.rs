pub mod address;
pub mod error;
pub mod session;
pub mod shell;
pub mod store;
pub mod transport;

pub use error::{SessionError, StoreError, TransportError};
pub use session::{SendOutcome, SessionController};
pub use store::{StrokeHandle, StrokeStore};
pub use transport::{ConnectAttempt, ConnectionState, TcpTransport, Transport};
