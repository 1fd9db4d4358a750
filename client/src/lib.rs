pub mod cluster_client;
pub mod node_client;
pub mod share_client;
pub mod transport;
pub mod wire;

pub use cluster_client::{ClusterClient, ClusterQueryIter};
pub use node_client::{NodeClient, QueryStream};
pub use transport::{PeerStream, PeerTransport, TcpTransport};
