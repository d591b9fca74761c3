mod checksum;
mod id;
mod models;
mod sanitize;

pub use checksum::address_of;
pub use id::{encode, local_id_of, prefix_of, Backend, StationId};
pub use models::{Directory, Station};
pub use sanitize::{downgrade_https, is_vtuner_host};
