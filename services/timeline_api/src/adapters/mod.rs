pub mod db;
pub mod dispatcher;
pub mod memory;

pub use db::PgStore;
pub use dispatcher::ChannelDispatcher;
pub use memory::MemoryStore;
