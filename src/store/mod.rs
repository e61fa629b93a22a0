mod message;
mod state;

pub use message::Message;
pub use state::MessageStore;
pub use state::StoreError;
