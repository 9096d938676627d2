pub mod invitations;
pub mod rewards;
pub mod server;
pub mod stats;
pub mod users;
pub mod wallet;
