pub mod api;
pub mod credentials;
pub mod crypto;
pub mod dashboard;
pub mod importer;
pub mod poller;
pub mod session;
pub mod state;
pub mod status;
