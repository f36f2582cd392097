pub mod auth;
pub mod certificates;
pub mod changes;
pub mod documents;
pub mod functions;
pub mod shipments;
