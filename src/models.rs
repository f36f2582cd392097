pub mod auth;
pub mod certificate;
pub mod changes;
pub mod shipment;
