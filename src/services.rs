pub mod auth;
pub mod change_feed;
pub mod credential_service;
pub mod document_service;
pub mod shipment_service;
