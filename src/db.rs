pub mod shipment_repo;
pub use shipment_repo::ShipmentRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
