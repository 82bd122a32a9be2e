pub mod asset;
pub mod entity;
pub mod inference;
pub mod scene;
