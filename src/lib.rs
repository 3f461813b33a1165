pub mod image_bundle;
pub mod logger;
