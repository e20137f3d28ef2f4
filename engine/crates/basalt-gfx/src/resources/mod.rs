pub mod resource;
pub mod upload_buffer;
