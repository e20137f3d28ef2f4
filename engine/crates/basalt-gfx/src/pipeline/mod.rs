pub mod pipeline_state;
pub mod root_signature;
