pub mod resource_state;
