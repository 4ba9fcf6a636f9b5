pub mod coordinator;
pub mod dispatcher;
pub mod input;
pub mod keymap;
pub mod text_input;
